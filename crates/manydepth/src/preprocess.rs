use std::path::Path;

use candle_core::Tensor;
use manydepth_image::{ops, Image, ImageSize};
use manydepth_imgproc::{interpolation::InterpolationMode, resize::resize_fast};
use manydepth_io::functional::read_image_any_rgb8;

use crate::context::ExecutionContext;
use crate::error::ManyDepthError;

/// A network-ready image tensor and the size of the image it came from.
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    /// `[1, 3, H, W]` tensor with values in `[0, 1]`.
    pub tensor: Tensor,
    /// The resolution of the decoded image.
    pub original_size: ImageSize,
}

/// Resize an RGB image to the network resolution and convert it to a tensor.
///
/// The image is resampled with an anti-aliased Lanczos filter to exactly `size`,
/// stretching it if the aspect ratios differ, then scaled to `[0, 1]` and laid out as
/// `[1, 3, H, W]` on the context device.
///
/// # Arguments
///
/// * `image` - The decoded RGB image.
/// * `size` - The network input resolution.
/// * `ctx` - The execution context.
pub fn preprocess_image(
    image: &Image<u8, 3>,
    size: ImageSize,
    ctx: &ExecutionContext,
) -> Result<Tensor, ManyDepthError> {
    // resize the image to the network resolution
    let mut resized = Image::<u8, 3>::from_size_val(size, 0)?;
    resize_fast(image, &mut resized, InterpolationMode::Lanczos3)?;

    // cast the image to f32 and scale it to the range [0, 1]
    let mut scaled = Image::<f32, 3>::from_size_val(size, 0.0)?;
    ops::cast_and_scale(&resized, &mut scaled, 1.0 / 255.0)?;

    // permute the image to the shape (1, c, h, w)
    let tensor = Tensor::from_slice(
        scaled.as_slice(),
        (size.height, size.width, 3),
        ctx.device(),
    )?
    .permute((2, 0, 1))?
    .unsqueeze(0)?
    .contiguous()?;

    Ok(tensor)
}

/// Decode an image file and preprocess it for the networks.
///
/// # Errors
///
/// Returns [`ManyDepthError::ImageDecode`] if the file cannot be opened or decoded.
pub fn load_and_preprocess_image(
    path: impl AsRef<Path>,
    size: ImageSize,
    ctx: &ExecutionContext,
) -> Result<PreprocessedImage, ManyDepthError> {
    let path = path.as_ref();
    let image = read_image_any_rgb8(path)
        .map_err(|e| ManyDepthError::ImageDecode(path.to_path_buf(), e))?;

    log::debug!("decoded {} with size {}", path.display(), image.size());

    Ok(PreprocessedImage {
        tensor: preprocess_image(&image, size, ctx)?,
        original_size: image.size(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_and_range() -> Result<(), ManyDepthError> {
        let ctx = ExecutionContext::cpu();
        let data = (0..40 * 30 * 3).map(|i| (i % 256) as u8).collect();
        let image = Image::<u8, 3>::new([40, 30].into(), data)?;

        let tensor = preprocess_image(&image, [64, 32].into(), &ctx)?;
        assert_eq!(tensor.dims(), &[1, 3, 32, 64]);

        let values = tensor.flatten_all()?.to_vec1::<f32>()?;
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        Ok(())
    }

    #[test]
    fn channels_are_planar() -> Result<(), ManyDepthError> {
        let ctx = ExecutionContext::cpu();
        let pixel = [255u8, 0, 51];
        let data = pixel.iter().copied().cycle().take(8 * 8 * 3).collect();
        let image = Image::<u8, 3>::new([8, 8].into(), data)?;

        let tensor = preprocess_image(&image, [4, 4].into(), &ctx)?;
        let means = tensor
            .squeeze(0)?
            .flatten_from(1)?
            .mean(1)?
            .to_vec1::<f32>()?;

        approx::assert_relative_eq!(means[0], 1.0, epsilon = 1e-2);
        approx::assert_relative_eq!(means[1], 0.0, epsilon = 1e-2);
        approx::assert_relative_eq!(means[2], 0.2, epsilon = 1e-2);
        Ok(())
    }

    #[test]
    fn aspect_ratio_is_not_preserved() -> Result<(), ManyDepthError> {
        // a 1280x384 frame squeezed into 64x64
        let ctx = ExecutionContext::cpu();
        let image = Image::<u8, 3>::from_size_val([1280, 384].into(), 128)?;
        let tensor = preprocess_image(&image, [64, 64].into(), &ctx)?;
        assert_eq!(tensor.dims(), &[1, 3, 64, 64]);
        Ok(())
    }

    #[test]
    fn missing_file_is_decode_error() {
        let ctx = ExecutionContext::cpu();
        let res = load_and_preprocess_image("/no/such/image.jpg", [64, 32].into(), &ctx);
        assert!(matches!(res, Err(ManyDepthError::ImageDecode(..))));
    }
}

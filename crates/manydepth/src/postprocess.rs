use candle_core::{DType, Tensor};
use manydepth_image::{Image, ImageSize};
use manydepth_imgproc::{interpolation::InterpolationMode, resize::resize_native};

use crate::error::ManyDepthError;

/// Strip the batch and channel axes of a `[1, 1, h, w]` disparity.
pub fn disparity_to_image(disparity: &Tensor) -> Result<Image<f32, 1>, ManyDepthError> {
    let (b, c, height, width) = disparity.dims4()?;
    if b != 1 || c != 1 {
        return Err(manydepth_nn::NnError::InvalidShape {
            name: "disparity",
            expected: "[1, 1, h, w]".to_string(),
            actual: disparity.dims().to_vec(),
        }
        .into());
    }

    let data = disparity.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
    Ok(Image::new(ImageSize { width, height }, data)?)
}

/// Resize a `[1, 1, h, w]` disparity to the given size.
///
/// Bilinear interpolation without corner alignment, the output has no batch or
/// channel axis.
///
/// # Arguments
///
/// * `disparity` - The disparity at the network resolution.
/// * `size` - The output size, usually the original image size.
pub fn resize_disparity(
    disparity: &Tensor,
    size: ImageSize,
) -> Result<Image<f32, 1>, ManyDepthError> {
    let src = disparity_to_image(disparity)?;
    let mut dst = Image::<f32, 1>::from_size_val(size, 0.0)?;
    resize_native(&src, &mut dst, InterpolationMode::Bilinear)?;
    Ok(dst)
}

/// Quantize a disparity in `[0, 1]` to the full 16-bit range.
pub fn disparity_to_u16(disparity: &Image<f32, 1>) -> Result<Image<u16, 1>, ManyDepthError> {
    let data = disparity
        .as_slice()
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16)
        .collect();
    Ok(Image::new(disparity.size(), data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn resize_to_original_size() -> Result<(), ManyDepthError> {
        let disparity = Tensor::rand(0f32, 1., (1, 1, 48, 160), &Device::Cpu)?;
        let resized = resize_disparity(&disparity, [1280, 384].into())?;

        assert_eq!(resized.size(), ImageSize { width: 1280, height: 384 });
        assert!(resized.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
        Ok(())
    }

    #[test]
    fn resize_constant_is_constant() -> Result<(), ManyDepthError> {
        let disparity = Tensor::full(0.25f32, (1, 1, 6, 10), &Device::Cpu)?;
        let resized = resize_disparity(&disparity, [37, 11].into())?;
        for v in resized.as_slice() {
            approx::assert_relative_eq!(*v, 0.25, epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn strips_axes() -> Result<(), ManyDepthError> {
        let disparity = Tensor::arange(0f32, 6., &Device::Cpu)?.reshape((1, 1, 2, 3))?;
        let image = disparity_to_image(&disparity)?;
        assert_eq!(image.size(), ImageSize { width: 3, height: 2 });
        assert_eq!(image.get([1, 2, 0]), Some(&5.0));

        let batched = Tensor::zeros((2, 1, 2, 3), DType::F32, &Device::Cpu)?;
        assert!(disparity_to_image(&batched).is_err());
        Ok(())
    }

    #[test]
    fn quantize() -> Result<(), ManyDepthError> {
        let image = Image::<f32, 1>::new([4, 1].into(), vec![0.0, 0.5, 1.0, 1.5])?;
        let q = disparity_to_u16(&image)?;
        assert_eq!(q.as_slice(), &[0, 32768, 65535, 65535]);
        Ok(())
    }
}

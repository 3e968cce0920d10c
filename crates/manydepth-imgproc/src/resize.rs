use crate::interpolation::{
    grid::half_pixel_source_coordinate, interpolate_pixel, InterpolationMode,
};
use fast_image_resize as fr;
use manydepth_image::{Image, ImageError};
use rayon::prelude::*;

fn check_non_empty<T, const C: usize>(image: &Image<T, C>) -> Result<(), ImageError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ImageError::EmptyImage(image.size()));
    }
    Ok(())
}

/// Resize a floating point image to the size of `dst`.
///
/// Source coordinates are computed without corner alignment: pixel centres of the
/// source and destination grids are matched, so the resampling is the one commonly
/// labelled `align_corners = false`. Rows are processed in parallel.
///
/// # Arguments
///
/// * `src` - The input image container.
/// * `dst` - The output image container, its size defines the output resolution.
/// * `interpolation` - The interpolation mode to use. `Lanczos3` is not supported here.
///
/// # Example
///
/// ```
/// use manydepth_image::{Image, ImageSize};
/// use manydepth_imgproc::resize::resize_native;
/// use manydepth_imgproc::interpolation::InterpolationMode;
///
/// let image = Image::<_, 1>::new(
///     ImageSize {
///         width: 4,
///         height: 5,
///     },
///     vec![0f32; 4 * 5],
/// )
/// .unwrap();
///
/// let mut image_resized = Image::<_, 1>::from_size_val([2, 3].into(), 0.0).unwrap();
///
/// resize_native(&image, &mut image_resized, InterpolationMode::Bilinear).unwrap();
///
/// assert_eq!(image_resized.size().width, 2);
/// assert_eq!(image_resized.size().height, 3);
/// ```
pub fn resize_native<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    interpolation: InterpolationMode,
) -> Result<(), ImageError> {
    check_non_empty(src)?;
    check_non_empty(dst)?;

    if interpolation == InterpolationMode::Lanczos3 {
        return Err(ImageError::UnsupportedInterpolation(
            interpolation.to_string(),
        ));
    }

    let (src_rows, src_cols) = (src.rows(), src.cols());
    let (dst_rows, dst_cols) = (dst.rows(), dst.cols());

    let map_x = (0..dst_cols)
        .map(|c| half_pixel_source_coordinate(c, src_cols, dst_cols))
        .collect::<Vec<_>>();

    dst.as_slice_mut()
        .par_chunks_exact_mut(dst_cols * C)
        .enumerate()
        .for_each(|(r, row)| {
            let v = half_pixel_source_coordinate(r, src_rows, dst_rows);
            for (out, &u) in row.chunks_exact_mut(C).zip(map_x.iter()) {
                // NOTE: point kernels only, checked above
                if let Some(pixel) = interpolate_pixel(src, u, v, interpolation) {
                    out.copy_from_slice(&pixel);
                }
            }
        });

    Ok(())
}

/// Resize an RGB image using the
/// [fast_image_resize](https://crates.io/crates/fast_image_resize) crate.
///
/// Convolution filters are scaled with the resize factor, so down-sampling is
/// anti-aliased. The aspect ratio is not preserved: the output always has the
/// size of `dst`.
///
/// # Arguments
///
/// * `src` - The input image container with 3 channels.
/// * `dst` - The output image container with 3 channels.
/// * `interpolation` - The interpolation mode to use.
///
/// # Example
///
/// ```
/// use manydepth_image::{Image, ImageSize};
/// use manydepth_imgproc::resize::resize_fast;
/// use manydepth_imgproc::interpolation::InterpolationMode;
///
/// let image = Image::<_, 3>::new(
///     ImageSize {
///         width: 4,
///         height: 5,
///     },
///     vec![0u8; 4 * 5 * 3],
/// )
/// .unwrap();
///
/// let mut image_resized = Image::<_, 3>::from_size_val([2, 3].into(), 0).unwrap();
///
/// resize_fast(&image, &mut image_resized, InterpolationMode::Lanczos3).unwrap();
///
/// assert_eq!(image_resized.num_channels(), 3);
/// assert_eq!(image_resized.size().width, 2);
/// assert_eq!(image_resized.size().height, 3);
/// ```
///
/// # Errors
///
/// The function returns an error if the image cannot be resized.
pub fn resize_fast(
    src: &Image<u8, 3>,
    dst: &mut Image<u8, 3>,
    interpolation: InterpolationMode,
) -> Result<(), ImageError> {
    check_non_empty(src)?;
    check_non_empty(dst)?;

    let src_image = fr::images::ImageRef::new(
        src.width() as u32,
        src.height() as u32,
        src.as_slice(),
        fr::PixelType::U8x3,
    )
    .map_err(|_| ImageError::InvalidChannelShape(src.as_slice().len(), src.size().area() * 3))?;

    let (dst_width, dst_height, dst_len) = (dst.width(), dst.height(), dst.as_slice().len());
    let mut dst_image = fr::images::Image::from_slice_u8(
        dst_width as u32,
        dst_height as u32,
        dst.as_slice_mut(),
        fr::PixelType::U8x3,
    )
    .map_err(|_| ImageError::InvalidChannelShape(dst_len, dst_width * dst_height * 3))?;

    let algorithm = match interpolation {
        InterpolationMode::Bilinear => fr::ResizeAlg::Convolution(fr::FilterType::Bilinear),
        InterpolationMode::Lanczos3 => fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3),
    };

    let options = fr::ResizeOptions::new().resize_alg(algorithm);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|_| ImageError::IncompatiblePixelTypes)?;

    Ok(())
}

use super::bilinear::bilinear_interpolation;
use manydepth_image::Image;

/// Interpolation mode for the resize operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    /// Bilinear interpolation
    Bilinear,
    /// Anti-aliased Lanczos interpolation with a window of 3 lobes
    Lanczos3,
}

impl std::fmt::Display for InterpolationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            InterpolationMode::Bilinear => "bilinear",
            InterpolationMode::Lanczos3 => "lanczos3",
        };
        write!(f, "{name}")
    }
}

/// Kernel for interpolating a pixel value
///
/// # Arguments
///
/// * `image` - The input image container with shape (height, width, C).
/// * `u` - The x coordinate of the pixel to interpolate.
/// * `v` - The y coordinate of the pixel to interpolate.
/// * `interpolation` - The interpolation mode to use.
///
/// # Returns
///
/// The interpolated pixel values, or `None` for modes without a point kernel.
pub fn interpolate_pixel<const C: usize>(
    image: &Image<f32, C>,
    u: f32,
    v: f32,
    interpolation: InterpolationMode,
) -> Option<[f32; C]> {
    match interpolation {
        InterpolationMode::Bilinear => Some(bilinear_interpolation(image, u, v)),
        InterpolationMode::Lanczos3 => None,
    }
}

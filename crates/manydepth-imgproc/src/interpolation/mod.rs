//! Pixel interpolation methods for image resampling.
//!
//! - **Bilinear**: linear interpolation between the four neighbouring pixels
//! - **Lanczos3**: windowed sinc, only available through [`crate::resize::resize_fast`]

mod bilinear;

/// Coordinate mapping between source and destination grids.
pub mod grid;

pub(crate) mod interpolate;

pub use interpolate::interpolate_pixel;
pub use interpolate::InterpolationMode;

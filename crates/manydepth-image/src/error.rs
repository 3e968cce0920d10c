use crate::image::ImageSize;

/// An error type for the image module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ImageError {
    /// Error when channel and shape are not valid.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidChannelShape(usize, usize),

    /// Error when the image size is not valid.
    #[error("Invalid image size ({0}, {1}) mismatch ({2}, {3})")]
    InvalidImageSize(usize, usize, usize, usize),

    /// Error when the image has a zero dimension.
    #[error("Image size must be non-zero, got {0}")]
    EmptyImage(ImageSize),

    /// Error when an operation does not implement the requested interpolation.
    #[error("Interpolation mode {0} is not supported by this operation")]
    UnsupportedInterpolation(String),

    /// Error when the resampling backend rejects the pixel buffers.
    #[error("Incompatible pixel types for the resize backend")]
    IncompatiblePixelTypes,

    /// Error when the cast operation fails.
    #[error("Failed to cast image data to {0}")]
    CastError(String),
}

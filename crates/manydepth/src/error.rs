use std::path::PathBuf;

/// An error type for the depth pipeline.
#[derive(thiserror::Error, Debug)]
pub enum ManyDepthError {
    /// Error when an input image cannot be opened or decoded.
    #[error("Failed to decode the image {0}. {1}")]
    ImageDecode(PathBuf, #[source] manydepth_io::IoError),

    /// Error when the intrinsics are not a 3x3 numeric array.
    #[error("Malformed intrinsics. {0}")]
    MalformedIntrinsics(String),

    /// Error when the checkpoint does not match the pipeline configuration.
    #[error("Checkpoint mismatch. {0}")]
    CheckpointMismatch(String),

    /// Error raised by the tensor backend.
    #[error(transparent)]
    TensorError(#[from] candle_core::Error),

    /// Error raised by one of the networks.
    #[error(transparent)]
    NnError(#[from] manydepth_nn::NnError),

    /// Error raised while manipulating images.
    #[error(transparent)]
    ImageError(#[from] manydepth_image::ImageError),

    /// Error raised by the geometry routines.
    #[error(transparent)]
    GeometryError(#[from] manydepth_geometry::GeometryError),
}

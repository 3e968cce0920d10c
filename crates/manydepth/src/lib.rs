#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! A [`DepthPipeline`] turns a target image, an optional reference frame and the
//! camera intrinsics into a disparity map:
//!
//! 1. both images are resized to the checkpoint resolution ([`preprocess`]),
//! 2. the intrinsics are scaled to the cost volume resolution ([`intrinsics`]),
//! 3. the relative pose of the reference frame is estimated ([`pose`]),
//! 4. in [`DepthMode::Mono`] the pose and reference are zeroed,
//! 5. the matching encoder and depth decoder predict the disparity,
//! 6. the finest disparity is resized back to the input size ([`postprocess`]).

/// Checkpoint metadata and weight loading.
pub mod checkpoint;

/// Device selection.
pub mod context;

/// Error types for the pipeline.
pub mod error;

/// Intrinsics adapter.
pub mod intrinsics;

/// The depth estimation pipeline.
pub mod pipeline;

/// Relative pose estimation.
pub mod pose;

/// Disparity post-processing.
pub mod postprocess;

/// Image preprocessing.
pub mod preprocess;

pub use crate::checkpoint::CheckpointMetadata;
pub use crate::context::{DeviceRequest, ExecutionContext};
pub use crate::error::ManyDepthError;
pub use crate::pipeline::{
    DepthPipeline, DepthPrediction, Networks, PredictionRequest, TensorPrediction,
};
pub use manydepth_nn::DepthMode;

#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! The pipeline only talks to the networks through the capability traits in
//! [`traits`]. The candle implementations load safetensors exported from the trained
//! PyTorch models, tensor names follow the PyTorch module paths.

/// Depth hypotheses swept by the cost volume.
pub mod bins;

/// Multi-view matching cost volume computed on the host.
pub mod cost_volume;

/// Depth decoder producing multi-scale sigmoid disparities.
pub mod depth_decoder;

/// Error types for the nn module.
pub mod error;

/// Building blocks shared by the decoders.
pub mod layers;

/// Feature encoder that fuses a matching cost volume.
pub mod matching;

/// Mono / multi inference modes.
pub mod mode;

/// Pose decoder predicting axis-angle and translation.
pub mod pose_decoder;

/// ResNet backbones.
pub mod resnet;

/// Capability traits consumed by the pipeline.
pub mod traits;

pub use crate::bins::{compute_depth_bins, DepthBinRange, DepthBinning};
pub use crate::error::NnError;
pub use crate::mode::DepthMode;
pub use crate::traits::{
    DepthDecoder, DisparityPyramid, MatchingEncoder, MatchingInput, MatchingOutput, PoseDecoder,
    PoseEncoder, PoseParameters,
};

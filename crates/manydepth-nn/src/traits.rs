use std::collections::BTreeMap;

use candle_core::Tensor;

use crate::bins::DepthBinRange;
use crate::error::NnError;
use crate::mode::DepthMode;

/// Relative camera motion predicted by a [`PoseDecoder`].
#[derive(Debug, Clone)]
pub struct PoseParameters {
    /// Axis-angle rotations with shape `[B, F, 1, 3]`.
    pub axis_angle: Tensor,
    /// Translations with shape `[B, F, 1, 3]`.
    pub translation: Tensor,
}

/// Inputs of a [`MatchingEncoder`].
#[derive(Debug)]
pub struct MatchingInput<'a> {
    /// The target image, `[B, 3, H, W]` in `[0, 1]`.
    pub current_image: &'a Tensor,
    /// The reference images, `[B, F, 3, H, W]` in `[0, 1]`.
    pub lookup_images: &'a Tensor,
    /// Target-to-reference transforms, `[B, F, 4, 4]`.
    pub poses: &'a Tensor,
    /// Intrinsics at the matching resolution, `[B, 4, 4]`.
    pub k: &'a Tensor,
    /// Inverse intrinsics, `[B, 4, 4]`.
    pub inv_k: &'a Tensor,
    /// The depth interval swept by the cost volume.
    pub depth_range: DepthBinRange,
    /// Whether the lookup frames take part in the prediction.
    pub mode: DepthMode,
}

/// Outputs of a [`MatchingEncoder`].
#[derive(Debug, Clone)]
pub struct MatchingOutput {
    /// The feature pyramid, from the finest to the coarsest level.
    pub features: Vec<Tensor>,
    /// Disparity of the cheapest depth hypothesis, `[B, h, w]`.
    pub lowest_cost: Tensor,
    /// 1 where every depth hypothesis received a valid matching cost, `[B, h, w]`.
    pub confidence_mask: Tensor,
}

/// Sigmoid disparity maps indexed by scale, scale `s` has `1 / 2^s` of the input size.
#[derive(Debug, Clone, Default)]
pub struct DisparityPyramid {
    scales: BTreeMap<usize, Tensor>,
}

impl DisparityPyramid {
    /// Store the disparity of a scale.
    pub fn insert(&mut self, scale: usize, disparity: Tensor) {
        self.scales.insert(scale, disparity);
    }

    /// The disparity of the given scale.
    pub fn get(&self, scale: usize) -> Result<&Tensor, NnError> {
        self.scales.get(&scale).ok_or(NnError::MissingScale(scale))
    }

    /// The scales present in the pyramid.
    pub fn scales(&self) -> impl Iterator<Item = usize> + '_ {
        self.scales.keys().copied()
    }
}

/// Encode a channel-concatenated image pair into a feature pyramid.
pub trait PoseEncoder: Send + Sync {
    /// Run the encoder on `[B, 6, H, W]` inputs in `[0, 1]`.
    fn infer(&self, image_pair: &Tensor) -> Result<Vec<Tensor>, NnError>;
}

/// Predict relative poses from pose encoder features.
pub trait PoseDecoder: Send + Sync {
    /// Run the decoder on the feature pyramid of a [`PoseEncoder`].
    fn infer(&self, features: &[Tensor]) -> Result<PoseParameters, NnError>;
}

/// Encode the target image, fusing a matching cost volume against the lookup frames.
pub trait MatchingEncoder: Send + Sync {
    /// Run the encoder.
    fn infer(&self, input: &MatchingInput<'_>) -> Result<MatchingOutput, NnError>;
}

/// Decode a feature pyramid into multi-scale disparities.
pub trait DepthDecoder: Send + Sync {
    /// Run the decoder.
    fn infer(&self, features: &[Tensor]) -> Result<DisparityPyramid, NnError>;
}

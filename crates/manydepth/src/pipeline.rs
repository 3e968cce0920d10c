use std::path::{Path, PathBuf};

use candle_core::Tensor;
use manydepth_image::{Image, ImageSize};
use manydepth_nn::matching::MatchingConfig;
use manydepth_nn::{
    DepthDecoder, DepthMode, DisparityPyramid, MatchingEncoder, MatchingInput, PoseDecoder,
    PoseEncoder,
};

use crate::checkpoint::{load_checkpoint, CheckpointMetadata};
use crate::context::ExecutionContext;
use crate::error::ManyDepthError;
use crate::intrinsics::{load_and_preprocess_intrinsics, Intrinsics, MATCHING_DOWNSCALE};
use crate::pose::PoseEstimator;
use crate::postprocess::resize_disparity;
use crate::preprocess::load_and_preprocess_image;

/// The four networks driven by a [`DepthPipeline`].
pub struct Networks {
    /// encodes the stacked reference and target images
    pub pose_encoder: Box<dyn PoseEncoder>,
    /// predicts the relative pose
    pub pose_decoder: Box<dyn PoseDecoder>,
    /// encodes the target image with the matching cost volume
    pub encoder: Box<dyn MatchingEncoder>,
    /// predicts multi-scale disparities
    pub depth_decoder: Box<dyn DepthDecoder>,
}

/// A file-based prediction request.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    /// The image to predict depth for.
    pub target_image_path: PathBuf,
    /// The previous frame, the target image is reused when absent.
    pub source_image_path: Option<PathBuf>,
    /// JSON file with the normalized 3x3 intrinsics.
    pub intrinsics_json_path: PathBuf,
    /// Whether the source frame takes part in the prediction.
    pub mode: DepthMode,
}

/// The raw network outputs of a prediction.
#[derive(Debug, Clone)]
pub struct TensorPrediction {
    /// Sigmoid disparity at the network resolution, `[1, 1, H, W]`.
    pub disparity: Tensor,
    /// Disparity of the cheapest depth hypothesis, `[1, H / 4, W / 4]`.
    pub lowest_cost: Tensor,
    /// Cost volume confidence, `[1, H / 4, W / 4]`.
    pub confidence_mask: Tensor,
}

/// The result of a file-based prediction.
#[derive(Debug, Clone)]
pub struct DepthPrediction {
    /// Sigmoid disparity at the network resolution, `[1, 1, H, W]`.
    pub disparity: Tensor,
    /// The disparity resized to the size of the target image.
    pub disparity_resized: Image<f32, 1>,
    /// Disparity of the cheapest depth hypothesis, `[1, H / 4, W / 4]`.
    pub lowest_cost: Tensor,
    /// Cost volume confidence, `[1, H / 4, W / 4]`.
    pub confidence_mask: Tensor,
    /// The size of the decoded target image.
    pub original_size: ImageSize,
}

/// Multi-frame depth estimation from a target and a reference image.
///
/// The pipeline estimates the relative pose of the reference frame, builds a matching
/// cost volume over the checkpoint depth range and decodes the fused features into a
/// disparity. The networks are held immutably, so repeated calls with the same inputs
/// give the same outputs.
pub struct DepthPipeline {
    ctx: ExecutionContext,
    metadata: CheckpointMetadata,
    pose: PoseEstimator,
    encoder: Box<dyn MatchingEncoder>,
    depth_decoder: Box<dyn DepthDecoder>,
}

impl DepthPipeline {
    /// Create a pipeline from already constructed networks.
    pub fn new(
        ctx: ExecutionContext,
        metadata: CheckpointMetadata,
        networks: Networks,
    ) -> Result<Self, ManyDepthError> {
        metadata.validate()?;
        Ok(Self {
            ctx,
            metadata,
            pose: PoseEstimator::new(networks.pose_encoder, networks.pose_decoder),
            encoder: networks.encoder,
            depth_decoder: networks.depth_decoder,
        })
    }

    /// Load a pipeline from a checkpoint directory with the default matching config.
    pub fn from_checkpoint(
        dir: impl AsRef<Path>,
        ctx: ExecutionContext,
    ) -> Result<Self, ManyDepthError> {
        Self::from_checkpoint_with_config(dir, MatchingConfig::default(), ctx)
    }

    /// Load a pipeline from a checkpoint directory.
    pub fn from_checkpoint_with_config(
        dir: impl AsRef<Path>,
        config: MatchingConfig,
        ctx: ExecutionContext,
    ) -> Result<Self, ManyDepthError> {
        let (metadata, networks) = load_checkpoint(dir, config, &ctx)?;
        Self::new(ctx, metadata, networks)
    }

    /// The network input resolution.
    pub fn input_size(&self) -> ImageSize {
        self.metadata.input_size()
    }

    /// The checkpoint metadata.
    pub fn metadata(&self) -> &CheckpointMetadata {
        &self.metadata
    }

    /// The execution context.
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Decode the request files and predict the target disparity.
    pub fn predict(&self, request: &PredictionRequest) -> Result<DepthPrediction, ManyDepthError> {
        let size = self.input_size();

        let target = load_and_preprocess_image(&request.target_image_path, size, &self.ctx)?;
        let reference = match &request.source_image_path {
            Some(path) => load_and_preprocess_image(path, size, &self.ctx)?.tensor,
            None => {
                log::debug!("no source image, using the target image as reference");
                target.tensor.clone()
            }
        };
        let intrinsics =
            load_and_preprocess_intrinsics(&request.intrinsics_json_path, size, &self.ctx)?;

        let prediction =
            self.predict_tensors(&target.tensor, &reference, &intrinsics, request.mode)?;
        let disparity_resized = resize_disparity(&prediction.disparity, target.original_size)?;

        Ok(DepthPrediction {
            disparity: prediction.disparity,
            disparity_resized,
            lowest_cost: prediction.lowest_cost,
            confidence_mask: prediction.confidence_mask,
            original_size: target.original_size,
        })
    }

    /// Predict the target disparity from preprocessed tensors.
    ///
    /// # Arguments
    ///
    /// * `target` - The target image, `[1, 3, H, W]` in `[0, 1]`.
    /// * `reference` - The reference image, same shape as `target`.
    /// * `intrinsics` - Intrinsics adapted to the network input size.
    /// * `mode` - Whether the reference frame takes part in the prediction.
    pub fn predict_tensors(
        &self,
        target: &Tensor,
        reference: &Tensor,
        intrinsics: &Intrinsics,
        mode: DepthMode,
    ) -> Result<TensorPrediction, ManyDepthError> {
        let size = self.input_size();
        let expected = [1, 3, size.height, size.width];
        for (name, t) in [("target", target), ("reference", reference)] {
            if t.dims() != expected {
                return Err(manydepth_nn::NnError::InvalidShape {
                    name,
                    expected: format!("{expected:?}"),
                    actual: t.dims().to_vec(),
                }
                .into());
            }
        }

        let matching_size = size.downscaled(MATCHING_DOWNSCALE);
        if intrinsics.matching_size() != matching_size {
            return Err(ManyDepthError::CheckpointMismatch(format!(
                "intrinsics are scaled for {} but the checkpoint matches at {}",
                intrinsics.matching_size(),
                matching_size
            )));
        }

        let pose = self.pose.estimate(reference, target, true)?;
        let (pose, reference) = mode.apply(&pose, reference)?;
        log::debug!("running the matching encoder in {} mode", mode);

        let lookup_images = reference.unsqueeze(1)?;
        let poses = pose.unsqueeze(1)?;
        let output = self.encoder.infer(&MatchingInput {
            current_image: target,
            lookup_images: &lookup_images,
            poses: &poses,
            k: intrinsics.k_tensor(),
            inv_k: intrinsics.inv_k_tensor(),
            depth_range: self.metadata.depth_range()?,
            mode,
        })?;

        let disparities: DisparityPyramid = self.depth_decoder.infer(&output.features)?;
        let disparity = disparities.get(0)?.clone();
        log::debug!("disparity shape {:?}", disparity.dims());

        Ok(TensorPrediction {
            disparity,
            lowest_cost: output.lowest_cost,
            confidence_mask: output.confidence_mask,
        })
    }
}

use candle_core::{DType, Tensor};
use manydepth_geometry::transforms::{mat4_to_rows, transformation_from_parameters};
use manydepth_geometry::Vec3;
use manydepth_nn::{PoseDecoder, PoseEncoder};

use crate::error::ManyDepthError;

/// Relative camera motion between a reference and a target frame.
pub struct PoseEstimator {
    encoder: Box<dyn PoseEncoder>,
    decoder: Box<dyn PoseDecoder>,
}

impl PoseEstimator {
    /// Create an estimator from a pose encoder and decoder.
    pub fn new(encoder: Box<dyn PoseEncoder>, decoder: Box<dyn PoseDecoder>) -> Self {
        Self { encoder, decoder }
    }

    /// Estimate the transform between two frames.
    ///
    /// The images are concatenated along the channel axis, reference first, and only
    /// the first predicted frame pair is kept. With `invert` the returned transform
    /// maps target camera points into the reference camera.
    ///
    /// # Arguments
    ///
    /// * `reference` - The reference image, `[B, 3, H, W]`.
    /// * `target` - The target image, `[B, 3, H, W]`.
    /// * `invert` - Whether to invert the predicted transform.
    ///
    /// # Returns
    ///
    /// The `[B, 4, 4]` transforms.
    pub fn estimate(
        &self,
        reference: &Tensor,
        target: &Tensor,
        invert: bool,
    ) -> Result<Tensor, ManyDepthError> {
        let pair = Tensor::cat(&[reference, target], 1)?;
        let features = self.encoder.infer(&pair)?;
        let params = self.decoder.infer(&features)?;

        let first_pair = |t: &Tensor| -> Result<Vec<Vec<f32>>, ManyDepthError> {
            let t = t.narrow(1, 0, 1)?.flatten_from(1)?.to_dtype(DType::F32)?;
            Ok(t.to_vec2::<f32>()?)
        };
        let axis_angle = first_pair(&params.axis_angle)?;
        let translation = first_pair(&params.translation)?;

        if axis_angle.iter().chain(translation.iter()).any(|v| v.len() != 3) {
            return Err(manydepth_nn::NnError::InvalidShape {
                name: "pose parameters",
                expected: "[B, F, 1, 3]".to_string(),
                actual: params.axis_angle.dims().to_vec(),
            }
            .into());
        }

        let rows = axis_angle
            .iter()
            .zip(translation.iter())
            .map(|(r, t)| {
                let transform = transformation_from_parameters(
                    Vec3::from_slice(r),
                    Vec3::from_slice(t),
                    invert,
                );
                log::debug!("axis angle {:?}, translation {:?}", r, t);
                mat4_to_rows(&transform)
            })
            .collect::<Vec<_>>();

        let batch = rows.len();
        let data = rows.into_iter().flatten().flatten().collect::<Vec<_>>();
        Ok(Tensor::from_vec(data, (batch, 4, 4), target.device())?)
    }
}

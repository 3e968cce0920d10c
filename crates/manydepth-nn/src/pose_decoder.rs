use candle_core::{Module, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};

use crate::error::NnError;
use crate::traits::{PoseDecoder, PoseParameters};

const POSE_CHANNELS: usize = 256;

/// Scale applied to the raw network output.
const POSE_SCALE: f64 = 0.01;

/// Convolutional pose regressor on top of a [`ResnetEncoder`](crate::resnet::ResnetEncoder).
///
/// Tensors are loaded from `net.0` (squeeze) and `net.1` to `net.3` (pose convolutions).
#[derive(Debug, Clone)]
pub struct PoseDecoderNet {
    squeeze: Conv2d,
    pose: [Conv2d; 3],
    num_input_features: usize,
    num_frames_to_predict_for: usize,
}

impl PoseDecoderNet {
    /// Load the decoder.
    ///
    /// # Arguments
    ///
    /// * `num_ch_enc_last` - Channels of the deepest encoder level.
    /// * `num_input_features` - Number of feature pyramids concatenated by the decoder.
    /// * `num_frames_to_predict_for` - Number of poses predicted per sample.
    /// * `vb` - The variable builder holding the weights.
    pub fn new(
        num_ch_enc_last: usize,
        num_input_features: usize,
        num_frames_to_predict_for: usize,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let vb = vb.pp("net");
        let same = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };

        let squeeze = conv2d(
            num_ch_enc_last,
            POSE_CHANNELS,
            1,
            Default::default(),
            vb.pp("0"),
        )?;
        let pose = [
            conv2d(
                num_input_features * POSE_CHANNELS,
                POSE_CHANNELS,
                3,
                same,
                vb.pp("1"),
            )?,
            conv2d(POSE_CHANNELS, POSE_CHANNELS, 3, same, vb.pp("2"))?,
            conv2d(
                POSE_CHANNELS,
                6 * num_frames_to_predict_for,
                1,
                Default::default(),
                vb.pp("3"),
            )?,
        ];

        Ok(Self {
            squeeze,
            pose,
            num_input_features,
            num_frames_to_predict_for,
        })
    }

    /// Decode one or more feature pyramids, only their deepest level is used.
    pub fn forward_pyramids(&self, pyramids: &[&[Tensor]]) -> Result<PoseParameters, NnError> {
        if pyramids.len() != self.num_input_features {
            return Err(NnError::InvalidShape {
                name: "pose features",
                expected: format!("{} feature pyramids", self.num_input_features),
                actual: vec![pyramids.len()],
            });
        }

        let squeezed = pyramids
            .iter()
            .map(|features| match features.last() {
                Some(last) => Ok(self.squeeze.forward(last)?.relu()?),
                None => Err(NnError::InvalidShape {
                    name: "pose features",
                    expected: "a non-empty feature pyramid".to_string(),
                    actual: vec![0],
                }),
            })
            .collect::<Result<Vec<_>, NnError>>()?;

        let mut out = Tensor::cat(&squeezed, 1)?;
        for (i, conv) in self.pose.iter().enumerate() {
            out = conv.forward(&out)?;
            if i != 2 {
                out = out.relu()?;
            }
        }

        let batch = out.dim(0)?;
        let out = out
            .mean(3)?
            .mean(2)?
            .affine(POSE_SCALE, 0.0)?
            .reshape((batch, self.num_frames_to_predict_for, 1, 6))?;

        Ok(PoseParameters {
            axis_angle: out.narrow(3, 0, 3)?,
            translation: out.narrow(3, 3, 3)?,
        })
    }
}

impl PoseDecoder for PoseDecoderNet {
    fn infer(&self, features: &[Tensor]) -> Result<PoseParameters, NnError> {
        self.forward_pyramids(&[features])
    }
}

use candle_core::{Module, Tensor};
use candle_nn::VarBuilder;

use crate::error::NnError;
use crate::layers::{upsample2x, Conv3x3, ConvBlock};
use crate::resnet::NUM_CH_ENC;
use crate::traits::{DepthDecoder, DisparityPyramid};

/// Channels of the decoder levels, from the finest to the coarsest.
pub const NUM_CH_DEC: [usize; 5] = [16, 32, 64, 128, 256];

/// The scales a decoder predicts by default.
pub const DEFAULT_SCALES: [usize; 4] = [0, 1, 2, 3];

/// U-Net style decoder with skip connections and sigmoid disparity heads.
///
/// Tensors are loaded from a flat `decoder` list: upconvolution `(i, j)` sits at index
/// `2 * (4 - i) + j` and the disparity head of scale `s` at index `10 + s`.
#[derive(Debug, Clone)]
pub struct DepthDecoderNet {
    // indexed by level, [upconv_0, upconv_1]
    upconvs: Vec<[ConvBlock; 2]>,
    dispconvs: Vec<(usize, Conv3x3)>,
    num_ch_enc: [usize; 5],
}

impl DepthDecoderNet {
    /// Load the decoder.
    ///
    /// # Arguments
    ///
    /// * `num_ch_enc` - Channels of the encoder levels.
    /// * `scales` - The scales with a disparity head, each below 4.
    /// * `vb` - The variable builder holding the weights.
    pub fn new(num_ch_enc: [usize; 5], scales: &[usize], vb: VarBuilder) -> Result<Self, NnError> {
        let vb = vb.pp("decoder");

        let mut upconvs = Vec::with_capacity(5);
        for i in 0..5 {
            let in_0 = if i == 4 {
                num_ch_enc[4]
            } else {
                NUM_CH_DEC[i + 1]
            };
            let in_1 = if i > 0 {
                NUM_CH_DEC[i] + num_ch_enc[i - 1]
            } else {
                NUM_CH_DEC[i]
            };
            let base = 2 * (4 - i);
            upconvs.push([
                ConvBlock::new(in_0, NUM_CH_DEC[i], vb.pp(base.to_string()))?,
                ConvBlock::new(in_1, NUM_CH_DEC[i], vb.pp((base + 1).to_string()))?,
            ]);
        }

        let dispconvs = scales
            .iter()
            .map(|&s| {
                if s >= 4 {
                    return Err(NnError::MissingScale(s));
                }
                Ok((s, Conv3x3::new(NUM_CH_DEC[s], 1, vb.pp((10 + s).to_string()))?))
            })
            .collect::<Result<Vec<_>, NnError>>()?;

        Ok(Self {
            upconvs,
            dispconvs,
            num_ch_enc,
        })
    }

    /// Load a decoder for the ResNet encoders with the default scales.
    pub fn resnet(vb: VarBuilder) -> Result<Self, NnError> {
        Self::new(NUM_CH_ENC, &DEFAULT_SCALES, vb)
    }
}

impl DepthDecoder for DepthDecoderNet {
    fn infer(&self, features: &[Tensor]) -> Result<DisparityPyramid, NnError> {
        let channels = features
            .iter()
            .map(|f| f.dim(1))
            .collect::<candle_core::Result<Vec<_>>>()?;
        if channels != self.num_ch_enc {
            return Err(NnError::InvalidShape {
                name: "features",
                expected: format!("channels {:?}", self.num_ch_enc),
                actual: channels,
            });
        }

        let mut pyramid = DisparityPyramid::default();
        let mut x = features[4].clone();
        for i in (0..5).rev() {
            x = upsample2x(&self.upconvs[i][0].forward(&x)?)?;
            if i > 0 {
                x = Tensor::cat(&[&x, &features[i - 1]], 1)?;
            }
            x = self.upconvs[i][1].forward(&x)?;

            for (scale, conv) in &self.dispconvs {
                if *scale == i {
                    pyramid.insert(i, candle_nn::ops::sigmoid(&conv.forward(&x)?)?);
                }
            }
        }

        Ok(pyramid)
    }
}

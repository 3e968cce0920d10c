use candle_core::{DType, Module, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};
use manydepth_geometry::Mat4;
use serde::{Deserialize, Serialize};

use crate::bins::{compute_depth_bins, DepthBinRange, DepthBinning};
use crate::cost_volume::{CostVolume, FeatureMap, LookupFrame};
use crate::error::NnError;
use crate::layers::{max_pool_3x3_s2, normalize_image};
use crate::mode::DepthMode;
use crate::resnet::{ResnetDepth, ResnetLayer, Stem, NUM_CH_ENC};
use crate::traits::{MatchingEncoder, MatchingInput, MatchingOutput};

/// Hyper-parameters of the cost volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// number of depth hypotheses
    pub num_depth_bins: usize,
    /// spacing of the hypotheses
    pub depth_binning: DepthBinning,
    /// whether the bins follow the depth range of every request
    pub adaptive_bins: bool,
    /// whether missing costs are replaced by the pixel maximum
    pub set_missing_to_max: bool,
    /// the backbone depth
    pub resnet: ResnetDepth,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            num_depth_bins: 96,
            depth_binning: DepthBinning::Linear,
            adaptive_bins: true,
            set_missing_to_max: true,
            resnet: ResnetDepth::Resnet18,
        }
    }
}

/// ResNet encoder fusing a plane-sweep cost volume after its first stage.
///
/// The target and lookup images go through the shared stem and first stage, the
/// features are matched over the depth hypotheses at 1/4 of the input resolution, and
/// the confidence-masked volume is concatenated to the target features before the
/// deeper stages.
#[derive(Debug, Clone)]
pub struct ResnetEncoderMatching {
    stem: Stem,
    layer1: ResnetLayer,
    reduce_conv: Conv2d,
    deep_layers: [ResnetLayer; 3],
    config: MatchingConfig,
    depth_bins: Vec<f32>,
}

impl ResnetEncoderMatching {
    /// Load the encoder.
    ///
    /// # Arguments
    ///
    /// * `config` - The cost volume hyper-parameters.
    /// * `depth_range` - The range of the fixed bins used when bins are not adaptive.
    /// * `vb` - The variable builder holding the weights.
    pub fn new(
        config: MatchingConfig,
        depth_range: DepthBinRange,
        vb: VarBuilder,
    ) -> Result<Self, NnError> {
        let depth_bins =
            compute_depth_bins(depth_range, config.num_depth_bins, config.depth_binning)?;

        let stem = Stem::new(3, vb.pp("layer0.0"), vb.pp("layer0.1"))?;
        let layer1 = ResnetLayer::stage(config.resnet, 1, vb.pp("layer1.1"))?;
        let reduce_conv = conv2d(
            NUM_CH_ENC[1] + config.num_depth_bins,
            NUM_CH_ENC[1],
            3,
            Conv2dConfig {
                padding: 1,
                ..Default::default()
            },
            vb.pp("reduce_conv.0"),
        )?;
        let deep_layers = [
            ResnetLayer::stage(config.resnet, 2, vb.pp("layer2"))?,
            ResnetLayer::stage(config.resnet, 3, vb.pp("layer3"))?,
            ResnetLayer::stage(config.resnet, 4, vb.pp("layer4"))?,
        ];

        Ok(Self {
            stem,
            layer1,
            reduce_conv,
            deep_layers,
            config,
            depth_bins,
        })
    }

    /// The cost volume hyper-parameters.
    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    fn features(&self, images: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
        let f0 = self.stem.forward(&normalize_image(images)?)?;
        let f1 = self.layer1.forward(&max_pool_3x3_s2(&f0)?)?;
        Ok((f0, f1))
    }

    fn depth_bins_for(&self, range: DepthBinRange) -> Result<Vec<f32>, NnError> {
        if self.config.adaptive_bins {
            compute_depth_bins(
                range,
                self.config.num_depth_bins,
                self.config.depth_binning,
            )
        } else {
            Ok(self.depth_bins.clone())
        }
    }

    fn cost_volumes(
        &self,
        input: &MatchingInput<'_>,
        current: &Tensor,
        depth_bins: &[f32],
    ) -> Result<Vec<CostVolume>, NnError> {
        let (batch, channels, height, width) = current.dims4()?;
        let plane = channels * height * width;

        let current_host = current.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;

        let k = batched_mat4(input.k, "K", batch)?;
        let inv_k = batched_mat4(input.inv_k, "inv_K", batch)?;

        let (lookup_host, poses, num_frames) = match input.mode {
            DepthMode::Mono => (Vec::new(), Vec::new(), 0),
            DepthMode::Multi => {
                let (b, f, c, h, w) = input.lookup_images.dims5()?;
                let (_, current_c, current_h, current_w) = input.current_image.dims4()?;
                if (b, c, h, w) != (batch, current_c, current_h, current_w) {
                    return Err(NnError::InvalidShape {
                        name: "lookup_images",
                        expected: format!("[{batch}, F, {current_c}, {current_h}, {current_w}]"),
                        actual: input.lookup_images.dims().to_vec(),
                    });
                }
                let poses = batched_mat4(&input.poses.reshape((b * f, 4, 4))?, "poses", b * f)?;
                let lookups = input.lookup_images.reshape((b * f, c, h, w))?;
                let (_, lookup_feats) = self.features(&lookups)?;
                let lookup_host = lookup_feats
                    .to_dtype(DType::F32)?
                    .flatten_all()?
                    .to_vec1::<f32>()?;
                (lookup_host, poses, f)
            }
        };

        (0..batch)
            .map(|b| {
                let current_data = &current_host[b * plane..(b + 1) * plane];
                let current = feature_map(current_data, channels, height, width)?;
                let lookups = (0..num_frames)
                    .map(|f| {
                        let i = b * num_frames + f;
                        let lookup_data = &lookup_host[i * plane..(i + 1) * plane];
                        Ok(LookupFrame {
                            features: feature_map(lookup_data, channels, height, width)?,
                            pose: poses[i],
                        })
                    })
                    .collect::<Result<Vec<_>, NnError>>()?;

                Ok(CostVolume::build(
                    current,
                    &lookups,
                    &k[b],
                    &inv_k[b],
                    depth_bins,
                    self.config.set_missing_to_max,
                ))
            })
            .collect()
    }
}

fn feature_map(
    data: &[f32],
    channels: usize,
    height: usize,
    width: usize,
) -> Result<FeatureMap<'_>, NnError> {
    FeatureMap::new(data, channels, height, width).ok_or_else(|| NnError::InvalidShape {
        name: "features",
        expected: format!("[{channels}, {height}, {width}]"),
        actual: vec![data.len()],
    })
}

// [N, 4, 4] row-major tensor to N matrices
fn batched_mat4(t: &Tensor, name: &'static str, n: usize) -> Result<Vec<Mat4>, NnError> {
    if t.dims() != [n, 4, 4] {
        return Err(NnError::InvalidShape {
            name,
            expected: format!("[{n}, 4, 4]"),
            actual: t.dims().to_vec(),
        });
    }
    let data = t.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
    Ok(data
        .chunks_exact(16)
        .map(|rows| Mat4::from_cols_slice(rows).transpose())
        .collect())
}

impl MatchingEncoder for ResnetEncoderMatching {
    fn infer(&self, input: &MatchingInput<'_>) -> Result<MatchingOutput, NnError> {
        let depth_bins = self.depth_bins_for(input.depth_range)?;

        let (f0, f1) = self.features(input.current_image)?;
        let (batch, _, height, width) = f1.dims4()?;
        let device = f1.device().clone();

        let volumes = self.cost_volumes(input, &f1, &depth_bins)?;

        let mut masked = Vec::with_capacity(batch * depth_bins.len() * height * width);
        let mut lowest_cost = Vec::with_capacity(batch * height * width);
        let mut confidence = Vec::with_capacity(batch * height * width);
        for volume in &volumes {
            let mask = volume.confidence_mask();
            masked.extend(volume.masked(&mask));
            lowest_cost.extend(volume.lowest_cost_disparity(&depth_bins));
            confidence.extend(mask);
        }

        let cost_volume =
            Tensor::from_vec(masked, (batch, depth_bins.len(), height, width), &device)?
                .to_dtype(f1.dtype())?;

        let post = self
            .reduce_conv
            .forward(&Tensor::cat(&[&f1, &cost_volume], 1)?)?
            .relu()?;

        let f2 = self.deep_layers[0].forward(&post)?;
        let f3 = self.deep_layers[1].forward(&f2)?;
        let f4 = self.deep_layers[2].forward(&f3)?;

        Ok(MatchingOutput {
            features: vec![f0, f1, f2, f3, f4],
            lowest_cost: Tensor::from_vec(lowest_cost, (batch, height, width), &device)?,
            confidence_mask: Tensor::from_vec(confidence, (batch, height, width), &device)?,
        })
    }
}

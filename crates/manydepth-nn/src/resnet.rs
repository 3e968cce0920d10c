use candle_core::{Module, ModuleT, Result, Tensor};
use candle_nn::{batch_norm, conv2d_no_bias, BatchNorm, Conv2d, Conv2dConfig, VarBuilder};
use serde::{Deserialize, Serialize};

use crate::error::NnError;
use crate::layers::{max_pool_3x3_s2, normalize_image};
use crate::traits::PoseEncoder;

const BN_EPS: f64 = 1e-5;

/// Channels of the five feature levels of a basic-block ResNet.
pub const NUM_CH_ENC: [usize; 5] = [64, 64, 128, 256, 512];

/// The supported ResNet depths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResnetDepth {
    /// ResNet-18
    #[default]
    #[serde(rename = "18")]
    Resnet18,
    /// ResNet-34
    #[serde(rename = "34")]
    Resnet34,
}

impl ResnetDepth {
    /// Number of basic blocks in each of the four stages.
    pub fn blocks(&self) -> [usize; 4] {
        match self {
            ResnetDepth::Resnet18 => [2, 2, 2, 2],
            ResnetDepth::Resnet34 => [3, 4, 6, 3],
        }
    }
}

fn conv_bn(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    config: Conv2dConfig,
    vb_conv: VarBuilder,
    vb_bn: VarBuilder,
) -> Result<(Conv2d, BatchNorm)> {
    let conv = conv2d_no_bias(in_channels, out_channels, kernel_size, config, vb_conv)?;
    let bn = batch_norm(out_channels, BN_EPS, vb_bn)?;
    Ok((conv, bn))
}

/// The ResNet stem: 7x7 stride 2 convolution, batch norm and ReLU.
#[derive(Debug, Clone)]
pub struct Stem {
    conv1: Conv2d,
    bn1: BatchNorm,
}

impl Stem {
    /// Load the stem from the given convolution and batch norm prefixes.
    pub fn new(in_channels: usize, vb_conv: VarBuilder, vb_bn: VarBuilder) -> Result<Self> {
        let config = Conv2dConfig {
            padding: 3,
            stride: 2,
            ..Default::default()
        };
        let (conv1, bn1) = conv_bn(in_channels, NUM_CH_ENC[0], 7, config, vb_conv, vb_bn)?;
        Ok(Self { conv1, bn1 })
    }
}

impl Module for Stem {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.bn1.forward_t(&self.conv1.forward(x)?, false)?.relu()
    }
}

/// A ResNet basic block with an optional projection shortcut.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    conv1: Conv2d,
    bn1: BatchNorm,
    conv2: Conv2d,
    bn2: BatchNorm,
    downsample: Option<(Conv2d, BatchNorm)>,
}

impl BasicBlock {
    /// Load a block, the shortcut is projected when the shape changes.
    pub fn new(in_planes: usize, planes: usize, stride: usize, vb: VarBuilder) -> Result<Self> {
        let config = Conv2dConfig {
            padding: 1,
            stride,
            ..Default::default()
        };
        let (conv1, bn1) = conv_bn(in_planes, planes, 3, config, vb.pp("conv1"), vb.pp("bn1"))?;

        let config = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let (conv2, bn2) = conv_bn(planes, planes, 3, config, vb.pp("conv2"), vb.pp("bn2"))?;

        let downsample = if stride != 1 || in_planes != planes {
            let config = Conv2dConfig {
                stride,
                ..Default::default()
            };
            Some(conv_bn(
                in_planes,
                planes,
                1,
                config,
                vb.pp("downsample.0"),
                vb.pp("downsample.1"),
            )?)
        } else {
            None
        };

        Ok(Self {
            conv1,
            bn1,
            conv2,
            bn2,
            downsample,
        })
    }
}

impl Module for BasicBlock {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let out = self.bn1.forward_t(&self.conv1.forward(x)?, false)?.relu()?;
        let out = self.bn2.forward_t(&self.conv2.forward(&out)?, false)?;

        let identity = match &self.downsample {
            Some((conv, bn)) => bn.forward_t(&conv.forward(x)?, false)?,
            None => x.clone(),
        };

        (out + identity)?.relu()
    }
}

/// A stage of basic blocks, the first one carrying the stride.
#[derive(Debug, Clone)]
pub struct ResnetLayer {
    blocks: Vec<BasicBlock>,
}

impl ResnetLayer {
    /// Load `num_blocks` blocks named `0..num_blocks` under `vb`.
    pub fn new(
        in_planes: usize,
        planes: usize,
        num_blocks: usize,
        stride: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let blocks = (0..num_blocks)
            .map(|i| {
                let (in_planes, stride) = if i == 0 {
                    (in_planes, stride)
                } else {
                    (planes, 1)
                };
                BasicBlock::new(in_planes, planes, stride, vb.pp(i.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { blocks })
    }

    /// Load stage `index` (1 to 4) of a ResNet of the given depth.
    pub fn stage(depth: ResnetDepth, index: usize, vb: VarBuilder) -> Result<Self> {
        if !(1..=4).contains(&index) {
            candle_core::bail!("ResNet stage index must be in 1..=4, got {index}")
        }
        let stride = if index == 1 { 1 } else { 2 };
        Self::new(
            NUM_CH_ENC[index - 1],
            NUM_CH_ENC[index],
            depth.blocks()[index - 1],
            stride,
            vb,
        )
    }
}

impl Module for ResnetLayer {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.blocks.iter().try_fold(x.clone(), |x, block| block.forward(&x))
    }
}

/// A ResNet encoder over channel-concatenated input images.
///
/// Weights follow the torchvision layout under the `encoder` prefix, with the stem
/// widened to `3 * num_input_images` input channels.
#[derive(Debug, Clone)]
pub struct ResnetEncoder {
    stem: Stem,
    layers: [ResnetLayer; 4],
}

impl ResnetEncoder {
    /// Load the encoder from the tensors under `vb`.
    pub fn new(depth: ResnetDepth, num_input_images: usize, vb: VarBuilder) -> Result<Self> {
        let vb = vb.pp("encoder");
        let stem = Stem::new(3 * num_input_images, vb.pp("conv1"), vb.pp("bn1"))?;
        let layers = [
            ResnetLayer::stage(depth, 1, vb.pp("layer1"))?,
            ResnetLayer::stage(depth, 2, vb.pp("layer2"))?,
            ResnetLayer::stage(depth, 3, vb.pp("layer3"))?,
            ResnetLayer::stage(depth, 4, vb.pp("layer4"))?,
        ];
        Ok(Self { stem, layers })
    }

    /// Compute the five feature levels of `[0, 1]` images.
    pub fn forward_features(&self, x: &Tensor) -> Result<Vec<Tensor>> {
        let mut features = Vec::with_capacity(5);
        features.push(self.stem.forward(&normalize_image(x)?)?);
        features.push(self.layers[0].forward(&max_pool_3x3_s2(&features[0])?)?);
        for layer in &self.layers[1..] {
            let next = layer.forward(&features[features.len() - 1])?;
            features.push(next);
        }
        Ok(features)
    }
}

impl PoseEncoder for ResnetEncoder {
    fn infer(&self, image_pair: &Tensor) -> std::result::Result<Vec<Tensor>, NnError> {
        let (_, c, _, _) = image_pair.dims4()?;
        if c != 6 {
            return Err(NnError::InvalidShape {
                name: "image_pair",
                expected: "[B, 6, H, W]".to_string(),
                actual: image_pair.dims().to_vec(),
            });
        }
        Ok(self.forward_features(image_pair)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn basic_block_shapes() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);

        let block = BasicBlock::new(64, 128, 2, vb.pp("block"))?;
        let x = Tensor::rand(0f32, 1., (1, 64, 8, 12), &Device::Cpu)?;
        let y = block.forward(&x)?;
        assert_eq!(y.dims(), &[1, 128, 4, 6]);

        // the output goes through a ReLU
        assert!(y.flatten_all()?.min(0)?.to_scalar::<f32>()? >= 0.0);
        Ok(())
    }

    #[test]
    fn downsample_only_when_needed() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);

        let _ = ResnetLayer::stage(ResnetDepth::Resnet18, 1, vb.pp("layer1"))?;
        let _ = ResnetLayer::stage(ResnetDepth::Resnet18, 2, vb.pp("layer2"))?;

        let names = varmap.data().lock().unwrap().keys().cloned().collect::<Vec<_>>();
        assert!(!names.iter().any(|n| n.starts_with("layer1") && n.contains("downsample")));
        assert!(names.contains(&"layer2.0.downsample.0.weight".to_string()));
        assert!(names.contains(&"layer2.0.downsample.1.running_var".to_string()));
        assert!(!names.iter().any(|n| n.starts_with("layer2.1.downsample")));
        Ok(())
    }

    #[test]
    fn resnet34_stage_depths() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);

        let layer3 = ResnetLayer::stage(ResnetDepth::Resnet34, 3, vb.pp("layer3"))?;
        assert_eq!(layer3.blocks.len(), 6);
        assert!(ResnetLayer::stage(ResnetDepth::Resnet34, 5, vb.pp("layer5")).is_err());
        Ok(())
    }

    #[test]
    fn pose_encoder_pyramid() -> std::result::Result<(), NnError> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let encoder = ResnetEncoder::new(ResnetDepth::Resnet18, 2, vb)?;

        let pair = Tensor::rand(0f32, 1., (2, 6, 64, 128), &Device::Cpu)?;
        let features = encoder.infer(&pair)?;

        let dims = features.iter().map(|f| f.dims().to_vec()).collect::<Vec<_>>();
        assert_eq!(
            dims,
            vec![
                vec![2, 64, 32, 64],
                vec![2, 64, 16, 32],
                vec![2, 128, 8, 16],
                vec![2, 256, 4, 8],
                vec![2, 512, 2, 4],
            ]
        );

        let stem = varmap.data().lock().unwrap()["encoder.conv1.weight"].as_tensor().clone();
        assert_eq!(stem.dims(), &[64, 6, 7, 7]);
        Ok(())
    }

    #[test]
    fn pose_encoder_rejects_single_image() -> std::result::Result<(), NnError> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let encoder = ResnetEncoder::new(ResnetDepth::Resnet18, 2, vb)?;

        let image = Tensor::rand(0f32, 1., (1, 3, 64, 128), &Device::Cpu)?;
        assert!(matches!(
            encoder.infer(&image),
            Err(NnError::InvalidShape { .. })
        ));
        Ok(())
    }
}

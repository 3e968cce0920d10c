use candle_core::{Module, Result, Tensor, D};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};

/// Mean subtracted from `[0, 1]` images before the ResNet stem.
pub const IMAGE_MEAN: f64 = 0.45;

/// Standard deviation the `[0, 1]` images are divided by before the ResNet stem.
pub const IMAGE_STD: f64 = 0.225;

/// Normalize `[0, 1]` images for the ResNet stem.
pub fn normalize_image(x: &Tensor) -> Result<Tensor> {
    x.affine(1.0 / IMAGE_STD, -IMAGE_MEAN / IMAGE_STD)
}

/// Pad the two spatial dimensions by one pixel, mirroring without repeating the edge.
pub fn reflection_pad1(x: &Tensor) -> Result<Tensor> {
    let (_, _, h, w) = x.dims4()?;
    if h < 2 || w < 2 {
        candle_core::bail!("reflection padding needs at least 2x2 inputs, got {h}x{w}")
    }
    let x = Tensor::cat(&[x.narrow(2, 1, 1)?, x.clone(), x.narrow(2, h - 2, 1)?], 2)?;
    Tensor::cat(&[x.narrow(3, 1, 1)?, x.clone(), x.narrow(3, w - 2, 1)?], 3)
}

/// 3x3 max pooling with stride 2 and one pixel of padding.
///
/// The input must be non-negative, which holds after a ReLU, so that the zero padding
/// never wins the maximum.
pub fn max_pool_3x3_s2(x: &Tensor) -> Result<Tensor> {
    x.pad_with_zeros(D::Minus2, 1, 1)?
        .pad_with_zeros(D::Minus1, 1, 1)?
        .max_pool2d_with_stride(3, 2)
}

/// Nearest neighbour upsampling by a factor of two.
pub fn upsample2x(x: &Tensor) -> Result<Tensor> {
    let (_, _, h, w) = x.dims4()?;
    x.upsample_nearest2d(h * 2, w * 2)
}

/// A 3x3 convolution with reflection padding.
#[derive(Debug, Clone)]
pub struct Conv3x3 {
    conv: Conv2d,
}

impl Conv3x3 {
    /// Load the convolution from `conv.weight` and `conv.bias`.
    pub fn new(in_channels: usize, out_channels: usize, vb: VarBuilder) -> Result<Self> {
        let conv = conv2d(
            in_channels,
            out_channels,
            3,
            Conv2dConfig::default(),
            vb.pp("conv"),
        )?;
        Ok(Self { conv })
    }
}

impl Module for Conv3x3 {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.conv.forward(&reflection_pad1(x)?)
    }
}

/// A [`Conv3x3`] followed by an ELU.
#[derive(Debug, Clone)]
pub struct ConvBlock {
    conv: Conv3x3,
}

impl ConvBlock {
    /// Load the block, the convolution lives under `conv`.
    pub fn new(in_channels: usize, out_channels: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            conv: Conv3x3::new(in_channels, out_channels, vb.pp("conv"))?,
        })
    }
}

impl Module for ConvBlock {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.conv.forward(x)?.elu(1.0)
    }
}

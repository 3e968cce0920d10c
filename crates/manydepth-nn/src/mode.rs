use candle_core::Tensor;

/// Whether the reference frame takes part in the prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DepthMode {
    /// Use the reference frame to build the matching cost volume.
    #[default]
    Multi,
    /// Ignore the reference frame and predict from the target frame alone.
    Mono,
}

impl DepthMode {
    /// Prepare the pose and the reference image for the matching encoder.
    ///
    /// In [`DepthMode::Mono`] both tensors are multiplied by zero, which yields tensors
    /// of identical shape filled with exact zeros. Encoders recognise an all-zero pose
    /// and skip the frame, so the zeroed inputs behave the same as passing the mode
    /// explicitly. [`DepthMode::Multi`] passes both through unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use candle_core::{Device, Tensor};
    /// use manydepth_nn::DepthMode;
    ///
    /// let pose = Tensor::ones((1, 4, 4), candle_core::DType::F32, &Device::Cpu).unwrap();
    /// let image = Tensor::ones((1, 3, 8, 8), candle_core::DType::F32, &Device::Cpu).unwrap();
    ///
    /// let (pose, image) = DepthMode::Mono.apply(&pose, &image).unwrap();
    /// assert_eq!(pose.sum_all().unwrap().to_scalar::<f32>().unwrap(), 0.0);
    /// assert_eq!(image.dims(), &[1, 3, 8, 8]);
    /// ```
    pub fn apply(
        &self,
        pose: &Tensor,
        reference: &Tensor,
    ) -> candle_core::Result<(Tensor, Tensor)> {
        match self {
            DepthMode::Multi => Ok((pose.clone(), reference.clone())),
            DepthMode::Mono => Ok((pose.affine(0.0, 0.0)?, reference.affine(0.0, 0.0)?)),
        }
    }
}

impl std::fmt::Display for DepthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepthMode::Multi => write!(f, "multi"),
            DepthMode::Mono => write!(f, "mono"),
        }
    }
}

impl std::str::FromStr for DepthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multi" => Ok(DepthMode::Multi),
            "mono" => Ok(DepthMode::Mono),
            other => Err(format!("unknown mode '{other}', expected 'multi' or 'mono'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn multi_is_passthrough() -> candle_core::Result<()> {
        let pose = Tensor::arange(0f32, 16., &Device::Cpu)?.reshape((1, 4, 4))?;
        let image = Tensor::rand(0f32, 1., (1, 3, 4, 4), &Device::Cpu)?;

        let (p, i) = DepthMode::Multi.apply(&pose, &image)?;
        assert_eq!(p.to_vec3::<f32>()?, pose.to_vec3::<f32>()?);
        assert_eq!(
            i.flatten_all()?.to_vec1::<f32>()?,
            image.flatten_all()?.to_vec1::<f32>()?
        );
        Ok(())
    }

    #[test]
    fn mono_yields_exact_zeros() -> candle_core::Result<()> {
        let pose = Tensor::new(&[[[-1.5f32, 2.0], [0.25, -1e6]]], &Device::Cpu)?;
        let image = Tensor::rand(-1f32, 1., (1, 3, 5, 7), &Device::Cpu)?;

        let (p, i) = DepthMode::Mono.apply(&pose, &image)?;
        assert_eq!(p.dims(), pose.dims());
        assert_eq!(i.dims(), image.dims());
        assert_eq!(p.dtype(), DType::F32);
        assert!(p.flatten_all()?.to_vec1::<f32>()?.iter().all(|v| *v == 0.0));
        assert!(i.flatten_all()?.to_vec1::<f32>()?.iter().all(|v| *v == 0.0));
        Ok(())
    }

    #[test]
    fn parse_mode() {
        assert_eq!("multi".parse::<DepthMode>(), Ok(DepthMode::Multi));
        assert_eq!("mono".parse::<DepthMode>(), Ok(DepthMode::Mono));
        assert!("stereo".parse::<DepthMode>().is_err());
        assert_eq!(DepthMode::Mono.to_string(), "mono");
    }
}

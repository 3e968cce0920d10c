use std::path::Path;

use candle_core::{DType, Tensor};
use manydepth_geometry::camera::is_standard_form;
use manydepth_geometry::linalg::pseudo_inverse;
use manydepth_image::ImageSize;

use crate::context::ExecutionContext;
use crate::error::ManyDepthError;

/// Ratio between the network input and the cost volume resolution.
pub const MATCHING_DOWNSCALE: usize = 4;

/// Camera intrinsics at the cost volume resolution and their pseudo-inverse.
#[derive(Debug, Clone)]
pub struct Intrinsics {
    k: [[f64; 4]; 4],
    inv_k: [[f64; 4]; 4],
    matching_size: ImageSize,
    k_tensor: Tensor,
    inv_k_tensor: Tensor,
}

impl Intrinsics {
    /// Adapt a normalized 3x3 camera matrix to the cost volume resolution.
    ///
    /// The matrix is embedded in a 4x4 identity, its first row is scaled by
    /// `floor(width / 4)` and its second row by `floor(height / 4)`. The inverse is the
    /// Moore-Penrose pseudo-inverse.
    ///
    /// # Arguments
    ///
    /// * `normalized` - The row-major intrinsics normalized by the image size.
    /// * `input_size` - The network input resolution.
    /// * `ctx` - The execution context.
    pub fn from_normalized(
        normalized: &[[f64; 3]; 3],
        input_size: ImageSize,
        ctx: &ExecutionContext,
    ) -> Result<Self, ManyDepthError> {
        let matching_size = input_size.downscaled(MATCHING_DOWNSCALE);

        let mut k = [[0.0; 4]; 4];
        for (i, row) in k.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        for (dst, src) in k.iter_mut().zip(normalized.iter()) {
            dst[..3].copy_from_slice(src);
        }
        k[0].iter_mut().for_each(|v| *v *= matching_size.width as f64);
        k[1].iter_mut().for_each(|v| *v *= matching_size.height as f64);

        if !is_standard_form(&k) {
            log::warn!("intrinsics are not in standard pinhole form: {:?}", k);
        }

        let inv_k = pseudo_inverse(&k)?;

        let to_tensor = |m: &[[f64; 4]; 4]| -> Result<Tensor, ManyDepthError> {
            Ok(Tensor::new(m, ctx.device())?
                .to_dtype(DType::F32)?
                .unsqueeze(0)?)
        };

        Ok(Self {
            k_tensor: to_tensor(&k)?,
            inv_k_tensor: to_tensor(&inv_k)?,
            k,
            inv_k,
            matching_size,
        })
    }

    /// The row-major intrinsics at the cost volume resolution.
    pub fn k(&self) -> &[[f64; 4]; 4] {
        &self.k
    }

    /// The row-major pseudo-inverse of [`Intrinsics::k`].
    pub fn inv_k(&self) -> &[[f64; 4]; 4] {
        &self.inv_k
    }

    /// The cost volume resolution the intrinsics are scaled to.
    pub fn matching_size(&self) -> ImageSize {
        self.matching_size
    }

    /// `[1, 4, 4]` tensor of the intrinsics.
    pub fn k_tensor(&self) -> &Tensor {
        &self.k_tensor
    }

    /// `[1, 4, 4]` tensor of the pseudo-inverse.
    pub fn inv_k_tensor(&self) -> &Tensor {
        &self.inv_k_tensor
    }
}

/// Parse a JSON encoded 3x3 array of numbers.
pub fn parse_intrinsics_json(text: &str) -> Result<[[f64; 3]; 3], ManyDepthError> {
    serde_json::from_str(text).map_err(|e| ManyDepthError::MalformedIntrinsics(e.to_string()))
}

/// Read normalized intrinsics from a JSON file and adapt them to the input size.
///
/// # Errors
///
/// Returns [`ManyDepthError::MalformedIntrinsics`] if the file cannot be read or is not
/// a 3x3 numeric array.
pub fn load_and_preprocess_intrinsics(
    path: impl AsRef<Path>,
    input_size: ImageSize,
    ctx: &ExecutionContext,
) -> Result<Intrinsics, ManyDepthError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        ManyDepthError::MalformedIntrinsics(format!("cannot read {}: {e}", path.display()))
    })?;
    let normalized = parse_intrinsics_json(&text)?;
    Intrinsics::from_normalized(&normalized, input_size, ctx)
}

use serde::{Deserialize, Serialize};

use crate::error::NnError;

/// Spacing of the depth hypotheses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthBinning {
    /// Bins evenly spaced in depth.
    #[default]
    Linear,
    /// Bins evenly spaced in inverse depth.
    Inverse,
}

/// The closed depth interval swept by the cost volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBinRange {
    /// nearest depth hypothesis
    pub min_depth_bin: f32,
    /// farthest depth hypothesis
    pub max_depth_bin: f32,
}

impl DepthBinRange {
    /// Create a depth range, checking that `0 < min < max`.
    pub fn new(min_depth_bin: f32, max_depth_bin: f32) -> Result<Self, NnError> {
        let valid = min_depth_bin.is_finite()
            && max_depth_bin.is_finite()
            && min_depth_bin > 0.0
            && min_depth_bin < max_depth_bin;

        if !valid {
            return Err(NnError::InvalidDepthRange(min_depth_bin, max_depth_bin));
        }

        Ok(Self {
            min_depth_bin,
            max_depth_bin,
        })
    }
}

// evenly spaced samples with the last one pinned to `stop`
fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    if num == 1 {
        return vec![start];
    }
    let step = (stop - start) / (num - 1) as f64;
    let mut values = (0..num).map(|i| start + i as f64 * step).collect::<Vec<_>>();
    values[num - 1] = stop;
    values
}

/// Compute the increasing sequence of depth hypotheses.
///
/// # Arguments
///
/// * `range` - The depth interval, its bounds are always the first and last bins.
/// * `num_bins` - The number of hypotheses.
/// * `binning` - The spacing of the hypotheses.
///
/// # Example
///
/// ```
/// use manydepth_nn::bins::{compute_depth_bins, DepthBinRange, DepthBinning};
///
/// let range = DepthBinRange::new(1.0, 4.0).unwrap();
/// let bins = compute_depth_bins(range, 4, DepthBinning::Linear).unwrap();
/// assert_eq!(bins, vec![1.0, 2.0, 3.0, 4.0]);
/// ```
pub fn compute_depth_bins(
    range: DepthBinRange,
    num_bins: usize,
    binning: DepthBinning,
) -> Result<Vec<f32>, NnError> {
    if num_bins == 0 {
        return Err(NnError::InvalidNumBins);
    }

    let (min, max) = (range.min_depth_bin as f64, range.max_depth_bin as f64);

    let bins = match binning {
        DepthBinning::Linear => linspace(min, max, num_bins),
        DepthBinning::Inverse => linspace(1.0 / max, 1.0 / min, num_bins)
            .into_iter()
            .rev()
            .map(|inv| 1.0 / inv)
            .collect(),
    };

    Ok(bins.into_iter().map(|b| b as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn linear_bins() -> Result<(), NnError> {
        let range = DepthBinRange::new(0.1, 20.0)?;
        let bins = compute_depth_bins(range, 96, DepthBinning::Linear)?;

        assert_eq!(bins.len(), 96);
        assert_eq!(bins[0], 0.1);
        assert_eq!(bins[95], 20.0);
        assert!(bins.windows(2).all(|w| w[0] < w[1]));

        let step = bins[1] - bins[0];
        for w in bins.windows(2) {
            assert_relative_eq!(w[1] - w[0], step, epsilon = 1e-4);
        }
        Ok(())
    }

    #[test]
    fn inverse_bins() -> Result<(), NnError> {
        let range = DepthBinRange::new(0.5, 10.0)?;
        let bins = compute_depth_bins(range, 5, DepthBinning::Inverse)?;

        assert_relative_eq!(bins[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(bins[4], 10.0, epsilon = 1e-5);
        assert!(bins.windows(2).all(|w| w[0] < w[1]));

        // evenly spaced in inverse depth
        let inv = bins.iter().map(|b| 1.0 / b).collect::<Vec<_>>();
        let step = inv[0] - inv[1];
        for w in inv.windows(2) {
            assert_relative_eq!(w[0] - w[1], step, epsilon = 1e-5);
        }
        Ok(())
    }

    #[test]
    fn single_bin() -> Result<(), NnError> {
        let range = DepthBinRange::new(2.0, 3.0)?;
        assert_eq!(compute_depth_bins(range, 1, DepthBinning::Linear)?, vec![2.0]);
        Ok(())
    }

    #[test]
    fn invalid_inputs() {
        assert!(matches!(
            DepthBinRange::new(0.0, 1.0),
            Err(NnError::InvalidDepthRange(..))
        ));
        assert!(matches!(
            DepthBinRange::new(2.0, 1.0),
            Err(NnError::InvalidDepthRange(..))
        ));
        assert!(matches!(
            DepthBinRange::new(1.0, f32::NAN),
            Err(NnError::InvalidDepthRange(..))
        ));

        let range = DepthBinRange {
            min_depth_bin: 1.0,
            max_depth_bin: 2.0,
        };
        assert!(matches!(
            compute_depth_bins(range, 0, DepthBinning::Linear),
            Err(NnError::InvalidNumBins)
        ));
    }
}

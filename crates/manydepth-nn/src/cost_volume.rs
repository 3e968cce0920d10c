use manydepth_geometry::camera::{backproject_pixel, project_point};
use manydepth_geometry::Mat4;
use rayon::prelude::*;

/// Pixels closer than this to the border do not take part in matching.
pub const BORDER_MARGIN: usize = 2;

const COUNT_EPS: f32 = 1e-7;

/// Cost assigned to empty hypotheses when searching the cheapest one.
const EMPTY_COST: f32 = 100.0;

/// A borrowed `C x H x W` feature map.
#[derive(Debug, Clone, Copy)]
pub struct FeatureMap<'a> {
    data: &'a [f32],
    channels: usize,
    height: usize,
    width: usize,
}

impl<'a> FeatureMap<'a> {
    /// Wrap a channel-first buffer, returns `None` if the length does not match.
    pub fn new(data: &'a [f32], channels: usize, height: usize, width: usize) -> Option<Self> {
        (data.len() == channels * height * width).then_some(Self {
            data,
            channels,
            height,
            width,
        })
    }

    /// The number of channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The height of the map.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The width of the map.
    pub fn width(&self) -> usize {
        self.width
    }

    fn at(&self, c: usize, y: usize, x: usize) -> f32 {
        self.data[(c * self.height + y) * self.width + x]
    }

    // bilinear sample with zero padding outside the map
    fn sample(&self, c: usize, u: f32, v: f32) -> f32 {
        let (x0, y0) = (u.floor(), v.floor());
        let (fx, fy) = (u - x0, v - y0);
        let (x0, y0) = (x0 as isize, y0 as isize);

        let mut value = 0.0;
        for (dy, wy) in [(0, 1.0 - fy), (1, fy)] {
            for (dx, wx) in [(0, 1.0 - fx), (1, fx)] {
                let (x, y) = (x0 + dx, y0 + dy);
                if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
                    value += wx * wy * self.at(c, y as usize, x as usize);
                }
            }
        }
        value
    }
}

/// A reference frame taking part in the cost volume.
#[derive(Debug, Clone, Copy)]
pub struct LookupFrame<'a> {
    /// The features of the reference frame.
    pub features: FeatureMap<'a>,
    /// Transform from the current camera to the reference camera.
    pub pose: Mat4,
}

impl LookupFrame<'_> {
    /// An all-zero pose marks a frame to be ignored.
    pub fn is_disabled(&self) -> bool {
        self.pose.to_cols_array().iter().sum::<f32>() == 0.0
    }
}

/// Matching costs of the current frame against one or more lookup frames.
///
/// Costs are stored bin-major, `cost[d * h * w + y * w + x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CostVolume {
    num_bins: usize,
    height: usize,
    width: usize,
    cost: Vec<f32>,
    missing: Vec<bool>,
}

impl CostVolume {
    /// Sweep the depth hypotheses and accumulate the photometric feature error.
    ///
    /// For every bin the current pixels are back-projected at the bin depth, moved into
    /// each lookup camera and projected with `k`. The lookup features are sampled
    /// bilinearly at the projection and compared to the current features with the
    /// channel mean of the absolute difference. Pixels within [`BORDER_MARGIN`] of the
    /// border, and projections landing there, contribute nothing. Costs are averaged over
    /// the lookup frames that contributed a non-zero error. Frames with an all-zero pose
    /// are skipped.
    ///
    /// Entries left at zero are missing. With `set_missing_to_max` they are replaced by
    /// the largest cost of the pixel over all bins.
    ///
    /// # Arguments
    ///
    /// * `current` - The features of the current frame.
    /// * `lookups` - The reference frames, with the same shape as `current`.
    /// * `k` - Intrinsics at the feature resolution.
    /// * `inv_k` - Inverse intrinsics at the feature resolution.
    /// * `depth_bins` - The depth hypotheses.
    /// * `set_missing_to_max` - Whether to fill missing entries with the pixel maximum.
    pub fn build(
        current: FeatureMap<'_>,
        lookups: &[LookupFrame<'_>],
        k: &Mat4,
        inv_k: &Mat4,
        depth_bins: &[f32],
        set_missing_to_max: bool,
    ) -> Self {
        let (height, width) = (current.height, current.width);
        let plane = height * width;
        let num_bins = depth_bins.len();

        let mut cost = vec![0.0f32; num_bins * plane];
        let mut counts = vec![0u32; num_bins * plane];

        for lookup in lookups {
            if lookup.is_disabled() {
                continue;
            }
            let features = lookup.features;
            if features.channels != current.channels
                || features.height != height
                || features.width != width
            {
                log::warn!("skipping lookup frame with mismatched feature shape");
                continue;
            }

            let projection = *k * lookup.pose;
            let (max_u, max_v) = (
                width as f32 - BORDER_MARGIN as f32,
                height as f32 - BORDER_MARGIN as f32,
            );

            cost.par_chunks_exact_mut(plane)
                .zip(counts.par_chunks_exact_mut(plane))
                .zip(depth_bins.par_iter())
                .for_each(|((cost_plane, count_plane), &depth)| {
                    for y in BORDER_MARGIN..height.saturating_sub(BORDER_MARGIN) {
                        for x in BORDER_MARGIN..width.saturating_sub(BORDER_MARGIN) {
                            let point = backproject_pixel(inv_k, x as f32, y as f32, depth);
                            let uv = project_point(&projection, point);

                            let inside = uv.x >= BORDER_MARGIN as f32
                                && uv.x <= max_u
                                && uv.y >= BORDER_MARGIN as f32
                                && uv.y <= max_v;
                            if !inside {
                                continue;
                            }

                            let diff = (0..current.channels)
                                .map(|c| {
                                    (features.sample(c, uv.x, uv.y) - current.at(c, y, x)).abs()
                                })
                                .sum::<f32>()
                                / current.channels as f32;

                            let idx = y * width + x;
                            cost_plane[idx] += diff;
                            if diff > 0.0 {
                                count_plane[idx] += 1;
                            }
                        }
                    }
                });
        }

        cost.iter_mut()
            .zip(counts.iter())
            .for_each(|(c, &n)| *c /= n as f32 + COUNT_EPS);

        let missing = cost.iter().map(|&c| c == 0.0).collect::<Vec<_>>();

        let mut volume = Self {
            num_bins,
            height,
            width,
            cost,
            missing,
        };

        if set_missing_to_max {
            volume.fill_missing_with_max();
        }

        volume
    }

    fn fill_missing_with_max(&mut self) {
        let plane = self.height * self.width;
        for idx in 0..plane {
            let max = (0..self.num_bins)
                .map(|d| self.cost[d * plane + idx])
                .fold(f32::NEG_INFINITY, f32::max);
            for d in 0..self.num_bins {
                if self.missing[d * plane + idx] {
                    self.cost[d * plane + idx] = max;
                }
            }
        }
    }

    /// The number of depth bins.
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// The height of the volume.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The width of the volume.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The cost of a bin at a pixel.
    pub fn cost(&self, bin: usize, y: usize, x: usize) -> f32 {
        self.cost[(bin * self.height + y) * self.width + x]
    }

    /// The bin-major cost buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.cost
    }

    /// 1 where every bin of the pixel holds a measured, non-zero cost, 0 elsewhere.
    pub fn confidence_mask(&self) -> Vec<f32> {
        let plane = self.height * self.width;
        (0..plane)
            .map(|idx| {
                let valid = (0..self.num_bins).all(|d| {
                    let i = d * plane + idx;
                    !self.missing[i] && self.cost[i] > 0.0
                });
                if valid {
                    1.0
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Inverse depth of the cheapest bin per pixel.
    ///
    /// Zero costs count as [`EMPTY_COST`], ties go to the nearest bin.
    pub fn lowest_cost_disparity(&self, depth_bins: &[f32]) -> Vec<f32> {
        let plane = self.height * self.width;
        (0..plane)
            .map(|idx| {
                let mut best = (0, f32::INFINITY);
                for d in 0..self.num_bins {
                    let c = match self.cost[d * plane + idx] {
                        c if c == 0.0 => EMPTY_COST,
                        c => c,
                    };
                    if c < best.1 {
                        best = (d, c);
                    }
                }
                1.0 / depth_bins[best.0]
            })
            .collect()
    }

    /// Zero the costs of every pixel outside the confidence mask.
    pub fn masked(&self, confidence: &[f32]) -> Vec<f32> {
        let plane = self.height * self.width;
        self.cost
            .iter()
            .enumerate()
            .map(|(i, &c)| c * confidence[i % plane])
            .collect()
    }
}

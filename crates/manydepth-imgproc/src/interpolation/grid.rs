/// Maps a destination pixel index to its source coordinate without corner alignment.
///
/// Pixel centres are aligned, so a destination pixel `i` covers the source interval
/// centred on `(i + 0.5) * src_len / dst_len - 0.5`. Negative coordinates are clamped
/// to zero, the behaviour of linear resampling in most deep learning frameworks.
///
/// # Arguments
///
/// * `dst_index` - The index along the destination axis.
/// * `src_len` - The length of the source axis.
/// * `dst_len` - The length of the destination axis.
pub fn half_pixel_source_coordinate(dst_index: usize, src_len: usize, dst_len: usize) -> f32 {
    let scale = src_len as f32 / dst_len as f32;
    ((dst_index as f32 + 0.5) * scale - 0.5).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::half_pixel_source_coordinate;

    #[test]
    fn identity_mapping() {
        for i in 0..5 {
            assert_eq!(half_pixel_source_coordinate(i, 5, 5), i as f32);
        }
    }

    #[test]
    fn upsample_by_two() {
        assert_eq!(half_pixel_source_coordinate(0, 2, 4), 0.0);
        assert_eq!(half_pixel_source_coordinate(1, 2, 4), 0.25);
        assert_eq!(half_pixel_source_coordinate(2, 2, 4), 0.75);
        assert_eq!(half_pixel_source_coordinate(3, 2, 4), 1.25);
    }

    #[test]
    fn downsample_by_two() {
        assert_eq!(half_pixel_source_coordinate(0, 4, 2), 0.5);
        assert_eq!(half_pixel_source_coordinate(1, 4, 2), 2.5);
    }
}

use glam::{Mat4, Vec3};

use crate::so3::So3;

/// Convert an axis-angle rotation into a 4x4 homogeneous rotation matrix.
pub fn rotation_from_axis_angle(axis_angle: Vec3) -> Mat4 {
    Mat4::from_mat3(So3::exp(axis_angle).matrix())
}

/// Build the rigid transform predicted by a pose network.
///
/// The forward transform is `T(t) * R`. With `invert` set the exact inverse
/// `R^T * T(-t)` is returned instead, mapping points the other way between the two
/// frames.
///
/// # Arguments
///
/// * `axis_angle` - The rotation as an axis-angle vector.
/// * `translation` - The translation vector.
/// * `invert` - Whether to return the inverse transform.
///
/// # Example
///
/// ```
/// use manydepth_geometry::transforms::transformation_from_parameters;
/// use manydepth_geometry::{Mat4, Vec3};
///
/// let axis_angle = Vec3::new(0.0, 0.1, 0.0);
/// let translation = Vec3::new(0.0, 0.0, 0.5);
///
/// let forward = transformation_from_parameters(axis_angle, translation, false);
/// let inverse = transformation_from_parameters(axis_angle, translation, true);
///
/// assert!((forward * inverse).abs_diff_eq(Mat4::IDENTITY, 1e-6));
/// ```
pub fn transformation_from_parameters(axis_angle: Vec3, translation: Vec3, invert: bool) -> Mat4 {
    let rotation = rotation_from_axis_angle(axis_angle);

    if invert {
        rotation.transpose() * Mat4::from_translation(-translation)
    } else {
        Mat4::from_translation(translation) * rotation
    }
}

/// Convert a row-major 4x4 matrix in double precision to a [`Mat4`].
#[cfg(test)]
pub(crate) fn mat4_from_rows(rows: &[[f64; 4]; 4]) -> Mat4 {
    let cols = std::array::from_fn(|c| std::array::from_fn(|r| rows[r][c] as f32));
    Mat4::from_cols_array_2d(&cols)
}

/// Convert a [`Mat4`] to a row-major array.
pub fn mat4_to_rows(m: &Mat4) -> [[f32; 4]; 4] {
    m.transpose().to_cols_array_2d()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn identity_parameters() {
        let t = transformation_from_parameters(Vec3::ZERO, Vec3::ZERO, false);
        assert_eq!(t, Mat4::IDENTITY);
        let t = transformation_from_parameters(Vec3::ZERO, Vec3::ZERO, true);
        assert_eq!(t, Mat4::IDENTITY);
    }

    #[test]
    fn forward_rotates_then_translates() {
        let axis_angle = Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2);
        let translation = Vec3::new(1.0, 2.0, 3.0);
        let t = transformation_from_parameters(axis_angle, translation, false);

        let p = t * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!((p - Vec4::new(1.0, 3.0, 3.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn inverse_is_exact_inverse() {
        let axis_angle = Vec3::new(0.02, -0.01, 0.005);
        let translation = Vec3::new(0.01, 0.0, -0.3);

        let forward = transformation_from_parameters(axis_angle, translation, false);
        let inverse = transformation_from_parameters(axis_angle, translation, true);

        assert!((forward * inverse).abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert!((inverse * forward).abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert!(inverse.abs_diff_eq(forward.inverse(), 1e-6));
    }

    #[test]
    fn inverse_translation_column() {
        // pure translation: the inverse moves points back
        let t = transformation_from_parameters(Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0), true);
        assert_eq!(t.w_axis, Vec4::new(-0.5, 0.0, 0.0, 1.0));
    }

    #[test]
    fn rows_round_trip() {
        let rows = [
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
            [9.0, 10.0, 11.0, 12.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let m = mat4_from_rows(&rows);
        // glam stores columns, the last column holds the translation
        assert_eq!(m.w_axis, Vec4::new(4.0, 8.0, 12.0, 1.0));
        let back = mat4_to_rows(&m);
        for r in 0..4 {
            for c in 0..4 {
                assert_eq!(back[r][c] as f64, rows[r][c]);
            }
        }
    }
}

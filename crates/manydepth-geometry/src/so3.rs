use glam::{Mat3, Quat, Vec3};

/// A rotation in 3D stored as a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct So3 {
    /// The unit quaternion representing the rotation.
    pub q: Quat,
}

impl So3 {
    /// Lie algebra -> Lie group
    ///
    /// The direction of `v` is the rotation axis and its norm the angle in radians.
    pub fn exp(v: Vec3) -> Self {
        let theta = v.dot(v).sqrt();
        let theta_half = theta / 2.0;

        let (w, b) = if theta != 0.0 {
            (theta_half.cos(), theta_half.sin() / theta)
        } else {
            (1.0, 0.0)
        };
        let xyz = b * v;

        Self {
            q: Quat::from_xyzw(xyz.x, xyz.y, xyz.z, w),
        }
    }

    /// The rotation matrix.
    pub fn matrix(&self) -> Mat3 {
        Mat3::from_quat(self.q)
    }
}

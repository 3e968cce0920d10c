use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// Small constant added to the depth before the perspective division.
pub const PROJECTION_EPS: f32 = 1e-7;

/// Back-project a pixel to a homogeneous 3D point at the given depth.
///
/// Only the top-left 3x3 block of `inv_k` is used, the fourth row and column are
/// homogeneous padding.
///
/// # Arguments
///
/// * `inv_k` - The inverse intrinsics matrix.
/// * `u` - The pixel column.
/// * `v` - The pixel row.
/// * `depth` - The depth along the optical axis.
pub fn backproject_pixel(inv_k: &Mat4, u: f32, v: f32, depth: f32) -> Vec4 {
    let ray = Mat3::from_mat4(*inv_k) * Vec3::new(u, v, 1.0);
    (ray * depth).extend(1.0)
}

/// Project a homogeneous 3D point to pixel coordinates.
///
/// `projection` is the product `K * T` of the intrinsics and the camera pose; only
/// its first three rows take part in the projection.
pub fn project_point(projection: &Mat4, point: Vec4) -> Vec2 {
    let cam = *projection * point;
    Vec2::new(cam.x, cam.y) / (cam.z + PROJECTION_EPS)
}

/// Whether the top-left 3x3 block of a camera matrix is upper triangular with a
/// positive diagonal.
pub fn is_standard_form(k: &[[f64; 4]; 4]) -> bool {
    k[1][0] == 0.0
        && k[2][0] == 0.0
        && k[2][1] == 0.0
        && k[0][0] > 0.0
        && k[1][1] > 0.0
        && k[2][2] > 0.0
}

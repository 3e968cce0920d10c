#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! The rotation and pose conventions follow the monocular depth literature: a pose
//! network predicts an axis-angle vector and a translation, and
//! [`transforms::transformation_from_parameters`] turns them into a 4x4 matrix.

/// Pinhole back-projection and projection of points.
pub mod camera;

/// Error types for the geometry module.
pub mod error;

/// Dense linear algebra helpers.
pub mod linalg;

/// Special Orthogonal group SO(3) for 3D rotations.
pub mod so3;

/// Rigid body transforms built from network outputs.
pub mod transforms;

pub use crate::error::GeometryError;

// re-export the vector types used across the public api
pub use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

//! Mathematical type definitions.
//!
//! One place for the scalar and nalgebra aliases used throughout the
//! workspace.

use nalgebra::{Matrix3, Rotation3, Vector3};

/// Scalar type used throughout the pipeline (currently `f64`).
pub type Real = f64;

/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;

/// Exponential map from an axis-angle (so(3)) vector to a rotation
/// matrix.
///
/// The vector's norm is the rotation angle in radians and its
/// direction the rotation axis; the zero vector maps to the identity.
pub fn rotation_from_axis_angle(r: &Vec3) -> Mat3 {
    *Rotation3::from_scaled_axis(*r).matrix()
}

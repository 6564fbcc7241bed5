//! Camera models and solved shot poses.
//!
//! A [`CameraModel`] carries the per-camera intrinsics the kernel
//! needs (a single normalised focal length); a [`Shot`] is one solved
//! pose referencing a camera. Poses arrive as axis-angle rotation and
//! translation in the reconstruction's frame and are converted to the
//! `R` (world→camera) and `O = −Rᵀ·t` form the collinearity equations
//! consume.

use thiserror::Error;

use crate::math::{rotation_from_axis_angle, Mat3, Vec3};

/// Error for an unrecognised camera projection tag.
#[derive(Debug, Error)]
#[error("unrecognised projection type \"{0}\"")]
pub struct UnknownProjection(pub String);

/// Camera projection families recognised in reconstruction documents.
///
/// Only the focal length is consumed downstream; the tag decides
/// which field of the document supplies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Perspective,
    Brown,
    Fisheye,
    FisheyeOpencv,
    Fisheye62,
    Fisheye624,
    Radial,
    SimpleRadial,
    Dual,
    Spherical,
}

impl ProjectionType {
    /// Parse a reconstruction document tag. Unknown tags are a fatal
    /// loader error.
    pub fn parse(tag: &str) -> Result<Self, UnknownProjection> {
        match tag {
            "perspective" => Ok(Self::Perspective),
            "brown" => Ok(Self::Brown),
            "fisheye" => Ok(Self::Fisheye),
            "fisheye_opencv" => Ok(Self::FisheyeOpencv),
            "fisheye62" => Ok(Self::Fisheye62),
            "fisheye624" => Ok(Self::Fisheye624),
            "radial" => Ok(Self::Radial),
            "simple_radial" => Ok(Self::SimpleRadial),
            "dual" => Ok(Self::Dual),
            "spherical" => Ok(Self::Spherical),
            other => Err(UnknownProjection(other.to_string())),
        }
    }

    /// Whether this family stores its focal length in the `focal_x`
    /// field instead of `focal`.
    pub fn uses_focal_x(self) -> bool {
        matches!(
            self,
            Self::Brown | Self::Fisheye62 | Self::Fisheye624 | Self::Radial | Self::SimpleRadial
        )
    }
}

/// Per-camera intrinsics from the reconstruction document.
///
/// `focal` is normalised: the physical focal length divided by
/// `max(width, height)` of the model's sensor. Spherical cameras carry
/// focal 0 and are skipped by the kernel.
#[derive(Debug, Clone)]
pub struct CameraModel {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub focal: f64,
    pub projection: ProjectionType,
}

/// One solved camera pose associated with one source image.
#[derive(Debug, Clone)]
pub struct Shot {
    /// Image stem; doubles as the output file name.
    pub id: String,
    /// World→camera rotation.
    pub rotation: Mat3,
    /// Camera origin in world coordinates.
    pub origin: Vec3,
    /// Normalised focal length copied from the referenced camera.
    pub focal: f64,
}

impl Shot {
    /// Build a shot from the reconstruction's axis-angle rotation and
    /// translation: `R = exp(r)`, `O = −Rᵀ·t`.
    pub fn from_pose(id: String, focal: f64, rotation: &Vec3, translation: &Vec3) -> Self {
        let r = rotation_from_axis_angle(rotation);
        let origin = -(r.transpose() * translation);
        Self {
            id,
            rotation: r,
            origin,
            focal,
        }
    }
}

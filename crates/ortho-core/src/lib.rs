//! Core geometry and data model for the orthorectification pipeline.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec3`, `Mat3`),
//! - the affine geo-transform between raster indices and world
//!   coordinates ([`GeoTransform`]),
//! - the in-memory DEM tile ([`Dem`]) with its typed elevation buffer,
//! - the solved camera pose model ([`Shot`], [`CameraModel`]),
//! - the integer line rasteriser used by visibility tests.
//!
//! Everything here is I/O-free; loading rasters and reconstruction
//! documents lives in `ortho-pipeline`.

/// Linear algebra type aliases.
pub mod math;
/// Affine map between raster pixel indices and world coordinates.
pub mod transform;
/// In-memory DEM tile and elevation sample types.
pub mod dem;
/// Camera models and solved shot poses.
pub mod shot;
/// Integer Bresenham line traversal.
pub mod line;

pub use dem::*;
pub use line::*;
pub use math::*;
pub use shot::*;
pub use transform::*;

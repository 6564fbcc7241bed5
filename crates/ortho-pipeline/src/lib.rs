//! Orthorectification pipeline.
//!
//! This crate turns a photogrammetric reconstruction (solved camera
//! poses + undistorted images) and a DEM into one georeferenced
//! raster per image:
//!
//! - [`raster`]: interleaved multi-band raster buffer over GDAL,
//! - [`dem_io`]: DEM loading and metadata narration,
//! - [`reconstruction`]: OpenSfM document, coords offsets, image list,
//! - [`kernel`]: the per-shot orthorectification algorithm,
//! - [`scheduler`]: rayon fan-out across shots,
//! - [`driver`]: load-once / process-each / summarise glue.
//!
//! All fatal error kinds surface through [`PipelineError`] so tests
//! and callers can match on them instead of watching a process exit.

pub mod dem_io;
pub mod driver;
pub mod error;
pub mod kernel;
pub mod raster;
pub mod reconstruction;
pub mod scheduler;
pub mod util;

pub use driver::{run, RunConfig, RunSummary};
pub use error::PipelineError;
pub use kernel::{process_shot, Interpolation, KernelOptions, ShotOutcome};
pub use raster::{AnyRaster, Raster, RasterError, Sample};

//! The pipeline's single top-level failure type.
//!
//! Configuration errors are fatal before any shot runs; shot-level
//! errors are caught by the scheduler and reported without stopping
//! the other workers. Both travel as [`PipelineError`] so callers and
//! tests can match on the kind.

use std::path::PathBuf;

use thiserror::Error;

use crate::raster::RasterError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("dataset directory {0} does not exist")]
    DatasetNotFound(PathBuf),

    #[error("DEM file {0} does not exist")]
    DemNotFound(PathBuf),

    #[error("DEM band data type {0} is not supported (expected uint8, uint16 or float32)")]
    UnsupportedDemType(String),

    #[error("image list file {0} does not exist")]
    ImageListNotFound(PathBuf),

    #[error("coords file {0} does not exist")]
    CoordsNotFound(PathBuf),

    #[error("coords file {path}: {reason}")]
    CoordsMalformed { path: PathBuf, reason: String },

    #[error("reconstruction file {0} does not exist")]
    ReconstructionNotFound(PathBuf),

    #[error("no reconstructions found in {0}")]
    EmptyReconstruction(PathBuf),

    #[error("shot \"{shot}\" references unknown camera \"{camera}\"")]
    UnknownCamera { shot: String, camera: String },

    #[error("camera \"{camera}\": missing focal length field \"{field}\"")]
    MissingFocal { camera: String, field: &'static str },

    #[error(transparent)]
    UnknownProjection(#[from] ortho_core::UnknownProjection),

    #[error("interpolation method \"{0}\" is not supported (expected nearest or bilinear)")]
    UnknownInterpolation(String),

    #[error("invalid number of threads: {0}")]
    InvalidThreadCount(i64),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Dem(#[from] ortho_core::DemError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    /// Wrap an I/O error with a short human context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

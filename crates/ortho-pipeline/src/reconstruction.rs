//! Loaders for the photogrammetric dataset inputs.
//!
//! - `opensfm/reconstruction.json`: cameras and solved shot poses
//!   (only the first reconstruction of the document is used),
//! - `odm_georeferencing/coords.txt`: the DEM's world offsets,
//! - the optional image list of stems to process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use ortho_core::{CameraModel, ProjectionType, Shot, Vec3};

use crate::error::PipelineError;

#[derive(Debug, Deserialize)]
struct ReconstructionDoc {
    #[serde(default)]
    cameras: BTreeMap<String, CameraRecord>,
    #[serde(default)]
    shots: BTreeMap<String, ShotRecord>,
}

#[derive(Debug, Deserialize)]
struct CameraRecord {
    projection_type: Option<String>,
    focal: Option<f64>,
    focal_x: Option<f64>,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

#[derive(Debug, Deserialize)]
struct ShotRecord {
    camera: String,
    rotation: [f64; 3],
    translation: [f64; 3],
}

impl CameraRecord {
    fn into_model(self, id: String) -> Result<CameraModel, PipelineError> {
        let tag = self.projection_type.as_deref().unwrap_or("perspective");
        let projection = ProjectionType::parse(tag)?;

        let focal = if projection == ProjectionType::Spherical {
            0.0
        } else if projection.uses_focal_x() {
            self.focal_x.ok_or(PipelineError::MissingFocal {
                camera: id.clone(),
                field: "focal_x",
            })?
        } else {
            self.focal.ok_or(PipelineError::MissingFocal {
                camera: id.clone(),
                field: "focal",
            })?
        };

        Ok(CameraModel {
            id,
            width: self.width,
            height: self.height,
            focal,
            projection,
        })
    }
}

/// Load the shots of the first reconstruction in
/// `<dataset>/opensfm/reconstruction.json`.
///
/// Shot order follows the document's sorted shot ids, so repeated runs
/// schedule identically.
pub fn load_shots(dataset: &Path) -> Result<Vec<Shot>, PipelineError> {
    let path = dataset.join("opensfm").join("reconstruction.json");
    if !path.exists() {
        return Err(PipelineError::ReconstructionNotFound(path));
    }

    debug!("loading reconstruction from {}", path.display());

    let text = std::fs::read_to_string(&path)
        .map_err(|e| PipelineError::io(format!("reading {}", path.display()), e))?;
    let mut docs: Vec<ReconstructionDoc> =
        serde_json::from_str(&text).map_err(|source| PipelineError::Json {
            path: path.clone(),
            source,
        })?;

    if docs.is_empty() {
        return Err(PipelineError::EmptyReconstruction(path));
    }
    let doc = docs.swap_remove(0);

    let mut cameras: BTreeMap<String, CameraModel> = BTreeMap::new();
    for (id, record) in doc.cameras {
        let model = record.into_model(id.clone())?;
        cameras.insert(id, model);
    }

    let mut shots = Vec::with_capacity(doc.shots.len());
    for (id, record) in doc.shots {
        let camera = cameras
            .get(&record.camera)
            .ok_or_else(|| PipelineError::UnknownCamera {
                shot: id.clone(),
                camera: record.camera.clone(),
            })?;

        shots.push(Shot::from_pose(
            id,
            camera.focal,
            &Vec3::from(record.rotation),
            &Vec3::from(record.translation),
        ));
    }

    Ok(shots)
}

/// Read the DEM world offsets from
/// `<dataset>/odm_georeferencing/coords.txt`: the second line's first
/// two whitespace-separated integers.
pub fn read_dem_offsets(dataset: &Path) -> Result<(i64, i64), PipelineError> {
    let path = dataset.join("odm_georeferencing").join("coords.txt");
    if !path.exists() {
        return Err(PipelineError::CoordsNotFound(path));
    }

    let text = std::fs::read_to_string(&path)
        .map_err(|e| PipelineError::io(format!("reading {}", path.display()), e))?;

    let line = text
        .lines()
        .nth(1)
        .ok_or_else(|| malformed_coords(&path, "missing second line"))?;

    let mut fields = line.split_whitespace();
    let x = parse_offset(fields.next(), &path)?;
    let y = parse_offset(fields.next(), &path)?;

    Ok((x, y))
}

fn parse_offset(field: Option<&str>, path: &Path) -> Result<i64, PipelineError> {
    let field = field.ok_or_else(|| malformed_coords(path, "expected two offsets"))?;
    field
        .parse::<i64>()
        .map_err(|_| malformed_coords(path, &format!("offset \"{field}\" is not an integer")))
}

fn malformed_coords(path: &Path, reason: &str) -> PipelineError {
    PipelineError::CoordsMalformed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Read an image list file: one stem per line, trailing whitespace
/// trimmed, blank lines ignored.
pub fn read_image_list(path: &Path) -> Result<Vec<String>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::ImageListNotFound(path.to_path_buf()));
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::io(format!("reading {}", path.display()), e))?;

    Ok(text
        .lines()
        .map(|line| line.trim_end().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

/// Source image file name for a shot: `.tif` is appended when the stem
/// carries no extension.
pub fn shot_file_name(shot_id: &str) -> String {
    if Path::new(shot_id).extension().is_none() {
        format!("{shot_id}.tif")
    } else {
        shot_id.to_string()
    }
}

/// Absolute path of a shot's undistorted source image.
pub fn shot_image_path(dataset: &Path, shot_id: &str) -> PathBuf {
    dataset
        .join("opensfm")
        .join("undistorted")
        .join("images")
        .join(shot_file_name(shot_id))
}

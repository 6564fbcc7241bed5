//! Run driver: load everything once, fan the shots out, summarise.

use std::path::PathBuf;
use std::time::Instant;

use gdal::DriverManager;
use tracing::{debug, info, warn};

use crate::dem_io::load_dem;
use crate::error::PipelineError;
use crate::kernel::{Interpolation, KernelOptions, ShotOutcome};
use crate::reconstruction::{load_shots, read_dem_offsets, shot_file_name, shot_image_path};
use crate::scheduler::{build_pool, process_all, ShotJob};
use crate::util::human_duration;

/// Resolved configuration for one run. Path defaults relative to the
/// dataset are resolved by the caller (the CLI does this).
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Reconstruction dataset directory.
    pub dataset: PathBuf,
    /// DEM raster to orthorectify against.
    pub dem_path: PathBuf,
    /// Output directory; created if absent.
    pub outdir: PathBuf,
    pub interpolation: Interpolation,
    /// Append an alpha band to outputs.
    pub with_alpha: bool,
    pub skip_visibility_test: bool,
    /// `-1` = all cores, positive = explicit, `< -1` rejected.
    pub threads: i64,
    /// Image stems to process; empty processes every shot.
    pub target_images: Vec<String>,
}

/// Counts of what happened across all shots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Shots whose output raster was written.
    pub written: usize,
    /// Shots whose footprint missed the DEM.
    pub outside_dem: usize,
    /// Non-perspective shots skipped by the kernel.
    pub skipped: usize,
    /// Shots that failed with an I/O or GDAL error.
    pub failed: usize,
    /// Shots excluded by the image filter.
    pub filtered_out: usize,
}

/// Execute a full run: load DEM and reconstruction, process every
/// selected shot in parallel, write outputs into the output directory.
pub fn run(config: &RunConfig) -> Result<RunSummary, PipelineError> {
    let start = Instant::now();

    DriverManager::register_all();

    if !config.dataset.is_dir() {
        return Err(PipelineError::DatasetNotFound(config.dataset.clone()));
    }

    // Workers assume the output directory exists.
    std::fs::create_dir_all(&config.outdir).map_err(|e| {
        PipelineError::io(
            format!("creating output directory {}", config.outdir.display()),
            e,
        )
    })?;

    let pool = build_pool(config.threads)?;

    if config.target_images.is_empty() {
        info!("processing all images");
    } else {
        info!("processing {} images", config.target_images.len());
        for id in &config.target_images {
            debug!("{id}");
        }
    }

    let offsets = read_dem_offsets(&config.dataset)?;
    let dem = load_dem(&config.dem_path, offsets)?;

    info!("loading undistorted dataset");
    let shots = load_shots(&config.dataset)?;
    debug!("found shots:");
    for shot in &shots {
        debug!("{}", shot.id);
    }

    let mut summary = RunSummary::default();
    let mut jobs = Vec::new();

    for shot in shots {
        if !config.target_images.is_empty()
            && !config.target_images.iter().any(|id| *id == shot.id)
        {
            debug!("skipping image {}", shot.id);
            summary.filtered_out += 1;
            continue;
        }

        let image_path = shot_image_path(&config.dataset, &shot.id);
        let out_path = config.outdir.join(shot_file_name(&shot.id));
        debug!("image file path: {}", image_path.display());

        jobs.push(ShotJob {
            shot,
            image_path,
            out_path,
        });
    }

    let opts = KernelOptions {
        interpolation: config.interpolation,
        with_alpha: config.with_alpha,
        skip_visibility_test: config.skip_visibility_test,
    };

    let reports = process_all(&pool, &dem, &jobs, &opts);

    for report in &reports {
        match &report.outcome {
            Ok(ShotOutcome::Written { .. }) => summary.written += 1,
            Ok(ShotOutcome::OutsideDem) => summary.outside_dem += 1,
            Ok(ShotOutcome::SkippedNonPerspective) => summary.skipped += 1,
            Err(_) => summary.failed += 1,
        }
    }

    if summary.failed > 0 {
        warn!("{} shots failed", summary.failed);
    }
    info!(
        "processed {} images in {}",
        summary.written,
        human_duration(start.elapsed())
    );

    Ok(summary)
}

//! Parallel shot scheduling.
//!
//! Shots are the unit of parallelism: each worker reads the shared
//! DEM, opens its own source image and writes its own output, so the
//! fan-out needs no locks. Per-shot failures are reported and do not
//! stop the other workers.

use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{error, info};

use ortho_core::{Dem, Shot};

use crate::error::PipelineError;
use crate::kernel::{process_shot, KernelOptions, ShotOutcome};

/// One unit of work for the pool.
#[derive(Debug, Clone)]
pub struct ShotJob {
    pub shot: Shot,
    pub image_path: PathBuf,
    pub out_path: PathBuf,
}

/// Result of one job; errors are carried, not raised.
#[derive(Debug)]
pub struct ShotReport {
    pub shot_id: String,
    pub outcome: Result<ShotOutcome, PipelineError>,
}

/// Build the worker pool per the thread-count policy: `-1` (or 0)
/// means all available cores, positive means explicit, anything below
/// `-1` is rejected.
pub fn build_pool(threads: i64) -> Result<rayon::ThreadPool, PipelineError> {
    if threads < -1 {
        return Err(PipelineError::InvalidThreadCount(threads));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if threads > 0 {
        builder = builder.num_threads(threads as usize);
    }

    let pool = builder
        .build()
        .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;

    if threads > 0 {
        info!("using {threads} threads");
    } else {
        info!(
            "using all available threads ({})",
            pool.current_num_threads()
        );
    }

    Ok(pool)
}

/// Fan the kernel out across the jobs. Ordering between shots is
/// unspecified; the returned reports follow the job order.
pub fn process_all(
    pool: &rayon::ThreadPool,
    dem: &Dem,
    jobs: &[ShotJob],
    opts: &KernelOptions,
) -> Vec<ShotReport> {
    pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                info!("processing shot {}", job.shot.id);

                let outcome =
                    process_shot(dem, &job.shot, &job.image_path, &job.out_path, opts);

                if let Err(err) = &outcome {
                    error!("shot \"{}\" failed: {err}", job.shot.id);
                }

                ShotReport {
                    shot_id: job.shot.id.clone(),
                    outcome,
                }
            })
            .collect()
    })
}

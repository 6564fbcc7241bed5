//! `orthorectify`: orthorectifies individual images (or all images)
//! from an existing ODM reconstruction.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ortho_pipeline::{run, Interpolation, RunConfig};

const DEFAULT_DEM: &str = "odm_dem/dsm.tif";
const DEFAULT_OUTDIR: &str = "orthorectified";
const DEFAULT_IMAGE_LIST: &str = "img_list.txt";

#[derive(Debug, Parser)]
#[command(
    name = "orthorectify",
    version,
    about = "Orthorectifies individual images (or all images) from an existing ODM reconstruction"
)]
struct Args {
    /// Path to ODM dataset
    dataset: PathBuf,

    /// Absolute path to DEM to use to orthorectify images [default: <dataset>/odm_dem/dsm.tif]
    #[arg(short = 'e', long)]
    dem: Option<PathBuf>,

    /// Don't output an alpha channel
    #[arg(long)]
    no_alpha: bool,

    /// Type of interpolation to use to sample pixel values (nearest, bilinear)
    #[arg(short, long, default_value = "bilinear")]
    interpolation: String,

    /// Output directory where to store results [default: <dataset>/orthorectified]
    #[arg(short, long)]
    outdir: Option<PathBuf>,

    /// Path to file that contains the list of image filenames to orthorectify
    /// [default: <dataset>/img_list.txt]
    #[arg(short = 'l', long)]
    image_list: Option<PathBuf>,

    /// Comma-separated list of filenames to rectify; overrides --image-list
    #[arg(long)]
    images: Option<String>,

    /// Skip visibility testing (faster but leaves artifacts due to relief displacement)
    #[arg(short, long)]
    skip_visibility_test: bool,

    /// Number of threads to use (-1 = all)
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    threads: i64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<RunConfig> {
        let dataset = self.dataset;

        let dem_path = self
            .dem
            .unwrap_or_else(|| dataset.join(DEFAULT_DEM));
        let outdir = self
            .outdir
            .unwrap_or_else(|| dataset.join(DEFAULT_OUTDIR));

        let interpolation: Interpolation = self.interpolation.parse()?;

        let target_images = if let Some(csv) = self.images {
            csv.split(',')
                .map(str::to_string)
                .filter(|s| !s.is_empty())
                .collect()
        } else if let Some(list) = self.image_list {
            // An explicitly named list must exist.
            ortho_pipeline::reconstruction::read_image_list(&list)?
        } else {
            let default_list = dataset.join(DEFAULT_IMAGE_LIST);
            if default_list.exists() {
                ortho_pipeline::reconstruction::read_image_list(&default_list)?
            } else {
                Vec::new()
            }
        };

        Ok(RunConfig {
            dataset,
            dem_path,
            outdir,
            interpolation,
            with_alpha: !self.no_alpha,
            skip_visibility_test: self.skip_visibility_test,
            threads: self.threads,
            target_images,
        })
    }
}

fn main() {
    // Help and version exit 0; every other argument problem is a
    // fatal error and exits 1.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    if let Err(err) = try_main(args) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main(args: Args) -> Result<()> {
    let config = args.into_config()?;
    run(&config).context("orthorectification failed")?;
    Ok(())
}

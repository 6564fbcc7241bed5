//! End-to-end pipeline tests over a synthetic ODM dataset.
//!
//! Each test builds a small dataset in a temporary directory (DEM
//! GeoTIFF, reconstruction document, coords file, undistorted images)
//! and runs the driver against it.

use std::fs;
use std::path::{Path, PathBuf};

use gdal::Metadata;
use tempfile::TempDir;

use ortho_pipeline::{
    run, AnyRaster, Interpolation, PipelineError, Raster, RunConfig, RunSummary,
};

const DEM_SIZE: usize = 80;
const IMG_SIZE: usize = 160;

/// DEM geotransform: 1m pixels, north-up, origin (1000, 2000).
const DEM_GT: [f64; 6] = [1000.0, 1.0, 0.0, 2000.0, 0.0, -1.0];

/// World offsets recorded in coords.txt.
const OFFSETS: (i64, i64) = (900, 1900);

/// Camera hovering 990m over the DEM centre, looking straight down.
/// Origin is in the local (offset-subtracted) frame.
const CAMERA_ORIGIN: [f64; 3] = [140.5, 60.5, 1000.0];

fn write_dem(path: &Path) {
    let mut dem = Raster::<f32>::empty(DEM_SIZE, DEM_SIZE, 1, false, "GTiff");
    for row in 0..DEM_SIZE {
        for col in 0..DEM_SIZE {
            dem.set(col, row, &[10.0 + 0.01 * col as f32]);
        }
    }
    dem.write(path, None, |ds| ds.set_geo_transform(&DEM_GT)).unwrap();
}

fn write_image(path: &Path, value: u8) {
    let mut img = Raster::<u8>::empty(IMG_SIZE, IMG_SIZE, 3, false, "GTiff");
    let sample = [value; 3];
    for row in 0..IMG_SIZE {
        for col in 0..IMG_SIZE {
            img.set(col, row, &sample);
        }
    }
    img.write(path, None, |_| Ok(())).unwrap();
}

fn reconstruction_json(shots: &[(&str, [f64; 3])]) -> String {
    let shot_entries: Vec<String> = shots
        .iter()
        .map(|(id, origin)| {
            // R = I, so t = -origin
            format!(
                r#""{id}": {{"camera": "v2 test", "rotation": [0.0, 0.0, 0.0], "translation": [{}, {}, {}]}}"#,
                -origin[0], -origin[1], -origin[2]
            )
        })
        .collect();

    format!(
        r#"[{{
            "cameras": {{
                "v2 test": {{"projection_type": "perspective", "focal": 0.5, "width": {IMG_SIZE}, "height": {IMG_SIZE}}}
            }},
            "shots": {{ {} }}
        }}]"#,
        shot_entries.join(",\n")
    )
}

/// Build a dataset directory with one image per shot id.
fn build_dataset(dir: &Path, shots: &[(&str, [f64; 3])]) {
    let opensfm = dir.join("opensfm");
    let images = opensfm.join("undistorted").join("images");
    let geo = dir.join("odm_georeferencing");
    fs::create_dir_all(&images).unwrap();
    fs::create_dir_all(&geo).unwrap();
    fs::create_dir_all(dir.join("odm_dem")).unwrap();

    fs::write(opensfm.join("reconstruction.json"), reconstruction_json(shots)).unwrap();
    fs::write(
        geo.join("coords.txt"),
        format!("WGS84 UTM 10N\n{} {}\n", OFFSETS.0, OFFSETS.1),
    )
    .unwrap();

    write_dem(&dir.join("odm_dem").join("dsm.tif"));

    for (id, _) in shots {
        write_image(&images.join(format!("{id}.tif")), 128);
    }
}

fn config_for(dir: &Path, outdir: PathBuf) -> RunConfig {
    RunConfig {
        dataset: dir.to_path_buf(),
        dem_path: dir.join("odm_dem").join("dsm.tif"),
        outdir,
        interpolation: Interpolation::Bilinear,
        with_alpha: true,
        skip_visibility_test: true,
        threads: -1,
        target_images: Vec::new(),
    }
}

#[test]
fn end_to_end_roundtrip() {
    let dir = TempDir::new().unwrap();
    build_dataset(dir.path(), &[("IMG_001", CAMERA_ORIGIN)]);

    let outdir = dir.path().join("orthorectified");
    let summary = run(&config_for(dir.path(), outdir.clone())).unwrap();

    assert_eq!(
        summary,
        RunSummary {
            written: 1,
            ..RunSummary::default()
        }
    );

    let out_path = outdir.join("IMG_001.tif");
    assert!(out_path.exists());

    // The overhead camera sees the whole DEM: the output aligns with
    // the full grid and inherits its georeferencing.
    let ds = gdal::Dataset::open(&out_path).unwrap();
    assert_eq!(ds.raster_size(), (DEM_SIZE, DEM_SIZE));
    assert_eq!(ds.geo_transform().unwrap(), DEM_GT);
    assert_eq!(ds.metadata_item("WIDTH", "").as_deref(), Some("80"));
    assert_eq!(ds.metadata_item("HEIGHT", "").as_deref(), Some("80"));
    assert_eq!(
        ds.metadata_item("SOFTWARE", "").as_deref(),
        Some("Orthorectify")
    );
    drop(ds);

    let raster = match AnyRaster::open(&out_path).unwrap() {
        AnyRaster::U8(r) => r,
        other => panic!("expected a u8 output, got {other:?}"),
    };
    assert_eq!(raster.bands(), 4, "three source bands plus alpha");
    for row in 0..DEM_SIZE {
        for col in 0..DEM_SIZE {
            assert_eq!(raster.get(col, row), &[128, 128, 128, 255]);
        }
    }
}

#[test]
fn image_list_restricts_the_run() {
    let dir = TempDir::new().unwrap();
    build_dataset(
        dir.path(),
        &[
            ("IMG_001", CAMERA_ORIGIN),
            ("IMG_002", CAMERA_ORIGIN),
            ("IMG_003", CAMERA_ORIGIN),
            ("IMG_004", CAMERA_ORIGIN),
        ],
    );

    let outdir = dir.path().join("out");
    let mut config = config_for(dir.path(), outdir.clone());
    config.target_images = vec!["IMG_002".to_string(), "IMG_003".to_string()];

    let summary = run(&config).unwrap();
    assert_eq!(summary.written, 2);
    assert_eq!(summary.filtered_out, 2);

    assert!(!outdir.join("IMG_001.tif").exists());
    assert!(outdir.join("IMG_002.tif").exists());
    assert!(outdir.join("IMG_003.tif").exists());
    assert!(!outdir.join("IMG_004.tif").exists());
}

#[test]
fn thread_count_does_not_change_the_output() {
    let dir = TempDir::new().unwrap();
    build_dataset(
        dir.path(),
        &[("IMG_001", CAMERA_ORIGIN), ("IMG_002", CAMERA_ORIGIN)],
    );

    let out_single = dir.path().join("out1");
    let out_parallel = dir.path().join("out8");

    let mut config = config_for(dir.path(), out_single.clone());
    config.threads = 1;
    run(&config).unwrap();

    config.outdir = out_parallel.clone();
    config.threads = 8;
    run(&config).unwrap();

    for id in ["IMG_001", "IMG_002"] {
        let a = AnyRaster::open(&out_single.join(format!("{id}.tif"))).unwrap();
        let b = AnyRaster::open(&out_parallel.join(format!("{id}.tif"))).unwrap();
        match (a, b) {
            (AnyRaster::U8(a), AnyRaster::U8(b)) => assert_eq!(a, b, "shot {id} differs"),
            _ => panic!("unexpected sample type"),
        }
    }
}

#[test]
fn shot_outside_the_dem_is_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    build_dataset(
        dir.path(),
        &[
            ("IMG_001", CAMERA_ORIGIN),
            ("IMG_FAR", [50000.0, 60.5, 1000.0]),
        ],
    );

    let outdir = dir.path().join("out");
    let summary = run(&config_for(dir.path(), outdir.clone())).unwrap();

    assert_eq!(summary.written, 1);
    assert_eq!(summary.outside_dem, 1);
    assert!(outdir.join("IMG_001.tif").exists());
    assert!(!outdir.join("IMG_FAR.tif").exists());
}

#[test]
fn missing_source_image_fails_only_that_shot() {
    let dir = TempDir::new().unwrap();
    build_dataset(
        dir.path(),
        &[("IMG_001", CAMERA_ORIGIN), ("IMG_002", CAMERA_ORIGIN)],
    );
    fs::remove_file(
        dir.path()
            .join("opensfm")
            .join("undistorted")
            .join("images")
            .join("IMG_002.tif"),
    )
    .unwrap();

    let outdir = dir.path().join("out");
    let summary = run(&config_for(dir.path(), outdir.clone())).unwrap();

    assert_eq!(summary.written, 1);
    assert_eq!(summary.failed, 1);
    assert!(outdir.join("IMG_001.tif").exists());
}

#[test]
fn missing_inputs_are_fatal_configuration_errors() {
    let dir = TempDir::new().unwrap();

    // No dataset directory at all
    let mut config = config_for(&dir.path().join("nope"), dir.path().join("out"));
    assert!(matches!(
        run(&config),
        Err(PipelineError::DatasetNotFound(_))
    ));

    // Dataset without coords.txt
    let dataset = dir.path().join("ds");
    fs::create_dir_all(&dataset).unwrap();
    config = config_for(&dataset, dir.path().join("out"));
    assert!(matches!(run(&config), Err(PipelineError::CoordsNotFound(_))));

    // Coords present, DEM absent
    build_dataset(&dataset, &[("IMG_001", CAMERA_ORIGIN)]);
    fs::remove_file(dataset.join("odm_dem").join("dsm.tif")).unwrap();
    config = config_for(&dataset, dir.path().join("out"));
    assert!(matches!(run(&config), Err(PipelineError::DemNotFound(_))));
}

#[test]
fn unsupported_dem_sample_type_is_fatal() {
    let dir = TempDir::new().unwrap();
    build_dataset(dir.path(), &[("IMG_001", CAMERA_ORIGIN)]);

    // Replace the DEM with a float64 raster.
    let dem_path = dir.path().join("odm_dem").join("dsm.tif");
    fs::remove_file(&dem_path).unwrap();

    let driver = gdal::DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut ds = driver
        .create_with_band_type::<f64, _>(&dem_path, DEM_SIZE as isize, DEM_SIZE as isize, 1)
        .unwrap();
    ds.set_geo_transform(&DEM_GT).unwrap();
    let data: Vec<f64> = (0..DEM_SIZE * DEM_SIZE).map(|i| 10.0 + i as f64).collect();
    let buffer = gdal::raster::Buffer::new((DEM_SIZE, DEM_SIZE), data);
    ds.rasterband(1)
        .unwrap()
        .write((0, 0), (DEM_SIZE, DEM_SIZE), &buffer)
        .unwrap();
    drop(ds);

    let config = config_for(dir.path(), dir.path().join("out"));
    assert!(matches!(
        run(&config),
        Err(PipelineError::UnsupportedDemType(_))
    ));
}

#[test]
fn invalid_thread_count_is_fatal() {
    let dir = TempDir::new().unwrap();
    build_dataset(dir.path(), &[("IMG_001", CAMERA_ORIGIN)]);

    let mut config = config_for(dir.path(), dir.path().join("out"));
    config.threads = -3;
    assert!(matches!(
        run(&config),
        Err(PipelineError::InvalidThreadCount(-3))
    ));
}

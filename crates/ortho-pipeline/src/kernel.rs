//! Per-shot orthorectification kernel.
//!
//! For one solved shot, every DEM cell in the shot's footprint is
//! projected through the collinearity equations into the source
//! image, tested for relief occlusion by ray-marching the DEM, and
//! sampled with the configured filter. The result is a raster cropped
//! to the valid pixels, georegistered on the DEM grid.
//!
//! The algorithm is generic over the DEM's elevation type and the
//! image's sample type; both are resolved once per shot so the inner
//! loop carries no per-cell dispatch.

use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use tracing::{debug, info, warn};

use ortho_core::{trace_line, Dem, Elevation, ElevationBuffer, GeoTransform, GridPoint, Shot};

use crate::error::PipelineError;
use crate::raster::{AnyRaster, Raster, Sample};
use crate::util::human_duration;

/// Pixel sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    Bilinear,
}

impl FromStr for Interpolation {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            other => Err(PipelineError::UnknownInterpolation(other.to_string())),
        }
    }
}

/// Per-shot kernel switches.
#[derive(Debug, Clone, Copy)]
pub struct KernelOptions {
    pub interpolation: Interpolation,
    /// Append an alpha band marking valid pixels.
    pub with_alpha: bool,
    /// Skip the occlusion ray-march (faster, leaves relief artifacts).
    pub skip_visibility_test: bool,
}

/// What happened to one shot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShotOutcome {
    /// Output raster written with the given pixel dimensions.
    Written { width: usize, height: usize },
    /// No DEM cell produced a valid pixel; nothing was written.
    OutsideDem,
    /// Non-perspective shot (focal 0), skipped before processing.
    SkippedNonPerspective,
}

/// A rectified tile ready to be written: cropped raster plus its
/// georeferencing on the DEM grid.
pub(crate) struct OrthoTile<T: Sample> {
    pub raster: Raster<T>,
    pub transform: GeoTransform,
}

/// Orthorectify one shot and write the result to `out_path`.
///
/// Shot-level I/O failures surface as errors; a geometric miss is the
/// [`ShotOutcome::OutsideDem`] value, not an error.
pub fn process_shot(
    dem: &Dem,
    shot: &Shot,
    image_path: &Path,
    out_path: &Path,
    opts: &KernelOptions,
) -> Result<ShotOutcome, PipelineError> {
    let start = Instant::now();

    if shot.focal == 0.0 {
        warn!(
            "skipping shot \"{}\": non-perspective camera (focal 0)",
            shot.id
        );
        return Ok(ShotOutcome::SkippedNonPerspective);
    }

    let image = AnyRaster::open(image_path)?;
    debug!(
        "image {}: {}x{} pixels ({} bands)",
        image_path.display(),
        image.width(),
        image.height(),
        image.bands()
    );

    let outcome = match dem.buffer() {
        ElevationBuffer::U8(grid) => dispatch_image(dem, grid, shot, &image, out_path, opts),
        ElevationBuffer::U16(grid) => dispatch_image(dem, grid, shot, &image, out_path, opts),
        ElevationBuffer::F32(grid) => dispatch_image(dem, grid, shot, &image, out_path, opts),
    }?;

    if let ShotOutcome::Written { .. } = outcome {
        info!(
            "orthorectified image \"{}\" written in {}",
            shot.id,
            human_duration(start.elapsed())
        );
    }

    Ok(outcome)
}

fn dispatch_image<E: Elevation>(
    dem: &Dem,
    grid: &[E],
    shot: &Shot,
    image: &AnyRaster,
    out_path: &Path,
    opts: &KernelOptions,
) -> Result<ShotOutcome, PipelineError> {
    match image {
        AnyRaster::U8(img) => finish(dem, shot, rectify(dem, grid, shot, img, opts), out_path),
        AnyRaster::U16(img) => finish(dem, shot, rectify(dem, grid, shot, img, opts), out_path),
        AnyRaster::F32(img) => finish(dem, shot, rectify(dem, grid, shot, img, opts), out_path),
    }
}

fn finish<T: Sample>(
    dem: &Dem,
    shot: &Shot,
    tile: Option<OrthoTile<T>>,
    out_path: &Path,
) -> Result<ShotOutcome, PipelineError> {
    let Some(tile) = tile else {
        warn!(
            "cannot orthorectify image \"{}\" (is the image inside the DEM bounds?)",
            shot.id
        );
        return Ok(ShotOutcome::OutsideDem);
    };

    let geotransform = tile.transform.to_gdal();
    let width = tile.raster.width();
    let height = tile.raster.height();

    tile.raster.write(out_path, Some("GTiff"), |ds| {
        use gdal::Metadata;

        ds.set_geo_transform(&geotransform)?;
        ds.set_metadata_item("WIDTH", &width.to_string(), "")?;
        ds.set_metadata_item("HEIGHT", &height.to_string(), "")?;
        ds.set_metadata_item("SOFTWARE", "Orthorectify", "")?;
        if !dem.crs_wkt().is_empty() {
            ds.set_projection(dem.crs_wkt())?;
        }
        Ok(())
    })?;

    Ok(ShotOutcome::Written { width, height })
}

/// Truncate a continuous DEM index and clamp it into `[0, max]`.
fn clamp_cell(v: f64, max: i64) -> i64 {
    (v as i64).clamp(0, max)
}

/// Run the kernel for one shot against one opened image.
///
/// Returns `None` when no DEM cell yields a valid pixel (the shot's
/// footprint misses the DEM or every sample was all-zero).
pub(crate) fn rectify<E: Elevation, T: Sample>(
    dem: &Dem,
    grid: &[E],
    shot: &Shot,
    image: &Raster<T>,
    opts: &KernelOptions,
) -> Option<OrthoTile<T>> {
    let w = dem.width() as i64;
    let h = dem.height() as i64;
    let transform = dem.transform();

    let xs = shot.origin.x;
    let ys = shot.origin.y;
    let zs = shot.origin.z;

    // Camera projected onto the DEM grid; the continuous value feeds
    // the distance map, the truncation is the ray-march endpoint.
    let (cam_grid_x, cam_grid_y) =
        transform.index(xs + dem.offset_x(), ys + dem.offset_y());
    let cam_col = cam_grid_x as i64;
    let cam_row = cam_grid_y as i64;

    debug!("rotation matrix: {:?}", shot.rotation.as_slice());
    debug!("origin: ({xs}, {ys}, {zs})");
    debug!("DEM index: ({cam_grid_x}, {cam_grid_y})");

    // Planimetric distance from each DEM cell to the camera column,
    // used to interpolate ray elevation along the traversal.
    let distance_map: Vec<f64> = if opts.skip_visibility_test {
        Vec::new()
    } else {
        let mut map = vec![0.0; (w * h) as usize];
        for j in 0..h {
            for i in 0..w {
                let d = (cam_grid_x - i as f64).hypot(cam_grid_y - j as f64);
                map[(j * w + i) as usize] = d.max(1e-7);
            }
        }
        debug!("populated distance map");
        map
    };

    let img_w = image.width() as i64;
    let img_h = image.height() as i64;
    let half_img_w = (img_w - 1) as f64 / 2.0;
    let half_img_h = (img_h - 1) as f64 / 2.0;
    let bands = image.bands();

    let f = shot.focal * img_w.max(img_h) as f64;
    debug!("camera focal: {} coefficient {f}", shot.focal);

    let r = &shot.rotation;
    let a1 = r[(0, 0)];
    let b1 = r[(0, 1)];
    let c1 = r[(0, 2)];
    let a2 = r[(1, 0)];
    let b2 = r[(1, 1)];
    let c2 = r[(1, 2)];
    let a3 = r[(2, 0)];
    let b3 = r[(2, 1)];
    let c3 = r[(2, 2)];

    // Closed-form back-projection of an image-plane point (relative to
    // the principal point) to the DEM grid at the minimum elevation.
    let ground_index = |cpx: f64, cpy: f64| -> (f64, f64) {
        let za = dem.min();
        let m = a3 * b1 * cpy - a1 * b3 * cpy - (a3 * b2 - a2 * b3) * cpx
            - (a2 * b1 - a1 * b2) * f;
        let nx = b3 * c1 * cpy - b1 * c3 * cpy - (b3 * c2 - b2 * c3) * cpx
            - (b2 * c1 - b1 * c2) * f;
        let ny = a3 * c1 * cpy - a1 * c3 * cpy - (a3 * c2 - a2 * c3) * cpx
            - (a2 * c1 - a1 * c2) * f;
        let xa = dem.offset_x() + xs + nx * (za - zs) / m;
        let ya = dem.offset_y() + ys - ny * (za - zs) / m;
        transform.index(xa, ya)
    };

    let (ul_x, ul_y) = ground_index(-half_img_w, -half_img_h);
    let (ur_x, ur_y) = ground_index(half_img_w, -half_img_h);
    let (lr_x, lr_y) = ground_index(half_img_w, half_img_h);
    let (ll_x, ll_y) = ground_index(-half_img_w, half_img_h);

    debug!(
        "DEM bounding box: ({ul_x}, {ul_y}), ({ur_x}, {ur_y}), ({lr_x}, {lr_y}), ({ll_x}, {ll_y})"
    );

    let bbox_min_col = clamp_cell(ul_x.min(ur_x).min(lr_x).min(ll_x), w - 1);
    let bbox_min_row = clamp_cell(ul_y.min(ur_y).min(lr_y).min(ll_y), h - 1);
    let bbox_max_col = clamp_cell(ul_x.max(ur_x).max(lr_x).max(ll_x), w - 1);
    let bbox_max_row = clamp_cell(ul_y.max(ur_y).max(lr_y).max(ll_y), h - 1);

    let bbox_w = (1 + bbox_max_col - bbox_min_col) as usize;
    let bbox_h = (1 + bbox_max_row - bbox_min_row) as usize;

    debug!(
        "iterating over DEM box: [({bbox_min_col}, {bbox_min_row}), ({bbox_max_col}, {bbox_max_row})] ({bbox_w}x{bbox_h} pixels)"
    );

    let mut window = Raster::<T>::empty(bbox_w, bbox_h, bands, false, "GTiff");
    let mut mask = vec![false; bbox_w * bbox_h];

    // Valid-pixel bounds in window coordinates; empty until a write
    // brings min <= max.
    let mut min_x = bbox_w as i64;
    let mut min_y = bbox_h as i64;
    let mut max_x: i64 = 0;
    let mut max_y: i64 = 0;

    let worst_case = cam_grid_x.hypot(cam_grid_y).ceil().max(0.0) as usize + 1;
    let mut ray: Vec<GridPoint> = Vec::with_capacity(worst_case);
    let mut sample = vec![T::ZERO; bands];

    for j in bbox_min_row..=bbox_max_row {
        let window_j = (j - bbox_min_row) as usize;

        for i in bbox_min_col..=bbox_max_col {
            let window_i = (i - bbox_min_col) as usize;

            let za = grid[(j * w + i) as usize].as_f64();

            if let Some(nodata) = dem.nodata() {
                if za == nodata {
                    continue;
                }
            }

            let (mut xa, mut ya) = transform.center(i as f64, j as f64);
            // Poses carry no geographic offset
            xa -= dem.offset_x();
            ya -= dem.offset_y();

            let dx = xa - xs;
            let dy = ya - ys;
            let dz = za - zs;

            let den = a3 * dx + b3 * dy + c3 * dz;
            let x = half_img_w - f * (a1 * dx + b1 * dy + c1 * dz) / den;
            let y = half_img_h - f * (a2 * dx + b2 * dy + c2 * dz) / den;

            if !(x >= 0.0 && y >= 0.0 && x <= (img_w - 1) as f64 && y <= (img_h - 1) as f64) {
                continue;
            }

            if !opts.skip_visibility_test {
                trace_line(i, j, cam_col, cam_row, &mut ray);

                let dist = distance_map[(j * w + i) as usize];
                let mut visible = true;

                // The first cell is the ray's own start; comparing it
                // against itself would occlude every cell.
                for p in ray.iter().skip(1) {
                    if p.x < 0 || p.y < 0 || p.x >= w || p.y >= h {
                        continue;
                    }

                    let pi = (p.y * w + p.x) as usize;
                    let ray_z = zs + dz * (distance_map[pi] / dist);

                    // Above every terrain cell from here on
                    if ray_z > dem.max() {
                        break;
                    }

                    if grid[pi].as_f64() > ray_z {
                        visible = false;
                        break;
                    }
                }

                if !visible {
                    continue;
                }
            }

            // Projected coordinates are measured from the far corner.
            match opts.interpolation {
                Interpolation::Bilinear => {
                    let xi = (img_w - 1) as f64 - x;
                    let yi = (img_h - 1) as f64 - y;
                    image.bilinear(xi, yi, &mut sample);
                }
                Interpolation::Nearest => {
                    let xi = img_w - 1 - x.round() as i64;
                    let yi = img_h - 1 - y.round() as i64;
                    sample.copy_from_slice(image.get(xi as usize, yi as usize));
                }
            }

            // All-zero samples are padding from the undistorted input,
            // not valid data.
            if sample.iter().any(|v| *v != T::ZERO) {
                window.set(window_i, window_j, &sample);
                mask[window_j * bbox_w + window_i] = true;

                min_x = min_x.min(window_i as i64);
                min_y = min_y.min(window_j as i64);
                max_x = max_x.max(window_i as i64);
                max_y = max_y.max(window_j as i64);
            }
        }
    }

    debug!("output bounds ({min_x}, {min_y}), ({max_x}, {max_y}) pixels");

    if min_x > max_x || min_y > max_y {
        return None;
    }

    let out_w = (max_x - min_x + 1) as usize;
    let out_h = (max_y - min_y + 1) as usize;
    let out_bands = if opts.with_alpha { bands + 1 } else { bands };

    let crop_x = min_x as usize;
    let crop_y = min_y as usize;

    let mut out = Raster::<T>::empty(out_w, out_h, out_bands, opts.with_alpha, "GTiff");

    if opts.with_alpha {
        let opaque = T::from_f64(255.0);
        let mut with_alpha = vec![T::ZERO; out_bands];

        for j in 0..out_h {
            for i in 0..out_w {
                let src_i = crop_x + i;
                let src_j = crop_y + j;

                if mask[src_j * bbox_w + src_i] {
                    with_alpha[..bands].copy_from_slice(window.get(src_i, src_j));
                    with_alpha[bands] = opaque;
                } else {
                    with_alpha.fill(T::ZERO);
                }

                out.set(i, j, &with_alpha);
            }
        }
    } else {
        for j in 0..out_h {
            for i in 0..out_w {
                out.set(i, j, window.get(crop_x + i, crop_y + j));
            }
        }
    }

    let (corner_x, corner_y) = transform.corner(
        (bbox_min_col + min_x) as f64,
        (bbox_min_row + min_y) as f64,
    );

    Some(OrthoTile {
        raster: out,
        transform: transform.with_origin(corner_x, corner_y),
    })
}

//! DEM loading.
//!
//! Reads band 1 of the DEM raster into a [`Dem`] tile. Exactly three
//! band types are supported (8-bit unsigned, 16-bit unsigned, 32-bit
//! float); anything else is a fatal configuration error before any
//! shot runs.

use std::path::Path;

use gdal::raster::GdalDataType;
use gdal::spatial_ref::SpatialRef;
use gdal::Dataset;
use tracing::{debug, info};

use ortho_core::{Dem, ElevationBuffer, GeoTransform};

use crate::error::PipelineError;

/// Load the DEM at `path`, attaching the dataset's world offsets.
pub fn load_dem(path: &Path, offsets: (i64, i64)) -> Result<Dem, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::DemNotFound(path.to_path_buf()));
    }

    info!("reading DEM: {}", path.display());

    let ds = Dataset::open(path)?;
    let band = ds.rasterband(1)?;

    let band_type = band.band_type();
    match band_type {
        GdalDataType::UInt8 | GdalDataType::UInt16 | GdalDataType::Float32 => {
            debug!("DEM band type {band_type:?}");
        }
        other => return Err(PipelineError::UnsupportedDemType(format!("{other:?}"))),
    }

    let range = band.compute_raster_min_max(false)?;
    info!("DEM minimum: {}", range.min);
    info!("DEM maximum: {}", range.max);

    let nodata = band.no_data_value();
    match nodata {
        Some(v) => debug!("DEM NoData value: {v}"),
        None => debug!("DEM has no NoData value"),
    }

    let (width, height) = ds.raster_size();
    info!("DEM dimensions: {width}x{height} pixels");

    let wkt = ds.projection();
    if !wkt.is_empty() {
        narrate_crs(&wkt);
    }
    info!("DEM offset ({}, {})", offsets.0, offsets.1);

    let transform = GeoTransform::from_gdal(ds.geo_transform()?);

    let buffer = match band_type {
        GdalDataType::UInt8 => ElevationBuffer::U8(
            band.read_as::<u8>((0, 0), (width, height), (width, height), None)?
                .data,
        ),
        GdalDataType::UInt16 => ElevationBuffer::U16(
            band.read_as::<u16>((0, 0), (width, height), (width, height), None)?
                .data,
        ),
        GdalDataType::Float32 => ElevationBuffer::F32(
            band.read_as::<f32>((0, 0), (width, height), (width, height), None)?
                .data,
        ),
        _ => unreachable!("band type validated above"),
    };

    debug!("DEM data loaded");

    let dem = Dem::new(
        width,
        height,
        buffer,
        nodata,
        range.min,
        range.max,
        transform,
        wkt,
        offsets.0 as f64,
        offsets.1 as f64,
    )?;

    Ok(dem)
}

fn narrate_crs(wkt: &str) {
    match SpatialRef::from_wkt(wkt) {
        Ok(srs) => {
            if let Ok(proj4) = srs.to_proj4() {
                info!("DEM CRS (proj): {proj4}");
            }
            if let Ok(pretty) = srs.to_pretty_wkt() {
                debug!("DEM CRS (wkt):\n{pretty}");
            }
        }
        Err(err) => debug!("could not parse DEM CRS: {err}"),
    }
}

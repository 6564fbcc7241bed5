//! In-memory DEM tile.
//!
//! The elevation buffer keeps the band's native sample type; the
//! [`Elevation`] trait lets the kernel monomorphise its inner loop on
//! that type instead of branching per cell.

use thiserror::Error;

use crate::transform::GeoTransform;

/// Errors raised when assembling a [`Dem`] from loaded band data.
#[derive(Debug, Error)]
pub enum DemError {
    #[error("elevation buffer holds {got} samples, expected {expected} ({width}x{height})")]
    BufferSize {
        width: usize,
        height: usize,
        expected: usize,
        got: usize,
    },
    #[error("DEM geotransform is not invertible")]
    DegenerateTransform,
    #[error("DEM value range is empty (min {min} >= max {max})")]
    EmptyRange { min: f64, max: f64 },
}

/// An elevation sample type the kernel can be monomorphised on.
pub trait Elevation: Copy + Send + Sync + 'static {
    /// Widen to `f64` for the collinearity arithmetic.
    fn as_f64(self) -> f64;
}

impl Elevation for u8 {
    fn as_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Elevation for u16 {
    fn as_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Elevation for f32 {
    fn as_f64(self) -> f64 {
        f64::from(self)
    }
}

/// Elevation buffer in the band's native sample type.
///
/// Exactly the three types the loader accepts; anything else is
/// rejected before a buffer is ever built.
#[derive(Debug, Clone)]
pub enum ElevationBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

impl ElevationBuffer {
    /// Number of samples in the buffer.
    pub fn len(&self) -> usize {
        match self {
            ElevationBuffer::U8(b) => b.len(),
            ElevationBuffer::U16(b) => b.len(),
            ElevationBuffer::F32(b) => b.len(),
        }
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable name of the sample type, for logs and errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            ElevationBuffer::U8(_) => "uint8",
            ElevationBuffer::U16(_) => "uint16",
            ElevationBuffer::F32(_) => "float32",
        }
    }
}

/// A georeferenced elevation grid, loaded once and shared read-only
/// with every worker.
#[derive(Debug, Clone)]
pub struct Dem {
    width: usize,
    height: usize,
    buffer: ElevationBuffer,
    nodata: Option<f64>,
    min: f64,
    max: f64,
    transform: GeoTransform,
    crs_wkt: String,
    offset_x: f64,
    offset_y: f64,
}

impl Dem {
    /// Assemble a DEM tile from loaded band data.
    ///
    /// `min`/`max` are the caller-computed extremes over non-nodata
    /// cells; `offset_x`/`offset_y` are the world-unit offsets
    /// subtracted from camera poses (photogrammetric datasets often
    /// record local-origin poses while the DEM lives in a global
    /// frame).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        width: usize,
        height: usize,
        buffer: ElevationBuffer,
        nodata: Option<f64>,
        min: f64,
        max: f64,
        transform: GeoTransform,
        crs_wkt: String,
        offset_x: f64,
        offset_y: f64,
    ) -> Result<Self, DemError> {
        let expected = width * height;
        if buffer.len() != expected {
            return Err(DemError::BufferSize {
                width,
                height,
                expected,
                got: buffer.len(),
            });
        }
        if transform.determinant() == 0.0 {
            return Err(DemError::DegenerateTransform);
        }
        if min >= max {
            return Err(DemError::EmptyRange { min, max });
        }
        Ok(Self {
            width,
            height,
            buffer,
            nodata,
            min,
            max,
            transform,
            crs_wkt,
            offset_x,
            offset_y,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn buffer(&self) -> &ElevationBuffer {
        &self.buffer
    }

    /// Nodata sentinel, if the band declares one.
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Minimum elevation over non-nodata cells.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Maximum elevation over non-nodata cells.
    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// CRS well-known text; may be empty.
    pub fn crs_wkt(&self) -> &str {
        &self.crs_wkt
    }

    /// World-unit x offset subtracted from camera poses.
    pub fn offset_x(&self) -> f64 {
        self.offset_x
    }

    /// World-unit y offset subtracted from camera poses.
    pub fn offset_y(&self) -> f64 {
        self.offset_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_transform() -> GeoTransform {
        GeoTransform::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }

    #[test]
    fn buffer_size_is_validated() {
        let err = Dem::new(
            4,
            4,
            ElevationBuffer::F32(vec![0.0; 15]),
            None,
            0.0,
            1.0,
            flat_transform(),
            String::new(),
            0.0,
            0.0,
        )
        .unwrap_err();
        match err {
            DemError::BufferSize { expected, got, .. } => {
                assert_eq!(expected, 16);
                assert_eq!(got, 15);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn degenerate_transform_is_rejected() {
        let err = Dem::new(
            2,
            2,
            ElevationBuffer::U8(vec![0; 4]),
            None,
            0.0,
            1.0,
            GeoTransform::from_gdal([0.0, 1.0, 1.0, 0.0, 1.0, 1.0]),
            String::new(),
            0.0,
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, DemError::DegenerateTransform));
    }

    #[test]
    fn empty_value_range_is_rejected() {
        let err = Dem::new(
            2,
            2,
            ElevationBuffer::U16(vec![7; 4]),
            None,
            7.0,
            7.0,
            flat_transform(),
            String::new(),
            0.0,
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, DemError::EmptyRange { .. }));
    }

    #[test]
    fn valid_dem_exposes_metadata() {
        let dem = Dem::new(
            3,
            2,
            ElevationBuffer::F32(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            Some(-9999.0),
            1.0,
            6.0,
            flat_transform(),
            "WKT".to_string(),
            100.0,
            200.0,
        )
        .unwrap();
        assert_eq!(dem.width(), 3);
        assert_eq!(dem.height(), 2);
        assert_eq!(dem.nodata(), Some(-9999.0));
        assert_eq!(dem.crs_wkt(), "WKT");
        assert_eq!(dem.offset_x(), 100.0);
        assert_eq!(dem.buffer().len(), 6);
        assert_eq!(dem.buffer().type_name(), "float32");
    }
}

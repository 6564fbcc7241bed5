//! In-memory raster image over GDAL.
//!
//! One representation: an interleaved `width × height × bands` buffer
//! with a uniform sample type. [`AnyRaster`] resolves the band type at
//! open time so everything downstream is monomorphic.
//!
//! Writing goes through an in-memory GDAL dataset that a configure
//! hook may stamp (geotransform, CRS, metadata) before the final
//! `create_copy` to the target driver.

use std::path::{Path, PathBuf};

use gdal::raster::{Buffer, GdalDataType, GdalType};
use gdal::{Dataset, DriverManager};
use thiserror::Error;

/// Errors from raster loading and writing.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("file {0} does not exist")]
    FileNotFound(PathBuf),

    #[error("{path}: raster has no bands")]
    NoBands { path: PathBuf },

    #[error("{path}: bands have mixed sample types")]
    MixedBandTypes { path: PathBuf },

    #[error("{path}: unsupported sample type {type_name}")]
    UnsupportedSampleType { path: PathBuf, type_name: String },

    #[error("could not remove stale output {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),
}

/// A pixel sample type the raster can be monomorphised on.
pub trait Sample: GdalType + Copy + PartialEq + Send + Sync + 'static {
    /// The zero sample, used by the all-zero validity filter.
    const ZERO: Self;

    /// Widen to `f64` for interpolation arithmetic.
    fn to_f64(self) -> f64;

    /// Narrow from `f64`. Integer types round to nearest and saturate
    /// at the type's bounds; the rounding choice is uniform across
    /// bands.
    fn from_f64(v: f64) -> Self;
}

impl Sample for u8 {
    const ZERO: Self = 0;

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn from_f64(v: f64) -> Self {
        v.round() as u8
    }
}

impl Sample for u16 {
    const ZERO: Self = 0;

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn from_f64(v: f64) -> Self {
        v.round() as u16
    }
}

impl Sample for f32 {
    const ZERO: Self = 0.0;

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

/// Interleaved multi-band pixel buffer with geospatial write support.
///
/// Addressing is zero-based, origin at the top-left, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T: Sample> {
    width: usize,
    height: usize,
    bands: usize,
    has_alpha: bool,
    driver: String,
    data: Vec<T>,
}

impl<T: Sample> Raster<T> {
    /// Zero-initialised raster.
    pub fn empty(width: usize, height: usize, bands: usize, has_alpha: bool, driver: &str) -> Self {
        Self {
            width,
            height,
            bands,
            has_alpha,
            driver: driver.to_string(),
            data: vec![T::ZERO; width * height * bands],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Short name of the driver the raster came from (or will be
    /// written with when none is given to [`Raster::write`]).
    pub fn driver(&self) -> &str {
        &self.driver
    }

    #[inline]
    fn index(&self, col: usize, row: usize) -> usize {
        debug_assert!(
            col < self.width && row < self.height,
            "invalid pixel access: ({col}, {row}) in {}x{}",
            self.width,
            self.height
        );
        (row * self.width + col) * self.bands
    }

    /// Sample tuple at `(col, row)`, one value per band.
    #[inline]
    pub fn get(&self, col: usize, row: usize) -> &[T] {
        let i = self.index(col, row);
        &self.data[i..i + self.bands]
    }

    /// Store a sample tuple at `(col, row)`.
    #[inline]
    pub fn set(&mut self, col: usize, row: usize, sample: &[T]) {
        let i = self.index(col, row);
        self.data[i..i + self.bands].copy_from_slice(sample);
    }

    /// Bilinear interpolation at continuous `(x, y)` with edge
    /// replication, one output value per band.
    ///
    /// The four neighbours are clamped to the raster extent
    /// independently, so any out-of-range coordinate samples as if it
    /// sat on the nearest edge.
    pub fn bilinear(&self, x: f64, y: f64, out: &mut [T]) {
        let x0f = x.floor();
        let y0f = y.floor();

        let clamp_x = |v: f64| (v.max(0.0) as usize).min(self.width - 1);
        let clamp_y = |v: f64| (v.max(0.0) as usize).min(self.height - 1);

        let x0 = clamp_x(x0f);
        let x1 = clamp_x(x0f + 1.0);
        let y0 = clamp_y(y0f);
        let y1 = clamp_y(y0f + 1.0);

        let wa = (x0f + 1.0 - x) * (y0f + 1.0 - y);
        let wb = (x0f + 1.0 - x) * (y - y0f);
        let wc = (x - x0f) * (y0f + 1.0 - y);
        let wd = (x - x0f) * (y - y0f);

        let p00 = self.get(x0, y0);
        let p01 = self.get(x0, y1);
        let p10 = self.get(x1, y0);
        let p11 = self.get(x1, y1);

        for b in 0..self.bands {
            let v = wa * p00[b].to_f64()
                + wb * p01[b].to_f64()
                + wc * p10[b].to_f64()
                + wd * p11[b].to_f64();
            out[b] = T::from_f64(v);
        }
    }

    fn read_from(ds: &Dataset) -> Result<Self, RasterError> {
        let (width, height) = ds.raster_size();
        let band_count = ds.raster_count() as usize;
        let driver = ds.driver().short_name();

        let mut data = vec![T::ZERO; width * height * band_count];
        for b in 0..band_count {
            let band = ds.rasterband((b + 1) as isize)?;
            let buffer = band.read_as::<T>((0, 0), (width, height), (width, height), None)?;
            for (i, v) in buffer.data.iter().enumerate() {
                data[i * band_count + b] = *v;
            }
        }

        Ok(Self {
            width,
            height,
            bands: band_count,
            has_alpha: band_count == 4,
            driver,
            data,
        })
    }

    /// Write the raster to `path`, replacing any pre-existing file.
    ///
    /// The buffer is first copied into an in-memory GDAL dataset;
    /// `configure` runs on that proxy (stamp the geotransform, CRS and
    /// metadata there) before the final copy with `driver` (or the
    /// raster's own driver when `None`).
    pub fn write<F>(&self, path: &Path, driver: Option<&str>, configure: F) -> Result<(), RasterError>
    where
        F: FnOnce(&mut Dataset) -> Result<(), gdal::errors::GdalError>,
    {
        if path.exists() {
            std::fs::remove_file(path).map_err(|source| RasterError::RemoveFailed {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let mem = DriverManager::get_driver_by_name("MEM")?;
        let mut proxy = mem.create_with_band_type::<T, _>(
            "",
            self.width as isize,
            self.height as isize,
            self.bands as isize,
        )?;

        configure(&mut proxy)?;

        let mut plane = vec![T::ZERO; self.width * self.height];
        for b in 0..self.bands {
            for (i, dst) in plane.iter_mut().enumerate() {
                *dst = self.data[i * self.bands + b];
            }
            let buffer = Buffer::new((self.width, self.height), std::mem::take(&mut plane));
            let mut band = proxy.rasterband((b + 1) as isize)?;
            band.write((0, 0), (self.width, self.height), &buffer)?;
            plane = buffer.data;
        }

        let dst_driver =
            DriverManager::get_driver_by_name(driver.unwrap_or(self.driver.as_str()))?;
        dst_driver.create_copy(path, &proxy, &[])?;
        Ok(())
    }
}

/// A raster whose sample type was resolved at open time.
#[derive(Debug, Clone)]
pub enum AnyRaster {
    U8(Raster<u8>),
    U16(Raster<u16>),
    F32(Raster<f32>),
}

impl AnyRaster {
    /// Open a raster file and load all samples into memory.
    ///
    /// Fails if the file is absent, the bands disagree on their sample
    /// type, or the sample type is not 8-bit, 16-bit or 32-bit float.
    pub fn open(path: &Path) -> Result<Self, RasterError> {
        if !path.exists() {
            return Err(RasterError::FileNotFound(path.to_path_buf()));
        }

        let ds = Dataset::open(path)?;
        let band_count = ds.raster_count();
        if band_count < 1 {
            return Err(RasterError::NoBands {
                path: path.to_path_buf(),
            });
        }

        let sample_type = ds.rasterband(1)?.band_type();
        for b in 2..=band_count {
            if ds.rasterband(b)?.band_type() != sample_type {
                return Err(RasterError::MixedBandTypes {
                    path: path.to_path_buf(),
                });
            }
        }

        match sample_type {
            GdalDataType::UInt8 => Ok(AnyRaster::U8(Raster::read_from(&ds)?)),
            GdalDataType::UInt16 => Ok(AnyRaster::U16(Raster::read_from(&ds)?)),
            GdalDataType::Float32 => Ok(AnyRaster::F32(Raster::read_from(&ds)?)),
            other => Err(RasterError::UnsupportedSampleType {
                path: path.to_path_buf(),
                type_name: format!("{other:?}"),
            }),
        }
    }

    pub fn width(&self) -> usize {
        match self {
            AnyRaster::U8(r) => r.width(),
            AnyRaster::U16(r) => r.width(),
            AnyRaster::F32(r) => r.width(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            AnyRaster::U8(r) => r.height(),
            AnyRaster::U16(r) => r.height(),
            AnyRaster::F32(r) => r.height(),
        }
    }

    pub fn bands(&self) -> usize {
        match self {
            AnyRaster::U8(r) => r.bands(),
            AnyRaster::U16(r) => r.bands(),
            AnyRaster::F32(r) => r.bands(),
        }
    }
}

//! Affine geo-transform between raster pixel indices and world
//! coordinates.
//!
//! Coefficients follow the GDAL convention
//! `(ox, sx, rx, oy, ry, sy)`:
//!
//! ```text
//! wx = sx * col + rx * row + ox
//! wy = ry * col + sy * row + oy
//! ```
//!
//! `col`/`row` are continuous pixel indices; integer indices address
//! the pixel's upper-left corner, `+0.5` its centre.

use serde::{Deserialize, Serialize};

/// Affine map between pixel indices and world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    coeffs: [f64; 6],
}

impl GeoTransform {
    /// Build from the six GDAL geotransform coefficients.
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self { coeffs }
    }

    /// The six coefficients in GDAL order.
    pub fn to_gdal(&self) -> [f64; 6] {
        self.coeffs
    }

    /// World x offset (`ox`).
    pub fn origin_x(&self) -> f64 {
        self.coeffs[0]
    }

    /// World y offset (`oy`).
    pub fn origin_y(&self) -> f64 {
        self.coeffs[3]
    }

    /// Column scale (`sx`).
    pub fn scale_x(&self) -> f64 {
        self.coeffs[1]
    }

    /// Row scale (`sy`).
    pub fn scale_y(&self) -> f64 {
        self.coeffs[5]
    }

    /// Determinant of the linear part; zero means the transform cannot
    /// be inverted and the raster is unusable as a grid.
    pub fn determinant(&self) -> f64 {
        let [_, sx, rx, _, ry, sy] = self.coeffs;
        sx * sy - rx * ry
    }

    /// World coordinates to continuous pixel indices `(col, row)`.
    ///
    /// Inverts the full affine map, off-diagonal terms included. The
    /// result is not clamped to the raster extent.
    pub fn index(&self, wx: f64, wy: f64) -> (f64, f64) {
        let [ox, sx, rx, oy, ry, sy] = self.coeffs;
        let det = sx * sy - rx * ry;
        let dx = wx - ox;
        let dy = wy - oy;
        let col = (sy * dx - rx * dy) / det;
        let row = (sx * dy - ry * dx) / det;
        (col, row)
    }

    /// World coordinates of the centre of pixel `(col, row)`.
    pub fn center(&self, col: f64, row: f64) -> (f64, f64) {
        self.apply(col + 0.5, row + 0.5)
    }

    /// World coordinates of the upper-left corner of pixel `(col, row)`.
    pub fn corner(&self, col: f64, row: f64) -> (f64, f64) {
        self.apply(col, row)
    }

    /// Replace the translation so that pixel `(0, 0)`'s corner lands on
    /// the given world point, keeping scale and rotation.
    pub fn with_origin(&self, wx: f64, wy: f64) -> Self {
        let [_, sx, rx, _, ry, sy] = self.coeffs;
        Self {
            coeffs: [wx, sx, rx, wy, ry, sy],
        }
    }

    fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let [ox, sx, rx, oy, ry, sy] = self.coeffs;
        (sx * col + rx * row + ox, ry * col + sy * row + oy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    #[test]
    fn index_inverts_corner_on_diagonal_transform() {
        let t = GeoTransform::from_gdal([440000.0, 0.25, 0.0, 4588000.0, 0.0, -0.25]);
        let (wx, wy) = t.corner(12.0, 34.0);
        let (col, row) = t.index(wx, wy);
        assert!((col - 12.0).abs() < TOL);
        assert!((row - 34.0).abs() < TOL);
    }

    #[test]
    fn center_index_roundtrip() {
        // center(index(w) - 0.5) == w for any world point
        let t = GeoTransform::from_gdal([100.0, 2.0, 0.0, 50.0, 0.0, -2.0]);
        let (wx, wy) = (137.3, -12.9);
        let (col, row) = t.index(wx, wy);
        let (bx, by) = t.center(col - 0.5, row - 0.5);
        assert!((bx - wx).abs() < TOL);
        assert!((by - wy).abs() < TOL);
    }

    #[test]
    fn off_diagonal_terms_are_honoured() {
        let t = GeoTransform::from_gdal([10.0, 1.0, 0.2, 20.0, -0.1, 1.0]);
        let (wx, wy) = t.corner(3.0, 7.0);
        assert!((wx - (1.0 * 3.0 + 0.2 * 7.0 + 10.0)).abs() < TOL);
        assert!((wy - (-0.1 * 3.0 + 1.0 * 7.0 + 20.0)).abs() < TOL);
        let (col, row) = t.index(wx, wy);
        assert!((col - 3.0).abs() < TOL);
        assert!((row - 7.0).abs() < TOL);
    }

    #[test]
    fn with_origin_keeps_scale_and_rotation() {
        let t = GeoTransform::from_gdal([10.0, 1.0, 0.2, 20.0, -0.1, -1.0]);
        let c = t.with_origin(55.0, 66.0);
        let g = c.to_gdal();
        assert_eq!(g[0], 55.0);
        assert_eq!(g[3], 66.0);
        assert_eq!(g[1], 1.0);
        assert_eq!(g[2], 0.2);
        assert_eq!(g[4], -0.1);
        assert_eq!(g[5], -1.0);
    }

    #[test]
    fn degenerate_transform_has_zero_determinant() {
        let t = GeoTransform::from_gdal([0.0, 1.0, 1.0, 0.0, 1.0, 1.0]);
        assert_eq!(t.determinant(), 0.0);
    }
}

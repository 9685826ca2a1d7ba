//! Multi-band georeferenced grid.
//!
//! A `Raster` is a dense row-major stack of Float32 bands with a band-name
//! registry and an affine pixel/world transform. Three frames are
//! distinguished:
//! - pixel `(u, v)`: integer cell indices, `index = u + v * width`;
//! - UTM: absolute meters, upper-left origin plus per-pixel scales
//!   (`scale_y` is negative for north-up imagery);
//! - custom: meters relative to a configurable local origin.
//!
//! Snapshots are serialized with bincode (cost values include `+inf`,
//! which a textual format would mangle); the GeoTIFF codec itself lives
//! outside this workspace.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::Point2;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("no band named {0:?}")]
    MissingBand(String),
    #[error("band {band} has {actual} cells, expected {expected}")]
    SizeMismatch {
        band: usize,
        expected: usize,
        actual: usize,
    },
    #[error("point ({x}, {y}) outside the raster")]
    OutOfBounds { x: f64, y: f64 },
    #[error("failed to read raster snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse raster snapshot: {0}")]
    Parse(#[from] bincode::Error),
}

/// Multi-band Float32 raster with georeferencing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raster {
    /// Row-major bands, each `width * height` cells
    bands: Vec<Vec<f32>>,
    /// Band names, parallel to `bands` (may be empty strings)
    names: Vec<String>,
    width: usize,
    height: usize,
    /// Upper-left corner in UTM meters
    utm_origin: Vector2<f64>,
    /// Per-pixel scale in meters (`y` negative for north-up)
    scale: Vector2<f64>,
    utm_zone: u32,
    utm_north: bool,
    /// Local-frame origin, in UTM meters
    custom_origin: Vector2<f64>,
}

impl Raster {
    /// Create a raster of `n` zeroed bands with a unit transform.
    pub fn new(n: usize, width: usize, height: usize) -> Self {
        Self {
            bands: vec![vec![0.0; width * height]; n],
            names: vec![String::new(); n],
            width,
            height,
            utm_origin: Vector2::zeros(),
            scale: Vector2::new(1.0, 1.0),
            utm_zone: 0,
            utm_north: true,
            custom_origin: Vector2::zeros(),
        }
    }

    /// Create `n` zeroed bands inheriting size and georeferencing from
    /// `other`.
    pub fn like(other: &Raster, n: usize) -> Self {
        Self {
            bands: vec![vec![0.0; other.width * other.height]; n],
            names: vec![String::new(); n],
            width: other.width,
            height: other.height,
            utm_origin: other.utm_origin,
            scale: other.scale,
            utm_zone: other.utm_zone,
            utm_north: other.utm_north,
            custom_origin: other.custom_origin,
        }
    }

    /// Set the UTM projection zone and hemisphere.
    pub fn set_utm(&mut self, zone: u32, north: bool) {
        self.utm_zone = zone;
        self.utm_north = north;
    }

    /// Set the affine transform: upper-left UTM position and pixel scales.
    pub fn set_transform(&mut self, pos_x: f64, pos_y: f64, scale_x: f64, scale_y: f64) {
        self.utm_origin = Vector2::new(pos_x, pos_y);
        self.scale = Vector2::new(scale_x, scale_y);
    }

    /// Set the local-frame origin (UTM meters).
    pub fn set_custom_origin(&mut self, x: f64, y: f64) {
        self.custom_origin = Vector2::new(x, y);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn scale_x(&self) -> f64 {
        self.scale.x
    }

    pub fn scale_y(&self) -> f64 {
        self.scale.y
    }

    pub fn utm_pose_x(&self) -> f64 {
        self.utm_origin.x
    }

    pub fn utm_pose_y(&self) -> f64 {
        self.utm_origin.y
    }

    pub fn utm_zone(&self) -> (u32, bool) {
        (self.utm_zone, self.utm_north)
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Name a band.
    pub fn set_band_name(&mut self, idx: usize, name: &str) {
        self.names[idx] = name.to_string();
    }

    pub fn band_name(&self, idx: usize) -> &str {
        &self.names[idx]
    }

    /// Index of the band carrying `name`.
    pub fn band_id(&self, name: &str) -> Result<usize, RasterError> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| RasterError::MissingBand(name.to_string()))
    }

    pub fn band(&self, name: &str) -> Result<&[f32], RasterError> {
        Ok(&self.bands[self.band_id(name)?])
    }

    pub fn band_mut(&mut self, name: &str) -> Result<&mut [f32], RasterError> {
        let id = self.band_id(name)?;
        Ok(&mut self.bands[id])
    }

    pub fn band_at(&self, idx: usize) -> &[f32] {
        &self.bands[idx]
    }

    pub fn band_at_mut(&mut self, idx: usize) -> &mut [f32] {
        &mut self.bands[idx]
    }

    pub fn band_names(&self) -> &[String] {
        &self.names
    }

    /// Min-max normalize a band to `0..=255` for display tooling.
    /// Non-finite cells map to 0.
    pub fn band_as_grayscale(&self, name: &str) -> Result<Vec<u8>, RasterError> {
        let band = self.band(name)?;
        let (mut lo, mut hi) = (f32::INFINITY, f32::NEG_INFINITY);
        for &value in band {
            if value.is_finite() {
                lo = lo.min(value);
                hi = hi.max(value);
            }
        }
        let span = if hi > lo { hi - lo } else { 1.0 };
        Ok(band
            .iter()
            .map(|&value| {
                if value.is_finite() {
                    (255.0 * (value - lo) / span) as u8
                } else {
                    0
                }
            })
            .collect())
    }

    /// Row-major cell index. The caller guarantees `u < width`,
    /// `v < height`.
    pub fn index(&self, u: usize, v: usize) -> usize {
        u + v * self.width
    }

    /// Pixel cell under a UTM point.
    pub fn cell_utm(&self, p: &Point2) -> Result<(usize, usize), RasterError> {
        let u = (p.x - self.utm_origin.x) / self.scale.x;
        let v = (p.y - self.utm_origin.y) / self.scale.y;
        self.check_cell(u.round(), v.round(), p)
    }

    /// Pixel cell under a custom-frame point.
    pub fn cell_custom(&self, p: &Point2) -> Result<(usize, usize), RasterError> {
        self.cell_utm(&self.custom_to_utm(p))
    }

    /// Row-major index of the cell under a UTM point.
    pub fn index_utm(&self, p: &Point2) -> Result<usize, RasterError> {
        let (u, v) = self.cell_utm(p)?;
        Ok(self.index(u, v))
    }

    /// Row-major index of the cell under a custom-frame point.
    pub fn index_custom(&self, p: &Point2) -> Result<usize, RasterError> {
        let (u, v) = self.cell_custom(p)?;
        Ok(self.index(u, v))
    }

    fn check_cell(&self, u: f64, v: f64, p: &Point2) -> Result<(usize, usize), RasterError> {
        if u < 0.0 || v < 0.0 || u as usize >= self.width || v as usize >= self.height {
            return Err(RasterError::OutOfBounds { x: p.x, y: p.y });
        }
        Ok((u as usize, v as usize))
    }

    pub fn custom_to_utm(&self, p: &Point2) -> Point2 {
        Point2::new(p.x + self.custom_origin.x, p.y + self.custom_origin.y)
    }

    pub fn utm_to_custom(&self, p: &Point2) -> Point2 {
        Point2::new(p.x - self.custom_origin.x, p.y - self.custom_origin.y)
    }

    /// Custom frame → pixel-scaled frame (UTM minus the raster origin).
    /// The navigation graph synthesizes its vertices in this frame.
    pub fn custom_to_internal(&self, p: &Point2) -> Point2 {
        Point2::new(
            p.x + self.custom_origin.x - self.utm_origin.x,
            p.y + self.custom_origin.y - self.utm_origin.y,
        )
    }

    /// Pixel-scaled frame → custom frame.
    pub fn internal_to_custom(&self, p: &Point2) -> Point2 {
        Point2::new(
            p.x + self.utm_origin.x - self.custom_origin.x,
            p.y + self.utm_origin.y - self.custom_origin.y,
        )
    }

    /// Pixel-scaled coordinates of a pixel cell.
    pub fn internal_of_cell(&self, u: usize, v: usize) -> Point2 {
        Point2::new(u as f64 * self.scale.x, v as f64 * self.scale.y)
    }

    /// Pixel cell under a pixel-scaled point.
    pub fn cell_of_internal(&self, p: &Point2) -> Result<(usize, usize), RasterError> {
        let u = p.x / self.scale.x;
        let v = p.y / self.scale.y;
        self.check_cell(u.round(), v.round(), p)
    }

    /// Write a snapshot.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RasterError> {
        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Read a snapshot, validating band sizes.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let file = File::open(path)?;
        let raster: Raster = bincode::deserialize_from(BufReader::new(file))?;
        let expected = raster.width * raster.height;
        for (band, data) in raster.bands.iter().enumerate() {
            if data.len() != expected {
                return Err(RasterError::SizeMismatch {
                    band,
                    expected,
                    actual: data.len(),
                });
            }
        }
        Ok(raster)
    }
}

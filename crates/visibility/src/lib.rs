//! Line-of-sight tests over a digital terrain model.
//!
//! The terrain model is a raster with two bands: `Z_MAX`, the maximum
//! elevation observed in each cell, and `N_POINTS`, the number of
//! samples accumulated there (0 meaning the cell was never observed).
//!
//! Sight between two 3D points is decided by a half-plane occlusion
//! test along the Bresenham line between their cells: the line of sight
//! drops linearly from the source elevation to the target elevation,
//! and any observed cell poking above that plane blocks it. Cells that
//! were never observed are transparent, but an unobserved endpoint is
//! conservatively reported as not visible.

use nalgebra::{Isometry2, Vector2};
use raster::{Raster, RasterError};
use robot::{AntennaModel, RobotError, RobotModel, SensorModel};
use thiserror::Error;
use tracing::warn;
use types::{Point2, Point3, Pose};

mod bresenham;

pub use bresenham::bresenham;

/// Band name for per-cell maximum elevation.
pub const BAND_Z_MAX: &str = "Z_MAX";
/// Band name for per-cell accumulated sample counts.
pub const BAND_N_POINTS: &str = "N_POINTS";

const EPSILON: f64 = 1e-6;

#[derive(Error, Debug)]
pub enum VisibilityError {
    #[error("bad elevation raster: {0}")]
    BadRaster(#[from] RasterError),
    #[error("bad robot description: {0}")]
    BadRobot(#[from] RobotError),
    #[error("robot description has no sensor")]
    MissingSensor,
}

/// Visibility tester owning an elevation raster and a robot description.
#[derive(Debug, Clone)]
pub struct VisibilityTester {
    dtm: Raster,
    sensor: SensorModel,
    antenna: Option<AntennaModel>,
    radius: f64,
}

impl VisibilityTester {
    /// Check the raster bands and robot description and build a tester.
    pub fn new(dtm: Raster, robot: &RobotModel) -> Result<Self, VisibilityError> {
        robot.validate()?;
        dtm.band(BAND_Z_MAX)?;
        dtm.band(BAND_N_POINTS)?;
        let sensor = robot.sensor.ok_or(VisibilityError::MissingSensor)?;
        Ok(Self {
            dtm,
            sensor,
            antenna: robot.antenna,
            radius: robot.radius,
        })
    }

    pub fn dtm(&self) -> &Raster {
        &self.dtm
    }

    /// Geometric line-of-sight between two 3D points (custom frame;
    /// `z` is height above the terrain surface).
    pub fn is_visible(&self, from: &Point3, to: &Point3) -> Result<bool, RasterError> {
        let from_xy = from.xy();
        let to_xy = to.xy();

        // touching points see each other
        let d0 = from_xy.distance(&to_xy);
        if d0 < self.radius + EPSILON {
            return Ok(true);
        }

        let z_max = self.dtm.band(BAND_Z_MAX)?;
        let n_points = self.dtm.band(BAND_N_POINTS)?;

        let from_cell = self.dtm.cell_custom(&from_xy)?;
        let to_cell = self.dtm.cell_custom(&to_xy)?;

        // unobserved endpoints are conservatively invisible
        if (n_points[self.dtm.index(from_cell.0, from_cell.1)] as f64) < 1.0 - EPSILON
            || (n_points[self.dtm.index(to_cell.0, to_cell.1)] as f64) < 1.0 - EPSILON
        {
            return Ok(false);
        }

        let zs = from.z + z_max[self.dtm.index(from_cell.0, from_cell.1)] as f64;
        let zt = to.z + z_max[self.dtm.index(to_cell.0, to_cell.1)] as f64;
        // occlusion half-plane: a*d + z - zs = 0
        let a = (zs - zt) / d0;

        let line = bresenham(
            (from_cell.0 as i32, from_cell.1 as i32),
            (to_cell.0 as i32, to_cell.1 as i32),
        );
        for (u, v) in line {
            let idx = self.dtm.index(u as usize, v as usize);
            // never-observed cells are transparent
            if (n_points[idx] as f64) < 1.0 - EPSILON {
                continue;
            }
            let p = self.custom_of_cell(u as usize, v as usize);
            let d = from_xy.distance(&p);
            let z = z_max[idx] as f64;
            if a * d + z - zs > EPSILON {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Can the body-mounted sensor at `from` observe `to`?
    pub fn is_sensor_visible(&self, from: &Point2, to: &Point2) -> Result<bool, RasterError> {
        let eye = Point3::new(
            from.x + self.sensor.pose.x,
            from.y + self.sensor.pose.y,
            self.sensor.pose.z,
        );
        if eye.xy().distance(to) > self.sensor.range - EPSILON {
            return Ok(false);
        }
        self.is_visible(&eye, &Point3::new(to.x, to.y, 0.0))
    }

    /// Like `is_sensor_visible`, but from a full body pose: the sensor
    /// mount offset is rotated by the robot's heading before the test.
    pub fn is_sensor_visible_from(&self, from: &Pose, to: &Point2) -> Result<bool, RasterError> {
        let body = Isometry2::new(Vector2::new(from.x, from.y), from.theta);
        let mount = body
            .transform_point(&nalgebra::Point2::new(self.sensor.pose.x, self.sensor.pose.y));
        let eye = Point3::new(mount.x, mount.y, from.z + self.sensor.pose.z);
        if eye.xy().distance(to) > self.sensor.range - EPSILON {
            return Ok(false);
        }
        self.is_visible(&eye, &Point3::new(to.x, to.y, 0.0))
    }

    /// Can the antenna at `from` reach `to`? `false` when the robot
    /// carries no antenna.
    pub fn is_antenna_visible(&self, from: &Point2, to: &Point2) -> Result<bool, RasterError> {
        let Some(antenna) = &self.antenna else {
            warn!("communication query on a robot without antenna");
            return Ok(false);
        };
        let eye = Point3::new(
            from.x + antenna.pose.x,
            from.y + antenna.pose.y,
            antenna.pose.z,
        );
        if eye.xy().distance(to) > antenna.range - EPSILON {
            return Ok(false);
        }
        self.is_visible(&eye, &Point3::new(to.x, to.y, 0.0))
    }

    /// Radio link test between two 3D points, gated by the antenna
    /// range.
    pub fn can_communicate(&self, a: &Point3, b: &Point3) -> Result<bool, RasterError> {
        let Some(antenna) = &self.antenna else {
            warn!("communication query on a robot without antenna");
            return Ok(false);
        };
        if a.distance(b) > antenna.range - EPSILON {
            return Ok(false);
        }
        self.is_visible(a, b)
    }

    fn custom_of_cell(&self, u: usize, v: usize) -> Point2 {
        self.dtm
            .internal_to_custom(&self.dtm.internal_of_cell(u, v))
    }
}

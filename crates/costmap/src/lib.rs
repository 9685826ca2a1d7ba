//! Traversal cost map built from a terrain classification raster.
//!
//! The input raster carries one probability band per terrain class
//! (`FLAT`, `ROUGH`, `SLOPE`, ...) plus `NO_3D_CLASS` (no 3D data, i.e.
//! unknown terrain) and `OBSTACLE`. The output is a single band named
//! `WEIGHT` holding, per cell:
//! - a finite positive traversal time in seconds per meter,
//! - `+inf` for a hard obstacle,
//! - a negative sentinel for unknown terrain.

use raster::{Raster, RasterError};
use robot::{RobotError, RobotModel};
use thiserror::Error;
use tracing::{debug, info};
use types::Point2;

/// Sentinel for cells with no terrain information.
pub const W_UNKNOWN: f32 = -1.0;
/// Transient marker used while inflating obstacles.
pub const W_FLAG_OBSTACLE: f32 = -2.0;
/// Cost committed to cells flagged during inflation (s/m). Finite, so
/// inflated cells never seed a second inflation pass.
pub const W_INFLATED: f32 = 99.0;

/// Band names the builder requires.
pub const BAND_NO_3D_CLASS: &str = "NO_3D_CLASS";
pub const BAND_OBSTACLE: &str = "OBSTACLE";
/// Band name of the produced cost raster.
pub const BAND_WEIGHT: &str = "WEIGHT";

#[derive(Error, Debug)]
pub enum CostmapError {
    #[error("bad terrain raster: {0}")]
    BadRaster(#[from] RasterError),
    #[error("bad robot description: {0}")]
    BadRobot(#[from] RobotError),
}

/// Classification thresholds. Deployments tune these; the defaults
/// match the reference data set.
#[derive(Debug, Clone, Copy)]
pub struct CostMapParams {
    /// `NO_3D_CLASS` probability above which a cell is unknown
    pub unknown_threshold: f32,
    /// `OBSTACLE` probability above which a cell is a hard obstacle
    pub obstacle_threshold: f32,
}

impl Default for CostMapParams {
    fn default() -> Self {
        Self {
            unknown_threshold: 0.9,
            obstacle_threshold: 0.4,
        }
    }
}

/// `w == +inf`: hard obstacle.
pub fn is_obstacle(w: f32) -> bool {
    w == f32::INFINITY
}

/// `w < 0`: unknown terrain.
pub fn is_unknown(w: f32) -> bool {
    w < 0.0
}

/// Finite positive cost: traversable, known cell.
pub fn is_open(w: f32) -> bool {
    w > 0.0 && w.is_finite()
}

/// Single-band traversal cost raster plus the inputs it was built from.
#[derive(Debug, Clone)]
pub struct CostMap {
    /// Source terrain classification (multi-band)
    terrain: Raster,
    /// Produced cost raster (single `WEIGHT` band)
    map: Raster,
    robot: RobotModel,
}

impl CostMap {
    /// Build a cost map with default thresholds.
    pub fn new(terrain: Raster, robot: RobotModel) -> Result<Self, CostmapError> {
        Self::with_params(terrain, robot, CostMapParams::default())
    }

    /// Build a cost map.
    ///
    /// Fails if the robot description is invalid or the terrain raster
    /// misses `NO_3D_CLASS`, `OBSTACLE`, or any band named in the
    /// robot's cost table.
    pub fn with_params(
        terrain: Raster,
        robot: RobotModel,
        params: CostMapParams,
    ) -> Result<Self, CostmapError> {
        robot.validate()?;

        let no_3d = terrain.band(BAND_NO_3D_CLASS)?;
        let obstacle = terrain.band(BAND_OBSTACLE)?;
        let classes: Vec<(&[f32], f32)> = robot
            .costs
            .iter()
            .map(|(name, weight)| Ok((terrain.band(name)?, *weight as f32)))
            .collect::<Result<_, RasterError>>()?;

        let velocity = robot.velocity as f32;
        let mut map = Raster::like(&terrain, 1);
        map.set_band_name(0, BAND_WEIGHT);

        let (mut n_unknown, mut n_obstacle) = (0usize, 0usize);
        let weights = map.band_at_mut(0);
        for pos in 0..weights.len() {
            weights[pos] = if no_3d[pos] > params.unknown_threshold {
                n_unknown += 1;
                W_UNKNOWN
            } else if obstacle[pos] > params.obstacle_threshold {
                n_obstacle += 1;
                f32::INFINITY
            } else {
                // mix of class probabilities weighted by the robot's
                // cost table; the 1.0 floor keeps every cost positive
                let mut weight = 1.0;
                for (band, class_weight) in &classes {
                    weight += class_weight * band[pos];
                }
                weight / velocity
            };
        }

        info!(
            width = terrain.width(),
            height = terrain.height(),
            unknown = n_unknown,
            obstacles = n_obstacle,
            "cost map built"
        );

        Ok(Self {
            terrain,
            map,
            robot,
        })
    }

    /// Wrap an already-built cost raster (e.g. a loaded snapshot).
    pub fn from_weight_raster(map: Raster, robot: RobotModel) -> Result<Self, CostmapError> {
        robot.validate()?;
        map.band(BAND_WEIGHT)?;
        let terrain = Raster::like(&map, 0);
        Ok(Self {
            terrain,
            map,
            robot,
        })
    }

    /// Grow obstacles by the robot radius.
    ///
    /// Every cell within `floor(radius / scale)` cells (per axis) of a
    /// hard obstacle is committed to the finite `W_INFLATED` cost. A
    /// two-pass flag-then-commit keeps the pass from cascading, and the
    /// finite commit value leaves the obstacle seed set unchanged, so
    /// calling this twice is a no-op.
    pub fn inflate_obstacles(&mut self) {
        let width = self.map.width() as i64;
        let height = self.map.height() as i64;
        let rx = (self.robot.radius / self.map.scale_x().abs()).floor() as i64;
        let ry = (self.robot.radius / self.map.scale_y().abs()).floor() as i64;

        let weights = self.map.band_at_mut(0);
        for y in 0..height {
            for x in 0..width {
                if !is_obstacle(weights[(x + y * width) as usize]) {
                    continue;
                }
                for dy in -ry..=ry {
                    for dx in -rx..=rx {
                        let (nx, ny) = (x + dx, y + dy);
                        if nx < 0 || ny < 0 || nx >= width || ny >= height {
                            continue;
                        }
                        let w = &mut weights[(nx + ny * width) as usize];
                        if !is_obstacle(*w) {
                            *w = W_FLAG_OBSTACLE;
                        }
                    }
                }
            }
        }

        let mut flagged = 0usize;
        for w in weights.iter_mut() {
            if *w == W_FLAG_OBSTACLE {
                *w = W_INFLATED;
                flagged += 1;
            }
        }
        debug!(cells = flagged, rx, ry, "obstacles inflated");
    }

    /// The cost values, row-major.
    pub fn weights(&self) -> &[f32] {
        self.map.band_at(0)
    }

    /// The produced cost raster.
    pub fn raster(&self) -> &Raster {
        &self.map
    }

    /// The source terrain raster.
    pub fn terrain(&self) -> &Raster {
        &self.terrain
    }

    pub fn robot(&self) -> &RobotModel {
        &self.robot
    }

    pub fn width(&self) -> usize {
        self.map.width()
    }

    pub fn height(&self) -> usize {
        self.map.height()
    }

    /// Cost of the cell `(u, v)`.
    pub fn cost_at(&self, u: usize, v: usize) -> f32 {
        self.map.band_at(0)[self.map.index(u, v)]
    }

    /// Cost of the cell under a custom-frame point.
    pub fn cost_at_custom(&self, p: &Point2) -> Result<f32, RasterError> {
        Ok(self.map.band_at(0)[self.map.index_custom(p)?])
    }

    /// Overwrite the cost of one cell. Callers holding derived planners
    /// must go through their replanning contract instead.
    pub fn set_cost_at(&mut self, u: usize, v: usize, cost: f32) {
        let idx = self.map.index(u, v);
        self.map.band_at_mut(0)[idx] = cost;
    }

    /// 8-bit preview of the cost raster for display tooling: unknown
    /// cells black, obstacles white, everything else scaled.
    pub fn as_grayscale(&self) -> Vec<u8> {
        self.map
            .band_at(0)
            .iter()
            .map(|&w| {
                if w < 0.0 {
                    0
                } else if is_obstacle(w) {
                    255
                } else {
                    (w * 5.0).floor().min(254.0) as u8
                }
            })
            .collect()
    }

    /// Snapshot the cost raster.
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), RasterError> {
        self.map.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 9x9 terrain raster, FLAT everywhere, with per-test overrides.
    fn flat_terrain() -> Raster {
        let mut r = Raster::new(4, 9, 9);
        r.set_band_name(0, "FLAT");
        r.set_band_name(1, "OBSTACLE");
        r.set_band_name(2, "NO_3D_CLASS");
        r.set_band_name(3, "ROUGH");
        r.band_mut("FLAT").unwrap().fill(1.0);
        r
    }

    fn robot() -> RobotModel {
        let mut robot = RobotModel::new(1.0, 1.0);
        robot.costs.insert("FLAT".into(), 0.0);
        robot.costs.insert("ROUGH".into(), 5.0);
        robot
    }

    #[test]
    fn test_single_obstacle_cell() {
        let mut terrain = flat_terrain();
        let idx = 4 + 4 * 9;
        terrain.band_mut("FLAT").unwrap()[idx] = 0.5;
        terrain.band_mut("OBSTACLE").unwrap()[idx] = 0.5;

        let map = CostMap::new(terrain, robot()).unwrap();
        assert!(is_obstacle(map.cost_at(4, 4)));
        for pos in 0..81 {
            if pos == idx {
                continue;
            }
            assert_relative_eq!(map.weights()[pos], 1.0);
        }
    }

    #[test]
    fn test_cell_trichotomy() {
        let mut terrain = flat_terrain();
        terrain.band_mut("NO_3D_CLASS").unwrap()[3] = 1.0;
        terrain.band_mut("OBSTACLE").unwrap()[7] = 0.8;
        let map = CostMap::new(terrain, robot()).unwrap();
        for &w in map.weights() {
            let classes =
                is_open(w) as u8 + is_obstacle(w) as u8 + is_unknown(w) as u8;
            assert_eq!(classes, 1);
            assert!(!w.is_nan());
        }
    }

    #[test]
    fn test_class_weight_mix() {
        let mut terrain = flat_terrain();
        // half rough halves the flat probability
        terrain.band_mut("FLAT").unwrap()[10] = 0.5;
        terrain.band_mut("ROUGH").unwrap()[10] = 0.5;
        let mut robot = robot();
        robot.velocity = 2.0;
        let map = CostMap::new(terrain, robot).unwrap();
        // (1 + 0*0.5 + 5*0.5) / 2
        assert_relative_eq!(map.weights()[10], 1.75);
        assert_relative_eq!(map.weights()[11], 0.5);
    }

    #[test]
    fn test_thresholds_are_exclusive_bounds() {
        let mut terrain = flat_terrain();
        // exactly at the thresholds: still a regular cell
        terrain.band_mut("NO_3D_CLASS").unwrap()[0] = 0.9;
        terrain.band_mut("OBSTACLE").unwrap()[1] = 0.4;
        let map = CostMap::new(terrain, robot()).unwrap();
        assert!(is_open(map.weights()[0]));
        assert!(is_open(map.weights()[1]));
    }

    #[test]
    fn test_custom_thresholds() {
        let mut terrain = flat_terrain();
        terrain.band_mut("OBSTACLE").unwrap()[5] = 0.3;
        let params = CostMapParams {
            unknown_threshold: 0.9,
            obstacle_threshold: 0.25,
        };
        let map = CostMap::with_params(terrain, robot(), params).unwrap();
        assert!(is_obstacle(map.weights()[5]));
    }

    #[test]
    fn test_velocity_scales_every_cost() {
        let mut fast = robot();
        fast.velocity = 4.0;
        let map = CostMap::new(flat_terrain(), fast).unwrap();
        assert_relative_eq!(map.weights()[0], 0.25);
    }

    #[test]
    fn test_inflation_clips_at_the_border() {
        let mut terrain = flat_terrain();
        terrain.band_mut("OBSTACLE").unwrap()[0] = 1.0;
        let mut map = CostMap::new(terrain, robot()).unwrap();
        map.inflate_obstacles();
        assert!(is_obstacle(map.cost_at(0, 0)));
        assert_relative_eq!(map.cost_at(1, 0), W_INFLATED);
        assert_relative_eq!(map.cost_at(1, 1), W_INFLATED);
        assert_relative_eq!(map.cost_at(2, 2), 1.0);
    }

    #[test]
    fn test_inflation_skips_small_radius() {
        let mut terrain = flat_terrain();
        terrain.band_mut("OBSTACLE").unwrap()[4 + 4 * 9] = 1.0;
        let mut robot = robot();
        robot.radius = 0.4;
        let mut map = CostMap::new(terrain, robot).unwrap();
        map.inflate_obstacles();
        // a radius below one cell inflates nothing
        assert_relative_eq!(map.cost_at(3, 4), 1.0);
        assert!(is_obstacle(map.cost_at(4, 4)));
    }

    #[test]
    fn test_missing_band_is_rejected() {
        let mut terrain = Raster::new(2, 4, 4);
        terrain.set_band_name(0, "FLAT");
        terrain.set_band_name(1, "OBSTACLE");
        let err = CostMap::new(terrain, RobotModel::new(1.0, 1.0)).unwrap_err();
        assert!(matches!(
            err,
            CostmapError::BadRaster(RasterError::MissingBand(_))
        ));
    }

    #[test]
    fn test_missing_cost_class_band_is_rejected() {
        let mut terrain = Raster::new(2, 4, 4);
        terrain.set_band_name(0, "NO_3D_CLASS");
        terrain.set_band_name(1, "OBSTACLE");
        let mut robot = RobotModel::new(1.0, 1.0);
        robot.costs.insert("GRAVEL".into(), 2.0);
        assert!(CostMap::new(terrain, robot).is_err());
    }

    #[test]
    fn test_invalid_robot_is_rejected() {
        let terrain = flat_terrain();
        let err = CostMap::new(terrain, RobotModel::new(1.0, 0.0)).unwrap_err();
        assert!(matches!(err, CostmapError::BadRobot(_)));
    }

    #[test]
    fn test_inflation_is_idempotent() {
        let mut terrain = flat_terrain();
        terrain.band_mut("OBSTACLE").unwrap()[4 + 4 * 9] = 1.0;
        let mut map = CostMap::new(terrain, robot()).unwrap();

        map.inflate_obstacles();
        let once = map.weights().to_vec();
        // the 3x3 box around the obstacle is inflated, obstacle kept
        assert!(is_obstacle(once[4 + 4 * 9]));
        assert_relative_eq!(once[3 + 4 * 9], W_INFLATED);
        assert_relative_eq!(once[5 + 3 * 9], W_INFLATED);
        assert_relative_eq!(once[2 + 4 * 9], 1.0);

        map.inflate_obstacles();
        assert_eq!(map.weights(), once.as_slice());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weight.bin");

        let mut terrain = flat_terrain();
        terrain.band_mut("OBSTACLE").unwrap()[7] = 0.9;
        let map = CostMap::new(terrain, robot()).unwrap();
        map.save(&path).unwrap();

        let loaded = Raster::load(&path).unwrap();
        let reloaded = CostMap::from_weight_raster(loaded, robot()).unwrap();
        assert_eq!(reloaded.weights(), map.weights());
        assert!(is_obstacle(reloaded.weights()[7]));
    }

    #[test]
    fn test_grayscale_preview() {
        let mut terrain = flat_terrain();
        terrain.band_mut("NO_3D_CLASS").unwrap()[0] = 1.0;
        terrain.band_mut("OBSTACLE").unwrap()[1] = 0.9;
        let map = CostMap::new(terrain, robot()).unwrap();
        let gray = map.as_grayscale();
        assert_eq!(gray[0], 0);
        assert_eq!(gray[1], 255);
        assert_eq!(gray[2], 5);
    }
}

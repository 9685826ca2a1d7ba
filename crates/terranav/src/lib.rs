//! Facade combining the navigation graph and the visibility tester.
//!
//! All public queries speak the custom frame (meters relative to the
//! raster's configured local origin); conversions to the pixel-scaled
//! frame the graph plans in happen at this boundary.

use costmap::{CostMap, CostmapError};
use navgraph::{NavGraph, PathCost};
use raster::{Raster, RasterError};
use robot::{RobotError, RobotModel};
use thiserror::Error;
use tracing::{debug, info};
use types::{path_to_string, Path, Point2, Point3};
use visibility::{VisibilityError, VisibilityTester};

pub use explore::{Algorithm, FrontierDetector};

#[derive(Error, Debug)]
pub enum TerranavError {
    #[error(transparent)]
    Costmap(#[from] CostmapError),
    #[error(transparent)]
    Visibility(#[from] VisibilityError),
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Robot(#[from] RobotError),
}

/// Entry point for navigation, visibility and communication queries.
#[derive(Debug)]
pub struct Terranav {
    graph: NavGraph,
    visibility: VisibilityTester,
}

impl Terranav {
    /// Build from in-memory inputs: a terrain classification raster, a
    /// digital terrain model, and a robot description.
    pub fn new(region: Raster, dtm: Raster, robot: RobotModel) -> Result<Self, TerranavError> {
        let map = CostMap::new(region, robot.clone())?;
        let graph = NavGraph::new(map);
        let visibility = VisibilityTester::new(dtm, &robot)?;
        info!("terranav facade ready");
        Ok(Self { graph, visibility })
    }

    /// Build from snapshot and description files.
    pub fn from_files<P: AsRef<std::path::Path>>(
        region: P,
        dtm: P,
        robot: P,
    ) -> Result<Self, TerranavError> {
        let region = Raster::load(region)?;
        let dtm = Raster::load(dtm)?;
        let robot = RobotModel::load(robot)?;
        Self::new(region, dtm, robot)
    }

    /// Shortest path from any of the start points to any of the goals,
    /// custom frame. The first start with a reachable goal wins.
    pub fn navigation(&self, starts: &[Point2], goals: &[Point2]) -> PathCost {
        let internal_goals: Vec<Point2> = goals
            .iter()
            .map(|g| self.graph.custom_to_internal(g))
            .collect();

        let mut result = PathCost {
            path: Path::new(),
            cost: f64::INFINITY,
        };
        for start in starts {
            let internal = self.graph.custom_to_internal(start);
            result = self.graph.astar_search_multi(&internal, &internal_goals);
            if result.cost.is_finite() {
                break;
            }
        }
        let path: Path = result
            .path
            .iter()
            .map(|p| self.graph.internal_to_custom(p))
            .collect();
        debug!(cost = result.cost, path = %path_to_string(&path), "navigation");
        PathCost {
            path,
            cost: result.cost,
        }
    }

    /// Travel cost from `start` to every goal, custom frame.
    pub fn single_source_all_costs(&self, start: &Point2, goals: &[Point2]) -> Vec<f64> {
        let internal_goals: Vec<Point2> = goals
            .iter()
            .map(|g| self.graph.custom_to_internal(g))
            .collect();
        self.graph
            .single_source_all_costs(&self.graph.custom_to_internal(start), &internal_goals)
    }

    /// Can the sensor at `a` observe `b`? Custom frame.
    pub fn is_visible(&self, a: &Point2, b: &Point2) -> Result<bool, RasterError> {
        self.visibility.is_sensor_visible(a, b)
    }

    /// Radio link between two 3D points, custom frame.
    pub fn can_communicate(&self, a: &Point3, b: &Point3) -> Result<bool, RasterError> {
        self.visibility.can_communicate(a, b)
    }

    /// Snapshot the cost raster backing the navigation graph.
    pub fn save_costmap<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), RasterError> {
        self.graph.save(path)
    }

    pub fn graph(&self) -> &NavGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut NavGraph {
        &mut self.graph
    }

    pub fn costmap(&self) -> &CostMap {
        self.graph.costmap()
    }

    pub fn visibility(&self) -> &VisibilityTester {
        &self.visibility
    }
}

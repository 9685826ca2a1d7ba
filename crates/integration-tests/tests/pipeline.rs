//! End-to-end pipeline: description files in, plans and snapshots out.

mod common;

use approx::assert_relative_eq;
use costmap::{CostMap, W_INFLATED};
use navgraph::NavGraph;
use raster::Raster;
use robot::RobotModel;
use terranav::Terranav;
use types::Point2;

use common::{add_obstacle, flat_region, unit_robot, wall_dtm, walled_region};

#[test]
fn from_files_to_navigation() {
    let dir = tempfile::tempdir().unwrap();
    let region_path = dir.path().join("region.bin");
    let dtm_path = dir.path().join("dtm.bin");
    let robot_path = dir.path().join("robot.toml");

    walled_region().save(&region_path).unwrap();
    wall_dtm().save(&dtm_path).unwrap();
    unit_robot().save(&robot_path).unwrap();

    let nav = Terranav::from_files(&region_path, &dtm_path, &robot_path).unwrap();
    let result = nav.navigation(&[Point2::new(1.0, 1.0)], &[Point2::new(5.0, 9.0)]);
    assert_eq!(result.path.len(), 14);
    assert!(result.cost.is_finite());
}

#[test]
fn saved_cost_map_rebuilds_the_same_graph() {
    let dir = tempfile::tempdir().unwrap();
    let weight_path = dir.path().join("weight.bin");

    let nav = Terranav::new(walled_region(), wall_dtm(), unit_robot()).unwrap();
    let start = Point2::new(1.0, 1.0);
    let goal = Point2::new(5.0, 9.0);
    let original = nav.navigation(&[start], &[goal]);

    nav.save_costmap(&weight_path).unwrap();
    let weights = Raster::load(&weight_path).unwrap();
    let rebuilt = NavGraph::new(CostMap::from_weight_raster(weights, unit_robot()).unwrap());

    let replayed = rebuilt.astar_search_multi(&start, &[goal]);
    assert_eq!(replayed.path, original.path);
    assert_relative_eq!(replayed.cost, original.cost);
}

#[test]
fn inflation_pushes_plans_away_from_obstacles() {
    let mut region = flat_region();
    add_obstacle(&mut region, 4, 4, 1.0);

    let plain = NavGraph::new(CostMap::new(region.clone(), unit_robot()).unwrap());
    let mut inflated_map = CostMap::new(region, unit_robot()).unwrap();
    inflated_map.inflate_obstacles();
    assert_relative_eq!(inflated_map.cost_at(3, 4), W_INFLATED);
    let inflated = NavGraph::new(inflated_map);

    // skimming the obstacle is cheap on the plain map and painful on
    // the inflated one
    let start = Point2::new(1.0, 4.0);
    let goal = Point2::new(7.0, 4.0);
    let plain_cost = plain.astar_search_multi(&start, &[goal]).cost;
    let inflated_cost = inflated.astar_search_multi(&start, &[goal]).cost;
    assert!(plain_cost.is_finite() && inflated_cost.is_finite());
    assert!(inflated_cost > plain_cost);
}

#[test]
fn robot_description_survives_a_save_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("robot.toml");

    let robot = unit_robot();
    robot.save(&path).unwrap();
    let reloaded = RobotModel::load(&path).unwrap();
    assert_relative_eq!(reloaded.radius, robot.radius);
    assert_relative_eq!(reloaded.sensor.unwrap().range, 20.0);
    assert_eq!(reloaded.costs, robot.costs);
}

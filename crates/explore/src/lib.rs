//! Frontier detection for autonomous exploration.
//!
//! A frontier is a maximal 8-connected set of open-space cells, each of
//! which touches at least one unknown cell. Detection follows the
//! Wavefront Frontier Detector described in "Robot Exploration with
//! Fast Frontier Detection: Theory and Experiments" (Keidar & Kaminka,
//! AAMAS 2012): an outer BFS over open space from a seed, and an inner
//! BFS harvesting each frontier the moment the outer search touches it.

use costmap::{is_obstacle, is_open, is_unknown};
use navgraph::NavGraph;
use thiserror::Error;
use tracing::{debug, warn};
use types::{angle_wrap, yaw_angle, Path, Point2};

#[derive(Error, Debug)]
pub enum ExploreError {
    #[error("seed cell ({u}, {v}) is not in open space")]
    BadSeed { u: usize, v: usize },
    #[error("seed point ({x}, {y}) outside the search area")]
    SeedOutOfBounds { x: f64, y: f64 },
    #[error("{0:?} is not implemented")]
    UnsupportedAlgorithm(Algorithm),
}

/// Frontier detection algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// Wavefront Frontier Detection
    #[default]
    Wfd,
    /// Fast Frontier Detection, reserved
    Ffd,
}

/// Inclusive cell rectangle bounding a detection run.
#[derive(Debug, Clone, Copy)]
pub struct SearchRect {
    pub x_min: usize,
    pub x_max: usize,
    pub y_min: usize,
    pub y_max: usize,
}

impl SearchRect {
    fn contains(&self, u: usize, v: usize) -> bool {
        u >= self.x_min && u <= self.x_max && v >= self.y_min && v <= self.y_max
    }
}

/// One frontier: 8-connected open-space cells adjacent to unknown space.
#[derive(Debug, Clone)]
pub struct Frontier {
    /// Member cells in discovery order
    pub cells: Vec<(usize, usize)>,
}

impl Frontier {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Ranking attributes of a surviving frontier.
#[derive(Debug, Clone)]
pub struct FrontierAttributes {
    pub id: usize,
    /// Number of member cells
    pub size: usize,
    /// Share of this frontier among all surviving frontier cells
    pub ratio: f64,
    /// Vantage cell the robot should observe the frontier from
    pub lookout: Point2,
    /// Planned path from the robot to the lookout
    pub path: Path,
    /// Travel cost of `path`, `+inf` when unreachable
    pub cost: f64,
    /// Absolute heading change to face the lookout
    pub yaw_diff: f64,
    /// Teammates that can reach the lookout cheaper than this robot
    pub proximity: usize,
}

/// Frontier detector over the cost map of a navigation graph.
pub struct FrontierDetector<'a> {
    graph: &'a NavGraph,
}

impl<'a> FrontierDetector<'a> {
    pub fn new(graph: &'a NavGraph) -> Self {
        Self { graph }
    }

    /// Detect all frontiers reachable from `seed` (pixel-scaled frame).
    pub fn compute_frontiers(
        &self,
        seed: &Point2,
        algorithm: Algorithm,
    ) -> Result<Vec<Frontier>, ExploreError> {
        let raster = self.graph.costmap().raster();
        let rect = SearchRect {
            x_min: 0,
            x_max: raster.width() - 1,
            y_min: 0,
            y_max: raster.height() - 1,
        };
        self.compute_frontiers_in(seed, rect, algorithm)
    }

    /// Detect frontiers inside a cell rectangle, clipped to the raster.
    pub fn compute_frontiers_in(
        &self,
        seed: &Point2,
        rect: SearchRect,
        algorithm: Algorithm,
    ) -> Result<Vec<Frontier>, ExploreError> {
        match algorithm {
            Algorithm::Wfd => {}
            Algorithm::Ffd => return Err(ExploreError::UnsupportedAlgorithm(algorithm)),
        }

        let raster = self.graph.costmap().raster();
        let clipped = SearchRect {
            x_min: rect.x_min,
            y_min: rect.y_min,
            x_max: rect.x_max.min(raster.width() - 1),
            y_max: rect.y_max.min(raster.height() - 1),
        };
        if clipped.x_max != rect.x_max || clipped.y_max != rect.y_max {
            warn!(?rect, ?clipped, "search rectangle clipped to the raster");
        }

        let (su, sv) = raster
            .cell_of_internal(seed)
            .map_err(|_| ExploreError::SeedOutOfBounds {
                x: seed.x,
                y: seed.y,
            })?;
        if !clipped.contains(su, sv) {
            return Err(ExploreError::SeedOutOfBounds {
                x: seed.x,
                y: seed.y,
            });
        }
        if !is_open(self.graph.costmap().cost_at(su, sv)) {
            return Err(ExploreError::BadSeed { u: su, v: sv });
        }

        Ok(self.wavefront((su, sv), clipped))
    }

    fn wavefront(&self, seed: (usize, usize), rect: SearchRect) -> Vec<Frontier> {
        let map = self.graph.costmap();
        let width = map.width();
        let weights = map.weights();
        let idx = |c: (usize, usize)| c.0 + c.1 * width;

        let mut frontiers: Vec<Frontier> = Vec::new();

        let mut map_queue = std::collections::VecDeque::new();
        let mut frontier_queue = std::collections::VecDeque::new();
        let mut map_open = vec![false; weights.len()];
        let mut map_close = vec![false; weights.len()];
        let mut frontier_open = vec![false; weights.len()];
        let mut frontier_close = vec![false; weights.len()];

        map_queue.push_back(seed);
        map_open[idx(seed)] = true;

        while let Some(p) = map_queue.pop_front() {
            if map_close[idx(p)] {
                continue;
            }

            // a frontier cell seeds an inner search that harvests the
            // whole 8-connected frontier it belongs to
            if self.is_frontier(p, rect, weights, width) {
                let mut cells = Vec::new();
                frontier_queue.clear();
                frontier_queue.push_back(p);
                frontier_open[idx(p)] = true;

                while let Some(q) = frontier_queue.pop_front() {
                    if map_close[idx(q)] || frontier_close[idx(q)] {
                        continue;
                    }
                    if self.is_frontier(q, rect, weights, width) {
                        cells.push(q);
                        for n in neighbours(q, rect) {
                            if !(map_close[idx(n)]
                                || frontier_close[idx(n)]
                                || frontier_open[idx(n)])
                            {
                                frontier_queue.push_back(n);
                                frontier_open[idx(n)] = true;
                            }
                        }
                    }
                    frontier_close[idx(q)] = true;
                }

                for &c in &cells {
                    map_close[idx(c)] = true;
                }
                frontiers.push(Frontier { cells });
            }

            for n in neighbours(p, rect) {
                if !(map_close[idx(n)] || map_open[idx(n)]) && is_open(weights[idx(n)]) {
                    map_queue.push_back(n);
                    map_open[idx(n)] = true;
                }
            }

            map_close[idx(p)] = true;
        }

        // deterministic ranking: big frontiers first, ties resolved by
        // the first-discovered cell's row-major position
        frontiers.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then_with(|| idx(a.cells[0]).cmp(&idx(b.cells[0])))
        });
        debug!(count = frontiers.len(), "frontiers detected");
        frontiers
    }

    /// A frontier cell is open space with at least one unknown
    /// 8-neighbour.
    fn is_frontier(
        &self,
        p: (usize, usize),
        rect: SearchRect,
        weights: &[f32],
        width: usize,
    ) -> bool {
        let w = weights[p.0 + p.1 * width];
        if is_unknown(w) || is_obstacle(w) {
            return false;
        }
        neighbours(p, rect)
            .into_iter()
            .any(|(u, v)| is_unknown(weights[u + v * width]))
    }

    /// Drop frontiers that are too small or entirely outside the
    /// `[min_dist, max_dist]` annulus around the robot, then keep the
    /// `max_count` largest.
    pub fn filter_frontiers(
        &self,
        frontiers: Vec<Frontier>,
        r_positions: &[Point2],
        max_count: usize,
        min_size: usize,
        min_dist: f64,
        max_dist: f64,
    ) -> Vec<Frontier> {
        let robot = &r_positions[0];
        let mut kept: Vec<Frontier> = frontiers
            .into_iter()
            .filter(|f| {
                f.len() >= min_size
                    && f.cells
                        .iter()
                        .any(|&c| in_annulus(self.cell_point(c), robot, min_dist, max_dist))
            })
            .collect();
        kept.truncate(max_count);
        kept
    }

    /// Rank surviving frontiers for the robot at `r_positions[0]` with
    /// heading `robot_yaw`; `r_positions[1..]` are teammates.
    pub fn compute_attributes(
        &self,
        frontiers: &[Frontier],
        robot_yaw: f64,
        r_positions: &[Point2],
        min_dist: f64,
        max_dist: f64,
    ) -> Vec<FrontierAttributes> {
        let robot = &r_positions[0];
        let total: usize = frontiers.iter().map(Frontier::len).sum();

        frontiers
            .iter()
            .enumerate()
            .map(|(id, frontier)| {
                // the lookout is the annulus cell needing the smallest
                // heading change; filtering guarantees one exists
                let mut lookout = self.cell_point(frontier.cells[0]);
                let mut yaw_diff = f64::INFINITY;
                for &cell in &frontier.cells {
                    let p = self.cell_point(cell);
                    if !in_annulus(p, robot, min_dist, max_dist) {
                        continue;
                    }
                    let diff = angle_wrap(yaw_angle(robot, &p) - robot_yaw).abs();
                    if diff < yaw_diff {
                        yaw_diff = diff;
                        lookout = p;
                    }
                }

                let planned = self
                    .graph
                    .astar_search_multi(robot, std::slice::from_ref(&lookout));
                let mut path = planned.path;
                path.push_back(lookout);

                let proximity = r_positions[1..]
                    .iter()
                    .filter(|&teammate| {
                        self.graph
                            .astar_search_multi(teammate, std::slice::from_ref(&lookout))
                            .cost
                            < planned.cost
                    })
                    .count();

                FrontierAttributes {
                    id,
                    size: frontier.len(),
                    ratio: frontier.len() as f64 / total as f64,
                    lookout,
                    path,
                    cost: planned.cost,
                    yaw_diff,
                    proximity,
                }
            })
            .collect()
    }

    /// Pixel-scaled coordinates of a cell.
    fn cell_point(&self, (u, v): (usize, usize)) -> Point2 {
        self.graph.costmap().raster().internal_of_cell(u, v)
    }
}

fn in_annulus(p: Point2, center: &Point2, min_dist: f64, max_dist: f64) -> bool {
    let d = p.distance(center);
    d >= min_dist && d <= max_dist
}

/// 8-connected neighbours of `p` inside the rectangle.
///
/// Orientation (image frame):
/// ```text
/// 0 → x
/// ↓        NW  N  NE
/// y        W   p  E
///          SW  S  SE
/// ```
fn neighbours(p: (usize, usize), rect: SearchRect) -> Vec<(usize, usize)> {
    let (u, v) = p;
    let mut out = Vec::with_capacity(8);
    let west = u > rect.x_min;
    let east = u < rect.x_max;
    let north = v > rect.y_min;
    let south = v < rect.y_max;

    if north {
        out.push((u, v - 1));
    }
    if south {
        out.push((u, v + 1));
    }
    if east {
        out.push((u + 1, v));
    }
    if west {
        out.push((u - 1, v));
    }
    if east && north {
        out.push((u + 1, v - 1));
    }
    if west && north {
        out.push((u - 1, v - 1));
    }
    if west && south {
        out.push((u - 1, v + 1));
    }
    if east && south {
        out.push((u + 1, v + 1));
    }
    out
}

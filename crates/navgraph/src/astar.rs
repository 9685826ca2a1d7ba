//! Batch shortest-path searches over the navigation graph.
//!
//! The driver owns the loop and checks the goal predicate on dequeue,
//! so the first goal vertex popped from the open list terminates the
//! search. Ties on the f-value are broken by the lower vertex id, which
//! makes examination order reproducible.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use tracing::debug;
use types::{Path, Point2};

use crate::{NavGraph, VertexId};

/// Result of a multi-goal search: the reconstructed path and the
/// travel cost to the reached goal (`+inf` when unreachable).
#[derive(Debug, Clone)]
pub struct PathCost {
    pub path: Path,
    pub cost: f64,
}

/// A path annotated with the cumulative cost at every waypoint.
#[derive(Debug, Clone)]
pub struct DetailedPath {
    pub path: Path,
    /// Travel cost from the start to each waypoint, parallel to `path`
    pub costs: VecDeque<f64>,
}

/// Open-list entry ordered for a min-heap on (f, vertex id).
struct OpenEntry {
    f: f64,
    vertex: VertexId,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: invert so the smallest f (then the
        // smallest vertex id) is popped first
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Outcome of one search run: distances, predecessor links, and the
/// goal vertex that terminated it (if any).
struct SearchRun {
    dist: Vec<f64>,
    pred: Vec<VertexId>,
    reached: Option<VertexId>,
}

impl NavGraph {
    /// Dijkstra/A* driver from `start`. With goals, the heuristic is
    /// the minimum euclidean distance to any goal and the run stops on
    /// the first goal dequeued; without goals it settles every
    /// reachable vertex.
    fn search(&self, start: VertexId, goals: &[VertexId]) -> SearchRun {
        let n = self.vertex_count();
        let goal_points: Vec<Point2> = goals.iter().map(|&g| self.point(g)).collect();
        let h = |v: VertexId| -> f64 {
            goal_points
                .iter()
                .map(|g| self.point(v).distance_sq(g))
                .fold(f64::INFINITY, f64::min)
                .sqrt()
        };

        let mut dist = vec![f64::INFINITY; n];
        let mut pred: Vec<VertexId> = (0..n as VertexId).collect();
        let mut closed = vec![false; n];
        let mut open = BinaryHeap::new();

        dist[start as usize] = 0.0;
        open.push(OpenEntry {
            f: if goals.is_empty() { 0.0 } else { h(start) },
            vertex: start,
        });

        let mut examined = 0usize;
        let mut reached = None;
        while let Some(OpenEntry { vertex, .. }) = open.pop() {
            if closed[vertex as usize] {
                continue;
            }
            closed[vertex as usize] = true;
            examined += 1;

            if goals.contains(&vertex) {
                reached = Some(vertex);
                break;
            }

            let d = dist[vertex as usize];
            for (next, weight) in self.neighbors(vertex) {
                if closed[next as usize] {
                    continue;
                }
                let candidate = d + weight as f64;
                if candidate < dist[next as usize] {
                    dist[next as usize] = candidate;
                    pred[next as usize] = vertex;
                    let f = if goals.is_empty() {
                        candidate
                    } else {
                        candidate + h(next)
                    };
                    open.push(OpenEntry { f, vertex: next });
                }
            }
        }

        debug!(examined, reached = ?reached, "search finished");
        SearchRun {
            dist,
            pred,
            reached,
        }
    }

    /// Walk predecessor links from `goal` back to the search origin,
    /// pushing each vertex point to the front.
    fn reconstruct(&self, run: &SearchRun, goal: VertexId) -> Path {
        let mut path = Path::new();
        let mut v = goal;
        loop {
            path.push_front(self.point(v));
            let p = run.pred[v as usize];
            if p == v {
                break;
            }
            v = p;
        }
        path
    }

    /// Shortest path between the vertices closest to `start` and
    /// `goal`. Empty when the goal is unreachable.
    pub fn astar_search(&self, start: &Point2, goal: &Point2) -> Path {
        self.astar_search_multi(start, std::slice::from_ref(goal))
            .path
    }

    /// Shortest path from `start` to whichever goal is reached first.
    pub fn astar_search_multi(&self, start: &Point2, goals: &[Point2]) -> PathCost {
        let unreachable = PathCost {
            path: Path::new(),
            cost: f64::INFINITY,
        };
        let Some(start_v) = self.closest_vertex(start) else {
            return unreachable;
        };
        let goal_vs: Vec<VertexId> = goals.iter().filter_map(|g| self.closest_vertex(g)).collect();
        if goal_vs.is_empty() {
            return unreachable;
        }

        let run = self.search(start_v, &goal_vs);
        match run.reached {
            Some(goal_v) => PathCost {
                path: self.reconstruct(&run, goal_v),
                cost: run.dist[goal_v as usize],
            },
            None => unreachable,
        }
    }

    /// Like `astar_search`, but annotates every waypoint with the
    /// cumulative travel cost from the start.
    pub fn astar_search_detailed(&self, start: &Point2, goal: &Point2) -> DetailedPath {
        let empty = DetailedPath {
            path: Path::new(),
            costs: VecDeque::new(),
        };
        let (Some(start_v), Some(goal_v)) =
            (self.closest_vertex(start), self.closest_vertex(goal))
        else {
            return empty;
        };

        let run = self.search(start_v, &[goal_v]);
        if run.reached.is_none() {
            return empty;
        }

        let mut path = Path::new();
        let mut costs = VecDeque::new();
        let mut v = goal_v;
        loop {
            path.push_front(self.point(v));
            costs.push_front(run.dist[v as usize]);
            let p = run.pred[v as usize];
            if p == v {
                break;
            }
            v = p;
        }
        DetailedPath { path, costs }
    }

    /// Travel cost from `start` to each goal out of a single Dijkstra
    /// run. Unreachable goals cost `+inf`.
    pub fn single_source_all_costs(&self, start: &Point2, goals: &[Point2]) -> Vec<f64> {
        let Some(start_v) = self.closest_vertex(start) else {
            return vec![f64::INFINITY; goals.len()];
        };
        let run = self.search(start_v, &[]);
        goals
            .iter()
            .map(|g| match self.closest_vertex(g) {
                Some(v) => run.dist[v as usize],
                None => f64::INFINITY,
            })
            .collect()
    }
}

//! Incremental replanning with D*-Lite.
//!
//! A search instance keeps per-vertex `(g, rhs)` values and a priority
//! queue keyed by `(k1, k2)` pairs, and reuses them when edge weights
//! change: `replan` only touches vertices incident to edges stamped
//! after the epoch tick captured at the previous pass.
//!
//! The instance holds no reference to the graph; every operation takes
//! `&NavGraph`, so callers mutate the graph with ordinary exclusive
//! access between queries.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::io;

use tracing::debug;
use types::{Path, Point2};

use crate::{NavGraph, PlanError, VertexId};

/// Lexicographic D*-Lite key.
#[derive(Debug, Clone, Copy)]
struct Key(f32, f32);

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .total_cmp(&other.0)
            .then_with(|| self.1.total_cmp(&other.1))
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy)]
struct CostPair {
    g: f32,
    rhs: f32,
}

/// Indexed ordered queue: extract-min over `(key, vertex)` plus
/// membership test and erase by vertex id.
#[derive(Debug, Default)]
struct VertexQueue {
    ordered: BTreeSet<(Key, VertexId)>,
    keys: HashMap<VertexId, Key>,
}

impl VertexQueue {
    fn insert(&mut self, v: VertexId, key: Key) {
        self.remove(v);
        self.ordered.insert((key, v));
        self.keys.insert(v, key);
    }

    fn remove(&mut self, v: VertexId) {
        if let Some(key) = self.keys.remove(&v) {
            self.ordered.remove(&(key, v));
        }
    }

    fn peek(&self) -> Option<(Key, VertexId)> {
        self.ordered.iter().next().copied()
    }

    fn pop(&mut self) -> Option<(Key, VertexId)> {
        let top = self.peek()?;
        self.ordered.remove(&top);
        self.keys.remove(&top.1);
        Some(top)
    }
}

/// One D*-Lite search instance over a navigation graph.
#[derive(Debug)]
pub struct DStarLite {
    start: VertexId,
    goal: VertexId,
    /// Replanning anchor: where the robot currently is
    last: VertexId,
    /// Epoch tick of the last edge scan
    t: u32,
    /// Heuristic offset accumulated across replans
    km: f32,
    costs: Vec<CostPair>,
    queue: VertexQueue,
}

impl DStarLite {
    /// Seed a search from the vertices closest to `start` and `goal`
    /// and run the first pass.
    pub fn new(graph: &NavGraph, start: &Point2, goal: &Point2) -> Result<Self, PlanError> {
        let start_v = graph.closest_vertex(start).ok_or(PlanError::NoPath)?;
        let goal_v = graph.closest_vertex(goal).ok_or(PlanError::NoPath)?;
        Self::from_vertices(graph, start_v, goal_v)
    }

    /// Seed a search between two known vertices.
    pub fn from_vertices(
        graph: &NavGraph,
        start: VertexId,
        goal: VertexId,
    ) -> Result<Self, PlanError> {
        let infinity = CostPair {
            g: f32::INFINITY,
            rhs: f32::INFINITY,
        };
        let mut search = Self {
            start,
            goal,
            last: start,
            t: graph.tick(),
            km: 0.0,
            costs: vec![infinity; graph.vertex_count()],
            queue: VertexQueue::default(),
        };
        search.costs[goal as usize].rhs = 0.0;
        let key = search.calc_key(graph, goal);
        search.queue.insert(goal, key);
        search.compute_shortest_path(graph)?;
        Ok(search)
    }

    fn h(graph: &NavGraph, a: VertexId, b: VertexId) -> f32 {
        graph.point(a).distance(&graph.point(b)) as f32
    }

    fn calc_key(&self, graph: &NavGraph, v: VertexId) -> Key {
        let c = self.costs[v as usize];
        let min = c.g.min(c.rhs);
        Key(min + Self::h(graph, self.start, v) + self.km, min)
    }

    fn update_vertex(&mut self, graph: &NavGraph, v: VertexId) {
        if v != self.goal {
            let mut min = f32::INFINITY;
            for (target, weight) in graph.neighbors(v) {
                min = min.min(weight + self.costs[target as usize].g);
            }
            self.costs[v as usize].rhs = min;
        }

        self.queue.remove(v);

        let c = self.costs[v as usize];
        if c.g != c.rhs {
            let key = self.calc_key(graph, v);
            self.queue.insert(v, key);
        }
    }

    /// Settle the queue until the start vertex is consistent.
    fn compute_shortest_path(&mut self, graph: &NavGraph) -> Result<(), PlanError> {
        let mut expansions = 0usize;
        loop {
            let start_cost = self.costs[self.start as usize];
            let Some((k_old, v)) = self.queue.peek() else {
                break;
            };
            if !(k_old < self.calc_key(graph, self.start) || start_cost.g != start_cost.rhs) {
                break;
            }
            self.queue.pop();
            expansions += 1;

            let k_new = self.calc_key(graph, v);
            if k_old < k_new {
                self.queue.insert(v, k_new);
            } else if self.costs[v as usize].g > self.costs[v as usize].rhs {
                // overconsistent: commit the improvement and propagate
                self.costs[v as usize].g = self.costs[v as usize].rhs;
                let adjacent: Vec<VertexId> = graph.neighbors(v).map(|(n, _)| n).collect();
                for n in adjacent {
                    self.update_vertex(graph, n);
                }
            } else {
                // underconsistent: invalidate and re-evaluate
                self.costs[v as usize].g = f32::INFINITY;
                self.update_vertex(graph, v);
                let adjacent: Vec<VertexId> = graph.neighbors(v).map(|(n, _)| n).collect();
                for n in adjacent {
                    self.update_vertex(graph, n);
                }
            }
        }
        debug!(expansions, "shortest path computed");

        if self.costs[self.start as usize].g.is_infinite() {
            return Err(PlanError::NoPath);
        }
        Ok(())
    }

    /// Walk greedily from the replanning anchor to the goal, always
    /// descending `weight + g`.
    pub fn get_path(&self, graph: &NavGraph) -> Result<Path, PlanError> {
        if self.costs[self.last as usize].g.is_infinite() {
            return Err(PlanError::NoPath);
        }

        let mut path = Path::new();
        path.push_back(graph.point(self.last));

        let mut v = self.last;
        let mut steps = 0usize;
        while v != self.goal {
            // guard against cycling when g values are stale
            steps += 1;
            if steps > graph.vertex_count() {
                return Err(PlanError::NoPath);
            }

            let mut best: Option<(VertexId, f32)> = None;
            for (target, weight) in graph.neighbors(v) {
                let c = weight + self.costs[target as usize].g;
                if best.map_or(true, |(_, bc)| c < bc) {
                    best = Some((target, c));
                }
            }
            match best {
                Some((target, c)) if c.is_finite() => {
                    v = target;
                    path.push_back(graph.point(v));
                }
                _ => return Err(PlanError::NoPath),
            }
        }
        Ok(path)
    }

    /// Re-anchor the search at `now` and absorb every edge change
    /// stamped after the previous scan.
    pub fn replan(&mut self, graph: &NavGraph, now: &Point2) -> Result<(), PlanError> {
        let v = graph.closest_vertex(now).ok_or(PlanError::NoPath)?;
        self.replan_from(graph, v)
    }

    pub fn replan_from(&mut self, graph: &NavGraph, now: VertexId) -> Result<(), PlanError> {
        self.km += Self::h(graph, now, self.last);
        self.last = now;

        let stale: Vec<(VertexId, VertexId)> = graph
            .edges()
            .iter()
            .filter(|e| e.stamp > self.t)
            .map(|e| (e.a, e.b))
            .collect();
        for (a, b) in stale {
            self.update_vertex(graph, a);
            self.update_vertex(graph, b);
        }
        self.t = graph.tick();

        self.compute_shortest_path(graph)
    }

    /// Cost-to-goal from the current anchor.
    pub fn cost_from_anchor(&self) -> f64 {
        self.costs[self.last as usize].g as f64
    }

    /// Graphviz export of the graph annotated with per-vertex g and rhs
    /// values, for debugging a search instance.
    pub fn write_dot<W: io::Write>(&self, graph: &NavGraph, out: &mut W) -> io::Result<()> {
        writeln!(out, "graph dstar {{")?;
        writeln!(out, "  node [shape=box]")?;
        for v in 0..graph.vertex_count() {
            let c = self.costs[v];
            writeln!(
                out,
                "  {} [label=\"pt {} g: {} rhs: {}\"];",
                v,
                graph.point(v as VertexId),
                c.g,
                c.rhs
            )?;
        }
        for e in graph.edges() {
            writeln!(out, "  {} -- {} [weight={}];", e.a, e.b, e.weight)?;
        }
        writeln!(out, "}}")
    }
}

//! Navigable graph over a cost map.
//!
//! For every traversable cell of the cost raster, four mid-edge vertices
//! (west, north, east, south of the cell center) are materialized and
//! connected by four diagonal and two straight edges whose weights are
//! edge length times the cell's traversal cost. Unknown cells are kept
//! traversable at a high substitute cost so that exploration plans can
//! cross them; hard obstacles contribute no edges at all.
//!
//! Vertices live in the pixel-scaled frame (pixel indices times the
//! raster scale); conversions to the UTM and custom frames are delegated
//! to the underlying raster.

use std::collections::HashMap;
use std::io::{self, Write};

use costmap::{is_obstacle, CostMap};
use thiserror::Error;
use tracing::info;
use types::Point2;

mod astar;
mod dstar;

pub use astar::{DetailedPath, PathCost};
pub use dstar::DStarLite;

/// Substitute traversal cost for unknown cells (s/m). Finite, so
/// planners may cross unknown terrain, but worse than any real cell.
pub const W_EXPLORATION: f32 = 100.0;

pub type VertexId = u32;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("no path to goal")]
    NoPath,
    #[error("cell ({u}, {v}) has no graph edges")]
    MissingCell { u: usize, v: usize },
}

/// Undirected edge with a weight and the epoch tick of its last change.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub a: VertexId,
    pub b: VertexId,
    pub weight: f32,
    pub stamp: u32,
}

impl Edge {
    /// The endpoint that is not `v`.
    pub fn other(&self, v: VertexId) -> VertexId {
        if self.a == v {
            self.b
        } else {
            self.a
        }
    }
}

/// Planar navigable graph owning the cost map it was built from.
#[derive(Debug)]
pub struct NavGraph {
    map: CostMap,
    /// Vertex positions, pixel-scaled frame; ids are indices
    points: Vec<Point2>,
    /// Vertex id → incident edge ids
    adjacency: Vec<Vec<u32>>,
    edges: Vec<Edge>,
    /// Bit-exact position → vertex id (coordinates are synthesized from
    /// integer cell indices, so equal positions are equal bit patterns)
    index: HashMap<(u64, u64), VertexId>,
    /// Monotonic epoch counter; bumped on every cost update
    tick: u32,
}

impl NavGraph {
    /// Build the graph for a cost map.
    pub fn new(map: CostMap) -> Self {
        let mut graph = Self {
            map,
            points: Vec::new(),
            adjacency: Vec::new(),
            edges: Vec::new(),
            index: HashMap::new(),
            tick: 0,
        };
        graph.build();
        graph
    }

    fn build(&mut self) {
        let width = self.map.width();
        let height = self.map.height();
        let sx = self.map.raster().scale_x();
        let sy = self.map.raster().scale_y();
        // most of the time this is sqrt(2)/2
        let hypotenuse = (0.5 * (sx * sx + sy * sy).sqrt()) as f32;

        let weights: Vec<f32> = self.map.weights().to_vec();
        for u in 0..width {
            for v in 0..height {
                let w = weights[u + v * width];
                if is_obstacle(w) {
                    continue;
                }
                // unknown cells stay traversable at the exploration cost
                let cost = if w <= 0.0 { W_EXPLORATION } else { w };

                let (uf, vf) = (u as f64, v as f64);
                // west and north are shared with the previous column and
                // the previous cell of this column; east and south are
                // always new
                let vert_w = self.vertex_or_create(Point2::new(sx * (uf - 0.5), sy * vf));
                let vert_n = self.vertex_or_create(Point2::new(sx * uf, sy * (vf - 0.5)));
                let vert_e = self.create_vertex(Point2::new(sx * (uf + 0.5), sy * vf));
                let vert_s = self.create_vertex(Point2::new(sx * uf, sy * (vf + 0.5)));

                let diagonal = hypotenuse * cost;
                self.add_edge(vert_w, vert_n, diagonal);
                self.add_edge(vert_n, vert_e, diagonal);
                self.add_edge(vert_e, vert_s, diagonal);
                self.add_edge(vert_s, vert_w, diagonal);
                self.add_edge(vert_n, vert_s, sy.abs() as f32 * cost);
                self.add_edge(vert_w, vert_e, sx.abs() as f32 * cost);
            }
        }

        info!(
            vertices = self.points.len(),
            edges = self.edges.len(),
            "navigation graph built"
        );
    }

    fn key_of(p: &Point2) -> (u64, u64) {
        (p.x.to_bits(), p.y.to_bits())
    }

    fn create_vertex(&mut self, p: Point2) -> VertexId {
        let id = self.points.len() as VertexId;
        self.points.push(p);
        self.adjacency.push(Vec::new());
        self.index.insert(Self::key_of(&p), id);
        id
    }

    fn vertex_or_create(&mut self, p: Point2) -> VertexId {
        match self.index.get(&Self::key_of(&p)) {
            Some(&id) => id,
            None => self.create_vertex(p),
        }
    }

    fn add_edge(&mut self, a: VertexId, b: VertexId, weight: f32) {
        let id = self.edges.len() as u32;
        self.edges.push(Edge {
            a,
            b,
            weight,
            stamp: self.tick,
        });
        self.adjacency[a as usize].push(id);
        self.adjacency[b as usize].push(id);
    }

    /// Vertex exactly at `p`, if one exists.
    pub fn vertex_at(&self, p: &Point2) -> Option<VertexId> {
        self.index.get(&Self::key_of(p)).copied()
    }

    /// Vertex closest to `p`, with ties going to the lowest id.
    ///
    /// Fast path: an exact index hit, or probing the mid-edge positions
    /// of the cells around `p` through the position index. The probe
    /// result is only trusted when it is provably closer than any
    /// vertex outside the probed block; otherwise this falls back to
    /// the full scan.
    pub fn closest_vertex(&self, p: &Point2) -> Option<VertexId> {
        if let Some(id) = self.vertex_at(p) {
            return Some(id);
        }

        let sx = self.map.raster().scale_x();
        let sy = self.map.raster().scale_y();
        let (cu, cv) = ((p.x / sx).round(), (p.y / sy).round());

        let mut best: Option<(f64, VertexId)> = None;
        for dv in -1..=1 {
            for du in -1..=1 {
                let (uf, vf) = (cu + du as f64, cv + dv as f64);
                let candidates = [
                    Point2::new(sx * (uf - 0.5), sy * vf),
                    Point2::new(sx * uf, sy * (vf - 0.5)),
                    Point2::new(sx * (uf + 0.5), sy * vf),
                    Point2::new(sx * uf, sy * (vf + 0.5)),
                ];
                for q in candidates {
                    if let Some(id) = self.vertex_at(&q) {
                        let key = (p.distance_sq(&q), id);
                        if best.map_or(true, |b| key < b) {
                            best = Some(key);
                        }
                    }
                }
            }
        }

        // any vertex outside the probed 3x3 block is at least one cell
        // away from p
        let safe = sx.abs().min(sy.abs());
        match best {
            Some((d, id)) if d < safe * safe => Some(id),
            _ => self.closest_vertex_scan(p),
        }
    }

    /// Exhaustive closest-vertex scan by squared distance, ties to the
    /// lowest id.
    fn closest_vertex_scan(&self, p: &Point2) -> Option<VertexId> {
        let mut best: Option<(VertexId, f64)> = None;
        for (id, q) in self.points.iter().enumerate() {
            let d = p.distance_sq(q);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((id as VertexId, d));
            }
        }
        best.map(|(id, _)| id)
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn point(&self, v: VertexId) -> Point2 {
        self.points[v as usize]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Incident edges of `v` as `(neighbor, weight)`, in insertion order.
    pub fn neighbors(&self, v: VertexId) -> impl Iterator<Item = (VertexId, f32)> + '_ {
        self.adjacency[v as usize].iter().map(move |&eid| {
            let e = &self.edges[eid as usize];
            (e.other(v), e.weight)
        })
    }

    /// Current epoch tick.
    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn costmap(&self) -> &CostMap {
        &self.map
    }

    /// Rewrite the cost of one cell and restamp its six edges, bumping
    /// the epoch tick. This is the mutation path D*-Lite replans from.
    ///
    /// Fails for cells that never had edges (hard obstacles at build
    /// time).
    pub fn update_cell_cost(&mut self, u: usize, v: usize, cost: f32) -> Result<(), PlanError> {
        let sx = self.map.raster().scale_x();
        let sy = self.map.raster().scale_y();
        let (uf, vf) = (u as f64, v as f64);
        let missing = || PlanError::MissingCell { u, v };

        let vert_w = self
            .vertex_at(&Point2::new(sx * (uf - 0.5), sy * vf))
            .ok_or_else(missing)?;
        let vert_n = self
            .vertex_at(&Point2::new(sx * uf, sy * (vf - 0.5)))
            .ok_or_else(missing)?;
        let vert_e = self
            .vertex_at(&Point2::new(sx * (uf + 0.5), sy * vf))
            .ok_or_else(missing)?;
        let vert_s = self
            .vertex_at(&Point2::new(sx * uf, sy * (vf + 0.5)))
            .ok_or_else(missing)?;

        let effective = if cost <= 0.0 { W_EXPLORATION } else { cost };
        let hypotenuse = (0.5 * (sx * sx + sy * sy).sqrt()) as f32;

        let diagonal = hypotenuse * effective;
        let pairs = [
            (vert_w, vert_n, diagonal),
            (vert_n, vert_e, diagonal),
            (vert_e, vert_s, diagonal),
            (vert_s, vert_w, diagonal),
            (vert_n, vert_s, sy.abs() as f32 * effective),
            (vert_w, vert_e, sx.abs() as f32 * effective),
        ];
        // vertices can exist around an obstacle cell (shared with its
        // neighbors) while the cell itself has no edges
        let mut edge_ids = [0u32; 6];
        for (slot, &(a, b, _)) in edge_ids.iter_mut().zip(pairs.iter()) {
            *slot = self.find_edge(a, b).ok_or_else(missing)?;
        }

        self.tick += 1;
        for (&eid, &(_, _, weight)) in edge_ids.iter().zip(pairs.iter()) {
            let e = &mut self.edges[eid as usize];
            e.weight = weight;
            e.stamp = self.tick;
        }

        self.map.set_cost_at(u, v, cost);
        Ok(())
    }

    fn find_edge(&self, a: VertexId, b: VertexId) -> Option<u32> {
        self.adjacency[a as usize]
            .iter()
            .copied()
            .find(|&eid| self.edges[eid as usize].other(a) == b)
    }

    pub fn custom_to_utm(&self, p: &Point2) -> Point2 {
        self.map.raster().custom_to_utm(p)
    }

    pub fn utm_to_custom(&self, p: &Point2) -> Point2 {
        self.map.raster().utm_to_custom(p)
    }

    /// Custom frame → the frame vertices live in.
    pub fn custom_to_internal(&self, p: &Point2) -> Point2 {
        self.map.raster().custom_to_internal(p)
    }

    pub fn internal_to_custom(&self, p: &Point2) -> Point2 {
        self.map.raster().internal_to_custom(p)
    }

    /// Graphviz export of the graph with vertex positions.
    ///
    /// TIP: `neato -Tpng | display` to visualize.
    pub fn write_dot<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "graph navgraph {{")?;
        for (id, p) in self.points.iter().enumerate() {
            writeln!(out, "  {} [label=\"[{},{}]\"];", id, p.x, p.y)?;
        }
        for e in &self.edges {
            writeln!(out, "  {} -- {} [weight={}];", e.a, e.b, e.weight)?;
        }
        writeln!(out, "}}")
    }

    /// Snapshot the underlying cost raster.
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), raster::RasterError> {
        self.map.save(path)
    }
}

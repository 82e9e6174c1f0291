//! Segment adjacency graph.
//!
//! Two segments are adjacent when they share an endpoint. What "share" means
//! depends on where the segments came from:
//!
//! - [`EqualityMode::Exact`]: endpoints are compared after rounding to a fixed
//!   number of decimals. Right for a complete dataset cut from one vertex set.
//! - [`EqualityMode::Tolerant`]: endpoints within a radius (meters, Haversine)
//!   are the same. Right for a partial load around some waypoints, or for
//!   independently digitized data where vertices are not shared exactly.
//!
//! The graph is owned by one search and dropped afterwards.

use std::collections::{HashMap, HashSet};

use geo::Coord;
use rstar::RTree;

use crate::identifiers::SegmentIdentifier;
use crate::models::types::Segment;
use crate::spatial::index::EndpointNode;
use crate::spatial::queries::{haversine_distance, search_radius_degrees};

/// Decimal places used by [`EqualityMode::default`] (sub-meter in lon/lat)
pub const DEFAULT_PRECISION: u32 = 7;

/// How endpoint coordinates are compared when linking segments
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EqualityMode {
    /// Equal after rounding to `precision` decimal places
    Exact { precision: u32 },
    /// Equal when closer than `radius_m` meters
    Tolerant { radius_m: f64 },
}

impl Default for EqualityMode {
    fn default() -> Self {
        EqualityMode::Exact {
            precision: DEFAULT_PRECISION,
        }
    }
}

/// Key for coordinate-based endpoint matching
/// Uses fixed-point representation to absorb floating point noise
fn coord_key(coord: Coord<f64>, precision: u32) -> (i64, i64) {
    let scale = 10f64.powi(precision.min(15) as i32);
    let x = (coord.x * scale).round() as i64;
    let y = (coord.y * scale).round() as i64;
    (x, y)
}

/// Neighbors of one segment, split by the endpoint they attach to.
#[derive(Clone, Debug, PartialEq)]
pub struct EndpointConnections {
    pub segment: SegmentIdentifier,
    pub start: Coord<f64>,
    pub end: Coord<f64>,
    pub at_start: Vec<SegmentIdentifier>,
    /// Empty for a closed loop, whose single junction is reported at `start`
    pub at_end: Vec<SegmentIdentifier>,
}

#[derive(Clone, Debug)]
struct Endpoints {
    start: Coord<f64>,
    end: Coord<f64>,
    at_start: Vec<SegmentIdentifier>,
    at_end: Vec<SegmentIdentifier>,
}

/// Undirected adjacency over segment ids.
///
/// Neighbor lists keep insertion order and hold no duplicates, so every search
/// over the same input explores in the same order.
#[derive(Clone, Debug, Default)]
pub struct TopologyGraph {
    nodes: Vec<SegmentIdentifier>,
    adjacency: HashMap<SegmentIdentifier, Vec<SegmentIdentifier>>,
    endpoints: HashMap<SegmentIdentifier, Endpoints>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link every pair of segments that share an endpoint under `mode`.
    ///
    /// Input order is insertion order. A repeated id keeps its first geometry.
    pub fn build(segments: &[Segment], mode: EqualityMode) -> Self {
        let mut seen = HashSet::new();
        let unique: Vec<&Segment> = segments
            .iter()
            .filter(|s| {
                let fresh = seen.insert(s.id.clone());
                if !fresh {
                    log::warn!("Segment {} listed twice, ignoring the repeat", s.id);
                }
                fresh
            })
            .collect();

        let links = match mode {
            EqualityMode::Exact { precision } => exact_links(&unique, precision),
            EqualityMode::Tolerant { radius_m } => tolerant_links(&unique, radius_m),
        };

        let mut graph = Self::new();
        for (segment, (at_start, at_end)) in unique.iter().zip(links) {
            let mut neighbors: Vec<SegmentIdentifier> = Vec::new();
            for &j in at_start.iter().chain(at_end.iter()) {
                let id = &unique[j].id;
                if !neighbors.contains(id) {
                    neighbors.push(id.clone());
                }
            }

            graph.nodes.push(segment.id.clone());
            graph.adjacency.insert(segment.id.clone(), neighbors);
            graph.endpoints.insert(
                segment.id.clone(),
                Endpoints {
                    start: segment.start(),
                    end: segment.end(),
                    at_start: at_start.iter().map(|&j| unique[j].id.clone()).collect(),
                    at_end: at_end.iter().map(|&j| unique[j].id.clone()).collect(),
                },
            );
        }

        log::debug!(
            "Topology graph ({:?}): {} segments, {} edges",
            mode,
            graph.node_count(),
            graph.edge_count()
        );

        graph
    }

    /// Graph with the given undirected edges and no geometry.
    pub fn from_edges<I, A>(edges: I) -> Self
    where
        I: IntoIterator<Item = (A, A)>,
        A: Into<SegmentIdentifier>,
    {
        let mut graph = Self::new();
        for (a, b) in edges {
            graph.add_edge(a.into(), b.into());
        }
        graph
    }

    pub fn add_node(&mut self, id: SegmentIdentifier) {
        if !self.adjacency.contains_key(&id) {
            self.nodes.push(id.clone());
            self.adjacency.insert(id, Vec::new());
        }
    }

    /// Insert an undirected edge. Self-edges are ignored.
    pub fn add_edge(&mut self, a: SegmentIdentifier, b: SegmentIdentifier) {
        self.add_node(a.clone());
        self.add_node(b.clone());
        if a == b {
            return;
        }
        push_unique(self.adjacency.entry(a.clone()).or_default(), b.clone());
        push_unique(self.adjacency.entry(b).or_default(), a);
    }

    pub fn contains(&self, id: &SegmentIdentifier) -> bool {
        self.adjacency.contains_key(id)
    }

    /// Neighbors in insertion order; empty for unknown ids
    pub fn neighbors(&self, id: &SegmentIdentifier) -> &[SegmentIdentifier] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn are_adjacent(&self, a: &SegmentIdentifier, b: &SegmentIdentifier) -> bool {
        self.neighbors(a).contains(b)
    }

    /// Segment ids in insertion order
    pub fn nodes(&self) -> &[SegmentIdentifier] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum::<usize>() / 2
    }

    /// Per-endpoint neighbors of a segment built from geometry
    pub fn connections_at(&self, id: &SegmentIdentifier) -> Option<EndpointConnections> {
        self.endpoints.get(id).map(|e| EndpointConnections {
            segment: id.clone(),
            start: e.start,
            end: e.end,
            at_start: e.at_start.clone(),
            at_end: e.at_end.clone(),
        })
    }
}

fn push_unique(list: &mut Vec<SegmentIdentifier>, id: SegmentIdentifier) {
    if !list.contains(&id) {
        list.push(id);
    }
}

/// (start links, end links) per segment, as indices into `segments`
type Links = Vec<(Vec<usize>, Vec<usize>)>;

fn exact_links(segments: &[&Segment], precision: u32) -> Links {
    // Maps coordinate key -> segment indices with an endpoint there, in input order
    let mut endpoint_index: HashMap<(i64, i64), Vec<usize>> = HashMap::new();

    for (idx, segment) in segments.iter().enumerate() {
        let start = coord_key(segment.start(), precision);
        let end = coord_key(segment.end(), precision);
        endpoint_index.entry(start).or_default().push(idx);
        // A closed loop is indexed once at its single junction
        if end != start {
            endpoint_index.entry(end).or_default().push(idx);
        }
    }

    segments
        .iter()
        .enumerate()
        .map(|(idx, segment)| {
            let start = coord_key(segment.start(), precision);
            let end = coord_key(segment.end(), precision);
            let others_at = |key| -> Vec<usize> {
                endpoint_index
                    .get(&key)
                    .map(|group| group.iter().copied().filter(|&j| j != idx).collect())
                    .unwrap_or_default()
            };

            let at_start = others_at(start);
            let at_end = if end == start { Vec::new() } else { others_at(end) };
            (at_start, at_end)
        })
        .collect()
}

fn tolerant_links(segments: &[&Segment], radius_m: f64) -> Links {
    let mut nodes = Vec::with_capacity(segments.len() * 2);
    for (idx, segment) in segments.iter().enumerate() {
        nodes.push(EndpointNode::new(idx, segment.start()));
        if !segment.is_closed() {
            nodes.push(EndpointNode::new(idx, segment.end()));
        }
    }
    let tree = RTree::bulk_load(nodes);

    let others_near = |idx: usize, coord: Coord<f64>| -> Vec<usize> {
        let probe = EndpointNode::new(idx, coord);
        let radius_deg = search_radius_degrees(probe.point(), radius_m);
        let mut found: Vec<usize> = tree
            .locate_within_distance([coord.x, coord.y], radius_deg * radius_deg)
            .filter(|node| node.segment_index != idx)
            .filter(|node| haversine_distance(probe.point(), node.point()) <= radius_m)
            .map(|node| node.segment_index)
            .collect();
        // R-tree order is not stable across builds
        found.sort_unstable();
        found.dedup();
        found
    };

    segments
        .iter()
        .enumerate()
        .map(|(idx, segment)| {
            let at_start = others_near(idx, segment.start());
            let at_end = if segment.is_closed() {
                Vec::new()
            } else {
                others_near(idx, segment.end())
            };
            (at_start, at_end)
        })
        .collect()
}

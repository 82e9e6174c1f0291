//! In-memory segment store.
//!
//! Holds the whole catalog with spatial indices for proximity queries. Used by
//! the command-line tool and as the reference implementation in tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use geo::{Coord, Point};
use rstar::{RTree, AABB};

use crate::identifiers::*;
use crate::models::traits::{SegmentStore, StoreResult};
use crate::models::types::{Segment, Station, StoreError};
use crate::spatial::index::{SegmentPieceNode, StationNode};
use crate::spatial::queries::{haversine_distance, haversine_distance_to_line, search_radius_degrees};

/// In-memory segment store with spatial indexing
///
/// This type is cheap to clone since all data is stored in `Arc`s.
#[derive(Clone)]
pub struct StaticSegmentStore {
    // Core data, in load order
    segments: Vec<Arc<Segment>>,
    stations: Vec<Arc<Station>>,

    // Lookup maps
    segment_map: HashMap<SegmentIdentifier, Arc<Segment>>,
    station_map: HashMap<StationIdentifier, Arc<Station>>,

    // Spatial indices
    segment_tree: RTree<SegmentPieceNode>,
    station_tree: RTree<StationNode>,
}

impl StaticSegmentStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::from_data(Vec::new(), Vec::new())
    }

    /// Build a store from loaded records. Later duplicates of an id replace earlier ones.
    pub fn from_data(segments: Vec<Segment>, stations: Vec<Station>) -> Self {
        let mut segment_map = HashMap::new();
        let mut ordered = Vec::with_capacity(segments.len());
        for segment in segments {
            let segment = Arc::new(segment);
            if segment_map.insert(segment.id.clone(), segment.clone()).is_some() {
                log::warn!("Duplicate segment id {}, keeping the last one", segment.id);
                ordered.retain(|s: &Arc<Segment>| s.id != segment.id);
            }
            ordered.push(segment);
        }

        let stations: Vec<Arc<Station>> = stations.into_iter().map(Arc::new).collect();
        let station_map: HashMap<_, _> = stations
            .iter()
            .map(|s| (s.id.clone(), s.clone()))
            .collect();

        // Build spatial indices
        let segment_tree = RTree::bulk_load(
            ordered
                .iter()
                .flat_map(SegmentPieceNode::pieces_of)
                .collect(),
        );
        let station_tree = RTree::bulk_load(stations.iter().cloned().map(StationNode::new).collect());

        log::debug!(
            "Segment store: {} segments ({} pieces), {} stations",
            ordered.len(),
            segment_tree.size(),
            stations.len()
        );

        Self {
            segments: ordered,
            stations,
            segment_map,
            station_map,
            segment_tree,
            station_tree,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn all_segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().map(|s| s.as_ref())
    }

    pub fn all_stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter().map(|s| s.as_ref())
    }

    fn collect_ids<'a>(nodes: impl Iterator<Item = &'a SegmentPieceNode>) -> HashSet<SegmentIdentifier> {
        nodes.map(|node| node.segment.id.clone()).collect()
    }

    /// Matching ids in load order, so graph insertion order is reproducible
    fn in_load_order(&self, wanted: HashSet<SegmentIdentifier>) -> Vec<SegmentIdentifier> {
        self.segments
            .iter()
            .filter(|s| wanted.contains(&s.id))
            .map(|s| s.id.clone())
            .collect()
    }
}

impl Default for StaticSegmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentStore for StaticSegmentStore {
    fn segment(&self, id: &SegmentIdentifier) -> StoreResult<Segment> {
        self.segment_map
            .get(id)
            .map(|s| s.as_ref().clone())
            .ok_or_else(|| StoreError::SegmentNotFound(id.clone()))
    }

    fn station(&self, id: &StationIdentifier) -> StoreResult<Station> {
        self.station_map
            .get(id)
            .map(|s| s.as_ref().clone())
            .ok_or_else(|| StoreError::StationNotFound(id.clone()))
    }

    fn segments_near(&self, point: Point<f64>, tolerance_m: f64) -> StoreResult<Vec<SegmentIdentifier>> {
        // Validate radius is positive
        if tolerance_m <= 0.0 || !tolerance_m.is_finite() {
            return Ok(Vec::new());
        }

        let radius_deg = search_radius_degrees(point, tolerance_m);
        let found = Self::collect_ids(
            self.segment_tree
                .locate_within_distance([point.x(), point.y()], radius_deg * radius_deg)
                .filter(|node| haversine_distance_to_line(point, node.piece) <= tolerance_m),
        );
        Ok(self.in_load_order(found))
    }

    fn segments_in_envelope(&self, min: Coord<f64>, max: Coord<f64>) -> StoreResult<Vec<SegmentIdentifier>> {
        let envelope = AABB::from_corners([min.x, min.y], [max.x, max.y]);
        let found = Self::collect_ids(self.segment_tree.locate_in_envelope_intersecting(&envelope));
        Ok(self.in_load_order(found))
    }

    fn stations_near(&self, point: Point<f64>, radius_m: f64) -> StoreResult<Vec<Station>> {
        if radius_m <= 0.0 || !radius_m.is_finite() {
            return Ok(Vec::new());
        }

        let radius_deg = search_radius_degrees(point, radius_m);
        Ok(self
            .station_tree
            .locate_within_distance([point.x(), point.y()], radius_deg * radius_deg)
            .filter(|node| haversine_distance(point, node.station.location) <= radius_m)
            .map(|node| node.station.as_ref().clone())
            .collect())
    }
}

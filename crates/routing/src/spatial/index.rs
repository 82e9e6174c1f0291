//! R-tree nodes for spatial indexing.
//!
//! Wraps segments, segment endpoints and stations with geometric data for
//! proximity queries.
//!
//! ## Two-Stage Filtering
//!
//! The spatial queries use a two-stage filtering approach:
//! 1. **R-tree filter**: Euclidean distance in degrees, widened for latitude
//!    (see [`search_radius_degrees`](super::queries::search_radius_degrees))
//! 2. **Haversine filter**: accurate geodesic distance in meters on the
//!    filtered results

use std::sync::Arc;

use geo::{Coord, Line, Point};
use rstar::{PointDistance, RTreeObject, AABB};

use crate::models::types::{Segment, Station};

fn squared_planar(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

// ============================================================================
// Station Spatial Node
// ============================================================================

#[derive(Clone)]
pub struct StationNode {
    pub station: Arc<Station>,
    point: [f64; 2],
}

impl StationNode {
    pub fn new(station: Arc<Station>) -> Self {
        let point = [station.location.x(), station.location.y()];
        Self { station, point }
    }
}

impl RTreeObject for StationNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for StationNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        squared_planar(self.point, *point)
    }
}

// ============================================================================
// Segment Piece Spatial Node
// ============================================================================

/// One straight piece (consecutive vertex pair) of a segment polyline.
#[derive(Clone)]
pub struct SegmentPieceNode {
    pub segment: Arc<Segment>,
    pub piece: Line,
    aabb: AABB<[f64; 2]>,
}

impl SegmentPieceNode {
    pub fn new(piece: Line, segment: Arc<Segment>) -> Self {
        let start = [piece.start.x, piece.start.y];
        let end = [piece.end.x, piece.end.y];

        Self {
            segment,
            piece,
            aabb: AABB::from_corners(start, end),
        }
    }

    /// Every piece of `segment`
    pub fn pieces_of(segment: &Arc<Segment>) -> impl Iterator<Item = SegmentPieceNode> + '_ {
        segment
            .geometry()
            .lines()
            .map(move |piece| SegmentPieceNode::new(piece, segment.clone()))
    }
}

impl RTreeObject for SegmentPieceNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

impl PointDistance for SegmentPieceNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        // Distance from point to line segment (squared Euclidean distance)
        let p = [point[0], point[1]];
        let a = [self.piece.start.x, self.piece.start.y];
        let b = [self.piece.end.x, self.piece.end.y];

        let ab = [b[0] - a[0], b[1] - a[1]];
        let ap = [p[0] - a[0], p[1] - a[1]];

        let ab_ab = ab[0] * ab[0] + ab[1] * ab[1];

        if ab_ab == 0.0 {
            // Piece is actually a point
            return ap[0] * ap[0] + ap[1] * ap[1];
        }

        let ab_ap = ab[0] * ap[0] + ab[1] * ap[1];
        let t = (ab_ap / ab_ab).clamp(0.0, 1.0);

        let closest = [a[0] + t * ab[0], a[1] + t * ab[1]];
        squared_planar(p, closest)
    }
}

// ============================================================================
// Endpoint Spatial Node
// ============================================================================

/// The first or last coordinate of a segment, keyed by the segment's position
/// in the slice the index was built from.
#[derive(Clone, Copy, Debug)]
pub struct EndpointNode {
    pub segment_index: usize,
    pub coord: Coord<f64>,
}

impl EndpointNode {
    pub fn new(segment_index: usize, coord: Coord<f64>) -> Self {
        Self {
            segment_index,
            coord,
        }
    }

    pub fn point(&self) -> Point<f64> {
        Point::from(self.coord)
    }
}

impl RTreeObject for EndpointNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.coord.x, self.coord.y])
    }
}

impl PointDistance for EndpointNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        squared_planar([self.coord.x, self.coord.y], *point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;
    use rstar::RTree;

    #[test]
    fn test_piece_distance() {
        let segment = Arc::new(
            Segment::new("s", LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)])).unwrap(),
        );
        let tree = RTree::bulk_load(SegmentPieceNode::pieces_of(&segment).collect());
        assert_eq!(tree.size(), 2);

        let nearest = tree.nearest_neighbor(&[12.0, 5.0]).unwrap();
        assert_eq!(nearest.piece.start, Coord { x: 10.0, y: 0.0 });
        assert_eq!(nearest.distance_2(&[12.0, 5.0]), 4.0);
    }

    #[test]
    fn test_endpoint_within_distance() {
        let tree = RTree::bulk_load(vec![
            EndpointNode::new(0, Coord { x: 0.0, y: 0.0 }),
            EndpointNode::new(1, Coord { x: 0.5, y: 0.0 }),
            EndpointNode::new(2, Coord { x: 3.0, y: 0.0 }),
        ]);

        let mut found: Vec<usize> = tree
            .locate_within_distance([0.0, 0.0], 1.0)
            .map(|node| node.segment_index)
            .collect();
        found.sort_unstable();
        assert_eq!(found, vec![0, 1]);
    }
}

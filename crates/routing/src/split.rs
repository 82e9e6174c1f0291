//! Splitting a segment polyline at a resolved point.
//!
//! Used to turn one segment into a compound pair of children that share the
//! split point. Distances here are planar, in coordinate units.

use geo::{Coord, LineString};

use crate::identifiers::SegmentIdentifier;
use crate::models::types::{InvalidInput, Segment, SplitError};
use crate::spatial::queries::{planar_distance, project_onto_segment};

/// The two halves of a split polyline.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitResult {
    /// Vertices up to the split, ending with `point`
    pub left: LineString<f64>,
    /// `point`, then the vertices after the split
    pub right: LineString<f64>,
    /// Index of the piece (`index`..`index + 1`) the split landed on
    pub index: usize,
    pub point: Coord<f64>,
    /// True when the split was moved onto an existing vertex
    pub snapped: bool,
}

fn require_polyline(polyline: &LineString<f64>) -> Result<(), SplitError> {
    if polyline.0.len() < 2 {
        return Err(InvalidInput::DegeneratePolyline {
            index: 0,
            points: polyline.0.len(),
        }
        .into());
    }
    Ok(())
}

/// Find the piece of `polyline` nearest to `query`
/// Returns (piece_index, projected_point)
pub fn nearest_segment(polyline: &LineString<f64>, query: Coord<f64>) -> Result<(usize, Coord<f64>), SplitError> {
    require_polyline(polyline)?;

    let mut best_idx = 0;
    let mut best_point = polyline.0[0];
    let mut best_dist = f64::MAX;

    for (i, pair) in polyline.0.windows(2).enumerate() {
        let projection = project_onto_segment(query, pair[0], pair[1]);
        if projection.distance < best_dist {
            best_dist = projection.distance;
            best_point = projection.point;
            best_idx = i;
        }
    }

    Ok((best_idx, best_point))
}

/// Split after vertex `index`, inserting `point` at the end of the left half
/// and the start of the right half.
pub fn split_at(
    polyline: &LineString<f64>,
    index: usize,
    point: Coord<f64>,
) -> Result<(LineString<f64>, LineString<f64>), SplitError> {
    require_polyline(polyline)?;
    let coords = &polyline.0;
    if index + 1 >= coords.len() {
        return Err(InvalidInput::SplitIndexOutOfRange {
            index,
            points: coords.len(),
        }
        .into());
    }

    let mut left: Vec<Coord<f64>> = coords[..=index].to_vec();
    left.push(point);

    let mut right = Vec::with_capacity(coords.len() - index);
    right.push(point);
    right.extend_from_slice(&coords[index + 1..]);

    Ok((LineString::new(left), LineString::new(right)))
}

/// A split point must keep at least `min_distance` from both piece vertices
pub fn is_valid_split(point: Coord<f64>, seg_start: Coord<f64>, seg_end: Coord<f64>, min_distance: f64) -> bool {
    planar_distance(point, seg_start) >= min_distance && planar_distance(point, seg_end) >= min_distance
}

/// Split `polyline` at the point nearest to `query`.
///
/// When that point falls within `min_distance` of a vertex, the split snaps to
/// the vertex instead of creating a near-zero-length piece. Snapping onto the
/// first or last vertex would leave an empty half, so that is an error.
pub fn split_segment(polyline: &LineString<f64>, query: Coord<f64>, min_distance: f64) -> Result<SplitResult, SplitError> {
    let (index, point) = nearest_segment(polyline, query)?;
    let coords = &polyline.0;
    let (seg_start, seg_end) = (coords[index], coords[index + 1]);

    if is_valid_split(point, seg_start, seg_end, min_distance) {
        let (left, right) = split_at(polyline, index, point)?;
        return Ok(SplitResult {
            left,
            right,
            index,
            point,
            snapped: false,
        });
    }

    let to_start = planar_distance(point, seg_start);
    let to_end = planar_distance(point, seg_end);
    let vertex = if to_start <= to_end { index } else { index + 1 };

    if vertex == 0 || vertex == coords.len() - 1 {
        return Err(SplitError::TooCloseToEndpoint {
            distance: to_start.min(to_end),
            min_distance,
        });
    }

    log::debug!(
        "Split point ({}, {}) snapped to vertex {}",
        point.x,
        point.y,
        vertex
    );

    Ok(SplitResult {
        left: LineString::new(coords[..=vertex].to_vec()),
        right: LineString::new(coords[vertex..].to_vec()),
        index: vertex - 1,
        point: coords[vertex],
        snapped: true,
    })
}

/// Divide `segment` into two child segments sharing the split point.
pub fn split_into_children(
    segment: &Segment,
    query: Coord<f64>,
    min_distance: f64,
    left_id: SegmentIdentifier,
    right_id: SegmentIdentifier,
) -> Result<(Segment, Segment), SplitError> {
    let result = split_segment(segment.geometry(), query, min_distance)?;
    let left = Segment::new(left_id, result.left)?;
    let right = Segment::new(right_id, result.right)?;
    Ok((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn polyline() -> LineString<f64> {
        LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (20.0, 10.0)])
    }

    #[test]
    fn test_nearest_segment() {
        let (index, point) = nearest_segment(&polyline(), Coord { x: 12.0, y: 4.0 }).unwrap();
        assert_eq!(index, 1);
        assert_relative_eq!(point.x, 10.0);
        assert_relative_eq!(point.y, 4.0);

        // Past the end clamps to the last vertex
        let (index, point) = nearest_segment(&polyline(), Coord { x: 30.0, y: 10.0 }).unwrap();
        assert_eq!(index, 2);
        assert_eq!(point, Coord { x: 20.0, y: 10.0 });
    }

    #[test]
    fn test_split_at() {
        let point = Coord { x: 5.0, y: 0.0 };
        let (left, right) = split_at(&polyline(), 0, point).unwrap();
        assert_eq!(left, LineString::from(vec![(0.0, 0.0), (5.0, 0.0)]));
        assert_eq!(
            right,
            LineString::from(vec![(5.0, 0.0), (10.0, 0.0), (10.0, 10.0), (20.0, 10.0)])
        );

        assert!(split_at(&polyline(), 3, point).is_err());
    }

    #[test]
    fn test_split_rejoins_to_original() {
        let original = polyline();
        let result = split_segment(&original, Coord { x: 15.0, y: 11.0 }, 0.5).unwrap();
        assert!(!result.snapped);

        // Drop the synthetic shared point once from each side
        let mut rejoined: Vec<Coord<f64>> = result.left.0[..result.left.0.len() - 1].to_vec();
        rejoined.extend_from_slice(&result.right.0[1..]);
        assert_eq!(LineString::new(rejoined), original);
    }

    #[test]
    fn test_is_valid_split() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 10.0, y: 0.0 };
        assert!(is_valid_split(Coord { x: 5.0, y: 0.0 }, a, b, 1.0));
        assert!(!is_valid_split(Coord { x: 0.5, y: 0.0 }, a, b, 1.0));
        assert!(!is_valid_split(Coord { x: 9.9, y: 0.0 }, a, b, 1.0));
    }

    #[test]
    fn test_split_snaps_to_interior_vertex() {
        let result = split_segment(&polyline(), Coord { x: 9.8, y: 0.3 }, 1.0).unwrap();
        assert!(result.snapped);
        assert_eq!(result.point, Coord { x: 10.0, y: 0.0 });
        assert_eq!(result.left, LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]));
        assert_eq!(
            result.right,
            LineString::from(vec![(10.0, 0.0), (10.0, 10.0), (20.0, 10.0)])
        );
    }

    #[test]
    fn test_split_near_endpoint_fails() {
        let err = split_segment(&polyline(), Coord { x: 0.2, y: -1.0 }, 1.0).unwrap_err();
        assert!(matches!(err, SplitError::TooCloseToEndpoint { .. }));
    }

    #[test]
    fn test_split_degenerate_polyline() {
        let single = LineString::from(vec![(0.0, 0.0)]);
        assert!(matches!(
            split_segment(&single, Coord { x: 0.0, y: 0.0 }, 0.0),
            Err(SplitError::InvalidInput(InvalidInput::DegeneratePolyline { .. }))
        ));
    }

    #[test]
    fn test_split_into_children() {
        let segment = Segment::new("main", polyline()).unwrap();
        let (left, right) = split_into_children(
            &segment,
            Coord { x: 10.0, y: 5.0 },
            0.5,
            SegmentIdentifier::new("main_a"),
            SegmentIdentifier::new("main_b"),
        )
        .unwrap();

        assert_eq!(left.id.as_str(), "main_a");
        assert_eq!(left.end(), right.start());
        assert_eq!(left.end(), Coord { x: 10.0, y: 5.0 });
        assert_eq!(right.end(), Coord { x: 20.0, y: 10.0 });
    }
}

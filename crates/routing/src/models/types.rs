//! Core data types and errors for track routing.

use std::fmt;

use geo::{Coord, LineString, Point, Rect};

use crate::identifiers::*;

// ============================================================================
// Data Structures
// ============================================================================

/// An atomic track polyline with a stable identifier.
///
/// Always holds at least two coordinates; the first and last are its endpoints.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub id: SegmentIdentifier,
    geometry: LineString<f64>,
}

impl Segment {
    pub fn new(id: impl Into<SegmentIdentifier>, geometry: LineString<f64>) -> Result<Self> {
        let id = id.into();
        if geometry.0.len() < 2 {
            return Err(InvalidInput::DegenerateSegment {
                id,
                points: geometry.0.len(),
            });
        }
        Ok(Self { id, geometry })
    }

    pub fn geometry(&self) -> &LineString<f64> {
        &self.geometry
    }

    pub fn into_geometry(self) -> LineString<f64> {
        self.geometry
    }

    pub fn start(&self) -> Coord<f64> {
        self.geometry.0[0]
    }

    pub fn end(&self) -> Coord<f64> {
        self.geometry.0[self.geometry.0.len() - 1]
    }

    pub fn endpoints(&self) -> [Coord<f64>; 2] {
        [self.start(), self.end()]
    }

    /// A closed loop starts and ends on the same coordinate.
    pub fn is_closed(&self) -> bool {
        self.start() == self.end()
    }

    pub fn bounding_rect(&self) -> Rect<f64> {
        bounding_rect(&self.geometry.0)
    }
}

/// A named point used to derive nearby candidate segments.
#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    pub id: StationIdentifier,
    pub name: String,
    pub location: Point<f64>,
}

/// A pathfinding anchor: start, via, or end of a requested route.
#[derive(Clone, Debug, PartialEq)]
pub enum Waypoint {
    /// Resolved to the segments near the station's location
    Station(StationIdentifier),
    /// A directly chosen segment, used as the only candidate
    Segment(SegmentIdentifier),
    /// A raw lon/lat position resolved by proximity
    Point(Point<f64>),
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Waypoint::Station(id) => write!(f, "station:{}", id),
            Waypoint::Segment(id) => write!(f, "{}", id),
            Waypoint::Point(p) => write!(f, "{},{}", p.x(), p.y()),
        }
    }
}

/// Ordered, non-empty sequence of segment ids with no immediate repetition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path(Vec<SegmentIdentifier>);

impl Path {
    pub fn single(id: SegmentIdentifier) -> Self {
        Self(vec![id])
    }

    pub fn from_segments(segments: Vec<SegmentIdentifier>) -> Result<Self> {
        if segments.is_empty() {
            return Err(InvalidInput::EmptyPath);
        }
        if let Some(pair) = segments.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(InvalidInput::RepeatedSegment(pair[0].clone()));
        }
        Ok(Self(segments))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true for a constructed path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> &SegmentIdentifier {
        &self.0[0]
    }

    pub fn last(&self) -> &SegmentIdentifier {
        &self.0[self.0.len() - 1]
    }

    pub fn segments(&self) -> &[SegmentIdentifier] {
        &self.0
    }

    pub fn contains(&self, id: &SegmentIdentifier) -> bool {
        self.0.contains(id)
    }

    pub fn into_inner(self) -> Vec<SegmentIdentifier> {
        self.0
    }

    /// Append `next`, dropping its first segment when it repeats our last one.
    pub fn extend_path(&mut self, next: &Path) {
        let skip = usize::from(next.first() == self.last());
        self.0.extend(next.0.iter().skip(skip).cloned());
    }

    /// Quoted, semicolon-joined token for scripting; `""` when there is no path.
    pub fn list_token(path: Option<&Path>) -> String {
        match path {
            Some(path) => format!("\"{}\"", path),
            None => "\"\"".to_string(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

/// Result of chain merging.
///
/// `ambiguous_start` is set when no input had an unshared endpoint, so the
/// orientation of `line` is a best-effort guess.
#[derive(Clone, Debug, PartialEq)]
pub struct MergedGeometry {
    pub line: LineString<f64>,
    pub ambiguous_start: bool,
}

impl MergedGeometry {
    /// The merged line, or `AmbiguousStart` when its orientation is a guess.
    pub fn require_anchored(self) -> std::result::Result<LineString<f64>, MergeError> {
        if self.ambiguous_start {
            Err(MergeError::AmbiguousStart)
        } else {
            Ok(self.line)
        }
    }
}

pub(crate) fn bounding_rect(coords: &[Coord<f64>]) -> Rect<f64> {
    let first = coords.first().copied().unwrap_or(Coord { x: 0.0, y: 0.0 });
    let (min, max) = coords.iter().fold((first, first), |(min, max), c| {
        (
            Coord { x: min.x.min(c.x), y: min.y.min(c.y) },
            Coord { x: max.x.max(c.x), y: max.y.max(c.y) },
        )
    });
    Rect::new(min, max)
}

// ============================================================================
// Errors
// ============================================================================

/// Malformed identifiers, degenerate geometry and bad parameters.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum InvalidInput {
    #[error("Malformed {kind} identifier: {value:?}")]
    MalformedIdentifier { kind: &'static str, value: String },

    #[error("Segment {id} has {points} point(s), at least 2 are required")]
    DegenerateSegment { id: SegmentIdentifier, points: usize },

    #[error("Polyline #{index} has {points} point(s), at least 2 are required")]
    DegeneratePolyline { index: usize, points: usize },

    #[error("Path must contain at least one segment")]
    EmptyPath,

    #[error("Path repeats segment {0} in immediate succession")]
    RepeatedSegment(SegmentIdentifier),

    #[error("At least two waypoints are required, got {0}")]
    TooFewWaypoints(usize),

    #[error("Invalid tolerance schedule: {0}")]
    ToleranceSchedule(String),

    #[error("Invalid planner setting {name}: {value}")]
    Setting { name: &'static str, value: f64 },

    #[error("Nothing to merge")]
    EmptyChain,

    #[error("Split index {index} is out of range for a polyline of {points} points")]
    SplitIndexOutOfRange { index: usize, points: usize },
}

pub type Result<T> = std::result::Result<T, InvalidInput>;

/// Failures reported by a [`SegmentStore`](crate::models::traits::SegmentStore).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Segment not found: {0}")]
    SegmentNotFound(SegmentIdentifier),

    #[error("Station not found: {0}")]
    StationNotFound(StationIdentifier),

    #[error("Segment store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
}

/// Failures of multi-waypoint planning.
///
/// Every leg that resolved before the failure is kept in `partial`.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum PlannerError {
    #[error("No segments near waypoint {waypoint_index} ({waypoint}) within {max_tolerance_m} m")]
    NoCandidates {
        waypoint_index: usize,
        waypoint: Waypoint,
        max_tolerance_m: f64,
        partial: crate::planner::PlanReport,
    },

    #[error("No path for leg {leg_index} ({from} -> {to}) within {max_tolerance_m} m")]
    NoPathFound {
        leg_index: usize,
        from: Waypoint,
        to: Waypoint,
        max_tolerance_m: f64,
        partial: crate::planner::PlanReport,
    },

    #[error("Lookup for waypoint {waypoint_index} failed: {source}")]
    Store {
        waypoint_index: usize,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
}

impl PlannerError {
    /// Legs resolved before the failure, if any were attempted.
    pub fn partial(&self) -> Option<&crate::planner::PlanReport> {
        match self {
            PlannerError::NoCandidates { partial, .. } | PlannerError::NoPathFound { partial, .. } => {
                Some(partial)
            }
            PlannerError::Store { .. } | PlannerError::InvalidInput(_) => None,
        }
    }
}

/// Failures of chain merging.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum MergeError {
    #[error(
        "Broken chain: nothing continues from {last} at ({}, {}); unmerged: {}",
        .at.x,
        .at.y,
        .remaining.join(", ")
    )]
    BrokenChain {
        last: String,
        at: Coord<f64>,
        remaining: Vec<String>,
    },

    #[error("No polyline has an unshared endpoint; orientation is a guess")]
    AmbiguousStart,

    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
}

/// Failures of segment splitting.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SplitError {
    #[error("Split point is {distance} from the polyline end, closer than {min_distance}")]
    TooCloseToEndpoint { distance: f64, min_distance: f64 },

    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
}

/// Failures of end-to-end route assembly.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RouteError {
    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("Fetching route geometry failed: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<SegmentIdentifier> {
        names.iter().map(|n| SegmentIdentifier::new(*n)).collect()
    }

    #[test]
    fn test_segment_requires_two_points() {
        let err = Segment::new("s1", LineString::from(vec![(0.0, 0.0)])).unwrap_err();
        assert!(matches!(err, InvalidInput::DegenerateSegment { points: 1, .. }));

        let segment = Segment::new("s2", LineString::from(vec![(0.0, 0.0), (1.0, 0.0)])).unwrap();
        assert_eq!(segment.start(), Coord { x: 0.0, y: 0.0 });
        assert_eq!(segment.end(), Coord { x: 1.0, y: 0.0 });
        assert!(!segment.is_closed());
    }

    #[test]
    fn test_closed_segment() {
        let segment = Segment::new(
            "loop",
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
        )
        .unwrap();
        assert!(segment.is_closed());
    }

    #[test]
    fn test_path_rejects_immediate_repetition() {
        assert_eq!(Path::from_segments(vec![]), Err(InvalidInput::EmptyPath));
        assert!(matches!(
            Path::from_segments(ids(&["a", "b", "b"])),
            Err(InvalidInput::RepeatedSegment(_))
        ));
        // Revisiting later is allowed
        assert!(Path::from_segments(ids(&["a", "b", "a"])).is_ok());
    }

    #[test]
    fn test_path_extend_drops_shared_segment() {
        let mut path = Path::from_segments(ids(&["a", "b"])).unwrap();
        path.extend_path(&Path::from_segments(ids(&["b", "c"])).unwrap());
        assert_eq!(path.segments(), ids(&["a", "b", "c"]).as_slice());

        path.extend_path(&Path::from_segments(ids(&["d"])).unwrap());
        assert_eq!(path.segments(), ids(&["a", "b", "c", "d"]).as_slice());
    }

    #[test]
    fn test_list_token() {
        let path = Path::from_segments(ids(&["10", "11", "12"])).unwrap();
        assert_eq!(Path::list_token(Some(&path)), "\"10;11;12\"");
        assert_eq!(Path::list_token(None), "\"\"");
    }

    #[test]
    fn test_require_anchored() {
        let line = LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]);
        let anchored = MergedGeometry { line: line.clone(), ambiguous_start: false };
        assert_eq!(anchored.require_anchored(), Ok(line.clone()));

        let guessed = MergedGeometry { line, ambiguous_start: true };
        assert_eq!(guessed.require_anchored(), Err(MergeError::AmbiguousStart));
    }
}

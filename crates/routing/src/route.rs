//! End-to-end route assembly: plan the legs, fetch their geometry once, and
//! stitch the merged legs into a single line in travel order.

use std::collections::HashMap;

use geo::{Coord, LineString};

use crate::identifiers::SegmentIdentifier;
use crate::merge::merge_segments;
use crate::models::traits::SegmentStore;
use crate::models::types::{
    InvalidInput, MergeError, MergedGeometry, Path, PlannerError, RouteError, Segment, StoreError, Waypoint,
};
use crate::planner::{MultiWaypointPlanner, PlanReport, PlannerConfig};
use crate::spatial::queries::planar_distance;

/// A planned path with its geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub path: Path,
    /// Starts at the first waypoint's end of the path
    pub geometry: MergedGeometry,
    pub report: PlanReport,
}

/// Plan `waypoints`, then merge the path into one line.
///
/// Each leg is merged on its own, so a path that doubles back over a segment
/// at a via point still yields a continuous line.
pub fn find_route<S: SegmentStore + ?Sized>(
    store: &S,
    waypoints: &[Waypoint],
    config: &PlannerConfig,
) -> Result<Route, RouteError> {
    let report = MultiWaypointPlanner::new(store, config.clone()).plan_legs(waypoints)?;
    let path = report
        .combined_path()
        .ok_or(PlannerError::InvalidInput(InvalidInput::EmptyPath))?;

    // One batched fetch for every distinct segment on the path
    let mut distinct: Vec<SegmentIdentifier> = Vec::new();
    for id in path.segments() {
        if !distinct.contains(id) {
            distinct.push(id.clone());
        }
    }
    let fetched: HashMap<SegmentIdentifier, Segment> = store
        .segments(&distinct)?
        .into_iter()
        .map(|segment| (segment.id.clone(), segment))
        .collect();

    let mut coords: Vec<Coord<f64>> = Vec::new();
    let mut ambiguous_start = false;
    let mut previous_last: Option<&SegmentIdentifier> = None;

    for leg in &report.legs {
        let segments = leg
            .path
            .segments()
            .iter()
            .map(|id| {
                fetched
                    .get(id)
                    .cloned()
                    .ok_or_else(|| StoreError::SegmentNotFound(id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let prior = previous_last.replace(leg.path.last());
        let shared = prior == Some(leg.path.first());

        // Nothing new when the leg stays on the segment we are already on
        if shared && segments.len() == 1 {
            continue;
        }

        let merged = merge_segments(&segments)?;
        ambiguous_start |= merged.ambiguous_start;
        let line = orient(merged.line.0, &segments, coords.last().copied());

        let Some(&tail) = coords.last() else {
            coords = line;
            continue;
        };

        // The leg's first segment may already be walked by the previous leg
        let first_len = segments[0].geometry().0.len();
        let skip = if line[0] == tail {
            1
        } else if shared && line.get(first_len - 1) == Some(&tail) {
            first_len
        } else {
            // The leg re-entered the network somewhere the previous one never reached
            return Err(MergeError::BrokenChain {
                last: prior.map(|id| id.to_string()).unwrap_or_default(),
                at: tail,
                remaining: leg.path.segments().iter().map(|id| id.to_string()).collect(),
            }
            .into());
        };
        coords.extend(line.into_iter().skip(skip));
    }

    log::debug!(
        "Route through {} waypoints: {} segments, {} coordinates",
        waypoints.len(),
        path.len(),
        coords.len()
    );

    Ok(Route {
        path,
        geometry: MergedGeometry {
            line: LineString::new(coords),
            ambiguous_start,
        },
        report,
    })
}

/// Merge the geometry of a path that visits each segment once, oriented to
/// start on its first segment.
pub fn path_geometry<S: SegmentStore + ?Sized>(store: &S, path: &Path) -> Result<MergedGeometry, RouteError> {
    let segments = store.segments(path.segments())?;
    let merged = merge_segments(&segments)?;
    Ok(MergedGeometry {
        line: LineString::new(orient(merged.line.0, &segments, None)),
        ambiguous_start: merged.ambiguous_start,
    })
}

/// Reverse a merged leg so it begins on the leg's first segment. A lone
/// segment has both ends on it and begins at the end nearer `tail`.
fn orient(mut line: Vec<Coord<f64>>, segments: &[Segment], tail: Option<Coord<f64>>) -> Vec<Coord<f64>> {
    let (Some(&head), Some(&last)) = (line.first(), line.last()) else {
        return line;
    };

    let reverse = if segments.len() > 1 {
        let ends = segments[0].endpoints();
        !ends.contains(&head) && ends.contains(&last)
    } else {
        tail.is_some_and(|tail| planar_distance(last, tail) < planar_distance(head, tail))
    };

    if reverse {
        line.reverse();
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::StationIdentifier;
    use crate::models::types::Station;
    use crate::provider::StaticSegmentStore;
    use geo::Point;

    fn segment(id: &str, coords: Vec<(f64, f64)>) -> Segment {
        Segment::new(id, LineString::from(coords)).unwrap()
    }

    fn line_store() -> StaticSegmentStore {
        StaticSegmentStore::from_data(
            vec![
                segment("a", vec![(10.00, 59.0), (10.01, 59.0)]),
                segment("b", vec![(10.01, 59.0), (10.02, 59.0)]),
                segment("c", vec![(10.02, 59.0), (10.03, 59.0)]),
                segment("d", vec![(10.04, 59.0), (10.03, 59.0)]),
            ],
            vec![Station {
                id: StationIdentifier::new("junction"),
                name: "Junction".into(),
                location: Point::new(10.01, 59.0),
            }],
        )
    }

    fn seg(id: &str) -> Waypoint {
        Waypoint::Segment(SegmentIdentifier::new(id))
    }

    fn lons(route: &Route) -> Vec<f64> {
        route.geometry.line.0.iter().map(|c| c.x).collect()
    }

    #[test]
    fn test_route_runs_from_first_waypoint() {
        let store = line_store();
        let config = PlannerConfig::default();

        let forward = find_route(&store, &[seg("a"), seg("d")], &config).unwrap();
        assert_eq!(forward.path.to_string(), "a;b;c;d");
        assert_eq!(lons(&forward), vec![10.00, 10.01, 10.02, 10.03, 10.04]);
        assert!(!forward.geometry.ambiguous_start);

        let backward = find_route(&store, &[seg("d"), seg("a")], &config).unwrap();
        assert_eq!(lons(&backward), vec![10.04, 10.03, 10.02, 10.01, 10.00]);
    }

    #[test]
    fn test_route_doubles_back_at_via() {
        let store = line_store();
        let route = find_route(&store, &[seg("a"), seg("c"), seg("a")], &PlannerConfig::default()).unwrap();

        assert_eq!(route.path.to_string(), "a;b;c;b;a");
        assert_eq!(
            lons(&route),
            vec![10.00, 10.01, 10.02, 10.03, 10.02, 10.01, 10.00]
        );
    }

    #[test]
    fn test_route_through_station_on_current_segment() {
        let store = line_store();
        let waypoints = vec![
            seg("a"),
            Waypoint::Station(StationIdentifier::new("junction")),
            seg("d"),
        ];

        let route = find_route(&store, &waypoints, &PlannerConfig::default()).unwrap();
        assert_eq!(route.report.legs.len(), 2);
        assert_eq!(lons(&route), vec![10.00, 10.01, 10.02, 10.03, 10.04]);
    }

    #[test]
    fn test_path_geometry_follows_path_order() {
        let store = line_store();
        let path = Path::from_segments(vec![
            SegmentIdentifier::new("c"),
            SegmentIdentifier::new("b"),
            SegmentIdentifier::new("a"),
        ])
        .unwrap();

        let geometry = path_geometry(&store, &path).unwrap();
        let lons: Vec<f64> = geometry.line.0.iter().map(|c| c.x).collect();
        assert_eq!(lons, vec![10.03, 10.02, 10.01, 10.00]);
    }

    #[test]
    fn test_route_planner_failure() {
        let store = line_store();
        let far = Waypoint::Point(Point::new(12.0, 61.0));
        assert!(matches!(
            find_route(&store, &[seg("a"), far], &PlannerConfig::default()),
            Err(RouteError::Planner(PlannerError::NoCandidates { waypoint_index: 1, .. }))
        ));
    }

    #[test]
    fn test_route_legs_that_do_not_meet_are_a_broken_chain() {
        // x and y are ~290 m apart. The first leg only reaches the station
        // at 500 m (ending on x); the second starts from y at 100 m.
        let store = StaticSegmentStore::from_data(
            vec![
                segment("a", vec![(10.00, 59.0), (10.01, 59.0)]),
                segment("x", vec![(10.01, 59.0), (10.02, 59.0)]),
                segment("y", vec![(10.025, 59.0), (10.03, 59.0)]),
                segment("d", vec![(10.03, 59.0), (10.04, 59.0)]),
            ],
            vec![Station {
                id: StationIdentifier::new("halt"),
                name: "Halt".into(),
                location: Point::new(10.025, 59.0),
            }],
        );
        let waypoints = vec![seg("a"), Waypoint::Station(StationIdentifier::new("halt")), seg("d")];

        match find_route(&store, &waypoints, &PlannerConfig::default()) {
            Err(RouteError::Merge(MergeError::BrokenChain { last, at, remaining })) => {
                assert_eq!(last, "x");
                assert_eq!(at, Coord { x: 10.02, y: 59.0 });
                assert_eq!(remaining, vec!["y".to_string(), "d".to_string()]);
            }
            other => panic!("expected BrokenChain, got {:?}", other),
        }
    }

    #[test]
    fn test_route_gap_within_endpoint_radius_cannot_merge() {
        // ~1 m apart: linked by a 5 m endpoint radius, but not the same vertex
        let store = StaticSegmentStore::from_data(
            vec![
                segment("g1", vec![(11.00, 59.0), (11.01, 59.0)]),
                segment("g2", vec![(11.01, 59.00001), (11.02, 59.0)]),
            ],
            vec![],
        );

        let err = find_route(&store, &[seg("g1"), seg("g2")], &PlannerConfig::default()).unwrap_err();
        assert!(matches!(err, RouteError::Merge(MergeError::BrokenChain { .. })));
    }
}

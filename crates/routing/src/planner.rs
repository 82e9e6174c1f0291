//! Multi-waypoint route planning.
//!
//! A request `[from, via..., to]` is planned one leg (consecutive waypoint
//! pair) at a time. Each leg gets its own graph, built only from the segments
//! in a corridor around its two waypoints. A leg that finds nothing is retried
//! with the next, larger tolerance of the schedule; the first tolerance that
//! yields a path wins.

use geo::{Coord, Point, Rect};

use crate::identifiers::SegmentIdentifier;
use crate::models::traits::SegmentStore;
use crate::models::types::{InvalidInput, Path, PlannerError, Result, StoreError, Waypoint};
use crate::search::shortest_path;
use crate::spatial::queries::{meters_to_degrees_approx, search_radius_degrees};
use crate::topology::{EqualityMode, TopologyGraph};

/// Candidate search radii tried in order, in meters
pub const DEFAULT_TOLERANCE_SCHEDULE: [f64; 3] = [100.0, 500.0, 2_000.0];

/// Endpoint matching radius for leg graphs, in meters
pub const DEFAULT_ENDPOINT_RADIUS_M: f64 = 5.0;

/// Extra room around a leg's waypoints when loading its segments, in meters
pub const DEFAULT_CORRIDOR_MARGIN_M: f64 = 1_000.0;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlannerConfig {
    /// Increasing candidate radii (meters); escalation stops at the first success
    pub tolerance_schedule: Vec<f64>,
    /// Endpoint equality for the per-leg graphs
    pub equality: EqualityMode,
    /// Corridor padding (meters), added to the current tolerance
    pub corridor_margin_m: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            tolerance_schedule: DEFAULT_TOLERANCE_SCHEDULE.to_vec(),
            equality: EqualityMode::Tolerant {
                radius_m: DEFAULT_ENDPOINT_RADIUS_M,
            },
            corridor_margin_m: DEFAULT_CORRIDOR_MARGIN_M,
        }
    }
}

impl PlannerConfig {
    pub fn with_schedule(schedule: &[f64]) -> Self {
        Self {
            tolerance_schedule: schedule.to_vec(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let schedule = &self.tolerance_schedule;
        if schedule.is_empty() {
            return Err(InvalidInput::ToleranceSchedule("schedule is empty".into()));
        }
        if let Some(bad) = schedule.iter().find(|t| !t.is_finite() || **t <= 0.0) {
            return Err(InvalidInput::ToleranceSchedule(format!(
                "{} is not a positive distance",
                bad
            )));
        }
        if schedule.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(InvalidInput::ToleranceSchedule(format!(
                "{:?} is not strictly increasing",
                schedule
            )));
        }
        if !self.corridor_margin_m.is_finite() || self.corridor_margin_m < 0.0 {
            return Err(InvalidInput::Setting {
                name: "corridor_margin_m",
                value: self.corridor_margin_m,
            });
        }
        if let EqualityMode::Tolerant { radius_m } = self.equality {
            if !radius_m.is_finite() || radius_m <= 0.0 {
                return Err(InvalidInput::Setting {
                    name: "radius_m",
                    value: radius_m,
                });
            }
        }
        Ok(())
    }

    fn max_tolerance(&self) -> f64 {
        self.tolerance_schedule.last().copied().unwrap_or(0.0)
    }
}

/// Outcome of one resolved leg
#[derive(Clone, Debug, PartialEq)]
pub struct LegResult {
    pub leg_index: usize,
    pub from: Waypoint,
    pub to: Waypoint,
    pub path: Path,
    /// Schedule entry that produced the path
    pub tolerance_m: f64,
    /// Segments in the leg graph
    pub graph_size: usize,
}

/// Legs resolved so far, in request order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanReport {
    pub legs: Vec<LegResult>,
}

impl PlanReport {
    /// All leg paths joined; a leg starting on the previous leg's last segment
    /// does not repeat it.
    pub fn combined_path(&self) -> Option<Path> {
        let (first, rest) = self.legs.split_first()?;
        let mut path = first.path.clone();
        for leg in rest {
            path.extend_path(&leg.path);
        }
        Some(path)
    }
}

/// Why a leg stopped; store errors abort the whole plan
enum LegError {
    NoCandidates(usize),
    NoPath,
    Store(PlannerError),
}

impl From<PlannerError> for LegError {
    fn from(err: PlannerError) -> Self {
        LegError::Store(err)
    }
}

/// Plans a path through an ordered list of waypoints.
pub struct MultiWaypointPlanner<'a, S: SegmentStore + ?Sized> {
    store: &'a S,
    config: PlannerConfig,
}

impl<'a, S: SegmentStore + ?Sized> MultiWaypointPlanner<'a, S> {
    pub fn new(store: &'a S, config: PlannerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// A single path spanning every waypoint
    pub fn plan(&self, waypoints: &[Waypoint]) -> std::result::Result<Path, PlannerError> {
        let report = self.plan_legs(waypoints)?;
        report
            .combined_path()
            .ok_or(PlannerError::InvalidInput(InvalidInput::EmptyPath))
    }

    /// Resolve each leg in turn; a failing leg reports the legs before it.
    pub fn plan_legs(&self, waypoints: &[Waypoint]) -> std::result::Result<PlanReport, PlannerError> {
        if waypoints.len() < 2 {
            return Err(InvalidInput::TooFewWaypoints(waypoints.len()).into());
        }
        self.config.validate()?;

        let extents = waypoints
            .iter()
            .enumerate()
            .map(|(idx, waypoint)| self.extent(idx, waypoint))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut report = PlanReport::default();

        for leg_index in 0..waypoints.len() - 1 {
            let previous_end = report.legs.last().map(|leg| leg.path.last().clone());
            let leg = self.plan_leg(
                leg_index,
                waypoints,
                (extents[leg_index], extents[leg_index + 1]),
                previous_end.as_ref(),
            );

            match leg {
                Ok(leg) => report.legs.push(leg),
                Err(LegError::Store(err)) => return Err(err),
                Err(LegError::NoCandidates(waypoint_index)) => {
                    return Err(PlannerError::NoCandidates {
                        waypoint_index,
                        waypoint: waypoints[waypoint_index].clone(),
                        max_tolerance_m: self.config.max_tolerance(),
                        partial: report,
                    });
                }
                Err(LegError::NoPath) => {
                    return Err(PlannerError::NoPathFound {
                        leg_index,
                        from: waypoints[leg_index].clone(),
                        to: waypoints[leg_index + 1].clone(),
                        max_tolerance_m: self.config.max_tolerance(),
                        partial: report,
                    });
                }
            }
        }

        Ok(report)
    }

    fn plan_leg(
        &self,
        leg_index: usize,
        waypoints: &[Waypoint],
        extents: (Rect<f64>, Rect<f64>),
        previous_end: Option<&SegmentIdentifier>,
    ) -> std::result::Result<LegResult, LegError> {
        let (from_idx, to_idx) = (leg_index, leg_index + 1);
        let mut failure = LegError::NoPath;

        for &tolerance in &self.config.tolerance_schedule {
            let mut start = self.candidates(from_idx, &waypoints[from_idx], tolerance)?;
            let end = self.candidates(to_idx, &waypoints[to_idx], tolerance)?;

            if start.is_empty() {
                log::debug!("Leg {}: no candidates near waypoint {} at {} m", leg_index, from_idx, tolerance);
                failure = LegError::NoCandidates(from_idx);
                continue;
            }
            if end.is_empty() {
                log::debug!("Leg {}: no candidates near waypoint {} at {} m", leg_index, to_idx, tolerance);
                failure = LegError::NoCandidates(to_idx);
                continue;
            }

            // Continue from where the previous leg stopped
            if let Some(previous) = previous_end {
                if start.contains(previous) {
                    start = vec![previous.clone()];
                }
            }

            let graph = self.leg_graph(from_idx, extents, tolerance, &start, &end)?;
            log::debug!(
                "Leg {}: {} m, {} start / {} end candidates, {} segments in corridor",
                leg_index,
                tolerance,
                start.len(),
                end.len(),
                graph.node_count()
            );

            if let Some(path) = shortest_path(&start, &end, &graph) {
                log::info!(
                    "Leg {} ({} -> {}): {} segments at {} m",
                    leg_index,
                    waypoints[from_idx],
                    waypoints[to_idx],
                    path.len(),
                    tolerance
                );
                return Ok(LegResult {
                    leg_index,
                    from: waypoints[from_idx].clone(),
                    to: waypoints[to_idx].clone(),
                    path,
                    tolerance_m: tolerance,
                    graph_size: graph.node_count(),
                });
            }
            failure = LegError::NoPath;
        }

        Err(failure)
    }

    /// Graph over the segments in the box around both waypoints, grown by
    /// the corridor margin plus the current tolerance
    fn leg_graph(
        &self,
        waypoint_index: usize,
        (from, to): (Rect<f64>, Rect<f64>),
        tolerance: f64,
        start: &[SegmentIdentifier],
        end: &[SegmentIdentifier],
    ) -> std::result::Result<TopologyGraph, LegError> {
        let (min, max) = grow(union(from, to), self.config.corridor_margin_m + tolerance);
        let store_err = |source: StoreError| LegError::Store(PlannerError::Store { waypoint_index, source });

        let mut ids = self.store.segments_in_envelope(min, max).map_err(store_err)?;
        for id in start.iter().chain(end) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        let segments = self.store.segments(&ids).map_err(store_err)?;
        Ok(TopologyGraph::build(&segments, self.config.equality))
    }

    fn candidates(
        &self,
        waypoint_index: usize,
        waypoint: &Waypoint,
        tolerance: f64,
    ) -> std::result::Result<Vec<SegmentIdentifier>, PlannerError> {
        let store_err = |source: StoreError| PlannerError::Store { waypoint_index, source };
        match waypoint {
            Waypoint::Segment(id) => Ok(vec![id.clone()]),
            Waypoint::Station(id) => {
                let station = self.store.station(id).map_err(store_err)?;
                self.store
                    .segments_near(station.location, tolerance)
                    .map_err(store_err)
            }
            Waypoint::Point(point) => self.store.segments_near(*point, tolerance).map_err(store_err),
        }
    }

    /// Box covering a waypoint; also checks that it exists in the store
    fn extent(&self, waypoint_index: usize, waypoint: &Waypoint) -> std::result::Result<Rect<f64>, PlannerError> {
        let store_err = |source: StoreError| PlannerError::Store { waypoint_index, source };
        match waypoint {
            Waypoint::Segment(id) => Ok(self.store.segment(id).map_err(store_err)?.bounding_rect()),
            Waypoint::Station(id) => {
                let station = self.store.station(id).map_err(store_err)?;
                Ok(point_rect(station.location))
            }
            Waypoint::Point(point) => Ok(point_rect(*point)),
        }
    }
}

fn point_rect(point: Point<f64>) -> Rect<f64> {
    Rect::new(point.0, point.0)
}

fn union(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

fn grow(rect: Rect<f64>, meters: f64) -> (Coord<f64>, Coord<f64>) {
    let center = rect.center();
    let dlat = meters_to_degrees_approx(meters);
    let dlon = search_radius_degrees(Point::from(center), meters);
    (
        Coord {
            x: rect.min().x - dlon,
            y: rect.min().y - dlat,
        },
        Coord {
            x: rect.max().x + dlon,
            y: rect.max().y + dlat,
        },
    )
}

/// Plan a path through `waypoints`, escalating through `tolerance_schedule`.
pub fn plan_path<S: SegmentStore + ?Sized>(
    store: &S,
    waypoints: &[Waypoint],
    tolerance_schedule: &[f64],
) -> std::result::Result<Path, PlannerError> {
    MultiWaypointPlanner::new(store, PlannerConfig::with_schedule(tolerance_schedule)).plan(waypoints)
}

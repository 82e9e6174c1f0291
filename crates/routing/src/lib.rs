//! # rail-routing
//!
//! Assembles rail routes out of track segments.
//!
//! ## Features
//!
//! - **Topology**: Segments sharing an endpoint become neighbors, compared
//!   exactly or within a radius
//! - **Path search**: Fewest-segment paths between candidate sets, plus
//!   bounded enumeration of every simple path
//! - **Multi-waypoint planning**: Station, segment, or coordinate waypoints
//!   with an escalating search tolerance per leg
//! - **Geometry**: Merge a path into one continuous line, or split a segment
//! - **Pluggable storage**: Implement [`SegmentStore`] over your own catalog
//!
//! ## Example
//!
//! ```
//! use rail_routing::prelude::*;
//! use geo::LineString;
//!
//! // Three pieces of track, digitized in mixed directions
//! let segments = vec![
//!     Segment::new("a", LineString::from(vec![(10.00, 59.0), (10.01, 59.0)])).unwrap(),
//!     Segment::new("b", LineString::from(vec![(10.02, 59.0), (10.01, 59.0)])).unwrap(),
//!     Segment::new("c", LineString::from(vec![(10.02, 59.0), (10.03, 59.0)])).unwrap(),
//! ];
//! let store = StaticSegmentStore::from_data(segments, vec![]);
//!
//! let waypoints = [Waypoint::Segment("a".into()), Waypoint::Segment("c".into())];
//! let route = find_route(&store, &waypoints, &PlannerConfig::default()).unwrap();
//!
//! assert_eq!(route.path.to_string(), "a;b;c");
//! assert_eq!(route.geometry.line.0.len(), 4);
//! ```

pub mod identifiers;
pub mod merge;
pub mod models;
pub mod planner;
pub mod provider;
pub mod route;
pub mod search;
pub mod spatial;
pub mod split;
pub mod topology;

// Re-exports for convenience
pub mod prelude {
    pub use crate::identifiers::*;
    pub use crate::merge::{merge_chain, merge_segments};
    pub use crate::models::{traits::*, types::*};
    pub use crate::planner::{plan_path, LegResult, MultiWaypointPlanner, PlanReport, PlannerConfig};
    pub use crate::provider::StaticSegmentStore;
    pub use crate::route::{find_route, path_geometry, Route};
    pub use crate::search::{all_paths, shortest_path, DEFAULT_MAX_DEPTH};
    pub use crate::split::{split_into_children, split_segment, SplitResult};
    pub use crate::topology::{EqualityMode, TopologyGraph};
}

pub use prelude::*;

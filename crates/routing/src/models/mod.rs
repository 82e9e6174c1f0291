//! Track routing data models, errors, and collaborator traits.

pub mod traits;
pub mod types;

// Re-exports for convenience
pub use traits::SegmentStore;
pub use types::{
    InvalidInput, MergeError, MergedGeometry, Path, PlannerError, Result, RouteError, Segment,
    SplitError, Station, StoreError, Waypoint,
};

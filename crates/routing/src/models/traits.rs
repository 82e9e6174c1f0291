//! Collaborator traits for segment and station data.
//!
//! Routing never owns the segment catalog. It asks a store for candidate ids
//! near a point and for the geometry of the ids it settles on. Implementations
//! can be in-memory, database-backed, or remote.

use geo::{Coord, Point};

use crate::identifiers::*;
use crate::models::types::{Segment, Station, StoreError};

/// Shorthand for store results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Provider of track segments and stations with proximity lookups.
///
/// Every call is self-contained: a connection or cursor used to answer it must
/// be released before the call returns, on success and on failure alike.
pub trait SegmentStore: Send + Sync {
    // ---- Lookups ----

    fn segment(&self, id: &SegmentIdentifier) -> StoreResult<Segment>;

    /// Batched geometry fetch, in the order of `ids`
    fn segments(&self, ids: &[SegmentIdentifier]) -> StoreResult<Vec<Segment>> {
        ids.iter().map(|id| self.segment(id)).collect()
    }

    fn station(&self, id: &StationIdentifier) -> StoreResult<Station>;

    // ---- Spatial queries ----

    /// Ids of segments passing within `tolerance_m` meters of `point`
    fn segments_near(&self, point: Point<f64>, tolerance_m: f64) -> StoreResult<Vec<SegmentIdentifier>>;

    /// Ids of segments with any part inside the lon/lat box `min`..`max`
    fn segments_in_envelope(&self, min: Coord<f64>, max: Coord<f64>) -> StoreResult<Vec<SegmentIdentifier>>;

    /// Stations within `radius_m` meters of `point`
    fn stations_near(&self, point: Point<f64>, radius_m: f64) -> StoreResult<Vec<Station>>;
}

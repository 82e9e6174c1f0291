//! Spatial indexing and query utilities.

pub mod index;
pub mod queries;

pub use queries::{
    haversine_distance, haversine_distance_to_line, meters_to_degrees_approx, project_onto_segment,
    search_radius_degrees, Projection,
};

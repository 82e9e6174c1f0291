//! Spatial query utilities for distance calculations.
//!
//! Proximity radii are meters and use the Haversine formula. Projection onto a
//! line piece is planar, in coordinate units.

use geo::{ClosestPoint, Coord, HaversineDistance, Line, LineString, Point};

/// Calculate Haversine distance between two points in meters
pub fn haversine_distance(p1: Point, p2: Point) -> f64 {
    p1.haversine_distance(&p2)
}

/// Calculate distance from point to line segment in meters
pub fn haversine_distance_to_line(point: Point, line: Line) -> f64 {
    // Convert line to LineString for ClosestPoint trait
    let line_string = LineString::from(vec![line.start, line.end]);

    match line_string.closest_point(&point) {
        geo::Closest::Intersection(p) | geo::Closest::SinglePoint(p) => {
            haversine_distance(point, p)
        }
        geo::Closest::Indeterminate => f64::INFINITY,
    }
}

/// Convert meters to degrees at equator (for bounding box queries)
pub fn meters_to_degrees_approx(meters: f64) -> f64 {
    meters / 111_320.0
}

/// Degree radius that covers `radius_m` meters around `point` in every direction.
///
/// A degree of longitude shrinks with latitude, so the equator conversion is
/// widened by `1 / cos(lat)`. Used as the R-tree prefilter before Haversine.
pub fn search_radius_degrees(point: Point, radius_m: f64) -> f64 {
    let cos_lat = point.y().to_radians().cos().abs().max(0.01);
    meters_to_degrees_approx(radius_m) / cos_lat
}

/// Perpendicular projection of a point onto a line piece.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    /// Closest point on the piece
    pub point: Coord<f64>,
    /// Position along the piece, clamped to [0, 1]
    pub t: f64,
    /// Planar distance from the query point to `point`
    pub distance: f64,
}

/// Project `point` onto the piece `a`..`b`
pub fn project_onto_segment(point: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> Projection {
    let ab = Coord {
        x: b.x - a.x,
        y: b.y - a.y,
    };
    let ap = Coord {
        x: point.x - a.x,
        y: point.y - a.y,
    };

    let ab_len_sq = ab.x * ab.x + ab.y * ab.y;
    if ab_len_sq < 1e-24 {
        // Degenerate piece
        return Projection {
            point: a,
            t: 0.0,
            distance: planar_distance(point, a),
        };
    }

    let t = ((ap.x * ab.x + ap.y * ab.y) / ab_len_sq).clamp(0.0, 1.0);
    let nearest = Coord {
        x: a.x + t * ab.x,
        y: a.y + t * ab.y,
    };

    Projection {
        point: nearest,
        t,
        distance: planar_distance(point, nearest),
    }
}

pub fn planar_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

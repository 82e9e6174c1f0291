use anyhow::{Context, Result};
use geo::LineString;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use rail_routing::{MergedGeometry, Path as SegmentPath};
use serde::Serialize;
use std::path::Path;

/// Properties attached to each route feature
#[derive(Debug, Serialize)]
struct RouteProperties<'a> {
    index: usize,
    segments: Vec<&'a str>,
    segment_count: usize,
    ambiguous_start: bool,
}

fn linestring_to_geojson(line: &LineString<f64>) -> Value {
    Value::LineString(line.0.iter().map(|c| vec![c.x, c.y]).collect())
}

fn route_to_feature(index: usize, path: &SegmentPath, geometry: &MergedGeometry) -> Result<Feature> {
    let properties = RouteProperties {
        index,
        segments: path.segments().iter().map(|id| id.as_str()).collect(),
        segment_count: path.len(),
        ambiguous_start: geometry.ambiguous_start,
    };
    let properties = match serde_json::to_value(properties).context("Failed to serialize route properties")? {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    };

    Ok(Feature {
        bbox: None,
        geometry: Some(Geometry::new(linestring_to_geojson(&geometry.line))),
        id: None,
        properties,
        foreign_members: None,
    })
}

/// Write merged routes to a GeoJSON file (each route as separate feature)
pub fn write_routes_geojson(routes: &[(SegmentPath, MergedGeometry)], output_path: &Path) -> Result<()> {
    log::info!("Writing {} route(s) to {}", routes.len(), output_path.display());

    let features = routes
        .iter()
        .enumerate()
        .map(|(i, (path, geometry))| route_to_feature(i, path, geometry))
        .collect::<Result<Vec<_>>>()?;

    let feature_collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let geojson = GeoJson::from(feature_collection);
    let json_string = serde_json::to_string_pretty(&geojson)
        .context("Failed to serialize GeoJSON")?;

    std::fs::write(output_path, json_string)
        .with_context(|| format!("Failed to write GeoJSON to {}", output_path.display()))?;

    Ok(())
}

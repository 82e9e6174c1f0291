use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, Point};
use geojson::{feature::Id, Feature, GeoJson, Value};
use rail_routing::{PlannerConfig, Segment, SegmentIdentifier, Station, StationIdentifier, Waypoint};
use std::path::Path;

fn read_geojson(path: &Path) -> Result<GeoJson> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    content
        .parse()
        .with_context(|| format!("Failed to parse GeoJSON from: {}", path.display()))
}

/// Features of a collection, or the single feature
fn into_features(geojson: GeoJson) -> Result<Vec<Feature>> {
    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc.features),
        GeoJson::Feature(feature) => Ok(vec![feature]),
        GeoJson::Geometry(_) => bail!("Expected features with ids, found a bare geometry"),
    }
}

/// `id` property if present, else the feature id
fn feature_id(feature: &Feature) -> Option<String> {
    match feature.property("id") {
        Some(serde_json::Value::String(s)) => return Some(s.clone()),
        Some(serde_json::Value::Number(n)) => return Some(n.to_string()),
        _ => {}
    }
    match &feature.id {
        Some(Id::String(s)) => Some(s.clone()),
        Some(Id::Number(n)) => Some(n.to_string()),
        None => None,
    }
}

fn coords_to_linestring(coords: &[Vec<f64>]) -> Result<LineString<f64>> {
    coords
        .iter()
        .map(|c| match c.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => bail!("Position needs at least two values, got {:?}", c),
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

/// Load track segments: LineString features, each with an id
pub fn read_segments(path: &Path) -> Result<Vec<Segment>> {
    let geojson = read_geojson(path)?;
    parse_segments(geojson).with_context(|| format!("Invalid segments in {}", path.display()))
}

pub fn parse_segments(geojson: GeoJson) -> Result<Vec<Segment>> {
    let features = into_features(geojson)?;
    let mut segments = Vec::with_capacity(features.len());
    let mut skipped = 0;

    for (index, feature) in features.into_iter().enumerate() {
        let Some(raw_id) = feature_id(&feature) else {
            bail!("Feature #{} has no id", index);
        };
        let id = SegmentIdentifier::parse(&raw_id)?;

        let line = match feature.geometry.map(|g| g.value) {
            Some(Value::LineString(coords)) => coords_to_linestring(&coords)?,
            // Single-part multilines are common in exports
            Some(Value::MultiLineString(mut lines)) if lines.len() == 1 => {
                coords_to_linestring(&lines.remove(0))?
            }
            _ => {
                log::warn!("Skipping segment {}: not a LineString", id);
                skipped += 1;
                continue;
            }
        };
        segments.push(Segment::new(id, line)?);
    }

    log::info!("Loaded {} segments ({} skipped)", segments.len(), skipped);
    Ok(segments)
}

/// Load stations: Point features with `id` and `name`
pub fn read_stations(path: &Path) -> Result<Vec<Station>> {
    let geojson = read_geojson(path)?;
    parse_stations(geojson).with_context(|| format!("Invalid stations in {}", path.display()))
}

pub fn parse_stations(geojson: GeoJson) -> Result<Vec<Station>> {
    let features = into_features(geojson)?;
    let mut stations = Vec::with_capacity(features.len());

    for (index, feature) in features.into_iter().enumerate() {
        let Some(raw_id) = feature_id(&feature) else {
            bail!("Feature #{} has no id", index);
        };
        let id = StationIdentifier::parse(&raw_id)?;
        let name = match feature.property("name") {
            Some(serde_json::Value::String(name)) => name.clone(),
            _ => raw_id.clone(),
        };

        let location = match feature.geometry.map(|g| g.value) {
            Some(Value::Point(position)) => match position.as_slice() {
                [x, y, ..] => Point::new(*x, *y),
                _ => bail!("Station {} has a malformed position", id),
            },
            _ => {
                log::warn!("Skipping station {}: not a Point", id);
                continue;
            }
        };

        stations.push(Station { id, name, location });
    }

    log::info!("Loaded {} stations", stations.len());
    Ok(stations)
}

/// Planner settings from a JSON file
pub fn read_planner_config(path: &Path) -> Result<PlannerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: PlannerConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse planner config from: {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Waypoint from a command-line token.
///
/// `station:<id>` names a station, `lon,lat` a position, anything else a segment.
pub fn parse_waypoint(token: &str) -> Result<Waypoint> {
    if let Some(station) = token.strip_prefix("station:") {
        return Ok(Waypoint::Station(StationIdentifier::parse(station)?));
    }

    if let Some((lon, lat)) = token.split_once(',') {
        let lon: f64 = lon.trim().parse().with_context(|| format!("Bad longitude in {:?}", token))?;
        let lat: f64 = lat.trim().parse().with_context(|| format!("Bad latitude in {:?}", token))?;
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            bail!("Coordinate out of range: {:?}", token);
        }
        return Ok(Waypoint::Point(Point::new(lon, lat)));
    }

    Ok(Waypoint::Segment(SegmentIdentifier::parse(token)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geojson(text: &str) -> GeoJson {
        text.parse().unwrap()
    }

    #[test]
    fn test_parse_segments() {
        let segments = parse_segments(geojson(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "properties": {"id": "s1"},
                     "geometry": {"type": "LineString", "coordinates": [[10.0, 59.0], [10.1, 59.0]]}},
                    {"type": "Feature", "id": 42, "properties": {},
                     "geometry": {"type": "MultiLineString", "coordinates": [[[10.1, 59.0], [10.2, 59.0]]]}},
                    {"type": "Feature", "properties": {"id": "depot"},
                     "geometry": {"type": "Point", "coordinates": [10.0, 59.0]}}
                ]
            }"#,
        ))
        .unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].id.as_str(), "s1");
        assert_eq!(segments[1].id.as_str(), "42");
        assert_eq!(segments[1].end(), Coord { x: 10.2, y: 59.0 });
    }

    #[test]
    fn test_parse_segments_rejects_bad_records() {
        let missing_id = geojson(
            r#"{"type": "Feature", "properties": {},
                "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 0.0]]}}"#,
        );
        assert!(parse_segments(missing_id).is_err());

        let one_point = geojson(
            r#"{"type": "Feature", "properties": {"id": "s1"},
                "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0]]}}"#,
        );
        assert!(parse_segments(one_point).is_err());
    }

    #[test]
    fn test_parse_stations() {
        let stations = parse_stations(geojson(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "properties": {"id": "osl", "name": "Oslo S"},
                     "geometry": {"type": "Point", "coordinates": [10.75, 59.91]}},
                    {"type": "Feature", "properties": {"id": "lil"},
                     "geometry": {"type": "Point", "coordinates": [10.46, 61.11]}}
                ]
            }"#,
        ))
        .unwrap();

        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].name, "Oslo S");
        assert_eq!(stations[1].name, "lil");
        assert_eq!(stations[1].location, Point::new(10.46, 61.11));
    }

    #[test]
    fn test_parse_waypoint() {
        assert_eq!(
            parse_waypoint("seg_12").unwrap(),
            Waypoint::Segment(SegmentIdentifier::new("seg_12"))
        );
        assert_eq!(
            parse_waypoint("station:osl").unwrap(),
            Waypoint::Station(StationIdentifier::new("osl"))
        );
        assert_eq!(
            parse_waypoint("-73.99,40.75").unwrap(),
            Waypoint::Point(Point::new(-73.99, 40.75))
        );
    }

    #[test]
    fn test_parse_waypoint_malformed() {
        assert!(parse_waypoint("").is_err());
        assert!(parse_waypoint("a b").is_err());
        assert!(parse_waypoint("a;b").is_err());
        assert!(parse_waypoint("station:").is_err());
        assert!(parse_waypoint("10.0,north").is_err());
        assert!(parse_waypoint("200.0,10.0").is_err());
    }
}

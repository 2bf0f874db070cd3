//! Overpass QL for signal-controlled intersections.

use std::collections::BTreeSet;

use foundation::{CoordKey, GeoPoint, SearchArea};
use serde::Deserialize;

use crate::error::ParseError;

/// Query for every `highway=traffic_signals` node, way and relation within
/// the area. `out center` gives ways and relations a representative point.
pub fn traffic_signals_query(area: &SearchArea) -> String {
    let c = area.center();
    let around = format!("around:{},{},{}", area.radius_meters(), c.latitude, c.longitude);
    format!(
        "[out:json][timeout:25];\n(\n  node[\"highway\"=\"traffic_signals\"]({around});\n  way[\"highway\"=\"traffic_signals\"]({around});\n  relation[\"highway\"=\"traffic_signals\"]({around});\n);\nout center;"
    )
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Option<Vec<Element>>,
}

#[derive(Debug, Deserialize)]
struct Element {
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<Center>,
}

#[derive(Debug, Deserialize)]
struct Center {
    lat: f64,
    lon: f64,
}

impl Element {
    fn point(&self) -> Option<GeoPoint> {
        match (self.lat, self.lon, &self.center) {
            (Some(lat), Some(lon), _) => Some(GeoPoint::new(lat, lon)),
            (_, _, Some(c)) => Some(GeoPoint::new(c.lat, c.lon)),
            _ => None,
        }
    }
}

/// Counts distinct physical signal locations in an Overpass JSON reply.
///
/// Elements collapse when their coordinates agree to six decimal places;
/// elements carrying no position are ignored.
pub fn count_distinct_signals(body: &str) -> Result<u32, ParseError> {
    let reply: OverpassResponse = serde_json::from_str(body)?;
    let elements = reply.elements.ok_or(ParseError::MissingField("elements"))?;
    let keys: BTreeSet<CoordKey> = elements
        .iter()
        .filter_map(Element::point)
        .map(|p| p.coord_key())
        .collect();
    Ok(keys.len() as u32)
}

#[cfg(test)]
mod tests {
    use foundation::{GeoPoint, SearchArea};

    use super::{count_distinct_signals, traffic_signals_query};
    use crate::error::ParseError;

    #[test]
    fn node_way_and_relation_at_one_spot_count_once() {
        let body = r#"{"elements":[
            {"type":"node","id":1,"lat":33.7537461,"lon":-84.3863304},
            {"type":"way","id":2,"center":{"lat":33.753746,"lon":-84.38633}},
            {"type":"relation","id":3,"center":{"lat":33.7537459,"lon":-84.3863298}}
        ]}"#;
        assert_eq!(count_distinct_signals(body).unwrap(), 1);
    }

    #[test]
    fn six_elements_with_one_shared_coordinate_count_five() {
        let body = r#"{"elements":[
            {"type":"node","lat":33.750001,"lon":-84.380001},
            {"type":"node","lat":33.750002,"lon":-84.380002},
            {"type":"node","lat":33.750003,"lon":-84.380003},
            {"type":"node","lat":33.750004,"lon":-84.380004},
            {"type":"node","lat":33.750005,"lon":-84.380005},
            {"type":"way","center":{"lat":33.750005,"lon":-84.380005}}
        ]}"#;
        assert_eq!(count_distinct_signals(body).unwrap(), 5);
    }

    #[test]
    fn elements_without_position_are_skipped() {
        let body = r#"{"elements":[{"type":"way","id":9},{"type":"node","lat":1.0,"lon":2.0}]}"#;
        assert_eq!(count_distinct_signals(body).unwrap(), 1);
        assert_eq!(count_distinct_signals(r#"{"elements":[]}"#).unwrap(), 0);
    }

    #[test]
    fn rejects_reply_without_elements() {
        assert!(matches!(
            count_distinct_signals(r#"{"remark":"runtime error"}"#),
            Err(ParseError::MissingField("elements"))
        ));
        assert!(matches!(
            count_distinct_signals("<html>"),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn query_targets_area() {
        let q = traffic_signals_query(&SearchArea::new(GeoPoint::new(33.5, -84.25), 800));
        assert!(q.contains("node[\"highway\"=\"traffic_signals\"](around:800,33.5,-84.25);"));
        assert!(q.contains("relation["));
        assert!(q.ends_with("out center;"));
    }
}

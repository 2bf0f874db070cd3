use foundation::SearchArea;
use serde_json::{Value, json};

/// Edge count used when sending a search circle as a polygon.
pub const POLYGON_EDGES: usize = 64;

/// The search circle as a GeoJSON `Feature` with a closed `Polygon` ring.
///
/// Positions are `[longitude, latitude]` as GeoJSON requires.
pub fn circle_feature(area: &SearchArea) -> Value {
    let ring: Vec<[f64; 2]> = area
        .polygon(POLYGON_EDGES)
        .into_iter()
        .map(|p| [p.longitude, p.latitude])
        .collect();
    json!({
        "type": "Feature",
        "properties": {},
        "geometry": {
            "type": "Polygon",
            "coordinates": [ring],
        },
    })
}

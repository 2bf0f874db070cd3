use serde::{Deserialize, Serialize};

use crate::math::destination;

/// Smallest accepted search radius (meters).
pub const MIN_RADIUS_M: u32 = 100;
/// Largest accepted search radius (meters).
pub const MAX_RADIUS_M: u32 = 10_000;
pub const DEFAULT_RADIUS_M: u32 = 800;

/// Query center in WGS84 degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Downtown Atlanta, the initial map center.
    pub fn default_center() -> Self {
        Self::new(33.753746, -84.386330)
    }

    pub fn coord_key(&self) -> CoordKey {
        CoordKey::new(self.latitude, self.longitude)
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self::default_center()
    }
}

/// Location identity at six decimal places (about 0.1 m).
///
/// OSM can describe one physical object as a node, a way and a relation; all
/// three collapse onto the same key once rounded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey {
    lat_micro: i64,
    lon_micro: i64,
}

impl CoordKey {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            lat_micro: (latitude * 1e6).round() as i64,
            lon_micro: (longitude * 1e6).round() as i64,
        }
    }
}

/// Circular query area. The radius is always within
/// [`MIN_RADIUS_M`]..=[`MAX_RADIUS_M`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct SearchArea {
    center: GeoPoint,
    radius_meters: u32,
}

impl SearchArea {
    /// Builds an area, clamping the radius into the accepted range.
    pub fn new(center: GeoPoint, radius_meters: u32) -> Self {
        Self {
            center,
            radius_meters: clamp_radius(radius_meters),
        }
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn radius_meters(&self) -> u32 {
        self.radius_meters
    }

    pub fn with_center(self, center: GeoPoint) -> Self {
        Self { center, ..self }
    }

    pub fn with_radius(self, radius_meters: u32) -> Self {
        Self::new(self.center, radius_meters)
    }

    /// Closed ring approximating the circle with `edges` segments.
    ///
    /// The first vertex is repeated at the end, so the ring holds
    /// `edges + 1` points. Fewer than three edges is treated as three.
    pub fn polygon(&self, edges: usize) -> Vec<GeoPoint> {
        let edges = edges.max(3);
        let radius = f64::from(self.radius_meters);
        let mut ring: Vec<GeoPoint> = (0..edges)
            .map(|i| {
                let bearing = std::f64::consts::TAU * i as f64 / edges as f64;
                let (lat, lon) =
                    destination(self.center.latitude, self.center.longitude, bearing, radius);
                GeoPoint::new(lat, lon)
            })
            .collect();
        ring.push(ring[0]);
        ring
    }
}

impl Default for SearchArea {
    fn default() -> Self {
        Self::new(GeoPoint::default_center(), DEFAULT_RADIUS_M)
    }
}

pub fn clamp_radius(radius_meters: u32) -> u32 {
    radius_meters.clamp(MIN_RADIUS_M, MAX_RADIUS_M)
}

#[cfg(test)]
mod tests {
    use super::{CoordKey, GeoPoint, MAX_RADIUS_M, MIN_RADIUS_M, SearchArea};
    use crate::math::haversine_m;

    #[test]
    fn radius_is_clamped_into_range() {
        let c = GeoPoint::default_center();
        assert_eq!(SearchArea::new(c, 5).radius_meters(), MIN_RADIUS_M);
        assert_eq!(SearchArea::new(c, 50_000).radius_meters(), MAX_RADIUS_M);
        assert_eq!(SearchArea::new(c, 800).radius_meters(), 800);
        assert_eq!(
            SearchArea::new(c, 800).with_radius(0).radius_meters(),
            MIN_RADIUS_M
        );
    }

    #[test]
    fn polygon_is_closed_and_on_the_circle() {
        let area = SearchArea::default();
        let ring = area.polygon(64);
        assert_eq!(ring.len(), 65);
        assert_eq!(ring.first(), ring.last());

        let c = area.center();
        for p in &ring {
            let d = haversine_m(c.latitude, c.longitude, p.latitude, p.longitude);
            assert!((d - 800.0).abs() < 1e-4, "vertex off circle: {d}");
        }
    }

    #[test]
    fn polygon_never_degenerates() {
        let ring = SearchArea::default().polygon(1);
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn coord_key_rounds_to_six_decimals() {
        assert_eq!(
            CoordKey::new(33.7537461, -84.3863304),
            CoordKey::new(33.7537459, -84.3863296)
        );
        assert_ne!(
            CoordKey::new(33.753746, -84.386330),
            CoordKey::new(33.753747, -84.386330)
        );
    }

    #[test]
    fn geo_point_serializes_with_full_field_names() {
        let json = serde_json::to_value(GeoPoint::new(1.5, -2.5)).unwrap();
        assert_eq!(json, serde_json::json!({ "latitude": 1.5, "longitude": -2.5 }));
    }
}

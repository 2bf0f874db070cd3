/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 semi-minor axis (meters).
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
/// IUGG mean Earth radius `(2a + b) / 3` (meters).
///
/// Search areas are at most a few kilometres across, so a spherical model is
/// well inside the accuracy of any population or POI dataset.
pub const MEAN_EARTH_RADIUS_M: f64 = (2.0 * WGS84_A + WGS84_B) / 3.0;

/// Point reached by travelling `distance_m` from `(lat_deg, lon_deg)` along
/// the great circle with initial bearing `bearing_rad` (clockwise from north).
///
/// Returns `(lat_deg, lon_deg)` with longitude normalised to `[-180, 180)`.
pub fn destination(lat_deg: f64, lon_deg: f64, bearing_rad: f64, distance_m: f64) -> (f64, f64) {
    let delta = distance_m / MEAN_EARTH_RADIUS_M;
    let lat1 = lat_deg.to_radians();
    let lon1 = lon_deg.to_radians();

    let sin_lat2 = lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();
    let lon2 = lon1
        + (bearing_rad.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * sin_lat2);

    (lat2.to_degrees(), normalize_lon_deg(lon2.to_degrees()))
}

/// Great-circle distance in meters (haversine).
pub fn haversine_m(lat1_deg: f64, lon1_deg: f64, lat2_deg: f64, lon2_deg: f64) -> f64 {
    let lat1 = lat1_deg.to_radians();
    let lat2 = lat2_deg.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (lon2_deg - lon1_deg).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * MEAN_EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub fn normalize_lon_deg(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

use crate::models::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Fraction of the remaining distance covered by one courier tick.
pub const STEP_FRACTION: f64 = 0.1;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Linear step toward `target`: `current + (target - current) * STEP_FRACTION`.
pub fn step_toward(current: &GeoPoint, target: &GeoPoint) -> GeoPoint {
    GeoPoint {
        lat: current.lat + (target.lat - current.lat) * STEP_FRACTION,
        lng: current.lng + (target.lng - current.lng) * STEP_FRACTION,
    }
}

//! Spherical-Earth helpers shared by the cost model, the lattice and the statistics.

use crate::engine::models::GeoPoint;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const KM_PER_NM: f64 = 1.852;

/// Great-circle distance between two points in kilometres (haversine).
pub fn distance_km(start: &GeoPoint, end: &GeoPoint) -> f64 {
    let start_lat = start.lat.to_radians();
    let end_lat = end.lat.to_radians();
    let d_lat = (end.lat - start.lat).to_radians();
    let d_lon = (end.lon - start.lon).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) +
            start_lat.cos() * end_lat.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Great-circle distance in nautical miles.
pub fn distance_nm(start: &GeoPoint, end: &GeoPoint) -> f64 {
    distance_km(start, end) / KM_PER_NM
}

/// Initial true bearing from `start` to `end`, normalized to [0, 360).
pub fn initial_bearing(start: &GeoPoint, end: &GeoPoint) -> f64 {
    let start_lat = start.lat.to_radians();
    let end_lat = end.lat.to_radians();
    let d_lon = (end.lon - start.lon).to_radians();

    let y = d_lon.sin() * end_lat.cos();
    let x = start_lat.cos() * end_lat.sin() - start_lat.sin() * end_lat.cos() * d_lon.cos();
    normalize_degrees(y.atan2(x).to_degrees())
}

/// Point reached from `start` after `distance_nm` along the initial bearing `bearing_deg`.
pub fn destination_point(start: &GeoPoint, distance_nm: f64, bearing_deg: f64) -> GeoPoint {
    let angular_dist = distance_nm * KM_PER_NM / EARTH_RADIUS_KM;
    let bearing_rad = bearing_deg.to_radians();

    let start_lat = start.lat.to_radians();
    let start_lon = start.lon.to_radians();

    let end_lat = (start_lat.sin() * angular_dist.cos() +
                   start_lat.cos() * angular_dist.sin() * bearing_rad.cos()).asin();

    let end_lon = start_lon + (bearing_rad.sin() * angular_dist.sin() * start_lat.cos())
        .atan2(angular_dist.cos() - start_lat.sin() * end_lat.sin());

    GeoPoint {
        lat: end_lat.to_degrees(),
        lon: end_lon.to_degrees(),
    }
}

/// Wraps any angle into [0, 360).
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Smallest absolute difference between two directions, in [0, 180].
pub fn angle_between(a: f64, b: f64) -> f64 {
    let diff = normalize_degrees(a - b);
    if diff > 180.0 { 360.0 - diff } else { diff }
}

/// Linear interpolation in lat/lon space, `fraction` in [0, 1].
pub fn interpolate(start: &GeoPoint, end: &GeoPoint, fraction: f64) -> GeoPoint {
    GeoPoint {
        lat: start.lat + (end.lat - start.lat) * fraction,
        lon: start.lon + (end.lon - start.lon) * fraction,
    }
}

/// `start`, `intermediate` evenly spaced points, then `end`.
pub fn straight_line(start: &GeoPoint, end: &GeoPoint, intermediate: usize) -> Vec<GeoPoint> {
    let segments = intermediate + 1;
    (0..=segments)
        .map(|i| match i {
            0 => *start,
            i if i == segments => *end,
            i => interpolate(start, end, i as f64 / segments as f64),
        })
        .collect()
}

/// Sum of the great-circle legs of a polyline, in nautical miles.
pub fn path_length_nm(points: &[GeoPoint]) -> f64 {
    points.windows(2).map(|w| distance_nm(&w[0], &w[1])).sum()
}

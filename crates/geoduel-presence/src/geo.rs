//! Great-circle distance.

use geoduel_protocol::Location;

/// Mean Earth radius used by [`distance_m`], in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two `(latitude, longitude)`
/// pairs given in degrees.
///
/// Inputs are not range-checked. Identical inputs yield exactly `0.0`.
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` a hair outside [0, 1] for antipodal points.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// [`distance_m`] between two reported locations.
pub fn haversine_m(a: &Location, b: &Location) -> f64 {
    distance_m(a.latitude, a.longitude, b.latitude, b.longitude)
}

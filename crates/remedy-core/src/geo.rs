//! Great-circle distance between two coordinate pairs.

use crate::address::Coordinates;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers. Pure and total: identical points yield
/// exactly 0, antipodal points stay numerically stable (the `sqrt` operand is
/// clamped into `[0, 1]`).
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
  let lat_a = a.latitude.to_radians();
  let lat_b = b.latitude.to_radians();
  let d_lat = (b.latitude - a.latitude).to_radians();
  let d_lon = (b.longitude - a.longitude).to_radians();

  let h = (d_lat / 2.0).sin().powi(2)
    + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
  let h = h.clamp(0.0, 1.0);

  2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

//! Postal addresses and resolved coordinates.
//!
//! An address is owned by exactly one offer, demand or resource record; it is
//! never shared. Coordinates are absent until the geocoder has resolved them.

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub latitude:  f64,
  pub longitude: f64,
}

/// A postal address, optionally geolocated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
  #[serde(default)]
  pub street:      String,
  #[serde(default)]
  pub city:        String,
  #[serde(default)]
  pub postalcode:  String,
  #[serde(default)]
  pub country:     String,
  /// Set by the geocoder; `None` until resolution succeeded.
  #[serde(default)]
  pub coordinates: Option<Coordinates>,
}

impl Address {
  pub fn has_coordinates(&self) -> bool { self.coordinates.is_some() }

  /// A query address only triggers the location filter when both country and
  /// postal code are given.
  pub fn is_locatable(&self) -> bool {
    !self.country.is_empty() && !self.postalcode.is_empty()
  }
}

//! Standing regional subscriptions, consumed by the notifier batch job.

use serde::{Deserialize, Serialize};

use crate::address::Coordinates;

/// Input to subscription intake. The postal code is geocoded at subscribe
/// time so the batch job never has to call out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRegionSubscription {
  pub name:       String,
  pub email:      String,
  pub postalcode: String,
  #[serde(default)]
  pub country:    String,
}

/// A persisted, geocoded subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSubscription {
  pub id:          i64,
  pub name:        String,
  pub email:       String,
  pub postalcode:  String,
  pub coordinates: Coordinates,
  pub active:      bool,
}

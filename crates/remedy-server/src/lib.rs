//! Remedy server library: configuration plus the outward-facing
//! collaborators (HTTP geocoder, mail delivery).

pub mod geocode;
pub mod mail;

use std::path::PathBuf;

use serde::Deserialize;

/// Runtime server configuration, deserialised from `config.toml` with
/// `REMEDY_*` environment overrides.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,

  /// Base URL of a Nominatim-compatible geocoding service.
  pub geocoder_url: String,
  #[serde(default = "default_geocoder_timeout_secs")]
  pub geocoder_timeout_secs: u64,

  // Notifier tunables. The legacy deployment hard-coded 50 km / 24 h and a
  // daily batch.
  #[serde(default = "default_notify_interval_secs")]
  pub notify_interval_secs: u64,
  #[serde(default = "default_notify_max_distance_km")]
  pub notify_max_distance_km: f64,
  #[serde(default = "default_notify_window_hours")]
  pub notify_window_hours: i64,
}

fn default_geocoder_timeout_secs() -> u64 { 10 }
fn default_notify_interval_secs() -> u64 { 86_400 }
fn default_notify_max_distance_km() -> f64 { 50.0 }
fn default_notify_window_hours() -> i64 { 24 }

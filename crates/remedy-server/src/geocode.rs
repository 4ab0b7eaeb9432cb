//! HTTP geocoder backed by a Nominatim-compatible `/search` endpoint.

use std::{future::Future, time::Duration};

use remedy_core::{
  address::{Address, Coordinates},
  geocode::{AddressResolutionError, Geocoder},
};
use serde::Deserialize;
use tracing::debug;

/// Geocodes through a Nominatim-compatible HTTP service.
///
/// The client carries a bounded timeout so a slow backend surfaces as an
/// [`AddressResolutionError`] instead of stalling catalog operations.
#[derive(Clone)]
pub struct HttpGeocoder {
  client:   reqwest::Client,
  base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
  lat: String,
  lon: String,
}

impl HttpGeocoder {
  pub fn new(base_url: String, timeout_secs: u64) -> reqwest::Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .user_agent(concat!("remedy/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client, base_url })
  }
}

impl Geocoder for HttpGeocoder {
  fn resolve<'a>(
    &'a self,
    address: &'a Address,
  ) -> impl Future<Output = Result<Coordinates, AddressResolutionError>> + Send + 'a
  {
    async move {
      let fail = |stage: &str, e: &dyn std::fmt::Display| {
        AddressResolutionError(format!("geocoder {stage}: {e}"))
      };

      let hits: Vec<SearchHit> = self
        .client
        .get(format!("{}/search", self.base_url))
        .query(&[
          ("street", address.street.as_str()),
          ("city", address.city.as_str()),
          ("postalcode", address.postalcode.as_str()),
          ("country", address.country.as_str()),
          ("format", "jsonv2"),
          ("limit", "1"),
        ])
        .send()
        .await
        .map_err(|e| fail("request failed", &e))?
        .error_for_status()
        .map_err(|e| fail("returned an error status", &e))?
        .json()
        .await
        .map_err(|e| fail("sent an unparsable body", &e))?;

      let hit = hits.into_iter().next().ok_or_else(|| {
        AddressResolutionError(format!(
          "no match for postal code {:?} in {:?}",
          address.postalcode, address.country
        ))
      })?;

      let latitude: f64 = hit
        .lat
        .parse()
        .map_err(|e| fail("returned a malformed latitude", &e))?;
      let longitude: f64 = hit
        .lon
        .parse()
        .map_err(|e| fail("returned a malformed longitude", &e))?;

      debug!(
        postalcode = %address.postalcode,
        latitude,
        longitude,
        "address resolved"
      );
      Ok(Coordinates { latitude, longitude })
    }
  }
}

//! Query and match-result types, plus the location filter.
//!
//! The attribute part of the pipeline (category, name, manufacturer, amount)
//! is pushed into the store via [`crate::store::ResourceFilter`]; the
//! location part runs here because it needs the geocoder and the distance
//! calculator.

use serde::{Deserialize, Serialize};

use crate::{
  address::{Address, Coordinates},
  demand::DemandResource,
  geo::distance_km,
  identity::{DemanderInfo, ProviderInfo},
  resource::{Resource, ResourceKind},
  store::ResourceFilter,
};

// ─── Query ───────────────────────────────────────────────────────────────────

/// A demand (or offer) query for one resource kind.
///
/// `category` is the only mandatory filter. Optional filters apply only when
/// non-empty / non-zero. `radius_km <= 0` means unbounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceQuery {
  pub kind:              ResourceKind,
  pub category:          String,
  #[serde(default)]
  pub name:              Option<String>,
  #[serde(default)]
  pub manufacturer:      Option<String>,
  #[serde(default)]
  pub amount:            Option<i64>,
  // Personnel refinements; ignored for the other kinds.
  #[serde(default)]
  pub qualification:     Option<String>,
  #[serde(default)]
  pub area:              Option<String>,
  #[serde(default)]
  pub experience_rt_pcr: Option<bool>,
  /// Query location; only locatable (country + postal code) addresses
  /// activate the distance filter.
  #[serde(default)]
  pub address:           Option<Address>,
  #[serde(default)]
  pub radius_km:         i64,
}

impl ResourceQuery {
  /// The store-side (attribute) part of the filter pipeline. Blank strings
  /// and non-positive amounts mean "no filter", matching the intake format.
  pub fn filter(&self) -> ResourceFilter {
    fn non_empty(s: &Option<String>) -> Option<String> {
      s.as_deref().filter(|v| !v.is_empty()).map(str::to_owned)
    }

    ResourceFilter {
      kind:              self.kind,
      category:          self.category.clone(),
      name:              non_empty(&self.name),
      manufacturer:      non_empty(&self.manufacturer),
      min_amount:        self.amount.filter(|a| *a > 0),
      qualification:     non_empty(&self.qualification),
      area:              non_empty(&self.area),
      experience_rt_pcr: self.experience_rt_pcr,
    }
  }

  /// The address to geocode, if the query is located at all.
  pub fn location(&self) -> Option<&Address> {
    self.address.as_ref().filter(|a| a.is_locatable())
  }
}

// ─── Location filter ─────────────────────────────────────────────────────────

/// Outcome of the location filter for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationFilter {
  /// No query location; candidate kept undecorated.
  Unlocated,
  /// Candidate kept, decorated with the rounded distance.
  Within(i64),
  /// Candidate dropped: out of radius, or unlocated while the query is not.
  Excluded,
}

/// Apply the (asymmetric) location policy: an unlocated query sees every
/// candidate; a located query sees only located candidates, and only within
/// `radius_km` when that is positive. A non-positive radius means unbounded,
/// so a stray `-1` cannot make the whole catalog look empty.
pub fn filter_by_location(
  origin: Option<Coordinates>,
  candidate: Option<Coordinates>,
  radius_km: i64,
) -> LocationFilter {
  let Some(origin) = origin else {
    return LocationFilter::Unlocated;
  };
  let Some(candidate) = candidate else {
    return LocationFilter::Excluded;
  };

  let distance = distance_km(origin, candidate);
  if radius_km > 0 && distance > radius_km as f64 {
    return LocationFilter::Excluded;
  }
  LocationFilter::Within(distance.round() as i64)
}

// ─── Match results ───────────────────────────────────────────────────────────

/// One offered resource matching a demand query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferMatch {
  pub resource:    Resource,
  pub provider:    ProviderInfo,
  /// Rounded distance to the query location; `None` for unlocated queries.
  pub distance_km: Option<i64>,
}

/// One demanded resource matching an offer-side query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandMatch {
  pub resource:    DemandResource,
  pub demander:    DemanderInfo,
  pub address:     Option<Address>,
  pub distance_km: Option<i64>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn at(latitude: f64, longitude: f64) -> Coordinates {
    Coordinates { latitude, longitude }
  }

  #[test]
  fn unlocated_query_keeps_everything() {
    assert_eq!(
      filter_by_location(None, None, 10),
      LocationFilter::Unlocated
    );
    assert_eq!(
      filter_by_location(None, Some(at(0.0, 0.0)), 10),
      LocationFilter::Unlocated
    );
  }

  #[test]
  fn located_query_drops_unlocated_candidates() {
    assert_eq!(
      filter_by_location(Some(at(0.0, 0.0)), None, 0),
      LocationFilter::Excluded
    );
  }

  #[test]
  fn same_place_matches_any_radius() {
    let p = at(48.1372, 11.5756);
    assert_eq!(
      filter_by_location(Some(p), Some(p), 1),
      LocationFilter::Within(0)
    );
  }

  #[test]
  fn zero_radius_is_unbounded() {
    let munich = at(48.1372, 11.5756);
    let berlin = at(52.5186, 13.4083);
    let LocationFilter::Within(d) =
      filter_by_location(Some(munich), Some(berlin), 0)
    else {
      panic!("expected a match");
    };
    assert!(d > 400);
  }

  #[test]
  fn negative_radius_is_treated_as_unbounded() {
    let munich = at(48.1372, 11.5756);
    let berlin = at(52.5186, 13.4083);
    let LocationFilter::Within(d) =
      filter_by_location(Some(munich), Some(berlin), -1)
    else {
      panic!("expected a match");
    };
    assert!(d > 400);
  }

  #[test]
  fn out_of_radius_is_excluded() {
    let munich = at(48.1372, 11.5756);
    let berlin = at(52.5186, 13.4083);
    assert_eq!(
      filter_by_location(Some(munich), Some(berlin), 100),
      LocationFilter::Excluded
    );
  }

  #[test]
  fn blank_optional_filters_are_dropped() {
    let query = ResourceQuery {
      kind:              ResourceKind::Device,
      category:          "PCR".into(),
      name:              Some(String::new()),
      manufacturer:      None,
      amount:            Some(0),
      qualification:     None,
      area:              None,
      experience_rt_pcr: None,
      address:           None,
      radius_km:         0,
    };
    let filter = query.filter();
    assert_eq!(filter.name, None);
    assert_eq!(filter.min_amount, None);
  }
}

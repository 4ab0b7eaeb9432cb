//! Offer records — a provider's bundle of offered resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  address::Address,
  identity::ProviderInfo,
  resource::{NewResource, Resource},
  token::Token,
};

/// Input to offer insertion. Addresses are geocoded by the service before
/// the bundle reaches the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOffer {
  pub provider:  ProviderInfo,
  pub address:   Address,
  #[serde(default)]
  pub resources: Vec<NewResource>,
}

/// A persisted offer. The token is issued at insert time and never changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
  pub id:         i64,
  pub provider:   ProviderInfo,
  pub address:    Address,
  pub token:      Token,
  pub created_at: DateTime<Utc>,
}

/// An offer together with every resource it owns — the view a provider gets
/// back when resolving their token. Soft-deleted resources are included so
/// providers can see their own history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferView {
  pub offer:     Offer,
  pub resources: Vec<Resource>,
}

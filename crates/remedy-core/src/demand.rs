//! Demand records — a party's standing request for resources.
//!
//! Demands mirror the offer shape but only carry consumable and device
//! entries (nobody "demands" a named person), and their address is optional:
//! an unlocated demand is matched without the location filter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  address::Address,
  identity::DemanderInfo,
  resource::{Consumable, Device, ResourceKind},
  token::Token,
};

/// The typed payload of a demand-side resource entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum DemandDetail {
  Consumable(Consumable),
  Device(Device),
}

impl DemandDetail {
  pub fn kind(&self) -> ResourceKind {
    match self {
      Self::Consumable(_) => ResourceKind::Consumable,
      Self::Device(_) => ResourceKind::Device,
    }
  }

  pub fn category(&self) -> &str {
    match self {
      Self::Consumable(c) => &c.category,
      Self::Device(d) => &d.category,
    }
  }

  pub fn amount(&self) -> i64 {
    match self {
      Self::Consumable(c) => c.amount,
      Self::Device(d) => d.amount,
    }
  }
}

/// Input to demand insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDemand {
  pub demander:  DemanderInfo,
  #[serde(default)]
  pub address:   Option<Address>,
  #[serde(default)]
  pub resources: Vec<DemandDetail>,
}

/// A persisted demand record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demand {
  pub id:         i64,
  pub demander:   DemanderInfo,
  pub address:    Option<Address>,
  pub token:      Option<Token>,
  pub created_at: DateTime<Utc>,
}

/// A persisted demand-side resource entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandResource {
  pub id:         i64,
  pub demand_id:  i64,
  pub detail:     DemandDetail,
  pub is_deleted: bool,
}

//! Resource kinds — the polymorphic unit of the catalog.
//!
//! Consumables, devices and personnel share a common contract (category,
//! descriptive fields, soft-delete) and are modelled as a tagged variant
//! rather than an inheritance chain. Personnel genuinely diverges: it has no
//! amount dimension (implicitly 1) and requires a qualification and an area.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, address::Address};

/// Discriminant over the three resource kinds. The string forms double as
/// the `element_type` values in the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
  Consumable,
  Device,
  Personal,
}

impl ResourceKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Consumable => "consumable",
      Self::Device => "device",
      Self::Personal => "personal",
    }
  }
}

impl std::fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Kind payloads ───────────────────────────────────────────────────────────

/// A consumable good (masks, reagents, swabs, ...), counted in `unit`s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Consumable {
  pub category:     String,
  #[serde(default)]
  pub name:         String,
  #[serde(default)]
  pub manufacturer: String,
  #[serde(default)]
  pub ordernumber:  String,
  #[serde(default)]
  pub unit:         String,
  #[serde(default)]
  pub annotation:   String,
  pub amount:       i64,
}

/// A device (PCR cyclers, centrifuges, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
  pub category:     String,
  #[serde(default)]
  pub name:         String,
  #[serde(default)]
  pub manufacturer: String,
  #[serde(default)]
  pub ordernumber:  String,
  #[serde(default)]
  pub annotation:   String,
  pub amount:       i64,
}

/// A person volunteering time. No amount dimension; one record is one person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Personnel {
  pub category:          String,
  pub qualification:     String,
  pub area:              String,
  #[serde(default)]
  pub institution:       String,
  #[serde(default)]
  pub researchgroup:     String,
  #[serde(default)]
  pub experience_rt_pcr: bool,
  #[serde(default)]
  pub annotation:        String,
}

// ─── Tagged variant ──────────────────────────────────────────────────────────

/// The typed payload of a resource record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum ResourceDetail {
  Consumable(Consumable),
  Device(Device),
  Personal(Personnel),
}

impl ResourceDetail {
  pub fn kind(&self) -> ResourceKind {
    match self {
      Self::Consumable(_) => ResourceKind::Consumable,
      Self::Device(_) => ResourceKind::Device,
      Self::Personal(_) => ResourceKind::Personal,
    }
  }

  pub fn category(&self) -> &str {
    match self {
      Self::Consumable(c) => &c.category,
      Self::Device(d) => &d.category,
      Self::Personal(p) => &p.category,
    }
  }

  /// The stocked amount; personnel count as 1.
  pub fn amount(&self) -> i64 {
    match self {
      Self::Consumable(c) => c.amount,
      Self::Device(d) => d.amount,
      Self::Personal(_) => 1,
    }
  }

  /// Field-level validation applied before any insert.
  pub fn validate(&self) -> Result<()> {
    if self.category().trim().is_empty() {
      return Err(Error::EmptyCategory);
    }
    match self {
      Self::Consumable(c) if c.amount < 1 => Err(Error::InvalidAmount(c.amount)),
      Self::Device(d) if d.amount < 1 => Err(Error::InvalidAmount(d.amount)),
      Self::Personal(p)
        if p.qualification.trim().is_empty() || p.area.trim().is_empty() =>
      {
        Err(Error::IncompletePersonnel)
      }
      _ => Ok(()),
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A resource with its owned address, as submitted at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewResource {
  pub detail:  ResourceDetail,
  pub address: Address,
}

/// A persisted resource record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
  pub id:         i64,
  pub offer_id:   i64,
  pub detail:     ResourceDetail,
  pub address:    Address,
  pub is_deleted: bool,
}

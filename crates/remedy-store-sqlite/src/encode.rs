//! Encoding and decoding helpers between Rust domain types and the plain
//! column representations stored in SQLite.
//!
//! All timestamps are stored as RFC 3339 strings. Resource kinds and change
//! types are stored under their canonical string forms. Row-to-domain helpers
//! return [`rusqlite::Result`] so they compose inside `query_map` closures;
//! fallible string decoding (timestamps, tokens) happens afterwards on the
//! async side via the `Raw*` types.

use chrono::{DateTime, Utc};
use remedy_core::{
  address::{Address, Coordinates},
  changelog::{ChangeLogEntry, ChangeType},
  demand::{DemandDetail, DemandResource},
  identity::{DemanderInfo, ProviderInfo},
  offer::Offer,
  resource::{Consumable, Device, Personnel, Resource, ResourceDetail, ResourceKind},
  token::Token,
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

// ─── Discriminants ───────────────────────────────────────────────────────────

pub fn decode_kind(s: &str) -> Result<ResourceKind> {
  match s {
    "consumable" => Ok(ResourceKind::Consumable),
    "device" => Ok(ResourceKind::Device),
    "personal" => Ok(ResourceKind::Personal),
    other => Err(Error::Decode(format!("unknown resource kind: {other:?}"))),
  }
}

pub fn decode_change_type(s: &str) -> Result<ChangeType> {
  match s {
    "INCREASE_AMOUNT" => Ok(ChangeType::IncreaseAmount),
    "DECREASE_AMOUNT" => Ok(ChangeType::DecreaseAmount),
    "DELETE_RESOURCE" => Ok(ChangeType::DeleteResource),
    other => Err(Error::Decode(format!("unknown change type: {other:?}"))),
  }
}

// ─── Tables & column lists ───────────────────────────────────────────────────

/// Offer-side table holding resources of `kind`.
pub fn kind_table(kind: ResourceKind) -> &'static str {
  match kind {
    ResourceKind::Consumable => "consumable",
    ResourceKind::Device => "device",
    ResourceKind::Personal => "personal",
  }
}

/// Demand-side table for `kind`; personnel are never demanded.
pub fn demand_table(kind: ResourceKind) -> Option<&'static str> {
  match kind {
    ResourceKind::Consumable => Some("demand_consumable"),
    ResourceKind::Device => Some("demand_device"),
    ResourceKind::Personal => None,
  }
}

/// Projection for `kind`'s table under alias `r`, read by
/// [`resource_from_row`].
pub fn resource_columns(kind: ResourceKind) -> &'static str {
  match kind {
    ResourceKind::Consumable => {
      "r.id, r.offer_id, r.category, r.name, r.manufacturer, r.ordernumber, \
       r.unit, r.annotation, r.amount, r.is_deleted"
    }
    ResourceKind::Device => {
      "r.id, r.offer_id, r.category, r.name, r.manufacturer, r.ordernumber, \
       r.annotation, r.amount, r.is_deleted"
    }
    ResourceKind::Personal => {
      "r.id, r.offer_id, r.category, r.qualification, r.area, r.institution, \
       r.researchgroup, r.experience_rt_pcr, r.annotation, r.is_deleted"
    }
  }
}

pub fn resource_column_count(kind: ResourceKind) -> usize {
  match kind {
    ResourceKind::Consumable | ResourceKind::Personal => 10,
    ResourceKind::Device => 9,
  }
}

/// Projection for a demand-side table under alias `r`, read by
/// [`demand_resource_from_row`].
pub fn demand_columns(kind: ResourceKind) -> &'static str {
  match kind {
    ResourceKind::Consumable => {
      "r.id, r.demand_id, r.category, r.name, r.manufacturer, r.ordernumber, \
       r.unit, r.annotation, r.amount, r.is_deleted"
    }
    _ => {
      "r.id, r.demand_id, r.category, r.name, r.manufacturer, r.ordernumber, \
       r.annotation, r.amount, r.is_deleted"
    }
  }
}

pub fn demand_column_count(kind: ResourceKind) -> usize {
  match kind {
    ResourceKind::Consumable => 10,
    _ => 9,
  }
}

/// Address projection under alias `a`; 6 columns.
pub const ADDRESS_COLUMNS: &str =
  "a.street, a.city, a.postalcode, a.country, a.latitude, a.longitude";

/// Provider projection under alias `o`; 5 columns.
pub const PROVIDER_COLUMNS: &str =
  "o.name, o.organisation, o.phone, o.mail, o.is_public";

/// Demander projection under alias `d`; 4 columns.
pub const DEMANDER_COLUMNS: &str = "d.institution, d.name, d.mail, d.phone";

/// Offer projection with its joined address, read by [`RawOffer::from_row`].
pub const OFFER_COLUMNS: &str =
  "o.id, o.name, o.organisation, o.phone, o.mail, o.is_public, o.token, \
   o.created_at, a.street, a.city, a.postalcode, a.country, a.latitude, \
   a.longitude";

// ─── Row readers ─────────────────────────────────────────────────────────────

pub fn address_from_row(row: &Row, base: usize) -> rusqlite::Result<Address> {
  let latitude: Option<f64> = row.get(base + 4)?;
  let longitude: Option<f64> = row.get(base + 5)?;
  let coordinates = match (latitude, longitude) {
    (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
    _ => None,
  };
  Ok(Address {
    street: row.get(base)?,
    city: row.get(base + 1)?,
    postalcode: row.get(base + 2)?,
    country: row.get(base + 3)?,
    coordinates,
  })
}

pub fn provider_from_row(row: &Row, base: usize) -> rusqlite::Result<ProviderInfo> {
  Ok(ProviderInfo {
    name:         row.get(base)?,
    organisation: row.get(base + 1)?,
    phone:        row.get(base + 2)?,
    mail:         row.get(base + 3)?,
    is_public:    row.get(base + 4)?,
  })
}

pub fn demander_from_row(row: &Row, base: usize) -> rusqlite::Result<DemanderInfo> {
  Ok(DemanderInfo {
    institution: row.get(base)?,
    name:        row.get(base + 1)?,
    mail:        row.get(base + 2)?,
    phone:       row.get(base + 3)?,
  })
}

/// Read a resource from `resource_columns(kind)` followed by
/// [`ADDRESS_COLUMNS`].
pub fn resource_from_row(kind: ResourceKind, row: &Row) -> rusqlite::Result<Resource> {
  let detail = match kind {
    ResourceKind::Consumable => ResourceDetail::Consumable(Consumable {
      category:     row.get(2)?,
      name:         row.get(3)?,
      manufacturer: row.get(4)?,
      ordernumber:  row.get(5)?,
      unit:         row.get(6)?,
      annotation:   row.get(7)?,
      amount:       row.get(8)?,
    }),
    ResourceKind::Device => ResourceDetail::Device(Device {
      category:     row.get(2)?,
      name:         row.get(3)?,
      manufacturer: row.get(4)?,
      ordernumber:  row.get(5)?,
      annotation:   row.get(6)?,
      amount:       row.get(7)?,
    }),
    ResourceKind::Personal => ResourceDetail::Personal(Personnel {
      category:          row.get(2)?,
      qualification:     row.get(3)?,
      area:              row.get(4)?,
      institution:       row.get(5)?,
      researchgroup:     row.get(6)?,
      experience_rt_pcr: row.get(7)?,
      annotation:        row.get(8)?,
    }),
  };
  let base = resource_column_count(kind);
  Ok(Resource {
    id:         row.get(0)?,
    offer_id:   row.get(1)?,
    detail,
    address:    address_from_row(row, base)?,
    is_deleted: row.get(base - 1)?,
  })
}

/// Read a demand-side entry from `demand_columns(kind)`.
pub fn demand_resource_from_row(
  kind: ResourceKind,
  row: &Row,
) -> rusqlite::Result<DemandResource> {
  let detail = match kind {
    ResourceKind::Consumable => DemandDetail::Consumable(Consumable {
      category:     row.get(2)?,
      name:         row.get(3)?,
      manufacturer: row.get(4)?,
      ordernumber:  row.get(5)?,
      unit:         row.get(6)?,
      annotation:   row.get(7)?,
      amount:       row.get(8)?,
    }),
    _ => DemandDetail::Device(Device {
      category:     row.get(2)?,
      name:         row.get(3)?,
      manufacturer: row.get(4)?,
      ordernumber:  row.get(5)?,
      annotation:   row.get(6)?,
      amount:       row.get(7)?,
    }),
  };
  Ok(DemandResource {
    id:         row.get(0)?,
    demand_id:  row.get(1)?,
    detail,
    is_deleted: row.get(demand_column_count(kind) - 1)?,
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// An `offer` row joined with its address, before string decoding.
pub struct RawOffer {
  pub id:         i64,
  pub provider:   ProviderInfo,
  pub address:    Address,
  pub token:      String,
  pub created_at: String,
}

impl RawOffer {
  /// Reads [`OFFER_COLUMNS`].
  pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      provider:   provider_from_row(row, 1)?,
      token:      row.get(6)?,
      created_at: row.get(7)?,
      address:    address_from_row(row, 8)?,
    })
  }

  pub fn into_offer(self) -> Result<Offer> {
    let token = Token::parse(&self.token)
      .map_err(|_| Error::Decode(format!("malformed token on offer {}", self.id)))?;
    Ok(Offer {
      id: self.id,
      provider: self.provider,
      address: self.address,
      token,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// A `change_log` row before string decoding.
pub struct RawChange {
  pub id:           i64,
  pub element_type: String,
  pub element_id:   i64,
  pub change_type:  String,
  pub diff_amount:  i64,
  pub reason:       String,
  pub timestamp:    String,
}

impl RawChange {
  pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      element_type: row.get(1)?,
      element_id:   row.get(2)?,
      change_type:  row.get(3)?,
      diff_amount:  row.get(4)?,
      reason:       row.get(5)?,
      timestamp:    row.get(6)?,
    })
  }

  pub fn into_entry(self) -> Result<ChangeLogEntry> {
    Ok(ChangeLogEntry {
      id:           self.id,
      element_type: decode_kind(&self.element_type)?,
      element_id:   self.element_id,
      change_type:  decode_change_type(&self.change_type)?,
      diff_amount:  self.diff_amount,
      reason:       self.reason,
      timestamp:    decode_dt(&self.timestamp)?,
    })
  }
}

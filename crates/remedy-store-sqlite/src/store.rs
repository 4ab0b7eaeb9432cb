//! [`SqliteStore`] — the SQLite implementation of [`CatalogStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use remedy_core::{
  address::{Address, Coordinates},
  changelog::{ChangeLogEntry, ChangeType},
  demand::{Demand, DemandDetail, NewDemand},
  identity::ProviderInfo,
  offer::{NewOffer, Offer, OfferView},
  resource::{NewResource, Resource, ResourceDetail, ResourceKind},
  store::{CatalogStore, DemandCandidate, OfferCandidate, ResourceFilter},
  subscription::{NewRegionSubscription, RegionSubscription},
  token::Token,
};

use crate::{
  Error, Result,
  encode::{
    ADDRESS_COLUMNS, DEMANDER_COLUMNS, OFFER_COLUMNS, PROVIDER_COLUMNS,
    RawChange, RawOffer, address_from_row, demand_column_count, demand_columns,
    demand_resource_from_row, demand_table, demander_from_row, encode_dt,
    kind_table, provider_from_row, resource_column_count, resource_columns,
    resource_from_row,
  },
  schema::SCHEMA,
};

/// How many fresh tokens to try before deferring to the UNIQUE constraint.
const TOKEN_ATTEMPTS: usize = 8;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Remedy catalog backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

#[cfg(test)]
impl SqliteStore {
  /// Raw SQL escape hatch so tests can corrupt a fixture or inspect rows
  /// the public surface hides.
  pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub(crate) async fn query_i64(&self, sql: &'static str) -> Result<i64> {
    self
      .conn
      .call(move |conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
      .await
      .map_err(Error::from_call)
  }
}

// ─── Closure-side helpers ────────────────────────────────────────────────────
//
// These run inside `conn.call` on the database thread. Domain errors are
// boxed into `tokio_rusqlite::Error::Other` and unwrapped again by
// `Error::from_call` on the async side; an error return from a closure also
// rolls back any open transaction.

type CallResult<T> = std::result::Result<T, tokio_rusqlite::Error>;

fn domain(e: remedy_core::Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

/// Draw a token not already present in `offer`, retrying on the
/// astronomically-unlikely collision. After `TOKEN_ATTEMPTS` collisions the
/// last candidate is returned anyway; the UNIQUE constraint on `offer.token`
/// stays the authoritative guard.
fn issue_token(
  conn: &rusqlite::Connection,
  mut generate: impl FnMut() -> Token,
) -> CallResult<Token> {
  let mut token = generate();
  for _ in 0..TOKEN_ATTEMPTS {
    let taken: bool = conn
      .query_row(
        "SELECT 1 FROM offer WHERE token = ?1",
        rusqlite::params![token.as_str()],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false);
    if !taken {
      break;
    }
    token = generate();
  }
  Ok(token)
}

fn insert_address(conn: &rusqlite::Connection, address: &Address) -> CallResult<i64> {
  let (latitude, longitude) = match address.coordinates {
    Some(c) => (Some(c.latitude), Some(c.longitude)),
    None => (None, None),
  };
  conn.execute(
    "INSERT INTO address (street, city, postalcode, country, latitude, longitude)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      address.street,
      address.city,
      address.postalcode,
      address.country,
      latitude,
      longitude,
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

fn update_address(
  conn: &rusqlite::Connection,
  id: i64,
  address: &Address,
) -> CallResult<usize> {
  let (latitude, longitude) = match address.coordinates {
    Some(c) => (Some(c.latitude), Some(c.longitude)),
    None => (None, None),
  };
  Ok(conn.execute(
    "UPDATE address
     SET street = ?1, city = ?2, postalcode = ?3, country = ?4,
         latitude = ?5, longitude = ?6
     WHERE id = ?7",
    rusqlite::params![
      address.street,
      address.city,
      address.postalcode,
      address.country,
      latitude,
      longitude,
      id,
    ],
  )?)
}

fn insert_resource(
  conn: &rusqlite::Connection,
  offer_id: i64,
  resource: &NewResource,
) -> CallResult<Resource> {
  let address_id = insert_address(conn, &resource.address)?;
  match &resource.detail {
    ResourceDetail::Consumable(c) => {
      conn.execute(
        "INSERT INTO consumable (offer_id, address_id, category, name,
           manufacturer, ordernumber, unit, annotation, amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
          offer_id,
          address_id,
          c.category,
          c.name,
          c.manufacturer,
          c.ordernumber,
          c.unit,
          c.annotation,
          c.amount,
        ],
      )?;
    }
    ResourceDetail::Device(d) => {
      conn.execute(
        "INSERT INTO device (offer_id, address_id, category, name,
           manufacturer, ordernumber, annotation, amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
          offer_id,
          address_id,
          d.category,
          d.name,
          d.manufacturer,
          d.ordernumber,
          d.annotation,
          d.amount,
        ],
      )?;
    }
    ResourceDetail::Personal(p) => {
      conn.execute(
        "INSERT INTO personal (offer_id, address_id, category, qualification,
           area, institution, researchgroup, experience_rt_pcr, annotation)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
          offer_id,
          address_id,
          p.category,
          p.qualification,
          p.area,
          p.institution,
          p.researchgroup,
          p.experience_rt_pcr,
          p.annotation,
        ],
      )?;
    }
  }
  Ok(Resource {
    id: conn.last_insert_rowid(),
    offer_id,
    detail: resource.detail.clone(),
    address: resource.address.clone(),
    is_deleted: false,
  })
}

/// All resources owned by an offer, soft-deleted ones included.
fn load_resources(
  conn: &rusqlite::Connection,
  offer_id: i64,
) -> CallResult<Vec<Resource>> {
  let mut out = Vec::new();
  for kind in [
    ResourceKind::Consumable,
    ResourceKind::Device,
    ResourceKind::Personal,
  ] {
    let sql = format!(
      "SELECT {}, {ADDRESS_COLUMNS}
       FROM {} r
       JOIN address a ON a.id = r.address_id
       WHERE r.offer_id = ?1
       ORDER BY r.id",
      resource_columns(kind),
      kind_table(kind),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
      .query_map(rusqlite::params![offer_id], |row| resource_from_row(kind, row))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    out.extend(rows);
  }
  Ok(out)
}

fn load_offer(conn: &rusqlite::Connection, token: &str) -> CallResult<Option<RawOffer>> {
  let sql = format!(
    "SELECT {OFFER_COLUMNS}
     FROM offer o
     JOIN address a ON a.id = o.address_id
     WHERE o.token = ?1"
  );
  Ok(
    conn
      .query_row(&sql, rusqlite::params![token], RawOffer::from_row)
      .optional()?,
  )
}

/// `(id, address_id)` of the offer behind `token`, or `OfferNotFound`.
fn offer_ids(conn: &rusqlite::Connection, token: &str) -> CallResult<(i64, i64)> {
  conn
    .query_row(
      "SELECT id, address_id FROM offer WHERE token = ?1",
      rusqlite::params![token],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?
    .ok_or_else(|| domain(remedy_core::Error::OfferNotFound))
}

/// `(amount, address_id)` of a live resource owned by `offer_id`. Soft-deleted
/// rows and rows under other offers fail as `ResourceNotFound`; personnel
/// report an amount of 1.
fn owned_resource(
  conn: &rusqlite::Connection,
  offer_id: i64,
  kind: ResourceKind,
  id: i64,
) -> CallResult<(i64, i64)> {
  let amount_col = match kind {
    ResourceKind::Personal => "1",
    _ => "amount",
  };
  let sql = format!(
    "SELECT {amount_col}, address_id FROM {}
     WHERE id = ?1 AND offer_id = ?2 AND is_deleted = 0",
    kind_table(kind),
  );
  conn
    .query_row(&sql, rusqlite::params![id, offer_id], |row| {
      Ok((row.get(0)?, row.get(1)?))
    })
    .optional()?
    .ok_or_else(|| domain(remedy_core::Error::ResourceNotFound(kind, id)))
}

/// Append one audit record; called inside the same transaction as the state
/// change it describes.
fn append_change(
  conn: &rusqlite::Connection,
  kind: ResourceKind,
  element_id: i64,
  change_type: ChangeType,
  diff_amount: i64,
  reason: &str,
) -> CallResult<ChangeLogEntry> {
  let timestamp = Utc::now();
  conn.execute(
    "INSERT INTO change_log (element_type, element_id, change_type,
       diff_amount, reason, timestamp)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      kind.as_str(),
      element_id,
      change_type.as_str(),
      diff_amount,
      reason,
      encode_dt(timestamp),
    ],
  )?;
  Ok(ChangeLogEntry {
    id: conn.last_insert_rowid(),
    element_type: kind,
    element_id,
    change_type,
    diff_amount,
    reason: reason.to_owned(),
    timestamp,
  })
}

// ─── CatalogStore impl ───────────────────────────────────────────────────────

impl CatalogStore for SqliteStore {
  type Error = Error;

  // ── Offers ──────────────────────────────────────────────────────────────

  async fn insert_offer(&self, offer: NewOffer) -> Result<OfferView> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let token = issue_token(&tx, Token::generate)?;

        let created_at = Utc::now();
        let address_id = insert_address(&tx, &offer.address)?;
        tx.execute(
          "INSERT INTO offer (name, organisation, phone, mail, is_public,
             address_id, token, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            offer.provider.name,
            offer.provider.organisation,
            offer.provider.phone,
            offer.provider.mail,
            offer.provider.is_public,
            address_id,
            token.as_str(),
            encode_dt(created_at),
          ],
        )?;
        let offer_id = tx.last_insert_rowid();

        let mut resources = Vec::with_capacity(offer.resources.len());
        for resource in &offer.resources {
          resources.push(insert_resource(&tx, offer_id, resource)?);
        }
        tx.commit()?;

        Ok(OfferView {
          offer: Offer {
            id: offer_id,
            provider: offer.provider,
            address: offer.address,
            token,
            created_at,
          },
          resources,
        })
      })
      .await
      .map_err(Error::from_call)
  }

  async fn resolve_link(&self, token: Token) -> Result<OfferView> {
    let (raw, resources) = self
      .conn
      .call(move |conn| {
        let Some(raw) = load_offer(conn, token.as_str())? else {
          return Err(domain(remedy_core::Error::OfferNotFound));
        };
        let resources = load_resources(conn, raw.id)?;
        Ok((raw, resources))
      })
      .await
      .map_err(Error::from_call)?;

    Ok(OfferView { offer: raw.into_offer()?, resources })
  }

  async fn delete_offer(&self, token: Token) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let (offer_id, address_id) = offer_ids(&tx, token.as_str())?;

        // Addresses are not FK-cascaded; collect them before the resource
        // rows disappear.
        let mut address_ids = vec![address_id];
        for kind in [
          ResourceKind::Consumable,
          ResourceKind::Device,
          ResourceKind::Personal,
        ] {
          let sql =
            format!("SELECT address_id FROM {} WHERE offer_id = ?1", kind_table(kind));
          let mut stmt = tx.prepare(&sql)?;
          let ids = stmt
            .query_map(rusqlite::params![offer_id], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          address_ids.extend(ids);
        }

        tx.execute("DELETE FROM offer WHERE id = ?1", rusqlite::params![offer_id])?;
        for id in address_ids {
          tx.execute("DELETE FROM address WHERE id = ?1", rusqlite::params![id])?;
        }
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::from_call)
  }

  // ── Resources ───────────────────────────────────────────────────────────

  async fn get_resource(
    &self,
    kind: ResourceKind,
    id: i64,
  ) -> Result<Option<Resource>> {
    self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {}, {ADDRESS_COLUMNS}
           FROM {} r
           JOIN address a ON a.id = r.address_id
           WHERE r.id = ?1",
          resource_columns(kind),
          kind_table(kind),
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id], |row| resource_from_row(kind, row))
            .optional()?,
        )
      })
      .await
      .map_err(Error::from_call)
  }

  async fn add_resource(&self, token: Token, resource: NewResource) -> Result<Resource> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let (offer_id, _) = offer_ids(&tx, token.as_str())?;
        let stored = insert_resource(&tx, offer_id, &resource)?;
        tx.commit()?;
        Ok(stored)
      })
      .await
      .map_err(Error::from_call)
  }

  // ── Mutation & audit ────────────────────────────────────────────────────

  async fn update_provider_info(
    &self,
    token: Token,
    provider: ProviderInfo,
    address: Address,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let (offer_id, address_id) = offer_ids(&tx, token.as_str())?;

        let mut touched = tx.execute(
          "UPDATE offer
           SET name = ?1, organisation = ?2, phone = ?3, mail = ?4, is_public = ?5
           WHERE id = ?6",
          rusqlite::params![
            provider.name,
            provider.organisation,
            provider.phone,
            provider.mail,
            provider.is_public,
            offer_id,
          ],
        )?;
        touched += update_address(&tx, address_id, &address)?;

        // One offer row plus one address row. Anything more means the data
        // is in a broken state and the transaction must not commit.
        if touched > 2 {
          return Err(domain(remedy_core::Error::InvalidState(format!(
            "provider update touched {touched} rows"
          ))));
        }
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::from_call)
  }

  async fn update_resource_info(
    &self,
    token: Token,
    id: i64,
    detail: ResourceDetail,
    address: Address,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let kind = detail.kind();
        let (offer_id, _) = offer_ids(&tx, token.as_str())?;
        let (_, address_id) = owned_resource(&tx, offer_id, kind, id)?;

        // Descriptive fields only; amount and category stay untouched.
        let mut touched = match &detail {
          ResourceDetail::Consumable(c) => tx.execute(
            "UPDATE consumable
             SET name = ?1, manufacturer = ?2, ordernumber = ?3, unit = ?4,
                 annotation = ?5
             WHERE id = ?6",
            rusqlite::params![
              c.name,
              c.manufacturer,
              c.ordernumber,
              c.unit,
              c.annotation,
              id,
            ],
          )?,
          ResourceDetail::Device(d) => tx.execute(
            "UPDATE device
             SET name = ?1, manufacturer = ?2, ordernumber = ?3, annotation = ?4
             WHERE id = ?5",
            rusqlite::params![d.name, d.manufacturer, d.ordernumber, d.annotation, id],
          )?,
          ResourceDetail::Personal(p) => tx.execute(
            "UPDATE personal
             SET qualification = ?1, area = ?2, institution = ?3,
                 researchgroup = ?4, experience_rt_pcr = ?5, annotation = ?6
             WHERE id = ?7",
            rusqlite::params![
              p.qualification,
              p.area,
              p.institution,
              p.researchgroup,
              p.experience_rt_pcr,
              p.annotation,
              id,
            ],
          )?,
        };
        touched += update_address(&tx, address_id, &address)?;

        if touched > 2 {
          return Err(domain(remedy_core::Error::InvalidState(format!(
            "resource update touched {touched} rows"
          ))));
        }
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::from_call)
  }

  async fn change_amount(
    &self,
    token: Token,
    kind: ResourceKind,
    id: i64,
    new_amount: i64,
    reason: String,
  ) -> Result<Option<ChangeLogEntry>> {
    self
      .conn
      .call(move |conn| {
        if kind == ResourceKind::Personal {
          return Err(domain(remedy_core::Error::AmountNotApplicable));
        }
        let tx = conn.transaction()?;
        let (current, _) = {
          let (offer_id, _) = offer_ids(&tx, token.as_str())?;
          owned_resource(&tx, offer_id, kind, id)?
        };

        if new_amount == current {
          // Nothing changes, nothing is logged.
          return Ok(None);
        }
        let change_type = if new_amount > current {
          ChangeType::IncreaseAmount
        } else {
          if reason.trim().is_empty() {
            return Err(domain(remedy_core::Error::MissingReason));
          }
          if new_amount < 1 {
            return Err(domain(remedy_core::Error::InvalidAmount(new_amount)));
          }
          ChangeType::DecreaseAmount
        };

        tx.execute(
          &format!("UPDATE {} SET amount = ?1 WHERE id = ?2", kind_table(kind)),
          rusqlite::params![new_amount, id],
        )?;
        let entry = append_change(
          &tx,
          kind,
          id,
          change_type,
          (new_amount - current).abs(),
          &reason,
        )?;
        tx.commit()?;
        Ok(Some(entry))
      })
      .await
      .map_err(Error::from_call)
  }

  async fn mark_deleted(
    &self,
    token: Token,
    kind: ResourceKind,
    id: i64,
    reason: String,
  ) -> Result<ChangeLogEntry> {
    self
      .conn
      .call(move |conn| {
        if reason.trim().is_empty() {
          return Err(domain(remedy_core::Error::MissingReason));
        }
        let tx = conn.transaction()?;
        let (offer_id, _) = offer_ids(&tx, token.as_str())?;
        let (amount, address_id) = owned_resource(&tx, offer_id, kind, id)?;

        let touched = tx.execute(
          &format!("UPDATE {} SET is_deleted = 1 WHERE id = ?1", kind_table(kind)),
          rusqlite::params![id],
        )? + tx.execute(
          "UPDATE address SET is_deleted = 1 WHERE id = ?1",
          rusqlite::params![address_id],
        )?;

        // Exactly the resource row and its address row. A missing address
        // (touched < 2) is as broken as an over-wide update.
        if touched != 2 {
          return Err(domain(remedy_core::Error::InvalidState(format!(
            "soft delete touched {touched} rows"
          ))));
        }
        let entry =
          append_change(&tx, kind, id, ChangeType::DeleteResource, amount, &reason)?;
        tx.commit()?;
        Ok(entry)
      })
      .await
      .map_err(Error::from_call)
  }

  async fn change_log(
    &self,
    kind: ResourceKind,
    id: i64,
  ) -> Result<Vec<ChangeLogEntry>> {
    let raws: Vec<RawChange> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, element_type, element_id, change_type, diff_amount,
             reason, timestamp
           FROM change_log
           WHERE element_type = ?1 AND element_id = ?2
           ORDER BY id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![kind.as_str(), id], RawChange::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::from_call)?;

    raws.into_iter().map(RawChange::into_entry).collect()
  }

  // ── Demands ─────────────────────────────────────────────────────────────

  async fn insert_demand(&self, demand: NewDemand) -> Result<Demand> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let address_id = match &demand.address {
          Some(address) => Some(insert_address(&tx, address)?),
          None => None,
        };
        let token = Token::generate();
        let created_at = Utc::now();
        tx.execute(
          "INSERT INTO demand (institution, name, mail, phone, address_id,
             token, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            demand.demander.institution,
            demand.demander.name,
            demand.demander.mail,
            demand.demander.phone,
            address_id,
            token.as_str(),
            encode_dt(created_at),
          ],
        )?;
        let demand_id = tx.last_insert_rowid();

        for detail in &demand.resources {
          match detail {
            DemandDetail::Consumable(c) => {
              tx.execute(
                "INSERT INTO demand_consumable (demand_id, category, name,
                   manufacturer, ordernumber, unit, annotation, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                  demand_id,
                  c.category,
                  c.name,
                  c.manufacturer,
                  c.ordernumber,
                  c.unit,
                  c.annotation,
                  c.amount,
                ],
              )?;
            }
            DemandDetail::Device(d) => {
              tx.execute(
                "INSERT INTO demand_device (demand_id, category, name,
                   manufacturer, ordernumber, annotation, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                  demand_id,
                  d.category,
                  d.name,
                  d.manufacturer,
                  d.ordernumber,
                  d.annotation,
                  d.amount,
                ],
              )?;
            }
          }
        }
        tx.commit()?;

        Ok(Demand {
          id: demand_id,
          demander: demand.demander,
          address: demand.address,
          token: Some(token),
          created_at,
        })
      })
      .await
      .map_err(Error::from_call)
  }

  // ── Matching reads ──────────────────────────────────────────────────────

  async fn find_offered(&self, filter: ResourceFilter) -> Result<Vec<OfferCandidate>> {
    self
      .conn
      .call(move |conn| {
        let kind = filter.kind;
        let mut conds: Vec<String> =
          vec!["r.category = ?1".into(), "r.is_deleted = 0".into()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> =
          vec![Box::new(filter.category.clone())];

        match kind {
          ResourceKind::Personal => {
            if let Some(qualification) = &filter.qualification {
              params.push(Box::new(qualification.clone()));
              conds.push(format!("r.qualification = ?{}", params.len()));
            }
            if let Some(area) = &filter.area {
              params.push(Box::new(area.clone()));
              conds.push(format!("r.area = ?{}", params.len()));
            }
            if let Some(experienced) = filter.experience_rt_pcr {
              params.push(Box::new(experienced));
              conds.push(format!("r.experience_rt_pcr = ?{}", params.len()));
            }
          }
          _ => {
            if let Some(name) = &filter.name {
              params.push(Box::new(name.clone()));
              conds.push(format!("r.name = ?{}", params.len()));
            }
            if let Some(manufacturer) = &filter.manufacturer {
              params.push(Box::new(manufacturer.clone()));
              conds.push(format!("r.manufacturer = ?{}", params.len()));
            }
            if let Some(min_amount) = filter.min_amount {
              params.push(Box::new(min_amount));
              conds.push(format!("r.amount >= ?{}", params.len()));
            }
          }
        }

        let sql = format!(
          "SELECT {}, {ADDRESS_COLUMNS}, {PROVIDER_COLUMNS}
           FROM {} r
           JOIN offer o ON o.id = r.offer_id
           JOIN address a ON a.id = r.address_id
           WHERE {}
           ORDER BY r.id",
          resource_columns(kind),
          kind_table(kind),
          conds.join(" AND "),
        );
        let provider_base = resource_column_count(kind) + 6;

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            Ok(OfferCandidate {
              resource: resource_from_row(kind, row)?,
              provider: provider_from_row(row, provider_base)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::from_call)
  }

  async fn find_demanded(&self, filter: ResourceFilter) -> Result<Vec<DemandCandidate>> {
    self
      .conn
      .call(move |conn| {
        let kind = filter.kind;
        let Some(table) = demand_table(kind) else {
          // Personnel are never demanded.
          return Ok(Vec::new());
        };

        let mut conds: Vec<String> =
          vec!["r.category = ?1".into(), "r.is_deleted = 0".into()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> =
          vec![Box::new(filter.category.clone())];

        if let Some(name) = &filter.name {
          params.push(Box::new(name.clone()));
          conds.push(format!("r.name = ?{}", params.len()));
        }
        if let Some(manufacturer) = &filter.manufacturer {
          params.push(Box::new(manufacturer.clone()));
          conds.push(format!("r.manufacturer = ?{}", params.len()));
        }
        if let Some(min_amount) = filter.min_amount {
          params.push(Box::new(min_amount));
          conds.push(format!("r.amount >= ?{}", params.len()));
        }

        let sql = format!(
          "SELECT {}, {DEMANDER_COLUMNS}, a.id, {ADDRESS_COLUMNS}
           FROM {table} r
           JOIN demand d ON d.id = r.demand_id
           LEFT JOIN address a ON a.id = d.address_id
           WHERE {}
           ORDER BY r.id",
          demand_columns(kind),
          conds.join(" AND "),
        );
        let base = demand_column_count(kind);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            let resource = demand_resource_from_row(kind, row)?;
            let demander = demander_from_row(row, base)?;
            let address = match row.get::<_, Option<i64>>(base + 4)? {
              Some(_) => Some(address_from_row(row, base + 5)?),
              None => None,
            };
            Ok(DemandCandidate { resource, demander, address })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::from_call)
  }

  // ── Subscriptions & notifier feeds ──────────────────────────────────────

  async fn insert_subscription(
    &self,
    subscription: NewRegionSubscription,
    coordinates: Coordinates,
  ) -> Result<RegionSubscription> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO region_subscription (name, email, postalcode,
             latitude, longitude, active)
           VALUES (?1, ?2, ?3, ?4, ?5, 1)",
          rusqlite::params![
            subscription.name,
            subscription.email,
            subscription.postalcode,
            coordinates.latitude,
            coordinates.longitude,
          ],
        )?;
        Ok(RegionSubscription {
          id: conn.last_insert_rowid(),
          name: subscription.name,
          email: subscription.email,
          postalcode: subscription.postalcode,
          coordinates,
          active: true,
        })
      })
      .await
      .map_err(Error::from_call)
  }

  async fn active_subscriptions(&self) -> Result<Vec<RegionSubscription>> {
    self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT id, name, email, postalcode, latitude, longitude
           FROM region_subscription
           WHERE active = 1
           ORDER BY id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RegionSubscription {
              id:          row.get(0)?,
              name:        row.get(1)?,
              email:       row.get(2)?,
              postalcode:  row.get(3)?,
              coordinates: Coordinates {
                latitude:  row.get(4)?,
                longitude: row.get(5)?,
              },
              active:      true,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::from_call)
  }

  async fn offered_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Resource>> {
    let cutoff_str = encode_dt(cutoff);
    self
      .conn
      .call(move |conn| {
        let mut out = Vec::new();
        for kind in [
          ResourceKind::Consumable,
          ResourceKind::Device,
          ResourceKind::Personal,
        ] {
          let sql = format!(
            "SELECT {}, {ADDRESS_COLUMNS}
             FROM {} r
             JOIN offer o ON o.id = r.offer_id
             JOIN address a ON a.id = r.address_id
             WHERE o.created_at > ?1 AND r.is_deleted = 0
             ORDER BY r.id",
            resource_columns(kind),
            kind_table(kind),
          );
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map(rusqlite::params![cutoff_str], |row| {
              resource_from_row(kind, row)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          out.extend(rows);
        }
        Ok(out)
      })
      .await
      .map_err(Error::from_call)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// A connection with the schema applied and one offer holding `token`.
  fn seeded(token: &Token) -> rusqlite::Connection {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    let address_id = insert_address(&conn, &Address::default()).unwrap();
    conn
      .execute(
        "INSERT INTO offer (name, organisation, phone, mail, is_public,
           address_id, token, created_at)
         VALUES ('', '', '', '', 1, ?1, ?2, ?3)",
        rusqlite::params![address_id, token.as_str(), encode_dt(Utc::now())],
      )
      .unwrap();
    conn
  }

  #[test]
  fn issue_token_retries_past_a_collision() {
    let taken = Token::generate();
    let fresh = Token::generate();
    let conn = seeded(&taken);

    // Candidates are drawn back-to-front: the taken token first.
    let mut candidates = vec![fresh.clone(), taken.clone()];
    let issued = issue_token(&conn, || candidates.pop().unwrap()).unwrap();
    assert_eq!(issued, fresh);
    assert!(candidates.is_empty());
  }

  #[test]
  fn exhausted_retries_defer_to_the_unique_constraint() {
    let taken = Token::generate();
    let conn = seeded(&taken);

    let mut draws = 0;
    let issued = issue_token(&conn, || {
      draws += 1;
      taken.clone()
    })
    .unwrap();
    assert_eq!(draws, TOKEN_ATTEMPTS + 1);
    assert_eq!(issued, taken);

    // The still-colliding candidate is rejected by the constraint itself.
    let err = conn
      .execute(
        "INSERT INTO offer (name, organisation, phone, mail, is_public,
           address_id, token, created_at)
         VALUES ('', '', '', '', 1, 1, ?1, '')",
        rusqlite::params![issued.as_str()],
      )
      .unwrap_err();
    assert!(matches!(
      err,
      rusqlite::Error::SqliteFailure(e, _)
        if e.code == rusqlite::ErrorCode::ConstraintViolation
    ));
  }
}

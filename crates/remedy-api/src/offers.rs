//! Handlers for `/offers` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/offers` | Insert an offer bundle; returns the token |
//! | `GET`    | `/offers/:token` | Resolve a token to the full view |
//! | `DELETE` | `/offers/:token` | Hard-delete the whole offer |
//! | `PUT`    | `/offers/:token/provider` | Overwrite contact data + address |
//! | `POST`   | `/offers/:token/resources` | Add a resource to the offer |
//! | `PUT`    | `/offers/:token/resources/:id` | Overwrite descriptive fields |
//! | `DELETE` | `/offers/:token/resources/:kind/:id` | Soft delete, reason required |
//! | `PUT`    | `/offers/:token/resources/:kind/:id/amount` | Amount state machine |
//! | `GET`    | `/offers/:token/resources/:kind/:id/changes` | Audit trail |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use remedy_core::{
  address::Address,
  changelog::ChangeLogEntry,
  geocode::Geocoder,
  identity::ProviderInfo,
  mail::Mailer,
  offer::{NewOffer, OfferView},
  resource::{NewResource, Resource, ResourceDetail, ResourceKind},
  store::CatalogStore,
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

// ─── Create / resolve / delete ───────────────────────────────────────────────

/// `POST /offers`
pub async fn create<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Json(body): Json<NewOffer>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  let view = state.catalog.insert_offer(body).await?;
  Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /offers/:token`
pub async fn resolve<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Path(token): Path<String>,
) -> Result<Json<OfferView>, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  Ok(Json(state.catalog.resolve_link(&token).await?))
}

/// `DELETE /offers/:token`
pub async fn delete<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Path(token): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  state.catalog.delete_offer(&token).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Provider info ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ProviderUpdate {
  pub provider: ProviderInfo,
  pub address:  Address,
}

/// `PUT /offers/:token/provider`
pub async fn update_provider<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Path(token): Path<String>,
  Json(body): Json<ProviderUpdate>,
) -> Result<StatusCode, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  state
    .catalog
    .change_provider_info(&token, body.provider, body.address)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Resources under an offer ────────────────────────────────────────────────

/// `POST /offers/:token/resources`
pub async fn add_resource<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Path(token): Path<String>,
  Json(body): Json<NewResource>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  let resource: Resource = state.catalog.add_resource(&token, body).await?;
  Ok((StatusCode::CREATED, Json(resource)))
}

#[derive(Debug, Deserialize)]
pub struct ResourceUpdate {
  pub detail:  ResourceDetail,
  pub address: Address,
}

/// `PUT /offers/:token/resources/:id` — the kind is carried by the detail
/// payload; amount and category are never touched here.
pub async fn update_resource<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Path((token, id)): Path<(String, i64)>,
  Json(body): Json<ResourceUpdate>,
) -> Result<StatusCode, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  state
    .catalog
    .change_resource_info(&token, id, body.detail, body.address)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct Removal {
  pub reason: String,
}

/// `DELETE /offers/:token/resources/:kind/:id`
pub async fn remove_resource<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Path((token, kind, id)): Path<(String, ResourceKind, i64)>,
  Json(body): Json<Removal>,
) -> Result<Json<ChangeLogEntry>, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  let entry = state.catalog.mark_deleted(&token, kind, id, body.reason).await?;
  Ok(Json(entry))
}

// ─── Amounts & audit ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AmountChange {
  pub amount: i64,
  /// Required when decreasing.
  #[serde(default)]
  pub reason: String,
}

/// `PUT /offers/:token/resources/:kind/:id/amount` — returns the appended
/// log entry, or `null` when the amount did not change.
pub async fn change_amount<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Path((token, kind, id)): Path<(String, ResourceKind, i64)>,
  Json(body): Json<AmountChange>,
) -> Result<Json<Option<ChangeLogEntry>>, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  let entry = state
    .catalog
    .change_amount(&token, kind, id, body.amount, body.reason)
    .await?;
  Ok(Json(entry))
}

/// `GET /offers/:token/resources/:kind/:id/changes`
pub async fn change_log<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Path((token, kind, id)): Path<(String, ResourceKind, i64)>,
) -> Result<Json<Vec<ChangeLogEntry>>, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  Ok(Json(state.catalog.change_log(&token, kind, id).await?))
}

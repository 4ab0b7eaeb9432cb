//! Handler for the public `/resources/:kind/:id` read.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use remedy_core::{
  geocode::Geocoder,
  mail::Mailer,
  resource::{Resource, ResourceKind},
  store::CatalogStore,
};

use crate::{ApiState, error::ApiError};

/// `GET /resources/:kind/:id` — soft-deleted resources stay readable.
pub async fn get_one<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Path((kind, id)): Path<(ResourceKind, i64)>,
) -> Result<Json<Resource>, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  let resource = state
    .catalog
    .get_resource(kind, id)
    .await?
    .ok_or(ApiError(remedy_core::Error::ResourceNotFound(kind, id)))?;
  Ok(Json(resource))
}

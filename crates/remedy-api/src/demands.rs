//! Handler for `/demands`.

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use remedy_core::{
  demand::NewDemand,
  geocode::Geocoder,
  mail::Mailer,
  store::CatalogStore,
};

use crate::{ApiState, error::ApiError};

/// `POST /demands` — the address is optional; a locatable one is geocoded.
pub async fn create<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Json(body): Json<NewDemand>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  let demand = state.catalog.insert_demand(body).await?;
  Ok((StatusCode::CREATED, Json(demand)))
}

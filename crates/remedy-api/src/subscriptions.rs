//! Handler for `/subscriptions`.

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use remedy_core::{
  geocode::Geocoder,
  mail::Mailer,
  store::CatalogStore,
  subscription::NewRegionSubscription,
};

use crate::{ApiState, error::ApiError};

/// `POST /subscriptions` — geocodes the postal region immediately; the
/// confirmation mail is best-effort.
pub async fn create<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Json(body): Json<NewRegionSubscription>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  let subscription = state.notifier.subscribe(body).await?;
  Ok((StatusCode::CREATED, Json(subscription)))
}

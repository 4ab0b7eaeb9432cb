//! Handlers for the matching endpoints.
//!
//! Queries arrive as POST bodies: an optional address plus radius do not fit
//! query strings well, and the legacy intake format used request bodies too.

use std::sync::Arc;

use axum::{Json, extract::State};
use remedy_core::{
  geocode::Geocoder,
  mail::Mailer,
  matching::{DemandMatch, OfferMatch, ResourceQuery},
  store::CatalogStore,
};

use crate::{ApiState, error::ApiError};

/// `POST /search/offers` — demand-side view of the offered catalog.
pub async fn offers<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Json(query): Json<ResourceQuery>,
) -> Result<Json<Vec<OfferMatch>>, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  Ok(Json(state.catalog.query_offers(&query).await?))
}

/// `POST /search/demands` — offer-side view of the demanded catalog.
pub async fn demands<S, G, M>(
  State(state): State<Arc<ApiState<S, G, M>>>,
  Json(query): Json<ResourceQuery>,
) -> Result<Json<Vec<DemandMatch>>, ApiError>
where
  S: CatalogStore,
  remedy_core::Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  Ok(Json(state.catalog.query_demands(&query).await?))
}

//! JSON REST API for Remedy.
//!
//! Exposes an axum [`Router`] backed by any [`remedy_core::store::CatalogStore`],
//! any [`remedy_core::geocode::Geocoder`] and any [`remedy_core::mail::Mailer`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", remedy_api::api_router(state.clone()))
//! ```

pub mod demands;
pub mod error;
pub mod offers;
pub mod resources;
pub mod search;
pub mod subscriptions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use remedy_core::{
  geocode::Geocoder,
  mail::Mailer,
  notify::SubscriptionNotifier,
  service::CatalogService,
  store::CatalogStore,
};

pub use error::ApiError;

/// Shared state behind every handler.
pub struct ApiState<S, G, M> {
  pub catalog:  CatalogService<S, G>,
  pub notifier: SubscriptionNotifier<S, G, M>,
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, G, M>(state: Arc<ApiState<S, G, M>>) -> Router<()>
where
  S: CatalogStore + 'static,
  remedy_core::Error: From<S::Error>,
  G: Geocoder + 'static,
  M: Mailer + 'static,
{
  Router::new()
    // Offers (token-gated except creation)
    .route("/offers", post(offers::create::<S, G, M>))
    .route(
      "/offers/{token}",
      get(offers::resolve::<S, G, M>).delete(offers::delete::<S, G, M>),
    )
    .route("/offers/{token}/provider", put(offers::update_provider::<S, G, M>))
    .route("/offers/{token}/resources", post(offers::add_resource::<S, G, M>))
    .route(
      "/offers/{token}/resources/{id}",
      put(offers::update_resource::<S, G, M>),
    )
    .route(
      "/offers/{token}/resources/{kind}/{id}",
      axum::routing::delete(offers::remove_resource::<S, G, M>),
    )
    .route(
      "/offers/{token}/resources/{kind}/{id}/amount",
      put(offers::change_amount::<S, G, M>),
    )
    .route(
      "/offers/{token}/resources/{kind}/{id}/changes",
      get(offers::change_log::<S, G, M>),
    )
    // Public reads
    .route("/resources/{kind}/{id}", get(resources::get_one::<S, G, M>))
    // Demands
    .route("/demands", post(demands::create::<S, G, M>))
    // Matching
    .route("/search/offers", post(search::offers::<S, G, M>))
    .route("/search/demands", post(search::demands::<S, G, M>))
    // Subscriptions
    .route("/subscriptions", post(subscriptions::create::<S, G, M>))
    .with_state(state)
}

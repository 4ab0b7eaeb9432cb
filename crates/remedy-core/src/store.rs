//! The `CatalogStore` trait and supporting filter/candidate types.
//!
//! The trait is implemented by storage backends (e.g. `remedy-store-sqlite`).
//! Higher layers (the catalog service, the API) depend on this abstraction,
//! not on any concrete backend.
//!
//! Contract highlights the backend must honour:
//! - every mutation and its change-log entry commit in ONE transaction;
//! - offer insertion is a single transaction spanning offer, addresses and
//!   all child resources — no partial offer survives a failure;
//! - token uniqueness is guarded by a unique constraint, with issuance
//!   retried on collision;
//! - soft-deleted resources are invisible to `find_offered`/`find_demanded`
//!   and to further mutation, but stay retrievable by id.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  address::{Address, Coordinates},
  changelog::ChangeLogEntry,
  demand::{Demand, DemandResource, NewDemand},
  identity::{DemanderInfo, ProviderInfo},
  offer::{NewOffer, OfferView},
  resource::{NewResource, Resource, ResourceDetail, ResourceKind},
  subscription::{NewRegionSubscription, RegionSubscription},
  token::Token,
};

// ─── Filter & candidate types ────────────────────────────────────────────────

/// The attribute part of a match query, applied inside the store.
///
/// `category` is exact and case-sensitive. Optional fields are only present
/// when the query gave a usable value (see
/// [`crate::matching::ResourceQuery::filter`]).
#[derive(Debug, Clone)]
pub struct ResourceFilter {
  pub kind:              ResourceKind,
  pub category:          String,
  pub name:              Option<String>,
  pub manufacturer:      Option<String>,
  /// Candidates must stock at least this much.
  pub min_amount:        Option<i64>,
  pub qualification:     Option<String>,
  pub area:              Option<String>,
  pub experience_rt_pcr: Option<bool>,
}

/// An offered resource surviving the attribute filter, before the location
/// filter runs.
#[derive(Debug, Clone)]
pub struct OfferCandidate {
  pub resource: Resource,
  pub provider: ProviderInfo,
}

/// A demanded resource surviving the attribute filter. The address is the
/// owning demand's and may be absent.
#[derive(Debug, Clone)]
pub struct DemandCandidate {
  pub resource: DemandResource,
  pub demander: DemanderInfo,
  pub address:  Option<Address>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Remedy catalog backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait CatalogStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Offers ────────────────────────────────────────────────────────────

  /// Insert an offer with all its child resources atomically and issue its
  /// token. Addresses must already be geocoded.
  fn insert_offer(
    &self,
    offer: NewOffer,
  ) -> impl Future<Output = Result<OfferView, Self::Error>> + Send + '_;

  /// Resolve a well-formed token to the offer and everything it owns.
  fn resolve_link(
    &self,
    token: Token,
  ) -> impl Future<Output = Result<OfferView, Self::Error>> + Send + '_;

  /// Hard-delete the offer, cascading to its resources and their addresses.
  fn delete_offer(
    &self,
    token: Token,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Resources ─────────────────────────────────────────────────────────

  /// Direct id lookup; returns soft-deleted resources too.
  fn get_resource(
    &self,
    kind: ResourceKind,
    id: i64,
  ) -> impl Future<Output = Result<Option<Resource>, Self::Error>> + Send + '_;

  /// Insert a new resource under the token's offer.
  fn add_resource(
    &self,
    token: Token,
    resource: NewResource,
  ) -> impl Future<Output = Result<Resource, Self::Error>> + Send + '_;

  // ── Mutation & audit ──────────────────────────────────────────────────

  /// Overwrite the provider's descriptive fields and address. Must touch at
  /// most 2 rows or fail fatally without committing.
  fn update_provider_info(
    &self,
    token: Token,
    provider: ProviderInfo,
    address: Address,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Overwrite a resource's descriptive fields (never amount or category)
  /// and its address. Same 2-row guard as provider updates.
  fn update_resource_info(
    &self,
    token: Token,
    id: i64,
    detail: ResourceDetail,
    address: Address,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Apply the amount state machine. Returns the appended log entry, or
  /// `None` when the amount did not change (no-op, nothing logged).
  fn change_amount(
    &self,
    token: Token,
    kind: ResourceKind,
    id: i64,
    new_amount: i64,
    reason: String,
  ) -> impl Future<Output = Result<Option<ChangeLogEntry>, Self::Error>> + Send + '_;

  /// Soft-delete a resource and its address, appending a DELETE_RESOURCE
  /// entry with the deleted amount as diff.
  fn mark_deleted(
    &self,
    token: Token,
    kind: ResourceKind,
    id: i64,
    reason: String,
  ) -> impl Future<Output = Result<ChangeLogEntry, Self::Error>> + Send + '_;

  /// Audit trail for one resource, oldest first.
  fn change_log(
    &self,
    kind: ResourceKind,
    id: i64,
  ) -> impl Future<Output = Result<Vec<ChangeLogEntry>, Self::Error>> + Send + '_;

  // ── Demands ───────────────────────────────────────────────────────────

  fn insert_demand(
    &self,
    demand: NewDemand,
  ) -> impl Future<Output = Result<Demand, Self::Error>> + Send + '_;

  // ── Matching reads ────────────────────────────────────────────────────

  fn find_offered(
    &self,
    filter: ResourceFilter,
  ) -> impl Future<Output = Result<Vec<OfferCandidate>, Self::Error>> + Send + '_;

  fn find_demanded(
    &self,
    filter: ResourceFilter,
  ) -> impl Future<Output = Result<Vec<DemandCandidate>, Self::Error>> + Send + '_;

  // ── Subscriptions & notifier feeds ────────────────────────────────────

  fn insert_subscription(
    &self,
    subscription: NewRegionSubscription,
    coordinates: Coordinates,
  ) -> impl Future<Output = Result<RegionSubscription, Self::Error>> + Send + '_;

  fn active_subscriptions(
    &self,
  ) -> impl Future<Output = Result<Vec<RegionSubscription>, Self::Error>> + Send + '_;

  /// All non-deleted resources belonging to offers created after `cutoff`.
  fn offered_since(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Resource>, Self::Error>> + Send + '_;
}

//! The catalog service — matching and token-gated mutation over any store.
//!
//! This is the orchestration layer between the HTTP boundary and the store:
//! it validates input, parses tokens, resolves addresses through the
//! [`Geocoder`], runs the location filter, and delegates the transactional
//! work to the [`CatalogStore`].

use crate::{
  Error, Result,
  address::{Address, Coordinates},
  changelog::ChangeLogEntry,
  demand::{Demand, NewDemand},
  geocode::Geocoder,
  identity::ProviderInfo,
  matching::{DemandMatch, LocationFilter, OfferMatch, ResourceQuery, filter_by_location},
  offer::{NewOffer, OfferView},
  resource::{NewResource, Resource, ResourceDetail, ResourceKind},
  store::CatalogStore,
  token::Token,
};

pub struct CatalogService<S, G> {
  store:    S,
  geocoder: G,
}

impl<S, G> CatalogService<S, G>
where
  S: CatalogStore,
  Error: From<S::Error>,
  G: Geocoder,
{
  pub fn new(store: S, geocoder: G) -> Self { Self { store, geocoder } }

  /// Resolve `address` and stamp the coordinates onto it. Fails with
  /// [`Error::AddressResolution`]; callers that cannot proceed without
  /// coordinates propagate this.
  async fn geocode(&self, address: &mut Address) -> Result<()> {
    let coordinates = self.geocoder.resolve(address).await?;
    address.coordinates = Some(coordinates);
    Ok(())
  }

  // ── Offers ──────────────────────────────────────────────────────────────

  /// Validate, geocode and insert a complete offer; returns the stored view
  /// including the freshly-issued token.
  pub async fn insert_offer(&self, mut offer: NewOffer) -> Result<OfferView> {
    if !offer.provider.is_complete() {
      return Err(Error::IncompleteProvider);
    }
    for resource in &offer.resources {
      resource.detail.validate()?;
    }

    self.geocode(&mut offer.address).await?;
    for resource in &mut offer.resources {
      self.geocode(&mut resource.address).await?;
    }

    Ok(self.store.insert_offer(offer).await?)
  }

  /// Resolve a token to the offer and all resources it owns.
  pub async fn resolve_link(&self, token: &str) -> Result<OfferView> {
    let token = Token::parse(token)?;
    Ok(self.store.resolve_link(token).await?)
  }

  /// Delete the offer behind `token`, cascading to resources and addresses.
  pub async fn delete_offer(&self, token: &str) -> Result<()> {
    let token = Token::parse(token)?;
    Ok(self.store.delete_offer(token).await?)
  }

  // ── Resources ───────────────────────────────────────────────────────────

  /// Direct id lookup, soft-deleted rows included.
  pub async fn get_resource(
    &self,
    kind: ResourceKind,
    id: i64,
  ) -> Result<Option<Resource>> {
    Ok(self.store.get_resource(kind, id).await?)
  }

  /// Add a new resource under an existing offer.
  pub async fn add_resource(
    &self,
    token: &str,
    mut resource: NewResource,
  ) -> Result<Resource> {
    let token = Token::parse(token)?;
    resource.detail.validate()?;
    self.geocode(&mut resource.address).await?;
    Ok(self.store.add_resource(token, resource).await?)
  }

  // ── Mutation ────────────────────────────────────────────────────────────

  pub async fn change_provider_info(
    &self,
    token: &str,
    provider: ProviderInfo,
    mut address: Address,
  ) -> Result<()> {
    let token = Token::parse(token)?;
    if !provider.is_complete() {
      return Err(Error::IncompleteProvider);
    }
    self.geocode(&mut address).await?;
    Ok(self.store.update_provider_info(token, provider, address).await?)
  }

  pub async fn change_resource_info(
    &self,
    token: &str,
    id: i64,
    detail: ResourceDetail,
    mut address: Address,
  ) -> Result<()> {
    let token = Token::parse(token)?;
    detail.validate()?;
    self.geocode(&mut address).await?;
    Ok(self.store.update_resource_info(token, id, detail, address).await?)
  }

  /// Amount state machine; see [`CatalogStore::change_amount`] for the
  /// transition rules. Personnel have no amount dimension.
  pub async fn change_amount(
    &self,
    token: &str,
    kind: ResourceKind,
    id: i64,
    new_amount: i64,
    reason: String,
  ) -> Result<Option<ChangeLogEntry>> {
    let token = Token::parse(token)?;
    if kind == ResourceKind::Personal {
      return Err(Error::AmountNotApplicable);
    }
    Ok(
      self
        .store
        .change_amount(token, kind, id, new_amount, reason)
        .await?,
    )
  }

  /// Soft-delete a resource; always requires a reason.
  pub async fn mark_deleted(
    &self,
    token: &str,
    kind: ResourceKind,
    id: i64,
    reason: String,
  ) -> Result<ChangeLogEntry> {
    if reason.trim().is_empty() {
      return Err(Error::MissingReason);
    }
    let token = Token::parse(token)?;
    Ok(self.store.mark_deleted(token, kind, id, reason).await?)
  }

  /// The audit trail for one owned resource. Token-gated: the resource must
  /// belong to the presented token's offer.
  pub async fn change_log(
    &self,
    token: &str,
    kind: ResourceKind,
    id: i64,
  ) -> Result<Vec<ChangeLogEntry>> {
    let view = self.resolve_link(token).await?;
    let owned = view
      .resources
      .iter()
      .any(|r| r.id == id && r.detail.kind() == kind);
    if !owned {
      return Err(Error::ResourceNotFound(kind, id));
    }
    Ok(self.store.change_log(kind, id).await?)
  }

  // ── Demands ─────────────────────────────────────────────────────────────

  pub async fn insert_demand(&self, mut demand: NewDemand) -> Result<Demand> {
    for detail in &demand.resources {
      if detail.category().trim().is_empty() {
        return Err(Error::EmptyCategory);
      }
    }
    if let Some(address) = &mut demand.address
      && address.is_locatable()
    {
      let coordinates = self.geocoder.resolve(address).await?;
      address.coordinates = Some(coordinates);
    }
    Ok(self.store.insert_demand(demand).await?)
  }

  // ── Matching ────────────────────────────────────────────────────────────

  /// Find offered resources matching `query`. A located query only sees
  /// located candidates; an unlocated query ignores the location filter
  /// entirely rather than failing.
  pub async fn query_offers(&self, query: &ResourceQuery) -> Result<Vec<OfferMatch>> {
    let origin = self.query_origin(query).await?;
    let candidates = self.store.find_offered(query.filter()).await?;

    let mut matches = Vec::new();
    for candidate in candidates {
      let outcome = filter_by_location(
        origin,
        candidate.resource.address.coordinates,
        query.radius_km,
      );
      match outcome {
        LocationFilter::Excluded => {}
        LocationFilter::Unlocated => matches.push(OfferMatch {
          resource:    candidate.resource,
          provider:    candidate.provider,
          distance_km: None,
        }),
        LocationFilter::Within(d) => matches.push(OfferMatch {
          resource:    candidate.resource,
          provider:    candidate.provider,
          distance_km: Some(d),
        }),
      }
    }
    Ok(matches)
  }

  /// Find demanded resources matching `query` — the mirror image of
  /// [`Self::query_offers`] against the demand side of the catalog.
  pub async fn query_demands(&self, query: &ResourceQuery) -> Result<Vec<DemandMatch>> {
    let origin = self.query_origin(query).await?;
    let candidates = self.store.find_demanded(query.filter()).await?;

    let mut matches = Vec::new();
    for candidate in candidates {
      let coordinates = candidate.address.as_ref().and_then(|a| a.coordinates);
      match filter_by_location(origin, coordinates, query.radius_km) {
        LocationFilter::Excluded => {}
        LocationFilter::Unlocated => matches.push(DemandMatch {
          resource:    candidate.resource,
          demander:    candidate.demander,
          address:     candidate.address,
          distance_km: None,
        }),
        LocationFilter::Within(d) => matches.push(DemandMatch {
          resource:    candidate.resource,
          demander:    candidate.demander,
          address:     candidate.address,
          distance_km: Some(d),
        }),
      }
    }
    Ok(matches)
  }

  async fn query_origin(&self, query: &ResourceQuery) -> Result<Option<Coordinates>> {
    if query.category.trim().is_empty() {
      return Err(Error::EmptyCategory);
    }
    match query.location() {
      Some(address) => Ok(Some(self.geocoder.resolve(address).await?)),
      None => Ok(None),
    }
  }
}

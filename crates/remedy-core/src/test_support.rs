//! In-memory stand-ins for the store and the external collaborators, shared
//! by the service and notifier tests.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::{
  Error,
  address::{Address, Coordinates},
  changelog::ChangeLogEntry,
  demand::{Demand, NewDemand},
  geocode::{AddressResolutionError, Geocoder},
  identity::ProviderInfo,
  mail::{MailError, Mailer, ResourceGroup},
  offer::{NewOffer, Offer, OfferView},
  resource::{NewResource, Resource, ResourceDetail, ResourceKind},
  store::{CatalogStore, DemandCandidate, OfferCandidate, ResourceFilter},
  subscription::{NewRegionSubscription, RegionSubscription},
  token::Token,
};

/// Resolves every address to the same point.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PinnedGeocoder(pub Coordinates);

impl Geocoder for PinnedGeocoder {
  async fn resolve(
    &self,
    _address: &Address,
  ) -> Result<Coordinates, AddressResolutionError> {
    Ok(self.0)
  }
}

/// Records recipients; deliveries to `fail_for` bounce.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingMailer {
  pub sent:     Arc<Mutex<Vec<String>>>,
  pub fail_for: Option<String>,
}

impl RecordingMailer {
  pub fn recipients(&self) -> Vec<String> {
    self.sent.lock().unwrap().clone()
  }

  fn deliver(&self, prefix: &str, email: &str) -> Result<(), MailError> {
    if self.fail_for.as_deref() == Some(email) {
      return Err(MailError("smtp unavailable".into()));
    }
    self.sent.lock().unwrap().push(format!("{prefix}{email}"));
    Ok(())
  }
}

impl Mailer for RecordingMailer {
  async fn notify_new_offers(
    &self,
    subscription: &RegionSubscription,
    _resources: &ResourceGroup,
  ) -> Result<(), MailError> {
    self.deliver("", &subscription.email)
  }

  async fn confirm_subscription(
    &self,
    subscription: &RegionSubscription,
  ) -> Result<(), MailError> {
    self.deliver("confirm:", &subscription.email)
  }
}

/// A canned-data store: reads return the pre-seeded rows, `insert_offer`
/// echoes its input with synthetic ids, everything else is off-limits.
#[derive(Default)]
pub(crate) struct StubStore {
  pub offered:       Vec<OfferCandidate>,
  pub demanded:      Vec<DemandCandidate>,
  pub recent:        Vec<Resource>,
  pub subscriptions: Mutex<Vec<RegionSubscription>>,
}

impl CatalogStore for StubStore {
  type Error = Error;

  async fn insert_offer(&self, offer: NewOffer) -> Result<OfferView, Error> {
    let resources = offer
      .resources
      .iter()
      .enumerate()
      .map(|(i, r)| Resource {
        id:         i as i64 + 1,
        offer_id:   1,
        detail:     r.detail.clone(),
        address:    r.address.clone(),
        is_deleted: false,
      })
      .collect();
    Ok(OfferView {
      offer: Offer {
        id:         1,
        provider:   offer.provider,
        address:    offer.address,
        token:      Token::generate(),
        created_at: Utc::now(),
      },
      resources,
    })
  }

  async fn resolve_link(&self, _token: Token) -> Result<OfferView, Error> {
    unimplemented!()
  }

  async fn delete_offer(&self, _token: Token) -> Result<(), Error> {
    unimplemented!()
  }

  async fn get_resource(
    &self,
    _kind: ResourceKind,
    _id: i64,
  ) -> Result<Option<Resource>, Error> {
    unimplemented!()
  }

  async fn add_resource(
    &self,
    _token: Token,
    _resource: NewResource,
  ) -> Result<Resource, Error> {
    unimplemented!()
  }

  async fn update_provider_info(
    &self,
    _token: Token,
    _provider: ProviderInfo,
    _address: Address,
  ) -> Result<(), Error> {
    unimplemented!()
  }

  async fn update_resource_info(
    &self,
    _token: Token,
    _id: i64,
    _detail: ResourceDetail,
    _address: Address,
  ) -> Result<(), Error> {
    unimplemented!()
  }

  async fn change_amount(
    &self,
    _token: Token,
    _kind: ResourceKind,
    _id: i64,
    _new_amount: i64,
    _reason: String,
  ) -> Result<Option<ChangeLogEntry>, Error> {
    unimplemented!()
  }

  async fn mark_deleted(
    &self,
    _token: Token,
    _kind: ResourceKind,
    _id: i64,
    _reason: String,
  ) -> Result<ChangeLogEntry, Error> {
    unimplemented!()
  }

  async fn change_log(
    &self,
    _kind: ResourceKind,
    _id: i64,
  ) -> Result<Vec<ChangeLogEntry>, Error> {
    unimplemented!()
  }

  async fn insert_demand(&self, _demand: NewDemand) -> Result<Demand, Error> {
    unimplemented!()
  }

  async fn find_offered(
    &self,
    _filter: ResourceFilter,
  ) -> Result<Vec<OfferCandidate>, Error> {
    Ok(self.offered.clone())
  }

  async fn find_demanded(
    &self,
    _filter: ResourceFilter,
  ) -> Result<Vec<DemandCandidate>, Error> {
    Ok(self.demanded.clone())
  }

  async fn insert_subscription(
    &self,
    subscription: NewRegionSubscription,
    coordinates: Coordinates,
  ) -> Result<RegionSubscription, Error> {
    let stored = RegionSubscription {
      id: 1,
      name: subscription.name,
      email: subscription.email,
      postalcode: subscription.postalcode,
      coordinates,
      active: true,
    };
    self.subscriptions.lock().unwrap().push(stored.clone());
    Ok(stored)
  }

  async fn active_subscriptions(&self) -> Result<Vec<RegionSubscription>, Error> {
    Ok(self.subscriptions.lock().unwrap().clone())
  }

  async fn offered_since(
    &self,
    _cutoff: DateTime<Utc>,
  ) -> Result<Vec<Resource>, Error> {
    Ok(self.recent.clone())
  }
}

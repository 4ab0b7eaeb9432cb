//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use remedy_core::{
  address::{Address, Coordinates},
  changelog::ChangeType,
  demand::{DemandDetail, NewDemand},
  geocode::{AddressResolutionError, Geocoder},
  identity::{DemanderInfo, ProviderInfo},
  matching::ResourceQuery,
  offer::NewOffer,
  resource::{
    Consumable, Device, NewResource, Personnel, ResourceDetail, ResourceKind,
  },
  service::CatalogService,
  store::{CatalogStore, ResourceFilter},
  subscription::NewRegionSubscription,
  token::{TOKEN_LENGTH, Token},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn munich() -> Address {
  Address {
    street:      "Marchioninistr. 15".into(),
    city:        "München".into(),
    postalcode:  "81377".into(),
    country:     "DE".into(),
    coordinates: Some(Coordinates { latitude: 48.11, longitude: 11.47 }),
  }
}

fn provider() -> ProviderInfo {
  ProviderInfo {
    name:         "Erika Mustermann".into(),
    organisation: "Klinikum Großhadern".into(),
    phone:        "+49 89 0000".into(),
    mail:         "erika@example.com".into(),
    is_public:    true,
  }
}

fn masks(amount: i64) -> NewResource {
  NewResource {
    detail:  ResourceDetail::Consumable(Consumable {
      category: "MASKE".into(),
      name: "FFP2".into(),
      manufacturer: "Acme".into(),
      amount,
      ..Default::default()
    }),
    address: munich(),
  }
}

fn cycler() -> NewResource {
  NewResource {
    detail:  ResourceDetail::Device(Device {
      category: "PCR_THERMOCYCLER".into(),
      name: "LightCycler".into(),
      amount: 2,
      ..Default::default()
    }),
    address: munich(),
  }
}

fn technician() -> NewResource {
  NewResource {
    detail:  ResourceDetail::Personal(Personnel {
      category: "STAFF".into(),
      qualification: "MTLA".into(),
      area: "PCR-Analytik".into(),
      experience_rt_pcr: true,
      ..Default::default()
    }),
    address: munich(),
  }
}

fn offer_with(resources: Vec<NewResource>) -> NewOffer {
  NewOffer { provider: provider(), address: munich(), resources }
}

fn filter(kind: ResourceKind, category: &str) -> ResourceFilter {
  ResourceFilter {
    kind,
    category: category.into(),
    name: None,
    manufacturer: None,
    min_amount: None,
    qualification: None,
    area: None,
    experience_rt_pcr: None,
  }
}

// ─── Offers ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_offer_issues_well_formed_token() {
  let s = store().await;

  let view = s.insert_offer(offer_with(vec![masks(100)])).await.unwrap();
  let token = view.offer.token.as_str();
  assert_eq!(token.len(), TOKEN_LENGTH);
  assert!(token.bytes().all(|b| b.is_ascii_alphanumeric()));
  assert_eq!(view.resources.len(), 1);
  assert!(view.resources[0].id > 0);
}

#[tokio::test]
async fn resolve_link_returns_full_view() {
  let s = store().await;
  let inserted = s
    .insert_offer(offer_with(vec![masks(100), cycler(), technician()]))
    .await
    .unwrap();

  let view = s.resolve_link(inserted.offer.token.clone()).await.unwrap();
  assert_eq!(view.offer.id, inserted.offer.id);
  assert_eq!(view.offer.provider, provider());
  assert_eq!(view.offer.address, munich());
  assert_eq!(view.resources.len(), 3);
}

#[tokio::test]
async fn failing_child_insert_leaves_no_offer_behind() {
  let s = store().await;
  // Make the device insert fail mid-bundle.
  s.execute_batch("DROP TABLE device").await.unwrap();

  let err = s
    .insert_offer(offer_with(vec![masks(10), cycler()]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Database(_)));

  // The whole bundle must have rolled back, the consumable and both
  // addresses included.
  assert_eq!(s.query_i64("SELECT COUNT(*) FROM offer").await.unwrap(), 0);
  assert_eq!(s.query_i64("SELECT COUNT(*) FROM consumable").await.unwrap(), 0);
  assert_eq!(s.query_i64("SELECT COUNT(*) FROM address").await.unwrap(), 0);
}

#[tokio::test]
async fn resolve_link_unknown_token_fails() {
  let s = store().await;
  let err = s.resolve_link(Token::generate()).await.unwrap_err();
  assert!(matches!(err, Error::Core(remedy_core::Error::OfferNotFound)));
}

#[tokio::test]
async fn delete_offer_removes_everything() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let token = view.offer.token.clone();
  let resource_id = view.resources[0].id;

  s.delete_offer(token.clone()).await.unwrap();

  let err = s.resolve_link(token).await.unwrap_err();
  assert!(matches!(err, Error::Core(remedy_core::Error::OfferNotFound)));
  let gone = s
    .get_resource(ResourceKind::Consumable, resource_id)
    .await
    .unwrap();
  assert!(gone.is_none());
}

#[tokio::test]
async fn add_resource_appears_in_view() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let token = view.offer.token.clone();

  let added = s.add_resource(token.clone(), cycler()).await.unwrap();
  assert_eq!(added.offer_id, view.offer.id);

  let view = s.resolve_link(token).await.unwrap();
  assert_eq!(view.resources.len(), 2);
}

#[tokio::test]
async fn mutation_with_foreign_token_fails() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let id = view.resources[0].id;

  let err = s
    .change_amount(Token::generate(), ResourceKind::Consumable, id, 20, String::new())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(remedy_core::Error::OfferNotFound)));
}

// ─── Amount state machine ────────────────────────────────────────────────────

#[tokio::test]
async fn increase_needs_no_reason_and_is_logged() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let token = view.offer.token.clone();
  let id = view.resources[0].id;

  let entry = s
    .change_amount(token, ResourceKind::Consumable, id, 25, String::new())
    .await
    .unwrap()
    .expect("an entry is logged");
  assert_eq!(entry.change_type, ChangeType::IncreaseAmount);
  assert_eq!(entry.diff_amount, 15);

  let resource = s
    .get_resource(ResourceKind::Consumable, id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(resource.detail.amount(), 25);

  let log = s.change_log(ResourceKind::Consumable, id).await.unwrap();
  assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn equal_amount_is_a_silent_noop() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let token = view.offer.token.clone();
  let id = view.resources[0].id;

  let entry = s
    .change_amount(token, ResourceKind::Consumable, id, 10, String::new())
    .await
    .unwrap();
  assert!(entry.is_none());

  let log = s.change_log(ResourceKind::Consumable, id).await.unwrap();
  assert!(log.is_empty());
}

#[tokio::test]
async fn decrease_without_reason_is_rejected() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let token = view.offer.token.clone();
  let id = view.resources[0].id;

  let err = s
    .change_amount(token, ResourceKind::Consumable, id, 5, "  ".into())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(remedy_core::Error::MissingReason)));

  // The amount must be untouched.
  let resource = s
    .get_resource(ResourceKind::Consumable, id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(resource.detail.amount(), 10);
}

#[tokio::test]
async fn decrease_to_zero_is_rejected() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let token = view.offer.token.clone();
  let id = view.resources[0].id;

  let err = s
    .change_amount(token, ResourceKind::Consumable, id, 0, "used up".into())
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(remedy_core::Error::InvalidAmount(0))
  ));
}

#[tokio::test]
async fn decrease_with_reason_is_logged() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let token = view.offer.token.clone();
  let id = view.resources[0].id;

  let entry = s
    .change_amount(token, ResourceKind::Consumable, id, 4, "handed out".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(entry.change_type, ChangeType::DecreaseAmount);
  assert_eq!(entry.diff_amount, 6);
  assert_eq!(entry.reason, "handed out");
}

#[tokio::test]
async fn personnel_amount_change_is_rejected() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![technician()])).await.unwrap();
  let token = view.offer.token.clone();
  let id = view.resources[0].id;

  let err = s
    .change_amount(token, ResourceKind::Personal, id, 2, String::new())
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(remedy_core::Error::AmountNotApplicable)
  ));
}

// ─── Soft delete ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn mark_deleted_hides_from_matching_but_keeps_the_row() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let token = view.offer.token.clone();
  let id = view.resources[0].id;

  let entry = s
    .mark_deleted(token, ResourceKind::Consumable, id, "no longer offered".into())
    .await
    .unwrap();
  assert_eq!(entry.change_type, ChangeType::DeleteResource);
  assert_eq!(entry.diff_amount, 10);

  let candidates = s
    .find_offered(filter(ResourceKind::Consumable, "MASKE"))
    .await
    .unwrap();
  assert!(candidates.is_empty());

  let resource = s
    .get_resource(ResourceKind::Consumable, id)
    .await
    .unwrap()
    .unwrap();
  assert!(resource.is_deleted);
}

#[tokio::test]
async fn mark_deleted_requires_reason() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let token = view.offer.token.clone();
  let id = view.resources[0].id;

  let err = s
    .mark_deleted(token, ResourceKind::Consumable, id, String::new())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(remedy_core::Error::MissingReason)));
}

#[tokio::test]
async fn soft_delete_without_an_address_row_aborts_unchanged() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let token = view.offer.token.clone();
  let id = view.resources[0].id;

  // Sever the resource's address row underneath it.
  s.execute_batch(
    "PRAGMA foreign_keys = OFF;
     DELETE FROM address WHERE id = (SELECT address_id FROM consumable)",
  )
  .await
  .unwrap();

  let err = s
    .mark_deleted(token, ResourceKind::Consumable, id, "cleanup".into())
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(remedy_core::Error::InvalidState(_))
  ));

  // The resource-side is_deleted update must not have committed, and no
  // DELETE_RESOURCE entry may exist.
  assert_eq!(
    s.query_i64("SELECT is_deleted FROM consumable").await.unwrap(),
    0
  );
  assert_eq!(
    s.query_i64("SELECT COUNT(*) FROM change_log").await.unwrap(),
    0
  );
}

#[tokio::test]
async fn deleted_resource_cannot_be_mutated() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let token = view.offer.token.clone();
  let id = view.resources[0].id;

  s.mark_deleted(token.clone(), ResourceKind::Consumable, id, "gone".into())
    .await
    .unwrap();

  let err = s
    .change_amount(token, ResourceKind::Consumable, id, 20, String::new())
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(remedy_core::Error::ResourceNotFound(ResourceKind::Consumable, _))
  ));
}

// ─── Info updates ────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_provider_info_roundtrips() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let token = view.offer.token.clone();

  let new_provider = ProviderInfo {
    name: "Max Mustermann".into(),
    organisation: "LMU".into(),
    phone: String::new(),
    mail: "max@example.com".into(),
    is_public: false,
  };
  let mut new_address = munich();
  new_address.street = "Feodor-Lynen-Str. 21".into();

  s.update_provider_info(token.clone(), new_provider.clone(), new_address.clone())
    .await
    .unwrap();

  let view = s.resolve_link(token).await.unwrap();
  assert_eq!(view.offer.provider, new_provider);
  assert_eq!(view.offer.address, new_address);
}

#[tokio::test]
async fn update_resource_info_never_touches_amount() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10)])).await.unwrap();
  let token = view.offer.token.clone();
  let id = view.resources[0].id;

  let detail = ResourceDetail::Consumable(Consumable {
    category: "IGNORED".into(),
    name: "FFP3".into(),
    manufacturer: "Acme".into(),
    amount: 999,
    ..Default::default()
  });
  s.update_resource_info(token, id, detail, munich()).await.unwrap();

  let resource = s
    .get_resource(ResourceKind::Consumable, id)
    .await
    .unwrap()
    .unwrap();
  let ResourceDetail::Consumable(c) = &resource.detail else {
    panic!("kind changed");
  };
  assert_eq!(c.name, "FFP3");
  assert_eq!(c.amount, 10, "amount is only changed through change_amount");
  assert_eq!(c.category, "MASKE", "category is immutable");
}

// ─── Matching reads ──────────────────────────────────────────────────────────

#[tokio::test]
async fn find_offered_filters_attributes() {
  let s = store().await;
  s.insert_offer(offer_with(vec![masks(10), cycler()])).await.unwrap();
  s.insert_offer(offer_with(vec![masks(3)])).await.unwrap();

  // Category is mandatory and exact.
  let all = s
    .find_offered(filter(ResourceKind::Consumable, "MASKE"))
    .await
    .unwrap();
  assert_eq!(all.len(), 2);
  assert!(all.iter().all(|c| c.provider == provider()));

  let none = s
    .find_offered(filter(ResourceKind::Consumable, "maske"))
    .await
    .unwrap();
  assert!(none.is_empty());

  // A minimum amount excludes the smaller stock.
  let mut big = filter(ResourceKind::Consumable, "MASKE");
  big.min_amount = Some(5);
  assert_eq!(s.find_offered(big).await.unwrap().len(), 1);

  // Name is exact when present.
  let mut named = filter(ResourceKind::Device, "PCR_THERMOCYCLER");
  named.name = Some("LightCycler".into());
  assert_eq!(s.find_offered(named).await.unwrap().len(), 1);

  let mut other = filter(ResourceKind::Device, "PCR_THERMOCYCLER");
  other.name = Some("OtherCycler".into());
  assert!(s.find_offered(other).await.unwrap().is_empty());
}

#[tokio::test]
async fn find_offered_personnel_filters() {
  let s = store().await;
  s.insert_offer(offer_with(vec![technician()])).await.unwrap();

  let mut q = filter(ResourceKind::Personal, "STAFF");
  q.qualification = Some("MTLA".into());
  q.experience_rt_pcr = Some(true);
  assert_eq!(s.find_offered(q).await.unwrap().len(), 1);

  let mut q = filter(ResourceKind::Personal, "STAFF");
  q.experience_rt_pcr = Some(false);
  assert!(s.find_offered(q).await.unwrap().is_empty());
}

#[tokio::test]
async fn insert_demand_and_find_demanded() {
  let s = store().await;
  let demand = NewDemand {
    demander:  DemanderInfo {
      institution: "Uniklinik".into(),
      name:        "Dr. Beispiel".into(),
      mail:        "lab@example.com".into(),
      phone:       String::new(),
    },
    address:   Some(munich()),
    resources: vec![DemandDetail::Consumable(Consumable {
      category: "MASKE".into(),
      amount: 50,
      ..Default::default()
    })],
  };

  let stored = s.insert_demand(demand).await.unwrap();
  assert!(stored.token.is_some());

  let candidates = s
    .find_demanded(filter(ResourceKind::Consumable, "MASKE"))
    .await
    .unwrap();
  assert_eq!(candidates.len(), 1);
  assert_eq!(candidates[0].demander.institution, "Uniklinik");
  assert_eq!(candidates[0].address, Some(munich()));
}

#[tokio::test]
async fn unlocated_demand_has_no_address() {
  let s = store().await;
  let demand = NewDemand {
    demander:  DemanderInfo::default(),
    address:   None,
    resources: vec![DemandDetail::Device(Device {
      category: "ZENTRIFUGE".into(),
      amount: 1,
      ..Default::default()
    })],
  };
  s.insert_demand(demand).await.unwrap();

  let candidates = s
    .find_demanded(filter(ResourceKind::Device, "ZENTRIFUGE"))
    .await
    .unwrap();
  assert_eq!(candidates.len(), 1);
  assert!(candidates[0].address.is_none());
}

#[tokio::test]
async fn find_demanded_personnel_is_empty() {
  let s = store().await;
  let candidates = s
    .find_demanded(filter(ResourceKind::Personal, "STAFF"))
    .await
    .unwrap();
  assert!(candidates.is_empty());
}

// ─── Subscriptions & notifier feeds ──────────────────────────────────────────

#[tokio::test]
async fn subscriptions_roundtrip() {
  let s = store().await;
  let coordinates = Coordinates { latitude: 48.137, longitude: 11.575 };

  let stored = s
    .insert_subscription(
      NewRegionSubscription {
        name:       "Lab Watch".into(),
        email:      "watch@example.com".into(),
        postalcode: "80331".into(),
        country:    "DE".into(),
      },
      coordinates,
    )
    .await
    .unwrap();
  assert!(stored.active);

  let active = s.active_subscriptions().await.unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].postalcode, "80331");
  assert_eq!(active[0].coordinates, coordinates);
}

#[tokio::test]
async fn offered_since_sees_recent_live_resources_only() {
  let s = store().await;
  let view = s.insert_offer(offer_with(vec![masks(10), cycler()])).await.unwrap();

  let recent = s.offered_since(Utc::now() - Duration::hours(1)).await.unwrap();
  assert_eq!(recent.len(), 2);

  let future = s.offered_since(Utc::now() + Duration::hours(1)).await.unwrap();
  assert!(future.is_empty());

  s.mark_deleted(
    view.offer.token.clone(),
    ResourceKind::Consumable,
    view.resources[0].id,
    "withdrawn".into(),
  )
  .await
  .unwrap();

  let remaining = s.offered_since(Utc::now() - Duration::hours(1)).await.unwrap();
  assert_eq!(remaining.len(), 1);
  assert_eq!(remaining[0].detail.kind(), ResourceKind::Device);
}

// ─── Through the service ─────────────────────────────────────────────────────

/// Resolves every address to the same point.
struct PinnedGeocoder(Coordinates);

impl Geocoder for PinnedGeocoder {
  async fn resolve(
    &self,
    _address: &Address,
  ) -> std::result::Result<Coordinates, AddressResolutionError> {
    Ok(self.0)
  }
}

async fn service() -> CatalogService<SqliteStore, PinnedGeocoder> {
  let origin = Coordinates { latitude: 48.11, longitude: 11.47 };
  CatalogService::new(store().await, PinnedGeocoder(origin))
}

fn located_query(kind: ResourceKind, category: &str) -> ResourceQuery {
  ResourceQuery {
    kind,
    category: category.into(),
    name: None,
    manufacturer: None,
    amount: None,
    qualification: None,
    area: None,
    experience_rt_pcr: None,
    address: Some(munich()),
    radius_km: 0,
  }
}

#[tokio::test]
async fn service_round_trips_every_kind() {
  let service = service().await;
  let view = service
    .insert_offer(offer_with(vec![masks(10), cycler(), technician()]))
    .await
    .unwrap();
  let token = view.offer.token.as_str().to_owned();

  let kinds = [
    (ResourceKind::Consumable, "MASKE"),
    (ResourceKind::Device, "PCR_THERMOCYCLER"),
    (ResourceKind::Personal, "STAFF"),
  ];
  for (kind, category) in kinds {
    let matches = service
      .query_offers(&located_query(kind, category))
      .await
      .unwrap();
    assert_eq!(matches.len(), 1, "{kind:?}");
    // Query origin and candidates were geocoded to the same point.
    assert_eq!(matches[0].distance_km, Some(0), "{kind:?}");
    assert_eq!(matches[0].provider, provider(), "{kind:?}");
  }

  service.delete_offer(&token).await.unwrap();
  for (kind, category) in kinds {
    let matches = service
      .query_offers(&located_query(kind, category))
      .await
      .unwrap();
    assert!(matches.is_empty(), "{kind:?}");
  }
}

#[tokio::test]
async fn service_rejects_malformed_tokens_without_a_lookup() {
  let service = service().await;
  let err = service.resolve_link("not-a-token").await.unwrap_err();
  assert!(matches!(err, remedy_core::Error::InvalidToken));

  let unknown = Token::generate();
  let err = service.resolve_link(unknown.as_str()).await.unwrap_err();
  assert!(matches!(err, remedy_core::Error::OfferNotFound));
}

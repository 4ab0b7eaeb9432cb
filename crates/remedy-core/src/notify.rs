//! Subscription intake and the periodic notification batch.
//!
//! The batch job groups active subscriptions by postal code, collects the
//! resources offered within the trailing window, and hands every non-empty
//! group to the mail collaborator. An individual delivery failure is logged
//! and skipped; it never blocks the rest of the batch.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::{
  Error, Result,
  address::Address,
  geo::distance_km,
  geocode::Geocoder,
  mail::{Mailer, ResourceGroup},
  resource::{Resource, ResourceDetail},
  store::CatalogStore,
  subscription::{NewRegionSubscription, RegionSubscription},
};

/// Tunables for the batch job. The legacy system hard-coded both values.
#[derive(Debug, Clone, Copy)]
pub struct NotifierConfig {
  /// A resource is assigned to a postal-code group when it lies within this
  /// many kilometers of the group's coordinates.
  pub max_distance_km: f64,
  /// How far back the batch looks for newly-created offers.
  pub window_hours: i64,
}

impl Default for NotifierConfig {
  fn default() -> Self {
    Self { max_distance_km: 50.0, window_hours: 24 }
  }
}

pub struct SubscriptionNotifier<S, G, M> {
  store:    S,
  geocoder: G,
  mailer:   M,
  config:   NotifierConfig,
}

impl<S, G, M> SubscriptionNotifier<S, G, M>
where
  S: CatalogStore,
  Error: From<S::Error>,
  G: Geocoder,
  M: Mailer,
{
  pub fn new(store: S, geocoder: G, mailer: M, config: NotifierConfig) -> Self {
    Self { store, geocoder, mailer, config }
  }

  /// Create a standing subscription for a postal region. The postal code is
  /// geocoded immediately; the confirmation mail is best-effort.
  pub async fn subscribe(
    &self,
    subscription: NewRegionSubscription,
  ) -> Result<RegionSubscription> {
    if !subscription.email.contains('@') {
      return Err(Error::InvalidMail);
    }

    let address = Address {
      postalcode: subscription.postalcode.clone(),
      country: subscription.country.clone(),
      ..Default::default()
    };
    let coordinates = self.geocoder.resolve(&address).await?;

    let stored = self.store.insert_subscription(subscription, coordinates).await?;

    if let Err(e) = self.mailer.confirm_subscription(&stored).await {
      warn!(email = %stored.email, error = %e, "confirmation mail failed");
    }
    Ok(stored)
  }

  /// One batch run. Returns the number of notification mails sent.
  pub async fn run_once(&self) -> Result<usize> {
    let subscriptions = self.store.active_subscriptions().await?;
    if subscriptions.is_empty() {
      return Ok(0);
    }

    let cutoff = Utc::now() - Duration::hours(self.config.window_hours);
    let recent = self.store.offered_since(cutoff).await?;

    let groups =
      group_by_postalcode(&subscriptions, &recent, self.config.max_distance_km);

    let mut sent = 0;
    for subscription in &subscriptions {
      let Some(group) = groups.get(&subscription.postalcode) else {
        continue;
      };
      if group.is_empty() {
        continue;
      }
      match self.mailer.notify_new_offers(subscription, group).await {
        Ok(()) => sent += 1,
        Err(e) => {
          warn!(email = %subscription.email, error = %e, "notification mail failed, skipping");
        }
      }
    }

    info!(subscriptions = subscriptions.len(), mails = sent, "notification batch done");
    Ok(sent)
  }
}

/// Group recently-offered resources under each subscribed postal code.
///
/// Subscriptions sharing a postal code share one group; its coordinates are
/// taken from the first subscription seen for that code. Resources without
/// coordinates are never assigned.
pub fn group_by_postalcode(
  subscriptions: &[RegionSubscription],
  resources: &[Resource],
  max_distance_km: f64,
) -> HashMap<String, ResourceGroup> {
  let mut anchors = HashMap::new();
  for subscription in subscriptions {
    anchors
      .entry(subscription.postalcode.as_str())
      .or_insert(subscription.coordinates);
  }

  let mut groups: HashMap<String, ResourceGroup> = HashMap::new();
  for (postalcode, anchor) in anchors {
    let group = groups.entry(postalcode.to_owned()).or_default();
    for resource in resources {
      let Some(location) = resource.address.coordinates else {
        continue;
      };
      if distance_km(location, anchor) > max_distance_km {
        continue;
      }
      match &resource.detail {
        ResourceDetail::Consumable(c) => group.consumables.push(c.clone()),
        ResourceDetail::Device(d) => group.devices.push(d.clone()),
        ResourceDetail::Personal(p) => group.personnel.push(p.clone()),
      }
    }
  }

  groups
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::{
    address::Coordinates,
    resource::{Consumable, Device},
    test_support::{PinnedGeocoder, RecordingMailer, StubStore},
  };

  fn subscription(id: i64, postalcode: &str, lat: f64, lon: f64) -> RegionSubscription {
    RegionSubscription {
      id,
      name: format!("sub-{id}"),
      email: format!("sub-{id}@example.com"),
      postalcode: postalcode.into(),
      coordinates: Coordinates { latitude: lat, longitude: lon },
      active: true,
    }
  }

  fn offered(id: i64, detail: ResourceDetail, lat: f64, lon: f64) -> Resource {
    Resource {
      id,
      offer_id: 1,
      detail,
      address: Address {
        coordinates: Some(Coordinates { latitude: lat, longitude: lon }),
        ..Default::default()
      },
      is_deleted: false,
    }
  }

  fn mask(amount: i64) -> ResourceDetail {
    ResourceDetail::Consumable(Consumable {
      category: "MASK".into(),
      amount,
      ..Default::default()
    })
  }

  #[test]
  fn nearby_resource_lands_in_group() {
    let subs = vec![subscription(1, "80331", 48.137, 11.575)];
    // ~0.4 km away
    let resources = vec![offered(1, mask(100), 48.14, 11.58)];

    let groups = group_by_postalcode(&subs, &resources, 50.0);
    assert_eq!(groups["80331"].consumables.len(), 1);
  }

  #[test]
  fn distant_resource_is_left_out() {
    let subs = vec![subscription(1, "80331", 48.137, 11.575)];
    // Berlin, ~500 km from Munich
    let resources = vec![offered(1, mask(100), 52.518, 13.408)];

    let groups = group_by_postalcode(&subs, &resources, 50.0);
    assert!(groups["80331"].is_empty());
  }

  #[test]
  fn resource_without_coordinates_is_never_assigned() {
    let subs = vec![subscription(1, "80331", 48.137, 11.575)];
    let mut resource = offered(1, mask(10), 48.137, 11.575);
    resource.address.coordinates = None;

    let groups = group_by_postalcode(&subs, &[resource], 50.0);
    assert!(groups["80331"].is_empty());
  }

  #[test]
  fn shared_postalcode_yields_one_group() {
    let subs = vec![
      subscription(1, "80331", 48.137, 11.575),
      subscription(2, "80331", 48.137, 11.575),
    ];
    let resources = vec![offered(
      1,
      ResourceDetail::Device(Device {
        category: "PCR".into(),
        amount: 1,
        ..Default::default()
      }),
      48.14,
      11.58,
    )];

    let groups = group_by_postalcode(&subs, &resources, 50.0);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups["80331"].devices.len(), 1);
  }

  #[test]
  fn one_resource_can_serve_several_regions() {
    let subs = vec![
      subscription(1, "80331", 48.137, 11.575),
      subscription(2, "85354", 48.402, 11.741), // Freising, ~32 km away
    ];
    let resources = vec![offered(1, mask(5), 48.137, 11.575)];

    let groups = group_by_postalcode(&subs, &resources, 50.0);
    assert_eq!(groups["80331"].consumables.len(), 1);
    assert_eq!(groups["85354"].consumables.len(), 1);
  }

  // ── Batch & intake ──────────────────────────────────────────────────────

  fn notifier(
    subscriptions: Vec<RegionSubscription>,
    recent: Vec<Resource>,
    mailer: RecordingMailer,
  ) -> SubscriptionNotifier<StubStore, PinnedGeocoder, RecordingMailer> {
    let store = StubStore {
      recent,
      subscriptions: Mutex::new(subscriptions),
      ..Default::default()
    };
    SubscriptionNotifier::new(
      store,
      PinnedGeocoder(Coordinates { latitude: 48.137, longitude: 11.575 }),
      mailer,
      NotifierConfig::default(),
    )
  }

  #[tokio::test]
  async fn run_once_mails_only_subscribers_with_nearby_offers() {
    let subs = vec![
      subscription(1, "80331", 48.137, 11.575),
      subscription(2, "10115", 52.518, 13.408), // Berlin, far out of range
    ];
    let recent = vec![offered(1, mask(100), 48.14, 11.58)];
    let mailer = RecordingMailer::default();

    let n = notifier(subs, recent, mailer.clone());
    assert_eq!(n.run_once().await.unwrap(), 1);
    assert_eq!(mailer.recipients(), vec!["sub-1@example.com".to_string()]);
  }

  #[tokio::test]
  async fn run_once_skips_a_failed_delivery_and_carries_on() {
    let subs = vec![
      subscription(1, "80331", 48.137, 11.575),
      subscription(2, "85354", 48.402, 11.741),
    ];
    let recent = vec![offered(1, mask(100), 48.137, 11.575)];
    let mailer = RecordingMailer {
      fail_for: Some("sub-1@example.com".into()),
      ..Default::default()
    };

    let n = notifier(subs, recent, mailer.clone());
    assert_eq!(n.run_once().await.unwrap(), 1);
    assert_eq!(mailer.recipients(), vec!["sub-2@example.com".to_string()]);
  }

  #[tokio::test]
  async fn subscribe_geocodes_stores_and_confirms() {
    let mailer = RecordingMailer::default();
    let n = notifier(Vec::new(), Vec::new(), mailer.clone());

    let stored = n
      .subscribe(NewRegionSubscription {
        name:       "Lab Watch".into(),
        email:      "watch@example.com".into(),
        postalcode: "80331".into(),
        country:    "DE".into(),
      })
      .await
      .unwrap();

    assert!(stored.active);
    assert_eq!(
      stored.coordinates,
      Coordinates { latitude: 48.137, longitude: 11.575 }
    );
    assert_eq!(
      mailer.recipients(),
      vec!["confirm:watch@example.com".to_string()]
    );
  }

  #[tokio::test]
  async fn subscribe_rejects_a_malformed_mail_address() {
    let mailer = RecordingMailer::default();
    let n = notifier(Vec::new(), Vec::new(), mailer.clone());

    let err = n
      .subscribe(NewRegionSubscription {
        name:       "Lab Watch".into(),
        email:      "not-a-mail".into(),
        postalcode: "80331".into(),
        country:    "DE".into(),
      })
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidMail));
    assert!(mailer.recipients().is_empty());
  }

  #[tokio::test]
  async fn subscribe_survives_a_failed_confirmation() {
    let mailer = RecordingMailer {
      fail_for: Some("watch@example.com".into()),
      ..Default::default()
    };
    let n = notifier(Vec::new(), Vec::new(), mailer.clone());

    let stored = n
      .subscribe(NewRegionSubscription {
        name:       "Lab Watch".into(),
        email:      "watch@example.com".into(),
        postalcode: "80331".into(),
        country:    "DE".into(),
      })
      .await
      .unwrap();
    assert!(stored.active);
  }
}

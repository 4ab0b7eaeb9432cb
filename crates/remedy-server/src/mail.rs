//! Mail delivery.
//!
//! No SMTP integration is wired up yet; [`LogMailer`] records what would be
//! sent so deployments can verify notifier behaviour before configuring a
//! real provider.

use std::future::Future;

use remedy_core::{
  mail::{MailError, Mailer, ResourceGroup},
  subscription::RegionSubscription,
};
use tracing::info;

#[derive(Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
  fn notify_new_offers<'a>(
    &'a self,
    subscription: &'a RegionSubscription,
    resources: &'a ResourceGroup,
  ) -> impl Future<Output = Result<(), MailError>> + Send + 'a {
    async move {
      info!(
        email = %subscription.email,
        postalcode = %subscription.postalcode,
        consumables = resources.consumables.len(),
        devices = resources.devices.len(),
        personnel = resources.personnel.len(),
        "notification mail",
      );
      Ok(())
    }
  }

  fn confirm_subscription<'a>(
    &'a self,
    subscription: &'a RegionSubscription,
  ) -> impl Future<Output = Result<(), MailError>> + Send + 'a {
    async move {
      info!(
        email = %subscription.email,
        postalcode = %subscription.postalcode,
        "subscription confirmation mail",
      );
      Ok(())
    }
  }
}

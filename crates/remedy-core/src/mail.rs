//! The outbound mail boundary.
//!
//! Mail is one-way and fire-and-forget from the core's perspective: failures
//! are reported so callers can log them, but they never block or roll back
//! catalog state.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  resource::{Consumable, Device, Personnel},
  subscription::RegionSubscription,
};

#[derive(Debug, Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// The per-kind bundle of resources handed to one notification mail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceGroup {
  pub consumables: Vec<Consumable>,
  pub devices:     Vec<Device>,
  pub personnel:   Vec<Personnel>,
}

impl ResourceGroup {
  pub fn is_empty(&self) -> bool {
    self.consumables.is_empty() && self.devices.is_empty() && self.personnel.is_empty()
  }

  pub fn len(&self) -> usize {
    self.consumables.len() + self.devices.len() + self.personnel.len()
  }
}

/// Outbound mail collaborator.
pub trait Mailer: Send + Sync {
  /// Tell a subscriber about resources newly offered near them.
  fn notify_new_offers<'a>(
    &'a self,
    subscription: &'a RegionSubscription,
    resources: &'a ResourceGroup,
  ) -> impl Future<Output = Result<(), MailError>> + Send + 'a;

  /// Confirm a freshly-created subscription.
  fn confirm_subscription<'a>(
    &'a self,
    subscription: &'a RegionSubscription,
  ) -> impl Future<Output = Result<(), MailError>> + Send + 'a;
}

//! Provider and demander identities.
//!
//! Both are embedded values on their owning offer/demand record, not
//! independently addressable entities.

use serde::{Deserialize, Serialize};

/// Contact identity of a party offering resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
  pub name:         String,
  pub organisation: String,
  #[serde(default)]
  pub phone:        String,
  pub mail:         String,
  /// Whether the provider consented to their contact data being shown in
  /// match results.
  #[serde(default)]
  pub is_public:    bool,
}

impl ProviderInfo {
  pub fn is_complete(&self) -> bool {
    !self.name.is_empty() && !self.organisation.is_empty() && !self.mail.is_empty()
  }
}

/// Contact identity of a party demanding resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemanderInfo {
  pub institution: String,
  pub name:        String,
  pub mail:        String,
  #[serde(default)]
  pub phone:       String,
}

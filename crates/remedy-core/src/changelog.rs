//! The immutable change log.
//!
//! One entry is appended per applied mutation, in the same transaction as the
//! state change itself. Entries are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resource::ResourceKind;

/// What a mutation did to a resource. The string forms are the values stored
/// in the `change_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
  IncreaseAmount,
  DecreaseAmount,
  DeleteResource,
}

impl ChangeType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::IncreaseAmount => "INCREASE_AMOUNT",
      Self::DecreaseAmount => "DECREASE_AMOUNT",
      Self::DeleteResource => "DELETE_RESOURCE",
    }
  }
}

/// One appended audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogEntry {
  pub id:           i64,
  pub element_type: ResourceKind,
  pub element_id:   i64,
  pub change_type:  ChangeType,
  /// Magnitude of the change; the deleted amount for DELETE_RESOURCE.
  pub diff_amount:  i64,
  /// Required for decreases and deletions, may be empty otherwise.
  pub reason:       String,
  pub timestamp:    DateTime<Utc>,
}

//! Error types for `remedy-core`.
//!
//! The taxonomy matters at the HTTP boundary: validation and malformed-token
//! failures map to client errors, not-found stays distinct from validation,
//! geocoder failures are surfaced as their own retryable class, and invariant
//! violations are fatal server errors that must never be swallowed.

use thiserror::Error;

use crate::resource::ResourceKind;

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ────────────────────────────────────────────────────────
  #[error("category must not be empty")]
  EmptyCategory,

  #[error("provider requires a name, an organisation and a mail address")]
  IncompleteProvider,

  #[error("personnel entries require a qualification and an area")]
  IncompletePersonnel,

  #[error("a non-blank reason is required for this change")]
  MissingReason,

  #[error("amount must be at least 1, got {0}")]
  InvalidAmount(i64),

  #[error("personnel have no amount to change")]
  AmountNotApplicable,

  #[error("mail address is not plausible")]
  InvalidMail,

  // ── Token / lookup ────────────────────────────────────────────────────
  #[error("token is not a well-formed capability token")]
  InvalidToken,

  #[error("no offer matches the presented token")]
  OfferNotFound,

  #[error("{0} {1} not found")]
  ResourceNotFound(ResourceKind, i64),

  // ── External collaborators ────────────────────────────────────────────
  #[error("address resolution failed: {0}")]
  AddressResolution(#[from] crate::geocode::AddressResolutionError),

  // ── Fatal ─────────────────────────────────────────────────────────────
  /// An internal invariant was violated (e.g. an update touched more rows
  /// than the record plus its address). Indicates data corruption.
  #[error("invariant violated: {0}")]
  InvalidState(String),

  #[error("storage backend error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Coarse classification used by the HTTP boundary to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  Validation,
  NotFound,
  AddressResolution,
  Fatal,
}

impl Error {
  pub fn class(&self) -> ErrorClass {
    match self {
      Self::EmptyCategory
      | Self::IncompleteProvider
      | Self::IncompletePersonnel
      | Self::MissingReason
      | Self::InvalidAmount(_)
      | Self::AmountNotApplicable
      | Self::InvalidMail
      | Self::InvalidToken => ErrorClass::Validation,
      Self::OfferNotFound | Self::ResourceNotFound(..) => ErrorClass::NotFound,
      Self::AddressResolution(_) => ErrorClass::AddressResolution,
      Self::InvalidState(_) | Self::Storage(_) => ErrorClass::Fatal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! The geocoder boundary.
//!
//! Turning a postal address into coordinates is an external concern; the core
//! only sees this trait. Implementations must apply their own bounded timeout
//! so a slow backend cannot stall catalog operations.

use std::future::Future;

use thiserror::Error;

use crate::address::{Address, Coordinates};

/// The geocoding backend found no result or was unreachable.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct AddressResolutionError(pub String);

/// Maps a postal address to coordinates; may fail.
pub trait Geocoder: Send + Sync {
  fn resolve<'a>(
    &'a self,
    address: &'a Address,
  ) -> impl Future<Output = Result<Coordinates, AddressResolutionError>> + Send + 'a;
}

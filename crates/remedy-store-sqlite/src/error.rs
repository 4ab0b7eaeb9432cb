//! Error type for `remedy-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] remedy_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A stored row failed to convert back into a domain value.
  #[error("corrupt row: {0}")]
  Decode(String),
}

impl Error {
  /// Unwrap a [`remedy_core::Error`] smuggled out of a `conn.call` closure
  /// through [`tokio_rusqlite::Error::Other`].
  pub(crate) fn from_call(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Other(inner) => {
        match inner.downcast::<remedy_core::Error>() {
          Ok(core) => Self::Core(*core),
          Err(inner) => Self::Database(tokio_rusqlite::Error::Other(inner)),
        }
      }
      other => Self::Database(other),
    }
  }
}

impl From<Error> for remedy_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      other => remedy_core::Error::Storage(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

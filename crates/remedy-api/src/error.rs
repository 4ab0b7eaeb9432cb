//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use remedy_core::ErrorClass;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler. Thin wrapper around the core error
/// so its taxonomy drives status selection.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub remedy_core::Error);

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self.0.class() {
      ErrorClass::Validation => (StatusCode::BAD_REQUEST, self.0.to_string()),
      ErrorClass::NotFound => (StatusCode::NOT_FOUND, self.0.to_string()),
      // The geocoder is an external dependency; clients may retry.
      ErrorClass::AddressResolution => {
        (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string())
      }
      // Invariant violations and storage failures are logged in full but
      // never leaked to the client.
      ErrorClass::Fatal => {
        error!(error = %self.0, "internal error");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

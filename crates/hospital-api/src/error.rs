//! API error type, [`axum::response::IntoResponse`] implementation, and the
//! extractor wrappers that turn malformed input into the same error body.

use axum::{
  Json,
  extract::{
    FromRequest, FromRequestParts,
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
  http::StatusCode,
  response::{IntoResponse, Response},
};
use hospital_core::store::StoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
///
/// Every variant renders as `{"error": <category>, "message": <text>}`.
#[derive(Debug, Error)]
pub enum ApiError {
  /// A rule violation detected by the handler itself.
  #[error(transparent)]
  Domain(#[from] hospital_core::Error),

  /// A rule violation detected by the store inside a transaction.
  #[error("{message}")]
  Rejected {
    status:   StatusCode,
    category: &'static str,
    message:  String,
  },

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  /// Map a backend error, keeping any domain error it carries.
  pub fn store<E: StoreError>(e: E) -> Self {
    match e.domain() {
      Some(domain) => Self::Rejected {
        status:   status_for(domain),
        category: domain.category(),
        message:  domain.to_string(),
      },
      None => Self::Store(Box::new(e)),
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::Domain(e) => status_for(e),
      Self::Rejected { status, .. } => *status,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub fn category(&self) -> &'static str {
    match self {
      Self::Domain(e) => e.category(),
      Self::Rejected { category, .. } => *category,
      Self::BadRequest(_) => "validation",
      Self::Store(_) | Self::Internal(_) => "internal",
    }
  }
}

/// Scheduling and uniqueness conflicts are client errors (400), like other
/// validation failures.
fn status_for(e: &hospital_core::Error) -> StatusCode {
  match e.category() {
    "validation" | "conflict" => StatusCode::BAD_REQUEST,
    "unauthorized" => StatusCode::UNAUTHORIZED,
    "forbidden" => StatusCode::FORBIDDEN,
    "not_found" => StatusCode::NOT_FOUND,
    _ => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
      "internal server error".to_owned()
    } else {
      match &self {
        Self::BadRequest(m) => m.clone(),
        other => other.to_string(),
      }
    };
    (status, Json(json!({ "error": self.category(), "message": message })))
      .into_response()
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// [`axum::Json`] with [`ApiError`] as its rejection.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// [`axum::extract::Query`] with [`ApiError`] as its rejection.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// [`axum::extract::Path`] with [`ApiError`] as its rejection.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  #[test]
  fn domain_errors_map_to_statuses() {
    let cases = [
      (hospital_core::Error::Validation("x".into()), StatusCode::BAD_REQUEST),
      (hospital_core::Error::SlotTaken(Uuid::nil()), StatusCode::BAD_REQUEST),
      (hospital_core::Error::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
      (hospital_core::Error::Forbidden("x".into()), StatusCode::FORBIDDEN),
      (hospital_core::Error::AppointmentNotFound(Uuid::nil()), StatusCode::NOT_FOUND),
    ];
    for (err, status) in cases {
      assert_eq!(ApiError::from(err).status(), status);
    }
  }

  #[test]
  fn internal_errors_hide_details() {
    let err = ApiError::Internal("secret path /var/db".into());
    assert_eq!(err.category(), "internal");
    assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}

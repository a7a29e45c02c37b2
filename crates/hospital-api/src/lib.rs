//! JSON REST API for the hospital backend.
//!
//! Exposes an axum [`Router`] backed by any
//! [`hospital_core::store::HospitalStore`]. Every `/api` route except login
//! requires a bearer token; authorization goes through the capability table
//! in [`hospital_core::access`].
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = hospital_api::router(AppState { store, auth });
//! axum::serve(listener, app).await?;
//! ```

pub mod appointments;
pub mod auth;
pub mod error;
pub mod messages;
pub mod patients;
pub mod session;
pub mod treatments;
pub mod users;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post, put},
};
use chrono::NaiveDateTime;
use hospital_core::store::HospitalStore;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

pub use auth::AuthConfig;
pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), auth: Arc::clone(&self.auth) }
  }
}

/// The server's local wall clock, the reference for "in the future".
pub(crate) fn local_now() -> NaiveDateTime { chrono::Local::now().naive_local() }

/// Treat blank free text as absent.
pub(crate) fn non_blank(s: Option<String>) -> Option<String> {
  s.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// The complete application: health check at `/`, the API under `/api`, and
/// request tracing.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: HospitalStore + 'static,
{
  Router::new()
    .route("/", get(health))
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}

/// Build the `/api` routes for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: HospitalStore + 'static,
{
  Router::new()
    // Session
    .route("/auth/login", post(session::login::<S>))
    .route("/auth/verify", get(session::verify::<S>))
    // Appointments
    .route("/appointments", post(appointments::create::<S>))
    .route(
      "/appointments/{id}",
      put(appointments::update::<S>).delete(appointments::cancel::<S>),
    )
    .route("/appointments/practitioner/{id}", get(appointments::agenda::<S>))
    .route("/appointments/practitioner/{id}/slots", get(appointments::slots::<S>))
    .route("/appointments/patient/{id}", get(appointments::for_patient::<S>))
    // Patients
    .route("/patients", get(patients::list::<S>).post(patients::create::<S>))
    .route(
      "/patients/{id}",
      get(patients::get_one::<S>)
        .put(patients::update::<S>)
        .delete(patients::delete::<S>),
    )
    .route("/patients/practitioner/{id}", get(patients::for_practitioner::<S>))
    // Treatments
    .route("/treatments", post(treatments::create::<S>))
    .route(
      "/treatments/medications",
      get(treatments::catalog::<S>).post(treatments::add_to_catalog::<S>),
    )
    .route("/treatments/patient/{id}", get(treatments::list::<S>))
    .route("/treatments/patient/{id}/current", get(treatments::current::<S>))
    .route(
      "/treatments/patient/{id}/medications",
      post(treatments::add_medication::<S>).delete(treatments::remove_medication::<S>),
    )
    // Users
    .route("/users", get(users::list::<S>).post(users::create::<S>))
    .route("/users/statistics", get(users::statistics::<S>))
    .route("/users/role/{role}", get(users::by_role::<S>))
    .route(
      "/users/{id}",
      get(users::get_one::<S>)
        .put(users::update::<S>)
        .delete(users::delete::<S>),
    )
    // Messages
    .route("/messages", post(messages::send::<S>))
    .route("/messages/conversations", get(messages::conversations::<S>))
    .route("/messages/user/{id}", get(messages::mailbox::<S>))
    .route("/messages/user/{id}/unread", get(messages::unread::<S>))
    .route("/messages/user/{id}/read-all", put(messages::read_all::<S>))
    .route("/messages/{id}", axum::routing::delete(messages::delete::<S>))
    .route("/messages/{id}/read", put(messages::mark_read::<S>))
    .with_state(state)
}

/// `GET /`: unauthenticated liveness check.
async fn health() -> Json<Value> {
  Json(json!({
    "name":    env!("CARGO_PKG_NAME"),
    "version": env!("CARGO_PKG_VERSION"),
    "status":  "ok",
  }))
}

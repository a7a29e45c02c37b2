//! Handlers for `/auth` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/login` | Body: `{"email","password"}`; returns a bearer token |
//! | `GET`  | `/auth/verify` | Echoes the authenticated principal |

use axum::{Json, extract::State};
use hospital_core::{access::Principal, store::HospitalStore, user::User};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
  AppState,
  auth::{issue_token, verify_password},
  error::{ApiError, ApiJson},
};

// ─── Login ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub email:    String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
  pub token: String,
  pub user:  User,
}

/// `POST /auth/login`
///
/// An unknown email and a wrong password produce the same 401.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<LoginBody>,
) -> Result<Json<LoginResponse>, ApiError>
where
  S: HospitalStore,
{
  if body.email.trim().is_empty() || body.password.is_empty() {
    return Err(hospital_core::Error::Validation("email and password are required".into()).into());
  }

  let credentials = state
    .store
    .find_credentials(body.email.trim().to_owned())
    .await
    .map_err(ApiError::store)?
    .filter(|c| verify_password(&body.password, &c.password_hash));

  let Some(credentials) = credentials else {
    tracing::warn!(email = %body.email, "failed login attempt");
    return Err(hospital_core::Error::Unauthorized("invalid email or password".into()).into());
  };

  let token = issue_token(&state.auth, &credentials.user)?;
  tracing::info!(user = %credentials.user.user_id, role = %credentials.user.role, "login");
  Ok(Json(LoginResponse { token, user: credentials.user }))
}

// ─── Verify ──────────────────────────────────────────────────────────────────

/// `GET /auth/verify`
pub async fn verify<S>(principal: Principal) -> Json<Value>
where
  S: HospitalStore,
{
  Json(json!({ "user": principal }))
}

//! Bearer-token auth guard, token issuance and password hashing.
//!
//! Tokens are HS256 JWTs carrying the user id, email and role. The guard
//! also re-loads the account on every request, so a deleted user's token
//! stops working and a role change takes effect immediately.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{header, request::Parts},
};
use chrono::{TimeDelta, Utc};
use hospital_core::{
  access::{Principal, Role},
  store::HospitalStore,
  user::User,
};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Token signing settings for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub jwt_secret: String,
  pub token_ttl:  TimeDelta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  pub sub:   Uuid,
  pub email: String,
  pub role:  Role,
  pub iat:   i64,
  pub exp:   i64,
}

pub fn issue_token(config: &AuthConfig, user: &User) -> Result<String, ApiError> {
  let now = Utc::now();
  let claims = Claims {
    sub:   user.user_id,
    email: user.email.clone(),
    role:  user.role,
    iat:   now.timestamp(),
    exp:   (now + config.token_ttl).timestamp(),
  };
  encode(
    &Header::new(Algorithm::HS256),
    &claims,
    &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
  )
  .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))
}

/// Verify signature and expiry.
pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims, ApiError> {
  decode::<Claims>(
    token,
    &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
    &Validation::new(Algorithm::HS256),
  )
  .map(|data| data.claims)
  .map_err(|_| unauthorized("invalid or expired token"))
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

/// `false` for a wrong password and for an unparseable stored hash alike.
pub fn verify_password(password: &str, hash: &str) -> bool {
  PasswordHash::new(hash).is_ok_and(|parsed| {
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .is_ok()
  })
}

fn unauthorized(message: &str) -> ApiError {
  hospital_core::Error::Unauthorized(message.to_owned()).into()
}

fn bearer(parts: &Parts) -> Option<&str> {
  parts
    .headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

impl<S> FromRequestParts<AppState<S>> for Principal
where
  S: HospitalStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer(parts).ok_or_else(|| unauthorized("access token required"))?;
    let claims = verify_token(&state.auth, token)?;

    let user = state
      .store
      .get_user(claims.sub)
      .await
      .map_err(ApiError::store)?
      .ok_or_else(|| unauthorized("user no longer exists"))?;

    Ok(Principal { id: user.user_id, email: user.email, role: user.role })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config() -> AuthConfig {
    AuthConfig { jwt_secret: "test-secret".into(), token_ttl: TimeDelta::hours(1) }
  }

  fn user() -> User {
    User {
      user_id:     Uuid::new_v4(),
      family_name: "House".into(),
      given_name:  "Greg".into(),
      email:       "house@hospital.test".into(),
      role:        Role::Doctor,
      created_at:  Utc::now(),
    }
  }

  #[test]
  fn token_round_trip() {
    let u = user();
    let token = issue_token(&config(), &u).unwrap();
    let claims = verify_token(&config(), &token).unwrap();
    assert_eq!(claims.sub, u.user_id);
    assert_eq!(claims.role, Role::Doctor);
  }

  #[test]
  fn wrong_secret_and_expired_tokens_are_rejected() {
    let token = issue_token(&config(), &user()).unwrap();
    let other = AuthConfig { jwt_secret: "other".into(), ..config() };
    assert!(verify_token(&other, &token).is_err());

    let expired = AuthConfig { token_ttl: TimeDelta::hours(-2), ..config() };
    let token = issue_token(&expired, &user()).unwrap();
    assert!(verify_token(&config(), &token).is_err());
  }

  #[test]
  fn password_hashing() {
    let hash = hash_password("s3cret!").unwrap();
    assert!(verify_password("s3cret!", &hash));
    assert!(!verify_password("wrong", &hash));
    assert!(!verify_password("s3cret!", "not-a-phc-string"));
  }
}

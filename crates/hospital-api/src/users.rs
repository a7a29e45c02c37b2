//! Handlers for `/users` endpoints. Admin only.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/users` | `{users, by_role, total}` |
//! | `GET`    | `/users/statistics` | Global counts and monthly new patients |
//! | `GET`    | `/users/role/{role}` | 400 for an unknown role |
//! | `GET`    | `/users/{id}` | Doctors carry activity counts |
//! | `POST`   | `/users` | All fields required |
//! | `PUT`    | `/users/{id}` | Partial; not your own role |
//! | `DELETE` | `/users/{id}` | Not yourself |

use axum::{Json, extract::State, http::StatusCode};
use hospital_core::{
  access::{Action, Principal, Resource, Role, authorize},
  store::HospitalStore,
  user::{
    NewUser, Statistics, User, UserChanges, UserDetail, UserDirectory, ensure_not_self,
    validate_password,
  },
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::hash_password,
  error::{ApiError, ApiJson, ApiPath},
  non_blank,
};

fn validation(message: &str) -> ApiError {
  hospital_core::Error::Validation(message.to_owned()).into()
}

// ─── Read ────────────────────────────────────────────────────────────────────

/// `GET /users`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
) -> Result<Json<UserDirectory>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::User, Action::Read)?;
  let users = state.store.list_users(None).await.map_err(ApiError::store)?;
  Ok(Json(UserDirectory::new(users)))
}

/// `GET /users/statistics`
pub async fn statistics<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
) -> Result<Json<Statistics>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::User, Action::Read)?;
  let today = chrono::Local::now().date_naive();
  let stats = state.store.statistics(today).await.map_err(ApiError::store)?;
  Ok(Json(stats))
}

/// `GET /users/role/{role}`
pub async fn by_role<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(role): ApiPath<String>,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::User, Action::Read)?;
  let role: Role = role.parse()?;
  let users = state.store.list_users(Some(role)).await.map_err(ApiError::store)?;
  Ok(Json(users))
}

/// `GET /users/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserDetail>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::User, Action::Read)?;
  let user = state
    .store
    .get_user(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(hospital_core::Error::UserNotFound(id))?;

  let statistics = if user.role == Role::Doctor {
    Some(state.store.practitioner_stats(id).await.map_err(ApiError::store)?)
  } else {
    None
  };
  Ok(Json(UserDetail { user, statistics }))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub family_name: Option<String>,
  pub given_name:  Option<String>,
  pub email:       Option<String>,
  pub password:    Option<String>,
  pub role:        Option<String>,
}

/// `POST /users`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<(StatusCode, Json<User>), ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::User, Action::Create)?;

  let (Some(family_name), Some(given_name), Some(email), Some(password), Some(role)) = (
    non_blank(body.family_name),
    non_blank(body.given_name),
    non_blank(body.email),
    body.password,
    body.role,
  ) else {
    return Err(validation("all fields are required"));
  };
  validate_password(&password)?;
  let role: Role = role.parse()?;

  let input = NewUser {
    family_name,
    given_name,
    email,
    password_hash: hash_password(&password)?,
    role,
  };
  let user = state.store.create_user(input).await.map_err(ApiError::store)?;

  tracing::info!(user = %user.user_id, role = %user.role, by = %principal.id, "user created");
  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBody {
  pub family_name: Option<String>,
  pub given_name:  Option<String>,
  pub email:       Option<String>,
  pub password:    Option<String>,
  pub role:        Option<String>,
}

/// `PUT /users/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<UpdateBody>,
) -> Result<Json<User>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::User, Action::Update)?;

  let role = body.role.as_deref().map(str::parse::<Role>).transpose()?;
  if role.is_some() {
    ensure_not_self(principal.id, id, "change the role of")?;
  }
  let password_hash = match body.password {
    Some(password) => {
      validate_password(&password)?;
      Some(hash_password(&password)?)
    }
    None => None,
  };

  let changes = UserChanges {
    family_name: non_blank(body.family_name),
    given_name: non_blank(body.given_name),
    email: non_blank(body.email),
    password_hash,
    role,
  };
  if changes.is_empty() {
    return Err(validation("no fields to update"));
  }

  let user = state.store.update_user(id, changes).await.map_err(ApiError::store)?;
  tracing::info!(user = %id, by = %principal.id, "user updated");
  Ok(Json(user))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /users/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::User, Action::Delete)?;
  ensure_not_self(principal.id, id, "delete")?;
  state.store.delete_user(id).await.map_err(ApiError::store)?;
  tracing::info!(user = %id, by = %principal.id, "user deleted");
  Ok(StatusCode::NO_CONTENT)
}

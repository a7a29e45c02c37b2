//! Handlers for `/messages` endpoints. Open to every role; the checks here
//! are about whose mailbox it is.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/messages/user/{id}` | Self or admin; `{received, sent, total, unread}` |
//! | `GET`    | `/messages/user/{id}/unread` | Self or admin |
//! | `GET`    | `/messages/conversations` | The caller's conversations |
//! | `POST`   | `/messages` | `{recipient_id, body, category?}` |
//! | `PUT`    | `/messages/{id}/read` | Recipient or admin |
//! | `PUT`    | `/messages/user/{id}/read-all` | Self or admin; `{marked}` |
//! | `DELETE` | `/messages/{id}` | Sender, recipient or admin |

use axum::{Json, extract::State, http::StatusCode};
use hospital_core::{
  access::{Action, Principal, Resource, authorize, ensure_self_or_admin},
  message::{
    Conversation, Mailbox, Message, MessageCategory, MessageView, NewMessage,
    conversations as group,
  },
  store::HospitalStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  error::{ApiError, ApiJson, ApiPath},
};

async fn load<S: HospitalStore>(store: &S, id: Uuid) -> Result<Message, ApiError> {
  store
    .get_message(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| hospital_core::Error::MessageNotFound(id).into())
}

// ─── Mailbox ─────────────────────────────────────────────────────────────────

/// `GET /messages/user/{id}`
pub async fn mailbox<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Mailbox>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Message, Action::Read)?;
  ensure_self_or_admin(&principal, id)?;
  let views = state.store.messages_for(id).await.map_err(ApiError::store)?;
  Ok(Json(Mailbox::new(id, views)))
}

/// `GET /messages/user/{id}/unread`
pub async fn unread<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<MessageView>>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Message, Action::Read)?;
  ensure_self_or_admin(&principal, id)?;
  let views = state.store.unread_for(id).await.map_err(ApiError::store)?;
  Ok(Json(views))
}

/// `GET /messages/conversations`
pub async fn conversations<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
) -> Result<Json<Vec<Conversation>>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Message, Action::Read)?;
  let views = state
    .store
    .messages_for(principal.id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(group(principal.id, &views)))
}

// ─── Send ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SendBody {
  pub recipient_id: Option<Uuid>,
  #[serde(default)]
  pub body:         String,
  pub category:     Option<String>,
}

/// `POST /messages`
pub async fn send<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiJson(body): ApiJson<SendBody>,
) -> Result<(StatusCode, Json<Message>), ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Message, Action::Create)?;

  let recipient_id = body
    .recipient_id
    .ok_or_else(|| hospital_core::Error::Validation("recipient is required".into()))?;
  let category = match body.category.as_deref() {
    Some(c) => MessageCategory::parse(c)?,
    None => MessageCategory::default(),
  };
  let input = NewMessage {
    sender_id: principal.id,
    recipient_id,
    body: body.body.trim().to_owned(),
    category,
  };
  input.validate()?;

  let message = state.store.send_message(input).await.map_err(ApiError::store)?;
  tracing::debug!(message = %message.message_id, from = %principal.id, to = %recipient_id, "message sent");
  Ok((StatusCode::CREATED, Json(message)))
}

// ─── Read state ──────────────────────────────────────────────────────────────

/// `PUT /messages/{id}/read`
pub async fn mark_read<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Message>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Message, Action::Update)?;
  let message = load(state.store.as_ref(), id).await?;
  ensure_self_or_admin(&principal, message.recipient_id)?;
  let message = state.store.mark_read(id).await.map_err(ApiError::store)?;
  Ok(Json(message))
}

#[derive(Debug, Serialize)]
pub struct Marked {
  pub marked: u64,
}

/// `PUT /messages/user/{id}/read-all`
pub async fn read_all<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Marked>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Message, Action::Update)?;
  ensure_self_or_admin(&principal, id)?;
  let marked = state.store.mark_all_read(id).await.map_err(ApiError::store)?;
  Ok(Json(Marked { marked }))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /messages/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Message, Action::Delete)?;
  let message = load(state.store.as_ref(), id).await?;
  if principal.id != message.sender_id {
    ensure_self_or_admin(&principal, message.recipient_id)?;
  }
  state.store.delete_message(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

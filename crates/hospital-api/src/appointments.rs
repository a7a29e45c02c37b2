//! Handlers for `/appointments` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/appointments/practitioner/{id}` | Own agenda or admin; `?date=YYYY-MM-DD&status=` |
//! | `GET`    | `/appointments/practitioner/{id}/slots` | `?date=YYYY-MM-DD`; free `HH:MM` marks |
//! | `GET`    | `/appointments/patient/{id}` | Newest first |
//! | `POST`   | `/appointments` | Doctor; 400 on a conflict within 30 minutes |
//! | `PUT`    | `/appointments/{id}` | Owning doctor; reschedule, status, notes |
//! | `DELETE` | `/appointments/{id}` | Owning doctor; soft-cancel |
//!
//! Booking and rescheduling queue a notice for the patient; delivery happens
//! later and never affects the response.

use axum::{Json, extract::State, http::StatusCode};
use chrono::NaiveDate;
use hospital_core::{
  access::{Action, Principal, Resource, authorize, ensure_self_or_admin},
  appointment::{AgendaQuery, Appointment, AppointmentStatus, AppointmentView, NewAppointment},
  notification::Notice,
  schedule::{
    AppointmentChanges, AppointmentEvent, available_slots, ensure_future, format_slot,
    parse_timestamp, plan_cancel, plan_update,
  },
  store::HospitalStore,
  user::User,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  AppState, local_now, non_blank,
  error::{ApiError, ApiJson, ApiPath, ApiQuery},
};

/// `Some(None)` for an explicit `null`, `None` for an absent field.
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(de).map(Some)
}

async fn practitioner<S: HospitalStore>(store: &S, id: Uuid) -> Result<User, ApiError> {
  store
    .get_user(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| hospital_core::Error::UserNotFound(id).into())
}

/// Load `id` and check that `principal` is the practitioner it belongs to.
async fn owned<S: HospitalStore>(
  store: &S,
  principal: &Principal,
  id: Uuid,
) -> Result<Appointment, ApiError> {
  let appointment = store
    .get_appointment(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(hospital_core::Error::AppointmentNotFound(id))?;
  if appointment.practitioner_id != principal.id {
    return Err(hospital_core::Error::Forbidden("not your appointment".into()).into());
  }
  Ok(appointment)
}

// ─── Agenda ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AgendaParams {
  pub date:   Option<NaiveDate>,
  pub status: Option<AppointmentStatus>,
}

/// `GET /appointments/practitioner/{id}`
pub async fn agenda<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
  ApiQuery(params): ApiQuery<AgendaParams>,
) -> Result<Json<Vec<AppointmentView>>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Agenda, Action::Read)?;
  ensure_self_or_admin(&principal, id)?;

  let query = AgendaQuery { date: params.date, status: params.status, ..AgendaQuery::new(id) };
  let agenda = state.store.list_agenda(query).await.map_err(ApiError::store)?;
  Ok(Json(agenda))
}

// ─── Slots ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SlotParams {
  pub date: Option<NaiveDate>,
}

/// `GET /appointments/practitioner/{id}/slots?date=YYYY-MM-DD`
pub async fn slots<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
  ApiQuery(params): ApiQuery<SlotParams>,
) -> Result<Json<Vec<String>>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Agenda, Action::Read)?;
  ensure_self_or_admin(&principal, id)?;

  let date = params
    .date
    .ok_or_else(|| hospital_core::Error::Validation("date is required".into()))?;
  let booked = state.store.booked_times(id, date).await.map_err(ApiError::store)?;

  let slots: Vec<String> = available_slots(date, &booked).into_iter().map(format_slot).collect();
  Ok(Json(slots))
}

// ─── Patient history ─────────────────────────────────────────────────────────

/// `GET /appointments/patient/{id}`
pub async fn for_patient<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<AppointmentView>>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Appointment, Action::Read)?;
  let appointments = state
    .store
    .list_patient_appointments(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(appointments))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub patient_id:   Option<Uuid>,
  pub scheduled_at: Option<String>,
  pub notes:        Option<String>,
}

/// `POST /appointments`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Appointment, Action::Create)?;

  let (Some(patient_id), Some(raw_at)) = (body.patient_id, body.scheduled_at) else {
    return Err(
      hospital_core::Error::Validation("patient and date/time are required".into()).into(),
    );
  };
  let scheduled_at = parse_timestamp(&raw_at)?;
  ensure_future(scheduled_at, local_now())?;

  let doctor = practitioner(state.store.as_ref(), principal.id).await?;
  let notice = Notice::AppointmentScheduled { practitioner: doctor.practitioner_title(), at: scheduled_at }
    .to(patient_id, principal.id);

  let input = NewAppointment {
    patient_id,
    practitioner_id: principal.id,
    scheduled_at,
    notes: non_blank(body.notes),
  };

  let appointment = match state.store.book_appointment(input, notice).await {
    Ok(a) => a,
    Err(e) => {
      let err = ApiError::store(e);
      tracing::warn!(
        practitioner = %principal.id,
        patient = %patient_id,
        at = %scheduled_at,
        error = %err,
        "booking rejected"
      );
      return Err(err);
    }
  };

  tracing::info!(
    appointment = %appointment.appointment_id,
    practitioner = %principal.id,
    at = %appointment.scheduled_at,
    "appointment booked"
  );
  Ok((StatusCode::CREATED, Json(json!({ "appointment_id": appointment.appointment_id }))))
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBody {
  pub scheduled_at: Option<String>,
  pub status:       Option<AppointmentStatus>,
  #[serde(default, deserialize_with = "double_option")]
  pub notes:        Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentResponse {
  pub appointment: Appointment,
}

/// `PUT /appointments/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<UpdateBody>,
) -> Result<Json<AppointmentResponse>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Appointment, Action::Update)?;
  let current = owned(state.store.as_ref(), &principal, id).await?;

  let changes = AppointmentChanges {
    scheduled_at: body.scheduled_at.as_deref().map(parse_timestamp).transpose()?,
    status:       body.status,
    notes:        body.notes.map(non_blank),
  };
  let plan = plan_update(&current, changes, local_now())?;

  let notice = match plan.event {
    None => None,
    Some(event) => {
      let title = practitioner(state.store.as_ref(), principal.id).await?.practitioner_title();
      let notice = match event {
        AppointmentEvent::Rescheduled(at) => {
          Notice::AppointmentRescheduled { practitioner: title, at }
        }
        AppointmentEvent::Canceled => Notice::AppointmentCanceled { practitioner: title },
      };
      Some(notice.to(current.patient_id, principal.id))
    }
  };

  let appointment = state
    .store
    .update_appointment(id, plan.write, notice)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(appointment = %id, status = %appointment.status, "appointment updated");
  Ok(Json(AppointmentResponse { appointment }))
}

// ─── Cancel ──────────────────────────────────────────────────────────────────

/// `DELETE /appointments/{id}`
pub async fn cancel<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<AppointmentResponse>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Appointment, Action::Delete)?;
  let current = owned(state.store.as_ref(), &principal, id).await?;
  let write = plan_cancel(&current)?;

  let title = practitioner(state.store.as_ref(), principal.id).await?.practitioner_title();
  let notice = Notice::AppointmentCanceled { practitioner: title }.to(current.patient_id, principal.id);

  let appointment = state
    .store
    .update_appointment(id, write, Some(notice))
    .await
    .map_err(ApiError::store)?;

  tracing::info!(appointment = %id, "appointment canceled");
  Ok(Json(AppointmentResponse { appointment }))
}

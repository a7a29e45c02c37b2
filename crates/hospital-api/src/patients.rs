//! Handlers for `/patients` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/patients` | Newest first; `?search=` matches either name |
//! | `GET`    | `/patients/practitioner/{id}` | Patients with a treatment or appointment by `{id}` |
//! | `GET`    | `/patients/{id}` | Patient with treatment history and appointments |
//! | `POST`   | `/patients` | HR or admin |
//! | `PUT`    | `/patients/{id}` | HR or admin; partial |
//! | `DELETE` | `/patients/{id}` | Admin; cascades treatments and appointments |

use axum::{Json, extract::State, http::StatusCode};
use hospital_core::{
  access::{Action, Principal, Resource, authorize, ensure_self_or_admin},
  appointment::AppointmentView,
  patient::{NewPatient, Patient, PatientChanges},
  store::HospitalStore,
  treatment::TreatmentView,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState, non_blank,
  error::{ApiError, ApiJson, ApiPath, ApiQuery},
};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub search: Option<String>,
}

/// `GET /patients[?search=<text>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Vec<Patient>>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Patient, Action::Read)?;
  let patients = state
    .store
    .list_patients(non_blank(params.search))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(patients))
}

/// `GET /patients/practitioner/{id}`
pub async fn for_practitioner<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<Patient>>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Agenda, Action::Read)?;
  ensure_self_or_admin(&principal, id)?;
  let patients = state
    .store
    .list_practitioner_patients(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(patients))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PatientDetail {
  #[serde(flatten)]
  pub patient:      Patient,
  pub treatments:   Vec<TreatmentView>,
  pub appointments: Vec<AppointmentView>,
}

/// `GET /patients/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<PatientDetail>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Patient, Action::Read)?;

  let patient = state
    .store
    .get_patient(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(hospital_core::Error::PatientNotFound(id))?;
  let treatments = state.store.list_treatments(id).await.map_err(ApiError::store)?;
  let appointments = state
    .store
    .list_patient_appointments(id)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(PatientDetail { patient, treatments, appointments }))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub family_name:       Option<String>,
  pub given_name:        Option<String>,
  pub age:               Option<i64>,
  pub weight_kg:         Option<f64>,
  pub height_cm:         Option<f64>,
  pub email:             Option<String>,
  pub current_treatment: Option<String>,
}

/// `POST /patients`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<(StatusCode, Json<Patient>), ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Patient, Action::Create)?;

  let (Some(family_name), Some(given_name), Some(age)) =
    (body.family_name, body.given_name, body.age)
  else {
    return Err(
      hospital_core::Error::Validation("family name, given name and age are required".into())
        .into(),
    );
  };
  let input = NewPatient {
    family_name,
    given_name,
    age,
    weight_kg: body.weight_kg,
    height_cm: body.height_cm,
    email: non_blank(body.email),
    current_treatment: non_blank(body.current_treatment),
  };
  input.validate()?;

  let patient = state.store.create_patient(input).await.map_err(ApiError::store)?;
  tracing::info!(patient = %patient.patient_id, by = %principal.id, "patient created");
  Ok((StatusCode::CREATED, Json(patient)))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PUT /patients/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
  ApiJson(changes): ApiJson<PatientChanges>,
) -> Result<Json<Patient>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Patient, Action::Update)?;
  changes.validate()?;
  let patient = state
    .store
    .update_patient(id, changes)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(patient))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /patients/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Patient, Action::Delete)?;
  state.store.delete_patient(id).await.map_err(ApiError::store)?;
  tracing::info!(patient = %id, by = %principal.id, "patient deleted");
  Ok(StatusCode::NO_CONTENT)
}

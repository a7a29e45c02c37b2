//! Handlers for `/treatments` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/treatments/patient/{id}` | `{patient, treatments}`, newest first |
//! | `GET`    | `/treatments/patient/{id}/current` | 404 when none |
//! | `POST`   | `/treatments` | Doctor; `{patient_id, medications, notes}` |
//! | `POST`   | `/treatments/patient/{id}/medications` | Doctor; `{name, dosage}` |
//! | `DELETE` | `/treatments/patient/{id}/medications` | Doctor; `{name}` |
//! | `GET`    | `/treatments/medications` | Catalog, alphabetical |
//! | `POST`   | `/treatments/medications` | Admin; `{name, default_dosage, description}` |
//!
//! Every write records a new snapshot; earlier snapshots are never touched.

use axum::{Json, extract::State, http::StatusCode};
use hospital_core::{
  access::{Action, Principal, Resource, authorize},
  notification::Notice,
  store::HospitalStore,
  treatment::{
    CatalogMedication, Medication, MedicationEdit, MedicationList, NewCatalogMedication,
    NewTreatment, PatientTreatments, Treatment,
  },
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  AppState,
  error::{ApiError, ApiJson, ApiPath},
  non_blank,
};

async fn prescriber_title<S: HospitalStore>(store: &S, id: Uuid) -> Result<String, ApiError> {
  let user = store
    .get_user(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(hospital_core::Error::UserNotFound(id))?;
  Ok(user.practitioner_title())
}

fn created(treatment: &Treatment) -> (StatusCode, Json<Value>) {
  tracing::info!(
    treatment = %treatment.treatment_id,
    patient = %treatment.patient_id,
    medications = treatment.medications.len(),
    "treatment recorded"
  );
  (StatusCode::CREATED, Json(json!({ "treatment_id": treatment.treatment_id })))
}

/// Apply `change` to whatever snapshot is current when the store writes.
async fn edit<S: HospitalStore>(
  state: &AppState<S>,
  principal: &Principal,
  patient_id: Uuid,
  change: MedicationEdit,
  notice: Notice,
) -> Result<(StatusCode, Json<Value>), ApiError> {
  let outbox = notice.to(patient_id, principal.id);
  let treatment = state
    .store
    .edit_medications(patient_id, principal.id, change, outbox)
    .await
    .map_err(ApiError::store)?;
  Ok(created(&treatment))
}

// ─── Read ────────────────────────────────────────────────────────────────────

/// `GET /treatments/patient/{id}`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<PatientTreatments>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Treatment, Action::Read)?;
  let patient = state
    .store
    .get_patient(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(hospital_core::Error::PatientNotFound(id))?;
  let treatments = state.store.list_treatments(id).await.map_err(ApiError::store)?;
  Ok(Json(PatientTreatments { patient, treatments }))
}

/// `GET /treatments/patient/{id}/current`
pub async fn current<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Treatment>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Treatment, Action::Read)?;
  let treatment = state
    .store
    .current_treatment(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(hospital_core::Error::NoTreatment(id))?;
  Ok(Json(treatment))
}

// ─── Prescribe ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub patient_id:  Option<Uuid>,
  #[serde(default)]
  pub medications: MedicationList,
  pub notes:       Option<String>,
}

/// `POST /treatments`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Treatment, Action::Create)?;

  let Some(patient_id) = body.patient_id.filter(|_| !body.medications.is_empty()) else {
    return Err(
      hospital_core::Error::Validation("patient and medications are required".into()).into(),
    );
  };

  let practitioner = prescriber_title(state.store.as_ref(), principal.id).await?;
  let notice = Notice::TreatmentUpdated { practitioner, medications: body.medications.clone() }
    .to(patient_id, principal.id);
  let input = NewTreatment {
    patient_id,
    practitioner_id: principal.id,
    medications: body.medications,
    notes: non_blank(body.notes),
  };
  let treatment = state
    .store
    .record_treatment(input, notice)
    .await
    .map_err(ApiError::store)?;
  Ok(created(&treatment))
}

// ─── Medications ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddBody {
  pub name:   Option<String>,
  pub dosage: Option<String>,
}

/// `POST /treatments/patient/{id}/medications`
///
/// Starts from an empty list when the patient has no snapshot yet.
pub async fn add_medication<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(patient_id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<AddBody>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Treatment, Action::Update)?;

  let medication = Medication::new(
    body.name.unwrap_or_default(),
    body.dosage.unwrap_or_default(),
  )?;
  let practitioner = prescriber_title(state.store.as_ref(), principal.id).await?;
  let notice = Notice::MedicationAdded { practitioner, medication: medication.clone() };
  edit(&state, &principal, patient_id, MedicationEdit::Add(medication), notice).await
}

#[derive(Debug, Deserialize)]
pub struct RemoveBody {
  pub name: Option<String>,
}

/// `DELETE /treatments/patient/{id}/medications`
pub async fn remove_medication<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiPath(patient_id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<RemoveBody>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Treatment, Action::Delete)?;

  let name = body.name.unwrap_or_default().trim().to_owned();
  let practitioner = prescriber_title(state.store.as_ref(), principal.id).await?;
  let notice = Notice::MedicationRemoved { practitioner, name: name.clone() };
  edit(&state, &principal, patient_id, MedicationEdit::Remove(name), notice).await
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// `GET /treatments/medications`
pub async fn catalog<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
) -> Result<Json<Vec<CatalogMedication>>, ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Catalog, Action::Read)?;
  let catalog = state.store.list_catalog().await.map_err(ApiError::store)?;
  Ok(Json(catalog))
}

/// `POST /treatments/medications`
pub async fn add_to_catalog<S>(
  State(state): State<AppState<S>>,
  principal: Principal,
  ApiJson(body): ApiJson<NewCatalogMedication>,
) -> Result<(StatusCode, Json<CatalogMedication>), ApiError>
where
  S: HospitalStore,
{
  authorize(&principal, Resource::Catalog, Action::Create)?;
  let medication = state.store.add_to_catalog(body).await.map_err(ApiError::store)?;
  tracing::info!(medication = %medication.medication_id, name = %medication.name, "catalog entry added");
  Ok((StatusCode::CREATED, Json(medication)))
}

use chrono::Utc;
use hospital_core::{
  notification::NewNotification,
  treatment::{MedicationEdit, NewTreatment, Treatment, TreatmentView},
};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    RawTreatment, RawTreatmentView, TREATMENT_COLUMNS, encode_dt,
    encode_medications, encode_uuid,
  },
  sql::{exists, immediate, outbox},
};

fn insert(conn: &Connection, input: NewTreatment) -> Result<Treatment> {
  let treatment = Treatment {
    treatment_id:    Uuid::new_v4(),
    patient_id:      input.patient_id,
    practitioner_id: input.practitioner_id,
    medications:     input.medications,
    notes:           input.notes,
    created_at:      Utc::now(),
  };
  conn.execute(
    "INSERT INTO treatments (
       treatment_id, patient_id, practitioner_id, medications, notes, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      encode_uuid(treatment.treatment_id),
      encode_uuid(treatment.patient_id),
      encode_uuid(treatment.practitioner_id),
      encode_medications(&treatment.medications)?,
      treatment.notes,
      encode_dt(treatment.created_at),
    ],
  )?;
  Ok(treatment)
}

pub fn record(
  conn: &mut Connection,
  input: NewTreatment,
  notice: NewNotification,
) -> Result<Treatment> {
  let tx = immediate(conn)?;
  if !exists(&tx, "patients", "patient_id", &encode_uuid(input.patient_id))? {
    return Err(hospital_core::Error::PatientNotFound(input.patient_id).into());
  }
  let treatment = insert(&tx, input)?;
  outbox::insert(&tx, &notice)?;
  tx.commit()?;
  Ok(treatment)
}

/// Read the latest snapshot and append its successor in one write
/// transaction.
pub fn edit(
  conn: &mut Connection,
  patient_id: Uuid,
  practitioner_id: Uuid,
  change: &MedicationEdit,
  notice: NewNotification,
) -> Result<Treatment> {
  let tx = immediate(conn)?;
  if !exists(&tx, "patients", "patient_id", &encode_uuid(patient_id))? {
    return Err(hospital_core::Error::PatientNotFound(patient_id).into());
  }
  let latest = current(&tx, patient_id)?;
  let input = change.apply(latest.as_ref(), patient_id, practitioner_id)?;
  let treatment = insert(&tx, input)?;
  outbox::insert(&tx, &notice)?;
  tx.commit()?;
  Ok(treatment)
}

pub fn list(conn: &Connection, patient_id: Uuid) -> Result<Vec<TreatmentView>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {TREATMENT_COLUMNS}, u.given_name || ' ' || u.family_name
     FROM treatments t
     LEFT JOIN users u ON u.user_id = t.practitioner_id
     WHERE t.patient_id = ?1
     ORDER BY t.created_at DESC, t.rowid DESC"
  ))?;
  let raws = stmt
    .query_map([encode_uuid(patient_id)], RawTreatmentView::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawTreatmentView::into_view).collect()
}

pub fn current(conn: &Connection, patient_id: Uuid) -> Result<Option<Treatment>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {TREATMENT_COLUMNS} FROM treatments t
         WHERE t.patient_id = ?1
         ORDER BY t.created_at DESC, t.rowid DESC
         LIMIT 1"
      ),
      [encode_uuid(patient_id)],
      RawTreatment::from_row,
    )
    .optional()?;
  raw.map(RawTreatment::into_treatment).transpose()
}

use chrono::Utc;
use hospital_core::patient::{NewPatient, Patient, PatientChanges};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Result,
  encode::{PATIENT_COLUMNS, RawPatient, encode_dt, encode_uuid},
  sql::{exists, immediate},
};

pub fn fetch(conn: &Connection, id: &str) -> Result<Option<Patient>> {
  let raw = conn
    .query_row(
      &format!("SELECT {PATIENT_COLUMNS} FROM patients p WHERE p.patient_id = ?1"),
      [id],
      RawPatient::from_row,
    )
    .optional()?;
  raw.map(RawPatient::into_patient).transpose()
}

pub fn create(conn: &Connection, input: NewPatient) -> Result<Patient> {
  let patient = Patient {
    patient_id:        Uuid::new_v4(),
    family_name:       input.family_name.trim().to_owned(),
    given_name:        input.given_name.trim().to_owned(),
    age:               input.age,
    weight_kg:         input.weight_kg,
    height_cm:         input.height_cm,
    email:             input.email,
    current_treatment: input.current_treatment,
    created_at:        Utc::now(),
  };
  conn.execute(
    "INSERT INTO patients (
       patient_id, family_name, given_name, age, weight_kg, height_cm,
       email, current_treatment, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    params![
      encode_uuid(patient.patient_id),
      patient.family_name,
      patient.given_name,
      patient.age,
      patient.weight_kg,
      patient.height_cm,
      patient.email,
      patient.current_treatment,
      encode_dt(patient.created_at),
    ],
  )?;
  Ok(patient)
}

pub fn list(conn: &Connection, search: Option<&str>) -> Result<Vec<Patient>> {
  let pattern = search
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| format!("%{s}%"));
  let mut stmt = conn.prepare(&format!(
    "SELECT {PATIENT_COLUMNS} FROM patients p
     WHERE ?1 IS NULL OR p.family_name LIKE ?1 OR p.given_name LIKE ?1
     ORDER BY p.created_at DESC, p.rowid DESC"
  ))?;
  let raws = stmt
    .query_map([pattern], RawPatient::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawPatient::into_patient).collect()
}

pub fn list_for_practitioner(conn: &Connection, practitioner_id: Uuid) -> Result<Vec<Patient>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {PATIENT_COLUMNS} FROM patients p
     WHERE p.patient_id IN (
       SELECT patient_id FROM treatments   WHERE practitioner_id = ?1
       UNION
       SELECT patient_id FROM appointments WHERE practitioner_id = ?1)
     ORDER BY p.family_name, p.given_name"
  ))?;
  let raws = stmt
    .query_map([encode_uuid(practitioner_id)], RawPatient::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawPatient::into_patient).collect()
}

pub fn update(conn: &mut Connection, id: Uuid, changes: PatientChanges) -> Result<Patient> {
  let id_str = encode_uuid(id);
  let tx = immediate(conn)?;
  let Some(mut patient) = fetch(&tx, &id_str)? else {
    return Err(hospital_core::Error::PatientNotFound(id).into());
  };
  changes.apply(&mut patient);

  tx.execute(
    "UPDATE patients SET family_name = ?2, given_name = ?3, age = ?4,
       weight_kg = ?5, height_cm = ?6, email = ?7, current_treatment = ?8
     WHERE patient_id = ?1",
    params![
      id_str,
      patient.family_name,
      patient.given_name,
      patient.age,
      patient.weight_kg,
      patient.height_cm,
      patient.email,
      patient.current_treatment,
    ],
  )?;
  tx.commit()?;
  Ok(patient)
}

/// Appointments and treatments go first; both reference the patient row.
pub fn delete(conn: &mut Connection, id: Uuid) -> Result<()> {
  let id_str = encode_uuid(id);
  let tx = immediate(conn)?;
  if !exists(&tx, "patients", "patient_id", &id_str)? {
    return Err(hospital_core::Error::PatientNotFound(id).into());
  }
  tx.execute("DELETE FROM appointments WHERE patient_id = ?1", [&id_str])?;
  tx.execute("DELETE FROM treatments WHERE patient_id = ?1", [&id_str])?;
  tx.execute("DELETE FROM patients WHERE patient_id = ?1", [&id_str])?;
  tx.commit()?;
  Ok(())
}

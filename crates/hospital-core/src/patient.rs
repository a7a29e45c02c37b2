//! Patients: records owned independently of the staff who treat them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

pub const MAX_AGE: i64 = 150;
pub const MAX_WEIGHT_KG: f64 = 500.0;
pub const MAX_HEIGHT_CM: f64 = 300.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
  pub patient_id:        Uuid,
  pub family_name:       String,
  pub given_name:        String,
  pub age:               i64,
  pub weight_kg:         Option<f64>,
  pub height_cm:         Option<f64>,
  pub email:             Option<String>,
  /// Free-text summary kept by HR; distinct from treatment snapshots.
  pub current_treatment: Option<String>,
  pub created_at:        DateTime<Utc>,
}

impl Patient {
  pub fn display_name(&self) -> String {
    format!("{} {}", self.given_name, self.family_name)
  }
}

/// Input to [`crate::store::HospitalStore::create_patient`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
  pub family_name:       String,
  pub given_name:        String,
  pub age:               i64,
  pub weight_kg:         Option<f64>,
  pub height_cm:         Option<f64>,
  pub email:             Option<String>,
  pub current_treatment: Option<String>,
}

impl NewPatient {
  pub fn validate(&self) -> Result<()> {
    if self.family_name.trim().is_empty() || self.given_name.trim().is_empty() {
      return Err(Error::Validation(
        "family name, given name and age are required".into(),
      ));
    }
    validate_measurements(Some(self.age), self.weight_kg, self.height_cm)
  }
}

/// Partial update; `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientChanges {
  pub family_name:       Option<String>,
  pub given_name:        Option<String>,
  pub age:               Option<i64>,
  pub weight_kg:         Option<f64>,
  pub height_cm:         Option<f64>,
  pub email:             Option<String>,
  pub current_treatment: Option<String>,
}

impl PatientChanges {
  pub fn validate(&self) -> Result<()> {
    let blank = |s: &Option<String>| s.as_deref().is_some_and(|v| v.trim().is_empty());
    if blank(&self.family_name) || blank(&self.given_name) {
      return Err(Error::Validation("names cannot be blank".into()));
    }
    validate_measurements(self.age, self.weight_kg, self.height_cm)
  }

  /// Names are stored trimmed, as on creation.
  pub fn apply(self, patient: &mut Patient) {
    if let Some(v) = self.family_name {
      patient.family_name = v.trim().to_owned();
    }
    if let Some(v) = self.given_name {
      patient.given_name = v.trim().to_owned();
    }
    if let Some(v) = self.age {
      patient.age = v;
    }
    if self.weight_kg.is_some() {
      patient.weight_kg = self.weight_kg;
    }
    if self.height_cm.is_some() {
      patient.height_cm = self.height_cm;
    }
    if self.email.is_some() {
      patient.email = self.email;
    }
    if self.current_treatment.is_some() {
      patient.current_treatment = self.current_treatment;
    }
  }
}

fn validate_measurements(
  age: Option<i64>,
  weight_kg: Option<f64>,
  height_cm: Option<f64>,
) -> Result<()> {
  if let Some(age) = age
    && !(0..=MAX_AGE).contains(&age)
  {
    return Err(Error::Validation(format!("invalid age (0-{MAX_AGE})")));
  }
  if let Some(w) = weight_kg
    && !(0.0..=MAX_WEIGHT_KG).contains(&w)
  {
    return Err(Error::Validation(format!("invalid weight (0-{MAX_WEIGHT_KG}kg)")));
  }
  if let Some(h) = height_cm
    && !(0.0..=MAX_HEIGHT_CM).contains(&h)
  {
    return Err(Error::Validation(format!("invalid height (0-{MAX_HEIGHT_CM}cm)")));
  }
  Ok(())
}

//! Treatment snapshots and the medication lists they carry.
//!
//! A treatment row is an immutable snapshot: adding or removing a medication
//! writes a new snapshot derived from the latest one. The most recent
//! snapshot for a patient is their current treatment.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, patient::Patient};

// ─── Medications ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
  pub name:   String,
  pub dosage: String,
}

impl Medication {
  /// Trim both fields and reject blanks.
  pub fn new(name: impl Into<String>, dosage: impl Into<String>) -> Result<Self> {
    let name = name.into().trim().to_owned();
    let dosage = dosage.into().trim().to_owned();
    if name.is_empty() || dosage.is_empty() {
      return Err(Error::Validation(
        "medication name and dosage are required".into(),
      ));
    }
    Ok(Self { name, dosage })
  }

  fn same_name(&self, name: &str) -> bool {
    self.name.to_lowercase() == name.trim().to_lowercase()
  }
}

impl fmt::Display for Medication {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.name, self.dosage)
  }
}

/// An ordered list of medications with unique (case-insensitive) names.
///
/// Deserialization goes through [`MedicationList::new`], so a list received
/// over the wire or read back from storage is always valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Medication>", into = "Vec<Medication>")]
pub struct MedicationList(Vec<Medication>);

impl MedicationList {
  pub fn new(items: Vec<Medication>) -> Result<Self> {
    let mut list = Self::default();
    for item in items {
      let item = Medication::new(item.name, item.dosage)?;
      list = list.with_added(item)?;
    }
    Ok(list)
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn iter(&self) -> impl Iterator<Item = &Medication> { self.0.iter() }

  pub fn contains(&self, name: &str) -> bool {
    self.0.iter().any(|m| m.same_name(name))
  }

  /// A copy of this list with `medication` appended.
  pub fn with_added(&self, medication: Medication) -> Result<Self> {
    if self.contains(&medication.name) {
      return Err(Error::DuplicateMedication(medication.name));
    }
    let mut items = self.0.clone();
    items.push(medication);
    Ok(Self(items))
  }

  /// A copy of this list without the medication called `name`.
  pub fn without(&self, name: &str) -> Result<Self> {
    let name = name.trim();
    if name.is_empty() {
      return Err(Error::Validation("medication name is required".into()));
    }
    if self.0.is_empty() {
      return Err(Error::MedicationNotFound(name.to_owned()));
    }
    let remaining: Vec<_> =
      self.0.iter().filter(|m| !m.same_name(name)).cloned().collect();
    if remaining.len() == self.0.len() {
      return Err(Error::MedicationNotFound(name.to_owned()));
    }
    Ok(Self(remaining))
  }

  /// `a (d), b (d)` as used in patient notices.
  pub fn describe(&self) -> String {
    self.0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
  }
}

impl TryFrom<Vec<Medication>> for MedicationList {
  type Error = Error;

  fn try_from(items: Vec<Medication>) -> Result<Self> { Self::new(items) }
}

impl From<MedicationList> for Vec<Medication> {
  fn from(list: MedicationList) -> Self { list.0 }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// A medication prescribers can pick from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMedication {
  pub medication_id:  Uuid,
  pub name:           String,
  pub default_dosage: Option<String>,
  pub description:    Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCatalogMedication {
  pub name:           String,
  pub default_dosage: Option<String>,
  pub description:    Option<String>,
}

impl NewCatalogMedication {
  /// Trim every field, dropping blank optional ones.
  pub fn normalized(self) -> Result<Self> {
    let name = self.name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::Validation("medication name is required".into()));
    }
    let trimmed = |v: Option<String>| {
      v.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
    };
    Ok(Self {
      name,
      default_dosage: trimmed(self.default_dosage),
      description: trimmed(self.description),
    })
  }
}

// ─── Treatments ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treatment {
  pub treatment_id:    Uuid,
  pub patient_id:      Uuid,
  pub practitioner_id: Uuid,
  pub medications:     MedicationList,
  pub notes:           Option<String>,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::HospitalStore::record_treatment`].
#[derive(Debug, Clone)]
pub struct NewTreatment {
  pub patient_id:      Uuid,
  pub practitioner_id: Uuid,
  pub medications:     MedicationList,
  pub notes:           Option<String>,
}

impl NewTreatment {
  /// The next snapshot after adding `medication` to `current` (if any).
  pub fn adding(
    current: Option<&Treatment>,
    patient_id: Uuid,
    practitioner_id: Uuid,
    medication: Medication,
  ) -> Result<Self> {
    let base = current.map(|t| t.medications.clone()).unwrap_or_default();
    Ok(Self {
      patient_id,
      practitioner_id,
      medications: base.with_added(medication)?,
      notes: current.and_then(|t| t.notes.clone()),
    })
  }

  /// The next snapshot after removing `name` from `current`.
  pub fn removing(
    current: &Treatment,
    practitioner_id: Uuid,
    name: &str,
  ) -> Result<Self> {
    Ok(Self {
      patient_id: current.patient_id,
      practitioner_id,
      medications: current.medications.without(name)?,
      notes: current.notes.clone(),
    })
  }
}

/// A change to one medication, applied by the store to whichever snapshot
/// is current when the write happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MedicationEdit {
  Add(Medication),
  Remove(String),
}

impl MedicationEdit {
  /// The next snapshot for `patient_id`. Removing from a patient with no
  /// snapshot fails with [`Error::NoTreatment`].
  pub fn apply(
    &self,
    current: Option<&Treatment>,
    patient_id: Uuid,
    practitioner_id: Uuid,
  ) -> Result<NewTreatment> {
    match self {
      Self::Add(medication) => {
        NewTreatment::adding(current, patient_id, practitioner_id, medication.clone())
      }
      Self::Remove(name) => {
        let current = current.ok_or(Error::NoTreatment(patient_id))?;
        NewTreatment::removing(current, practitioner_id, name)
      }
    }
  }
}

/// A treatment joined with its prescriber's name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentView {
  #[serde(flatten)]
  pub treatment:         Treatment,
  pub practitioner_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientTreatments {
  pub patient:    Patient,
  pub treatments: Vec<TreatmentView>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn med(name: &str, dosage: &str) -> Medication {
    Medication { name: name.into(), dosage: dosage.into() }
  }

  #[test]
  fn list_trims_and_rejects_duplicates() {
    let list =
      MedicationList::new(vec![med(" Aspirin ", "100mg "), med("Ibuprofen", "200mg")])
        .unwrap();
    assert_eq!(list.describe(), "Aspirin (100mg), Ibuprofen (200mg)");

    let dup = MedicationList::new(vec![med("Aspirin", "1"), med("aspirin", "2")]);
    assert!(matches!(dup, Err(Error::DuplicateMedication(_))));

    let blank = MedicationList::new(vec![med("  ", "1")]);
    assert!(matches!(blank, Err(Error::Validation(_))));
  }

  #[test]
  fn deserialization_validates() {
    let ok: MedicationList =
      serde_json::from_str(r#"[{"name":"Aspirin","dosage":"100mg"}]"#).unwrap();
    assert_eq!(ok.len(), 1);
    let bad = serde_json::from_str::<MedicationList>(
      r#"[{"name":"A","dosage":"1"},{"name":"a","dosage":"2"}]"#,
    );
    assert!(bad.is_err());
  }

  #[test]
  fn removal_is_case_insensitive_and_reports_absence() {
    let list = MedicationList::new(vec![med("Aspirin", "100mg")]).unwrap();
    assert!(list.without("ASPIRIN").unwrap().is_empty());
    assert!(matches!(list.without("Paracetamol"), Err(Error::MedicationNotFound(_))));
    assert!(matches!(
      MedicationList::default().without("Aspirin"),
      Err(Error::MedicationNotFound(_))
    ));
  }

  #[test]
  fn adding_starts_from_empty_and_carries_notes() {
    let patient = Uuid::new_v4();
    let doctor = Uuid::new_v4();
    let first =
      NewTreatment::adding(None, patient, doctor, med("Aspirin", "100mg")).unwrap();
    assert_eq!(first.medications.len(), 1);
    assert_eq!(first.notes, None);

    let current = Treatment {
      treatment_id:    Uuid::new_v4(),
      patient_id:      patient,
      practitioner_id: doctor,
      medications:     first.medications,
      notes:           Some("with food".into()),
      created_at:      Utc::now(),
    };
    let next = NewTreatment::adding(Some(&current), patient, doctor, med("Zinc", "5mg"))
      .unwrap();
    assert_eq!(next.medications.describe(), "Aspirin (100mg), Zinc (5mg)");
    assert_eq!(next.notes.as_deref(), Some("with food"));
  }
}

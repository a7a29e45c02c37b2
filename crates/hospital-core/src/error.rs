//! Error types for `hospital-core`.

use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use crate::appointment::AppointmentStatus;

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ──────────────────────────────────────────────────────────
  #[error("{0}")]
  Validation(String),

  #[error("appointment time must be in the future (got {0})")]
  PastTimestamp(NaiveDateTime),

  #[error("cannot change an appointment from {from} to {to}")]
  InvalidTransition {
    from: AppointmentStatus,
    to:   AppointmentStatus,
  },

  #[error("unknown role: {0:?}")]
  UnknownRole(String),

  // ── Authorization ───────────────────────────────────────────────────────
  #[error("{0}")]
  Unauthorized(String),

  #[error("{0}")]
  Forbidden(String),

  // ── Not found ───────────────────────────────────────────────────────────
  #[error("patient not found: {0}")]
  PatientNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("appointment not found: {0}")]
  AppointmentNotFound(Uuid),

  #[error("message not found: {0}")]
  MessageNotFound(Uuid),

  #[error("no treatment on file for patient {0}")]
  NoTreatment(Uuid),

  #[error("medication not in the current treatment: {0}")]
  MedicationNotFound(String),

  // ── Conflicts ───────────────────────────────────────────────────────────
  #[error("time slot not available (conflicts with appointment {0})")]
  SlotTaken(Uuid),

  #[error("medication already in the treatment: {0}")]
  DuplicateMedication(String),

  #[error("email already in use: {0}")]
  EmailTaken(String),

  #[error("medication already in the catalog: {0}")]
  CatalogDuplicate(String),

  #[error("practitioner {0} still owns treatments or appointments")]
  PractitionerHasRecords(Uuid),
}

impl Error {
  /// Short machine-oriented category carried in every error response.
  pub fn category(&self) -> &'static str {
    match self {
      Self::Validation(_)
      | Self::PastTimestamp(_)
      | Self::InvalidTransition { .. }
      | Self::UnknownRole(_) => "validation",
      Self::Unauthorized(_) => "unauthorized",
      Self::Forbidden(_) => "forbidden",
      Self::PatientNotFound(_)
      | Self::UserNotFound(_)
      | Self::AppointmentNotFound(_)
      | Self::MessageNotFound(_)
      | Self::NoTreatment(_)
      | Self::MedicationNotFound(_) => "not_found",
      Self::SlotTaken(_)
      | Self::DuplicateMedication(_)
      | Self::EmailTaken(_)
      | Self::CatalogDuplicate(_)
      | Self::PractitionerHasRecords(_) => "conflict",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

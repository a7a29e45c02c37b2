//! Appointments between a patient and a practitioner.
//!
//! Appointments are never deleted through the booking workflow; cancellation
//! is a status change. Scheduled times are practitioner-local wall-clock
//! values ([`NaiveDateTime`]), while `created_at` is a UTC instant.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
  #[default]
  Scheduled,
  Completed,
  Canceled,
}

impl AppointmentStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Scheduled => "scheduled",
      Self::Completed => "completed",
      Self::Canceled => "canceled",
    }
  }

  /// Completed and canceled appointments admit no further transition.
  pub fn is_terminal(self) -> bool { !matches!(self, Self::Scheduled) }

  /// Whether the appointment still occupies its practitioner's calendar.
  pub fn blocks_calendar(self) -> bool { !matches!(self, Self::Canceled) }
}

impl fmt::Display for AppointmentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Appointment ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
  pub appointment_id:  Uuid,
  pub patient_id:      Uuid,
  pub practitioner_id: Uuid,
  pub scheduled_at:    NaiveDateTime,
  pub notes:           Option<String>,
  pub status:          AppointmentStatus,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::HospitalStore::book_appointment`].
#[derive(Debug, Clone)]
pub struct NewAppointment {
  pub patient_id:      Uuid,
  pub practitioner_id: Uuid,
  pub scheduled_at:    NaiveDateTime,
  pub notes:           Option<String>,
}

/// The full set of field values an update writes back, computed by
/// [`crate::schedule::plan_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentWrite {
  /// The status the write was planned against. The store refuses the write
  /// if the stored row has moved on since.
  pub expected:        AppointmentStatus,
  pub scheduled_at:    NaiveDateTime,
  pub status:          AppointmentStatus,
  pub notes:           Option<String>,
  /// Run the conflict scan (excluding this appointment) before writing.
  pub check_conflicts: bool,
}

/// An appointment joined with the names of the people involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentView {
  #[serde(flatten)]
  pub appointment:       Appointment,
  pub patient_name:      Option<String>,
  pub practitioner_name: Option<String>,
}

/// Filters for a practitioner's agenda.
#[derive(Debug, Clone)]
pub struct AgendaQuery {
  pub practitioner_id: Uuid,
  pub date:            Option<NaiveDate>,
  pub status:          Option<AppointmentStatus>,
}

impl AgendaQuery {
  pub fn new(practitioner_id: Uuid) -> Self {
    Self { practitioner_id, date: None, status: None }
  }
}

//! Patient notices and the outbox rows that carry them.
//!
//! Notices are enqueued in the same transaction as the change they describe
//! and delivered later by a dispatcher. The recipient id may name a patient
//! (delivered by email) or a staff user (delivered as an internal message).

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  message::MessageCategory,
  treatment::{Medication, MedicationList},
};

/// Render a scheduled time as shown to patients: `DD/MM/YYYY HH:MM`.
pub fn format_when(at: NaiveDateTime) -> String {
  at.format("%d/%m/%Y %H:%M").to_string()
}

// ─── Notices ─────────────────────────────────────────────────────────────────

/// Something a patient should be told about. `practitioner` is the display
/// title, e.g. `Dr. Jane Doe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
  AppointmentScheduled { practitioner: String, at: NaiveDateTime },
  AppointmentRescheduled { practitioner: String, at: NaiveDateTime },
  AppointmentCanceled { practitioner: String },
  TreatmentUpdated { practitioner: String, medications: MedicationList },
  MedicationAdded { practitioner: String, medication: Medication },
  MedicationRemoved { practitioner: String, name: String },
}

impl Notice {
  pub fn category(&self) -> MessageCategory {
    match self {
      Self::AppointmentScheduled { .. }
      | Self::AppointmentRescheduled { .. }
      | Self::AppointmentCanceled { .. } => MessageCategory::Appointment,
      Self::TreatmentUpdated { .. }
      | Self::MedicationAdded { .. }
      | Self::MedicationRemoved { .. } => MessageCategory::Treatment,
    }
  }

  pub fn subject(&self) -> &'static str {
    match self.category() {
      MessageCategory::Appointment => "Your appointment",
      MessageCategory::Treatment => "Your treatment",
      MessageCategory::General => "Message from the hospital",
    }
  }

  pub fn body(&self) -> String {
    match self {
      Self::AppointmentScheduled { practitioner, at } => format!(
        "New appointment scheduled with {practitioner} on {}",
        format_when(*at)
      ),
      Self::AppointmentRescheduled { practitioner, at } => format!(
        "Your appointment with {practitioner} has been moved to {}",
        format_when(*at)
      ),
      Self::AppointmentCanceled { practitioner } => {
        format!("Your appointment with {practitioner} has been canceled")
      }
      Self::TreatmentUpdated { practitioner, medications } => format!(
        "Your treatment was updated by {practitioner}. New medications: {}",
        medications.describe()
      ),
      Self::MedicationAdded { practitioner, medication } => format!(
        "New medication added to your treatment by {practitioner}: {medication}"
      ),
      Self::MedicationRemoved { practitioner, name } => {
        format!("Medication removed from your treatment by {practitioner}: {name}")
      }
    }
  }

  /// The outbox row for this notice.
  pub fn to(&self, recipient_id: Uuid, sender_id: Uuid) -> NewNotification {
    NewNotification {
      sender_id,
      recipient_id,
      subject: self.subject().to_owned(),
      body: self.body(),
      category: self.category(),
    }
  }
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
  pub sender_id:    Uuid,
  pub recipient_id: Uuid,
  pub subject:      String,
  pub body:         String,
  pub category:     MessageCategory,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
  #[default]
  Pending,
  Delivered,
  Failed,
}

impl OutboxStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Delivered => "delivered",
      Self::Failed => "failed",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "pending" => Ok(Self::Pending),
      "delivered" => Ok(Self::Delivered),
      "failed" => Ok(Self::Failed),
      other => Err(Error::Validation(format!("unknown outbox status: {other:?}"))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
  pub notification_id: Uuid,
  pub sender_id:       Uuid,
  pub recipient_id:    Uuid,
  pub subject:         String,
  pub body:            String,
  pub category:        MessageCategory,
  pub attempts:        u32,
  pub status:          OutboxStatus,
  pub last_error:      Option<String>,
  pub created_at:      DateTime<Utc>,
}

//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Creation timestamps are RFC 3339 UTC with fixed microsecond precision so
//! that text order equals time order. Scheduled times are naive wall-clock
//! values. Medication lists are compact JSON. UUIDs are hyphenated lowercase.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use hospital_core::{
  access::Role,
  appointment::{Appointment, AppointmentStatus, AppointmentView},
  message::{Message, MessageCategory, MessageView},
  notification::{OutboxEntry, OutboxStatus},
  patient::Patient,
  treatment::{MedicationList, Treatment, TreatmentView},
  user::User,
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn encode_naive(at: NaiveDateTime) -> String {
  at.format(NAIVE_FORMAT).to_string()
}

pub fn decode_naive(s: &str) -> Result<NaiveDateTime> {
  NaiveDateTime::parse_from_str(s, NAIVE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn decode_role(s: &str) -> Result<Role> {
  s.parse().map_err(|_| Error::Corrupt { column: "role", value: s.to_owned() })
}

pub fn decode_status(s: &str) -> Result<AppointmentStatus> {
  match s {
    "scheduled" => Ok(AppointmentStatus::Scheduled),
    "completed" => Ok(AppointmentStatus::Completed),
    "canceled" => Ok(AppointmentStatus::Canceled),
    other => Err(Error::Corrupt { column: "status", value: other.to_owned() }),
  }
}

pub fn decode_category(s: &str) -> Result<MessageCategory> {
  MessageCategory::parse(s)
    .map_err(|_| Error::Corrupt { column: "category", value: s.to_owned() })
}

pub fn decode_outbox_status(s: &str) -> Result<OutboxStatus> {
  OutboxStatus::parse(s)
    .map_err(|_| Error::Corrupt { column: "status", value: s.to_owned() })
}

pub fn encode_medications(list: &MedicationList) -> Result<String> {
  Ok(serde_json::to_string(list)?)
}

/// Stored lists pass through [`MedicationList`] validation on the way out.
pub fn decode_medications(s: &str) -> Result<MedicationList> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawUser::from_row`]; expects the alias `u`.
pub const USER_COLUMNS: &str =
  "u.user_id, u.family_name, u.given_name, u.email, u.role, u.created_at";

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:     String,
  pub family_name: String,
  pub given_name:  String,
  pub email:       String,
  pub role:        String,
  pub created_at:  String,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:     row.get(0)?,
      family_name: row.get(1)?,
      given_name:  row.get(2)?,
      email:       row.get(3)?,
      role:        row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:     decode_uuid(&self.user_id)?,
      family_name: self.family_name,
      given_name:  self.given_name,
      email:       self.email,
      role:        decode_role(&self.role)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Expects the alias `p`.
pub const PATIENT_COLUMNS: &str = "p.patient_id, p.family_name, p.given_name, \
   p.age, p.weight_kg, p.height_cm, p.email, p.current_treatment, p.created_at";

pub struct RawPatient {
  pub patient_id:        String,
  pub family_name:       String,
  pub given_name:        String,
  pub age:               i64,
  pub weight_kg:         Option<f64>,
  pub height_cm:         Option<f64>,
  pub email:             Option<String>,
  pub current_treatment: Option<String>,
  pub created_at:        String,
}

impl RawPatient {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      patient_id:        row.get(0)?,
      family_name:       row.get(1)?,
      given_name:        row.get(2)?,
      age:               row.get(3)?,
      weight_kg:         row.get(4)?,
      height_cm:         row.get(5)?,
      email:             row.get(6)?,
      current_treatment: row.get(7)?,
      created_at:        row.get(8)?,
    })
  }

  pub fn into_patient(self) -> Result<Patient> {
    Ok(Patient {
      patient_id:        decode_uuid(&self.patient_id)?,
      family_name:       self.family_name,
      given_name:        self.given_name,
      age:               self.age,
      weight_kg:         self.weight_kg,
      height_cm:         self.height_cm,
      email:             self.email,
      current_treatment: self.current_treatment,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Expects the alias `a`.
pub const APPOINTMENT_COLUMNS: &str = "a.appointment_id, a.patient_id, \
   a.practitioner_id, a.scheduled_at, a.notes, a.status, a.created_at";

pub struct RawAppointment {
  pub appointment_id:  String,
  pub patient_id:      String,
  pub practitioner_id: String,
  pub scheduled_at:    String,
  pub notes:           Option<String>,
  pub status:          String,
  pub created_at:      String,
}

impl RawAppointment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      appointment_id:  row.get(0)?,
      patient_id:      row.get(1)?,
      practitioner_id: row.get(2)?,
      scheduled_at:    row.get(3)?,
      notes:           row.get(4)?,
      status:          row.get(5)?,
      created_at:      row.get(6)?,
    })
  }

  pub fn into_appointment(self) -> Result<Appointment> {
    Ok(Appointment {
      appointment_id:  decode_uuid(&self.appointment_id)?,
      patient_id:      decode_uuid(&self.patient_id)?,
      practitioner_id: decode_uuid(&self.practitioner_id)?,
      scheduled_at:    decode_naive(&self.scheduled_at)?,
      notes:           self.notes,
      status:          decode_status(&self.status)?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// An appointment row followed by `patient_name, practitioner_name`.
pub struct RawAppointmentView {
  pub appointment:       RawAppointment,
  pub patient_name:      Option<String>,
  pub practitioner_name: Option<String>,
}

impl RawAppointmentView {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      appointment:       RawAppointment::from_row(row)?,
      patient_name:      row.get(7)?,
      practitioner_name: row.get(8)?,
    })
  }

  pub fn into_view(self) -> Result<AppointmentView> {
    Ok(AppointmentView {
      appointment:       self.appointment.into_appointment()?,
      patient_name:      self.patient_name,
      practitioner_name: self.practitioner_name,
    })
  }
}

/// Expects the alias `t`.
pub const TREATMENT_COLUMNS: &str = "t.treatment_id, t.patient_id, \
   t.practitioner_id, t.medications, t.notes, t.created_at";

pub struct RawTreatment {
  pub treatment_id:    String,
  pub patient_id:      String,
  pub practitioner_id: String,
  pub medications:     String,
  pub notes:           Option<String>,
  pub created_at:      String,
}

impl RawTreatment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      treatment_id:    row.get(0)?,
      patient_id:      row.get(1)?,
      practitioner_id: row.get(2)?,
      medications:     row.get(3)?,
      notes:           row.get(4)?,
      created_at:      row.get(5)?,
    })
  }

  pub fn into_treatment(self) -> Result<Treatment> {
    Ok(Treatment {
      treatment_id:    decode_uuid(&self.treatment_id)?,
      patient_id:      decode_uuid(&self.patient_id)?,
      practitioner_id: decode_uuid(&self.practitioner_id)?,
      medications:     decode_medications(&self.medications)?,
      notes:           self.notes,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// A treatment row followed by `practitioner_name`.
pub struct RawTreatmentView {
  pub treatment:         RawTreatment,
  pub practitioner_name: Option<String>,
}

impl RawTreatmentView {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      treatment:         RawTreatment::from_row(row)?,
      practitioner_name: row.get(6)?,
    })
  }

  pub fn into_view(self) -> Result<TreatmentView> {
    Ok(TreatmentView {
      treatment:         self.treatment.into_treatment()?,
      practitioner_name: self.practitioner_name,
    })
  }
}

/// Expects the alias `m`.
pub const MESSAGE_COLUMNS: &str = "m.message_id, m.sender_id, m.recipient_id, \
   m.body, m.category, m.read, m.created_at";

pub struct RawMessage {
  pub message_id:   String,
  pub sender_id:    String,
  pub recipient_id: String,
  pub body:         String,
  pub category:     String,
  pub read:         bool,
  pub created_at:   String,
}

impl RawMessage {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:   row.get(0)?,
      sender_id:    row.get(1)?,
      recipient_id: row.get(2)?,
      body:         row.get(3)?,
      category:     row.get(4)?,
      read:         row.get(5)?,
      created_at:   row.get(6)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      message_id:   decode_uuid(&self.message_id)?,
      sender_id:    decode_uuid(&self.sender_id)?,
      recipient_id: decode_uuid(&self.recipient_id)?,
      body:         self.body,
      category:     decode_category(&self.category)?,
      read:         self.read,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// A message row followed by
/// `sender_name, sender_role, recipient_name, recipient_role`.
pub struct RawMessageView {
  pub message:        RawMessage,
  pub sender_name:    Option<String>,
  pub sender_role:    Option<String>,
  pub recipient_name: Option<String>,
  pub recipient_role: Option<String>,
}

impl RawMessageView {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message:        RawMessage::from_row(row)?,
      sender_name:    row.get(7)?,
      sender_role:    row.get(8)?,
      recipient_name: row.get(9)?,
      recipient_role: row.get(10)?,
    })
  }

  pub fn into_view(self) -> Result<MessageView> {
    Ok(MessageView {
      message:        self.message.into_message()?,
      sender_name:    self.sender_name,
      sender_role:    self.sender_role.as_deref().map(decode_role).transpose()?,
      recipient_name: self.recipient_name,
      recipient_role: self.recipient_role.as_deref().map(decode_role).transpose()?,
    })
  }
}

/// Expects the alias `n`.
pub const OUTBOX_COLUMNS: &str = "n.notification_id, n.sender_id, \
   n.recipient_id, n.subject, n.body, n.category, n.attempts, n.status, \
   n.last_error, n.created_at";

pub struct RawOutboxEntry {
  pub notification_id: String,
  pub sender_id:       String,
  pub recipient_id:    String,
  pub subject:         String,
  pub body:            String,
  pub category:        String,
  pub attempts:        u32,
  pub status:          String,
  pub last_error:      Option<String>,
  pub created_at:      String,
}

impl RawOutboxEntry {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      sender_id:       row.get(1)?,
      recipient_id:    row.get(2)?,
      subject:         row.get(3)?,
      body:            row.get(4)?,
      category:        row.get(5)?,
      attempts:        row.get(6)?,
      status:          row.get(7)?,
      last_error:      row.get(8)?,
      created_at:      row.get(9)?,
    })
  }

  pub fn into_entry(self) -> Result<OutboxEntry> {
    Ok(OutboxEntry {
      notification_id: decode_uuid(&self.notification_id)?,
      sender_id:       decode_uuid(&self.sender_id)?,
      recipient_id:    decode_uuid(&self.recipient_id)?,
      subject:         self.subject,
      body:            self.body,
      category:        decode_category(&self.category)?,
      attempts:        self.attempts,
      status:          decode_outbox_status(&self.status)?,
      last_error:      self.last_error,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

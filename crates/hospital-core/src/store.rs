//! The `HospitalStore` trait: the persistence boundary.
//!
//! The trait is implemented by storage backends (e.g. `hospital-store-sqlite`).
//! The REST layer and the notification dispatcher depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::{
  Error,
  access::Role,
  appointment::{
    AgendaQuery, Appointment, AppointmentView, AppointmentWrite, NewAppointment,
  },
  message::{Message, MessageView, NewMessage},
  notification::{NewNotification, OutboxEntry},
  patient::{NewPatient, Patient, PatientChanges},
  treatment::{
    CatalogMedication, MedicationEdit, NewCatalogMedication, NewTreatment, Treatment,
    TreatmentView,
  },
  user::{
    NewUser, PractitionerStats, Statistics, User, UserChanges, UserCredentials,
  },
};

/// Backend errors expose the domain error they carry, if any, so callers can
/// tell a rule violation detected inside a transaction (slot taken, duplicate
/// email) from an infrastructure failure.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn domain(&self) -> Option<&Error>;
}

/// Who an outbox row is addressed to.
#[derive(Debug, Clone, PartialEq)]
pub enum Recipient {
  Patient(Patient),
  User(User),
}

/// Abstraction over a hospital store backend.
///
/// Writes that must be atomic with a conflict check or a notification take
/// both inputs in one call; the backend runs them in a single transaction.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait HospitalStore: Send + Sync {
  type Error: StoreError;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Fails with [`Error::EmailTaken`] when the address is already in use.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Look up an account and its password hash by exact email.
  fn find_credentials(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<UserCredentials>, Self::Error>> + Send + '_;

  /// All accounts, optionally restricted to one role, newest first.
  fn list_users(
    &self,
    role: Option<Role>,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  fn update_user(
    &self,
    id: Uuid,
    changes: UserChanges,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Delete an account and every message it sent or received. A doctor who
  /// still owns treatments or appointments cannot be deleted.
  fn delete_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn practitioner_stats(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<PractitionerStats, Self::Error>> + Send + '_;

  /// Global counters; monthly buckets cover the six months ending at `today`.
  fn statistics(
    &self,
    today: NaiveDate,
  ) -> impl Future<Output = Result<Statistics, Self::Error>> + Send + '_;

  // ── Patients ──────────────────────────────────────────────────────────

  fn create_patient(
    &self,
    input: NewPatient,
  ) -> impl Future<Output = Result<Patient, Self::Error>> + Send + '_;

  fn get_patient(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Patient>, Self::Error>> + Send + '_;

  /// Newest first; `search` matches a substring of either name.
  fn list_patients(
    &self,
    search: Option<String>,
  ) -> impl Future<Output = Result<Vec<Patient>, Self::Error>> + Send + '_;

  /// Patients with at least one treatment or appointment by the practitioner,
  /// ordered by family then given name.
  fn list_practitioner_patients(
    &self,
    practitioner_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Patient>, Self::Error>> + Send + '_;

  fn update_patient(
    &self,
    id: Uuid,
    changes: PatientChanges,
  ) -> impl Future<Output = Result<Patient, Self::Error>> + Send + '_;

  /// Remove the patient with its treatments and appointments.
  fn delete_patient(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Appointments ──────────────────────────────────────────────────────

  /// Check for conflicts and insert the appointment and its notification
  /// atomically. Fails with [`Error::SlotTaken`] or
  /// [`Error::PatientNotFound`].
  fn book_appointment(
    &self,
    input: NewAppointment,
    notice: NewNotification,
  ) -> impl Future<Output = Result<Appointment, Self::Error>> + Send + '_;

  fn get_appointment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Appointment>, Self::Error>> + Send + '_;

  /// Write back `write`, re-running the conflict scan first when requested,
  /// and enqueue `notice` in the same transaction.
  fn update_appointment(
    &self,
    id: Uuid,
    write: AppointmentWrite,
    notice: Option<NewNotification>,
  ) -> impl Future<Output = Result<Appointment, Self::Error>> + Send + '_;

  /// A practitioner's appointments in chronological order.
  fn list_agenda(
    &self,
    query: AgendaQuery,
  ) -> impl Future<Output = Result<Vec<AppointmentView>, Self::Error>> + Send + '_;

  /// A patient's appointments, most recent first.
  fn list_patient_appointments(
    &self,
    patient_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AppointmentView>, Self::Error>> + Send + '_;

  /// Start times of the practitioner's non-canceled appointments that could
  /// conflict with a mark on `date`.
  fn booked_times(
    &self,
    practitioner_id: Uuid,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<NaiveDateTime>, Self::Error>> + Send + '_;

  // ── Treatments ────────────────────────────────────────────────────────

  /// Append a treatment snapshot and its notification atomically.
  fn record_treatment(
    &self,
    input: NewTreatment,
    notice: NewNotification,
  ) -> impl Future<Output = Result<Treatment, Self::Error>> + Send + '_;

  /// Apply `edit` to the patient's latest snapshot and append the result
  /// with its notification, all in one transaction.
  fn edit_medications(
    &self,
    patient_id: Uuid,
    practitioner_id: Uuid,
    edit: MedicationEdit,
    notice: NewNotification,
  ) -> impl Future<Output = Result<Treatment, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_treatments(
    &self,
    patient_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TreatmentView>, Self::Error>> + Send + '_;

  /// The latest snapshot, if any.
  fn current_treatment(
    &self,
    patient_id: Uuid,
  ) -> impl Future<Output = Result<Option<Treatment>, Self::Error>> + Send + '_;

  /// The medication catalog, alphabetical.
  fn list_catalog(
    &self,
  ) -> impl Future<Output = Result<Vec<CatalogMedication>, Self::Error>> + Send + '_;

  /// Fails with [`Error::CatalogDuplicate`] when the name (ignoring case) is
  /// already listed.
  fn add_to_catalog(
    &self,
    input: NewCatalogMedication,
  ) -> impl Future<Output = Result<CatalogMedication, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  /// Fails with [`Error::UserNotFound`] when the recipient is not a user.
  fn send_message(
    &self,
    input: NewMessage,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  fn get_message(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + '_;

  /// Sent and received messages, newest first.
  fn messages_for(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MessageView>, Self::Error>> + Send + '_;

  fn unread_for(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MessageView>, Self::Error>> + Send + '_;

  fn mark_read(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// Returns how many messages changed state.
  fn mark_all_read(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn delete_message(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Outbox ────────────────────────────────────────────────────────────

  /// Oldest pending rows that have been tried fewer than `max_attempts` times.
  fn pending_notifications(
    &self,
    limit: usize,
    max_attempts: u32,
  ) -> impl Future<Output = Result<Vec<OutboxEntry>, Self::Error>> + Send + '_;

  fn resolve_recipient(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Recipient>, Self::Error>> + Send + '_;

  /// Insert the entry as an internal message and mark it delivered in one
  /// transaction.
  fn deliver_as_message(
    &self,
    entry: OutboxEntry,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  fn mark_notification_delivered(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Record a failed attempt. With `give_up` the row leaves the queue.
  fn mark_notification_failed(
    &self,
    id: Uuid,
    error: String,
    give_up: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

//! [`SqliteStore`], the SQLite implementation of [`HospitalStore`].

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use hospital_core::{
  access::Role,
  appointment::{
    AgendaQuery, Appointment, AppointmentView, AppointmentWrite, NewAppointment,
  },
  message::{Message, MessageView, NewMessage},
  notification::{NewNotification, OutboxEntry},
  patient::{NewPatient, Patient, PatientChanges},
  store::{HospitalStore, Recipient},
  treatment::{
    CatalogMedication, MedicationEdit, NewCatalogMedication, NewTreatment, Treatment,
    TreatmentView,
  },
  user::{
    NewUser, PractitionerStats, Statistics, User, UserChanges, UserCredentials,
  },
};

use crate::{
  Error, Result,
  encode::encode_uuid,
  schema::SCHEMA,
  sql::{appointments, catalog, messages, outbox, patients, treatments, users},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A hospital store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All
/// statements run on the connection's own thread, one closure at a time.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread. Database failures and domain rule
  /// violations both come back as [`Error`].
  async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

// ─── HospitalStore impl ──────────────────────────────────────────────────────

impl HospitalStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    self.with_conn(move |conn| users::create(conn, input)).await
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);
    self.with_conn(move |conn| users::fetch(conn, &id_str)).await
  }

  async fn find_credentials(&self, email: String) -> Result<Option<UserCredentials>> {
    self
      .with_conn(move |conn| users::find_credentials(conn, &email))
      .await
  }

  async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>> {
    self.with_conn(move |conn| users::list(conn, role)).await
  }

  async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User> {
    self
      .with_conn(move |conn| users::update(conn, id, changes))
      .await
  }

  async fn delete_user(&self, id: Uuid) -> Result<()> {
    self.with_conn(move |conn| users::delete(conn, id)).await
  }

  async fn practitioner_stats(&self, id: Uuid) -> Result<PractitionerStats> {
    self
      .with_conn(move |conn| users::practitioner_stats(conn, id))
      .await
  }

  async fn statistics(&self, today: NaiveDate) -> Result<Statistics> {
    self.with_conn(move |conn| users::statistics(conn, today)).await
  }

  // ── Patients ──────────────────────────────────────────────────────────────

  async fn create_patient(&self, input: NewPatient) -> Result<Patient> {
    self.with_conn(move |conn| patients::create(conn, input)).await
  }

  async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>> {
    let id_str = encode_uuid(id);
    self
      .with_conn(move |conn| patients::fetch(conn, &id_str))
      .await
  }

  async fn list_patients(&self, search: Option<String>) -> Result<Vec<Patient>> {
    self
      .with_conn(move |conn| patients::list(conn, search.as_deref()))
      .await
  }

  async fn list_practitioner_patients(&self, practitioner_id: Uuid) -> Result<Vec<Patient>> {
    self
      .with_conn(move |conn| patients::list_for_practitioner(conn, practitioner_id))
      .await
  }

  async fn update_patient(&self, id: Uuid, changes: PatientChanges) -> Result<Patient> {
    self
      .with_conn(move |conn| patients::update(conn, id, changes))
      .await
  }

  async fn delete_patient(&self, id: Uuid) -> Result<()> {
    self.with_conn(move |conn| patients::delete(conn, id)).await
  }

  // ── Appointments ──────────────────────────────────────────────────────────

  async fn book_appointment(
    &self,
    input:  NewAppointment,
    notice: NewNotification,
  ) -> Result<Appointment> {
    self
      .with_conn(move |conn| appointments::book(conn, input, notice))
      .await
  }

  async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>> {
    let id_str = encode_uuid(id);
    self
      .with_conn(move |conn| appointments::fetch(conn, &id_str))
      .await
  }

  async fn update_appointment(
    &self,
    id:     Uuid,
    write:  AppointmentWrite,
    notice: Option<NewNotification>,
  ) -> Result<Appointment> {
    self
      .with_conn(move |conn| appointments::update(conn, id, write, notice))
      .await
  }

  async fn list_agenda(&self, query: AgendaQuery) -> Result<Vec<AppointmentView>> {
    self
      .with_conn(move |conn| appointments::agenda(conn, query))
      .await
  }

  async fn list_patient_appointments(&self, patient_id: Uuid) -> Result<Vec<AppointmentView>> {
    self
      .with_conn(move |conn| appointments::for_patient(conn, patient_id))
      .await
  }

  async fn booked_times(
    &self,
    practitioner_id: Uuid,
    date:            NaiveDate,
  ) -> Result<Vec<NaiveDateTime>> {
    self
      .with_conn(move |conn| appointments::booked_times(conn, practitioner_id, date))
      .await
  }

  // ── Treatments ────────────────────────────────────────────────────────────

  async fn record_treatment(
    &self,
    input:  NewTreatment,
    notice: NewNotification,
  ) -> Result<Treatment> {
    self
      .with_conn(move |conn| treatments::record(conn, input, notice))
      .await
  }

  async fn edit_medications(
    &self,
    patient_id:      Uuid,
    practitioner_id: Uuid,
    edit:            MedicationEdit,
    notice:          NewNotification,
  ) -> Result<Treatment> {
    self
      .with_conn(move |conn| {
        treatments::edit(conn, patient_id, practitioner_id, &edit, notice)
      })
      .await
  }

  async fn list_treatments(&self, patient_id: Uuid) -> Result<Vec<TreatmentView>> {
    self
      .with_conn(move |conn| treatments::list(conn, patient_id))
      .await
  }

  async fn current_treatment(&self, patient_id: Uuid) -> Result<Option<Treatment>> {
    self
      .with_conn(move |conn| treatments::current(conn, patient_id))
      .await
  }

  async fn list_catalog(&self) -> Result<Vec<CatalogMedication>> {
    self.with_conn(|conn| catalog::list(conn)).await
  }

  async fn add_to_catalog(&self, input: NewCatalogMedication) -> Result<CatalogMedication> {
    let input = input.normalized()?;
    self.with_conn(move |conn| catalog::add(conn, input)).await
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn send_message(&self, input: NewMessage) -> Result<Message> {
    input.validate()?;
    self.with_conn(move |conn| messages::send(conn, input)).await
  }

  async fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
    self.with_conn(move |conn| messages::fetch(conn, id)).await
  }

  async fn messages_for(&self, user_id: Uuid) -> Result<Vec<MessageView>> {
    self
      .with_conn(move |conn| messages::for_user(conn, user_id))
      .await
  }

  async fn unread_for(&self, user_id: Uuid) -> Result<Vec<MessageView>> {
    self
      .with_conn(move |conn| messages::unread_for(conn, user_id))
      .await
  }

  async fn mark_read(&self, id: Uuid) -> Result<Message> {
    self.with_conn(move |conn| messages::mark_read(conn, id)).await
  }

  async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
    self
      .with_conn(move |conn| messages::mark_all_read(conn, user_id))
      .await
  }

  async fn delete_message(&self, id: Uuid) -> Result<()> {
    self.with_conn(move |conn| messages::delete(conn, id)).await
  }

  // ── Outbox ────────────────────────────────────────────────────────────────

  async fn pending_notifications(
    &self,
    limit:        usize,
    max_attempts: u32,
  ) -> Result<Vec<OutboxEntry>> {
    self
      .with_conn(move |conn| outbox::pending(conn, limit, max_attempts))
      .await
  }

  async fn resolve_recipient(&self, id: Uuid) -> Result<Option<Recipient>> {
    self
      .with_conn(move |conn| outbox::resolve_recipient(conn, id))
      .await
  }

  async fn deliver_as_message(&self, entry: OutboxEntry) -> Result<Message> {
    self
      .with_conn(move |conn| outbox::deliver_as_message(conn, entry))
      .await
  }

  async fn mark_notification_delivered(&self, id: Uuid) -> Result<()> {
    self
      .with_conn(move |conn| outbox::mark_delivered(conn, id))
      .await
  }

  async fn mark_notification_failed(
    &self,
    id:      Uuid,
    error:   String,
    give_up: bool,
  ) -> Result<()> {
    self
      .with_conn(move |conn| outbox::mark_failed(conn, id, &error, give_up))
      .await
  }
}

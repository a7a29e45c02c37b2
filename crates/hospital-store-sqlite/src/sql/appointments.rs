use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use hospital_core::{
  appointment::{
    AgendaQuery, Appointment, AppointmentStatus, AppointmentView,
    AppointmentWrite, NewAppointment,
  },
  notification::NewNotification,
  schedule::{CONFLICT_WINDOW_MINUTES, find_conflict},
};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    APPOINTMENT_COLUMNS, RawAppointment, RawAppointmentView, decode_naive,
    decode_uuid, encode_dt, encode_naive, encode_uuid,
  },
  sql::{exists, immediate, outbox},
};

const VIEW_JOINS: &str = "
  LEFT JOIN patients p ON p.patient_id = a.patient_id
  LEFT JOIN users    u ON u.user_id    = a.practitioner_id";

const VIEW_NAMES: &str = "p.given_name || ' ' || p.family_name,
  u.given_name || ' ' || u.family_name";

/// Non-canceled appointments of `practitioner_id` starting strictly between
/// `after` and `before`, excluding `exclude`.
fn blocking_between(
  conn: &Connection,
  practitioner_id: &str,
  after: NaiveDateTime,
  before: NaiveDateTime,
  exclude: Option<&str>,
) -> Result<Vec<(Uuid, NaiveDateTime)>> {
  let mut stmt = conn.prepare(
    "SELECT appointment_id, scheduled_at FROM appointments
     WHERE practitioner_id = ?1
       AND status != 'canceled'
       AND scheduled_at > ?2 AND scheduled_at < ?3
       AND appointment_id IS NOT ?4
     ORDER BY scheduled_at",
  )?;
  let rows = stmt
    .query_map(
      params![practitioner_id, encode_naive(after), encode_naive(before), exclude],
      |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  rows
    .into_iter()
    .map(|(id, at)| Ok((decode_uuid(&id)?, decode_naive(&at)?)))
    .collect()
}

/// Run the conflict rule for `requested` against the stored calendar.
fn ensure_free(
  conn: &Connection,
  practitioner_id: &str,
  requested: NaiveDateTime,
  exclude: Option<&str>,
) -> Result<()> {
  let window = TimeDelta::minutes(CONFLICT_WINDOW_MINUTES);
  let candidates =
    blocking_between(conn, practitioner_id, requested - window, requested + window, exclude)?;
  match find_conflict(candidates, requested) {
    Some(existing) => Err(hospital_core::Error::SlotTaken(existing).into()),
    None => Ok(()),
  }
}

pub fn fetch(conn: &Connection, id: &str) -> Result<Option<Appointment>> {
  let raw = conn
    .query_row(
      &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments a WHERE a.appointment_id = ?1"),
      [id],
      RawAppointment::from_row,
    )
    .optional()?;
  raw.map(RawAppointment::into_appointment).transpose()
}

pub fn book(
  conn: &mut Connection,
  input: NewAppointment,
  notice: NewNotification,
) -> Result<Appointment> {
  let patient_id = encode_uuid(input.patient_id);
  let practitioner_id = encode_uuid(input.practitioner_id);

  let tx = immediate(conn)?;
  if !exists(&tx, "patients", "patient_id", &patient_id)? {
    return Err(hospital_core::Error::PatientNotFound(input.patient_id).into());
  }
  if !exists(&tx, "users", "user_id", &practitioner_id)? {
    return Err(hospital_core::Error::UserNotFound(input.practitioner_id).into());
  }
  ensure_free(&tx, &practitioner_id, input.scheduled_at, None)?;

  let appointment = Appointment {
    appointment_id:  Uuid::new_v4(),
    patient_id:      input.patient_id,
    practitioner_id: input.practitioner_id,
    scheduled_at:    input.scheduled_at,
    notes:           input.notes,
    status:          AppointmentStatus::Scheduled,
    created_at:      Utc::now(),
  };
  tx.execute(
    "INSERT INTO appointments (
       appointment_id, patient_id, practitioner_id, scheduled_at, notes,
       status, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      encode_uuid(appointment.appointment_id),
      patient_id,
      practitioner_id,
      encode_naive(appointment.scheduled_at),
      appointment.notes,
      appointment.status.as_str(),
      encode_dt(appointment.created_at),
    ],
  )?;
  outbox::insert(&tx, &notice)?;
  tx.commit()?;
  Ok(appointment)
}

pub fn update(
  conn: &mut Connection,
  id: Uuid,
  write: AppointmentWrite,
  notice: Option<NewNotification>,
) -> Result<Appointment> {
  let id_str = encode_uuid(id);
  let tx = immediate(conn)?;
  let Some(mut appointment) = fetch(&tx, &id_str)? else {
    return Err(hospital_core::Error::AppointmentNotFound(id).into());
  };
  if appointment.status != write.expected {
    return Err(
      hospital_core::Error::InvalidTransition { from: appointment.status, to: write.status }
        .into(),
    );
  }

  if write.check_conflicts {
    let practitioner_id = encode_uuid(appointment.practitioner_id);
    ensure_free(&tx, &practitioner_id, write.scheduled_at, Some(&id_str))?;
  }

  tx.execute(
    "UPDATE appointments SET scheduled_at = ?2, status = ?3, notes = ?4
     WHERE appointment_id = ?1 AND status = ?5",
    params![
      id_str,
      encode_naive(write.scheduled_at),
      write.status.as_str(),
      write.notes,
      write.expected.as_str(),
    ],
  )?;
  if let Some(notice) = &notice {
    outbox::insert(&tx, notice)?;
  }
  tx.commit()?;

  appointment.scheduled_at = write.scheduled_at;
  appointment.status = write.status;
  appointment.notes = write.notes;
  Ok(appointment)
}

fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
  let start = date.and_time(NaiveTime::MIN);
  (start, start + TimeDelta::days(1))
}

pub fn agenda(conn: &Connection, query: AgendaQuery) -> Result<Vec<AppointmentView>> {
  let (from, until) = match query.date.map(day_bounds) {
    Some((from, until)) => (Some(encode_naive(from)), Some(encode_naive(until))),
    None => (None, None),
  };
  let mut stmt = conn.prepare(&format!(
    "SELECT {APPOINTMENT_COLUMNS}, {VIEW_NAMES}
     FROM appointments a {VIEW_JOINS}
     WHERE a.practitioner_id = ?1
       AND (?2 IS NULL OR a.scheduled_at >= ?2)
       AND (?3 IS NULL OR a.scheduled_at < ?3)
       AND (?4 IS NULL OR a.status = ?4)
     ORDER BY a.scheduled_at, a.rowid"
  ))?;
  let raws = stmt
    .query_map(
      params![
        encode_uuid(query.practitioner_id),
        from,
        until,
        query.status.map(AppointmentStatus::as_str),
      ],
      RawAppointmentView::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawAppointmentView::into_view).collect()
}

pub fn for_patient(conn: &Connection, patient_id: Uuid) -> Result<Vec<AppointmentView>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {APPOINTMENT_COLUMNS}, {VIEW_NAMES}
     FROM appointments a {VIEW_JOINS}
     WHERE a.patient_id = ?1
     ORDER BY a.scheduled_at DESC, a.rowid DESC"
  ))?;
  let raws = stmt
    .query_map([encode_uuid(patient_id)], RawAppointmentView::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawAppointmentView::into_view).collect()
}

/// Includes appointments just outside `date` whose window reaches into it.
pub fn booked_times(
  conn: &Connection,
  practitioner_id: Uuid,
  date: NaiveDate,
) -> Result<Vec<NaiveDateTime>> {
  let window = TimeDelta::minutes(CONFLICT_WINDOW_MINUTES);
  let (start, end) = day_bounds(date);
  let rows = blocking_between(
    conn,
    &encode_uuid(practitioner_id),
    start - window,
    end + window,
    None,
  )?;
  Ok(rows.into_iter().map(|(_, at)| at).collect())
}

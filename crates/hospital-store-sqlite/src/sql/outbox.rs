use chrono::Utc;
use hospital_core::{
  message::{Message, NewMessage},
  notification::{NewNotification, OutboxEntry, OutboxStatus},
  store::Recipient,
};
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::{
  Result,
  encode::{OUTBOX_COLUMNS, RawOutboxEntry, encode_dt, encode_uuid},
  sql::{immediate, messages, patients, users},
};

/// Append a pending row. Called inside the transaction of the change the
/// notification describes.
pub fn insert(conn: &Connection, notice: &NewNotification) -> Result<Uuid> {
  let id = Uuid::new_v4();
  conn.execute(
    "INSERT INTO notifications (
       notification_id, sender_id, recipient_id, subject, body, category,
       attempts, status, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8)",
    params![
      encode_uuid(id),
      encode_uuid(notice.sender_id),
      encode_uuid(notice.recipient_id),
      notice.subject,
      notice.body,
      notice.category.as_str(),
      OutboxStatus::Pending.as_str(),
      encode_dt(Utc::now()),
    ],
  )?;
  Ok(id)
}

pub fn pending(conn: &Connection, limit: usize, max_attempts: u32) -> Result<Vec<OutboxEntry>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {OUTBOX_COLUMNS} FROM notifications n
     WHERE n.status = 'pending' AND n.attempts < ?1
     ORDER BY n.created_at, n.rowid
     LIMIT ?2"
  ))?;
  let raws = stmt
    .query_map(params![max_attempts, limit as i64], RawOutboxEntry::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawOutboxEntry::into_entry).collect()
}

/// Patients are checked first; patient and user ids never collide.
pub fn resolve_recipient(conn: &Connection, id: Uuid) -> Result<Option<Recipient>> {
  let id_str = encode_uuid(id);
  if let Some(patient) = patients::fetch(conn, &id_str)? {
    return Ok(Some(Recipient::Patient(patient)));
  }
  Ok(users::fetch(conn, &id_str)?.map(Recipient::User))
}

pub fn deliver_as_message(conn: &mut Connection, entry: OutboxEntry) -> Result<Message> {
  let tx = immediate(conn)?;
  let message = messages::insert(&tx, NewMessage {
    sender_id:    entry.sender_id,
    recipient_id: entry.recipient_id,
    body:         entry.body,
    category:     entry.category,
  })?;
  mark_delivered(&tx, entry.notification_id)?;
  tx.commit()?;
  Ok(message)
}

pub fn mark_delivered(conn: &Connection, id: Uuid) -> Result<()> {
  conn.execute(
    "UPDATE notifications SET status = 'delivered', attempts = attempts + 1,
       last_error = NULL
     WHERE notification_id = ?1",
    [encode_uuid(id)],
  )?;
  Ok(())
}

pub fn mark_failed(conn: &Connection, id: Uuid, error: &str, give_up: bool) -> Result<()> {
  let status = if give_up { OutboxStatus::Failed } else { OutboxStatus::Pending };
  conn.execute(
    "UPDATE notifications SET status = ?2, attempts = attempts + 1, last_error = ?3
     WHERE notification_id = ?1",
    params![encode_uuid(id), status.as_str(), error],
  )?;
  Ok(())
}

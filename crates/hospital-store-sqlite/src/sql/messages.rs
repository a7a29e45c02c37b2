use chrono::Utc;
use hospital_core::message::{Message, MessageView, NewMessage};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Result,
  encode::{MESSAGE_COLUMNS, RawMessage, RawMessageView, encode_dt, encode_uuid},
  sql::{exists, immediate},
};

const VIEW_SELECT: &str = "
  s.given_name || ' ' || s.family_name, s.role,
  r.given_name || ' ' || r.family_name, r.role
  FROM messages m
  LEFT JOIN users s ON s.user_id = m.sender_id
  LEFT JOIN users r ON r.user_id = m.recipient_id";

pub fn insert(conn: &Connection, input: NewMessage) -> Result<Message> {
  let message = Message {
    message_id:   Uuid::new_v4(),
    sender_id:    input.sender_id,
    recipient_id: input.recipient_id,
    body:         input.body,
    category:     input.category,
    read:         false,
    created_at:   Utc::now(),
  };
  conn.execute(
    "INSERT INTO messages (
       message_id, sender_id, recipient_id, body, category, read, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
    params![
      encode_uuid(message.message_id),
      encode_uuid(message.sender_id),
      encode_uuid(message.recipient_id),
      message.body,
      message.category.as_str(),
      encode_dt(message.created_at),
    ],
  )?;
  Ok(message)
}

pub fn send(conn: &mut Connection, input: NewMessage) -> Result<Message> {
  let tx = immediate(conn)?;
  if !exists(&tx, "users", "user_id", &encode_uuid(input.recipient_id))? {
    return Err(hospital_core::Error::UserNotFound(input.recipient_id).into());
  }
  let message = insert(&tx, input)?;
  tx.commit()?;
  Ok(message)
}

pub fn fetch(conn: &Connection, id: Uuid) -> Result<Option<Message>> {
  let raw = conn
    .query_row(
      &format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.message_id = ?1"),
      [encode_uuid(id)],
      RawMessage::from_row,
    )
    .optional()?;
  raw.map(RawMessage::into_message).transpose()
}

fn views(conn: &Connection, filter: &str, user_id: Uuid) -> Result<Vec<MessageView>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {MESSAGE_COLUMNS}, {VIEW_SELECT}
     WHERE {filter}
     ORDER BY m.created_at DESC, m.rowid DESC"
  ))?;
  let raws = stmt
    .query_map([encode_uuid(user_id)], RawMessageView::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawMessageView::into_view).collect()
}

pub fn for_user(conn: &Connection, user_id: Uuid) -> Result<Vec<MessageView>> {
  views(conn, "m.sender_id = ?1 OR m.recipient_id = ?1", user_id)
}

pub fn unread_for(conn: &Connection, user_id: Uuid) -> Result<Vec<MessageView>> {
  views(conn, "m.recipient_id = ?1 AND m.read = 0", user_id)
}

pub fn mark_read(conn: &Connection, id: Uuid) -> Result<Message> {
  let changed = conn.execute(
    "UPDATE messages SET read = 1 WHERE message_id = ?1",
    [encode_uuid(id)],
  )?;
  if changed == 0 {
    return Err(hospital_core::Error::MessageNotFound(id).into());
  }
  fetch(conn, id)?.ok_or_else(|| hospital_core::Error::MessageNotFound(id).into())
}

pub fn mark_all_read(conn: &Connection, user_id: Uuid) -> Result<u64> {
  let changed = conn.execute(
    "UPDATE messages SET read = 1 WHERE recipient_id = ?1 AND read = 0",
    [encode_uuid(user_id)],
  )?;
  Ok(changed as u64)
}

pub fn delete(conn: &Connection, id: Uuid) -> Result<()> {
  let changed =
    conn.execute("DELETE FROM messages WHERE message_id = ?1", params![encode_uuid(id)])?;
  if changed == 0 {
    return Err(hospital_core::Error::MessageNotFound(id).into());
  }
  Ok(())
}

//! Synchronous query functions, one module per table family.
//!
//! Each function runs on the connection thread inside a single
//! [`tokio_rusqlite::Connection::call`] closure and returns this crate's
//! [`Result`](crate::Result), so rule violations detected mid-transaction
//! surface as [`hospital_core::Error`] values rather than database errors.

pub mod appointments;
pub mod catalog;
pub mod messages;
pub mod outbox;
pub mod patients;
pub mod treatments;
pub mod users;

use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Begin a write transaction that takes the database write lock up front, so
/// a read-then-write sequence cannot interleave with another writer.
pub fn immediate(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
  conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// Whether a row with `id` exists in `table` (keyed by `column`).
pub fn exists(
  conn: &Connection,
  table: &str,
  column: &str,
  id: &str,
) -> rusqlite::Result<bool> {
  conn.query_row(
    &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {column} = ?1)"),
    [id],
    |r| r.get(0),
  )
}

//! SQLite backend for the hospital store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every operation executes as one
//! closure on that thread; operations that pair a check with a write run
//! inside an `IMMEDIATE` transaction so concurrent requests serialise on the
//! write lock.

mod encode;
mod schema;
mod sql;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;

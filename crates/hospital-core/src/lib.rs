//! Core types and trait definitions for the hospital administration backend.
//!
//! This crate is free of HTTP and database dependencies. The booking rules,
//! the capability table and the notice templates live here so every other
//! crate applies them the same way.

// Native `async fn` in traits; suppress the advisory lint about `Send` bounds
// on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod appointment;
pub mod error;
pub mod message;
pub mod notification;
pub mod patient;
pub mod schedule;
pub mod store;
pub mod treatment;
pub mod user;

pub use error::{Error, Result};

//! # HoundHub DB
//!
//! SQLite persistence for the automation engine: scheduled tasks, task logs,
//! workflows and their steps, enrollments, step executions, triggers, and the
//! CRM records the engine reads (clients, bookings, form submissions).
//!
//! All access goes through [`CrmDb`], which owns a single connection and
//! issues parameterized queries only.

pub mod models;
pub mod store;

pub use models::*;
pub use store::CrmDb;

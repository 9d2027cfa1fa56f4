//! Core types for the calsync ecosystem.
//!
//! This crate provides the provider-neutral pieces shared by every calsync provider:
//! - `CalendarObject` and related types for events and tasks
//! - `RecurrenceRule`, an RFC 5545 RRULE backed by the `rrule` crate
//! - `ics` for reading and writing iCalendar text
//! - `config` for the per-account identity context

pub mod config;
pub mod error;
pub mod ics;
pub mod object;
pub mod recurrence;

// Re-export the object model at crate root for convenience
pub use error::{CalSyncError, CalSyncResult};
pub use object::*;
pub use recurrence::{RecurrenceRule, until_end_of_day};
pub use rrule::{Frequency, NWeekday, RRule, Unvalidated};

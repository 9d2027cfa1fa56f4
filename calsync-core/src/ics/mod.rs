//! ICS generation and parsing.
//!
//! This module handles reading and writing iCalendar text according to RFC 5545.

mod generate;
mod parse;

pub use generate::{generate_calendar, generate_ics};
pub use parse::{parse_calendar, parse_object};

//! Value conversions shared by the mapping entries.

pub mod date;
pub mod recurrence;

pub use recurrence::{read_recurrence, write_recurrence};

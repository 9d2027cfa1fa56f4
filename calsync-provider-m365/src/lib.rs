//! Microsoft 365 calendar and task mapping engine for calsync.
//!
//! Translates between `calsync_core::CalendarObject` and the JSON
//! resources of the Microsoft Graph calendar and To Do APIs:
//!
//! - `translator::ObjectTranslator` reads remote items and builds create or
//!   update documents, deferring attachments and task reminders to a second
//!   pass once the item exists
//! - `mapping` holds the per-property converters and their tables
//! - `convert` translates recurrence patterns and date/time members
//! - `blob` decodes the legacy binary recurrence property
//! - `attachments` diffs, uploads and downloads file attachments
//!
//! HTTP is not done here: callers supply a `collab::Transport`.

pub mod attachments;
pub mod blob;
pub mod collab;
pub mod convert;
pub mod error;
pub mod json;
pub mod mapping;
pub mod timezone;
pub mod translator;

pub use blob::BlobError;
pub use collab::{Cancellable, ItemRef, SyncContext, Transport};
pub use error::{MappingError, MappingResult};
pub use timezone::{TimezoneResolver, WindowsZones};
pub use translator::{ObjectTranslator, OutboundDocument, Translated};

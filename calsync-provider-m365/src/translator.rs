//! Object translator: runs the mapping tables in both directions.

use serde_json::Value;
use tracing::{debug, warn};

use calsync_core::ics::{generate_calendar, generate_ics};
use calsync_core::{CalSyncResult, CalendarObject, ObjectKind};

use crate::blob::{self, BLOB_PROPERTY_ID};
use crate::collab::SyncContext;
use crate::error::{MappingError, MappingResult};
use crate::json::{JsonBuilder, RemoteResource};
use crate::mapping::mappings_for;

/// Result of reading a remote item.
#[derive(Debug, Clone, PartialEq)]
pub enum Translated {
    Single(CalendarObject),
    /// A recurring master followed by its modified occurrences
    Container {
        master: CalendarObject,
        detached: Vec<CalendarObject>,
    },
}

impl Translated {
    pub fn master(&self) -> &CalendarObject {
        match self {
            Translated::Single(obj) => obj,
            Translated::Container { master, .. } => master,
        }
    }

    pub fn into_objects(self) -> Vec<CalendarObject> {
        match self {
            Translated::Single(obj) => vec![obj],
            Translated::Container { master, detached } => {
                let mut objects = Vec::with_capacity(detached.len() + 1);
                objects.push(master);
                objects.extend(detached);
                objects
            }
        }
    }

    /// Render as one VCALENDAR.
    pub fn to_ics(&self) -> CalSyncResult<String> {
        match self {
            Translated::Single(obj) => generate_ics(obj),
            Translated::Container { .. } => generate_calendar(&self.clone().into_objects()),
        }
    }
}

/// First-pass request body for a create or update.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundDocument {
    pub json: Value,
    /// `finalize` has work once the item exists remotely
    pub needs_second_pass: bool,
}

pub struct ObjectTranslator<'a> {
    ctx: SyncContext<'a>,
}

impl<'a> ObjectTranslator<'a> {
    pub fn new(ctx: SyncContext<'a>) -> Self {
        ObjectTranslator { ctx }
    }

    /// Build a calendar object from a remote event or task resource.
    ///
    /// Events carrying the legacy recurrence blob come back as a container
    /// when the blob lists modified occurrences. A blob that fails to
    /// decode is logged and ignored.
    #[tracing::instrument(skip(self, value))]
    pub fn from_remote(&self, kind: ObjectKind, value: &Value) -> MappingResult<Translated> {
        if !value.is_object() {
            return Err(MappingError::InvalidRemote(format!(
                "{} resource is not a JSON object",
                kind.component_name()
            )));
        }
        let resource = RemoteResource::new(value);

        let mut obj = CalendarObject::new(kind, "");
        for entry in mappings_for(kind) {
            entry.property.read(&resource, &mut obj, &self.ctx)?;
        }

        if kind != ObjectKind::Event {
            return Ok(Translated::Single(obj));
        }
        let Some(encoded) = legacy_blob(&resource) else {
            return Ok(Translated::Single(obj));
        };
        match blob::decode_base64(encoded) {
            Ok(decoded) => {
                let detached = decoded.apply(&mut obj);
                debug!(
                    uid = %obj.uid,
                    exdates = obj.exdates.len(),
                    detached = detached.len(),
                    "Applied recurrence blob"
                );
                if detached.is_empty() {
                    Ok(Translated::Single(obj))
                } else {
                    Ok(Translated::Container {
                        master: obj,
                        detached,
                    })
                }
            }
            Err(e) => {
                warn!(uid = %obj.uid, error = %e, "Ignoring undecodable recurrence blob");
                Ok(Translated::Single(obj))
            }
        }
    }

    pub fn build_create_document(&self, new: &CalendarObject) -> MappingResult<OutboundDocument> {
        self.build(new, None)
    }

    /// Only properties that differ from `old` are written.
    pub fn build_update_document(
        &self,
        new: &CalendarObject,
        old: &CalendarObject,
    ) -> MappingResult<OutboundDocument> {
        if new.kind != old.kind {
            return Err(MappingError::InvalidObject(format!(
                "cannot update a {} from a {}",
                new.kind.component_name(),
                old.kind.component_name()
            )));
        }
        self.build(new, Some(old))
    }

    fn build(
        &self,
        new: &CalendarObject,
        old: Option<&CalendarObject>,
    ) -> MappingResult<OutboundDocument> {
        let mut builder = JsonBuilder::new();
        let mut needs_second_pass = false;

        for entry in mappings_for(new.kind) {
            if entry.two_phase {
                needs_second_pass |= entry.property.second_pass_needed(new, old)?;
            } else {
                entry
                    .property
                    .write(&mut builder, new, old, self.ctx.timezones)?;
            }
        }

        debug!(
            uid = %new.uid,
            update = old.is_some(),
            needs_second_pass,
            "Built outbound document"
        );
        Ok(OutboundDocument {
            json: builder.finish(),
            needs_second_pass,
        })
    }

    /// Apply the deferred properties to `item_id` after the first pass succeeded.
    pub fn finalize(
        &self,
        item_id: &str,
        new: &CalendarObject,
        old: Option<&CalendarObject>,
    ) -> MappingResult<()> {
        for entry in mappings_for(new.kind).iter().filter(|e| e.two_phase) {
            self.ctx.cancellable.check()?;
            entry.property.finalize(&self.ctx, item_id, new, old)?;
        }
        Ok(())
    }
}

fn legacy_blob<'v>(resource: &RemoteResource<'v>) -> Option<&'v str> {
    resource
        .array_member("singleValueExtendedProperties")
        .into_iter()
        .find(|p| {
            p.string_member("id")
                .is_some_and(|id| id.eq_ignore_ascii_case(BLOB_PROPERTY_ID))
        })
        .and_then(|p| p.non_empty_string_member("value"))
}

//! The field mapping registry.
//!
//! Each calendar property is one `PropertyKind`. A kind declares which read
//! role and which (optional) write role it has, and the dispatch methods
//! below route to the matching converter with an exhaustive `match`.
//! `EVENT_MAPPINGS` and `TASK_MAPPINGS` fix the order in which the
//! converters run for each object kind.

mod meeting;
mod people;
mod reminder;
mod status;
mod text;
mod times;

use tracing::trace;

use calsync_core::{CalendarObject, ObjectKind};

use crate::attachments;
use crate::collab::SyncContext;
use crate::convert::{read_recurrence, write_recurrence};
use crate::error::MappingResult;
use crate::json::{JsonBuilder, RemoteResource};
use crate::timezone::TimezoneResolver;

/// Custom property carrying the remote item id.
pub const ITEM_ID_PROPERTY: &str = "X-M365-ITEM-ID";

/// Custom property carrying the remote change key.
pub const CHANGE_KEY_PROPERTY: &str = "X-M365-CHANGE-KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    ItemId,
    ChangeKey,
    Created,
    LastModified,
    Subject,
    Title,
    Body,
    Categories,
    Sensitivity,
    ShowAs,
    Importance,
    EventStart,
    EventEnd,
    Location,
    Organizer,
    Attendees,
    Cancelled,
    EventReminder,
    TaskStatus,
    TaskStart,
    TaskDue,
    TaskCompleted,
    TaskReminder,
    Recurrence,
    OnlineMeeting,
    Attachments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRole {
    Simple,
    /// May call collaborators and fail
    Fallible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRole {
    Simple,
    Fallible,
}

/// One row of a mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingEntry {
    pub property: PropertyKind,
    /// Written only after the item exists remotely
    pub two_phase: bool,
}

const fn entry(property: PropertyKind) -> MappingEntry {
    MappingEntry {
        property,
        two_phase: false,
    }
}

const fn deferred(property: PropertyKind) -> MappingEntry {
    MappingEntry {
        property,
        two_phase: true,
    }
}

pub static EVENT_MAPPINGS: &[MappingEntry] = &[
    entry(PropertyKind::ItemId),
    entry(PropertyKind::ChangeKey),
    entry(PropertyKind::Created),
    entry(PropertyKind::LastModified),
    entry(PropertyKind::Subject),
    entry(PropertyKind::Body),
    entry(PropertyKind::Categories),
    entry(PropertyKind::Sensitivity),
    entry(PropertyKind::ShowAs),
    entry(PropertyKind::Importance),
    entry(PropertyKind::EventStart),
    entry(PropertyKind::EventEnd),
    entry(PropertyKind::Location),
    entry(PropertyKind::Organizer),
    entry(PropertyKind::Attendees),
    entry(PropertyKind::Cancelled),
    entry(PropertyKind::EventReminder),
    entry(PropertyKind::Recurrence),
    entry(PropertyKind::OnlineMeeting),
    deferred(PropertyKind::Attachments),
];

pub static TASK_MAPPINGS: &[MappingEntry] = &[
    entry(PropertyKind::ItemId),
    entry(PropertyKind::Created),
    entry(PropertyKind::LastModified),
    entry(PropertyKind::Title),
    entry(PropertyKind::Body),
    entry(PropertyKind::Categories),
    entry(PropertyKind::Importance),
    entry(PropertyKind::TaskStatus),
    entry(PropertyKind::TaskStart),
    entry(PropertyKind::TaskDue),
    entry(PropertyKind::TaskCompleted),
    entry(PropertyKind::Recurrence),
    deferred(PropertyKind::TaskReminder),
    deferred(PropertyKind::Attachments),
];

pub fn mappings_for(kind: ObjectKind) -> &'static [MappingEntry] {
    match kind {
        ObjectKind::Event => EVENT_MAPPINGS,
        ObjectKind::Task => TASK_MAPPINGS,
    }
}

/// Free-text comparison where absent equals empty.
pub(crate) fn text_changed(new: Option<&str>, old: Option<&str>) -> bool {
    new.unwrap_or_default() != old.unwrap_or_default()
}

/// Set equality ignoring order and duplicates.
pub(crate) fn same_set<T: Ord + Clone>(a: &[T], b: &[T]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    a.dedup();
    b.sort();
    b.dedup();
    a == b
}

impl PropertyKind {
    pub fn read_role(self) -> ReadRole {
        match self {
            PropertyKind::Attachments => ReadRole::Fallible,
            _ => ReadRole::Simple,
        }
    }

    pub fn write_role(self) -> Option<WriteRole> {
        match self {
            PropertyKind::ItemId
            | PropertyKind::ChangeKey
            | PropertyKind::Created
            | PropertyKind::LastModified
            | PropertyKind::Cancelled => None,
            PropertyKind::EventReminder
            | PropertyKind::TaskReminder
            | PropertyKind::Recurrence
            | PropertyKind::Attachments => Some(WriteRole::Fallible),
            _ => Some(WriteRole::Simple),
        }
    }

    /// Run this property's read role against `resource`.
    pub fn read(
        self,
        resource: &RemoteResource,
        obj: &mut CalendarObject,
        ctx: &SyncContext,
    ) -> MappingResult<()> {
        match self.read_role() {
            ReadRole::Simple => {
                self.read_simple(resource, obj, ctx.timezones);
                Ok(())
            }
            ReadRole::Fallible => self.read_fallible(resource, obj, ctx),
        }
    }

    fn read_simple(
        self,
        resource: &RemoteResource,
        obj: &mut CalendarObject,
        timezones: &dyn TimezoneResolver,
    ) {
        match self {
            PropertyKind::ItemId => times::read_item_id(resource, obj),
            PropertyKind::ChangeKey => times::read_change_key(resource, obj),
            PropertyKind::Created => times::read_created(resource, obj),
            PropertyKind::LastModified => times::read_last_modified(resource, obj),
            PropertyKind::Subject => text::read_summary(resource, obj, "subject"),
            PropertyKind::Title => text::read_summary(resource, obj, "title"),
            PropertyKind::Body => text::read_body(resource, obj),
            PropertyKind::Categories => text::read_categories(resource, obj),
            PropertyKind::Sensitivity => status::read_sensitivity(resource, obj),
            PropertyKind::ShowAs => status::read_show_as(resource, obj),
            PropertyKind::Importance => status::read_importance(resource, obj),
            PropertyKind::EventStart => times::read_event_start(resource, obj, timezones),
            PropertyKind::EventEnd => times::read_event_end(resource, obj, timezones),
            PropertyKind::Location => text::read_location(resource, obj),
            PropertyKind::Organizer => people::read_organizer(resource, obj),
            PropertyKind::Attendees => people::read_attendees(resource, obj),
            PropertyKind::Cancelled => status::read_cancelled(resource, obj),
            PropertyKind::EventReminder => reminder::read_event_reminder(resource, obj),
            PropertyKind::TaskStatus => status::read_task_status(resource, obj),
            PropertyKind::TaskStart => times::read_task_start(resource, obj, timezones),
            PropertyKind::TaskDue => times::read_task_due(resource, obj, timezones),
            PropertyKind::TaskCompleted => times::read_task_completed(resource, obj, timezones),
            PropertyKind::TaskReminder => reminder::read_task_reminder(resource, obj, timezones),
            PropertyKind::Recurrence => {
                if let Some(rule) = resource
                    .object_member("recurrence")
                    .and_then(|r| read_recurrence(&r))
                {
                    obj.rrules = vec![rule];
                }
            }
            PropertyKind::OnlineMeeting => meeting::read_online_meeting(resource, obj),
            // Fetched by the fallible role
            PropertyKind::Attachments => {}
        }
    }

    fn read_fallible(
        self,
        resource: &RemoteResource,
        obj: &mut CalendarObject,
        ctx: &SyncContext,
    ) -> MappingResult<()> {
        match self {
            PropertyKind::Attachments => attachments::read_attachments(resource, obj, ctx),
            other => {
                other.read_simple(resource, obj, ctx.timezones);
                Ok(())
            }
        }
    }

    /// Run this property's write role for a first-pass document.
    pub fn write(
        self,
        builder: &mut JsonBuilder,
        new: &CalendarObject,
        old: Option<&CalendarObject>,
        timezones: &dyn TimezoneResolver,
    ) -> MappingResult<()> {
        match self.write_role() {
            None => Ok(()),
            Some(WriteRole::Simple) => {
                self.write_simple(builder, new, old, timezones);
                Ok(())
            }
            Some(WriteRole::Fallible) => self.write_fallible(builder, new, old, timezones),
        }
    }

    fn write_simple(
        self,
        builder: &mut JsonBuilder,
        new: &CalendarObject,
        old: Option<&CalendarObject>,
        timezones: &dyn TimezoneResolver,
    ) {
        trace!(property = ?self, "Writing property");
        match self {
            PropertyKind::Subject => text::write_summary(builder, new, old, "subject"),
            PropertyKind::Title => text::write_summary(builder, new, old, "title"),
            PropertyKind::Body => text::write_body(builder, new, old),
            PropertyKind::Categories => text::write_categories(builder, new, old),
            PropertyKind::Sensitivity => status::write_sensitivity(builder, new, old),
            PropertyKind::ShowAs => status::write_show_as(builder, new, old),
            PropertyKind::Importance => status::write_importance(builder, new, old),
            PropertyKind::EventStart => times::write_event_start(builder, new, old, timezones),
            PropertyKind::EventEnd => times::write_event_end(builder, new, old, timezones),
            PropertyKind::Location => text::write_location(builder, new, old),
            PropertyKind::Organizer => people::write_organizer(builder, new, old),
            PropertyKind::Attendees => people::write_attendees(builder, new, old),
            PropertyKind::TaskStatus => status::write_task_status(builder, new, old),
            PropertyKind::TaskStart => times::write_task_start(builder, new, old, timezones),
            PropertyKind::TaskDue => times::write_task_due(builder, new, old, timezones),
            PropertyKind::TaskCompleted => times::write_task_completed(builder, new, old),
            PropertyKind::OnlineMeeting => meeting::write_online_meeting(builder, new, old),
            PropertyKind::ItemId
            | PropertyKind::ChangeKey
            | PropertyKind::Created
            | PropertyKind::LastModified
            | PropertyKind::Cancelled
            | PropertyKind::EventReminder
            | PropertyKind::TaskReminder
            | PropertyKind::Recurrence
            | PropertyKind::Attachments => {}
        }
    }

    fn write_fallible(
        self,
        builder: &mut JsonBuilder,
        new: &CalendarObject,
        old: Option<&CalendarObject>,
        timezones: &dyn TimezoneResolver,
    ) -> MappingResult<()> {
        trace!(property = ?self, "Writing property");
        match self {
            PropertyKind::EventReminder => reminder::write_event_reminder(builder, new, old),
            PropertyKind::TaskReminder => reminder::write_task_reminder(builder, new, old),
            PropertyKind::Recurrence => {
                let anchor = new.start.as_ref().or(new.due.as_ref());
                write_recurrence(builder, new, old, anchor, timezones)
            }
            // Attachments travel through `finalize`, never inside a document
            PropertyKind::Attachments => attachments::check_writable(new, old).map(|_| ()),
            other => {
                other.write_simple(builder, new, old, timezones);
                Ok(())
            }
        }
    }

    /// Validate a deferred property and report whether it has work for the
    /// second pass.
    pub fn second_pass_needed(
        self,
        new: &CalendarObject,
        old: Option<&CalendarObject>,
    ) -> MappingResult<bool> {
        match self {
            PropertyKind::Attachments => attachments::check_writable(new, old),
            PropertyKind::TaskReminder => reminder::task_reminder_changed(new, old),
            _ => Ok(false),
        }
    }

    /// Apply a deferred property to the item `item_id`, which now exists remotely.
    pub fn finalize(
        self,
        ctx: &SyncContext,
        item_id: &str,
        new: &CalendarObject,
        old: Option<&CalendarObject>,
    ) -> MappingResult<()> {
        match self {
            PropertyKind::Attachments => {
                let old_attachments = old.map_or(&[][..], |o| o.attachments.as_slice());
                let plan = attachments::plan(&new.attachments, old_attachments);
                if plan.is_empty() {
                    return Ok(());
                }
                attachments::check_writable(new, old)?;
                attachments::execute(ctx, item_id, &plan)
            }
            PropertyKind::TaskReminder => {
                if !reminder::task_reminder_changed(new, old)? {
                    return Ok(());
                }
                let mut builder = JsonBuilder::new();
                self.write(&mut builder, new, old, ctx.timezones)?;
                ctx.cancellable.check()?;
                ctx.transport
                    .update_item(&ctx.item(item_id), &builder.finish(), ctx.cancellable)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

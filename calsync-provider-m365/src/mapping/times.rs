//! Identity, timestamps, and start/end/due/completed values.

use calsync_core::{CalendarObject, EventTime};

use super::{CHANGE_KEY_PROPERTY, ITEM_ID_PROPERTY};
use crate::convert::date::{
    parse_utc_timestamp, read_event_time, times_differ, write_event_time, write_utc_time,
};
use crate::json::{JsonBuilder, RemoteResource};
use crate::timezone::TimezoneResolver;

/// UID is the iCalendar UID when the resource has one, else the item id.
pub(super) fn read_item_id(resource: &RemoteResource, obj: &mut CalendarObject) {
    let id = resource.non_empty_string_member("id");
    if let Some(id) = id {
        obj.set_custom_property(ITEM_ID_PROPERTY, id);
    }
    if let Some(uid) = resource.non_empty_string_member("iCalUId").or(id) {
        obj.uid = uid.to_string();
    }
}

pub(super) fn read_change_key(resource: &RemoteResource, obj: &mut CalendarObject) {
    if let Some(key) = resource.non_empty_string_member("changeKey") {
        obj.set_custom_property(CHANGE_KEY_PROPERTY, key);
    }
}

pub(super) fn read_created(resource: &RemoteResource, obj: &mut CalendarObject) {
    obj.created = resource
        .string_member("createdDateTime")
        .and_then(parse_utc_timestamp);
}

pub(super) fn read_last_modified(resource: &RemoteResource, obj: &mut CalendarObject) {
    obj.last_modified = resource
        .string_member("lastModifiedDateTime")
        .and_then(parse_utc_timestamp);
}

fn is_all_day(resource: &RemoteResource) -> bool {
    resource.bool_member("isAllDay").unwrap_or(false)
}

pub(super) fn read_event_start(
    resource: &RemoteResource,
    obj: &mut CalendarObject,
    timezones: &dyn TimezoneResolver,
) {
    obj.start = read_event_time(resource, "start", is_all_day(resource), timezones);
}

pub(super) fn read_event_end(
    resource: &RemoteResource,
    obj: &mut CalendarObject,
    timezones: &dyn TimezoneResolver,
) {
    obj.end = read_event_time(resource, "end", is_all_day(resource), timezones);
}

fn write_time_member(
    builder: &mut JsonBuilder,
    member: &str,
    new: Option<&EventTime>,
    old: Option<&EventTime>,
    timezones: &dyn TimezoneResolver,
) -> bool {
    match new {
        Some(time) if times_differ(Some(time), old) => {
            write_event_time(builder, member, time, timezones);
            true
        }
        _ => false,
    }
}

pub(super) fn write_event_start(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
    timezones: &dyn TimezoneResolver,
) {
    let old_start = old.and_then(|o| o.start.as_ref());
    if write_time_member(builder, "start", new.start.as_ref(), old_start, timezones) {
        let all_day = new.start.as_ref().is_some_and(EventTime::is_date);
        builder.add_member("isAllDay", all_day);
    }
}

pub(super) fn write_event_end(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
    timezones: &dyn TimezoneResolver,
) {
    let old_end = old.and_then(|o| o.end.as_ref());
    write_time_member(builder, "end", new.end.as_ref(), old_end, timezones);
}

// Task start and due dates carry no time of day on the remote side.

pub(super) fn read_task_start(
    resource: &RemoteResource,
    obj: &mut CalendarObject,
    timezones: &dyn TimezoneResolver,
) {
    obj.start = read_event_time(resource, "startDateTime", true, timezones);
}

pub(super) fn read_task_due(
    resource: &RemoteResource,
    obj: &mut CalendarObject,
    timezones: &dyn TimezoneResolver,
) {
    obj.due = read_event_time(resource, "dueDateTime", true, timezones);
}

pub(super) fn read_task_completed(
    resource: &RemoteResource,
    obj: &mut CalendarObject,
    timezones: &dyn TimezoneResolver,
) {
    obj.completed = read_event_time(resource, "completedDateTime", false, timezones)
        .and_then(|t| t.to_utc());
}

/// Task dates are optional: an update that drops one writes `null`.
fn write_task_time(
    builder: &mut JsonBuilder,
    member: &str,
    new: Option<&EventTime>,
    old: Option<&EventTime>,
    timezones: &dyn TimezoneResolver,
) {
    if new.is_none() && old.is_some() {
        builder.add_null_member(member);
    } else {
        write_time_member(builder, member, new, old, timezones);
    }
}

pub(super) fn write_task_start(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
    timezones: &dyn TimezoneResolver,
) {
    let old_start = old.and_then(|o| o.start.as_ref());
    write_task_time(builder, "startDateTime", new.start.as_ref(), old_start, timezones);
}

pub(super) fn write_task_due(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
    timezones: &dyn TimezoneResolver,
) {
    let old_due = old.and_then(|o| o.due.as_ref());
    write_task_time(builder, "dueDateTime", new.due.as_ref(), old_due, timezones);
}

pub(super) fn write_task_completed(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
) {
    let old_completed = old.and_then(|o| o.completed.as_ref());
    match &new.completed {
        Some(completed) if old_completed != Some(completed) => {
            write_utc_time(builder, "completedDateTime", completed);
        }
        Some(_) => {}
        None if old_completed.is_some() => {
            builder.add_null_member("completedDateTime");
        }
        None => {}
    }
}

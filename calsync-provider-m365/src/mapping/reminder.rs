//! The single reminder of an event or task.
//!
//! Events only support "N minutes before start"; tasks only support an
//! absolute reminder time. Anything else is refused rather than dropped.

use chrono::{DateTime, Utc};

use calsync_core::{Alarm, AlarmTrigger, CalendarObject, TriggerRelation};

use crate::convert::date::{read_event_time, write_utc_time};
use crate::error::{MappingError, MappingResult};
use crate::json::{JsonBuilder, RemoteResource};
use crate::timezone::TimezoneResolver;

fn single_alarm(obj: &CalendarObject) -> MappingResult<Option<&Alarm>> {
    match obj.alarms.as_slice() {
        [] => Ok(None),
        [alarm] => Ok(Some(alarm)),
        alarms => Err(MappingError::InvalidObject(format!(
            "{} reminders, at most one is allowed",
            alarms.len()
        ))),
    }
}

/// Minutes before start of the event's reminder.
fn event_reminder_minutes(obj: &CalendarObject) -> MappingResult<Option<i64>> {
    let Some(alarm) = single_alarm(obj)? else {
        return Ok(None);
    };
    match alarm.trigger {
        AlarmTrigger::Relative {
            minutes,
            related: TriggerRelation::Start,
        } if minutes <= 0 => Ok(Some(-minutes)),
        _ => Err(MappingError::InvalidObject(
            "event reminder must be relative to the start and not after it".into(),
        )),
    }
}

fn task_reminder_time(obj: &CalendarObject) -> MappingResult<Option<DateTime<Utc>>> {
    let Some(alarm) = single_alarm(obj)? else {
        return Ok(None);
    };
    match alarm.trigger {
        AlarmTrigger::Absolute(at) => Ok(Some(at)),
        AlarmTrigger::Relative { .. } => Err(MappingError::InvalidObject(
            "task reminder must be an absolute time".into(),
        )),
    }
}

pub(super) fn read_event_reminder(resource: &RemoteResource, obj: &mut CalendarObject) {
    if resource.bool_member("isReminderOn") != Some(true) {
        return;
    }
    let minutes = resource.i64_member("reminderMinutesBeforeStart").unwrap_or(0);
    obj.alarms = vec![Alarm {
        trigger: AlarmTrigger::Relative {
            minutes: -minutes,
            related: TriggerRelation::Start,
        },
        description: None,
    }];
}

pub(super) fn write_event_reminder(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
) -> MappingResult<()> {
    let new_minutes = event_reminder_minutes(new)?;
    let old_minutes = old.and_then(|o| event_reminder_minutes(o).ok().flatten());
    if new_minutes == old_minutes {
        return Ok(());
    }
    match new_minutes {
        Some(minutes) => {
            builder
                .add_member("isReminderOn", true)
                .add_member("reminderMinutesBeforeStart", minutes);
        }
        None => {
            builder.add_member("isReminderOn", false);
        }
    }
    Ok(())
}

pub(super) fn read_task_reminder(
    resource: &RemoteResource,
    obj: &mut CalendarObject,
    timezones: &dyn TimezoneResolver,
) {
    if resource.bool_member("isReminderOn") != Some(true) {
        return;
    }
    if let Some(at) = read_event_time(resource, "reminderDateTime", false, timezones)
        .and_then(|t| t.to_utc())
    {
        obj.alarms = vec![Alarm {
            trigger: AlarmTrigger::Absolute(at),
            description: None,
        }];
    }
}

/// Validate the task reminder and report whether it differs from `old`.
pub(super) fn task_reminder_changed(
    new: &CalendarObject,
    old: Option<&CalendarObject>,
) -> MappingResult<bool> {
    let new_time = task_reminder_time(new)?;
    let old_time = old.and_then(|o| task_reminder_time(o).ok().flatten());
    Ok(new_time != old_time)
}

pub(super) fn write_task_reminder(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
) -> MappingResult<()> {
    if !task_reminder_changed(new, old)? {
        return Ok(());
    }
    match task_reminder_time(new)? {
        Some(at) => {
            builder.add_member("isReminderOn", true);
            write_utc_time(builder, "reminderDateTime", &at);
        }
        None => {
            builder.add_member("isReminderOn", false);
        }
    }
    Ok(())
}

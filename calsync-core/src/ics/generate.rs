//! ICS generation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Duration;
use icalendar::{
    Alarm, Calendar, CalendarDateTime, Component, EventLike, Property, Trigger, ValueType,
};

use crate::error::{CalSyncError, CalSyncResult};
use crate::object::{
    ATTACHMENT_ID_PARAM, AlarmTrigger, Attachment, AttachmentValue, Attendee, CalendarObject,
    EventTime, ObjectKind, STATUS_TIME_PARAM, Transparency, TriggerRelation,
};

/// Property marking events that should be hosted as online meetings.
pub(crate) const ONLINE_MEETING_PROPERTY: &str = "X-M365-ONLINE-MEETING";

/// Generate .ics content for a single object
pub fn generate_ics(object: &CalendarObject) -> CalSyncResult<String> {
    generate_calendar(std::slice::from_ref(object))
}

/// Generate one VCALENDAR holding several components, in order.
///
/// Used for a recurring master together with its detached instances.
pub fn generate_calendar(objects: &[CalendarObject]) -> CalSyncResult<String> {
    if objects.is_empty() {
        return Err(CalSyncError::IcsGenerate(
            "Cannot generate a calendar without components".into(),
        ));
    }

    let mut cal = Calendar::new();
    for object in objects {
        match object.kind {
            ObjectKind::Event => {
                let mut ics_event = icalendar::Event::new();
                fill_component(&mut ics_event, object);
                cal.push(ics_event.done());
            }
            ObjectKind::Task => {
                let mut ics_todo = icalendar::Todo::new();
                fill_component(&mut ics_todo, object);
                cal.push(ics_todo.done());
            }
        }
    }
    let cal = cal.done();

    // Post-process to remove unnecessary bloat from the icalendar crate's output
    Ok(strip_ics_bloat(&cal.to_string()))
}

fn fill_component<C: EventLike>(component: &mut C, object: &CalendarObject) {
    if object.uid.is_empty() {
        component.uid(&uuid::Uuid::new_v4().to_string());
    } else {
        component.uid(&object.uid);
    }

    // DTSTAMP - required by RFC 5545, use the modification time or current time
    let dtstamp = object
        .last_modified
        .unwrap_or_else(chrono::Utc::now)
        .format("%Y%m%dT%H%M%SZ")
        .to_string();
    component.add_property("DTSTAMP", &dtstamp);

    if let Some(created) = object.created {
        component.add_property("CREATED", created.format("%Y%m%dT%H%M%SZ").to_string());
    }
    if let Some(updated) = object.last_modified {
        component.add_property(
            "LAST-MODIFIED",
            updated.format("%Y%m%dT%H%M%SZ").to_string(),
        );
    }

    if let Some(ref start) = object.start {
        add_datetime_property(component, "DTSTART", start);
    }
    if let Some(ref end) = object.end {
        add_datetime_property(component, "DTEND", end);
    }
    if let Some(ref due) = object.due {
        add_datetime_property(component, "DUE", due);
    }
    if let Some(completed) = object.completed {
        component.add_property("COMPLETED", completed.format("%Y%m%dT%H%M%SZ").to_string());
    }

    if let Some(ref summary) = object.summary {
        component.summary(summary);
    }
    if let Some(ref desc) = object.description {
        component.description(desc);
    }
    if let Some(ref loc) = object.location {
        component.location(loc);
    }
    if let Some(class) = object.classification {
        component.add_property("CLASS", class.as_ics_str());
    }
    // TRANSP - only emit if TRANSPARENT (OPAQUE is the default)
    if object.transparency == Some(Transparency::Transparent) {
        component.add_property("TRANSP", "TRANSPARENT");
    }
    if let Some(status) = object.status {
        component.add_property("STATUS", status.as_ics_str());
    }
    if let Some(priority) = object.priority.filter(|p| *p > 0) {
        component.add_property("PRIORITY", priority.to_string());
    }
    if !object.categories.is_empty() {
        component.add_property("CATEGORIES", object.categories.join(","));
    }

    // ORGANIZER
    if let Some(ref org) = object.organizer {
        component.append_property(attendee_property("ORGANIZER", org));
    }

    // ATTENDEE (multi-property - can appear multiple times)
    for attendee in &object.attendees {
        component.append_multi_property(attendee_property("ATTENDEE", attendee));
    }

    if let Some(ref url) = object.conference_url {
        component.add_property("URL", url);
    }
    if object.online_meeting {
        component.add_property(ONLINE_MEETING_PROPERTY, "TRUE");
    }

    // Recurrence (for master objects)
    for rrule in &object.rrules {
        component.append_multi_property(Property::new("RRULE", rrule.to_string()));
    }
    for exrule in &object.exrules {
        component.append_multi_property(Property::new("EXRULE", exrule));
    }
    for rdate in &object.rdates {
        component.append_multi_property(datetime_property("RDATE", rdate));
    }
    for exdate in &object.exdates {
        component.append_multi_property(datetime_property("EXDATE", exdate));
    }

    // RECURRENCE-ID (for detached instances of recurring objects)
    if let Some(ref recurrence_id) = object.recurrence_id {
        add_datetime_property(component, "RECURRENCE-ID", recurrence_id);
    }

    for attachment in &object.attachments {
        component.append_multi_property(attachment_property(attachment));
    }

    // Alarms (VALARM components) - minimal per RFC 5545
    for alarm in &object.alarms {
        let trigger = match alarm.trigger {
            AlarmTrigger::Relative { minutes, related } => {
                let offset = Duration::minutes(minutes.abs());
                match (related, minutes <= 0) {
                    (TriggerRelation::Start, true) => Trigger::before_start(offset),
                    (TriggerRelation::Start, false) => Trigger::after_start(offset),
                    (TriggerRelation::End, true) => Trigger::before_end(offset),
                    (TriggerRelation::End, false) => Trigger::after_end(offset),
                }
            }
            AlarmTrigger::Absolute(at) => Trigger::DateTime(CalendarDateTime::Utc(at)),
        };
        let description = alarm.description.as_deref().unwrap_or("Reminder");
        component.alarm(Alarm::display(description, trigger));
    }

    // Custom properties (provider-specific, preserved for round-tripping)
    for (key, value) in &object.custom_properties {
        component.add_property(key, value);
    }
}

fn attendee_property(name: &str, attendee: &Attendee) -> Property {
    let mut prop = Property::new(name, format!("mailto:{}", attendee.email));
    if let Some(ref cn) = attendee.name {
        prop.add_parameter("CN", cn);
    }
    if let Some(role) = attendee.role {
        prop.add_parameter("ROLE", role.as_ics_str());
    }
    if let Some(cutype) = attendee.cutype {
        prop.add_parameter("CUTYPE", cutype.as_ics_str());
    }
    if let Some(partstat) = attendee.response_status {
        prop.add_parameter("PARTSTAT", partstat.as_ics_str());
    }
    if let Some(status_time) = attendee.status_time {
        prop.add_parameter(
            STATUS_TIME_PARAM,
            &status_time.format("%Y%m%dT%H%M%SZ").to_string(),
        );
    }
    prop
}

fn attachment_property(attachment: &Attachment) -> Property {
    let mut prop = match attachment.value {
        AttachmentValue::Uri(ref uri) => Property::new("ATTACH", uri),
        AttachmentValue::Binary(ref data) => {
            let mut prop = Property::new("ATTACH", BASE64.encode(data));
            prop.add_parameter("ENCODING", "BASE64");
            prop.add_parameter("VALUE", "BINARY");
            prop
        }
    };
    if let Some(ref fmttype) = attachment.fmttype {
        prop.add_parameter("FMTTYPE", fmttype);
    }
    if let Some(ref filename) = attachment.filename {
        prop.add_parameter("X-FILENAME", filename);
    }
    if let Some(ref id) = attachment.attachment_id {
        prop.add_parameter(ATTACHMENT_ID_PARAM, id);
    }
    prop
}

/// Clean up ICS output from the icalendar crate
/// - Replace PRODID with CALSYNC
/// - Remove CALSCALE:GREGORIAN (it's the default)
/// - Remove DTSTAMP and UID inside VALARM sections (not required by RFC 5545)
fn strip_ics_bloat(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());
    let mut in_valarm = false;

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:CALSYNC\r\n");
            continue;
        }

        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        if line == "BEGIN:VALARM" {
            in_valarm = true;
        } else if line == "END:VALARM" {
            in_valarm = false;
        }

        if in_valarm && (line.starts_with("DTSTAMP:") || line.starts_with("UID:")) {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

/// Build a datetime property with formatting based on the EventTime variant
fn datetime_property(name: &str, time: &EventTime) -> Property {
    let mut prop = Property::new(name, time.to_ics_string());
    match time {
        EventTime::Date(_) => {
            prop.append_parameter(ValueType::Date);
        }
        EventTime::DateTimeZoned { tzid, .. } => {
            prop.add_parameter("TZID", tzid);
        }
        EventTime::DateTimeUtc(_) | EventTime::DateTimeFloating(_) => {}
    }
    prop
}

fn add_datetime_property<C: Component>(component: &mut C, name: &str, time: &EventTime) {
    component.append_property(datetime_property(name, time));
}

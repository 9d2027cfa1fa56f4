//! ICS parsing using the icalendar crate's parser.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, NaiveDateTime, Utc};
use icalendar::{
    DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

use tracing::warn;

use super::generate::ONLINE_MEETING_PROPERTY;
use crate::error::{CalSyncError, CalSyncResult};
use crate::object::{
    ATTACHMENT_ID_PARAM, Alarm, AlarmTrigger, Attachment, AttachmentValue, Attendee,
    CalendarObject, CalendarUserType, Classification, EventTime, ObjectKind, ParticipationStatus,
    Role, STATUS_TIME_PARAM, Status, Transparency, TriggerRelation,
};
use crate::recurrence::RecurrenceRule;

/// Parse ICS content into its first VEVENT or VTODO
pub fn parse_object(content: &str) -> Option<CalendarObject> {
    parse_calendar(content).ok()?.into_iter().next()
}

/// Parse every VEVENT and VTODO of a VCALENDAR, in document order.
pub fn parse_calendar(content: &str) -> CalSyncResult<Vec<CalendarObject>> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| CalSyncError::IcsParse(e.to_string()))?;

    calendar
        .components
        .iter()
        .filter_map(|c| match c.name.as_ref() {
            "VEVENT" => Some(parse_component(c, ObjectKind::Event)),
            "VTODO" => Some(parse_component(c, ObjectKind::Task)),
            _ => None,
        })
        .collect()
}

fn parse_component(component: &Component, kind: ObjectKind) -> CalSyncResult<CalendarObject> {
    let uid = component
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .ok_or_else(|| CalSyncError::IcsParse(format!("{} without UID", kind.component_name())))?;

    let mut object = CalendarObject::new(kind, uid);

    object.created = component.find_prop("CREATED").and_then(parse_utc_property);
    object.last_modified = component
        .find_prop("LAST-MODIFIED")
        .and_then(parse_utc_property);
    object.completed = component.find_prop("COMPLETED").and_then(parse_utc_property);

    object.start = component.find_prop("DTSTART").and_then(parse_time_property);
    object.end = component.find_prop("DTEND").and_then(parse_time_property);
    object.due = component.find_prop("DUE").and_then(parse_time_property);
    object.recurrence_id = component
        .find_prop("RECURRENCE-ID")
        .and_then(parse_time_property);

    // Optional simple fields
    object.summary = component.find_prop("SUMMARY").map(|p| p.val.to_string());
    object.description = component.find_prop("DESCRIPTION").map(|p| p.val.to_string());
    object.location = component.find_prop("LOCATION").map(|p| p.val.to_string());
    object.conference_url = component.find_prop("URL").map(|p| p.val.to_string());
    object.classification = component
        .find_prop("CLASS")
        .and_then(|p| Classification::from_ics_str(p.val.as_ref()));
    object.status = component
        .find_prop("STATUS")
        .and_then(|p| Status::from_ics_str(p.val.as_ref()));
    object.priority = component
        .find_prop("PRIORITY")
        .and_then(|p| p.val.as_ref().trim().parse().ok());
    object.transparency = component.find_prop("TRANSP").map(|p| {
        if p.val == "TRANSPARENT" {
            Transparency::Transparent
        } else {
            Transparency::Opaque
        }
    });

    object.categories = component
        .properties
        .iter()
        .filter(|p| p.name == "CATEGORIES")
        .flat_map(|p| {
            p.val
                .as_ref()
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
        })
        .collect();

    // Attendees
    object.organizer = component.find_prop("ORGANIZER").map(parse_attendee);
    object.attendees = component
        .properties
        .iter()
        .filter(|p| p.name == "ATTENDEE")
        .map(parse_attendee)
        .collect();

    // Recurrence (RRULE, RDATE, EXRULE, EXDATE)
    for prop in &component.properties {
        match prop.name.as_ref() {
            "RRULE" => object.rrules.push(prop.val.as_ref().parse::<RecurrenceRule>()?),
            "EXRULE" => object.exrules.push(prop.val.to_string()),
            "RDATE" => object.rdates.extend(parse_multi_time_property(prop)),
            "EXDATE" => object.exdates.extend(parse_multi_time_property(prop)),
            _ => {}
        }
    }

    object.attachments = component
        .properties
        .iter()
        .filter(|p| p.name == "ATTACH")
        .filter_map(parse_attachment)
        .collect();

    // Alarms from VALARM components
    object.alarms = component
        .components
        .iter()
        .filter(|c| c.name == "VALARM")
        .filter_map(|alarm| {
            let parsed = parse_alarm(alarm);
            if parsed.is_none() {
                warn!(uid = %object.uid, "Skipping VALARM with an unreadable TRIGGER");
            }
            parsed
        })
        .collect();

    // Custom X- properties (preserved for round-tripping provider-specific data)
    for prop in &component.properties {
        let name = prop.name.as_ref();
        if name == ONLINE_MEETING_PROPERTY {
            object.online_meeting = prop.val.as_ref().eq_ignore_ascii_case("TRUE");
        } else if name.starts_with("X-") {
            object
                .custom_properties
                .push((name.to_string(), prop.val.to_string()));
        }
    }

    Ok(object)
}

fn param_value<'a>(prop: &'a Property, key: &str) -> Option<&'a str> {
    prop.params
        .iter()
        .find(|p| p.key.as_ref().eq_ignore_ascii_case(key))
        .and_then(|p| p.val.as_ref().map(|v| v.as_ref()))
}

fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s.trim().trim_end_matches('Z'), "%Y%m%dT%H%M%S")
        .ok()
        .map(|dt| dt.and_utc())
}

fn parse_utc_property(prop: &Property) -> Option<DateTime<Utc>> {
    parse_utc(prop.val.as_ref())
}

fn parse_time_property(prop: &Property) -> Option<EventTime> {
    DatePerhapsTime::try_from(prop).ok().map(to_event_time)
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            icalendar::CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                EventTime::DateTimeZoned {
                    datetime: date_time,
                    tzid,
                }
            }
        },
    }
}

/// Parse an EXDATE/RDATE property into a list of EventTime values.
///
/// Handles TZID, VALUE=DATE, UTC and floating values, comma-separated.
fn parse_multi_time_property(prop: &Property) -> Vec<EventTime> {
    let tzid = param_value(prop, "TZID").map(|v| v.to_string());
    let is_date = param_value(prop, "VALUE") == Some("DATE");

    prop.val
        .as_ref()
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if is_date {
                chrono::NaiveDate::parse_from_str(s, "%Y%m%d")
                    .ok()
                    .map(EventTime::Date)
            } else if let Some(ref tz) = tzid {
                NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTimeZoned {
                        datetime: dt,
                        tzid: tz.clone(),
                    })
            } else if s.ends_with('Z') {
                parse_utc(s).map(EventTime::DateTimeUtc)
            } else {
                NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(EventTime::DateTimeFloating)
            }
        })
        .collect()
}

/// Parse ATTENDEE/ORGANIZER property
fn parse_attendee(prop: &Property) -> Attendee {
    let mut attendee = Attendee::new(prop.val.as_ref());
    attendee.name = param_value(prop, "CN").map(|v| v.to_string());
    attendee.role = param_value(prop, "ROLE").and_then(Role::from_ics_str);
    attendee.cutype = param_value(prop, "CUTYPE").and_then(CalendarUserType::from_ics_str);
    attendee.response_status =
        param_value(prop, "PARTSTAT").and_then(ParticipationStatus::from_ics_str);
    attendee.status_time = param_value(prop, STATUS_TIME_PARAM).and_then(parse_utc);
    attendee
}

fn parse_attachment(prop: &Property) -> Option<Attachment> {
    let is_binary = param_value(prop, "ENCODING")
        .map(|e| e.eq_ignore_ascii_case("BASE64"))
        .unwrap_or(false);

    let value = if is_binary {
        AttachmentValue::Binary(BASE64.decode(prop.val.as_ref().trim()).ok()?)
    } else {
        AttachmentValue::Uri(prop.val.to_string())
    };

    Some(Attachment {
        value,
        fmttype: param_value(prop, "FMTTYPE").map(|v| v.to_string()),
        filename: param_value(prop, "X-FILENAME").map(|v| v.to_string()),
        attachment_id: param_value(prop, ATTACHMENT_ID_PARAM).map(|v| v.to_string()),
    })
}

fn parse_alarm(alarm: &Component) -> Option<Alarm> {
    let trigger_prop = alarm.find_prop("TRIGGER")?;
    let value = trigger_prop.val.as_ref();

    let trigger = if param_value(trigger_prop, "VALUE") == Some("DATE-TIME") {
        AlarmTrigger::Absolute(parse_utc(value)?)
    } else {
        let related = match param_value(trigger_prop, "RELATED") {
            Some(r) if r.eq_ignore_ascii_case("END") => TriggerRelation::End,
            _ => TriggerRelation::Start,
        };
        AlarmTrigger::Relative {
            minutes: parse_trigger_minutes(value)?,
            related,
        }
    };

    Some(Alarm {
        trigger,
        description: alarm.find_prop("DESCRIPTION").map(|p| p.val.to_string()),
    })
}

/// Parse a TRIGGER duration to signed minutes (-PT30M -> -30, PT1H -> 60)
fn parse_trigger_minutes(value: &str) -> Option<i64> {
    let is_before = value.starts_with('-');
    let duration_str = value.trim_start_matches(['-', '+']);

    let duration = iso8601::duration(duration_str).ok()?;
    let std_duration: std::time::Duration = duration.into();
    let minutes = (std_duration.as_secs() / 60) as i64;

    Some(if is_before { -minutes } else { minutes })
}

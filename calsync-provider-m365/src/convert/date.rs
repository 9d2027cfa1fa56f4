//! Date and date-time values as the remote service writes them.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

use calsync_core::EventTime;

use crate::json::{JsonBuilder, RemoteResource};
use crate::timezone::{TimezoneResolver, is_utc_name};

const GRAPH_DATETIME_READ: &str = "%Y-%m-%dT%H:%M:%S%.f";
const GRAPH_DATETIME_WRITE: &str = "%Y-%m-%dT%H:%M:%S";

/// Pack a calendar date as `year + 10000 * month + 1000000 * day`.
pub fn encode_packed_date(date: NaiveDate) -> u32 {
    date.year() as u32 + 10_000 * date.month() + 1_000_000 * date.day()
}

/// Unpack a packed date, rejecting out-of-range parts and impossible dates.
pub fn decode_packed_date(packed: u32) -> Option<NaiveDate> {
    let year = packed % 10_000;
    let month = (packed / 10_000) % 100;
    let day = packed / 1_000_000;
    if !(1..=9999).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    NaiveDate::from_ymd_opt(year as i32, month, day)
}

/// Pack a `YYYY-MM-DD` string without validating it.
pub fn parse_packed_date(text: &str) -> Option<u32> {
    let mut parts = text.trim().splitn(3, '-');
    let year: u32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day_text = parts.next()?.split(|c: char| !c.is_ascii_digit()).next()?;
    let day: u32 = day_text.parse().ok()?;
    if year >= 10_000 || month >= 100 || day >= 100 {
        return None;
    }
    Some(year + 10_000 * month + 1_000_000 * day)
}

pub fn format_packed_date(packed: u32) -> Option<String> {
    decode_packed_date(packed).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Read a `YYYY-MM-DD` member through the packed codec.
pub fn read_date_member(resource: &RemoteResource, name: &str) -> Option<NaiveDate> {
    resource
        .string_member(name)
        .and_then(parse_packed_date)
        .and_then(decode_packed_date)
}

pub fn parse_graph_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(text, GRAPH_DATETIME_READ).ok()
}

pub fn format_graph_datetime(dt: &NaiveDateTime) -> String {
    dt.format(GRAPH_DATETIME_WRITE).to_string()
}

/// Parse a UTC timestamp such as `createdDateTime` (up to seven fraction digits).
pub fn parse_utc_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_graph_datetime(text).map(|dt| dt.and_utc()))
}

/// Read a `{dateTime, timeZone}` member.
///
/// Zone names the resolver does not know fall back to UTC.
pub fn read_event_time(
    resource: &RemoteResource,
    name: &str,
    all_day: bool,
    timezones: &dyn TimezoneResolver,
) -> Option<EventTime> {
    let value = resource.object_member(name)?;
    let datetime = parse_graph_datetime(value.string_member("dateTime")?)?;
    if all_day {
        return Some(EventTime::Date(datetime.date()));
    }

    let zone = value.string_member("timeZone").unwrap_or_default();
    if is_utc_name(zone) {
        return Some(EventTime::DateTimeUtc(datetime.and_utc()));
    }
    match timezones.to_iana(zone) {
        Some(tzid) if is_utc_name(&tzid) => Some(EventTime::DateTimeUtc(datetime.and_utc())),
        Some(tzid) => Some(EventTime::DateTimeZoned { datetime, tzid }),
        None => {
            warn!(member = name, zone, "Unknown timezone, reading as UTC");
            Some(EventTime::DateTimeUtc(datetime.and_utc()))
        }
    }
}

/// Remote zone name for a value: the Windows name when one is known, else the IANA id.
pub fn remote_zone_name(time: &EventTime, timezones: &dyn TimezoneResolver) -> String {
    match time {
        EventTime::DateTimeZoned { tzid, .. } => timezones
            .to_vendor(tzid)
            .unwrap_or_else(|| tzid.clone()),
        EventTime::Date(_) | EventTime::DateTimeUtc(_) | EventTime::DateTimeFloating(_) => {
            "UTC".to_string()
        }
    }
}

/// Write a `{dateTime, timeZone}` member.
pub fn write_event_time(
    builder: &mut JsonBuilder,
    name: &str,
    time: &EventTime,
    timezones: &dyn TimezoneResolver,
) {
    builder
        .begin_object_member(name)
        .add_member("dateTime", format_graph_datetime(&time.naive_local()))
        .add_member("timeZone", remote_zone_name(time, timezones))
        .end_object_member();
}

/// Write a UTC instant as a `{dateTime, timeZone}` member.
pub fn write_utc_time(builder: &mut JsonBuilder, name: &str, at: &DateTime<Utc>) {
    builder
        .begin_object_member(name)
        .add_member("dateTime", format_graph_datetime(&at.naive_utc()))
        .add_member("timeZone", "UTC")
        .end_object_member();
}

/// Whether two optional times differ in instant or timezone.
pub fn times_differ(new: Option<&EventTime>, old: Option<&EventTime>) -> bool {
    match (new, old) {
        (Some(a), Some(b)) => !a.same_as(b),
        (None, None) => false,
        _ => true,
    }
}

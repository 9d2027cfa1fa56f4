//! Recurrence translation between the remote pattern/range schema and RRULE.

use chrono::{Datelike, Month, Weekday};
use tracing::{debug, warn};

use calsync_core::{
    CalendarObject, EventTime, Frequency, NWeekday, RRule, RecurrenceRule, Unvalidated,
    until_end_of_day,
};

use super::date::{encode_packed_date, format_packed_date, read_date_member, remote_zone_name};
use crate::error::{MappingError, MappingResult};
use crate::json::{JsonBuilder, RemoteResource};
use crate::timezone::TimezoneResolver;

fn weekday_from_remote(name: &str) -> Option<Weekday> {
    match name.to_ascii_lowercase().as_str() {
        "sunday" => Some(Weekday::Sun),
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        _ => None,
    }
}

fn weekday_to_remote(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "sunday",
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
    }
}

fn index_to_position(index: &str) -> Option<i32> {
    match index {
        "first" => Some(1),
        "second" => Some(2),
        "third" => Some(3),
        "fourth" => Some(4),
        "last" => Some(-1),
        _ => None,
    }
}

fn position_to_index(position: i32) -> Option<&'static str> {
    match position {
        1 => Some("first"),
        2 => Some("second"),
        3 => Some("third"),
        4 => Some("fourth"),
        -1 => Some("last"),
        _ => None,
    }
}

fn read_days(pattern: &RemoteResource) -> Vec<NWeekday> {
    pattern
        .string_array_member("daysOfWeek")
        .into_iter()
        .filter_map(weekday_from_remote)
        .map(NWeekday::Every)
        .collect()
}

fn read_month(pattern: &RemoteResource, rule: RRule<Unvalidated>) -> RRule<Unvalidated> {
    let month = pattern
        .i64_member("month")
        .and_then(|m| u8::try_from(m).ok())
        .and_then(|m| Month::try_from(m).ok());
    match month {
        Some(month) => rule.by_month(&[month]),
        None => rule,
    }
}

fn read_week_start(pattern: &RemoteResource, rule: RRule<Unvalidated>) -> RRule<Unvalidated> {
    match pattern
        .string_member("firstDayOfWeek")
        .and_then(weekday_from_remote)
    {
        Some(day) => rule.week_start(day),
        None => rule,
    }
}

/// Convert a remote `recurrence` member into a rule.
///
/// Pattern types this schema does not define yield `None`.
pub fn read_recurrence(recurrence: &RemoteResource) -> Option<RecurrenceRule> {
    let pattern = recurrence.object_member("pattern")?;
    let kind = pattern.string_member("type")?;
    let interval = pattern
        .i64_member("interval")
        .and_then(|i| u16::try_from(i).ok())
        .filter(|i| *i > 0)
        .unwrap_or(1);

    let rule = match kind {
        "daily" => RRule::new(Frequency::Daily).by_weekday(read_days(&pattern)),
        "weekly" => read_week_start(&pattern, RRule::new(Frequency::Weekly))
            .by_weekday(read_days(&pattern)),
        "absoluteMonthly" => absolute_day(&pattern, RRule::new(Frequency::Monthly)),
        "absoluteYearly" => {
            read_month(&pattern, absolute_day(&pattern, RRule::new(Frequency::Yearly)))
        }
        "relativeMonthly" => relative_day(&pattern, RRule::new(Frequency::Monthly)),
        "relativeYearly" => {
            read_month(&pattern, relative_day(&pattern, RRule::new(Frequency::Yearly)))
        }
        other => {
            warn!(pattern_type = other, "Unknown recurrence pattern type, skipping rule");
            return None;
        }
    };
    let mut rule = rule.interval(interval);

    if let Some(range) = recurrence.object_member("range") {
        match range.string_member("type") {
            Some("endDate") => {
                if let Some(until) =
                    read_date_member(&range, "endDate").and_then(until_end_of_day)
                {
                    rule = rule.until(until);
                }
            }
            Some("numbered") => {
                if let Some(count) = range
                    .i64_member("numberOfOccurrences")
                    .and_then(|c| u32::try_from(c).ok())
                    .filter(|c| *c > 0)
                {
                    rule = rule.count(count);
                }
            }
            _ => {}
        }
    }

    let rule = RecurrenceRule::from(rule);
    debug!(rule = %rule, "Read recurrence");
    Some(rule)
}

fn absolute_day(pattern: &RemoteResource, rule: RRule<Unvalidated>) -> RRule<Unvalidated> {
    match pattern.i64_member("dayOfMonth").filter(|d| (1..=31).contains(d)) {
        Some(day) => rule.by_month_day(vec![day as i8]),
        None => rule,
    }
}

fn relative_day(pattern: &RemoteResource, rule: RRule<Unvalidated>) -> RRule<Unvalidated> {
    let rule = read_week_start(pattern, rule).by_weekday(read_days(pattern));
    match pattern.string_member("index").and_then(index_to_position) {
        Some(position) => rule.by_set_pos(vec![position]),
        None => rule,
    }
}

/// Remote pattern fields derived from a rule, before anything is written.
struct RemotePattern {
    kind: &'static str,
    interval: u16,
    days: Vec<Weekday>,
    first_day: Option<Weekday>,
    day_of_month: Option<i8>,
    month: Option<u8>,
    index: Option<&'static str>,
}

fn single<T: Copy>(values: &[T], what: &str) -> MappingResult<Option<T>> {
    match values {
        [] => Ok(None),
        [value] => Ok(Some(*value)),
        _ => Err(MappingError::UnsupportedShape(format!(
            "recurrence with more than one {}",
            what
        ))),
    }
}

fn pattern_for(rule: &RecurrenceRule, start: &EventTime) -> MappingResult<RemotePattern> {
    if let Some(name) = rule.time_of_day_parts().first() {
        return Err(MappingError::UnsupportedShape(format!(
            "recurrence part {} cannot be represented",
            name
        )));
    }

    let inner = rule.as_rrule();
    let start_date = start.date_naive();
    let days: Vec<Weekday> = inner
        .get_by_weekday()
        .iter()
        .map(|d| match d {
            NWeekday::Every(day) | NWeekday::Nth(_, day) => *day,
        })
        .collect();
    let mut pattern = RemotePattern {
        kind: "",
        interval: inner.get_interval().max(1),
        days: Vec::new(),
        first_day: None,
        day_of_month: None,
        month: None,
        index: None,
    };

    match inner.get_freq() {
        Frequency::Daily => {
            pattern.kind = "daily";
            pattern.days = days;
        }
        Frequency::Weekly => {
            pattern.kind = "weekly";
            pattern.first_day = Some(inner.get_week_start());
            pattern.days = if days.is_empty() {
                vec![start_date.weekday()]
            } else {
                days
            };
        }
        freq @ (Frequency::Monthly | Frequency::Yearly) => {
            let yearly = freq == Frequency::Yearly;
            // An ordinal BYDAY such as 2MO is a set position too
            let ordinals: Vec<i32> = inner
                .get_by_weekday()
                .iter()
                .filter_map(|d| match d {
                    NWeekday::Nth(n, _) => Some(i32::from(*n)),
                    NWeekday::Every(_) => None,
                })
                .collect();
            let ordinal = single(&ordinals, "BYDAY ordinal")?;
            let position = single(inner.get_by_set_pos(), "BYSETPOS")?.or(ordinal);

            match position {
                Some(position) => {
                    pattern.kind = if yearly { "relativeYearly" } else { "relativeMonthly" };
                    pattern.index = Some(position_to_index(position).ok_or_else(|| {
                        MappingError::UnsupportedShape(format!(
                            "recurrence set position {} cannot be represented",
                            position
                        ))
                    })?);
                    pattern.first_day = Some(inner.get_week_start());
                    pattern.days = if days.is_empty() {
                        vec![start_date.weekday()]
                    } else {
                        days
                    };
                }
                None => {
                    pattern.kind = if yearly { "absoluteYearly" } else { "absoluteMonthly" };
                    let day = single(inner.get_by_month_day(), "BYMONTHDAY")?
                        .unwrap_or(start_date.day() as i8);
                    if day < 1 {
                        return Err(MappingError::UnsupportedShape(format!(
                            "recurrence month day {} cannot be represented",
                            day
                        )));
                    }
                    pattern.day_of_month = Some(day);
                }
            }

            if yearly {
                pattern.month = Some(
                    single(inner.get_by_month(), "BYMONTH")?.unwrap_or(start_date.month() as u8),
                );
            }
        }
        other => {
            return Err(MappingError::NotSupported(format!(
                "recurrence frequency {}",
                other
            )));
        }
    }

    Ok(pattern)
}

fn emit_recurrence(
    builder: &mut JsonBuilder,
    rule: &RecurrenceRule,
    pattern: &RemotePattern,
    start: &EventTime,
    timezones: &dyn TimezoneResolver,
) -> MappingResult<()> {
    let start_date = format_packed_date(encode_packed_date(start.date_naive()))
        .ok_or_else(|| MappingError::InvalidObject("recurrence start date out of range".into()))?;

    builder.begin_object_member("recurrence");

    builder
        .begin_object_member("pattern")
        .add_member("type", pattern.kind)
        .add_member("interval", pattern.interval);
    if !pattern.days.is_empty() {
        builder.begin_array_member("daysOfWeek");
        for day in &pattern.days {
            builder.add_element(weekday_to_remote(*day));
        }
        builder.end_array_member();
    }
    if let Some(first_day) = pattern.first_day {
        builder.add_member("firstDayOfWeek", weekday_to_remote(first_day));
    }
    if let Some(day) = pattern.day_of_month {
        builder.add_member("dayOfMonth", day);
    }
    if let Some(month) = pattern.month {
        builder.add_member("month", month);
    }
    if let Some(index) = pattern.index {
        builder.add_member("index", index);
    }
    builder.end_object_member();

    builder.begin_object_member("range");
    if let Some(until) = rule.until_date() {
        let end_date = format_packed_date(encode_packed_date(until))
            .ok_or_else(|| MappingError::InvalidObject("recurrence end date out of range".into()))?;
        builder
            .add_member("type", "endDate")
            .add_member("startDate", start_date)
            .add_member("endDate", end_date);
    } else if let Some(count) = rule.effective_count() {
        builder
            .add_member("type", "numbered")
            .add_member("startDate", start_date)
            .add_member("numberOfOccurrences", count);
    } else {
        builder
            .add_member("type", "noEnd")
            .add_member("startDate", start_date);
    }
    if start.tzid().is_some() {
        builder.add_member("recurrenceTimeZone", remote_zone_name(start, timezones));
    }
    builder.end_object_member();

    builder.end_object_member();
    Ok(())
}

/// Write the `recurrence` member when the rule changed.
///
/// `anchor` is the object's own start (or due date for tasks) and becomes
/// the range start. Removing the rule writes `recurrence: null`.
pub fn write_recurrence(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
    anchor: Option<&EventTime>,
    timezones: &dyn TimezoneResolver,
) -> MappingResult<()> {
    if new.rrules.len() > 1 {
        return Err(MappingError::InvalidObject(format!(
            "{} recurrence rules, at most one is allowed",
            new.rrules.len()
        )));
    }
    if !new.rdates.is_empty() {
        return Err(MappingError::UnsupportedShape(
            "RDATE cannot be represented".into(),
        ));
    }
    if !new.exrules.is_empty() {
        return Err(MappingError::UnsupportedShape(
            "EXRULE cannot be represented".into(),
        ));
    }

    let new_rule = new.rrule();
    let old_rule = old.and_then(|o| o.rrule());
    let new_text = new_rule.map(|r| r.to_string());
    if old.is_some() && new_text == old_rule.map(|r| r.to_string()) {
        return Ok(());
    }

    let Some(rule) = new_rule else {
        if old_rule.is_some() {
            builder.add_null_member("recurrence");
        }
        return Ok(());
    };

    let start = anchor.ok_or_else(|| {
        MappingError::InvalidObject("recurring object has no start date".into())
    })?;
    let pattern = pattern_for(rule, start)?;
    debug!(rule = %rule, pattern_type = pattern.kind, "Writing recurrence");
    emit_recurrence(builder, rule, &pattern, start, timezones)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timezone::WindowsZones;
    use calsync_core::ObjectKind;
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    fn zoned_start() -> EventTime {
        EventTime::DateTimeZoned {
            datetime: NaiveDate::from_ymd_opt(2025, 3, 20)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            tzid: "Europe/Berlin".to_string(),
        }
    }

    fn object_with(rules: &[&str]) -> CalendarObject {
        let mut obj = CalendarObject::new(ObjectKind::Event, "uid-1");
        obj.start = Some(zoned_start());
        obj.rrules = rules.iter().map(|r| r.parse().unwrap()).collect();
        obj
    }

    fn write(new: &CalendarObject, old: Option<&CalendarObject>) -> MappingResult<Value> {
        let mut builder = JsonBuilder::new();
        write_recurrence(&mut builder, new, old, new.start.as_ref(), &WindowsZones)?;
        Ok(builder.finish())
    }

    fn round_trip(rule: &str) -> RecurrenceRule {
        let doc = write(&object_with(&[rule]), None).unwrap();
        let recurrence = RemoteResource::new(&doc).object_member("recurrence").unwrap();
        read_recurrence(&recurrence).unwrap()
    }

    #[test]
    fn test_round_trip_for_every_pattern_kind() {
        let rules = [
            "FREQ=DAILY;INTERVAL=2",
            "FREQ=DAILY;COUNT=10;BYDAY=MO,TU,WE,TH,FR",
            "FREQ=WEEKLY;BYDAY=MO,WE;WKST=SU",
            "FREQ=MONTHLY;BYMONTHDAY=15",
            "FREQ=MONTHLY;INTERVAL=3;BYDAY=TH;BYSETPOS=-1",
            "FREQ=YEARLY;COUNT=5;BYMONTHDAY=20;BYMONTH=3",
            "FREQ=YEARLY;BYDAY=SU;BYMONTH=11;BYSETPOS=1",
        ];
        for rule in rules {
            let expected = rule.parse::<RecurrenceRule>().unwrap();
            assert_eq!(round_trip(rule), expected, "round trip of {}", rule);
        }
    }

    #[test]
    fn test_until_round_trips_as_end_date() {
        let doc = write(&object_with(&["FREQ=WEEKLY;UNTIL=20251231T235959Z;BYDAY=MO"]), None)
            .unwrap();
        assert_eq!(doc["recurrence"]["range"]["type"], "endDate");
        assert_eq!(doc["recurrence"]["range"]["endDate"], "2025-12-31");

        let rule = round_trip("FREQ=WEEKLY;UNTIL=20251231T235959Z;BYDAY=MO");
        assert_eq!(rule.until_date(), NaiveDate::from_ymd_opt(2025, 12, 31));
        assert_eq!(
            rule.as_rrule().get_by_weekday(),
            &[NWeekday::Every(Weekday::Mon)]
        );
    }

    #[test]
    fn test_count_zero_is_no_end_and_count_five_is_numbered() {
        let mut zero = object_with(&[]);
        zero.rrules = vec![RRule::new(Frequency::Daily).count(0).into()];
        let doc = write(&zero, None).unwrap();
        assert_eq!(doc["recurrence"]["range"]["type"], "noEnd");

        let doc = write(&object_with(&["FREQ=DAILY;COUNT=5"]), None).unwrap();
        assert_eq!(doc["recurrence"]["range"]["type"], "numbered");
        assert_eq!(doc["recurrence"]["range"]["numberOfOccurrences"], 5);
        assert_eq!(doc["recurrence"]["range"]["startDate"], "2025-03-20");
        assert_eq!(
            doc["recurrence"]["range"]["recurrenceTimeZone"],
            "W. Europe Standard Time"
        );
    }

    #[test]
    fn test_unchanged_rule_writes_nothing() {
        let new = object_with(&["FREQ=WEEKLY;BYDAY=MO"]);
        let old = object_with(&["FREQ=WEEKLY;BYDAY=MO"]);
        assert_eq!(write(&new, Some(&old)).unwrap(), json!({}));
    }

    #[test]
    fn test_removed_rule_writes_null() {
        let new = object_with(&[]);
        let old = object_with(&["FREQ=WEEKLY;BYDAY=MO"]);
        assert_eq!(write(&new, Some(&old)).unwrap(), json!({"recurrence": null}));
    }

    #[test]
    fn test_weekly_without_byday_uses_start_weekday() {
        let doc = write(&object_with(&["FREQ=WEEKLY"]), None).unwrap();
        // 2025-03-20 is a Thursday
        assert_eq!(doc["recurrence"]["pattern"]["daysOfWeek"], json!(["thursday"]));
    }

    #[test]
    fn test_ordinal_byday_counts_as_set_position() {
        let doc = write(&object_with(&["FREQ=MONTHLY;BYDAY=2MO"]), None).unwrap();
        assert_eq!(doc["recurrence"]["pattern"]["type"], "relativeMonthly");
        assert_eq!(doc["recurrence"]["pattern"]["index"], "second");
        assert_eq!(doc["recurrence"]["pattern"]["daysOfWeek"], json!(["monday"]));
    }

    #[test]
    fn test_rejected_shapes() {
        let two = object_with(&["FREQ=DAILY", "FREQ=WEEKLY"]);
        assert!(matches!(write(&two, None), Err(MappingError::InvalidObject(_))));

        let mut rdate = object_with(&["FREQ=DAILY"]);
        rdate.rdates.push(zoned_start());
        assert!(matches!(write(&rdate, None), Err(MappingError::UnsupportedShape(_))));

        let mut exrule = object_with(&["FREQ=DAILY"]);
        exrule.exrules.push("FREQ=WEEKLY".to_string());
        assert!(matches!(write(&exrule, None), Err(MappingError::UnsupportedShape(_))));

        let third_last = object_with(&["FREQ=MONTHLY;BYDAY=FR;BYSETPOS=-2"]);
        assert!(matches!(write(&third_last, None), Err(MappingError::UnsupportedShape(_))));
    }

    #[test]
    fn test_time_of_day_parts_are_rejected() {
        let twice_a_day = object_with(&["FREQ=DAILY;BYHOUR=9,17"]);
        assert!(matches!(write(&twice_a_day, None), Err(MappingError::UnsupportedShape(_))));
    }

    #[test]
    fn test_unsupported_frequency_names_it() {
        let hourly = object_with(&["FREQ=HOURLY"]);
        match write(&hourly, None) {
            Err(MappingError::NotSupported(msg)) => assert!(msg.contains("HOURLY"), "{}", msg),
            other => panic!("expected NotSupported, got {:?}", other),
        }
    }

    #[test]
    fn test_read_skips_unknown_pattern_type() {
        let value = json!({"pattern": {"type": "hourly", "interval": 1}, "range": {"type": "noEnd"}});
        assert!(read_recurrence(&RemoteResource::new(&value)).is_none());
    }

    #[test]
    fn test_read_invalid_end_date_leaves_rule_open() {
        let value = json!({
            "pattern": {"type": "daily", "interval": 1},
            "range": {"type": "endDate", "startDate": "2025-03-20", "endDate": "2025-02-30"}
        });
        let rule = read_recurrence(&RemoteResource::new(&value)).unwrap();
        assert_eq!(rule.until_date(), None);
    }
}

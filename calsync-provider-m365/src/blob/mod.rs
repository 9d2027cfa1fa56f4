//! Decoder for the legacy AppointmentRecurrencePattern blob.
//!
//! Older items carry their deleted and modified occurrences only in this
//! binary structure, stored base64-encoded in an extended property. The
//! decoder is a pure function over the bytes; `RecurrenceBlob::apply`
//! turns the result into exclusion dates on the master object plus one
//! detached instance per modified occurrence.

mod exception;
mod pattern;
mod reader;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{NaiveDateTime, TimeDelta};
use thiserror::Error;
use tracing::debug;

use calsync_core::{
    Alarm, AlarmTrigger, CalendarObject, EventTime, ObjectKind, Transparency, TriggerRelation,
};

pub use exception::{ExceptionInfo, ExtendedException, flags};
pub use pattern::{
    EndType, FREQUENCY_DAILY, FREQUENCY_MONTHLY, FREQUENCY_WEEKLY, FREQUENCY_YEARLY,
    PatternType, RecurrencePattern, minutes_to_utc,
};

use reader::ByteReader;

/// Extended property id under which the blob is stored.
pub const BLOB_PROPERTY_ID: &str = "Binary {00062002-0000-0000-C000-000000000046} Id 0x8216";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BlobError {
    #[error("Blob truncated at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    TruncatedBuffer {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("Blob is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Blob lists {exceptions} exceptions but {modified} modified instances")]
    ExceptionCountMismatch { exceptions: usize, modified: usize },

    #[error("Invalid UTF-16 string at offset {offset}")]
    InvalidString { offset: usize },
}

/// A fully decoded blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceBlob {
    pub pattern: RecurrencePattern,
    pub reader_version: u32,
    pub writer_version: u32,
    pub start_time_offset: u32,
    pub end_time_offset: u32,
    /// Exceptions in blob order; `extended[i]` belongs to `exceptions[i]`
    pub exceptions: Vec<ExceptionInfo>,
    pub extended: Vec<ExtendedException>,
}

/// Decode the base64 text of the extended property.
#[tracing::instrument(skip_all, fields(len = encoded.len()))]
pub fn decode_base64(encoded: &str) -> Result<RecurrenceBlob, BlobError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    decode(&bytes)
}

/// Decode raw blob bytes.
pub fn decode(bytes: &[u8]) -> Result<RecurrenceBlob, BlobError> {
    let mut reader = ByteReader::new(bytes);

    let pattern = RecurrencePattern::read(&mut reader)?;
    let reader_version = reader.read_u32()?;
    let writer_version = reader.read_u32()?;
    let start_time_offset = reader.read_u32()?;
    let end_time_offset = reader.read_u32()?;

    let exception_count = reader.read_u16()? as usize;
    if exception_count != pattern.modified_instance_dates.len() {
        return Err(BlobError::ExceptionCountMismatch {
            exceptions: exception_count,
            modified: pattern.modified_instance_dates.len(),
        });
    }

    let exceptions = (0..exception_count)
        .map(|_| ExceptionInfo::read(&mut reader))
        .collect::<Result<Vec<_>, _>>()?;
    reader.read_block()?;

    let extended = exceptions
        .iter()
        .map(|info| ExtendedException::read(&mut reader, writer_version, info))
        .collect::<Result<Vec<_>, _>>()?;
    reader.read_block()?;

    debug!(
        exceptions = exceptions.len(),
        deleted = pattern.deleted_instance_dates.len(),
        "Decoded recurrence blob"
    );

    Ok(RecurrenceBlob {
        pattern,
        reader_version,
        writer_version,
        start_time_offset,
        end_time_offset,
        exceptions,
        extended,
    })
}

/// Local blob minutes as a value shaped like the master's start.
fn local_time(minutes: u32, like: Option<&EventTime>) -> Option<EventTime> {
    let naive: NaiveDateTime = minutes_to_utc(minutes)?.naive_utc();
    Some(match like {
        Some(EventTime::Date(_)) => EventTime::Date(naive.date()),
        Some(EventTime::DateTimeZoned { tzid, .. }) => EventTime::DateTimeZoned {
            datetime: naive,
            tzid: tzid.clone(),
        },
        Some(EventTime::DateTimeFloating(_)) => EventTime::DateTimeFloating(naive),
        Some(EventTime::DateTimeUtc(_)) | None => EventTime::DateTimeUtc(naive.and_utc()),
    })
}

fn shifted(time: &EventTime, by: TimeDelta) -> Option<EventTime> {
    Some(match time {
        EventTime::Date(d) => EventTime::Date(d.checked_add_signed(by)?),
        EventTime::DateTimeUtc(dt) => EventTime::DateTimeUtc(dt.checked_add_signed(by)?),
        EventTime::DateTimeFloating(dt) => EventTime::DateTimeFloating(dt.checked_add_signed(by)?),
        EventTime::DateTimeZoned { datetime, tzid } => EventTime::DateTimeZoned {
            datetime: datetime.checked_add_signed(by)?,
            tzid: tzid.clone(),
        },
    })
}

impl RecurrenceBlob {
    /// Deleted occurrences that are not also modified ones.
    pub fn deleted_only_dates(&self) -> impl Iterator<Item = u32> + '_ {
        self.pattern
            .deleted_instance_dates
            .iter()
            .copied()
            .filter(|d| !self.pattern.modified_instance_dates.contains(d))
    }

    /// Add exclusion dates (and the rule, when the master has none) to
    /// `master` and return the detached instances in blob order.
    pub fn apply(&self, master: &mut CalendarObject) -> Vec<CalendarObject> {
        if master.rrules.is_empty() {
            master.rrules.extend(self.pattern.to_rule());
        }

        for minutes in self.deleted_only_dates() {
            if let Some(at) = minutes_to_utc(minutes) {
                master.exdates.push(EventTime::DateTimeUtc(at));
            }
        }

        self.exceptions
            .iter()
            .zip(&self.extended)
            .map(|(info, extended)| self.detached_instance(master, info, extended))
            .collect()
    }

    fn detached_instance(
        &self,
        master: &CalendarObject,
        info: &ExceptionInfo,
        extended: &ExtendedException,
    ) -> CalendarObject {
        let mut instance = master.clone();
        instance.strip_recurrence();

        let like = master.start.as_ref();
        instance.recurrence_id = local_time(info.original_start, like);
        if let Some(start) = local_time(info.start, like) {
            let duration = match (&master.start, &master.end) {
                (Some(s), Some(e)) => e.naive_local() - s.naive_local(),
                _ => TimeDelta::zero(),
            };
            instance.end = local_time(info.end, like)
                .filter(|end| end.naive_local() >= start.naive_local())
                .or_else(|| shifted(&start, duration));
            instance.start = Some(start);
        }

        if let Some(subject) = extended.subject.clone().or_else(|| info.subject.clone()) {
            instance.summary = Some(subject);
        }
        if let Some(location) = extended.location.clone().or_else(|| info.location.clone()) {
            instance.location = Some(location);
        }
        if let Some(busy) = info.busy_status {
            instance.transparency = Some(if busy == 0 {
                Transparency::Transparent
            } else {
                Transparency::Opaque
            });
        }
        if master.kind == ObjectKind::Event {
            match info.reminder_set {
                Some(0) => instance.alarms.clear(),
                Some(_) => {
                    if let Some(delta) = info.reminder_delta {
                        instance.alarms = vec![Alarm {
                            trigger: AlarmTrigger::Relative {
                                minutes: -i64::from(delta),
                                related: TriggerRelation::Start,
                            },
                            description: None,
                        }];
                    }
                }
                None => {}
            }
        }

        instance
    }
}

#[cfg(test)]
pub(crate) mod test_blob {
    //! Byte-level blob writer for tests.

    use super::flags;

    pub const EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

    pub fn minutes_of(unix_secs: i64) -> u32 {
        ((unix_secs + EPOCH_OFFSET_SECS) / 60) as u32
    }

    pub struct TestException {
        pub start: u32,
        pub end: u32,
        pub original_start: u32,
        pub flags: u16,
        pub subject: Option<&'static str>,
        pub location: Option<&'static str>,
        pub busy_status: Option<u32>,
    }

    pub struct TestBlob {
        pub writer_version2: u32,
        pub deleted: Vec<u32>,
        pub exceptions: Vec<TestException>,
        pub declared_exception_count: Option<u16>,
    }

    impl Default for TestBlob {
        fn default() -> Self {
            TestBlob {
                writer_version2: 0x3009,
                deleted: Vec::new(),
                exceptions: Vec::new(),
                declared_exception_count: None,
            }
        }
    }

    fn u16le(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    fn u32le(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    fn narrow(out: &mut Vec<u8>, s: &str) {
        u16le(out, s.len() as u16 + 1);
        u16le(out, s.len() as u16);
        out.extend_from_slice(s.as_bytes());
    }

    fn wide(out: &mut Vec<u8>, s: &str) {
        let units: Vec<u16> = s.encode_utf16().collect();
        u16le(out, units.len() as u16);
        for unit in units {
            u16le(out, unit);
        }
    }

    impl TestBlob {
        /// Weekly on Monday and Wednesday from 2025-03-17, ten occurrences.
        pub fn bytes(&self) -> Vec<u8> {
            let mut out = Vec::new();
            u16le(&mut out, 0x3004);
            u16le(&mut out, 0x3004);
            u16le(&mut out, 0x200B);
            u16le(&mut out, 0x0001);
            u16le(&mut out, 0);
            u32le(&mut out, 0);
            u32le(&mut out, 1);
            u32le(&mut out, 0);
            u32le(&mut out, 0x0A);
            u32le(&mut out, 0x2022);
            u32le(&mut out, 10);
            u32le(&mut out, 1);

            u32le(&mut out, self.deleted.len() as u32);
            for d in &self.deleted {
                u32le(&mut out, *d);
            }
            u32le(&mut out, self.exceptions.len() as u32);
            for e in &self.exceptions {
                u32le(&mut out, e.original_start);
            }
            u32le(&mut out, minutes_of(1_742_169_600));
            u32le(&mut out, 0x5AE9_80DF);

            u32le(&mut out, 0x3006);
            u32le(&mut out, self.writer_version2);
            u32le(&mut out, 600);
            u32le(&mut out, 660);
            u16le(
                &mut out,
                self.declared_exception_count
                    .unwrap_or(self.exceptions.len() as u16),
            );
            for e in &self.exceptions {
                u32le(&mut out, e.start);
                u32le(&mut out, e.end);
                u32le(&mut out, e.original_start);
                u16le(&mut out, e.flags);
                if e.flags & flags::SUBJECT != 0 {
                    narrow(&mut out, e.subject.unwrap_or_default());
                }
                if e.flags & flags::LOCATION != 0 {
                    narrow(&mut out, e.location.unwrap_or_default());
                }
                if e.flags & flags::BUSY_STATUS != 0 {
                    u32le(&mut out, e.busy_status.unwrap_or_default());
                }
            }
            // Reserved block 1
            u32le(&mut out, 0);

            for e in &self.exceptions {
                if self.writer_version2 >= 0x3009 {
                    u32le(&mut out, 4);
                    u32le(&mut out, 0);
                }
                // Reserved block EE1
                u32le(&mut out, 0);
                if e.flags & (flags::SUBJECT | flags::LOCATION) != 0 {
                    u32le(&mut out, e.start);
                    u32le(&mut out, e.end);
                    u32le(&mut out, e.original_start);
                    if e.flags & flags::SUBJECT != 0 {
                        wide(&mut out, e.subject.unwrap_or_default());
                    }
                    if e.flags & flags::LOCATION != 0 {
                        wide(&mut out, e.location.unwrap_or_default());
                    }
                    // Reserved block EE2
                    u32le(&mut out, 0);
                }
            }
            // Reserved block 2
            u32le(&mut out, 0);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_blob::{TestBlob, TestException, minutes_of};
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn exception(day: u32, subject: Option<&'static str>, location: Option<&'static str>) -> TestException {
        // Occurrences at 10:00 on 2025-03-17 + day, moved to 14:00
        let original = minutes_of(1_742_205_600 + i64::from(day) * 86_400);
        let mut flag_bits = 0;
        if subject.is_some() {
            flag_bits |= flags::SUBJECT;
        }
        if location.is_some() {
            flag_bits |= flags::LOCATION;
        }
        TestException {
            start: original + 240,
            end: original + 300,
            original_start: original,
            flags: flag_bits,
            subject,
            location,
            busy_status: None,
        }
    }

    fn master() -> CalendarObject {
        let mut obj = CalendarObject::new(ObjectKind::Event, "uid-1");
        obj.summary = Some("Sync".to_string());
        obj.location = Some("Room 1".to_string());
        let day = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
        obj.start = Some(EventTime::DateTimeZoned {
            datetime: day.and_hms_opt(10, 0, 0).unwrap(),
            tzid: "Europe/Berlin".to_string(),
        });
        obj.end = Some(EventTime::DateTimeZoned {
            datetime: day.and_hms_opt(11, 0, 0).unwrap(),
            tzid: "Europe/Berlin".to_string(),
        });
        obj
    }

    #[test]
    fn test_deleted_instance_becomes_exdate() {
        let m = minutes_of(1_742_428_800);
        let blob = TestBlob {
            deleted: vec![m],
            ..Default::default()
        };
        let decoded = decode(&blob.bytes()).unwrap();

        let mut obj = master();
        let detached = decoded.apply(&mut obj);
        assert!(detached.is_empty());
        assert_eq!(
            obj.exdates,
            vec![EventTime::DateTimeUtc(
                Utc.timestamp_opt(i64::from(m) * 60 - 11_644_473_600, 0).unwrap()
            )]
        );
        assert_eq!(
            obj.rrule(),
            Some(&"FREQ=WEEKLY;COUNT=10;BYDAY=MO,WE;WKST=MO".parse::<calsync_core::RecurrenceRule>().unwrap())
        );
    }

    #[test]
    fn test_exceptions_keep_blob_order_and_prefer_wide_strings() {
        let blob = TestBlob {
            exceptions: vec![
                exception(9, Some("Moved"), None),
                exception(2, None, Some("Room 2")),
                exception(7, Some("Both"), Some("Annex")),
            ],
            ..Default::default()
        };
        let decoded = decode_base64(&STANDARD.encode(blob.bytes())).unwrap();
        assert_eq!(decoded.exceptions.len(), 3);

        let mut obj = master();
        let detached = decoded.apply(&mut obj);
        let subjects: Vec<_> = detached.iter().map(|d| d.summary.as_deref()).collect();
        assert_eq!(subjects, vec![Some("Moved"), Some("Sync"), Some("Both")]);
        let locations: Vec<_> = detached.iter().map(|d| d.location.as_deref()).collect();
        assert_eq!(locations, vec![Some("Room 1"), Some("Room 2"), Some("Annex")]);

        let first = &detached[0];
        assert!(first.rrules.is_empty() && first.exdates.is_empty());
        assert_eq!(
            first.recurrence_id,
            Some(EventTime::DateTimeZoned {
                datetime: NaiveDate::from_ymd_opt(2025, 3, 26)
                    .unwrap()
                    .and_hms_opt(10, 0, 0)
                    .unwrap(),
                tzid: "Europe/Berlin".to_string(),
            })
        );
        assert_eq!(
            first.start.as_ref().map(|s| s.naive_local().format("%H:%M").to_string()),
            Some("14:00".to_string())
        );
        assert_eq!(
            first.end.as_ref().map(|s| s.naive_local().format("%H:%M").to_string()),
            Some("15:00".to_string())
        );
    }

    #[test]
    fn test_narrow_string_used_when_wide_absent() {
        let info = ExceptionInfo {
            subject: Some("Narrow".to_string()),
            override_flags: flags::SUBJECT,
            ..Default::default()
        };
        let blob = RecurrenceBlob {
            pattern: decode(&TestBlob::default().bytes()).unwrap().pattern,
            reader_version: 0x3006,
            writer_version: 0x3009,
            start_time_offset: 600,
            end_time_offset: 660,
            exceptions: vec![info],
            extended: vec![ExtendedException::default()],
        };
        let detached = blob.apply(&mut master());
        assert_eq!(detached[0].summary.as_deref(), Some("Narrow"));
    }

    #[test]
    fn test_modified_dates_are_not_excluded() {
        let moved = exception(2, Some("Moved"), None);
        let blob = TestBlob {
            deleted: vec![moved.original_start, minutes_of(1_742_428_800)],
            exceptions: vec![moved],
            ..Default::default()
        };
        let mut obj = master();
        decode(&blob.bytes()).unwrap().apply(&mut obj);
        assert_eq!(obj.exdates.len(), 1);
    }

    #[test]
    fn test_every_truncated_prefix_is_rejected() {
        let bytes = TestBlob {
            deleted: vec![minutes_of(1_742_428_800)],
            exceptions: vec![
                exception(2, Some("Moved"), Some("Room 2")),
                exception(9, None, None),
            ],
            ..Default::default()
        }
        .bytes();
        assert!(decode(&bytes).is_ok());

        for len in 0..bytes.len() {
            match decode(&bytes[..len]) {
                Err(BlobError::TruncatedBuffer { .. }) => {}
                other => panic!("prefix of {} bytes: expected TruncatedBuffer, got {:?}", len, other),
            }
        }
    }

    #[test]
    fn test_older_writer_has_no_change_highlight() {
        let blob = TestBlob {
            writer_version2: 0x3008,
            exceptions: vec![exception(2, Some("Moved"), None)],
            ..Default::default()
        };
        let decoded = decode(&blob.bytes()).unwrap();
        assert_eq!(decoded.extended[0].subject.as_deref(), Some("Moved"));
    }

    #[test]
    fn test_exception_count_mismatch() {
        let blob = TestBlob {
            exceptions: vec![exception(2, None, None)],
            declared_exception_count: Some(2),
            ..Default::default()
        };
        assert_eq!(
            decode(&blob.bytes()),
            Err(BlobError::ExceptionCountMismatch {
                exceptions: 2,
                modified: 1
            })
        );
    }

    #[test]
    fn test_bad_base64() {
        assert!(matches!(decode_base64("not base64!"), Err(BlobError::Base64(_))));
    }
}

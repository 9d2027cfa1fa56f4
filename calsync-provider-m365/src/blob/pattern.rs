//! The RecurrencePattern header and its translation to a rule.

use chrono::{DateTime, Datelike, Month, Utc, Weekday};
use tracing::warn;

use calsync_core::{Frequency, NWeekday, RRule, RecurrenceRule, Unvalidated, until_end_of_day};

use super::BlobError;
use super::reader::ByteReader;

pub const FREQUENCY_DAILY: u16 = 0x200A;
pub const FREQUENCY_WEEKLY: u16 = 0x200B;
pub const FREQUENCY_MONTHLY: u16 = 0x200C;
pub const FREQUENCY_YEARLY: u16 = 0x200D;

const MINUTES_PER_DAY: u32 = 1440;
/// Seconds between 1601-01-01 and 1970-01-01.
const EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

/// Minutes since 1601-01-01 as a UTC instant.
pub fn minutes_to_utc(minutes: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::from(minutes) * 60 - EPOCH_OFFSET_SECS, 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternType {
    Day,
    Week,
    Month,
    MonthNth,
    MonthEnd,
    HijriMonth,
    HijriMonthNth,
    HijriMonthEnd,
    Unknown(u16),
}

impl From<u16> for PatternType {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => PatternType::Day,
            0x0001 => PatternType::Week,
            0x0002 => PatternType::Month,
            0x0003 => PatternType::MonthNth,
            0x0004 => PatternType::MonthEnd,
            0x000A => PatternType::HijriMonth,
            0x000B => PatternType::HijriMonthNth,
            0x000C => PatternType::HijriMonthEnd,
            other => PatternType::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndType {
    AfterDate,
    AfterCount,
    Never,
    Unknown(u32),
}

impl From<u32> for EndType {
    fn from(value: u32) -> Self {
        match value {
            0x2021 => EndType::AfterDate,
            0x2022 => EndType::AfterCount,
            0x2023 | 0xFFFF_FFFF => EndType::Never,
            other => EndType::Unknown(other),
        }
    }
}

/// Decoded RecurrencePattern structure. Dates are minutes since 1601.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrencePattern {
    pub reader_version: u16,
    pub writer_version: u16,
    pub frequency: u16,
    pub pattern_type: PatternType,
    pub calendar_type: u16,
    pub first_date_time: u32,
    /// Days in minutes, weeks, or months depending on the frequency
    pub period: u32,
    pub sliding_flag: u32,
    /// Day bitmask (week and nth patterns) or day of month (month patterns)
    pub pattern_specific: u32,
    /// Week of the month for nth patterns, 5 meaning the last
    pub nth: Option<u32>,
    pub end_type: EndType,
    pub occurrence_count: u32,
    pub first_day_of_week: u32,
    pub deleted_instance_dates: Vec<u32>,
    pub modified_instance_dates: Vec<u32>,
    pub start_date: u32,
    pub end_date: u32,
}

impl RecurrencePattern {
    pub(crate) fn read(reader: &mut ByteReader) -> Result<Self, BlobError> {
        let reader_version = reader.read_u16()?;
        let writer_version = reader.read_u16()?;
        let frequency = reader.read_u16()?;
        let pattern_type = PatternType::from(reader.read_u16()?);
        let calendar_type = reader.read_u16()?;
        let first_date_time = reader.read_u32()?;
        let period = reader.read_u32()?;
        let sliding_flag = reader.read_u32()?;

        let pattern_specific = if pattern_type == PatternType::Day {
            0
        } else {
            reader.read_u32()?
        };
        let nth = if pattern_type == PatternType::MonthNth {
            Some(reader.read_u32()?)
        } else {
            None
        };

        let end_type = EndType::from(reader.read_u32()?);
        let occurrence_count = reader.read_u32()?;
        let first_day_of_week = reader.read_u32()?;
        let deleted_instance_dates = reader.read_u32_array()?;
        let modified_instance_dates = reader.read_u32_array()?;
        let start_date = reader.read_u32()?;
        let end_date = reader.read_u32()?;

        Ok(RecurrencePattern {
            reader_version,
            writer_version,
            frequency,
            pattern_type,
            calendar_type,
            first_date_time,
            period,
            sliding_flag,
            pattern_specific,
            nth,
            end_type,
            occurrence_count,
            first_day_of_week,
            deleted_instance_dates,
            modified_instance_dates,
            start_date,
            end_date,
        })
    }

    /// The equivalent RRULE, or `None` for pattern and end types without one.
    pub fn to_rule(&self) -> Option<RecurrenceRule> {
        let yearly = self.frequency == FREQUENCY_YEARLY;
        let rule = match self.pattern_type {
            PatternType::Day => {
                RRule::new(Frequency::Daily).interval(interval(self.period / MINUTES_PER_DAY))
            }
            PatternType::Week if self.frequency == FREQUENCY_DAILY => {
                // "Every weekday" is stored as a daily frequency with a week pattern
                RRule::new(Frequency::Daily).by_weekday(days_from_mask(self.pattern_specific))
            }
            PatternType::Week => {
                let rule = RRule::new(Frequency::Weekly)
                    .interval(interval(self.period))
                    .by_weekday(days_from_mask(self.pattern_specific));
                match weekday_from_index(self.first_day_of_week) {
                    Some(day) => rule.week_start(day),
                    None => rule,
                }
            }
            PatternType::Month | PatternType::MonthEnd => {
                let day = match (self.pattern_type, self.pattern_specific) {
                    (PatternType::MonthEnd, _) | (_, 31) => -1,
                    (_, day @ 1..=30) => day as i8,
                    (_, day) => {
                        warn!(day, "Blob month day out of range, no rule produced");
                        return None;
                    }
                };
                self.monthly_or_yearly(yearly).by_month_day(vec![day])
            }
            PatternType::MonthNth => {
                let position = match self.nth {
                    Some(5) | None => -1,
                    Some(n @ 1..=4) => n as i32,
                    Some(n) => {
                        warn!(nth = n, "Blob week of month out of range, no rule produced");
                        return None;
                    }
                };
                self.monthly_or_yearly(yearly)
                    .by_weekday(days_from_mask(self.pattern_specific))
                    .by_set_pos(vec![position])
            }
            other => {
                warn!(pattern_type = ?other, "Blob pattern type has no rule equivalent");
                return None;
            }
        };

        let rule = match self.end_type {
            EndType::AfterDate => {
                match minutes_to_utc(self.end_date).and_then(|d| until_end_of_day(d.date_naive())) {
                    Some(until) => rule.until(until),
                    None => rule,
                }
            }
            EndType::AfterCount => rule.count(self.occurrence_count),
            EndType::Never => rule,
            EndType::Unknown(value) => {
                warn!(end_type = value, "Blob end type unknown, no rule produced");
                return None;
            }
        };

        Some(RecurrenceRule::from(rule))
    }

    fn monthly_or_yearly(&self, yearly: bool) -> RRule<Unvalidated> {
        if !yearly {
            return RRule::new(Frequency::Monthly).interval(interval(self.period));
        }
        let rule = RRule::new(Frequency::Yearly).interval(interval(self.period / 12));
        let month = minutes_to_utc(self.start_date)
            .and_then(|first| Month::try_from(first.month() as u8).ok());
        match month {
            Some(month) => rule.by_month(&[month]),
            None => rule,
        }
    }
}

/// Blob periods are unbounded, rule intervals are not.
fn interval(period: u32) -> u16 {
    u16::try_from(period).unwrap_or(u16::MAX).max(1)
}

fn weekday_from_index(index: u32) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Bit 0 is Sunday, bit 6 is Saturday.
fn days_from_mask(mask: u32) -> Vec<NWeekday> {
    (0..7)
        .filter(|bit| mask & (1 << bit) != 0)
        .filter_map(weekday_from_index)
        .map(NWeekday::Every)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(frequency: u16, pattern_type: PatternType, period: u32, specific: u32) -> RecurrencePattern {
        RecurrencePattern {
            reader_version: 0x3004,
            writer_version: 0x3004,
            frequency,
            pattern_type,
            calendar_type: 0,
            first_date_time: 0,
            period,
            sliding_flag: 0,
            pattern_specific: specific,
            nth: None,
            end_type: EndType::Never,
            occurrence_count: 10,
            first_day_of_week: 1,
            deleted_instance_dates: Vec::new(),
            modified_instance_dates: Vec::new(),
            // 2025-03-20 00:00
            start_date: ((1_742_428_800 + EPOCH_OFFSET_SECS) / 60) as u32,
            end_date: 0x5AE9_80DF,
        }
    }

    #[test]
    fn test_minutes_epoch_conversion() {
        let minutes = ((1_742_428_800 + EPOCH_OFFSET_SECS) / 60) as u32;
        assert_eq!(minutes_to_utc(minutes).unwrap().timestamp(), 1_742_428_800);
    }

    fn rule(text: &str) -> RecurrenceRule {
        text.parse().unwrap()
    }

    #[test]
    fn test_day_pattern_interval_is_days() {
        let converted = pattern(FREQUENCY_DAILY, PatternType::Day, 2 * 1440, 0)
            .to_rule()
            .unwrap();
        assert_eq!(converted, rule("FREQ=DAILY;INTERVAL=2"));
    }

    #[test]
    fn test_weekday_daily_and_weekly() {
        // Monday to Friday
        let converted = pattern(FREQUENCY_DAILY, PatternType::Week, 1, 0x3E).to_rule().unwrap();
        assert_eq!(converted, rule("FREQ=DAILY;BYDAY=MO,TU,WE,TH,FR"));

        let mut weekly = pattern(FREQUENCY_WEEKLY, PatternType::Week, 2, 0x0A);
        weekly.end_type = EndType::AfterCount;
        weekly.first_day_of_week = 0;
        assert_eq!(
            weekly.to_rule().unwrap(),
            rule("FREQ=WEEKLY;COUNT=10;INTERVAL=2;BYDAY=MO,WE;WKST=SU")
        );
    }

    #[test]
    fn test_end_date_is_until_date() {
        let mut daily = pattern(FREQUENCY_DAILY, PatternType::Day, 1440, 0);
        daily.end_type = EndType::AfterDate;
        daily.end_date = daily.start_date + 9 * 1440;
        let converted = daily.to_rule().unwrap();
        assert_eq!(
            converted.until_date(),
            chrono::NaiveDate::from_ymd_opt(2025, 3, 29)
        );
    }

    #[test]
    fn test_month_patterns() {
        let converted = pattern(FREQUENCY_MONTHLY, PatternType::Month, 1, 15).to_rule().unwrap();
        assert_eq!(converted, rule("FREQ=MONTHLY;BYMONTHDAY=15"));

        let converted = pattern(FREQUENCY_MONTHLY, PatternType::MonthEnd, 1, 31).to_rule().unwrap();
        assert_eq!(converted, rule("FREQ=MONTHLY;BYMONTHDAY=-1"));

        let converted = pattern(FREQUENCY_YEARLY, PatternType::Month, 12, 20).to_rule().unwrap();
        assert_eq!(converted, rule("FREQ=YEARLY;BYMONTHDAY=20;BYMONTH=3"));
    }

    #[test]
    fn test_nth_pattern_last_is_minus_one() {
        let mut nth = pattern(FREQUENCY_MONTHLY, PatternType::MonthNth, 1, 0x10);
        nth.nth = Some(5);
        assert_eq!(nth.to_rule().unwrap(), rule("FREQ=MONTHLY;BYDAY=TH;BYSETPOS=-1"));

        nth.nth = Some(2);
        nth.frequency = FREQUENCY_YEARLY;
        nth.period = 12;
        assert_eq!(
            nth.to_rule().unwrap(),
            rule("FREQ=YEARLY;BYDAY=TH;BYMONTH=3;BYSETPOS=2")
        );
    }

    #[test]
    fn test_out_of_range_month_values_produce_no_rule() {
        assert!(pattern(FREQUENCY_MONTHLY, PatternType::Month, 1, 0).to_rule().is_none());
        assert!(pattern(FREQUENCY_MONTHLY, PatternType::Month, 1, 200).to_rule().is_none());
        assert!(pattern(FREQUENCY_MONTHLY, PatternType::Month, 1, 0x1_0000).to_rule().is_none());

        let mut nth = pattern(FREQUENCY_MONTHLY, PatternType::MonthNth, 1, 0x10);
        nth.nth = Some(0);
        assert!(nth.to_rule().is_none());
        nth.nth = Some(40_000);
        assert!(nth.to_rule().is_none());
    }

    #[test]
    fn test_unknown_types_produce_no_rule() {
        assert!(pattern(FREQUENCY_MONTHLY, PatternType::HijriMonth, 1, 1).to_rule().is_none());

        let mut odd_end = pattern(FREQUENCY_DAILY, PatternType::Day, 1440, 0);
        odd_end.end_type = EndType::Unknown(0x1234);
        assert!(odd_end.to_rule().is_none());
    }
}

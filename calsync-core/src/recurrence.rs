//! RFC 5545 recurrence rules, parsed and printed by the `rrule` crate.
//!
//! `RecurrenceRule` wraps an unvalidated `rrule::RRule`: providers translate
//! rules structurally and never expand them, so no DTSTART is attached.
//! The `Display` output of `rrule` is the canonical text that change
//! detection compares.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, TimeZone};
use rrule::{Frequency, RRule, Unvalidated};
use serde::{Deserialize, Serialize};

use crate::error::{CalSyncError, CalSyncResult};

/// A single RRULE
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecurrenceRule(RRule<Unvalidated>);

impl RecurrenceRule {
    pub fn new(freq: Frequency) -> Self {
        RecurrenceRule(RRule::new(freq))
    }

    pub fn as_rrule(&self) -> &RRule<Unvalidated> {
        &self.0
    }

    pub fn into_rrule(self) -> RRule<Unvalidated> {
        self.0
    }

    /// COUNT when it is set to a positive value.
    pub fn effective_count(&self) -> Option<u32> {
        self.0.get_count().filter(|c| *c > 0)
    }

    /// Calendar date of UNTIL, in the zone the rule carries it in.
    pub fn until_date(&self) -> Option<NaiveDate> {
        self.0.get_until().map(|until| until.date_naive())
    }

    /// Rule parts set on this rule that only make sense for sub-daily or
    /// week-number based recurrences.
    pub fn time_of_day_parts(&self) -> Vec<&'static str> {
        let rule = &self.0;
        let mut parts = Vec::new();
        if !rule.get_by_hour().is_empty() {
            parts.push("BYHOUR");
        }
        if !rule.get_by_minute().is_empty() {
            parts.push("BYMINUTE");
        }
        if !rule.get_by_second().is_empty() {
            parts.push("BYSECOND");
        }
        if !rule.get_by_year_day().is_empty() {
            parts.push("BYYEARDAY");
        }
        if !rule.get_by_week_no().is_empty() {
            parts.push("BYWEEKNO");
        }
        parts
    }
}

/// UNTIL for a date-only end: the last second of that day in UTC.
pub fn until_end_of_day(date: NaiveDate) -> Option<chrono::DateTime<rrule::Tz>> {
    date.and_hms_opt(23, 59, 59)
        .map(|dt| rrule::Tz::UTC.from_utc_datetime(&dt))
}

impl From<RRule<Unvalidated>> for RecurrenceRule {
    fn from(rule: RRule<Unvalidated>) -> Self {
        RecurrenceRule(rule)
    }
}

impl PartialEq for RecurrenceRule {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RecurrenceRule {
    type Err = CalSyncError;

    fn from_str(s: &str) -> CalSyncResult<Self> {
        let s = s.trim();
        let body = s.strip_prefix("RRULE:").unwrap_or(s);
        body.parse::<RRule<Unvalidated>>()
            .map(RecurrenceRule)
            .map_err(|e| CalSyncError::RuleParse(format!("{} ({})", s, e)))
    }
}

impl TryFrom<String> for RecurrenceRule {
    type Error = CalSyncError;

    fn try_from(s: String) -> CalSyncResult<Self> {
        s.parse()
    }
}

impl From<RecurrenceRule> for String {
    fn from(rule: RecurrenceRule) -> Self {
        rule.to_string()
    }
}

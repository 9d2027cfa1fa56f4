//! Provider-neutral calendar object types.
//!
//! A `CalendarObject` is the in-memory form of a single VEVENT or VTODO.
//! Providers convert their API resources into these types and back, and
//! the `ics` module renders them as iCalendar text.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::recurrence::RecurrenceRule;

/// ATTENDEE parameter carrying the time the attendee last responded.
pub const STATUS_TIME_PARAM: &str = "X-M365-STATUS-TIME";

/// ATTACH parameter carrying the provider's attachment id.
pub const ATTACHMENT_ID_PARAM: &str = "X-M365-ATTACHMENT-ID";

/// Which iCalendar component an object represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    #[default]
    Event,
    Task,
}

impl ObjectKind {
    pub fn component_name(self) -> &'static str {
        match self {
            ObjectKind::Event => "VEVENT",
            ObjectKind::Task => "VTODO",
        }
    }
}

/// A calendar event or task (provider-neutral)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarObject {
    pub kind: ObjectKind,
    pub uid: String,

    // Sync Infrastructure
    /// Creation timestamp (CREATED)
    pub created: Option<DateTime<Utc>>,
    /// Last modification timestamp (LAST-MODIFIED)
    pub last_modified: Option<DateTime<Utc>>,

    // Timing
    pub start: Option<EventTime>,
    /// DTEND for events
    pub end: Option<EventTime>,
    /// DUE for tasks
    pub due: Option<EventTime>,
    /// COMPLETED for tasks
    pub completed: Option<DateTime<Utc>>,

    // Descriptive
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub classification: Option<Classification>,
    /// Whether the object blocks time (OPAQUE) or is free (TRANSPARENT)
    pub transparency: Option<Transparency>,
    pub status: Option<Status>,
    /// PRIORITY, 0 means undefined
    pub priority: Option<u8>,
    pub categories: Vec<String>,

    // Meeting Data
    pub organizer: Option<Attendee>,
    pub attendees: Vec<Attendee>,
    /// Conference/video call URL
    pub conference_url: Option<String>,
    /// Whether the provider should host an online meeting for this event
    pub online_meeting: bool,

    // Recurrence
    pub rrules: Vec<RecurrenceRule>,
    /// RDATE values; kept so writers can refuse them
    pub rdates: Vec<EventTime>,
    /// Raw EXRULE values; kept so writers can refuse them
    pub exrules: Vec<String>,
    pub exdates: Vec<EventTime>,
    /// Original start of the occurrence this object overrides (RECURRENCE-ID)
    pub recurrence_id: Option<EventTime>,

    // Alarms & Attachments
    pub alarms: Vec<Alarm>,
    pub attachments: Vec<Attachment>,

    // Provider-specific
    /// Custom X- properties, preserved for round-tripping provider data
    pub custom_properties: Vec<(String, String)>,
}

impl CalendarObject {
    pub fn new(kind: ObjectKind, uid: impl Into<String>) -> Self {
        CalendarObject {
            kind,
            uid: uid.into(),
            ..Default::default()
        }
    }

    /// The single recurrence rule, if the object has one.
    pub fn rrule(&self) -> Option<&RecurrenceRule> {
        self.rrules.first()
    }

    pub fn is_recurring(&self) -> bool {
        !self.rrules.is_empty() || !self.rdates.is_empty()
    }

    pub fn custom_property(&self, name: &str) -> Option<&str> {
        self.custom_properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a custom property, replacing any existing value with the same name.
    pub fn set_custom_property(&mut self, name: &str, value: impl Into<String>) {
        self.remove_custom_property(name);
        self.custom_properties.push((name.to_string(), value.into()));
    }

    pub fn remove_custom_property(&mut self, name: &str) {
        self.custom_properties
            .retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Drop every recurrence-producing property (RRULE, RDATE, EXRULE, EXDATE).
    pub fn strip_recurrence(&mut self) {
        self.rrules.clear();
        self.rdates.clear();
        self.exrules.clear();
        self.exdates.clear();
    }
}

/// A start/end/due value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    /// Whole-day value (VALUE=DATE)
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    DateTimeFloating(NaiveDateTime),
    /// Local time in an IANA timezone (TZID parameter)
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

impl EventTime {
    /// The instant this value denotes. Dates and floating times are read as UTC.
    /// Returns `None` only for zoned values whose TZID is not a known IANA zone.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            EventTime::Date(d) => d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
            EventTime::DateTimeUtc(dt) => Some(*dt),
            EventTime::DateTimeFloating(dt) => Some(dt.and_utc()),
            EventTime::DateTimeZoned { datetime, tzid } => {
                let tz: chrono_tz::Tz = tzid.parse().ok()?;
                tz.from_local_datetime(datetime)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
            }
        }
    }

    /// Timezone identifier: the TZID for zoned values, "UTC" for UTC values.
    pub fn tzid(&self) -> Option<&str> {
        match self {
            EventTime::DateTimeZoned { tzid, .. } => Some(tzid),
            EventTime::DateTimeUtc(_) => Some("UTC"),
            EventTime::Date(_) | EventTime::DateTimeFloating(_) => None,
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// Calendar date in the value's own timezone.
    pub fn date_naive(&self) -> NaiveDate {
        match self {
            EventTime::Date(d) => *d,
            EventTime::DateTimeUtc(dt) => dt.date_naive(),
            EventTime::DateTimeFloating(dt) => dt.date(),
            EventTime::DateTimeZoned { datetime, .. } => datetime.date(),
        }
    }

    /// Wall-clock value in the value's own timezone.
    pub fn naive_local(&self) -> NaiveDateTime {
        match self {
            EventTime::Date(d) => d.and_time(chrono::NaiveTime::MIN),
            EventTime::DateTimeUtc(dt) => dt.naive_utc(),
            EventTime::DateTimeFloating(dt) => *dt,
            EventTime::DateTimeZoned { datetime, .. } => *datetime,
        }
    }

    /// Equal instant and equal timezone identifier.
    pub fn same_as(&self, other: &EventTime) -> bool {
        if self.is_date() != other.is_date() || self.tzid() != other.tzid() {
            return false;
        }
        match (self.to_utc(), other.to_utc()) {
            (Some(a), Some(b)) => a == b,
            _ => self.naive_local() == other.naive_local(),
        }
    }

    /// The value as it appears after the colon of an iCalendar property.
    pub fn to_ics_string(&self) -> String {
        match self {
            EventTime::Date(d) => d.format("%Y%m%d").to_string(),
            EventTime::DateTimeUtc(dt) => dt.format("%Y%m%dT%H%M%SZ").to_string(),
            EventTime::DateTimeFloating(dt) => dt.format("%Y%m%dT%H%M%S").to_string(),
            EventTime::DateTimeZoned { datetime, .. } => {
                datetime.format("%Y%m%dT%H%M%S").to_string()
            }
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::DateTimeUtc(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M UTC")),
            EventTime::DateTimeFloating(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
            EventTime::DateTimeZoned { datetime, tzid } => {
                write!(f, "{} {}", datetime.format("%Y-%m-%d %H:%M"), tzid)
            }
        }
    }
}

/// CLASS property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Public,
    Private,
    Confidential,
}

impl Classification {
    pub fn as_ics_str(self) -> &'static str {
        match self {
            Classification::Public => "PUBLIC",
            Classification::Private => "PRIVATE",
            Classification::Confidential => "CONFIDENTIAL",
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PUBLIC" => Some(Classification::Public),
            "PRIVATE" => Some(Classification::Private),
            "CONFIDENTIAL" => Some(Classification::Confidential),
            _ => None,
        }
    }
}

/// Object transparency (busy/free status)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transparency {
    /// Blocks time on the calendar
    Opaque,
    /// Does not block time (shows as free)
    Transparent,
}

/// STATUS property, covering both VEVENT and VTODO values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Tentative,
    Confirmed,
    Cancelled,
    NeedsAction,
    InProcess,
    Completed,
}

impl Status {
    pub fn as_ics_str(self) -> &'static str {
        match self {
            Status::Tentative => "TENTATIVE",
            Status::Confirmed => "CONFIRMED",
            Status::Cancelled => "CANCELLED",
            Status::NeedsAction => "NEEDS-ACTION",
            Status::InProcess => "IN-PROCESS",
            Status::Completed => "COMPLETED",
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TENTATIVE" => Some(Status::Tentative),
            "CONFIRMED" => Some(Status::Confirmed),
            "CANCELLED" => Some(Status::Cancelled),
            "NEEDS-ACTION" => Some(Status::NeedsAction),
            "IN-PROCESS" => Some(Status::InProcess),
            "COMPLETED" => Some(Status::Completed),
            _ => None,
        }
    }
}

/// An attendee (also used for the organizer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    /// Email address, without any `mailto:` prefix
    pub email: String,
    /// Display name (CN)
    pub name: Option<String>,
    pub role: Option<Role>,
    /// Calendar user type (CUTYPE)
    pub cutype: Option<CalendarUserType>,
    pub response_status: Option<ParticipationStatus>,
    /// When the attendee responded
    pub status_time: Option<DateTime<Utc>>,
}

impl Attendee {
    pub fn new(email: impl Into<String>) -> Self {
        Attendee {
            email: strip_mailto(&email.into()).to_string(),
            name: None,
            role: None,
            cutype: None,
            response_status: None,
            status_time: None,
        }
    }
}

/// Remove a leading `mailto:` (any case) from a calendar address.
pub fn strip_mailto(address: &str) -> &str {
    match address.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mailto:") => &address[7..],
        _ => address,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipationStatus {
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
    Delegated,
}

impl ParticipationStatus {
    pub fn as_ics_str(self) -> &'static str {
        match self {
            ParticipationStatus::NeedsAction => "NEEDS-ACTION",
            ParticipationStatus::Accepted => "ACCEPTED",
            ParticipationStatus::Declined => "DECLINED",
            ParticipationStatus::Tentative => "TENTATIVE",
            ParticipationStatus::Delegated => "DELEGATED",
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NEEDS-ACTION" => Some(ParticipationStatus::NeedsAction),
            "ACCEPTED" => Some(ParticipationStatus::Accepted),
            "DECLINED" => Some(ParticipationStatus::Declined),
            "TENTATIVE" => Some(ParticipationStatus::Tentative),
            "DELEGATED" => Some(ParticipationStatus::Delegated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Chair,
    ReqParticipant,
    OptParticipant,
    NonParticipant,
}

impl Role {
    pub fn as_ics_str(self) -> &'static str {
        match self {
            Role::Chair => "CHAIR",
            Role::ReqParticipant => "REQ-PARTICIPANT",
            Role::OptParticipant => "OPT-PARTICIPANT",
            Role::NonParticipant => "NON-PARTICIPANT",
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CHAIR" => Some(Role::Chair),
            "REQ-PARTICIPANT" => Some(Role::ReqParticipant),
            "OPT-PARTICIPANT" => Some(Role::OptParticipant),
            "NON-PARTICIPANT" => Some(Role::NonParticipant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalendarUserType {
    Individual,
    Group,
    Resource,
    Room,
    Unknown,
}

impl CalendarUserType {
    pub fn as_ics_str(self) -> &'static str {
        match self {
            CalendarUserType::Individual => "INDIVIDUAL",
            CalendarUserType::Group => "GROUP",
            CalendarUserType::Resource => "RESOURCE",
            CalendarUserType::Room => "ROOM",
            CalendarUserType::Unknown => "UNKNOWN",
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INDIVIDUAL" => Some(CalendarUserType::Individual),
            "GROUP" => Some(CalendarUserType::Group),
            "RESOURCE" => Some(CalendarUserType::Resource),
            "ROOM" => Some(CalendarUserType::Room),
            "UNKNOWN" => Some(CalendarUserType::Unknown),
            _ => None,
        }
    }
}

/// A VALARM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub trigger: AlarmTrigger,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlarmTrigger {
    /// Offset from start or end; negative minutes fire before
    Relative {
        minutes: i64,
        related: TriggerRelation,
    },
    Absolute(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerRelation {
    Start,
    End,
}

/// An ATTACH property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub value: AttachmentValue,
    /// FMTTYPE parameter
    pub fmttype: Option<String>,
    /// File name (X-FILENAME parameter)
    pub filename: Option<String>,
    /// Provider attachment id, used to correlate old and new attachment sets
    pub attachment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttachmentValue {
    Uri(String),
    /// Inline content (ENCODING=BASE64;VALUE=BINARY)
    Binary(Vec<u8>),
}

//! Windows <-> IANA timezone names.
//!
//! The remote service labels times with Windows zone names ("W. Europe
//! Standard Time"); calendar objects carry IANA ids ("Europe/Berlin").

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono_tz::Tz;

/// Timezone name equivalence and lookup.
pub trait TimezoneResolver: Send + Sync {
    /// IANA id for a remote zone name. IANA ids are returned unchanged.
    fn to_iana(&self, vendor_name: &str) -> Option<String>;

    /// Windows zone name for an IANA id.
    fn to_vendor(&self, iana_id: &str) -> Option<String>;

    fn lookup(&self, iana_id: &str) -> Option<Tz>;
}

/// Windows zone name and its canonical IANA id (CLDR "001" territory).
const WINDOWS_ZONES: &[(&str, &str)] = &[
    ("Dateline Standard Time", "Etc/GMT+12"),
    ("UTC-11", "Etc/GMT+11"),
    ("Hawaiian Standard Time", "Pacific/Honolulu"),
    ("Alaskan Standard Time", "America/Anchorage"),
    ("Pacific Standard Time (Mexico)", "America/Tijuana"),
    ("Pacific Standard Time", "America/Los_Angeles"),
    ("US Mountain Standard Time", "America/Phoenix"),
    ("Mountain Standard Time (Mexico)", "America/Mazatlan"),
    ("Mountain Standard Time", "America/Denver"),
    ("Central America Standard Time", "America/Guatemala"),
    ("Central Standard Time", "America/Chicago"),
    ("Central Standard Time (Mexico)", "America/Mexico_City"),
    ("Canada Central Standard Time", "America/Regina"),
    ("SA Pacific Standard Time", "America/Bogota"),
    ("Eastern Standard Time", "America/New_York"),
    ("Eastern Standard Time (Mexico)", "America/Cancun"),
    ("US Eastern Standard Time", "America/Indiana/Indianapolis"),
    ("Venezuela Standard Time", "America/Caracas"),
    ("Atlantic Standard Time", "America/Halifax"),
    ("SA Western Standard Time", "America/La_Paz"),
    ("Pacific SA Standard Time", "America/Santiago"),
    ("Newfoundland Standard Time", "America/St_Johns"),
    ("E. South America Standard Time", "America/Sao_Paulo"),
    ("Argentina Standard Time", "America/Argentina/Buenos_Aires"),
    ("SA Eastern Standard Time", "America/Cayenne"),
    ("Greenland Standard Time", "America/Nuuk"),
    ("UTC-02", "Etc/GMT+2"),
    ("Azores Standard Time", "Atlantic/Azores"),
    ("Cape Verde Standard Time", "Atlantic/Cape_Verde"),
    ("UTC", "Etc/UTC"),
    ("GMT Standard Time", "Europe/London"),
    ("Greenwich Standard Time", "Atlantic/Reykjavik"),
    ("W. Europe Standard Time", "Europe/Berlin"),
    ("Central Europe Standard Time", "Europe/Budapest"),
    ("Romance Standard Time", "Europe/Paris"),
    ("Central European Standard Time", "Europe/Warsaw"),
    ("W. Central Africa Standard Time", "Africa/Lagos"),
    ("GTB Standard Time", "Europe/Bucharest"),
    ("Middle East Standard Time", "Asia/Beirut"),
    ("Egypt Standard Time", "Africa/Cairo"),
    ("E. Europe Standard Time", "Europe/Chisinau"),
    ("South Africa Standard Time", "Africa/Johannesburg"),
    ("FLE Standard Time", "Europe/Kyiv"),
    ("Israel Standard Time", "Asia/Jerusalem"),
    ("Arabic Standard Time", "Asia/Baghdad"),
    ("Turkey Standard Time", "Europe/Istanbul"),
    ("Arab Standard Time", "Asia/Riyadh"),
    ("Russian Standard Time", "Europe/Moscow"),
    ("E. Africa Standard Time", "Africa/Nairobi"),
    ("Iran Standard Time", "Asia/Tehran"),
    ("Arabian Standard Time", "Asia/Dubai"),
    ("Afghanistan Standard Time", "Asia/Kabul"),
    ("Pakistan Standard Time", "Asia/Karachi"),
    ("India Standard Time", "Asia/Kolkata"),
    ("Nepal Standard Time", "Asia/Kathmandu"),
    ("Bangladesh Standard Time", "Asia/Dhaka"),
    ("Myanmar Standard Time", "Asia/Yangon"),
    ("SE Asia Standard Time", "Asia/Bangkok"),
    ("China Standard Time", "Asia/Shanghai"),
    ("Singapore Standard Time", "Asia/Singapore"),
    ("W. Australia Standard Time", "Australia/Perth"),
    ("Taipei Standard Time", "Asia/Taipei"),
    ("Tokyo Standard Time", "Asia/Tokyo"),
    ("Korea Standard Time", "Asia/Seoul"),
    ("Cen. Australia Standard Time", "Australia/Adelaide"),
    ("AUS Central Standard Time", "Australia/Darwin"),
    ("E. Australia Standard Time", "Australia/Brisbane"),
    ("AUS Eastern Standard Time", "Australia/Sydney"),
    ("West Pacific Standard Time", "Pacific/Port_Moresby"),
    ("Tasmania Standard Time", "Australia/Hobart"),
    ("New Zealand Standard Time", "Pacific/Auckland"),
    ("Fiji Standard Time", "Pacific/Fiji"),
    ("Tonga Standard Time", "Pacific/Tongatapu"),
];

/// Further IANA ids that map onto an existing Windows zone.
const IANA_ALIASES: &[(&str, &str)] = &[
    ("UTC", "UTC"),
    ("Etc/GMT", "UTC"),
    ("Europe/Amsterdam", "W. Europe Standard Time"),
    ("Europe/Rome", "W. Europe Standard Time"),
    ("Europe/Vienna", "W. Europe Standard Time"),
    ("Europe/Zurich", "W. Europe Standard Time"),
    ("Europe/Stockholm", "W. Europe Standard Time"),
    ("Europe/Oslo", "W. Europe Standard Time"),
    ("Europe/Prague", "Central Europe Standard Time"),
    ("Europe/Belgrade", "Central Europe Standard Time"),
    ("Europe/Brussels", "Romance Standard Time"),
    ("Europe/Madrid", "Romance Standard Time"),
    ("Europe/Copenhagen", "Romance Standard Time"),
    ("Europe/Dublin", "GMT Standard Time"),
    ("Europe/Lisbon", "GMT Standard Time"),
    ("Europe/Helsinki", "FLE Standard Time"),
    ("Europe/Kiev", "FLE Standard Time"),
    ("Europe/Athens", "GTB Standard Time"),
    ("Asia/Calcutta", "India Standard Time"),
    ("Asia/Katmandu", "Nepal Standard Time"),
    ("Asia/Rangoon", "Myanmar Standard Time"),
    ("Asia/Hong_Kong", "China Standard Time"),
    ("America/Godthab", "Greenland Standard Time"),
    ("America/Indianapolis", "US Eastern Standard Time"),
    ("America/Toronto", "Eastern Standard Time"),
    ("America/Vancouver", "Pacific Standard Time"),
    ("America/Buenos_Aires", "Argentina Standard Time"),
    ("Australia/Melbourne", "AUS Eastern Standard Time"),
];

struct ZoneTable {
    windows_to_iana: HashMap<&'static str, &'static str>,
    iana_to_windows: HashMap<&'static str, &'static str>,
}

static ZONE_TABLE: LazyLock<ZoneTable> = LazyLock::new(|| {
    let mut windows_to_iana = HashMap::new();
    let mut iana_to_windows = HashMap::new();
    for (windows, iana) in WINDOWS_ZONES {
        windows_to_iana.insert(*windows, *iana);
        iana_to_windows.entry(*iana).or_insert(*windows);
    }
    for (iana, windows) in IANA_ALIASES {
        iana_to_windows.entry(*iana).or_insert(*windows);
    }
    ZoneTable {
        windows_to_iana,
        iana_to_windows,
    }
});

/// Resolver backed by the built-in Windows zone table and `chrono-tz`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsZones;

impl TimezoneResolver for WindowsZones {
    fn to_iana(&self, vendor_name: &str) -> Option<String> {
        let name = vendor_name.trim();
        if let Some(iana) = ZONE_TABLE.windows_to_iana.get(name) {
            return Some(iana.to_string());
        }
        self.lookup(name).map(|_| name.to_string())
    }

    fn to_vendor(&self, iana_id: &str) -> Option<String> {
        ZONE_TABLE
            .iana_to_windows
            .get(iana_id.trim())
            .map(|w| w.to_string())
    }

    fn lookup(&self, iana_id: &str) -> Option<Tz> {
        iana_id.trim().parse().ok()
    }
}

/// Whether an IANA id or remote zone name denotes UTC.
pub fn is_utc_name(name: &str) -> bool {
    matches!(
        name.trim(),
        "" | "UTC" | "Etc/UTC" | "Etc/GMT" | "GMT" | "Z" | "tzone://Microsoft/Utc"
    )
}

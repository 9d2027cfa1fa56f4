//! ExceptionInfo and ExtendedException records.

use super::BlobError;
use super::reader::ByteReader;

/// Override flags of an ExceptionInfo record.
pub mod flags {
    pub const SUBJECT: u16 = 0x0001;
    pub const MEETING_TYPE: u16 = 0x0002;
    pub const REMINDER_DELTA: u16 = 0x0004;
    pub const REMINDER: u16 = 0x0008;
    pub const LOCATION: u16 = 0x0010;
    pub const BUSY_STATUS: u16 = 0x0020;
    pub const ATTACHMENT: u16 = 0x0040;
    pub const SUBTYPE: u16 = 0x0080;
    pub const APPT_COLOR: u16 = 0x0100;
}

/// Writer version from which ExtendedException records carry a change highlight.
const CHANGE_HIGHLIGHT_VERSION: u32 = 0x3009;

/// One modified occurrence. Times are local minutes since 1601.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub start: u32,
    pub end: u32,
    pub original_start: u32,
    pub override_flags: u16,
    pub subject: Option<String>,
    pub meeting_type: Option<u32>,
    pub reminder_delta: Option<u32>,
    pub reminder_set: Option<u32>,
    pub location: Option<String>,
    pub busy_status: Option<u32>,
    pub attachment: Option<u32>,
    pub subtype: Option<u32>,
    pub appointment_color: Option<u32>,
}

impl ExceptionInfo {
    pub fn has(&self, flag: u16) -> bool {
        self.override_flags & flag != 0
    }

    pub(crate) fn read(reader: &mut ByteReader) -> Result<Self, BlobError> {
        let mut info = ExceptionInfo {
            start: reader.read_u32()?,
            end: reader.read_u32()?,
            original_start: reader.read_u32()?,
            override_flags: reader.read_u16()?,
            ..Default::default()
        };

        if info.has(flags::SUBJECT) {
            info.subject = Some(reader.read_narrow_string()?);
        }
        if info.has(flags::MEETING_TYPE) {
            info.meeting_type = Some(reader.read_u32()?);
        }
        if info.has(flags::REMINDER_DELTA) {
            info.reminder_delta = Some(reader.read_u32()?);
        }
        if info.has(flags::REMINDER) {
            info.reminder_set = Some(reader.read_u32()?);
        }
        if info.has(flags::LOCATION) {
            info.location = Some(reader.read_narrow_string()?);
        }
        if info.has(flags::BUSY_STATUS) {
            info.busy_status = Some(reader.read_u32()?);
        }
        if info.has(flags::ATTACHMENT) {
            info.attachment = Some(reader.read_u32()?);
        }
        if info.has(flags::SUBTYPE) {
            info.subtype = Some(reader.read_u32()?);
        }
        if info.has(flags::APPT_COLOR) {
            info.appointment_color = Some(reader.read_u32()?);
        }

        Ok(info)
    }
}

/// Wide-character overrides paired with the ExceptionInfo at the same index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedException {
    pub start: Option<u32>,
    pub end: Option<u32>,
    pub original_start: Option<u32>,
    pub subject: Option<String>,
    pub location: Option<String>,
}

impl ExtendedException {
    /// Read the record for `info`; which fields exist depends on its flags.
    pub(crate) fn read(
        reader: &mut ByteReader,
        writer_version: u32,
        info: &ExceptionInfo,
    ) -> Result<Self, BlobError> {
        if writer_version >= CHANGE_HIGHLIGHT_VERSION {
            reader.read_block()?;
        }
        reader.read_block()?;

        let mut extended = ExtendedException::default();
        if info.has(flags::SUBJECT) || info.has(flags::LOCATION) {
            extended.start = Some(reader.read_u32()?);
            extended.end = Some(reader.read_u32()?);
            extended.original_start = Some(reader.read_u32()?);
            if info.has(flags::SUBJECT) {
                extended.subject = Some(reader.read_wide_string()?);
            }
            if info.has(flags::LOCATION) {
                extended.location = Some(reader.read_wide_string()?);
            }
            reader.read_block()?;
        }
        Ok(extended)
    }
}

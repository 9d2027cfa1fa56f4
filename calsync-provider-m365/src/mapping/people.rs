//! Organizer and attendees.

use calsync_core::{
    Attendee, CalendarObject, CalendarUserType, ParticipationStatus, Role, strip_mailto,
};

use super::same_set;
use crate::convert::date::{format_graph_datetime, parse_utc_timestamp};
use crate::json::{JsonBuilder, RemoteResource};

fn read_email_address(resource: &RemoteResource) -> Option<Attendee> {
    let address = resource.string_at(&["emailAddress", "address"])?.trim();
    if address.is_empty() {
        return None;
    }
    let mut attendee = Attendee::new(address);
    attendee.name = resource
        .string_at(&["emailAddress", "name"])
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    Some(attendee)
}

fn write_email_address(builder: &mut JsonBuilder, attendee: &Attendee) {
    builder.begin_object_member("emailAddress");
    builder.add_member("address", strip_mailto(&attendee.email));
    if let Some(name) = &attendee.name {
        builder.add_member("name", name.as_str());
    }
    builder.end_object_member();
}

/// Organizer only counts when the object has attendees.
pub(super) fn read_organizer(resource: &RemoteResource, obj: &mut CalendarObject) {
    if resource.array_member("attendees").is_empty() {
        return;
    }
    obj.organizer = resource
        .object_member("organizer")
        .and_then(|o| read_email_address(&o));
}

fn organizer_key(attendee: &Attendee) -> (String, String) {
    (
        attendee.name.clone().unwrap_or_default(),
        strip_mailto(&attendee.email).to_ascii_lowercase(),
    )
}

pub(super) fn write_organizer(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
) {
    let Some(organizer) = &new.organizer else {
        return;
    };
    if new.attendees.is_empty() {
        return;
    }
    let old_key = old.and_then(|o| o.organizer.as_ref()).map(organizer_key);
    if old_key == Some(organizer_key(organizer)) {
        return;
    }
    builder.begin_object_member("organizer");
    write_email_address(builder, organizer);
    builder.end_object_member();
}

fn response_from_remote(value: &str) -> Option<ParticipationStatus> {
    match value {
        "accepted" | "organizer" => Some(ParticipationStatus::Accepted),
        "declined" => Some(ParticipationStatus::Declined),
        "tentativelyAccepted" => Some(ParticipationStatus::Tentative),
        "notResponded" => Some(ParticipationStatus::NeedsAction),
        _ => None,
    }
}

fn response_to_remote(status: ParticipationStatus) -> &'static str {
    match status {
        ParticipationStatus::Accepted => "accepted",
        ParticipationStatus::Declined => "declined",
        ParticipationStatus::Tentative => "tentativelyAccepted",
        ParticipationStatus::NeedsAction => "notResponded",
        ParticipationStatus::Delegated => "none",
    }
}

fn attendee_type(attendee: &Attendee) -> &'static str {
    match (attendee.cutype, attendee.role) {
        (Some(CalendarUserType::Resource | CalendarUserType::Room), _) => "resource",
        (_, Some(Role::OptParticipant)) => "optional",
        _ => "required",
    }
}

pub(super) fn read_attendees(resource: &RemoteResource, obj: &mut CalendarObject) {
    obj.attendees = resource
        .array_member("attendees")
        .iter()
        .filter_map(|entry| {
            let mut attendee = read_email_address(entry)?;
            match entry.string_member("type") {
                Some("resource") => {
                    attendee.cutype = Some(CalendarUserType::Resource);
                    attendee.role = Some(Role::ReqParticipant);
                }
                Some("optional") => attendee.role = Some(Role::OptParticipant),
                _ => attendee.role = Some(Role::ReqParticipant),
            }
            if let Some(status) = entry.object_member("status") {
                attendee.response_status = status.string_member("response").and_then(response_from_remote);
                // Unanswered invitations carry 0001-01-01
                attendee.status_time = status
                    .string_member("time")
                    .and_then(parse_utc_timestamp)
                    .filter(|t| t.timestamp() > 0);
            }
            Some(attendee)
        })
        .collect();
}

type AttendeeKey = (
    String,
    Option<String>,
    Option<&'static str>,
    &'static str,
    Option<&'static str>,
);

fn attendee_key(attendee: &Attendee) -> AttendeeKey {
    (
        strip_mailto(&attendee.email).to_ascii_lowercase(),
        attendee.name.clone(),
        attendee.response_status.map(|s| s.as_ics_str()),
        attendee_type(attendee),
        attendee.role.map(|r| r.as_ics_str()),
    )
}

pub(super) fn write_attendees(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
) {
    let new_keys: Vec<AttendeeKey> = new.attendees.iter().map(attendee_key).collect();
    let old_keys: Vec<AttendeeKey> = old
        .map(|o| o.attendees.iter().map(attendee_key).collect())
        .unwrap_or_default();
    if same_set(&new_keys, &old_keys) {
        return;
    }

    builder.begin_array_member("attendees");
    for attendee in &new.attendees {
        builder.begin_object();
        builder.add_member("type", attendee_type(attendee));
        write_email_address(builder, attendee);
        if let Some(status) = attendee.response_status {
            builder
                .begin_object_member("status")
                .add_member("response", response_to_remote(status));
            if let Some(time) = &attendee.status_time {
                builder.add_member("time", format!("{}Z", format_graph_datetime(&time.naive_utc())));
            }
            builder.end_object_member();
        }
        builder.end_object();
    }
    builder.end_array_member();
}

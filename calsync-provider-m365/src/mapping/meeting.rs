//! Online meeting flag and join URL.

use calsync_core::CalendarObject;

use crate::json::{JsonBuilder, RemoteResource};

const MEETING_PROVIDER: &str = "teamsForBusiness";

pub(super) fn read_online_meeting(resource: &RemoteResource, obj: &mut CalendarObject) {
    obj.online_meeting = resource.bool_member("isOnlineMeeting").unwrap_or(false);
    obj.conference_url = resource
        .object_member("onlineMeeting")
        .and_then(|m| m.non_empty_string_member("joinUrl"))
        .or_else(|| resource.non_empty_string_member("onlineMeetingUrl"))
        .map(str::to_string);
}

/// Only a new item can request a meeting; it cannot be changed afterwards.
pub(super) fn write_online_meeting(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
) {
    if old.is_none() && new.online_meeting {
        builder
            .add_member("isOnlineMeeting", true)
            .add_member("onlineMeetingProvider", MEETING_PROVIDER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calsync_core::ObjectKind;
    use serde_json::json;

    #[test]
    fn test_meeting_requested_only_on_create() {
        let mut obj = CalendarObject::new(ObjectKind::Event, "uid-1");
        obj.online_meeting = true;

        let mut builder = JsonBuilder::new();
        write_online_meeting(&mut builder, &obj, None);
        assert_eq!(
            builder.finish(),
            json!({"isOnlineMeeting": true, "onlineMeetingProvider": "teamsForBusiness"})
        );

        let old = CalendarObject::new(ObjectKind::Event, "uid-1");
        let mut builder = JsonBuilder::new();
        write_online_meeting(&mut builder, &obj, Some(&old));
        assert!(builder.is_empty());
    }

    #[test]
    fn test_read_join_url() {
        let value = json!({
            "isOnlineMeeting": true,
            "onlineMeeting": {"joinUrl": "https://teams.example.com/l/meetup-join/1"}
        });
        let mut obj = CalendarObject::new(ObjectKind::Event, "uid-1");
        read_online_meeting(&RemoteResource::new(&value), &mut obj);
        assert!(obj.online_meeting);
        assert_eq!(
            obj.conference_url.as_deref(),
            Some("https://teams.example.com/l/meetup-join/1")
        );
    }
}

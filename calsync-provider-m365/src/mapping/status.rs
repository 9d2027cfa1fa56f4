//! Enumerated properties: sensitivity, show-as, importance and status.

use calsync_core::{CalendarObject, Classification, Status, Transparency};

use crate::json::{JsonBuilder, RemoteResource};

fn sensitivity_to_class(value: &str) -> Option<Classification> {
    match value {
        "normal" => Some(Classification::Public),
        "personal" | "private" => Some(Classification::Private),
        "confidential" => Some(Classification::Confidential),
        _ => None,
    }
}

fn class_to_sensitivity(class: Classification) -> &'static str {
    match class {
        Classification::Public => "normal",
        Classification::Private => "private",
        Classification::Confidential => "confidential",
    }
}

/// The value to write for an enumerated member, if any.
///
/// `old` is `None` on create. On update a value that was mapped before and
/// is now absent resets the member to `cleared`.
fn member_change(
    new: Option<&'static str>,
    old: Option<Option<&'static str>>,
    cleared: &'static str,
) -> Option<&'static str> {
    let Some(old) = old else {
        return new;
    };
    let target = new.or(old.map(|_| cleared))?;
    (old != Some(target)).then_some(target)
}

pub(super) fn read_sensitivity(resource: &RemoteResource, obj: &mut CalendarObject) {
    obj.classification = resource
        .string_member("sensitivity")
        .and_then(sensitivity_to_class);
}

pub(super) fn write_sensitivity(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
) {
    let value = member_change(
        new.classification.map(class_to_sensitivity),
        old.map(|o| o.classification.map(class_to_sensitivity)),
        "normal",
    );
    if let Some(value) = value {
        builder.add_member("sensitivity", value);
    }
}

pub(super) fn read_show_as(resource: &RemoteResource, obj: &mut CalendarObject) {
    // tentative, oof, workingElsewhere and unknown have no iCalendar equivalent
    obj.transparency = match resource.string_member("showAs") {
        Some("free") => Some(Transparency::Transparent),
        Some("busy") => Some(Transparency::Opaque),
        _ => None,
    };
}

fn transparency_to_show_as(transparency: Transparency) -> &'static str {
    match transparency {
        Transparency::Transparent => "free",
        Transparency::Opaque => "busy",
    }
}

pub(super) fn write_show_as(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
) {
    let value = member_change(
        new.transparency.map(transparency_to_show_as),
        old.map(|o| o.transparency.map(transparency_to_show_as)),
        "busy",
    );
    if let Some(value) = value {
        builder.add_member("showAs", value);
    }
}

fn importance_to_priority(value: &str) -> Option<u8> {
    match value {
        "high" => Some(3),
        "normal" => Some(5),
        "low" => Some(7),
        _ => None,
    }
}

/// Priority 1-4 is high, 5 normal, 6-9 low; 0 and anything else is unmapped.
pub(crate) fn priority_to_importance(priority: u8) -> Option<&'static str> {
    match priority {
        1..=4 => Some("high"),
        5 => Some("normal"),
        6..=9 => Some("low"),
        _ => None,
    }
}

pub(super) fn read_importance(resource: &RemoteResource, obj: &mut CalendarObject) {
    obj.priority = resource
        .string_member("importance")
        .and_then(importance_to_priority);
}

pub(super) fn write_importance(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
) {
    let value = member_change(
        new.priority.and_then(priority_to_importance),
        old.map(|o| o.priority.and_then(priority_to_importance)),
        "normal",
    );
    if let Some(value) = value {
        builder.add_member("importance", value);
    }
}

pub(super) fn read_cancelled(resource: &RemoteResource, obj: &mut CalendarObject) {
    if resource.bool_member("isCancelled") == Some(true) {
        obj.status = Some(Status::Cancelled);
    }
}

fn task_status_from_remote(value: &str) -> Option<Status> {
    match value {
        "notStarted" | "waitingOnOthers" => Some(Status::NeedsAction),
        "inProgress" => Some(Status::InProcess),
        "completed" => Some(Status::Completed),
        "deferred" => Some(Status::Cancelled),
        _ => None,
    }
}

fn task_status_to_remote(status: Status) -> Option<&'static str> {
    match status {
        Status::NeedsAction => Some("notStarted"),
        Status::InProcess => Some("inProgress"),
        Status::Completed => Some("completed"),
        Status::Cancelled => Some("deferred"),
        Status::Tentative | Status::Confirmed => None,
    }
}

pub(super) fn read_task_status(resource: &RemoteResource, obj: &mut CalendarObject) {
    obj.status = resource
        .string_member("status")
        .and_then(task_status_from_remote);
}

pub(super) fn write_task_status(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
) {
    let value = member_change(
        new.status.and_then(task_status_to_remote),
        old.map(|o| o.status.and_then(task_status_to_remote)),
        "notStarted",
    );
    if let Some(value) = value {
        builder.add_member("status", value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calsync_core::ObjectKind;
    use serde_json::{Value, json};

    fn event_with_priority(priority: Option<u8>) -> CalendarObject {
        let mut obj = CalendarObject::new(ObjectKind::Event, "uid-1");
        obj.priority = priority;
        obj
    }

    fn importance_doc(new: &CalendarObject, old: Option<&CalendarObject>) -> Value {
        let mut builder = JsonBuilder::new();
        write_importance(&mut builder, new, old);
        builder.finish()
    }

    #[test]
    fn test_importance_partitions_priorities() {
        let high: Vec<u8> = (0..=10).filter(|p| priority_to_importance(*p) == Some("high")).collect();
        let normal: Vec<u8> = (0..=10).filter(|p| priority_to_importance(*p) == Some("normal")).collect();
        let low: Vec<u8> = (0..=10).filter(|p| priority_to_importance(*p) == Some("low")).collect();
        assert_eq!(high, vec![1, 2, 3, 4]);
        assert_eq!(normal, vec![5]);
        assert_eq!(low, vec![6, 7, 8, 9]);
        assert_eq!(priority_to_importance(0), None);
    }

    #[test]
    fn test_priority_three_reads_back_as_high() {
        let doc = importance_doc(&event_with_priority(Some(3)), None);
        assert_eq!(doc, json!({"importance": "high"}));

        let mut obj = CalendarObject::new(ObjectKind::Event, "uid-1");
        read_importance(&RemoteResource::new(&doc), &mut obj);
        assert_eq!(obj.priority.and_then(priority_to_importance), Some("high"));
    }

    #[test]
    fn test_low_over_normal_is_written() {
        let doc = importance_doc(&event_with_priority(Some(8)), Some(&event_with_priority(Some(5))));
        assert_eq!(doc, json!({"importance": "low"}));
    }

    #[test]
    fn test_same_bucket_is_unchanged() {
        let doc = importance_doc(&event_with_priority(Some(1)), Some(&event_with_priority(Some(4))));
        assert_eq!(doc, json!({}));
    }

    #[test]
    fn test_sensitivity_mapping() {
        for (remote, class) in [
            ("normal", Classification::Public),
            ("personal", Classification::Private),
            ("private", Classification::Private),
            ("confidential", Classification::Confidential),
        ] {
            let value = json!({"sensitivity": remote});
            let mut obj = CalendarObject::new(ObjectKind::Event, "uid-1");
            read_sensitivity(&RemoteResource::new(&value), &mut obj);
            assert_eq!(obj.classification, Some(class), "{}", remote);
        }

        let mut obj = CalendarObject::new(ObjectKind::Event, "uid-1");
        obj.classification = Some(Classification::Private);
        let mut builder = JsonBuilder::new();
        write_sensitivity(&mut builder, &obj, None);
        write_sensitivity(&mut builder, &obj, Some(&obj));
        assert_eq!(builder.finish(), json!({"sensitivity": "private"}));
    }

    #[test]
    fn test_show_as_drops_unmapped_values() {
        for (remote, expected) in [
            ("free", Some(Transparency::Transparent)),
            ("busy", Some(Transparency::Opaque)),
            ("tentative", None),
            ("oof", None),
            ("workingElsewhere", None),
        ] {
            let value = json!({"showAs": remote});
            let mut obj = CalendarObject::new(ObjectKind::Event, "uid-1");
            read_show_as(&RemoteResource::new(&value), &mut obj);
            assert_eq!(obj.transparency, expected, "{}", remote);
        }
    }

    #[test]
    fn test_task_status_round_trip() {
        for status in [Status::NeedsAction, Status::InProcess, Status::Completed, Status::Cancelled] {
            let mut obj = CalendarObject::new(ObjectKind::Task, "uid-1");
            obj.status = Some(status);
            let mut builder = JsonBuilder::new();
            write_task_status(&mut builder, &obj, None);
            let doc = builder.finish();

            let mut read = CalendarObject::new(ObjectKind::Task, "uid-1");
            read_task_status(&RemoteResource::new(&doc), &mut read);
            assert_eq!(read.status, Some(status));

            let mut builder = JsonBuilder::new();
            write_task_status(&mut builder, &obj, Some(&read));
            assert!(builder.is_empty(), "{:?} rewritten", status);
        }

        let value = json!({"status": "waitingOnOthers"});
        let mut obj = CalendarObject::new(ObjectKind::Task, "uid-1");
        read_task_status(&RemoteResource::new(&value), &mut obj);
        assert_eq!(obj.status, Some(Status::NeedsAction));
    }

    #[test]
    fn test_cleared_importance_resets_to_normal() {
        let doc = importance_doc(&event_with_priority(None), Some(&event_with_priority(Some(1))));
        assert_eq!(doc, json!({"importance": "normal"}));

        // already normal on the server
        let doc = importance_doc(&event_with_priority(None), Some(&event_with_priority(Some(5))));
        assert_eq!(doc, json!({}));

        let doc = importance_doc(&event_with_priority(None), None);
        assert_eq!(doc, json!({}));
    }

    #[test]
    fn test_cleared_sensitivity_resets_to_normal() {
        let new = CalendarObject::new(ObjectKind::Event, "uid-1");
        let mut old = new.clone();
        old.classification = Some(Classification::Confidential);

        let mut builder = JsonBuilder::new();
        write_sensitivity(&mut builder, &new, Some(&old));
        assert_eq!(builder.finish(), json!({"sensitivity": "normal"}));

        let mut builder = JsonBuilder::new();
        write_sensitivity(&mut builder, &new, None);
        assert!(builder.is_empty());
    }

    #[test]
    fn test_cleared_show_as_resets_to_busy() {
        let new = CalendarObject::new(ObjectKind::Event, "uid-1");
        let mut old = new.clone();
        old.transparency = Some(Transparency::Transparent);

        let mut builder = JsonBuilder::new();
        write_show_as(&mut builder, &new, Some(&old));
        assert_eq!(builder.finish(), json!({"showAs": "busy"}));

        old.transparency = Some(Transparency::Opaque);
        let mut builder = JsonBuilder::new();
        write_show_as(&mut builder, &new, Some(&old));
        assert!(builder.is_empty());
    }

    #[test]
    fn test_cleared_task_status_resets_to_not_started() {
        let new = CalendarObject::new(ObjectKind::Task, "uid-1");
        let mut old = new.clone();
        old.status = Some(Status::Completed);

        let mut builder = JsonBuilder::new();
        write_task_status(&mut builder, &new, Some(&old));
        assert_eq!(builder.finish(), json!({"status": "notStarted"}));
    }
}

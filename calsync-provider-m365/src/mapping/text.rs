//! Subject/title, body, location and categories.

use tracing::warn;

use calsync_core::CalendarObject;

use super::{same_set, text_changed};
use crate::json::{JsonBuilder, RemoteResource};

/// Wrap width for converted HTML bodies; wide enough to keep paragraphs on one line.
const BODY_TEXT_WIDTH: usize = 1024;

pub(super) fn read_summary(resource: &RemoteResource, obj: &mut CalendarObject, member: &str) {
    obj.summary = resource.non_empty_string_member(member).map(str::to_string);
}

pub(super) fn write_summary(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
    member: &str,
) {
    let new_value = new.summary.as_deref();
    if text_changed(new_value, old.and_then(|o| o.summary.as_deref())) {
        builder.add_member(member, new_value.unwrap_or_default());
    }
}

fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), BODY_TEXT_WIDTH) {
        Ok(text) => text.trim_end().to_string(),
        Err(err) => {
            warn!(%err, "Could not convert HTML body, keeping markup");
            html.to_string()
        }
    }
}

pub(super) fn read_body(resource: &RemoteResource, obj: &mut CalendarObject) {
    let Some(body) = resource.object_member("body") else {
        return;
    };
    let content = body.string_member("content").unwrap_or_default();
    let text = match body.string_member("contentType") {
        Some(kind) if kind.eq_ignore_ascii_case("html") => html_to_text(content),
        _ => content.to_string(),
    };
    if !text.trim().is_empty() {
        obj.description = Some(text);
    }
}

pub(super) fn write_body(builder: &mut JsonBuilder, new: &CalendarObject, old: Option<&CalendarObject>) {
    let new_value = new.description.as_deref();
    if text_changed(new_value, old.and_then(|o| o.description.as_deref())) {
        builder
            .begin_object_member("body")
            .add_member("contentType", "text")
            .add_member("content", new_value.unwrap_or_default())
            .end_object_member();
    }
}

pub(super) fn read_location(resource: &RemoteResource, obj: &mut CalendarObject) {
    obj.location = resource
        .object_member("location")
        .and_then(|l| l.non_empty_string_member("displayName"))
        .map(str::to_string);
}

pub(super) fn write_location(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
) {
    let new_value = new.location.as_deref();
    if text_changed(new_value, old.and_then(|o| o.location.as_deref())) {
        builder
            .begin_object_member("location")
            .add_member("displayName", new_value.unwrap_or_default())
            .end_object_member();
    }
}

pub(super) fn read_categories(resource: &RemoteResource, obj: &mut CalendarObject) {
    obj.categories = resource
        .string_array_member("categories")
        .into_iter()
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
}

pub(super) fn write_categories(
    builder: &mut JsonBuilder,
    new: &CalendarObject,
    old: Option<&CalendarObject>,
) {
    let old_categories = old.map_or(&[][..], |o| o.categories.as_slice());
    if same_set(&new.categories, old_categories) {
        return;
    }
    builder.begin_array_member("categories");
    for category in &new.categories {
        builder.add_element(category.as_str());
    }
    builder.end_array_member();
}

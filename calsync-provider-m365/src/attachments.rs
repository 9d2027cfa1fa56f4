//! Attachment synchronization.
//!
//! Attachments are correlated by the remote attachment id carried in the
//! `X-M365-ATTACHMENT-ID` parameter. Writing an object compares its
//! attachments with the previous version and uploads or deletes the
//! difference once the item exists remotely. Reading downloads each file
//! attachment into a per-item cache directory and records it as a
//! `file://` URI.

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderStringWriter;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use calsync_core::{Attachment, AttachmentValue, CalendarObject, ObjectKind};

use crate::collab::{ItemRef, SyncContext};
use crate::error::{MappingError, MappingResult};
use crate::json::{JsonBuilder, RemoteResource};

const FILE_ATTACHMENT_TYPE: &str = "#microsoft.graph.fileAttachment";
const TASK_FILE_ATTACHMENT_TYPE: &str = "#microsoft.graph.taskFileAttachment";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ChangeKind::Create => "+",
            ChangeKind::Delete => "-",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentChange<'a> {
    pub kind: ChangeKind,
    /// The new attachment to upload, or the old one to delete
    pub attachment: &'a Attachment,
}

/// The uploads and deletions that turn the old attachment set into the new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentPlan<'a> {
    pub changes: Vec<AttachmentChange<'a>>,
}

impl<'a> AttachmentPlan<'a> {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn uploads(&self) -> impl Iterator<Item = &'a Attachment> + '_ {
        self.of_kind(ChangeKind::Create)
    }

    pub fn deletions(&self) -> impl Iterator<Item = &'a Attachment> + '_ {
        self.of_kind(ChangeKind::Delete)
    }

    fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &'a Attachment> + '_ {
        self.changes
            .iter()
            .filter(move |c| c.kind == kind)
            .map(|c| c.attachment)
    }
}

/// Diff two attachment sets by remote attachment id.
///
/// New attachments without an id, or whose id the old set lacks, are
/// uploaded. Old ids no new attachment claims are deleted.
pub fn plan<'a>(new: &'a [Attachment], old: &'a [Attachment]) -> AttachmentPlan<'a> {
    let mut remaining: Vec<&Attachment> = old
        .iter()
        .filter(|a| a.attachment_id.is_some())
        .collect();
    let mut changes = Vec::new();

    for attachment in new {
        let matched = attachment.attachment_id.as_deref().and_then(|id| {
            remaining
                .iter()
                .position(|o| o.attachment_id.as_deref() == Some(id))
        });
        match matched {
            Some(index) => {
                remaining.remove(index);
            }
            None => changes.push(AttachmentChange {
                kind: ChangeKind::Create,
                attachment,
            }),
        }
    }

    changes.extend(remaining.into_iter().map(|attachment| AttachmentChange {
        kind: ChangeKind::Delete,
        attachment,
    }));
    AttachmentPlan { changes }
}

/// Whether `new` has attachment work pending; tasks cannot have any.
pub fn check_writable(new: &CalendarObject, old: Option<&CalendarObject>) -> MappingResult<bool> {
    let old_attachments = old.map_or(&[][..], |o| o.attachments.as_slice());
    if plan(&new.attachments, old_attachments).is_empty() {
        return Ok(false);
    }
    if new.kind == ObjectKind::Task {
        return Err(MappingError::NotSupported(
            "attachments cannot be written to tasks".into(),
        ));
    }
    Ok(true)
}

/// Run a plan against the remote item `item_id`.
pub fn execute(ctx: &SyncContext, item_id: &str, plan: &AttachmentPlan) -> MappingResult<()> {
    let item = ctx.item(item_id);
    for change in &plan.changes {
        match change.kind {
            ChangeKind::Create => {
                let document = upload_document(change.attachment)?;
                ctx.cancellable.check()?;
                ctx.transport
                    .add_attachment(&item, &document, ctx.cancellable)?;
            }
            ChangeKind::Delete => {
                let Some(id) = change.attachment.attachment_id.as_deref() else {
                    continue;
                };
                ctx.cancellable.check()?;
                ctx.transport
                    .delete_attachment(&item, id, ctx.cancellable)?;
            }
        }
        debug!(
            kind = %change.kind,
            item = item_id,
            name = change.attachment.filename.as_deref().unwrap_or_default(),
            "Synchronized attachment"
        );
    }
    Ok(())
}

fn local_path(uri: &str) -> MappingResult<PathBuf> {
    let unsupported =
        || MappingError::UnsupportedShape(format!("attachment {} is not a local file", uri));
    let url = Url::parse(uri).map_err(|_| unsupported())?;
    if url.scheme() != "file" {
        return Err(unsupported());
    }
    url.to_file_path().map_err(|_| unsupported())
}

/// Build the upload resource, streaming the content through a base64 encoder.
fn upload_document(attachment: &Attachment) -> MappingResult<Value> {
    let mut encoder = EncoderStringWriter::new(&STANDARD);
    let fallback_name = match &attachment.value {
        AttachmentValue::Binary(bytes) => {
            io::copy(&mut bytes.as_slice(), &mut encoder)?;
            None
        }
        AttachmentValue::Uri(uri) => {
            let path = local_path(uri)?;
            let mut file = File::open(&path)?;
            io::copy(&mut file, &mut encoder)?;
            path.file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
        }
    };
    let content = encoder.into_inner();

    let name = attachment
        .filename
        .clone()
        .or(fallback_name)
        .unwrap_or_else(|| "attachment".to_string());
    let content_type = attachment
        .fmttype
        .as_deref()
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    let mut builder = JsonBuilder::new();
    builder
        .add_member("@odata.type", FILE_ATTACHMENT_TYPE)
        .add_member("name", name)
        .add_member("contentType", content_type)
        .add_member("contentBytes", content);
    Ok(builder.finish())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentResource {
    #[serde(rename = "@odata.type", default)]
    odata_type: Option<String>,
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    content_bytes: Option<String>,
}

impl AttachmentResource {
    fn parse(value: Value) -> MappingResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| MappingError::InvalidRemote(format!("attachment resource: {}", e)))
    }

    fn is_file(&self) -> bool {
        match self.odata_type.as_deref() {
            None => true,
            Some(kind) => kind == FILE_ATTACHMENT_TYPE || kind == TASK_FILE_ATTACHMENT_TYPE,
        }
    }
}

fn digest_name(id: &str) -> String {
    hex::encode(Sha256::digest(id.as_bytes()))
}

/// Cache directory for one item's attachments under `root`.
///
/// The name is the lowercase hex SHA-256 of the item id and nothing else:
/// it never depends on content and no other digest is tried. The same item
/// always lands in the same directory, and ids containing `/` or `=` stay
/// path-safe.
pub fn item_directory(root: &Path, item_id: &str) -> PathBuf {
    root.join(digest_name(item_id))
}

/// Directory holding one downloaded attachment, named by the hex SHA-256 of
/// the attachment id so same-named files of one item never share a path.
pub fn attachment_directory(item_dir: &Path, attachment_id: &str) -> PathBuf {
    item_dir.join(digest_name(attachment_id))
}

/// The final path component of `name`, or a slug of the attachment id.
fn safe_file_name(name: Option<&str>, attachment_id: &str) -> String {
    let from_name = name
        .and_then(|n| Path::new(n).file_name())
        .and_then(|n| n.to_str())
        .map(str::trim)
        .filter(|n| !n.is_empty());
    match from_name {
        Some(name) => name.to_string(),
        None => {
            let slug = slug::slugify(attachment_id);
            if slug.is_empty() {
                "attachment".to_string()
            } else {
                slug
            }
        }
    }
}

fn file_uri(path: &Path) -> MappingResult<String> {
    let absolute = std::path::absolute(path)?;
    Url::from_file_path(&absolute)
        .map(|u| u.to_string())
        .map_err(|_| {
            MappingError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} cannot be expressed as a file URI", absolute.display()),
            ))
        })
}

fn download(
    ctx: &SyncContext,
    item: &ItemRef,
    meta: &AttachmentResource,
    dir: &Path,
) -> MappingResult<Attachment> {
    ctx.cancellable.check()?;
    let full = AttachmentResource::parse(ctx.transport.get_attachment(
        item,
        &meta.id,
        ctx.cancellable,
    )?)?;
    let encoded = full.content_bytes.as_deref().ok_or_else(|| {
        MappingError::InvalidRemote(format!("attachment {} has no content", meta.id))
    })?;
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| MappingError::InvalidRemote(format!("attachment {}: {}", meta.id, e)))?;

    let file_name = safe_file_name(full.name.as_deref().or(meta.name.as_deref()), &meta.id);
    let dir = attachment_directory(dir, &meta.id);
    fs::create_dir_all(&dir)?;
    let path = dir.join(&file_name);
    fs::write(&path, &bytes)?;

    Ok(Attachment {
        value: AttachmentValue::Uri(file_uri(&path)?),
        fmttype: full.content_type.or_else(|| meta.content_type.clone()),
        filename: Some(file_name),
        attachment_id: Some(meta.id.clone()),
    })
}

/// Download the attachments of the item described by `resource`.
pub fn read_attachments(
    resource: &RemoteResource,
    obj: &mut CalendarObject,
    ctx: &SyncContext,
) -> MappingResult<()> {
    if resource.bool_member("hasAttachments") != Some(true) {
        return Ok(());
    }
    let item_id = resource.non_empty_string_member("id").ok_or_else(|| {
        MappingError::InvalidRemote("item with attachments has no id".into())
    })?;

    let item = ctx.item(item_id);
    ctx.cancellable.check()?;
    let listed = ctx.transport.list_attachments(&item, ctx.cancellable)?;
    let dir = item_directory(&ctx.account.attachments_dir, item_id);

    for value in listed {
        let meta = AttachmentResource::parse(value)?;
        if !meta.is_file() {
            warn!(
                id = %meta.id,
                kind = meta.odata_type.as_deref().unwrap_or_default(),
                "Skipping non-file attachment"
            );
            continue;
        }
        obj.attachments.push(download(ctx, &item, &meta, &dir)?);
    }
    Ok(())
}

//! Collaborators the mapping engine calls but does not implement.
//!
//! The HTTP client (with its retry-on-throttle behaviour) lives outside this
//! crate; the engine only sees the synchronous `Transport` contract below.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use calsync_core::config::AccountContext;
use serde_json::Value;

use crate::error::{MappingError, MappingResult};
use crate::timezone::TimezoneResolver;

/// Addresses one item (event or task) on the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    pub group_id: Option<String>,
    pub calendar_id: String,
    pub item_id: String,
}

impl ItemRef {
    pub fn new(account: &AccountContext, item_id: impl Into<String>) -> Self {
        ItemRef {
            group_id: account.group_id.clone(),
            calendar_id: account.calendar_id.clone(),
            item_id: item_id.into(),
        }
    }
}

/// Synchronous request/response access to the remote service.
///
/// Implementations own retries and throttling; every error they return is
/// surfaced by the engine unchanged.
pub trait Transport: Send + Sync {
    /// List attachment resources of an item (metadata only).
    fn list_attachments(
        &self,
        item: &ItemRef,
        cancellable: &Cancellable,
    ) -> anyhow::Result<Vec<Value>>;

    /// Fetch one attachment resource including its `contentBytes`.
    fn get_attachment(
        &self,
        item: &ItemRef,
        attachment_id: &str,
        cancellable: &Cancellable,
    ) -> anyhow::Result<Value>;

    /// Upload an attachment resource, returning the created resource.
    fn add_attachment(
        &self,
        item: &ItemRef,
        attachment: &Value,
        cancellable: &Cancellable,
    ) -> anyhow::Result<Value>;

    fn delete_attachment(
        &self,
        item: &ItemRef,
        attachment_id: &str,
        cancellable: &Cancellable,
    ) -> anyhow::Result<()>;

    /// Patch an existing item with a partial document.
    fn update_item(
        &self,
        item: &ItemRef,
        document: &Value,
        cancellable: &Cancellable,
    ) -> anyhow::Result<()>;
}

/// Shared cancellation flag handed to every collaborator call.
#[derive(Debug, Clone, Default)]
pub struct Cancellable(Arc<AtomicBool>);

impl Cancellable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once `cancel` has been called.
    pub fn check(&self) -> MappingResult<()> {
        if self.is_cancelled() {
            Err(MappingError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Everything a translation may consult besides its input objects.
#[derive(Clone, Copy)]
pub struct SyncContext<'a> {
    pub account: &'a AccountContext,
    pub timezones: &'a dyn TimezoneResolver,
    pub transport: &'a dyn Transport,
    pub cancellable: &'a Cancellable,
}

impl<'a> SyncContext<'a> {
    pub fn item(&self, item_id: &str) -> ItemRef {
        ItemRef::new(self.account, item_id)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory `Transport` used by the engine's tests.

    use std::sync::Mutex;

    use anyhow::anyhow;
    use serde_json::{Value, json};

    use calsync_core::config::AccountContext;
    use tempfile::TempDir;

    use super::{Cancellable, ItemRef, SyncContext, Transport};
    use crate::timezone::WindowsZones;

    /// Owns everything a `SyncContext` borrows.
    pub struct TestEnv {
        pub account: AccountContext,
        pub transport: MemoryTransport,
        pub cancellable: Cancellable,
        pub zones: WindowsZones,
        pub dir: TempDir,
    }

    impl TestEnv {
        pub fn new() -> Self {
            Self::with_transport(MemoryTransport::default())
        }

        pub fn with_transport(transport: MemoryTransport) -> Self {
            let dir = TempDir::new().unwrap();
            TestEnv {
                account: AccountContext::new("calendar-1", dir.path().join("attachments")),
                transport,
                cancellable: Cancellable::new(),
                zones: WindowsZones,
                dir,
            }
        }

        pub fn ctx(&self) -> SyncContext<'_> {
            SyncContext {
                account: &self.account,
                timezones: &self.zones,
                transport: &self.transport,
                cancellable: &self.cancellable,
            }
        }
    }

    #[derive(Default)]
    pub struct MemoryTransport {
        /// (item id, attachment resource with id and contentBytes)
        pub attachments: Mutex<Vec<(String, Value)>>,
        /// Documents received through `update_item`
        pub updates: Mutex<Vec<(String, Value)>>,
        /// Operation log such as "add:item-1:report.pdf" or "delete:item-1:att-1"
        pub log: Mutex<Vec<String>>,
    }

    impl MemoryTransport {
        pub fn with_attachment(self, item_id: &str, id: &str, name: &str, content_b64: &str) -> Self {
            self.attachments.lock().unwrap().push((
                item_id.to_string(),
                json!({
                    "@odata.type": "#microsoft.graph.fileAttachment",
                    "id": id,
                    "name": name,
                    "contentType": "text/plain",
                    "contentBytes": content_b64,
                }),
            ));
            self
        }

        pub fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl Transport for MemoryTransport {
        fn list_attachments(
            &self,
            item: &ItemRef,
            _cancellable: &Cancellable,
        ) -> anyhow::Result<Vec<Value>> {
            Ok(self
                .attachments
                .lock()
                .unwrap()
                .iter()
                .filter(|(owner, _)| *owner == item.item_id)
                .map(|(_, att)| {
                    let mut meta = att.clone();
                    if let Some(obj) = meta.as_object_mut() {
                        obj.remove("contentBytes");
                    }
                    meta
                })
                .collect())
        }

        fn get_attachment(
            &self,
            item: &ItemRef,
            attachment_id: &str,
            _cancellable: &Cancellable,
        ) -> anyhow::Result<Value> {
            self.attachments
                .lock()
                .unwrap()
                .iter()
                .find(|(owner, att)| *owner == item.item_id && att["id"] == attachment_id)
                .map(|(_, att)| att.clone())
                .ok_or_else(|| anyhow!("attachment {} not found", attachment_id))
        }

        fn add_attachment(
            &self,
            item: &ItemRef,
            attachment: &Value,
            _cancellable: &Cancellable,
        ) -> anyhow::Result<Value> {
            let mut attachments = self.attachments.lock().unwrap();
            let mut created = attachment.clone();
            let id = format!("att-new-{}", attachments.len() + 1);
            created["id"] = Value::String(id);
            attachments.push((item.item_id.clone(), created.clone()));
            self.log.lock().unwrap().push(format!(
                "add:{}:{}",
                item.item_id,
                attachment["name"].as_str().unwrap_or_default()
            ));
            Ok(created)
        }

        fn delete_attachment(
            &self,
            item: &ItemRef,
            attachment_id: &str,
            _cancellable: &Cancellable,
        ) -> anyhow::Result<()> {
            self.attachments
                .lock()
                .unwrap()
                .retain(|(owner, att)| !(*owner == item.item_id && att["id"] == attachment_id));
            self.log
                .lock()
                .unwrap()
                .push(format!("delete:{}:{}", item.item_id, attachment_id));
            Ok(())
        }

        fn update_item(
            &self,
            item: &ItemRef,
            document: &Value,
            _cancellable: &Cancellable,
        ) -> anyhow::Result<()> {
            self.updates
                .lock()
                .unwrap()
                .push((item.item_id.clone(), document.clone()));
            self.log.lock().unwrap().push(format!("update:{}", item.item_id));
            Ok(())
        }
    }
}

//! Per-account identity context.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CalSyncError, CalSyncResult};

static DEFAULT_CALENDAR_ID: &str = "default";

fn default_calendar_id() -> String {
    DEFAULT_CALENDAR_ID.to_string()
}

/// Identifies where an account's items live on the remote service and
/// where downloaded attachments are cached locally.
///
/// Stored as TOML, e.g. in `~/.config/calsync/accounts/{account}.toml`:
///
/// ```toml
/// group_id = "AAMkAGI2..."
/// calendar_id = "AAMkAGI2TG93AAA="
/// attachments_dir = "~/.cache/calsync/m365/work"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountContext {
    /// Calendar group (events) or task list group; absent for the default group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    /// Calendar (events) or task list (tasks) id
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    /// Root directory for downloaded attachments
    pub attachments_dir: PathBuf,
}

impl AccountContext {
    pub fn new(calendar_id: impl Into<String>, attachments_dir: impl Into<PathBuf>) -> Self {
        AccountContext {
            group_id: None,
            calendar_id: calendar_id.into(),
            attachments_dir: attachments_dir.into(),
        }
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Default attachment cache for an account: `{cache_dir}/calsync/m365/{account}`
    pub fn default_attachments_dir(account: &str) -> CalSyncResult<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| CalSyncError::Config("Could not determine cache directory".into()))?;
        Ok(cache_dir.join("calsync").join("m365").join(account))
    }

    /// Load an account context from a TOML file, expanding `~` in `attachments_dir`.
    pub fn load(path: &Path) -> CalSyncResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut context: AccountContext =
            toml::from_str(&content).map_err(|e| CalSyncError::Config(e.to_string()))?;

        let raw = context.attachments_dir.to_string_lossy().to_string();
        let expanded = shellexpand::tilde(&raw);
        context.attachments_dir = PathBuf::from(expanded.as_ref());

        Ok(context)
    }

    /// Save the context as TOML, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> CalSyncResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CalSyncError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_applies_defaults_and_expands_tilde() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("work.toml");
        std::fs::write(&path, "attachments_dir = \"~/attachments\"\n").unwrap();

        let context = AccountContext::load(&path).unwrap();
        assert_eq!(context.calendar_id, "default");
        assert_eq!(context.group_id, None);
        assert!(
            !context.attachments_dir.to_string_lossy().starts_with('~'),
            "Tilde should be expanded, got {}",
            context.attachments_dir.display()
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts").join("work.toml");
        let context = AccountContext::new("cal-1", dir.path().join("cache")).with_group("grp-1");

        context.save(&path).unwrap();
        let loaded = AccountContext::load(&path).unwrap();
        assert_eq!(loaded, context);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "calendar_id = [").unwrap();

        match AccountContext::load(&path) {
            Err(CalSyncError::Config(_)) => {}
            other => panic!("Expected config error, got {:?}", other),
        }
    }
}

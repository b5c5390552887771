use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::ConfigError;

const DOCUMENTS_FOLDER: &str = "Belege";

/// Engine settings. Unset roots resolve below the user's documents folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Folder watched for new scans. Defaults to `~/Documents/Belege/Inbox`.
    pub inbox_root: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Destination of archived artifacts. Defaults to `~/Documents/Belege/Archive`.
    pub archive_root: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Ledger snapshot file. Defaults to `ledger.json` in the application directory.
    pub ledger_path: Option<PathBuf>,

    #[serde(default = "Config::default_watch_interval_secs")]
    pub watch_interval_secs: u64,

    #[serde(default = "Config::default_allocation_retry_limit")]
    pub allocation_retry_limit: u32,

    #[serde(default = "Config::default_recurring_iteration_cap")]
    pub recurring_iteration_cap: usize,

    #[serde(default = "Config::default_generate_recurring_on_tick")]
    pub generate_recurring_on_tick: bool,

    #[serde(default = "Config::default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,

    #[serde(default = "Config::default_ledger_backup_retention")]
    pub ledger_backup_retention: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inbox_root: None,
            archive_root: None,
            ledger_path: None,
            watch_interval_secs: Self::default_watch_interval_secs(),
            allocation_retry_limit: Self::default_allocation_retry_limit(),
            recurring_iteration_cap: Self::default_recurring_iteration_cap(),
            generate_recurring_on_tick: Self::default_generate_recurring_on_tick(),
            accepted_extensions: Self::default_accepted_extensions(),
            ledger_backup_retention: Self::default_ledger_backup_retention(),
        }
    }
}

impl Config {
    pub fn default_watch_interval_secs() -> u64 {
        10
    }

    pub fn default_allocation_retry_limit() -> u32 {
        128
    }

    pub fn default_recurring_iteration_cap() -> usize {
        1000
    }

    pub fn default_generate_recurring_on_tick() -> bool {
        true
    }

    pub fn default_accepted_extensions() -> Vec<String> {
        ["pdf", "jpg", "jpeg", "png", "heic"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn default_ledger_backup_retention() -> usize {
        5
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs)
    }

    pub fn resolve_inbox_root(&self) -> PathBuf {
        match &self.inbox_root {
            Some(path) => path.clone(),
            None => documents_base().join(DOCUMENTS_FOLDER).join("Inbox"),
        }
    }

    pub fn resolve_archive_root(&self) -> PathBuf {
        match &self.archive_root {
            Some(path) => path.clone(),
            None => documents_base().join(DOCUMENTS_FOLDER).join("Archive"),
        }
    }

    pub fn resolve_ledger_path(&self, app_dir: &Path) -> PathBuf {
        match &self.ledger_path {
            Some(path) => path.clone(),
            None => app_dir.join("ledger.json"),
        }
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch_interval_secs == 0 {
            return Err(invalid("watch_interval_secs", "must be at least one second"));
        }
        if self.allocation_retry_limit == 0 {
            return Err(invalid("allocation_retry_limit", "must be positive"));
        }
        if self.recurring_iteration_cap == 0 {
            return Err(invalid("recurring_iteration_cap", "must be positive"));
        }
        if self
            .accepted_extensions
            .iter()
            .all(|ext| ext.trim_start_matches('.').trim().is_empty())
        {
            return Err(invalid("accepted_extensions", "needs at least one extension"));
        }
        if let (Some(inbox), Some(archive)) = (&self.inbox_root, &self.archive_root) {
            if inbox == archive {
                return Err(invalid("archive_root", "must differ from inbox_root"));
            }
        }
        Ok(())
    }
}

fn documents_base() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

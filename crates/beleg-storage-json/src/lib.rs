//! JSON file persistence for the ledger book.

use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use beleg_core::{storage::book_warnings, BookStore, CoreError, SnapshotWriter};
use beleg_domain::{LedgerBook, CURRENT_SCHEMA_VERSION};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

const LEDGER_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";
pub const DEFAULT_RETENTION: usize = 5;

/// A ledger book stored as one pretty-printed JSON file.
///
/// Every committed transaction rewrites the whole file through a sibling `.tmp` file and a
/// rename, so a crash leaves either the previous or the new snapshot on disk.
#[derive(Debug, Clone)]
pub struct JsonLedgerFile {
    path: PathBuf,
    backups: Option<BackupPolicy>,
}

#[derive(Debug, Clone)]
struct BackupPolicy {
    dir: PathBuf,
    retention: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub created_at: Option<DateTime<Utc>>,
}

impl JsonLedgerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backups: None,
        }
    }

    /// Keeps up to `retention` copies of the file in `dir`, one per [`open_store`](Self::open_store).
    pub fn with_backups(mut self, dir: impl Into<PathBuf>, retention: usize) -> Self {
        self.backups = Some(BackupPolicy {
            dir: dir.into(),
            retention: retention.max(1),
        });
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the book, or starts an empty one when the file does not exist yet.
    pub fn load(&self) -> Result<LedgerBook, CoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "ledger file missing; starting empty");
            return Ok(LedgerBook::new());
        }
        load_book_from_path(&self.path)
    }

    /// Loads the file, backs it up and returns a store that writes every commit back.
    pub fn open_store(self) -> Result<BookStore, CoreError> {
        let book = self.load()?;
        for warning in book_warnings(&book) {
            warn!(path = %self.path.display(), "{warning}");
        }
        if let Some(backup) = self.backup()? {
            debug!(backup = %backup.display(), "ledger backed up");
        }
        info!(
            path = %self.path.display(),
            businesses = book.businesses.len(),
            records = book.records.len(),
            definitions = book.definitions.len(),
            "ledger opened"
        );
        Ok(BookStore::with_writer(book, Box::new(self)))
    }

    /// Copies the current file into the backup directory and prunes old copies. Returns
    /// `None` when backups are disabled or there is nothing to copy.
    pub fn backup(&self) -> Result<Option<PathBuf>, CoreError> {
        let Some(policy) = &self.backups else {
            return Ok(None);
        };
        if !self.path.exists() {
            return Ok(None);
        }
        fs::create_dir_all(&policy.dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT);
        let target = policy
            .dir
            .join(format!("{}_{timestamp}.{LEDGER_EXTENSION}", self.stem()));
        fs::copy(&self.path, &target)?;
        self.prune_backups(policy)?;
        Ok(Some(target))
    }

    /// Backups of this ledger, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError> {
        let Some(policy) = &self.backups else {
            return Ok(Vec::new());
        };
        if !policy.dir.exists() {
            return Ok(Vec::new());
        }
        let prefix = format!("{}_", self.stem());
        let mut entries = Vec::new();
        for entry in fs::read_dir(&policy.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !name.starts_with(&prefix) || !name.ends_with(LEDGER_EXTENSION) {
                continue;
            }
            let created_at = parse_backup_timestamp(&name[prefix.len()..]);
            entries.push(BackupInfo { path, created_at });
        }
        entries.sort_by_key(|info| Reverse(info.created_at));
        Ok(entries)
    }

    fn prune_backups(&self, policy: &BackupPolicy) -> Result<(), CoreError> {
        for stale in self.list_backups()?.into_iter().skip(policy.retention) {
            if let Err(err) = fs::remove_file(&stale.path) {
                warn!(path = %stale.path.display(), error = %err, "old backup not removed");
            }
        }
        Ok(())
    }

    fn stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("ledger")
            .to_string()
    }
}

impl SnapshotWriter for JsonLedgerFile {
    fn write(&self, book: &LedgerBook) -> Result<(), CoreError> {
        save_book_to_path(book, &self.path)
    }
}

/// Writes a book to `path` atomically.
pub fn save_book_to_path(book: &LedgerBook, path: &Path) -> Result<(), CoreError> {
    let tmp = tmp_path(path);
    write_atomic(&tmp, &serialize_book(book)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a book, rejecting files written by a newer schema.
pub fn load_book_from_path(path: &Path) -> Result<LedgerBook, CoreError> {
    let data = fs::read_to_string(path)?;
    let book: LedgerBook =
        serde_json::from_str(&data).map_err(|err| CoreError::Serde(err.to_string()))?;
    if book.schema_version > CURRENT_SCHEMA_VERSION {
        return Err(CoreError::Storage(format!(
            "{} uses schema version {} but this build supports up to {}",
            path.display(),
            book.schema_version,
            CURRENT_SCHEMA_VERSION
        )));
    }
    Ok(book)
}

fn parse_backup_timestamp(suffix: &str) -> Option<DateTime<Utc>> {
    let raw = suffix.strip_suffix(&format!(".{LEDGER_EXTENSION}"))?;
    NaiveDateTime::parse_from_str(raw, BACKUP_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{existing}.{TMP_SUFFIX}"),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn serialize_book(book: &LedgerBook) -> Result<String, CoreError> {
    serde_json::to_string_pretty(book).map_err(|err| CoreError::Serde(err.to_string()))
}

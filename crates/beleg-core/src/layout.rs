//! Inbox and archive directory layout.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use beleg_domain::{Business, Kind};

pub const DEFAULT_EXTENSIONS: [&str; 5] = ["pdf", "jpg", "jpeg", "png", "heic"];

/// Resolves `{InboxRoot}/{Business}/{Kind}/` and `{ArchiveRoot}/{Business}/{Kind}/{Year}/`.
/// Records without a business skip the business segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    inbox_root: PathBuf,
    archive_root: PathBuf,
    accepted_extensions: Vec<String>,
}

impl ArchiveLayout {
    pub fn new(inbox_root: impl Into<PathBuf>, archive_root: impl Into<PathBuf>) -> Self {
        Self {
            inbox_root: inbox_root.into(),
            archive_root: archive_root.into(),
            accepted_extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.accepted_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    pub fn inbox_root(&self) -> &Path {
        &self.inbox_root
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    pub fn inbox_dir(&self, business: Option<&Business>, kind: Kind) -> PathBuf {
        with_business(&self.inbox_root, business).join(kind.folder_name())
    }

    pub fn archive_dir(&self, business: Option<&Business>, kind: Kind, year: i32) -> PathBuf {
        with_business(&self.archive_root, business)
            .join(kind.folder_name())
            .join(year.to_string())
    }

    /// Whether `path` carries one of the accepted scan extensions.
    pub fn is_accepted(&self, path: &Path) -> bool {
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(true, |name| name.starts_with('.'));
        if hidden {
            return false;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| self.accepted_extensions.iter().any(|accepted| *accepted == ext))
    }

    /// Creates the inbox folders of both kinds and the archive folders for `year`.
    pub fn provision(&self, business: &Business, year: i32) -> io::Result<()> {
        for kind in Kind::ALL {
            fs::create_dir_all(self.inbox_dir(Some(business), kind))?;
            fs::create_dir_all(self.archive_dir(Some(business), kind, year))?;
        }
        Ok(())
    }

    /// Removes the business's inbox and archive trees.
    pub fn remove_business_folders(&self, business: &Business) -> io::Result<()> {
        for root in [&self.inbox_root, &self.archive_root] {
            let dir = with_business(root, Some(business));
            if dir.exists() {
                fs::remove_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

/// Directory segment of a business: its pinned folder, else one derived from its name.
pub fn business_folder(business: &Business) -> String {
    match business.folder.as_deref().map(str::trim) {
        Some(folder) if !folder.is_empty() => folder.to_string(),
        _ => folder_from_name(business),
    }
}

fn folder_from_name(business: &Business) -> String {
    let name: String = business
        .name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect();
    if name.is_empty() || name.chars().all(|c| c == '.') {
        business.prefix.clone()
    } else {
        name
    }
}

fn with_business(root: &Path, business: Option<&Business>) -> PathBuf {
    match business {
        Some(business) => root.join(business_folder(business)),
        None => root.to_path_buf(),
    }
}

/// Moves `from` to `to`, falling back to copy and delete across filesystems.
pub fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    if from == to {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) if from.is_file() => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(err) => Err(err),
    }
}

/// Writes `bytes` to `path`, creating parent directories.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

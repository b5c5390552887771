#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use assert_cmd::Command;
use beleg_config::{Config, ConfigManager};
use tempfile::TempDir;

/// An application directory whose config points inbox and archive into the same temp dir.
pub struct Workspace {
    _dir: TempDir,
    pub home: PathBuf,
    pub inbox: PathBuf,
    pub archive: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let home = dir.path().join("home");
        let inbox = dir.path().join("Inbox");
        let archive = dir.path().join("Archive");
        let manager = ConfigManager::with_base_dir(home.clone()).expect("config manager");
        manager
            .save(&Config {
                inbox_root: Some(inbox.clone()),
                archive_root: Some(archive.clone()),
                ..Config::default()
            })
            .expect("save config");
        Self {
            _dir: dir,
            home,
            inbox,
            archive,
        }
    }

    pub fn manager(&self) -> ConfigManager {
        ConfigManager::with_base_dir(self.home.clone()).expect("config manager")
    }

    /// `beleg --home <home> --plain <args>`.
    pub fn beleg(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("beleg").expect("binary built");
        cmd.arg("--home")
            .arg(&self.home)
            .arg("--plain")
            .args(args)
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn ledger_json(&self) -> String {
        fs::read_to_string(self.home.join("ledger.json")).unwrap_or_default()
    }
}

/// Drops a scan and its extraction sidecar into `dir`.
pub fn drop_scan(dir: &Path, name: &str, sidecar: &str) -> PathBuf {
    fs::create_dir_all(dir).expect("create inbox folder");
    let scan = dir.join(name);
    fs::write(&scan, b"%PDF-1.4").expect("write scan");
    fs::write(dir.join(format!("{name}.json")), sidecar).expect("write sidecar");
    scan
}

//! Two-layer local backup of the business data, mirroring snapshots into a
//! single primary file (with checksum metadata) and a versioned store of
//! numbered snapshot files. Every write failure is swallowed into a boolean;
//! recovery takes the newest copy it can find, preferring the versioned
//! store.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

const MAX_VERSION_HISTORY: usize = 50;
const DEBOUNCE_MS: u64 = 2000;
const PRIMARY_FILE: &str = "primary.json";
const VERSIONS_DIR: &str = "versions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub version: i64,
    pub timestamp: i64,
    pub checksum: String,
    pub size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct PrimaryBackup {
    data: Value,
    meta: BackupMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionedSnapshot {
    id: i64,
    timestamp: i64,
    data: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub primary: bool,
    pub versioned: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recovered {
    pub source: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub id: i64,
    pub timestamp: i64,
}

#[derive(Clone)]
pub struct BackupManager {
    dir: PathBuf,
    debounce: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

fn checksum(data: &str) -> String {
    let digest = Sha256::digest(data.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex.truncate(16);
    hex
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            debounce: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_env() -> Self {
        let dir = std::env::var("BACKUP_DIR").unwrap_or_else(|_| "./data/backups".to_string());
        Self::new(dir)
    }

    fn primary_path(&self) -> PathBuf {
        self.dir.join(PRIMARY_FILE)
    }

    fn versions_dir(&self) -> PathBuf {
        self.dir.join(VERSIONS_DIR)
    }

    /// Writes the snapshot to both layers independently and reports which
    /// succeeded. Never returns an error.
    pub fn save(&self, data: &Value) -> SaveOutcome {
        let primary = self.save_primary(data);
        let versioned = self.save_versioned(data);
        log::info!("Backup saved - primary: {primary}, versioned: {versioned}");
        SaveOutcome { primary, versioned }
    }

    fn save_primary(&self, data: &Value) -> bool {
        let result = (|| -> Result<(), Box<dyn std::error::Error>> {
            fs::create_dir_all(&self.dir)?;
            let serialized = serde_json::to_string(data)?;
            let now = Utc::now().timestamp_millis();
            let backup = PrimaryBackup {
                meta: BackupMetadata {
                    version: now,
                    timestamp: now,
                    checksum: checksum(&serialized),
                    size: serialized.len(),
                },
                data: data.clone(),
            };
            fs::write(self.primary_path(), serde_json::to_vec(&backup)?)?;
            Ok(())
        })();

        if let Err(err) = &result {
            log::error!("Primary backup save failed: {err}");
        }
        result.is_ok()
    }

    fn save_versioned(&self, data: &Value) -> bool {
        let result = (|| -> Result<(), Box<dyn std::error::Error>> {
            let dir = self.versions_dir();
            fs::create_dir_all(&dir)?;
            let id = self.version_ids().last().copied().unwrap_or(0) + 1;
            let snapshot = VersionedSnapshot {
                id,
                timestamp: Utc::now().timestamp_millis(),
                data: data.clone(),
            };
            fs::write(version_file(&dir, id), serde_json::to_vec(&snapshot)?)?;
            self.prune_old_versions();
            Ok(())
        })();

        if let Err(err) = &result {
            log::error!("Versioned backup save failed: {err}");
        }
        result.is_ok()
    }

    fn prune_old_versions(&self) {
        let ids = self.version_ids();
        if ids.len() <= MAX_VERSION_HISTORY {
            return;
        }
        let dir = self.versions_dir();
        for id in &ids[..ids.len() - MAX_VERSION_HISTORY] {
            let _ = fs::remove_file(version_file(&dir, *id));
        }
    }

    /// Sorted ascending; the last entry is the newest snapshot.
    fn version_ids(&self) -> Vec<i64> {
        let Ok(entries) = fs::read_dir(self.versions_dir()) else {
            return Vec::new();
        };
        let mut ids: Vec<i64> = entries
            .flatten()
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()?
                    .strip_prefix("snapshot-")?
                    .strip_suffix(".json")?
                    .parse()
                    .ok()
            })
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the newest available snapshot: the versioned store first, then
    /// the primary file, then checksum-mismatched primary data as a last
    /// resort.
    pub fn recover(&self) -> Option<Recovered> {
        if let Some(id) = self.version_ids().last() {
            if let Some(data) = self.version(*id) {
                return Some(Recovered {
                    source: "versions".to_string(),
                    data,
                });
            }
        }

        let raw = fs::read_to_string(self.primary_path()).ok()?;
        let backup: PrimaryBackup = serde_json::from_str(&raw).ok()?;
        let serialized = serde_json::to_string(&backup.data).ok()?;
        if checksum(&serialized) == backup.meta.checksum {
            return Some(Recovered {
                source: "primary".to_string(),
                data: backup.data,
            });
        }

        log::warn!("Primary backup checksum mismatch - returning possibly corrupted data");
        Some(Recovered {
            source: "primary-corrupted".to_string(),
            data: backup.data,
        })
    }

    pub fn versions(&self) -> Vec<VersionInfo> {
        let dir = self.versions_dir();
        self.version_ids()
            .into_iter()
            .filter_map(|id| {
                let raw = fs::read_to_string(version_file(&dir, id)).ok()?;
                let snapshot: VersionedSnapshot = serde_json::from_str(&raw).ok()?;
                Some(VersionInfo {
                    id,
                    timestamp: snapshot.timestamp,
                })
            })
            .collect()
    }

    pub fn version(&self, id: i64) -> Option<Value> {
        let raw = fs::read_to_string(version_file(&self.versions_dir(), id)).ok()?;
        let snapshot: VersionedSnapshot = serde_json::from_str(&raw).ok()?;
        Some(snapshot.data)
    }

    pub fn metadata(&self) -> Option<BackupMetadata> {
        let raw = fs::read_to_string(self.primary_path()).ok()?;
        let backup: PrimaryBackup = serde_json::from_str(&raw).ok()?;
        Some(backup.meta)
    }

    /// Schedules a save after the debounce window; a newer call replaces a
    /// pending one.
    pub fn save_debounced(&self, data: Value) {
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS)).await;
            manager.save(&data);
        });

        let mut slot = match self.debounce.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(pending) = slot.replace(handle) {
            pending.abort();
        }
    }
}

fn version_file(dir: &Path, id: i64) -> PathBuf {
    dir.join(format!("snapshot-{id:08}.json"))
}

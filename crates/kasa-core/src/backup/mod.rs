//! Database backups with pluggable storage
//!
//! A backup is a consistent copy of the live database taken with
//! `sqlcipher_export()` (same key as the source), gzip-compressed and handed to
//! a `BackupDestination`.
//!
//! File naming: `kasa-YYYY-MM-DD-HHMMSS.db.gz`

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

mod local;

pub use local::LocalDestination;

const BACKUP_PREFIX: &str = "kasa-";
const BACKUP_SUFFIX: &str = ".db.gz";

/// Default number of backups kept by pruning
pub const DEFAULT_RETENTION: usize = 7;

/// A stored backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupInfo {
    pub name: String,
    /// Location within the destination
    pub path: String,
    /// Size in bytes
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub compressed: bool,
}

/// Outcome of a backup, with row counts for reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupResult {
    pub info: BackupInfo,
    pub encrypted: bool,
    pub transactions: i64,
    pub categories: i64,
    pub users: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PruneResult {
    pub deleted_count: usize,
    pub deleted_names: Vec<String>,
    pub retained_count: usize,
    pub bytes_freed: u64,
}

/// How many backups survive a prune
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub keep_last: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::keep_last(DEFAULT_RETENTION)
    }
}

impl RetentionPolicy {
    pub fn keep_last(n: usize) -> Self {
        Self { keep_last: n }
    }
}

/// Storage backend for backup files
pub trait BackupDestination: Send + Sync {
    fn name(&self) -> &str;

    /// Store a raw database file under `backup_name`, compressing it
    fn store(&self, local_path: &Path, backup_name: &str) -> Result<BackupInfo>;

    /// Copy a backup to `local_path`, decompressing it
    fn retrieve(&self, backup_name: &str, local_path: &Path) -> Result<()>;

    /// All backups, newest first
    fn list(&self) -> Result<Vec<BackupInfo>>;

    fn delete(&self, backup_name: &str) -> Result<()>;

    /// Delete everything beyond the newest `policy.keep_last` backups
    fn prune(&self, policy: &RetentionPolicy) -> Result<PruneResult> {
        let mut backups = self.list()?;
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut result = PruneResult::default();
        for backup in backups.iter().skip(policy.keep_last) {
            if let Err(e) = self.delete(&backup.name) {
                tracing::warn!(backup = %backup.name, error = %e, "Failed to delete backup");
                continue;
            }
            result.bytes_freed += backup.size;
            result.deleted_names.push(backup.name.clone());
        }

        result.deleted_count = result.deleted_names.len();
        result.retained_count = backups.len() - result.deleted_count;
        Ok(result)
    }
}

/// Timestamped name for a new backup
pub fn generate_backup_name() -> String {
    format!(
        "{}{}{}",
        BACKUP_PREFIX,
        Utc::now().format("%Y-%m-%d-%H%M%S"),
        BACKUP_SUFFIX
    )
}

/// Creation time encoded in a backup name
pub fn parse_backup_time(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_SUFFIX)?;
    chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d-%H%M%S")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Reject names that could escape the backup directory
pub fn validate_backup_name(name: &str) -> Result<()> {
    let well_formed = name.starts_with(BACKUP_PREFIX)
        && name.ends_with(BACKUP_SUFFIX)
        && !name.contains(['/', '\\'])
        && !name.contains("..");
    if !well_formed {
        return Err(Error::Validation(format!("Invalid backup name: {}", name)));
    }
    Ok(())
}

/// `~/.local/share/kasa/backups` (or the platform equivalent)
pub fn default_backup_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kasa")
        .join("backups")
}

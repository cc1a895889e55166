//! Background tasks: settlement sweep and automatic backups
//!
//! The settlement sweep always runs (hourly) so matured card income reaches
//! the balance even on days without new entries.
//!
//! Backups are optional and enabled via environment variables:
//!
//! - `KASA_BACKUP_SCHEDULE`: Interval in hours (e.g., "24" for daily, "168" for weekly),
//!   at most one year
//! - `KASA_BACKUP_RETENTION`: Number of backups to keep (default: 7)
//! - `KASA_BACKUP_DIR`: Backup directory (default: platform data dir)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use kasa_core::backup::{default_backup_dir, BackupDestination, DEFAULT_RETENTION};
use kasa_core::{Actor, AuditAction, Database, Ledger, LocalDestination, RetentionPolicy};

/// How often matured card income is swept into the balance
pub const SETTLEMENT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Longest accepted backup interval (one year)
pub const MAX_BACKUP_INTERVAL_HOURS: u64 = 24 * 366;

/// Configuration for scheduled backups
#[derive(Debug, Clone, PartialEq)]
pub struct BackupScheduleConfig {
    /// Interval between backups in hours
    pub interval_hours: u64,
    /// Number of backups to retain
    pub retention_count: usize,
    /// Optional custom backup directory
    pub backup_dir: Option<PathBuf>,
}

impl BackupScheduleConfig {
    /// Parse configuration from environment variables
    ///
    /// Returns None if scheduling is not configured (KASA_BACKUP_SCHEDULE not set)
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let interval_hours: u64 = lookup("KASA_BACKUP_SCHEDULE").and_then(|s| s.trim().parse().ok())?;

        if interval_hours == 0 {
            warn!("KASA_BACKUP_SCHEDULE is 0, automatic backups disabled");
            return None;
        }
        if interval_hours > MAX_BACKUP_INTERVAL_HOURS {
            warn!(
                interval_hours,
                max = MAX_BACKUP_INTERVAL_HOURS,
                "KASA_BACKUP_SCHEDULE is out of range, automatic backups disabled"
            );
            return None;
        }

        let retention_count = lookup("KASA_BACKUP_RETENTION")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_RETENTION);

        let backup_dir = lookup("KASA_BACKUP_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Some(Self {
            interval_hours,
            retention_count,
            backup_dir,
        })
    }

    /// Time between scheduled backups
    pub fn interval(&self) -> Duration {
        let hours = self.interval_hours.min(MAX_BACKUP_INTERVAL_HOURS);
        Duration::from_secs(hours.saturating_mul(3600))
    }
}

/// Start the settlement sweep as a background task
///
/// The first tick fires immediately so income that matured while the server
/// was down is applied on startup.
pub fn start_settlement_scheduler(ledger: Arc<Ledger>) {
    info!(
        "Starting settlement sweep: every {} minutes",
        SETTLEMENT_SWEEP_INTERVAL.as_secs() / 60
    );

    tokio::spawn(async move {
        let mut ticker = interval(SETTLEMENT_SWEEP_INTERVAL);

        loop {
            ticker.tick().await;

            match ledger.settle_due().await {
                Ok(result) if result.settled_count > 0 => {
                    info!(
                        settled = result.settled_count,
                        amount = %result.settled_amount,
                        running_total = %result.running_total,
                        "Settled matured card income"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Settlement sweep failed: {}", e);
                }
            }
        }
    });
}

/// Start the backup scheduler as a background task
///
/// This function spawns a tokio task that runs indefinitely, creating
/// backups at the configured interval.
pub fn start_backup_scheduler(db: Database, config: BackupScheduleConfig) {
    info!(
        "Starting backup scheduler: every {} hours, keeping {} backups",
        config.interval_hours, config.retention_count
    );

    tokio::spawn(async move {
        let backup_dir = config.backup_dir.clone().unwrap_or_else(default_backup_dir);
        let mut ticker = interval(config.interval());

        // Skip the first immediate tick - we don't want to backup on startup
        ticker.tick().await;

        loop {
            ticker.tick().await;

            info!("Running scheduled backup...");

            match run_scheduled_backup(&db, &backup_dir, config.retention_count) {
                Ok(backup_name) => {
                    info!("Scheduled backup completed: {}", backup_name);
                }
                Err(e) => {
                    error!("Scheduled backup failed: {}", e);
                }
            }
        }
    });
}

/// Run a single scheduled backup
pub(crate) fn run_scheduled_backup(
    db: &Database,
    backup_dir: &Path,
    retention_count: usize,
) -> Result<String, String> {
    let destination = LocalDestination::new(backup_dir)
        .map_err(|e| format!("Failed to initialize backup directory: {}", e))?;

    let result = db
        .create_backup(&destination, None)
        .map_err(|e| format!("Failed to create backup: {}", e))?;

    info!(
        "Backup created: {} ({} bytes, {} transactions, {} categories)",
        result.info.name, result.info.size, result.transactions, result.categories
    );

    if let Err(e) = db.log_audit(
        &Actor::system("scheduler"),
        AuditAction::Backup,
        "backup",
        None,
        None,
        Some(&serde_json::json!({ "name": result.info.name, "scheduled": true })),
    ) {
        warn!("Failed to log scheduled backup to audit: {}", e);
    }

    let policy = RetentionPolicy::keep_last(retention_count);
    match destination.prune(&policy) {
        Ok(prune_result) => {
            if prune_result.deleted_count > 0 {
                info!(
                    "Pruned {} old backup(s), freed {} bytes",
                    prune_result.deleted_count, prune_result.bytes_freed
                );
            }
        }
        Err(e) => {
            warn!("Failed to prune old backups: {}", e);
        }
    }

    Ok(result.info.name)
}

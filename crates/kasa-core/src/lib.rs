//! Kasa Core Library
//!
//! Shared functionality for the Kasa bookkeeping backend:
//! - Database access and migrations (SQLite/SQLCipher)
//! - Ledger service that keeps the running cash balance in step with entries
//! - Card settlement policy and the settlement sweep
//! - Low-balance threshold monitor and notification seam
//! - Reports, CSV export and backups

pub mod auth;
pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ledger;
pub mod models;
pub mod money;
pub mod monitor;
pub mod notify;
pub mod settlement;

/// Test utilities including a mock webhook server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use backup::{
    BackupDestination, BackupInfo, BackupResult, LocalDestination, PruneResult, RetentionPolicy,
};
pub use config::Config;
pub use db::{Database, TransactionQuery};
pub use error::{Error, Result};
pub use export::TransactionExportOptions;
pub use ledger::{Clock, FixedClock, Ledger, SystemClock};
pub use models::*;
pub use monitor::{AlertState, ThresholdMonitor, Transition};
pub use notify::{LogNotifier, Notifier, WebhookNotifier};
pub use settlement::SETTLEMENT_OFFSET_DAYS;

//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Kasa - Small-business bookkeeping with a live cash balance
#[derive(Parser)]
#[command(name = "kasa")]
#[command(about = "Self-hosted bookkeeping backend with a running cash balance", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "kasa.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set KASA_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database (and the super admin, if configured)
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, every API call except login requires a session token.
        #[arg(long)]
        no_auth: bool,
    },

    /// Show the cash balance and pending card settlements
    Balance {
        /// Number of pending settlements to show
        #[arg(long, default_value = "10")]
        pending: i64,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Apply card income whose settlement date has been reached
    Settle {
        /// Settle as of this date instead of today (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Compare the stored balance with the ledger
    Reconcile {
        /// Overwrite the stored balance when it has drifted
        #[arg(long)]
        apply: bool,
    },

    /// Manage users
    Users {
        #[command(subcommand)]
        action: Option<UsersAction>,
    },

    /// Backup management (create, list, restore, prune)
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Export data to CSV
    Export {
        #[command(subcommand)]
        export_type: ExportType,
    },
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// List users
    List,

    /// Create a user
    Add {
        /// Email address (login name)
        #[arg(long)]
        email: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// Password (at least 6 characters)
        #[arg(long)]
        password: String,

        /// Role: admin or viewer
        #[arg(long, default_value = "viewer")]
        role: String,

        /// Make this user the super admin
        #[arg(long)]
        super_admin: bool,
    },

    /// Delete a user
    Delete {
        /// User ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum BackupAction {
    /// Create a new backup
    Create {
        /// Backup name (defaults to timestamped name)
        #[arg(short, long)]
        name: Option<String>,

        /// Backup directory (defaults to ~/.local/share/kasa/backups)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// List available backups
    List {
        /// Backup directory (defaults to ~/.local/share/kasa/backups)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Restore from a backup
    Restore {
        /// Backup name to restore from
        name: String,

        /// Backup directory (defaults to ~/.local/share/kasa/backups)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Overwrite existing database
        #[arg(long)]
        force: bool,
    },

    /// Delete old backups according to retention policy
    Prune {
        /// Number of backups to keep (default: 7)
        #[arg(long, default_value = "7")]
        keep: usize,

        /// Backup directory (defaults to ~/.local/share/kasa/backups)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ExportType {
    /// Export transactions to CSV
    Transactions {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Export a monthly summary with category totals
    Report {
        /// Year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,

        /// Month 1-12 (defaults to the current month)
        #[arg(long)]
        month: Option<u32>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

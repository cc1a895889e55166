//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `backup` - Backup management commands (create, list, restore, prune)
//! - `balance` - Cash balance commands (balance, settle, reconcile)
//! - `core` - Init and shared utilities (open_db, build_ledger)
//! - `export` - CSV export commands
//! - `serve` - Web server command
//! - `users` - User management commands

pub mod backup;
pub mod balance;
pub mod core;
pub mod export;
pub mod serve;
pub mod users;

// Re-export command functions for main.rs
pub use backup::*;
pub use balance::*;
pub use core::*;
pub use export::*;
pub use serve::*;
pub use users::*;

//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `build_ledger` - Ledger service over an open database
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use kasa_core::{notify, Config, Database, FixedClock, Ledger};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Ledger with the configured notifier; `as_of` pins "today"
///
/// `as_of` can only move the clock back, never past the real date.
pub fn build_ledger(db: Database, settings: &Config, as_of: Option<NaiveDate>) -> Result<Ledger> {
    let real_today = Local::now().date_naive();
    if let Some(date) = as_of.filter(|d| *d > real_today) {
        anyhow::bail!("--as-of {} is in the future (today is {})", date, real_today);
    }

    let notifier = notify::from_config(settings).context("Failed to configure alerts")?;
    let ledger = Ledger::new(db, settings, Arc::from(notifier));
    Ok(match as_of {
        Some(date) => ledger.with_clock(Arc::new(FixedClock::new(date))),
        None => ledger,
    })
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool, settings: &Config) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    match &settings.bootstrap_admin {
        Some(admin) => match kasa_server::bootstrap_super_admin(&db, admin)? {
            Some(user) => println!("   👤 Created super admin: {}", user.email),
            None => println!("   Users already exist, skipped super admin"),
        },
        None => {
            println!("   💡 Tip: Set KASA_ADMIN_EMAIL and KASA_ADMIN_PASSWORD to create a super admin")
        }
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Start the API: kasa serve");
    println!("  2. Check the balance: kasa balance");

    Ok(())
}

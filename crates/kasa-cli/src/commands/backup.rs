//! `kasa backup` subcommands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kasa_core::backup::{default_backup_dir, BackupDestination};
use kasa_core::{Actor, AuditAction, Database, LocalDestination, RetentionPolicy, TransactionQuery};
use tracing::info;

fn open_destination(dir: Option<PathBuf>) -> Result<(PathBuf, LocalDestination)> {
    let backup_dir = dir.unwrap_or_else(default_backup_dir);
    let destination = LocalDestination::new(&backup_dir)
        .with_context(|| format!("Cannot open backup directory {}", backup_dir.display()))?;
    Ok((backup_dir, destination))
}

/// Create a new backup
pub fn cmd_backup_create(db: &Database, name: Option<&str>, dir: Option<PathBuf>) -> Result<()> {
    let (_, destination) = open_destination(dir)?;

    let result = db
        .create_backup(&destination, name)
        .context("Backup failed")?;

    db.log_audit(
        &Actor::system("cli"),
        AuditAction::Backup,
        "backup",
        None,
        None,
        Some(&serde_json::json!({ "name": result.info.name })),
    )?;
    info!(name = %result.info.name, size = result.info.size, "Backup created");

    println!("✅ Saved {}", result.info.path);
    println!("   Size: {}", format_size(result.info.size));
    println!(
        "   Rows: {} transactions, {} categories, {} users",
        result.transactions, result.categories, result.users
    );
    if result.encrypted {
        println!("   🔒 Encrypted with the current KASA_DB_KEY");
    }

    Ok(())
}

/// List backups, newest first
pub fn cmd_backup_list(dir: Option<PathBuf>) -> Result<()> {
    let backup_dir = dir.unwrap_or_else(default_backup_dir);

    if !backup_dir.exists() {
        println!("No backups in {} (directory missing)", backup_dir.display());
        return Ok(());
    }

    let (backup_dir, destination) = open_destination(Some(backup_dir))?;
    let backups = destination.list().context("Failed to list backups")?;

    if backups.is_empty() {
        println!("No backups in {}", backup_dir.display());
        return Ok(());
    }

    println!("{}", backup_dir.display());
    println!("{:<35} {:>12} {:>17}", "NAME", "SIZE", "CREATED");
    println!("{}", "-".repeat(66));

    for backup in backups {
        let created = backup.created_at.format("%Y-%m-%d %H:%M").to_string();
        println!(
            "{:<35} {:>12} {:>17}",
            backup.name,
            format_size(backup.size),
            created
        );
    }

    Ok(())
}

/// Restore from a backup
pub fn cmd_backup_restore(
    db_path: &Path,
    name: &str,
    dir: Option<PathBuf>,
    force: bool,
    no_encrypt: bool,
) -> Result<()> {
    let (_, destination) = open_destination(dir)?;

    if !destination.list()?.iter().any(|b| b.name == name) {
        anyhow::bail!("No backup named {}", name);
    }

    if db_path.exists() && !force {
        anyhow::bail!("{} exists; pass --force to replace it", db_path.display());
    }

    Database::restore_backup(&destination, name, db_path, force)
        .with_context(|| format!("Restoring {} failed", name))?;
    info!(name, target = %db_path.display(), "Backup restored");

    // Verify the restored database opens with the current key
    let restored = super::open_db(db_path, no_encrypt)?;
    let balance = restored.get_balance()?;
    let transactions = restored.list_transactions(&TransactionQuery::default())?;

    println!("✅ Restored {} to {}", name, db_path.display());
    println!(
        "   {} transactions, running total {}",
        transactions.len(),
        balance.running_total
    );

    Ok(())
}

/// Keep the newest `keep` backups and delete the rest
pub fn cmd_backup_prune(keep: usize, dir: Option<PathBuf>) -> Result<()> {
    if keep == 0 {
        anyhow::bail!("--keep must be at least 1");
    }

    let (_, destination) = open_destination(dir)?;

    let result = destination
        .prune(&RetentionPolicy::keep_last(keep))
        .context("Prune failed")?;
    info!(
        deleted = result.deleted_count,
        retained = result.retained_count,
        "Pruned backups"
    );

    if result.deleted_count == 0 {
        println!(
            "{} backup(s), limit {}: nothing to delete",
            result.retained_count, keep
        );
        return Ok(());
    }

    for name in &result.deleted_names {
        println!("🗑️  {}", name);
    }
    println!(
        "✅ Deleted {} backup(s), freed {}, {} left",
        result.deleted_count,
        format_size(result.bytes_freed),
        result.retained_count
    );

    Ok(())
}

pub(crate) fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

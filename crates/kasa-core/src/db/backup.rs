//! Database backup via SQLCipher export
//!
//! `sqlcipher_export()` writes a consistent copy into an attached database
//! while the source stays in use. The copy carries the source's key.

use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use super::Database;
use crate::backup::{generate_backup_name, BackupDestination, BackupResult};
use crate::error::{Error, Result};

impl Database {
    /// Export the database and hand it to `destination`
    pub fn create_backup(
        &self,
        destination: &dyn BackupDestination,
        backup_name: Option<&str>,
    ) -> Result<BackupResult> {
        let name = backup_name
            .map(String::from)
            .unwrap_or_else(generate_backup_name);

        let temp = NamedTempFile::new()
            .map_err(|e| Error::Backup(format!("Failed to create temp file: {}", e)))?;
        // Quoted into the ATTACH statement below
        let temp_path = temp.path().to_string_lossy().replace('\'', "''");

        let conn = self.conn()?;

        let (transactions, categories, users): (i64, i64, i64) = conn.query_row(
            r#"
            SELECT (SELECT COUNT(*) FROM transactions),
                   (SELECT COUNT(*) FROM categories),
                   (SELECT COUNT(*) FROM users)
            "#,
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let key_clause = match &self.key {
            Some(key) => format!("x\"{}\"", key),
            None => String::new(),
        };
        conn.execute_batch(&format!(
            "ATTACH DATABASE '{}' AS backup KEY '{}';",
            temp_path, key_clause
        ))
        .map_err(|e| Error::Backup(format!("Failed to attach backup database: {}", e)))?;

        let exported = conn
            .query_row("SELECT sqlcipher_export('backup');", [], |_| Ok(()))
            .map_err(|e| Error::Backup(format!("sqlcipher_export failed: {}", e)));

        // Detach even when the export failed so the pooled connection stays clean
        conn.execute_batch("DETACH DATABASE backup;")
            .map_err(|e| Error::Backup(format!("Failed to detach backup database: {}", e)))?;
        exported?;

        let info = destination.store(temp.path(), &name)?;
        info!(
            backup = %info.name,
            size = info.size,
            destination = destination.name(),
            "Backup complete"
        );

        Ok(BackupResult {
            info,
            encrypted: self.is_encrypted(),
            transactions,
            categories,
            users,
        })
    }

    /// Restore a backup to `target_path`
    ///
    /// Refuses to overwrite an existing database unless `force` is set.
    pub fn restore_backup(
        destination: &dyn BackupDestination,
        backup_name: &str,
        target_path: &Path,
        force: bool,
    ) -> Result<()> {
        if target_path.exists() {
            if !force {
                return Err(Error::Backup(format!(
                    "Database already exists at {}. Pass force to overwrite.",
                    target_path.display()
                )));
            }
            std::fs::remove_file(target_path)
                .map_err(|e| Error::Backup(format!("Failed to remove existing database: {}", e)))?;
            // Stale WAL files would be replayed onto the restored copy
            for suffix in ["-wal", "-shm"] {
                let mut side = target_path.as_os_str().to_owned();
                side.push(suffix);
                let _ = std::fs::remove_file(side);
            }
        }

        destination.retrieve(backup_name, target_path)?;
        info!(path = %target_path.display(), backup = backup_name, "Restored backup");
        Ok(())
    }
}

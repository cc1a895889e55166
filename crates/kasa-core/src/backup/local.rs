//! Backups in a local directory

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::info;

use super::{parse_backup_time, validate_backup_name, BackupDestination, BackupInfo};
use crate::error::{Error, Result};

pub struct LocalDestination {
    backup_dir: PathBuf,
}

impl LocalDestination {
    /// Open a backup directory, creating it if needed
    pub fn new(backup_dir: impl Into<PathBuf>) -> Result<Self> {
        let backup_dir = backup_dir.into();
        if !backup_dir.exists() {
            fs::create_dir_all(&backup_dir).map_err(|e| {
                Error::Backup(format!(
                    "Failed to create backup directory {}: {}",
                    backup_dir.display(),
                    e
                ))
            })?;
            info!(dir = %backup_dir.display(), "Created backup directory");
        }
        Ok(Self { backup_dir })
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_backup_name(name)?;
        Ok(self.backup_dir.join(name))
    }

    fn info_for(&self, path: &Path, name: &str) -> Result<BackupInfo> {
        let metadata = fs::metadata(path)?;
        Ok(BackupInfo {
            name: name.to_string(),
            path: path.to_string_lossy().to_string(),
            size: metadata.len(),
            created_at: parse_backup_time(name).unwrap_or_else(Utc::now),
            compressed: true,
        })
    }
}

impl BackupDestination for LocalDestination {
    fn name(&self) -> &str {
        "local"
    }

    fn store(&self, local_path: &Path, backup_name: &str) -> Result<BackupInfo> {
        let dest_path = self.path_for(backup_name)?;
        if dest_path.exists() {
            return Err(Error::Backup(format!(
                "Backup already exists: {}",
                dest_path.display()
            )));
        }

        let mut reader = BufReader::new(File::open(local_path)?);
        let mut encoder = GzEncoder::new(
            BufWriter::new(File::create(&dest_path)?),
            Compression::default(),
        );
        io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()?;

        info!(path = %dest_path.display(), "Stored backup");
        self.info_for(&dest_path, backup_name)
    }

    fn retrieve(&self, backup_name: &str, local_path: &Path) -> Result<()> {
        let source_path = self.path_for(backup_name)?;
        if !source_path.exists() {
            return Err(Error::NotFound(format!("Backup {}", backup_name)));
        }

        let mut decoder = GzDecoder::new(BufReader::new(File::open(&source_path)?));
        let mut writer = BufWriter::new(File::create(local_path)?);
        io::copy(&mut decoder, &mut writer)?;
        writer.flush()?;

        info!(path = %local_path.display(), "Retrieved backup");
        Ok(())
    }

    fn list(&self) -> Result<Vec<BackupInfo>> {
        let mut backups = Vec::new();
        if !self.backup_dir.exists() {
            return Ok(backups);
        }

        for entry in fs::read_dir(&self.backup_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_file() || validate_backup_name(name).is_err() {
                continue;
            }
            backups.push(self.info_for(&path, name)?);
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    fn delete(&self, backup_name: &str) -> Result<()> {
        let path = self.path_for(backup_name)?;
        if !path.exists() {
            return Err(Error::NotFound(format!("Backup {}", backup_name)));
        }
        fs::remove_file(&path)?;
        info!(path = %path.display(), "Deleted backup");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::RetentionPolicy;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalDestination) {
        let dir = TempDir::new().unwrap();
        let dest = LocalDestination::new(dir.path().join("backups")).unwrap();
        (dir, dest)
    }

    fn raw_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), contents).unwrap();
        file
    }

    #[test]
    fn test_store_compresses_and_retrieve_restores() {
        let (dir, dest) = setup();
        let raw = raw_file(b"ledger bytes ledger bytes ledger bytes");

        let info = dest
            .store(raw.path(), "kasa-2024-01-15-120000.db.gz")
            .unwrap();
        assert!(info.compressed);
        assert_eq!(dest.list().unwrap().len(), 1);

        let restored = dir.path().join("restored.db");
        dest.retrieve("kasa-2024-01-15-120000.db.gz", &restored)
            .unwrap();
        assert_eq!(
            fs::read(&restored).unwrap(),
            b"ledger bytes ledger bytes ledger bytes"
        );
    }

    #[test]
    fn test_store_refuses_to_overwrite() {
        let (_dir, dest) = setup();
        let raw = raw_file(b"x");
        dest.store(raw.path(), "kasa-2024-01-15-120000.db.gz")
            .unwrap();
        assert!(dest
            .store(raw.path(), "kasa-2024-01-15-120000.db.gz")
            .is_err());
    }

    #[test]
    fn test_list_ignores_foreign_files() {
        let (_dir, dest) = setup();
        fs::write(dest.backup_dir().join("notes.txt"), b"hi").unwrap();
        assert!(dest.list().unwrap().is_empty());
    }

    #[test]
    fn test_prune_keeps_newest() {
        let (_dir, dest) = setup();
        let raw = raw_file(b"x");
        for day in 1..=5 {
            let name = format!("kasa-2024-01-{:02}-120000.db.gz", day);
            dest.store(raw.path(), &name).unwrap();
        }

        let result = dest.prune(&RetentionPolicy::keep_last(2)).unwrap();
        assert_eq!(result.deleted_count, 3);
        assert_eq!(result.retained_count, 2);

        let names: Vec<_> = dest.list().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(
            names,
            vec![
                "kasa-2024-01-05-120000.db.gz",
                "kasa-2024-01-04-120000.db.gz"
            ]
        );
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let (_dir, dest) = setup();
        assert!(matches!(
            dest.delete("kasa-2024-01-15-120000.db.gz"),
            Err(Error::NotFound(_))
        ));
    }
}

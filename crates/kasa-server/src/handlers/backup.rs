//! Backup API handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use kasa_core::backup::{default_backup_dir, BackupDestination, DEFAULT_RETENTION};
use kasa_core::{AuditAction, BackupInfo, LocalDestination, PruneResult, RetentionPolicy};

use crate::{AppError, AppState, AuthUser};

/// Create backup request
#[derive(Debug, Default, Deserialize)]
pub struct CreateBackupRequest {
    /// Optional backup name (defaults to timestamped name)
    pub name: Option<String>,
}

/// Create backup response
#[derive(Debug, Serialize)]
pub struct CreateBackupResponse {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub transactions: i64,
    pub categories: i64,
    pub users: i64,
    pub encrypted: bool,
    pub compressed: bool,
}

/// Prune request
#[derive(Debug, Default, Deserialize)]
pub struct PruneBackupsRequest {
    /// Number of backups to keep (default: 7)
    pub keep: Option<usize>,
}

/// Get backup directory from state or default
fn get_backup_dir(state: &AppState) -> std::path::PathBuf {
    state.backup_dir.clone().unwrap_or_else(default_backup_dir)
}

fn open_destination(state: &AppState) -> Result<LocalDestination, AppError> {
    LocalDestination::new(get_backup_dir(state))
        .map_err(|e| AppError::internal(&format!("Failed to access backup directory: {}", e)))
}

/// GET /api/backup - List available backups
pub async fn list_backups(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<BackupInfo>>, AppError> {
    user.require_admin()?;

    if !get_backup_dir(&state).exists() {
        return Ok(Json(vec![]));
    }

    let destination = open_destination(&state)?;
    Ok(Json(destination.list()?))
}

/// POST /api/backup - Create a backup
pub async fn create_backup(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    req: Option<Json<CreateBackupRequest>>,
) -> Result<(StatusCode, Json<CreateBackupResponse>), AppError> {
    user.require_admin()?;
    let Json(req) = req.unwrap_or_default();

    let destination = open_destination(&state)?;
    let result = state.db.create_backup(&destination, req.name.as_deref())?;

    state.db.log_audit(
        &user.actor(),
        AuditAction::Backup,
        "backup",
        None,
        None,
        Some(&serde_json::json!({ "name": result.info.name, "size": result.info.size })),
    )?;
    info!(name = %result.info.name, user = %user.email, "Backup created");

    Ok((
        StatusCode::CREATED,
        Json(CreateBackupResponse {
            name: result.info.name,
            path: result.info.path,
            size: result.info.size,
            transactions: result.transactions,
            categories: result.categories,
            users: result.users,
            encrypted: result.encrypted,
            compressed: result.info.compressed,
        }),
    ))
}

/// POST /api/backup/prune - Delete backups beyond the retention count
pub async fn prune_backups(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    req: Option<Json<PruneBackupsRequest>>,
) -> Result<Json<PruneResult>, AppError> {
    user.require_admin()?;
    let Json(req) = req.unwrap_or_default();

    let keep = req.keep.unwrap_or(DEFAULT_RETENTION);
    if keep == 0 {
        return Err(AppError::bad_request("keep must be at least 1"));
    }

    let destination = open_destination(&state)?;
    let result = destination.prune(&RetentionPolicy::keep_last(keep))?;

    if result.deleted_count > 0 {
        state.db.log_audit(
            &user.actor(),
            AuditAction::Delete,
            "backup",
            None,
            Some(&serde_json::json!({ "deleted": result.deleted_names })),
            None,
        )?;
    }

    Ok(Json(result))
}

//! Audit log handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};

use crate::{AppError, AppState, AuthUser, MAX_PAGE_LIMIT};
use kasa_core::{AuditEntry, AuditFilter};

/// GET /api/audit/logs - List audit log entries, newest first
pub async fn list_audit_log(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(mut filter): Query<AuditFilter>,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    user.require_admin()?;

    filter.limit = filter.limit.map(|l| l.clamp(1, MAX_PAGE_LIMIT));
    Ok(Json(state.db.list_audit_log(&filter)?))
}

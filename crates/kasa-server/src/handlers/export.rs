//! CSV export handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Response, StatusCode},
    Extension,
};
use tracing::info;

use super::reports::{resolve_month, MonthQuery};
use crate::{AppError, AppState, AuthUser};
use kasa_core::{AuditAction, TransactionExportOptions};

fn csv_response(csv: String, filename: &str) -> Result<Response<Body>, AppError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(csv))
        .map_err(|e| AppError::internal(&e.to_string()))
}

/// GET /api/export/transactions - Export transactions to CSV
pub async fn export_transactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(opts): Query<TransactionExportOptions>,
) -> Result<Response<Body>, AppError> {
    user.require_admin()?;

    let csv = state.db.export_transactions_csv(&opts)?;
    let rows = csv.lines().count().saturating_sub(1);
    info!("Exported {} transactions to CSV", rows);

    state.db.log_audit(
        &user.actor(),
        AuditAction::Export,
        "transactions",
        None,
        None,
        Some(&serde_json::json!({
            "format": "csv",
            "from": opts.from,
            "to": opts.to,
            "rows": rows,
        })),
    )?;

    csv_response(csv, "transactions.csv")
}

/// GET /api/export/monthly-report - Export a month's summary and category totals
pub async fn export_monthly_report(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<MonthQuery>,
) -> Result<Response<Body>, AppError> {
    user.require_admin()?;

    let (year, month) = resolve_month(&state, &params)?;
    let csv = state.db.export_monthly_report_csv(year, month)?;

    state.db.log_audit(
        &user.actor(),
        AuditAction::Export,
        "reports",
        None,
        None,
        Some(&serde_json::json!({ "format": "csv", "year": year, "month": month })),
    )?;

    csv_response(csv, &format!("report-{:04}-{:02}.csv", year, month))
}

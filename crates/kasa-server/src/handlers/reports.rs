//! Monthly report handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Datelike;
use serde::Deserialize;

use crate::{AppError, AppState};
use kasa_core::{CategoryBreakdown, MonthlySummary};

/// Month selection; both default to the current month
#[derive(Debug, Default, Deserialize)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Resolve the requested month against the ledger's today
pub fn resolve_month(state: &AppState, params: &MonthQuery) -> Result<(i32, u32), AppError> {
    let today = state.ledger.today();
    let year = params.year.unwrap_or_else(|| today.year());
    let month = params.month.unwrap_or_else(|| today.month());

    if !(1..=12).contains(&month) {
        return Err(AppError::bad_request("month must be between 1 and 12"));
    }
    Ok((year, month))
}

/// GET /api/reports/monthly-summary - Income, expense and net for a month
pub async fn monthly_summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MonthQuery>,
) -> Result<Json<MonthlySummary>, AppError> {
    let (year, month) = resolve_month(&state, &params)?;
    Ok(Json(state.db.monthly_summary(year, month)?))
}

/// GET /api/reports/category-breakdown - Per-category totals for a month
pub async fn category_breakdown(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MonthQuery>,
) -> Result<Json<Vec<CategoryBreakdown>>, AppError> {
    let (year, month) = resolve_month(&state, &params)?;
    Ok(Json(state.db.category_breakdown(year, month)?))
}

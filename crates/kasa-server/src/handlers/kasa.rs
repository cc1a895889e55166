//! Cash balance ("kasa") handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState, AuthUser, MAX_PAGE_LIMIT};
use kasa_core::{AlertState, AssetSummary, PendingSettlement, ReconcileReport, SettleResult};

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub running_total: Decimal,
    pub last_updated: DateTime<Utc>,
    pub minimum_threshold: Decimal,
    pub below_threshold: bool,
    pub alert_state: AlertState,
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileQuery {
    /// Overwrite the stored total when it has drifted
    #[serde(default)]
    pub apply: bool,
}

/// GET /api/kasa - Current cash balance
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.ledger.balance()?;
    let threshold = state.ledger.threshold();

    Ok(Json(BalanceResponse {
        below_threshold: balance.running_total < threshold,
        running_total: balance.running_total,
        last_updated: balance.last_updated,
        minimum_threshold: threshold,
        alert_state: state.ledger.monitor().state(),
    }))
}

/// GET /api/kasa/assets - Lifetime totals split into realized and pending
pub async fn get_assets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AssetSummary>, AppError> {
    Ok(Json(state.ledger.asset_summary()?))
}

/// GET /api/kasa/pending - Card income still waiting for settlement
pub async fn list_pending_settlements(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PendingQuery>,
) -> Result<Json<Vec<PendingSettlement>>, AppError> {
    let limit = params.limit.map(|l| l.clamp(1, MAX_PAGE_LIMIT));
    Ok(Json(state.ledger.pending_settlements(limit)?))
}

/// POST /api/kasa/settle - Apply card income that has matured
pub async fn settle_due(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SettleResult>, AppError> {
    user.require_admin()?;
    Ok(Json(state.ledger.settle_due().await?))
}

/// POST /api/kasa/reconcile - Compare the stored total with the ledger
pub async fn reconcile_balance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ReconcileQuery>,
) -> Result<Json<ReconcileReport>, AppError> {
    user.require_admin()?;
    Ok(Json(
        state.ledger.reconcile(params.apply, &user.actor()).await?,
    ))
}

//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{AppError, AppState, AuthUser, MAX_PAGE_LIMIT};
use kasa_core::{NewTransaction, Transaction, TransactionKind, TransactionQuery};

/// Query parameters for listing transactions
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    /// Inclusive start date (YYYY-MM-DD)
    pub from: Option<NaiveDate>,
    /// Inclusive end date (YYYY-MM-DD)
    pub to: Option<NaiveDate>,
    pub kind: Option<TransactionKind>,
    pub category_id: Option<i64>,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/transactions - List transactions, newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTransactionsQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    // Input validation: clamp pagination parameters
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let offset = params.offset.max(0);

    if let (Some(from), Some(to)) = (params.from, params.to) {
        if from > to {
            return Err(AppError::bad_request("'from' must not be after 'to'"));
        }
    }

    let transactions = state.db.list_transactions(&TransactionQuery {
        from: params.from,
        to: params.to,
        kind: params.kind,
        category_id: params.category_id,
        limit: Some(limit),
        offset: Some(offset),
    })?;

    Ok(Json(transactions))
}

/// GET /api/transactions/:id - Get a single transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, AppError> {
    let transaction = state
        .db
        .get_transaction(id)?
        .ok_or_else(|| AppError::not_found("Transaction not found"))?;
    Ok(Json(transaction))
}

/// POST /api/transactions - Record a transaction and update the balance
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<NewTransaction>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    user.require_admin()?;

    let transaction = state.ledger.record_transaction(req, &user.actor()).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// DELETE /api/transactions/:id - Delete a transaction and reverse its balance effect
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, AppError> {
    user.require_admin()?;

    let transaction = state.ledger.delete_transaction(id, &user.actor()).await?;
    Ok(Json(transaction))
}

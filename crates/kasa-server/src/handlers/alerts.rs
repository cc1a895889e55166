//! Alert handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use tracing::{info, warn};

use crate::{AppError, AppState, AuthUser};

#[derive(Debug, Serialize)]
pub struct TestAlertResponse {
    pub sent: bool,
    pub notifier: String,
}

/// POST /api/alerts/test - Send a test notification through the configured notifier
pub async fn send_test_alert(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TestAlertResponse>, AppError> {
    user.require_admin()?;

    let notifier = state.ledger.notifier();
    if let Err(e) = notifier.send_test().await {
        warn!(notifier = notifier.name(), error = %e, "Test notification failed");
        return Err(AppError::internal(&format!("Test notification failed: {}", e)));
    }
    info!(notifier = notifier.name(), user = %user.email, "Sent test notification");

    Ok(Json(TestAlertResponse {
        sent: true,
        notifier: notifier.name().to_string(),
    }))
}

//! Category handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::{AppError, AppState, AuthUser};
use kasa_core::{Category, NewCategory};

/// GET /api/categories - List categories by kind, then name
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.db.list_categories()?))
}

/// POST /api/categories - Create a category
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    user.require_admin()?;

    let category = state.db.create_category(&req, &user.actor())?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// DELETE /api/categories/:id - Delete a category nobody references
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Category>, AppError> {
    user.require_admin()?;

    let category = state.db.delete_category(id, &user.actor())?;
    Ok(Json(category))
}

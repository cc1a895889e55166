//! Authentication and user management handlers

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{token, AppError, AppState, AuthUser};
use kasa_core::{Actor, AuditAction, NewUser, User, UserUpdate};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub user: User,
}

/// Response for the /api/auth/me endpoint
#[derive(Serialize)]
pub struct MeResponse {
    pub user: AuthUser,
    /// How the user was authenticated
    pub auth_method: String,
}

fn snapshot(user: &User) -> Option<serde_json::Value> {
    serde_json::to_value(user).ok()
}

/// POST /api/auth/login - Exchange credentials for a session token
pub async fn login(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let secret = state
        .config
        .jwt_secret
        .as_deref()
        .ok_or_else(|| AppError::internal("Token signing is not configured"))?;

    let Some(user) = state.db.verify_credentials(&req.email, &req.password)? else {
        warn!(email = %req.email.trim(), "Failed login attempt");
        return Err(AppError::unauthorized("Invalid email or password"));
    };

    let (token, expires_at) = token::issue_token(&user, secret)?;

    state.db.log_audit(
        &Actor {
            user_id: Some(user.id),
            email: Some(user.email.clone()),
            ip_address: connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()),
        },
        AuditAction::Login,
        "users",
        Some(user.id),
        None,
        None,
    )?;
    info!(user = %user.email, "User logged in");

    Ok(Json(LoginResponse {
        token,
        expires_at: expires_at.to_rfc3339(),
        user,
    }))
}

/// GET /api/auth/me - Get the currently authenticated user
pub async fn get_me(Extension(user): Extension<AuthUser>) -> Json<MeResponse> {
    let auth_method = if user.is_local_dev() { "none" } else { "jwt" };
    Json(MeResponse {
        user,
        auth_method: auth_method.to_string(),
    })
}

/// POST /api/auth/register - Create a user
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    user.require_super_admin()?;

    let created = state.db.create_user(&req, false)?;

    state.db.log_audit(
        &user.actor(),
        AuditAction::Create,
        "users",
        Some(created.id),
        None,
        snapshot(&created).as_ref(),
    )?;
    info!(user = %created.email, role = %created.role, "Registered user");

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/auth/users - List users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<User>>, AppError> {
    user.require_super_admin()?;
    Ok(Json(state.db.list_users()?))
}

/// PUT /api/auth/users/:id - Update a user's name, email, password or role
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<UserUpdate>,
) -> Result<Json<User>, AppError> {
    user.require_super_admin()?;

    let before = state
        .db
        .get_user(id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let updated = state.db.update_user(id, &req, user.id)?;

    state.db.log_audit(
        &user.actor(),
        AuditAction::Update,
        "users",
        Some(id),
        snapshot(&before).as_ref(),
        snapshot(&updated).as_ref(),
    )?;

    Ok(Json(updated))
}

/// DELETE /api/auth/users/:id - Delete a user
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<User>, AppError> {
    user.require_super_admin()?;

    if id == user.id {
        return Err(AppError::bad_request("You cannot delete your own account"));
    }

    let deleted = state.db.delete_user(id)?;

    state.db.log_audit(
        &user.actor(),
        AuditAction::Delete,
        "users",
        Some(id),
        snapshot(&deleted).as_ref(),
        None,
    )?;
    info!(user = %deleted.email, "Deleted user");

    Ok(Json(deleted))
}

//! Kasa Web Server
//!
//! Axum-based REST API for the Kasa bookkeeping backend.
//!
//! Security features:
//! - JWT session tokens (secure by default, use --no-auth for local dev)
//! - Role checks: viewers read, admins write, super admins manage users
//! - Restrictive CORS policy
//! - Audit trail for every mutation
//! - Sanitized error responses

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use kasa_core::config::BootstrapAdmin;
use kasa_core::{notify, Actor, Config, Database, Ledger, NewUser, Role, User};

mod handlers;
mod scheduler;
pub mod token;

pub use scheduler::{start_backup_scheduler, start_settlement_scheduler, BackupScheduleConfig};

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Routes reachable without a session token
const PUBLIC_PATHS: &[&str] = &["/api/health", "/api/auth/login"];

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Secret for signing session tokens; required when auth is on
    pub jwt_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            jwt_secret: None,
        }
    }
}

impl ServerConfig {
    /// Server settings carried by the core configuration
    pub fn from_core(config: &Config) -> Self {
        Self {
            allowed_origins: config.allowed_origins.clone(),
            jwt_secret: config.jwt_secret.clone(),
            ..Default::default()
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub ledger: Arc<Ledger>,
    pub config: ServerConfig,
    /// Optional override for backup directory (for testing)
    pub backup_dir: Option<std::path::PathBuf>,
}

/// The caller of a request, resolved by `auth_middleware`
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_super_admin: bool,
    #[serde(skip)]
    pub ip_address: Option<String>,
}

impl AuthUser {
    fn from_user(user: &User, ip_address: Option<String>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            is_super_admin: user.is_super_admin,
            ip_address,
        }
    }

    /// Full access when authentication is disabled
    fn local_dev(ip_address: Option<String>) -> Self {
        Self {
            id: 0,
            email: "local-dev".to_string(),
            name: "Local Developer".to_string(),
            role: Role::Admin,
            is_super_admin: true,
            ip_address,
        }
    }

    pub fn is_local_dev(&self) -> bool {
        self.id == 0
    }

    /// Actor recorded in the audit trail
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: (!self.is_local_dev()).then_some(self.id),
            email: Some(self.email.clone()),
            ip_address: self.ip_address.clone(),
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_super_admin || self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin role required"))
        }
    }

    pub fn require_super_admin(&self) -> Result<(), AppError> {
        if self.is_super_admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Super admin required"))
        }
    }
}

/// Authentication middleware - validates the bearer token and attaches an `AuthUser`
///
/// The token's subject is looked up on every request, so deleted users and
/// role changes take effect immediately.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    mut request: Request,
    next: Next,
) -> Response {
    let ip_address = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());

    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    if !state.config.require_auth {
        request
            .extensions_mut()
            .insert(AuthUser::local_dev(ip_address));
        return next.run(request).await;
    }

    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from);

    let Some(bearer) = bearer else {
        warn!(path = %request.uri().path(), "Unauthorized request - no bearer token");
        return AppError::unauthorized("Authentication required").into_response();
    };

    let Some(secret) = state.config.jwt_secret.as_deref() else {
        error!("Authentication required but no JWT secret configured");
        return AppError::internal("Authentication is not configured").into_response();
    };

    match authenticate(&state.db, &bearer, secret) {
        Ok(mut user) => {
            user.ip_address = ip_address;
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            warn!(path = %request.uri().path(), "Rejected bearer token");
            e.into_response()
        }
    }
}

fn authenticate(db: &Database, bearer: &str, secret: &str) -> Result<AuthUser, AppError> {
    let claims = token::decode_token(bearer, secret)
        .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;
    let id: i64 = claims
        .sub
        .parse()
        .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;
    let user = db
        .get_user(id)?
        .ok_or_else(|| AppError::unauthorized("User no longer exists"))?;
    Ok(AuthUser::from_user(&user, None))
}

/// Create the initial super admin when the user table is empty
pub fn bootstrap_super_admin(db: &Database, admin: &BootstrapAdmin) -> anyhow::Result<Option<User>> {
    if db.count_users()? > 0 {
        return Ok(None);
    }

    let user = db.create_user(
        &NewUser {
            email: admin.email.clone(),
            password: admin.password.clone(),
            name: admin.name.clone(),
            role: Some(Role::Admin),
        },
        true,
    )?;
    info!(email = %user.email, "Created super admin");
    Ok(Some(user))
}

/// Create the application router
pub fn create_router(ledger: Arc<Ledger>, config: ServerConfig) -> Router {
    create_router_with_options(ledger, config, None)
}

/// Create the application router with additional options (for testing)
pub fn create_router_with_options(
    ledger: Arc<Ledger>,
    config: ServerConfig,
    backup_dir: Option<std::path::PathBuf>,
) -> Router {
    let state = Arc::new(AppState {
        db: ledger.db().clone(),
        ledger,
        config: config.clone(),
        backup_dir,
    });

    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        // Auth and user management
        .route("/auth/login", post(handlers::login))
        .route("/auth/me", get(handlers::get_me))
        .route("/auth/register", post(handlers::register_user))
        .route("/auth/users", get(handlers::list_users))
        .route(
            "/auth/users/:id",
            put(handlers::update_user).delete(handlers::delete_user),
        )
        // Ledger
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/transactions/:id",
            get(handlers::get_transaction).delete(handlers::delete_transaction),
        )
        // Categories
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/categories/:id", delete(handlers::delete_category))
        // Cash balance
        .route("/kasa", get(handlers::get_balance))
        .route("/kasa/assets", get(handlers::get_assets))
        .route("/kasa/pending", get(handlers::list_pending_settlements))
        .route("/kasa/settle", post(handlers::settle_due))
        .route("/kasa/reconcile", post(handlers::reconcile_balance))
        // Reports
        .route("/reports/monthly-summary", get(handlers::monthly_summary))
        .route(
            "/reports/category-breakdown",
            get(handlers::category_breakdown),
        )
        // Export
        .route("/export/transactions", get(handlers::export_transactions))
        .route("/export/monthly-report", get(handlers::export_monthly_report))
        // Audit
        .route("/audit/logs", get(handlers::list_audit_log))
        // Alerts
        .route("/alerts/test", post(handlers::send_test_alert))
        // Backups
        .route(
            "/backup",
            get(handlers::list_backups).post(handlers::create_backup),
        )
        .route("/backup/prune", post(handlers::prune_backups));

    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ))
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    settings: &Config,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if config.require_auth {
        if config.jwt_secret.is_none() {
            anyhow::bail!("KASA_JWT_SECRET must be set when authentication is enabled");
        }
    } else {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    }

    if let Some(admin) = &settings.bootstrap_admin {
        bootstrap_super_admin(&db, admin)?;
    }
    if db.count_users()? == 0 && config.require_auth {
        warn!("No users exist; set KASA_ADMIN_EMAIL and KASA_ADMIN_PASSWORD to create one");
    }

    let notifier = notify::from_config(settings)?;
    info!(notifier = notifier.name(), "Low-balance alerts configured");
    let ledger = Arc::new(Ledger::new(db.clone(), settings, Arc::from(notifier)));

    start_settlement_scheduler(ledger.clone());
    if let Some(backup_config) = BackupScheduleConfig::from_env() {
        start_backup_scheduler(db, backup_config);
    }

    let app = create_router(ledger, config).into_make_service_with_connect_info::<SocketAddr>();
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn new(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Client-facing errors from the core library keep their message
    fn from_core(err: &kasa_core::Error) -> Option<Self> {
        use kasa_core::Error;

        let (status, message) = match err {
            Error::Validation(m) => (StatusCode::BAD_REQUEST, m),
            Error::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            Error::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            Error::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Error::Conflict(m) => (StatusCode::CONFLICT, m),
            _ => return None,
        };
        Some(Self::new(status, message))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        if let Some(mapped) = err.downcast_ref::<kasa_core::Error>().and_then(Self::from_core) {
            return mapped;
        }
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

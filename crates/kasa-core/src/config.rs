//! Runtime configuration from environment variables
//!
//! - `KASA_MINIMUM_LIMIT`: low-balance threshold (default 10000)
//! - `KASA_ALERT_WEBHOOK`: webhook URL for alerts (unset = log only)
//! - `KASA_ALERT_RECIPIENT`: recipient label passed along with alerts
//! - `KASA_JWT_SECRET`: secret used to sign session tokens
//! - `KASA_ADMIN_EMAIL` / `KASA_ADMIN_PASSWORD` / `KASA_ADMIN_NAME`:
//!   super admin created on startup when no users exist
//! - `KASA_ALLOWED_ORIGINS`: comma-separated CORS origins

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::warn;

/// Threshold used when `KASA_MINIMUM_LIMIT` is unset or invalid
pub const DEFAULT_MINIMUM_LIMIT: i64 = 10_000;

/// Super admin to create on first start
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub minimum_threshold: Decimal,
    pub alert_webhook: Option<String>,
    pub alert_recipient: Option<String>,
    pub jwt_secret: Option<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            minimum_threshold: Decimal::from(DEFAULT_MINIMUM_LIMIT),
            alert_webhook: None,
            alert_recipient: None,
            jwt_secret: None,
            bootstrap_admin: None,
            allowed_origins: vec![],
        }
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let minimum_threshold = match get("KASA_MINIMUM_LIMIT") {
            Some(raw) => Decimal::from_str(&raw).unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid KASA_MINIMUM_LIMIT, using default");
                Decimal::from(DEFAULT_MINIMUM_LIMIT)
            }),
            None => Decimal::from(DEFAULT_MINIMUM_LIMIT),
        };

        let bootstrap_admin = match (get("KASA_ADMIN_EMAIL"), get("KASA_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                name: get("KASA_ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
            }),
            _ => None,
        };

        let allowed_origins = get("KASA_ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            minimum_threshold,
            alert_webhook: get("KASA_ALERT_WEBHOOK"),
            alert_recipient: get("KASA_ALERT_RECIPIENT"),
            jwt_secret: get("KASA_JWT_SECRET"),
            bootstrap_admin,
            allowed_origins,
        }
    }
}

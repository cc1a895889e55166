//! Server command implementation

use std::path::Path;

use anyhow::Result;
use kasa_core::Config;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
    settings: &Config,
) -> Result<()> {
    println!("🚀 Starting Kasa web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    println!("   Minimum balance: {}", settings.minimum_threshold);

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        println!("   🔒 Authentication: JWT session tokens (POST /api/auth/login)");
        if settings.jwt_secret.is_none() {
            println!("      Set KASA_JWT_SECRET to sign session tokens");
        }
    }
    if !settings.allowed_origins.is_empty() {
        println!(
            "   🌐 Allowed origins: {} (KASA_ALLOWED_ORIGINS)",
            settings.allowed_origins.join(", ")
        );
    }
    if settings.alert_webhook.is_some() {
        println!("   🔔 Alerts: webhook (KASA_ALERT_WEBHOOK)");
    } else {
        println!("   🔔 Alerts: log only (set KASA_ALERT_WEBHOOK to deliver)");
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let config = kasa_server::ServerConfig {
        require_auth: !no_auth,
        ..kasa_server::ServerConfig::from_core(settings)
    };

    kasa_server::serve_with_config(db, settings, host, port, config).await?;

    Ok(())
}

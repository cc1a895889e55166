//! Kasa CLI - Small-business bookkeeping backend
//!
//! Usage:
//!   kasa init                 Initialize database
//!   kasa serve --port 3000    Start web server
//!   kasa balance              Show the cash balance
//!   kasa settle               Apply matured card income

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let settings = kasa_core::Config::from_env();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt, &settings),
        Commands::Serve {
            port,
            host,
            no_auth,
        } => commands::cmd_serve(&cli.db, &host, port, no_auth, cli.no_encrypt, &settings).await,
        Commands::Balance { pending, json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let ledger = commands::build_ledger(db, &settings, None)?;
            commands::cmd_balance(&ledger, pending, json)
        }
        Commands::Settle { as_of } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let ledger = commands::build_ledger(db, &settings, as_of)?;
            commands::cmd_settle(&ledger).await
        }
        Commands::Reconcile { apply } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let ledger = commands::build_ledger(db, &settings, None)?;
            commands::cmd_reconcile(&ledger, apply).await
        }
        Commands::Users { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(UsersAction::List) => commands::cmd_users_list(&db),
                Some(UsersAction::Add {
                    email,
                    name,
                    password,
                    role,
                    super_admin,
                }) => commands::cmd_users_add(&db, &email, &name, &password, &role, super_admin),
                Some(UsersAction::Delete { id }) => commands::cmd_users_delete(&db, id),
            }
        }
        Commands::Backup { action } => match action {
            BackupAction::Create { name, dir } => {
                let db = commands::open_db(&cli.db, cli.no_encrypt)?;
                commands::cmd_backup_create(&db, name.as_deref(), dir)
            }
            BackupAction::List { dir } => commands::cmd_backup_list(dir),
            BackupAction::Restore { name, dir, force } => {
                commands::cmd_backup_restore(&cli.db, &name, dir, force, cli.no_encrypt)
            }
            BackupAction::Prune { keep, dir } => commands::cmd_backup_prune(keep, dir),
        },
        Commands::Export { export_type } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match export_type {
                ExportType::Transactions { output, from, to } => {
                    commands::cmd_export_transactions(&db, output.as_deref(), from, to)
                }
                ExportType::Report {
                    year,
                    month,
                    output,
                } => commands::cmd_export_report(&db, year, month, output.as_deref()),
            }
        }
    }
}

//! CSV export commands

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use kasa_core::{Actor, AuditAction, Database, TransactionExportOptions};

fn write_output(csv: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, csv)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("✅ Wrote {}", path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}

pub fn cmd_export_transactions(
    db: &Database,
    output: Option<&Path>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let csv = db.export_transactions_csv(&TransactionExportOptions { from, to })?;

    db.log_audit(
        &Actor::system("cli"),
        AuditAction::Export,
        "transactions",
        None,
        None,
        Some(&serde_json::json!({ "format": "csv", "from": from, "to": to })),
    )?;

    write_output(&csv, output)
}

pub fn cmd_export_report(
    db: &Database,
    year: Option<i32>,
    month: Option<u32>,
    output: Option<&Path>,
) -> Result<()> {
    let today = Local::now().date_naive();
    let year = year.unwrap_or_else(|| today.year());
    let month = month.unwrap_or_else(|| today.month());

    let csv = db.export_monthly_report_csv(year, month)?;

    db.log_audit(
        &Actor::system("cli"),
        AuditAction::Export,
        "reports",
        None,
        None,
        Some(&serde_json::json!({ "format": "csv", "year": year, "month": month })),
    )?;

    write_output(&csv, output)
}

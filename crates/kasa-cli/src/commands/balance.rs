//! Cash balance commands

use anyhow::Result;
use kasa_core::{Actor, Ledger};

/// Show the running total, lifetime assets and upcoming settlements
pub fn cmd_balance(ledger: &Ledger, pending_limit: i64, json: bool) -> Result<()> {
    let balance = ledger.balance()?;
    let assets = ledger.asset_summary()?;
    let pending = ledger.pending_settlements(Some(pending_limit.max(1)))?;
    let threshold = ledger.threshold();

    if json {
        let out = serde_json::json!({
            "balance": balance,
            "minimum_threshold": threshold,
            "assets": assets,
            "pending": pending,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("💰 Cash balance");
    println!("   ─────────────────────────────");
    println!("   Running total:      {:>14}", balance.running_total);
    println!("   Minimum:            {:>14}", threshold);
    if balance.running_total < threshold {
        println!("   ⚠️  Below minimum");
    }
    println!(
        "   Last updated:       {:>14}",
        balance.last_updated.format("%Y-%m-%d %H:%M")
    );
    println!();
    println!("📊 Assets");
    println!("   Total:              {:>14}", assets.total_assets);
    println!("   Pending settlement: {:>14}", assets.pending_settlement);
    println!("   Realized:           {:>14}", assets.realized);

    if pending.is_empty() {
        println!();
        println!("No card income waiting for settlement");
        return Ok(());
    }

    println!();
    println!("⏳ Pending settlements");
    println!("{:<6} {:>12} {:<12} {:>5}  DESCRIPTION", "ID", "AMOUNT", "SETTLES", "DAYS");
    println!("{}", "-".repeat(60));
    for item in pending {
        println!(
            "{:<6} {:>12} {:<12} {:>5}  {}",
            item.id,
            item.amount,
            item.settlement_date.to_string(),
            item.days_remaining,
            item.description.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

/// Apply card income that has matured
pub async fn cmd_settle(ledger: &Ledger) -> Result<()> {
    println!("Settling card income due by {}...", ledger.today());

    let result = ledger.settle_due().await?;

    if result.settled_count == 0 {
        println!("Nothing to settle");
    } else {
        println!(
            "✅ Settled {} transaction(s) totalling {}",
            result.settled_count, result.settled_amount
        );
    }
    println!("   Running total: {}", result.running_total);

    Ok(())
}

/// Compare the stored balance with the ledger, optionally fixing drift
pub async fn cmd_reconcile(ledger: &Ledger, apply: bool) -> Result<()> {
    let report = ledger.reconcile(apply, &Actor::system("cli")).await?;

    println!("Stored total:   {}", report.stored);
    println!("Ledger total:   {}", report.expected);

    if report.drift.is_zero() {
        println!("✅ Balance matches the ledger");
    } else if report.corrected {
        println!("🔧 Corrected drift of {}", report.drift);
    } else {
        println!("⚠️  Drift of {} (run with --apply to correct)", report.drift);
    }

    Ok(())
}

//! The running cash balance ("kasa")
//!
//! Every change to the total is a single `UPDATE ... SET total = total + ?`
//! statement, issued on the same SQL transaction as the ledger change that
//! caused it.

use chrono::NaiveDate;
use rusqlite::{params, Connection, TransactionBehavior};
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{CashBalance, ReconcileReport, SettleResult};
use crate::money::{from_cents, to_cents};

/// Add a signed delta to the running total, returning the new total in cents
pub(crate) fn apply_delta(conn: &Connection, delta_cents: i64) -> Result<i64> {
    let total = conn.query_row(
        r#"
        UPDATE cash_balance
        SET running_total_cents = running_total_cents + ?,
            last_updated = CURRENT_TIMESTAMP
        WHERE id = 1
        RETURNING running_total_cents
        "#,
        params![delta_cents],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub(crate) fn read_total(conn: &Connection) -> Result<i64> {
    let total = conn.query_row(
        "SELECT running_total_cents FROM cash_balance WHERE id = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(total)
}

/// Apply every matured deferred income that is not yet in the total
///
/// Returns the number of rows settled and their sum in cents.
pub(crate) fn sweep(conn: &Connection, today: NaiveDate) -> Result<(usize, i64)> {
    let today = today.to_string();

    let due_cents: i64 = conn.query_row(
        r#"
        SELECT COALESCE(SUM(amount_cents), 0)
        FROM transactions
        WHERE balance_applied = 0 AND kind = 'income' AND settlement_date <= ?
        "#,
        params![today],
        |row| row.get(0),
    )?;

    let settled = conn.execute(
        r#"
        UPDATE transactions SET balance_applied = 1
        WHERE balance_applied = 0 AND kind = 'income' AND settlement_date <= ?
        "#,
        params![today],
    )?;

    if settled > 0 {
        apply_delta(conn, due_cents)?;
    }

    Ok((settled, due_cents))
}

/// Signed sum of everything that should be in the drawer on `today`
///
/// Expenses count whatever their date; income counts once it has settled.
fn ledger_total(conn: &Connection, today: NaiveDate) -> Result<i64> {
    let total = conn.query_row(
        r#"
        SELECT COALESCE(SUM(CASE
            WHEN kind = 'expense' THEN -amount_cents
            WHEN settlement_date <= ? THEN amount_cents
            ELSE 0
        END), 0)
        FROM transactions
        "#,
        params![today.to_string()],
        |row| row.get(0),
    )?;
    Ok(total)
}

/// Income marked as applied although it settles after `today`
fn premature_count(conn: &Connection, today: NaiveDate) -> Result<i64> {
    let count = conn.query_row(
        r#"
        SELECT COUNT(*) FROM transactions
        WHERE balance_applied = 1 AND kind = 'income' AND settlement_date > ?
        "#,
        params![today.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

impl Database {
    /// Get the current cash balance
    pub fn get_balance(&self) -> Result<CashBalance> {
        let conn = self.conn()?;
        let (cents, updated): (i64, String) = conn.query_row(
            "SELECT running_total_cents, last_updated FROM cash_balance WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(CashBalance {
            running_total: from_cents(cents),
            last_updated: parse_datetime(&updated),
        })
    }

    /// Atomically add a signed amount to the running total
    pub fn apply_balance_delta(&self, delta: Decimal) -> Result<Decimal> {
        let delta_cents = to_cents(delta)?;
        let conn = self.conn()?;
        Ok(from_cents(apply_delta(&conn, delta_cents)?))
    }

    /// Apply all deferred income whose settlement date has arrived
    pub fn settle_due(&self, today: NaiveDate) -> Result<SettleResult> {
        self.settle_due_checked(today, |_| ())
            .map(|(result, _)| result)
    }

    /// `settle_due`, running `on_total` before the commit when anything settled
    pub(crate) fn settle_due_checked<T>(
        &self,
        today: NaiveDate,
        on_total: impl FnOnce(i64) -> T,
    ) -> Result<(SettleResult, Option<T>)> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (settled_count, settled_cents) = sweep(&tx, today)?;
        let total = read_total(&tx)?;
        let checked = (settled_count > 0).then(|| on_total(total));
        tx.commit()?;

        if settled_count > 0 {
            info!(
                settled_count,
                amount = %from_cents(settled_cents),
                "Applied matured card settlements"
            );
        }

        Ok((
            SettleResult {
                settled_count,
                settled_amount: from_cents(settled_cents),
                running_total: from_cents(total),
            },
            checked,
        ))
    }

    /// Compare the stored total with the one derived from the ledger
    ///
    /// The expected total follows the settlement rule directly: income whose
    /// settlement date is on or before `today`, minus every expense. With
    /// `apply`, the stored total is overwritten by the derived one and income
    /// flagged as applied ahead of its settlement date goes back to pending.
    pub fn reconcile(&self, today: NaiveDate, apply: bool) -> Result<ReconcileReport> {
        self.reconcile_checked(today, apply, |_| ())
            .map(|(report, _)| report)
    }

    /// `reconcile`, running `on_total` on a correction before the commit
    pub(crate) fn reconcile_checked<T>(
        &self,
        today: NaiveDate,
        apply: bool,
        on_total: impl FnOnce(i64) -> T,
    ) -> Result<(ReconcileReport, Option<T>)> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        sweep(&tx, today)?;

        let stored = read_total(&tx)?;
        let expected = ledger_total(&tx, today)?;
        let drift = stored - expected;
        let premature = premature_count(&tx, today)?;
        let corrected = apply && (drift != 0 || premature > 0);

        let mut checked = None;
        if corrected {
            tx.execute(
                r#"
                UPDATE transactions SET balance_applied = 0
                WHERE balance_applied = 1 AND kind = 'income' AND settlement_date > ?
                "#,
                params![today.to_string()],
            )?;
            tx.execute(
                r#"
                UPDATE cash_balance
                SET running_total_cents = ?, last_updated = CURRENT_TIMESTAMP
                WHERE id = 1
                "#,
                params![expected],
            )?;
            checked = Some(on_total(expected));
        }
        tx.commit()?;

        if drift != 0 || premature > 0 {
            warn!(
                stored = %from_cents(stored),
                expected = %from_cents(expected),
                premature,
                corrected,
                "Cash balance drift detected"
            );
        }

        Ok((
            ReconcileReport {
                stored: from_cents(stored),
                expected: from_cents(expected),
                drift: from_cents(drift),
                corrected,
            },
            checked,
        ))
    }
}

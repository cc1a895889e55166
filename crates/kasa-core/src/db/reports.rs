//! Reporting queries

use chrono::{Datelike, NaiveDate};
use rusqlite::params;
use rust_decimal::Decimal;

use super::{parse_date, Database};
use crate::error::{Error, Result};
use crate::models::{
    AssetSummary, CategoryBreakdown, MonthlySummary, PendingSettlement, TransactionKind,
};
use crate::money::from_cents;
use crate::settlement::days_remaining;

/// Half-open date window `[first of month, first of next month)`
pub fn month_window(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::Validation(format!("Invalid month: {}-{}", year, month)))?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .ok_or_else(|| Error::Validation(format!("Invalid month: {}-{}", year, month)))?;
    Ok((start, end))
}

impl Database {
    /// Sum of one kind over `[from, to)` by transaction date
    pub fn sum_by_kind_and_window(
        &self,
        kind: TransactionKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Decimal> {
        let conn = self.conn()?;
        let cents: i64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0)
            FROM transactions
            WHERE kind = ? AND transaction_date >= ? AND transaction_date < ?
            "#,
            params![kind.as_str(), from.to_string(), to.to_string()],
            |row| row.get(0),
        )?;
        Ok(from_cents(cents))
    }

    /// Income, expense and counts for one calendar month
    pub fn monthly_summary(&self, year: i32, month: u32) -> Result<MonthlySummary> {
        let (from, to) = month_window(year, month)?;
        let conn = self.conn()?;

        let (income_cents, income_count, expense_cents, expense_count): (i64, i64, i64, i64) =
            conn.query_row(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN kind = 'income' THEN amount_cents END), 0),
                    COUNT(CASE WHEN kind = 'income' THEN 1 END),
                    COALESCE(SUM(CASE WHEN kind = 'expense' THEN amount_cents END), 0),
                    COUNT(CASE WHEN kind = 'expense' THEN 1 END)
                FROM transactions
                WHERE transaction_date >= ? AND transaction_date < ?
                "#,
                params![from.to_string(), to.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        Ok(MonthlySummary {
            year: from.year(),
            month: from.month(),
            total_income: from_cents(income_cents),
            total_expense: from_cents(expense_cents),
            net: from_cents(income_cents - expense_cents),
            income_count,
            expense_count,
        })
    }

    /// Per-category totals for one calendar month, largest first
    pub fn category_breakdown(&self, year: i32, month: u32) -> Result<Vec<CategoryBreakdown>> {
        let (from, to) = month_window(year, month)?;
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.name, c.kind,
                   COALESCE(SUM(t.amount_cents), 0) AS total,
                   COUNT(t.id)
            FROM categories c
            LEFT JOIN transactions t
                ON t.category_id = c.id
               AND t.transaction_date >= ?
               AND t.transaction_date < ?
            GROUP BY c.id, c.name, c.kind
            ORDER BY total DESC, c.name
            "#,
        )?;

        let rows = stmt
            .query_map(params![from.to_string(), to.to_string()], |row| {
                let kind_str: String = row.get(2)?;
                Ok(CategoryBreakdown {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    kind: kind_str.parse().unwrap_or(TransactionKind::Expense),
                    total: from_cents(row.get(3)?),
                    count: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Lifetime totals, split into realized and still-pending card income
    pub fn asset_summary(&self, today: NaiveDate) -> Result<AssetSummary> {
        let conn = self.conn()?;

        let (net_cents, pending_cents): (i64, i64) = conn.query_row(
            r#"
            SELECT
                COALESCE(SUM(CASE kind WHEN 'income' THEN amount_cents ELSE -amount_cents END), 0),
                COALESCE(SUM(CASE WHEN kind = 'income' AND income_method = 'pos'
                                   AND settlement_date > ? THEN amount_cents END), 0)
            FROM transactions
            "#,
            params![today.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(AssetSummary {
            total_assets: from_cents(net_cents),
            pending_settlement: from_cents(pending_cents),
            realized: from_cents(net_cents - pending_cents),
        })
    }

    /// Card income that settles after `today`, soonest first
    pub fn pending_settlements(
        &self,
        today: NaiveDate,
        limit: Option<i64>,
    ) -> Result<Vec<PendingSettlement>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, amount_cents, description, transaction_date, settlement_date
            FROM transactions
            WHERE kind = 'income' AND income_method = 'pos' AND settlement_date > ?
            ORDER BY settlement_date ASC, id ASC
            LIMIT ?
            "#,
        )?;

        // SQLite treats a negative LIMIT as unbounded
        let rows = stmt
            .query_map(params![today.to_string(), limit.unwrap_or(-1)], |row| {
                let date_str: String = row.get(3)?;
                let settlement_str: String = row.get(4)?;
                let settlement_date = parse_date(&settlement_str);
                Ok(PendingSettlement {
                    id: row.get(0)?,
                    amount: from_cents(row.get(1)?),
                    description: row.get(2)?,
                    transaction_date: parse_date(&date_str),
                    settlement_date,
                    days_remaining: days_remaining(settlement_date, today),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

//! Ledger entry operations
//!
//! Inserts and deletes run on a `BEGIN IMMEDIATE` transaction together with
//! the settlement sweep, the balance delta and the audit row, so the ledger
//! and the running total never diverge.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::audit::insert_audit;
use super::balance::{apply_delta, read_total, sweep};
use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Actor, AuditAction, LedgerRow, Transaction, TransactionKind};
use crate::money::{from_cents, to_cents};

const SELECT_TRANSACTION: &str = r#"
    SELECT t.id, t.amount_cents, t.kind, t.income_method, t.transaction_date,
           t.settlement_date, t.category_id, c.name, t.description,
           t.balance_applied, t.created_at
    FROM transactions t
    LEFT JOIN categories c ON c.id = t.category_id
"#;

/// Filters for listing ledger entries
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    /// Inclusive lower bound on the transaction date
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the transaction date
    pub to: Option<NaiveDate>,
    pub kind: Option<TransactionKind>,
    pub category_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    let kind_str: String = row.get(2)?;
    let method_str: Option<String> = row.get(3)?;
    let date_str: String = row.get(4)?;
    let settlement_str: String = row.get(5)?;
    let created_at_str: String = row.get(10)?;

    Ok(Transaction {
        id: row.get(0)?,
        amount: from_cents(row.get(1)?),
        kind: kind_str.parse().unwrap_or(TransactionKind::Expense),
        income_method: method_str.and_then(|m| m.parse().ok()),
        transaction_date: parse_date(&date_str),
        settlement_date: parse_date(&settlement_str),
        category_id: row.get(6)?,
        category_name: row.get(7)?,
        description: row.get(8)?,
        balance_applied: row.get(9)?,
        created_at: parse_datetime(&created_at_str),
    })
}

fn fetch_transaction(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    let sql = format!("{} WHERE t.id = ?", SELECT_TRANSACTION);
    let transaction = conn
        .query_row(&sql, params![id], row_to_transaction)
        .optional()?;
    Ok(transaction)
}

impl Database {
    /// Insert a validated ledger row and apply its balance effect
    ///
    /// Returns the stored transaction and the new running total in cents.
    pub(crate) fn insert_transaction(
        &self,
        row: &LedgerRow,
        today: NaiveDate,
        actor: &Actor,
    ) -> Result<(Transaction, i64)> {
        self.insert_transaction_checked(row, today, actor, |_| ())
            .map(|(transaction, total, ())| (transaction, total))
    }

    /// `insert_transaction`, running `on_total` with the new total while the
    /// write lock is still held
    ///
    /// Writers are serialized by `BEGIN IMMEDIATE`, so `on_total` sees the
    /// totals in commit order.
    pub(crate) fn insert_transaction_checked<T>(
        &self,
        row: &LedgerRow,
        today: NaiveDate,
        actor: &Actor,
        on_total: impl FnOnce(i64) -> T,
    ) -> Result<(Transaction, i64, T)> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        sweep(&tx, today)?;

        if let Some(category_id) = row.category_id {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?)",
                params![category_id],
                |r| r.get(0),
            )?;
            if !exists {
                return Err(Error::Validation(format!(
                    "Category {} does not exist",
                    category_id
                )));
            }
        }

        tx.execute(
            r#"
            INSERT INTO transactions
                (category_id, amount_cents, description, kind, income_method,
                 transaction_date, settlement_date, balance_applied)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                row.category_id,
                row.amount_cents,
                row.description,
                row.kind.as_str(),
                row.income_method.map(|m| m.as_str()),
                row.transaction_date.to_string(),
                row.settlement_date.to_string(),
                row.balance_applied,
            ],
        )?;
        let id = tx.last_insert_rowid();

        let total = if row.balance_applied {
            apply_delta(&tx, row.kind.signed(row.amount_cents))?
        } else {
            read_total(&tx)?
        };

        let transaction = fetch_transaction(&tx, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;

        let snapshot = serde_json::to_value(&transaction)?;
        insert_audit(
            &tx,
            actor,
            AuditAction::Create,
            "transactions",
            Some(id),
            None,
            Some(&snapshot),
        )?;

        let checked = on_total(total);
        tx.commit()?;
        Ok((transaction, total, checked))
    }

    /// Delete a ledger entry and reverse whatever it contributed to the balance
    ///
    /// A deferred income that has not settled yet contributed nothing, so
    /// deleting it leaves the total unchanged.
    pub(crate) fn delete_transaction(
        &self,
        id: i64,
        today: NaiveDate,
        actor: &Actor,
    ) -> Result<(Transaction, i64)> {
        self.delete_transaction_checked(id, today, actor, |_| ())
            .map(|(transaction, total, ())| (transaction, total))
    }

    /// `delete_transaction`, running `on_total` before the commit
    pub(crate) fn delete_transaction_checked<T>(
        &self,
        id: i64,
        today: NaiveDate,
        actor: &Actor,
        on_total: impl FnOnce(i64) -> T,
    ) -> Result<(Transaction, i64, T)> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        sweep(&tx, today)?;

        let transaction = fetch_transaction(&tx, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;

        tx.execute("DELETE FROM transactions WHERE id = ?", params![id])?;

        let total = if transaction.balance_applied {
            let cents = to_cents(transaction.amount)?;
            apply_delta(&tx, -transaction.kind.signed(cents))?
        } else {
            read_total(&tx)?
        };

        let snapshot = serde_json::to_value(&transaction)?;
        insert_audit(
            &tx,
            actor,
            AuditAction::Delete,
            "transactions",
            Some(id),
            Some(&snapshot),
            None,
        )?;

        let checked = on_total(total);
        tx.commit()?;
        Ok((transaction, total, checked))
    }

    /// Get a single transaction by ID
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        fetch_transaction(&conn, id)
    }

    /// List transactions, newest transaction date first
    pub fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let mut sql = format!("{} WHERE 1=1", SELECT_TRANSACTION);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(from) = query.from {
            sql.push_str(" AND t.transaction_date >= ?");
            params_vec.push(Box::new(from.to_string()));
        }

        if let Some(to) = query.to {
            sql.push_str(" AND t.transaction_date <= ?");
            params_vec.push(Box::new(to.to_string()));
        }

        if let Some(kind) = query.kind {
            sql.push_str(" AND t.kind = ?");
            params_vec.push(Box::new(kind.as_str()));
        }

        if let Some(category_id) = query.category_id {
            sql.push_str(" AND t.category_id = ?");
            params_vec.push(Box::new(category_id));
        }

        sql.push_str(" ORDER BY t.transaction_date DESC, t.created_at DESC, t.id DESC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ? OFFSET ?");
            params_vec.push(Box::new(limit));
            params_vec.push(Box::new(query.offset.unwrap_or(0)));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(params_refs.as_slice(), row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }
}

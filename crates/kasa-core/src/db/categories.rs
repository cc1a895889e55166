//! Category operations

use rusqlite::{params, OptionalExtension, TransactionBehavior};

use super::audit::insert_audit;
use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Actor, AuditAction, Category, NewCategory, TransactionKind};

fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
    let kind_str: String = row.get(2)?;
    let created_at_str: String = row.get(3)?;
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: kind_str.parse().unwrap_or(TransactionKind::Expense),
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Create a category and its audit row.
    ///
    /// Names are unique per kind, compared case-insensitively.
    pub fn create_category(&self, new: &NewCategory, actor: &Actor) -> Result<Category> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Category name is required".to_string()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE name = ? COLLATE NOCASE AND kind = ?)",
            params![name, new.kind.as_str()],
            |row| row.get(0),
        )?;
        if taken {
            return Err(Error::Conflict(format!(
                "{} category '{}' already exists",
                new.kind.as_str(),
                name
            )));
        }

        tx.execute(
            "INSERT INTO categories (name, kind) VALUES (?, ?)",
            params![name, new.kind.as_str()],
        )?;
        let id = tx.last_insert_rowid();

        let category = tx.query_row(
            "SELECT id, name, kind, created_at FROM categories WHERE id = ?",
            params![id],
            row_to_category,
        )?;
        insert_audit(
            &tx,
            actor,
            AuditAction::Create,
            "categories",
            Some(id),
            None,
            Some(&serde_json::to_value(&category)?),
        )?;
        tx.commit()?;
        Ok(category)
    }

    /// Get a category by ID
    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, kind, created_at FROM categories WHERE id = ?",
                params![id],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// List categories ordered by kind, then name
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, kind, created_at FROM categories ORDER BY kind, name")?;
        let categories = stmt
            .query_map([], row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Delete a category that no transaction references, with its audit row
    pub fn delete_category(&self, id: i64, actor: &Actor) -> Result<Category> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let category = tx
            .query_row(
                "SELECT id, name, kind, created_at FROM categories WHERE id = ?",
                params![id],
                row_to_category,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Category {}", id)))?;

        let in_use: i64 = tx.query_row(
            "SELECT COUNT(*) FROM transactions WHERE category_id = ?",
            params![id],
            |row| row.get(0),
        )?;
        if in_use > 0 {
            return Err(Error::Conflict(format!(
                "Category '{}' is used by {} transaction(s)",
                category.name, in_use
            )));
        }

        tx.execute("DELETE FROM categories WHERE id = ?", params![id])?;
        insert_audit(
            &tx,
            actor,
            AuditAction::Delete,
            "categories",
            Some(id),
            Some(&serde_json::to_value(&category)?),
            None,
        )?;
        tx.commit()?;
        Ok(category)
    }
}

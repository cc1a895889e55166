//! Audit trail operations

use rusqlite::{params, Connection};

use super::Database;
use crate::error::Result;
use crate::models::{Actor, AuditAction, AuditEntry, AuditFilter};

/// Default number of entries returned when no limit is given
pub const DEFAULT_AUDIT_LIMIT: i64 = 100;

/// Insert an audit row on an existing connection or transaction
pub(crate) fn insert_audit(
    conn: &Connection,
    actor: &Actor,
    action: AuditAction,
    table_name: &str,
    record_id: Option<i64>,
    old_data: Option<&serde_json::Value>,
    new_data: Option<&serde_json::Value>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO audit_log (user_id, user_email, action, table_name, record_id, old_data, new_data, ip_address)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            actor.user_id,
            actor.email,
            action.as_str(),
            table_name,
            record_id,
            old_data.map(|v| v.to_string()),
            new_data.map(|v| v.to_string()),
            actor.ip_address,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Log an audit event
    pub fn log_audit(
        &self,
        actor: &Actor,
        action: AuditAction,
        table_name: &str,
        record_id: Option<i64>,
        old_data: Option<&serde_json::Value>,
        new_data: Option<&serde_json::Value>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        insert_audit(
            &conn, actor, action, table_name, record_id, old_data, new_data,
        )
    }

    /// List audit log entries, newest first
    pub fn list_audit_log(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let conn = self.conn()?;

        let mut sql = String::from(
            r#"
            SELECT a.id, a.created_at, a.user_id, a.user_email, u.name, a.action,
                   a.table_name, a.record_id, a.old_data, a.new_data, a.ip_address
            FROM audit_log a
            LEFT JOIN users u ON u.id = a.user_id
            WHERE 1=1
            "#,
        );

        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(user_id) = filter.user_id {
            sql.push_str(" AND a.user_id = ?");
            params_vec.push(Box::new(user_id));
        }

        if let Some(table_name) = &filter.table_name {
            sql.push_str(" AND a.table_name = ?");
            params_vec.push(Box::new(table_name.clone()));
        }

        if let Some(action) = &filter.action {
            sql.push_str(" AND a.action = ?");
            params_vec.push(Box::new(action.to_uppercase()));
        }

        if let Some(start) = &filter.start_date {
            sql.push_str(" AND date(a.created_at) >= date(?)");
            params_vec.push(Box::new(start.clone()));
        }

        if let Some(end) = &filter.end_date {
            sql.push_str(" AND date(a.created_at) <= date(?)");
            params_vec.push(Box::new(end.clone()));
        }

        sql.push_str(" ORDER BY a.created_at DESC, a.id DESC LIMIT ?");
        params_vec.push(Box::new(filter.limit.unwrap_or(DEFAULT_AUDIT_LIMIT)));

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_refs.as_slice(), |row| {
                let old_json: Option<String> = row.get(8)?;
                let new_json: Option<String> = row.get(9)?;
                Ok(AuditEntry {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    user_id: row.get(2)?,
                    user_email: row.get(3)?,
                    user_name: row.get(4)?,
                    action: row.get(5)?,
                    table_name: row.get(6)?,
                    record_id: row.get(7)?,
                    old_data: old_json.and_then(|j| serde_json::from_str(&j).ok()),
                    new_data: new_json.and_then(|j| serde_json::from_str(&j).ok()),
                    ip_address: row.get(10)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

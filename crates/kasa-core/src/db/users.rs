//! User account operations

use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_datetime, Database};
use crate::auth::{
    hash_password, validate_password, verify_password, verify_password_against_dummy,
};
use crate::error::{Error, Result};
use crate::models::{NewUser, Role, User, UserUpdate};

const SELECT_USER: &str =
    "SELECT id, email, name, role, is_super_admin, created_at, updated_at FROM users";

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let role_str: String = row.get(3)?;
    let created_at_str: String = row.get(5)?;
    let updated_at_str: String = row.get(6)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: role_str.parse().unwrap_or_default(),
        is_super_admin: row.get(4)?,
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
    })
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::Validation("A valid email is required".to_string()));
    }
    Ok(email)
}

fn email_taken(conn: &Connection, email: &str, except_id: Option<i64>) -> Result<bool> {
    let taken = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? AND id != ?)",
        params![email, except_id.unwrap_or(0)],
        |row| row.get(0),
    )?;
    Ok(taken)
}

impl Database {
    /// Create a user with a hashed password
    pub fn create_user(&self, new: &NewUser, is_super_admin: bool) -> Result<User> {
        let email = normalize_email(&new.email)?;
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Name is required".to_string()));
        }
        validate_password(&new.password)?;

        let role = if is_super_admin {
            Role::Admin
        } else {
            new.role.unwrap_or_default()
        };
        let password_hash = hash_password(&new.password)?;

        let conn = self.conn()?;
        if email_taken(&conn, &email, None)? {
            return Err(Error::Conflict(format!("Email already registered: {}", email)));
        }

        conn.execute(
            r#"
            INSERT INTO users (email, password_hash, name, role, is_super_admin)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![email, password_hash, name, role.as_str(), is_super_admin],
        )?;
        let id = conn.last_insert_rowid();

        let sql = format!("{} WHERE id = ?", SELECT_USER);
        Ok(conn.query_row(&sql, params![id], row_to_user)?)
    }

    /// Get a user by ID
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE id = ?", SELECT_USER);
        Ok(conn.query_row(&sql, params![id], row_to_user).optional()?)
    }

    /// Look up a user by email and check the password
    ///
    /// Returns `None` for an unknown email or a wrong password alike. Both
    /// paths run one argon2 verification.
    pub fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        let conn = self.conn()?;

        let found = conn
            .query_row(
                "SELECT id, email, name, role, is_super_admin, created_at, updated_at, password_hash \
                 FROM users WHERE email = ?",
                params![email],
                |row| Ok((row_to_user(row)?, row.get::<_, String>(7)?)),
            )
            .optional()?;

        let verified = match found {
            Some((user, hash)) => verify_password(password, &hash).then_some(user),
            None => {
                verify_password_against_dummy(password);
                None
            }
        };
        Ok(verified)
    }

    /// List users, oldest first
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let sql = format!("{} ORDER BY created_at, id", SELECT_USER);
        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn count_users(&self) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    /// Update a user
    ///
    /// A super admin can only be edited by themselves, and their role never
    /// changes.
    pub fn update_user(&self, id: i64, update: &UserUpdate, acting_user_id: i64) -> Result<User> {
        let existing = self
            .get_user(id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", id)))?;

        if existing.is_super_admin && acting_user_id != id {
            return Err(Error::Forbidden(
                "A super admin can only be updated by themselves".to_string(),
            ));
        }

        let email = update.email.as_deref().map(normalize_email).transpose()?;
        let name = update.name.as_deref().map(str::trim);
        if name.is_some_and(str::is_empty) {
            return Err(Error::Validation("Name is required".to_string()));
        }
        let password_hash = match &update.password {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };
        // The super admin's role is fixed
        let role = update.role.filter(|_| !existing.is_super_admin);

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if let Some(email) = &email {
            if email_taken(&tx, email, Some(id))? {
                return Err(Error::Conflict(format!("Email already registered: {}", email)));
            }
        }

        tx.execute(
            r#"
            UPDATE users SET
                email = COALESCE(?, email),
                name = COALESCE(?, name),
                password_hash = COALESCE(?, password_hash),
                role = COALESCE(?, role),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            params![email, name, password_hash, role.map(|r| r.as_str()), id],
        )?;

        let sql = format!("{} WHERE id = ?", SELECT_USER);
        let user = tx.query_row(&sql, params![id], row_to_user)?;
        tx.commit()?;
        Ok(user)
    }

    /// Delete a user; super admins cannot be deleted
    pub fn delete_user(&self, id: i64) -> Result<User> {
        let user = self
            .get_user(id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", id)))?;

        if user.is_super_admin {
            return Err(Error::Forbidden("A super admin cannot be deleted".to_string()));
        }

        let conn = self.conn()?;
        conn.execute("DELETE FROM users WHERE id = ?", params![id])?;
        Ok(user)
    }
}

//! User management commands

use anyhow::{Context, Result};
use kasa_core::{Actor, AuditAction, Database, NewUser, Role};

pub fn cmd_users_list(db: &Database) -> Result<()> {
    let users = db.list_users()?;

    if users.is_empty() {
        println!("No users. Create one with: kasa users add --email ... --name ... --password ...");
        return Ok(());
    }

    println!("{:<5} {:<30} {:<20} {:<8}", "ID", "EMAIL", "NAME", "ROLE");
    println!("{}", "-".repeat(70));
    for user in users {
        let marker = if user.is_super_admin { " ★" } else { "" };
        println!(
            "{:<5} {:<30} {:<20} {:<8}{}",
            user.id, user.email, user.name, user.role, marker
        );
    }

    Ok(())
}

pub fn cmd_users_add(
    db: &Database,
    email: &str,
    name: &str,
    password: &str,
    role: &str,
    super_admin: bool,
) -> Result<()> {
    let role: Role = role.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let user = db
        .create_user(
            &NewUser {
                email: email.to_string(),
                password: password.to_string(),
                name: name.to_string(),
                role: Some(role),
            },
            super_admin,
        )
        .context("Failed to create user")?;

    db.log_audit(
        &Actor::system("cli"),
        AuditAction::Create,
        "users",
        Some(user.id),
        None,
        Some(&serde_json::to_value(&user)?),
    )?;

    println!("✅ Created user {} ({}) with role {}", user.email, user.id, user.role);
    if user.is_super_admin {
        println!("   ★ Super admin");
    }

    Ok(())
}

pub fn cmd_users_delete(db: &Database, id: i64) -> Result<()> {
    let user = db.delete_user(id).context("Failed to delete user")?;

    db.log_audit(
        &Actor::system("cli"),
        AuditAction::Delete,
        "users",
        Some(id),
        Some(&serde_json::to_value(&user)?),
        None,
    )?;

    println!("🗑️  Deleted user {} ({})", user.email, user.id);
    Ok(())
}

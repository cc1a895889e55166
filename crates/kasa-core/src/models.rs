//! Domain models for Kasa

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether money came in or went out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// Sign an amount in cents by its effect on the cash balance
    pub fn signed(&self, cents: i64) -> i64 {
        match self {
            Self::Income => cents,
            Self::Expense => -cents,
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an income reaches the cash balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum IncomeMethod {
    /// Cash or transfer, recognized on the transaction date
    #[default]
    #[serde(rename = "normal", alias = "immediate")]
    Immediate,
    /// Card/POS payment, recognized after the settlement float
    #[serde(rename = "pos", alias = "card_deferred")]
    CardDeferred,
}

impl IncomeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "normal",
            Self::CardDeferred => "pos",
        }
    }
}

impl std::str::FromStr for IncomeMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" | "immediate" => Ok(Self::Immediate),
            "pos" | "card_deferred" | "card" => Ok(Self::CardDeferred),
            _ => Err(format!("Unknown income method: {}", s)),
        }
    }
}

impl std::fmt::Display for IncomeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub amount: Decimal,
    pub kind: TransactionKind,
    /// Only set for income
    pub income_method: Option<IncomeMethod>,
    pub transaction_date: NaiveDate,
    /// Date the amount is recognized in the cash balance
    pub settlement_date: NaiveDate,
    pub category_id: Option<i64>,
    /// Resolved from the categories table when listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    pub description: Option<String>,
    /// Whether the amount is currently reflected in the running total
    pub balance_applied: bool,
    pub created_at: DateTime<Utc>,
}

/// A transaction to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: Decimal,
    pub kind: TransactionKind,
    #[serde(default)]
    pub income_method: Option<IncomeMethod>,
    /// Defaults to today when omitted
    #[serde(default)]
    pub transaction_date: Option<NaiveDate>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewTransaction {
    pub fn income(amount: Decimal, method: IncomeMethod, date: NaiveDate) -> Self {
        Self {
            amount,
            kind: TransactionKind::Income,
            income_method: Some(method),
            transaction_date: Some(date),
            category_id: None,
            description: None,
        }
    }

    pub fn expense(amount: Decimal, date: NaiveDate) -> Self {
        Self {
            amount,
            kind: TransactionKind::Expense,
            income_method: None,
            transaction_date: Some(date),
            category_id: None,
            description: None,
        }
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// A validated row ready for insertion
#[derive(Debug, Clone)]
pub(crate) struct LedgerRow {
    pub amount_cents: i64,
    pub kind: TransactionKind,
    pub income_method: Option<IncomeMethod>,
    pub transaction_date: NaiveDate,
    pub settlement_date: NaiveDate,
    pub category_id: Option<i64>,
    pub description: Option<String>,
    pub balance_applied: bool,
}

/// A transaction category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub kind: TransactionKind,
}

/// The single running cash-on-hand total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashBalance {
    pub running_total: Decimal,
    pub last_updated: DateTime<Utc>,
}

/// A card payment still waiting for settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSettlement {
    pub id: i64,
    pub amount: Decimal,
    pub description: Option<String>,
    pub transaction_date: NaiveDate,
    pub settlement_date: NaiveDate,
    pub days_remaining: i64,
}

/// Lifetime totals across the whole ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    /// All income minus all expenses
    pub total_assets: Decimal,
    /// Card income not yet settled
    pub pending_settlement: Decimal,
    /// `total_assets - pending_settlement`
    pub realized: Decimal,
}

/// Totals for one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub net: Decimal,
    pub income_count: i64,
    pub expense_count: i64,
}

/// Per-category totals for a month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub id: i64,
    pub name: String,
    pub kind: TransactionKind,
    pub total: Decimal,
    pub count: i64,
}

/// Result of applying matured deferred income
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettleResult {
    pub settled_count: usize,
    pub settled_amount: Decimal,
    pub running_total: Decimal,
}

/// Stored vs. ledger-derived balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub stored: Decimal,
    pub expected: Decimal,
    /// `stored - expected`
    pub drift: Decimal,
    /// Whether the stored total was overwritten
    pub corrected: bool,
}

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Viewer => "viewer",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "viewer" => Ok(Self::Viewer),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An application user (password hash never leaves the db layer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_super_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Partial user update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
}

/// Audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub created_at: String,
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
    /// Resolved from the users table when the user still exists
    pub user_name: Option<String>,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<i64>,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}

/// Who performed an audited action
#[derive(Debug, Clone, Default)]
pub struct Actor {
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub ip_address: Option<String>,
}

impl Actor {
    pub fn system(name: &str) -> Self {
        Self {
            user_id: None,
            email: Some(name.to_string()),
            ip_address: None,
        }
    }
}

/// Audit actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Export,
    Backup,
    Reconcile,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Login => "LOGIN",
            Self::Export => "EXPORT",
            Self::Backup => "BACKUP",
            Self::Reconcile => "RECONCILE",
        }
    }
}

/// Filters for listing the audit trail
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub user_id: Option<i64>,
    pub table_name: Option<String>,
    pub action: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<i64>,
}

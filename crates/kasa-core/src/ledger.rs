//! Ledger service
//!
//! Entry point for every operation that moves the cash balance. Validates
//! input, applies the settlement policy and writes through the store in a
//! single unit of work. The low-balance monitor is evaluated inside that unit
//! of work; the notification goes out after the commit.

use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::models::{
    Actor, AssetSummary, AuditAction, CashBalance, LedgerRow, NewTransaction, PendingSettlement,
    ReconcileReport, SettleResult, Transaction, TransactionKind,
};
use crate::monitor::{ThresholdMonitor, Transition};
use crate::money::{amount_to_cents, from_cents};
use crate::notify::Notifier;
use crate::settlement::{effective_income_method, is_settled, settlement_date};

/// Source of "today" for settlement decisions
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to a date that can be moved by hand
#[derive(Debug)]
pub struct FixedClock {
    date: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Mutex::new(date),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.date.lock().unwrap_or_else(|e| e.into_inner()) = date;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.date.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct Ledger {
    db: Database,
    monitor: ThresholdMonitor,
    notifier: Arc<dyn Notifier>,
    threshold: Decimal,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(db: Database, config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            monitor: ThresholdMonitor::new(),
            notifier,
            threshold: config.minimum_threshold,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_monitor(mut self, monitor: ThresholdMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn monitor(&self) -> &ThresholdMonitor {
        &self.monitor
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Validate and record a transaction, updating the balance if it is realized
    pub async fn record_transaction(
        &self,
        new: NewTransaction,
        actor: &Actor,
    ) -> Result<Transaction> {
        let today = self.today();
        let row = build_row(new, today)?;

        let (transaction, total_cents, transition) =
            self.db.insert_transaction_checked(&row, today, actor, |total| {
                self.observe(from_cents(total))
            })?;
        let total = from_cents(total_cents);

        info!(
            id = transaction.id,
            kind = %transaction.kind,
            amount = %transaction.amount,
            settlement_date = %transaction.settlement_date,
            applied = transaction.balance_applied,
            running_total = %total,
            "Recorded transaction"
        );

        self.dispatch(transition, total).await;
        Ok(transaction)
    }

    /// Delete a transaction, reversing its balance effect if it had one
    pub async fn delete_transaction(&self, id: i64, actor: &Actor) -> Result<Transaction> {
        let (transaction, total_cents, transition) =
            self.db.delete_transaction_checked(id, self.today(), actor, |total| {
                self.observe(from_cents(total))
            })?;
        let total = from_cents(total_cents);

        info!(
            id,
            reversed = transaction.balance_applied,
            running_total = %total,
            "Deleted transaction"
        );

        self.dispatch(transition, total).await;
        Ok(transaction)
    }

    /// Apply deferred income that has reached its settlement date
    pub async fn settle_due(&self) -> Result<SettleResult> {
        let (result, transition) = self
            .db
            .settle_due_checked(self.today(), |total| self.observe(from_cents(total)))?;
        if let Some(transition) = transition {
            self.dispatch(transition, result.running_total).await;
        }
        Ok(result)
    }

    /// Recompute the balance from the ledger, optionally correcting drift
    pub async fn reconcile(&self, apply: bool, actor: &Actor) -> Result<ReconcileReport> {
        let (report, transition) = self
            .db
            .reconcile_checked(self.today(), apply, |total| {
                self.observe(from_cents(total))
            })?;

        let snapshot = serde_json::to_value(&report)?;
        self.db.log_audit(
            actor,
            AuditAction::Reconcile,
            "cash_balance",
            Some(1),
            None,
            Some(&snapshot),
        )?;

        if let Some(transition) = transition {
            self.dispatch(transition, report.expected).await;
        }
        Ok(report)
    }

    pub fn balance(&self) -> Result<CashBalance> {
        self.db.get_balance()
    }

    pub fn pending_settlements(&self, limit: Option<i64>) -> Result<Vec<PendingSettlement>> {
        self.db.pending_settlements(self.today(), limit)
    }

    pub fn asset_summary(&self) -> Result<AssetSummary> {
        self.db.asset_summary(self.today())
    }

    /// Run the monitor on a total that is about to be committed
    ///
    /// Called under the store's write lock; never awaits.
    fn observe(&self, total: Decimal) -> Transition {
        self.monitor.check(total, self.threshold)
    }

    /// Act on a monitor decision once the write has committed
    async fn dispatch(&self, transition: Transition, total: Decimal) {
        match transition {
            Transition::EnteredAlert => {
                warn!(running_total = %total, threshold = %self.threshold, "Cash balance below minimum");
                if let Err(e) = self
                    .notifier
                    .notify_low_balance(total, self.threshold)
                    .await
                {
                    warn!(
                        notifier = self.notifier.name(),
                        error = %e,
                        "Failed to send low balance notification"
                    );
                }
            }
            Transition::Recovered => {
                info!(running_total = %total, "Cash balance back above minimum");
            }
            Transition::Unchanged => {}
        }
    }
}

/// Turn a request into a storable row as of `today`
fn build_row(new: NewTransaction, today: NaiveDate) -> Result<LedgerRow> {
    let amount_cents = amount_to_cents(new.amount)?;
    let transaction_date = new.transaction_date.unwrap_or(today);
    let income_method = effective_income_method(new.kind, new.income_method);
    let settlement = settlement_date(new.kind, income_method, transaction_date);

    // Expenses always leave the drawer right away
    let balance_applied = match new.kind {
        TransactionKind::Expense => true,
        TransactionKind::Income => is_settled(settlement, today),
    };

    let description = new
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    Ok(LedgerRow {
        amount_cents,
        kind: new.kind,
        income_method,
        transaction_date,
        settlement_date: settlement,
        category_id: new.category_id,
        description,
        balance_applied,
    })
}

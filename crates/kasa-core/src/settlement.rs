//! Settlement policy
//!
//! Decides on which calendar date a transaction is recognized in the cash
//! balance. Card (POS) income is paid out by the acquirer after a fixed float;
//! everything else is recognized on the day it happens.

use chrono::{Days, NaiveDate};

use crate::models::{IncomeMethod, TransactionKind};

/// Calendar days between a card sale and its payout
pub const SETTLEMENT_OFFSET_DAYS: u64 = 13;

/// Compute the settlement date for a transaction
pub fn settlement_date(
    kind: TransactionKind,
    income_method: Option<IncomeMethod>,
    transaction_date: NaiveDate,
) -> NaiveDate {
    match (kind, income_method.unwrap_or_default()) {
        (TransactionKind::Income, IncomeMethod::CardDeferred) => transaction_date
            .checked_add_days(Days::new(SETTLEMENT_OFFSET_DAYS))
            // Only fails at the end of chrono's representable range
            .unwrap_or(NaiveDate::MAX),
        _ => transaction_date,
    }
}

/// Whether an amount with this settlement date is realized as of `today`
pub fn is_settled(settlement_date: NaiveDate, today: NaiveDate) -> bool {
    settlement_date <= today
}

/// Whole calendar days until settlement (negative once passed)
pub fn days_remaining(settlement_date: NaiveDate, today: NaiveDate) -> i64 {
    (settlement_date - today).num_days()
}

/// Normalize the income method: only income carries one
pub fn effective_income_method(
    kind: TransactionKind,
    income_method: Option<IncomeMethod>,
) -> Option<IncomeMethod> {
    match kind {
        TransactionKind::Income => Some(income_method.unwrap_or_default()),
        TransactionKind::Expense => None,
    }
}

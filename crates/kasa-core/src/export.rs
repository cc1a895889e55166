//! CSV export of the ledger and monthly reports

use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::{Database, TransactionQuery};
use crate::error::{Error, Result};

/// Options for exporting transactions
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionExportOptions {
    /// Inclusive start date
    pub from: Option<NaiveDate>,
    /// Inclusive end date
    pub to: Option<NaiveDate>,
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

impl Database {
    /// Export transactions as CSV, newest first
    pub fn export_transactions_csv(&self, opts: &TransactionExportOptions) -> Result<String> {
        let transactions = self.list_transactions(&TransactionQuery {
            from: opts.from,
            to: opts.to,
            ..Default::default()
        })?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "id",
            "date",
            "kind",
            "income_method",
            "amount",
            "category",
            "description",
            "settlement_date",
        ])?;

        for tx in &transactions {
            writer.write_record([
                tx.id.to_string(),
                tx.transaction_date.to_string(),
                tx.kind.to_string(),
                tx.income_method.map(|m| m.to_string()).unwrap_or_default(),
                tx.amount.to_string(),
                tx.category_name.clone().unwrap_or_default(),
                tx.description.clone().unwrap_or_default(),
                tx.settlement_date.to_string(),
            ])?;
        }

        finish(writer)
    }

    /// Monthly summary followed by every category with activity
    pub fn export_monthly_report_csv(&self, year: i32, month: u32) -> Result<String> {
        let summary = self.monthly_summary(year, month)?;
        let categories = self.category_breakdown(year, month)?;

        // Two blocks with different widths
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());

        let rows = [
            ("period", format!("{:04}-{:02}", summary.year, summary.month)),
            ("total_income", summary.total_income.to_string()),
            ("total_expense", summary.total_expense.to_string()),
            ("net", summary.net.to_string()),
            ("income_count", summary.income_count.to_string()),
            ("expense_count", summary.expense_count.to_string()),
        ];
        writer.write_record(["metric", "value"])?;
        for (metric, value) in &rows {
            writer.write_record([*metric, value.as_str()])?;
        }

        writer.write_record([""])?;
        writer.write_record(["category", "kind", "total", "count"])?;
        for category in categories.iter().filter(|c| !c.total.is_zero()) {
            writer.write_record([
                category.name.clone(),
                category.kind.to_string(),
                category.total.to_string(),
                category.count.to_string(),
            ])?;
        }

        finish(writer)
    }
}

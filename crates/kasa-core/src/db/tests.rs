//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn actor() -> Actor {
        Actor::system("test")
    }

    fn row(cents: i64, kind: TransactionKind, on: NaiveDate) -> LedgerRow {
        LedgerRow {
            amount_cents: cents,
            kind,
            income_method: (kind == TransactionKind::Income).then_some(IncomeMethod::Immediate),
            transaction_date: on,
            settlement_date: on,
            category_id: None,
            description: None,
            balance_applied: true,
        }
    }

    fn card_row(cents: i64, on: NaiveDate) -> LedgerRow {
        LedgerRow {
            income_method: Some(IncomeMethod::CardDeferred),
            settlement_date: crate::settlement::settlement_date(
                TransactionKind::Income,
                Some(IncomeMethod::CardDeferred),
                on,
            ),
            balance_applied: false,
            ..row(cents, TransactionKind::Income, on)
        }
    }

    fn total(db: &Database) -> Decimal {
        db.get_balance().unwrap().running_total
    }

    #[test]
    fn test_fresh_database_has_zero_balance() {
        let db = Database::in_memory().unwrap();
        assert_eq!(total(&db), Decimal::ZERO);
        assert!(!db.is_encrypted());
        assert!(db.list_transactions(&TransactionQuery::default()).unwrap().is_empty());
    }

    #[test]
    fn test_cash_balance_is_single_row() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let inserted = conn.execute(
            "INSERT INTO cash_balance (id, running_total_cents) VALUES (2, 0)",
            [],
        );
        assert!(inserted.is_err());
    }

    #[test]
    fn test_nonpositive_amount_rejected_by_schema() {
        let db = Database::in_memory().unwrap();
        let result = db.insert_transaction(&row(0, TransactionKind::Expense, date(2024, 1, 1)), date(2024, 1, 1), &actor());
        assert!(result.is_err());
        assert_eq!(total(&db), Decimal::ZERO);
    }

    #[test]
    fn test_insert_applies_signed_delta() {
        let db = Database::in_memory().unwrap();
        let today = date(2024, 3, 1);

        let (_, cents) = db
            .insert_transaction(&row(500000, TransactionKind::Income, today), today, &actor())
            .unwrap();
        assert_eq!(cents, 500000);

        let (_, cents) = db
            .insert_transaction(&row(120050, TransactionKind::Expense, today), today, &actor())
            .unwrap();
        assert_eq!(cents, 379950);
        assert_eq!(total(&db), dec("3799.50"));
    }

    #[test]
    fn test_pending_insert_leaves_total() {
        let db = Database::in_memory().unwrap();
        let today = date(2024, 3, 1);
        let (tx, cents) = db
            .insert_transaction(&card_row(100000, today), today, &actor())
            .unwrap();
        assert_eq!(cents, 0);
        assert!(!tx.balance_applied);
        assert_eq!(tx.settlement_date, date(2024, 3, 14));
    }

    #[test]
    fn test_insert_sweeps_matured_income_first() {
        let db = Database::in_memory().unwrap();
        db.insert_transaction(&card_row(100000, date(2024, 3, 1)), date(2024, 3, 1), &actor())
            .unwrap();

        // Two weeks later an unrelated expense picks up the settled card income
        let later = date(2024, 3, 15);
        let (_, cents) = db
            .insert_transaction(&row(2500, TransactionKind::Expense, later), later, &actor())
            .unwrap();
        assert_eq!(cents, 97500);

        let card = db.get_transaction(1).unwrap().unwrap();
        assert!(card.balance_applied);
    }

    #[test]
    fn test_delete_reverses_applied_entry() {
        let db = Database::in_memory().unwrap();
        let today = date(2024, 3, 1);
        db.insert_transaction(&row(10000, TransactionKind::Income, today), today, &actor())
            .unwrap();
        let (tx, _) = db
            .insert_transaction(&row(4000, TransactionKind::Expense, today), today, &actor())
            .unwrap();

        let (deleted, cents) = db.delete_transaction(tx.id, today, &actor()).unwrap();
        assert_eq!(deleted.id, tx.id);
        assert_eq!(cents, 10000);
        assert!(db.get_transaction(tx.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_pending_card_income_keeps_total() {
        let db = Database::in_memory().unwrap();
        let today = date(2024, 3, 1);
        db.insert_transaction(&row(5000, TransactionKind::Income, today), today, &actor())
            .unwrap();
        let (card, _) = db
            .insert_transaction(&card_row(100000, today), today, &actor())
            .unwrap();

        let (_, cents) = db.delete_transaction(card.id, today, &actor()).unwrap();
        assert_eq!(cents, 5000);
    }

    #[test]
    fn test_delete_settled_card_income_reverses_it() {
        let db = Database::in_memory().unwrap();
        let (card, _) = db
            .insert_transaction(&card_row(100000, date(2024, 3, 1)), date(2024, 3, 1), &actor())
            .unwrap();

        // The delete's own sweep applies it, then the reversal takes it back out
        let (deleted, cents) = db
            .delete_transaction(card.id, date(2024, 3, 20), &actor())
            .unwrap();
        assert!(deleted.balance_applied);
        assert_eq!(cents, 0);
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let db = Database::in_memory().unwrap();
        db.apply_balance_delta(dec("250")).unwrap();

        let result = db.delete_transaction(42, date(2024, 1, 1), &actor());
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(total(&db), dec("250.00"));
    }

    #[test]
    fn test_apply_balance_delta_touches_last_updated() {
        let db = Database::in_memory().unwrap();
        {
            let conn = db.conn().unwrap();
            conn.execute(
                "UPDATE cash_balance SET last_updated = '2000-01-01 00:00:00' WHERE id = 1",
                [],
            )
            .unwrap();
        }
        assert_eq!(db.apply_balance_delta(dec("-12.5")).unwrap(), dec("-12.50"));
        let balance = db.get_balance().unwrap();
        assert!(balance.last_updated.format("%Y").to_string() != "2000");
    }

    #[test]
    fn test_settle_due_is_idempotent() {
        let db = Database::in_memory().unwrap();
        db.insert_transaction(&card_row(30000, date(2024, 1, 1)), date(2024, 1, 1), &actor())
            .unwrap();
        db.insert_transaction(&card_row(20000, date(2024, 1, 5)), date(2024, 1, 5), &actor())
            .unwrap();

        let first = db.settle_due(date(2024, 1, 14)).unwrap();
        assert_eq!(first.settled_count, 1);
        assert_eq!(first.settled_amount, dec("300.00"));

        let again = db.settle_due(date(2024, 1, 14)).unwrap();
        assert_eq!(again.settled_count, 0);
        assert_eq!(again.running_total, dec("300.00"));

        let rest = db.settle_due(date(2024, 1, 18)).unwrap();
        assert_eq!(rest.settled_count, 1);
        assert_eq!(rest.running_total, dec("500.00"));
    }

    #[test]
    fn test_reconcile_detects_and_corrects_drift() {
        let db = Database::in_memory().unwrap();
        let today = date(2024, 3, 1);
        db.insert_transaction(&row(10000, TransactionKind::Income, today), today, &actor())
            .unwrap();

        // Simulate an out-of-band edit
        {
            let conn = db.conn().unwrap();
            conn.execute("UPDATE cash_balance SET running_total_cents = 99 WHERE id = 1", params![])
                .unwrap();
        }

        let report = db.reconcile(today, false).unwrap();
        assert_eq!(report.stored, dec("0.99"));
        assert_eq!(report.expected, dec("100.00"));
        assert_eq!(report.drift, dec("-99.01"));
        assert!(!report.corrected);
        assert_eq!(total(&db), dec("0.99"));

        let report = db.reconcile(today, true).unwrap();
        assert!(report.corrected);
        assert_eq!(total(&db), dec("100.00"));

        let report = db.reconcile(today, true).unwrap();
        assert_eq!(report.drift, Decimal::ZERO);
        assert!(!report.corrected);
    }

    #[test]
    fn test_reconcile_catches_income_settled_early() {
        let db = Database::in_memory().unwrap();
        let today = date(2024, 6, 1);
        let (card, _) = db
            .insert_transaction(&card_row(150000, today), today, &actor())
            .unwrap();

        // A sweep run with a clock far ahead applies the income too soon
        db.settle_due(date(2030, 1, 1)).unwrap();
        assert_eq!(total(&db), dec("1500.00"));
        assert_eq!(db.pending_settlements(today, None).unwrap().len(), 1);

        let report = db.reconcile(today, false).unwrap();
        assert_eq!(report.stored, dec("1500.00"));
        assert_eq!(report.expected, Decimal::ZERO);
        assert_eq!(report.drift, dec("1500.00"));
        assert!(!report.corrected);

        let report = db.reconcile(today, true).unwrap();
        assert!(report.corrected);
        assert_eq!(total(&db), Decimal::ZERO);
        assert!(!db.get_transaction(card.id).unwrap().unwrap().balance_applied);

        // Back to pending: the real settlement day applies it exactly once
        let settled = db.settle_due(date(2024, 6, 14)).unwrap();
        assert_eq!(settled.settled_count, 1);
        assert_eq!(total(&db), dec("1500.00"));
        assert!(db.pending_settlements(date(2024, 6, 14), None).unwrap().is_empty());
        assert_eq!(db.reconcile(date(2024, 6, 14), false).unwrap().drift, Decimal::ZERO);
    }

    #[test]
    fn test_reconcile_expected_follows_settlement_dates() {
        let db = Database::in_memory().unwrap();
        let today = date(2024, 6, 10);
        db.insert_transaction(&row(40000, TransactionKind::Income, today), today, &actor())
            .unwrap();
        db.insert_transaction(&card_row(25000, date(2024, 5, 20)), today, &actor())
            .unwrap();
        db.insert_transaction(&card_row(70000, date(2024, 6, 5)), today, &actor())
            .unwrap();
        // Future-dated expense still counts
        db.insert_transaction(&row(5000, TransactionKind::Expense, date(2024, 7, 1)), today, &actor())
            .unwrap();

        // 400 + 250 (settled 2024-06-02) - 50; the 700 settles 2024-06-18
        let report = db.reconcile(today, false).unwrap();
        assert_eq!(report.expected, dec("600.00"));
        assert_eq!(report.drift, Decimal::ZERO);
    }

    #[test]
    fn test_pending_settlements_never_in_total() {
        let db = Database::in_memory().unwrap();
        let created = date(2024, 6, 1);
        db.insert_transaction(&row(100000, TransactionKind::Income, created), created, &actor())
            .unwrap();
        db.insert_transaction(&row(20000, TransactionKind::Expense, created), created, &actor())
            .unwrap();
        for (cents, on) in [(30000, date(2024, 6, 1)), (45000, date(2024, 6, 4)), (15000, date(2024, 6, 9))] {
            db.insert_transaction(&card_row(cents, on), created, &actor())
                .unwrap();
        }
        // Everything ever recorded: 1000 - 200 + 300 + 450 + 150
        let recorded = dec("1700.00");

        let mut day = created;
        while day <= date(2024, 6, 25) {
            db.settle_due(day).unwrap();
            let pending: Decimal = db
                .pending_settlements(day, None)
                .unwrap()
                .iter()
                .map(|p| p.amount)
                .sum();
            assert_eq!(total(&db) + pending, recorded, "on {}", day);
            day = day.succ_opt().unwrap();
        }
        assert_eq!(total(&db), recorded);
    }

    #[test]
    fn test_checked_insert_sees_totals_in_commit_order() {
        use std::sync::{Arc, Mutex};

        let db = Database::in_memory().unwrap();
        let today = date(2024, 6, 1);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                let seen = seen.clone();
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        db.insert_transaction_checked(
                            &row(100, TransactionKind::Income, today),
                            today,
                            &actor(),
                            |total| seen.lock().unwrap().push(total),
                        )
                        .unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let seen = seen.lock().unwrap();
        let expected: Vec<i64> = (1..=40).map(|n| n * 100).collect();
        assert_eq!(*seen, expected);
    }

    #[test]
    fn test_list_transactions_newest_first_and_filtered() {
        let db = Database::in_memory().unwrap();
        let today = date(2024, 3, 31);
        db.insert_transaction(&row(100, TransactionKind::Expense, date(2024, 3, 1)), today, &actor())
            .unwrap();
        db.insert_transaction(&row(200, TransactionKind::Income, date(2024, 3, 20)), today, &actor())
            .unwrap();
        db.insert_transaction(&row(300, TransactionKind::Expense, date(2024, 3, 10)), today, &actor())
            .unwrap();

        let all = db.list_transactions(&TransactionQuery::default()).unwrap();
        let dates: Vec<_> = all.iter().map(|t| t.transaction_date).collect();
        assert_eq!(dates, vec![date(2024, 3, 20), date(2024, 3, 10), date(2024, 3, 1)]);

        let expenses = db
            .list_transactions(&TransactionQuery {
                kind: Some(TransactionKind::Expense),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(expenses.len(), 2);

        let page = db
            .list_transactions(&TransactionQuery {
                limit: Some(1),
                offset: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].transaction_date, date(2024, 3, 10));
    }

    #[test]
    fn test_category_crud_and_conflict() {
        let db = Database::in_memory().unwrap();
        let rent = db
            .create_category(
                &NewCategory {
                    name: " Rent ".into(),
                    kind: TransactionKind::Expense,
                },
                &actor(),
            )
            .unwrap();
        assert_eq!(rent.name, "Rent");
        db.create_category(
            &NewCategory {
                name: "Sales".into(),
                kind: TransactionKind::Income,
            },
            &actor(),
        )
        .unwrap();

        let names: Vec<_> = db
            .list_categories()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Rent", "Sales"]);

        let today = date(2024, 3, 1);
        let mut used = row(1000, TransactionKind::Expense, today);
        used.category_id = Some(rent.id);
        let (tx, _) = db.insert_transaction(&used, today, &actor()).unwrap();

        assert!(matches!(db.delete_category(rent.id, &actor()), Err(Error::Conflict(_))));
        assert!(db.get_category(rent.id).unwrap().is_some());

        db.delete_transaction(tx.id, today, &actor()).unwrap();
        db.delete_category(rent.id, &actor()).unwrap();
        assert!(matches!(db.delete_category(rent.id, &actor()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_category_name_unique_per_kind() {
        let db = Database::in_memory().unwrap();
        let new = |name: &str, kind| NewCategory {
            name: name.into(),
            kind,
        };
        db.create_category(&new("Rent", TransactionKind::Expense), &actor())
            .unwrap();

        let dup = db.create_category(&new(" rent ", TransactionKind::Expense), &actor());
        assert!(matches!(dup, Err(Error::Conflict(_))));

        db.create_category(&new("Rent", TransactionKind::Income), &actor())
            .unwrap();
        assert_eq!(db.list_categories().unwrap().len(), 2);
    }

    #[test]
    fn test_category_changes_audited_with_the_write() {
        let db = Database::in_memory().unwrap();
        let category_audit = |db: &Database| {
            db.list_audit_log(&AuditFilter {
                table_name: Some("categories".into()),
                ..Default::default()
            })
            .unwrap()
        };

        let rent = db
            .create_category(
                &NewCategory {
                    name: "Rent".into(),
                    kind: TransactionKind::Expense,
                },
                &actor(),
            )
            .unwrap();
        let entries = category_audit(&db);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "CREATE");
        assert_eq!(entries[0].record_id, Some(rent.id));
        assert_eq!(entries[0].new_data.as_ref().unwrap()["name"], "Rent");

        // Rejected writes leave no audit row behind
        let _ = db.create_category(
            &NewCategory {
                name: "RENT".into(),
                kind: TransactionKind::Expense,
            },
            &actor(),
        );
        let today = date(2024, 3, 1);
        let mut used = row(1000, TransactionKind::Expense, today);
        used.category_id = Some(rent.id);
        let (tx, _) = db.insert_transaction(&used, today, &actor()).unwrap();
        assert!(db.delete_category(rent.id, &actor()).is_err());
        assert_eq!(category_audit(&db).len(), 1);

        db.delete_transaction(tx.id, today, &actor()).unwrap();
        db.delete_category(rent.id, &actor()).unwrap();
        let entries = category_audit(&db);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "DELETE");
        assert_eq!(entries[0].old_data.as_ref().unwrap()["name"], "Rent");
        assert!(entries[0].new_data.is_none());
    }

    #[test]
    fn test_category_requires_name() {
        let db = Database::in_memory().unwrap();
        let result = db.create_category(
            &NewCategory {
                name: "  ".into(),
                kind: TransactionKind::Income,
            },
            &actor(),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let db = Database::in_memory().unwrap();
        let today = date(2024, 3, 1);
        let mut orphan = row(1000, TransactionKind::Expense, today);
        orphan.category_id = Some(77);
        let result = db.insert_transaction(&orphan, today, &actor());
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(total(&db), Decimal::ZERO);
    }

    #[test]
    fn test_monthly_summary_window_is_half_open() {
        let db = Database::in_memory().unwrap();
        let today = date(2024, 6, 1);
        for (cents, kind, on) in [
            (100000, TransactionKind::Income, date(2024, 4, 30)),
            (200000, TransactionKind::Income, date(2024, 5, 1)),
            (50000, TransactionKind::Expense, date(2024, 5, 31)),
            (70000, TransactionKind::Expense, date(2024, 6, 1)),
        ] {
            db.insert_transaction(&row(cents, kind, on), today, &actor())
                .unwrap();
        }

        let summary = db.monthly_summary(2024, 5).unwrap();
        assert_eq!(summary.total_income, dec("2000.00"));
        assert_eq!(summary.total_expense, dec("500.00"));
        assert_eq!(summary.net, dec("1500.00"));
        assert_eq!(summary.income_count, 1);
        assert_eq!(summary.expense_count, 1);

        assert_eq!(
            db.sum_by_kind_and_window(TransactionKind::Income, date(2024, 4, 1), date(2024, 5, 1))
                .unwrap(),
            dec("1000.00")
        );
    }

    #[test]
    fn test_month_window_rolls_over_year() {
        assert_eq!(
            month_window(2024, 12).unwrap(),
            (date(2024, 12, 1), date(2025, 1, 1))
        );
        assert!(matches!(month_window(2024, 13), Err(Error::Validation(_))));
        assert!(matches!(month_window(2024, 0), Err(Error::Validation(_))));
    }

    #[test]
    fn test_category_breakdown_largest_first() {
        let db = Database::in_memory().unwrap();
        let today = date(2024, 5, 31);
        let rent = db
            .create_category(
                &NewCategory {
                    name: "Rent".into(),
                    kind: TransactionKind::Expense,
                },
                &actor(),
            )
            .unwrap();
        let supplies = db
            .create_category(
                &NewCategory {
                    name: "Supplies".into(),
                    kind: TransactionKind::Expense,
                },
                &actor(),
            )
            .unwrap();

        for (cents, category) in [(300000, rent.id), (4000, supplies.id), (6000, supplies.id)] {
            let mut r = row(cents, TransactionKind::Expense, date(2024, 5, 3));
            r.category_id = Some(category);
            db.insert_transaction(&r, today, &actor()).unwrap();
        }

        let breakdown = db.category_breakdown(2024, 5).unwrap();
        assert_eq!(breakdown[0].name, "Rent");
        assert_eq!(breakdown[0].total, dec("3000.00"));
        assert_eq!(breakdown[1].name, "Supplies");
        assert_eq!(breakdown[1].count, 2);

        // Outside the month everything is zero
        let empty = db.category_breakdown(2024, 6).unwrap();
        assert!(empty.iter().all(|c| c.total.is_zero() && c.count == 0));
    }

    #[test]
    fn test_asset_summary_and_pending() {
        let db = Database::in_memory().unwrap();
        let today = date(2024, 3, 10);
        db.insert_transaction(&row(500000, TransactionKind::Income, today), today, &actor())
            .unwrap();
        db.insert_transaction(&row(100000, TransactionKind::Expense, today), today, &actor())
            .unwrap();
        db.insert_transaction(&card_row(150000, date(2024, 3, 5)), today, &actor())
            .unwrap();
        db.insert_transaction(&card_row(80000, date(2024, 3, 1)), today, &actor())
            .unwrap();

        let assets = db.asset_summary(today).unwrap();
        assert_eq!(assets.total_assets, dec("6300.00"));
        assert_eq!(assets.pending_settlement, dec("2300.00"));
        assert_eq!(assets.realized, dec("4000.00"));

        let pending = db.pending_settlements(today, None).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].settlement_date, date(2024, 3, 14));
        assert_eq!(pending[0].days_remaining, 4);
        assert_eq!(pending[1].settlement_date, date(2024, 3, 18));
        assert_eq!(pending[1].days_remaining, 8);

        assert_eq!(db.pending_settlements(today, Some(1)).unwrap().len(), 1);
        assert!(db.pending_settlements(date(2024, 3, 18), None).unwrap().is_empty());
    }

    #[test]
    fn test_user_lifecycle() {
        let db = Database::in_memory().unwrap();
        let boss = db
            .create_user(
                &NewUser {
                    email: "Boss@Example.com".into(),
                    password: "hunter22".into(),
                    name: "Boss".into(),
                    role: None,
                },
                true,
            )
            .unwrap();
        assert_eq!(boss.email, "boss@example.com");
        assert_eq!(boss.role, Role::Admin);
        assert!(boss.is_super_admin);

        let clerk = db
            .create_user(
                &NewUser {
                    email: "clerk@example.com".into(),
                    password: "counting".into(),
                    name: "Clerk".into(),
                    role: None,
                },
                false,
            )
            .unwrap();
        assert_eq!(clerk.role, Role::Viewer);
        assert_eq!(db.count_users().unwrap(), 2);

        assert!(db
            .verify_credentials("BOSS@example.com", "hunter22")
            .unwrap()
            .is_some());
        assert!(db
            .verify_credentials("boss@example.com", "wrong")
            .unwrap()
            .is_none());
        assert!(db
            .verify_credentials("nobody@example.com", "hunter22")
            .unwrap()
            .is_none());

        let duplicate = db.create_user(
            &NewUser {
                email: "clerk@example.com".into(),
                password: "another1".into(),
                name: "Other".into(),
                role: None,
            },
            false,
        );
        assert!(matches!(duplicate, Err(Error::Conflict(_))));

        let promoted = db
            .update_user(
                clerk.id,
                &UserUpdate {
                    role: Some(Role::Admin),
                    name: Some("Head Clerk".into()),
                    ..Default::default()
                },
                boss.id,
            )
            .unwrap();
        assert_eq!(promoted.role, Role::Admin);
        assert_eq!(promoted.name, "Head Clerk");

        let taken = db.update_user(
            clerk.id,
            &UserUpdate {
                email: Some("boss@example.com".into()),
                ..Default::default()
            },
            boss.id,
        );
        assert!(matches!(taken, Err(Error::Conflict(_))));

        db.delete_user(clerk.id).unwrap();
        assert!(db.get_user(clerk.id).unwrap().is_none());
    }

    #[test]
    fn test_super_admin_is_protected() {
        let db = Database::in_memory().unwrap();
        let boss = db
            .create_user(
                &NewUser {
                    email: "boss@example.com".into(),
                    password: "hunter22".into(),
                    name: "Boss".into(),
                    role: None,
                },
                true,
            )
            .unwrap();

        assert!(matches!(db.delete_user(boss.id), Err(Error::Forbidden(_))));

        let by_other = db.update_user(
            boss.id,
            &UserUpdate {
                name: Some("Renamed".into()),
                ..Default::default()
            },
            boss.id + 1,
        );
        assert!(matches!(by_other, Err(Error::Forbidden(_))));

        // Self-edit works but the role stays admin
        let updated = db
            .update_user(
                boss.id,
                &UserUpdate {
                    name: Some("Owner".into()),
                    role: Some(Role::Viewer),
                    ..Default::default()
                },
                boss.id,
            )
            .unwrap();
        assert_eq!(updated.name, "Owner");
        assert_eq!(updated.role, Role::Admin);
    }

    #[test]
    fn test_user_validation() {
        let db = Database::in_memory().unwrap();
        let short = db.create_user(
            &NewUser {
                email: "a@example.com".into(),
                password: "123".into(),
                name: "A".into(),
                role: None,
            },
            false,
        );
        assert!(matches!(short, Err(Error::Validation(_))));

        let no_at = db.create_user(
            &NewUser {
                email: "not-an-email".into(),
                password: "123456".into(),
                name: "A".into(),
                role: None,
            },
            false,
        );
        assert!(matches!(no_at, Err(Error::Validation(_))));
    }

    #[test]
    fn test_audit_log_records_ledger_changes() {
        let db = Database::in_memory().unwrap();
        let today = date(2024, 3, 1);
        let who = Actor {
            user_id: Some(7),
            email: Some("clerk@example.com".into()),
            ip_address: Some("10.0.0.5".into()),
        };

        let (tx, _) = db
            .insert_transaction(&row(1000, TransactionKind::Income, today), today, &who)
            .unwrap();
        db.delete_transaction(tx.id, today, &who).unwrap();
        db.log_audit(&actor(), AuditAction::Backup, "database", None, None, None)
            .unwrap();

        let all = db.list_audit_log(&AuditFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].action, "BACKUP");

        let deletes = db
            .list_audit_log(&AuditFilter {
                action: Some("delete".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].record_id, Some(tx.id));
        assert_eq!(deletes[0].ip_address.as_deref(), Some("10.0.0.5"));
        let old = deletes[0].old_data.as_ref().unwrap();
        assert_eq!(old["amount"], "10.00");
        assert!(deletes[0].new_data.is_none());

        let by_user = db
            .list_audit_log(&AuditFilter {
                user_id: Some(7),
                table_name: Some("transactions".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_user.len(), 2);

        let limited = db
            .list_audit_log(&AuditFilter {
                limit: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_audit_log_joins_user_name() {
        let db = Database::in_memory().unwrap();
        let user = db
            .create_user(
                &NewUser {
                    email: "clerk@example.com".into(),
                    password: "counting".into(),
                    name: "Clerk".into(),
                    role: None,
                },
                false,
            )
            .unwrap();
        let who = Actor {
            user_id: Some(user.id),
            email: Some(user.email.clone()),
            ip_address: None,
        };
        db.log_audit(&who, AuditAction::Login, "users", Some(user.id), None, None)
            .unwrap();

        let entries = db.list_audit_log(&AuditFilter::default()).unwrap();
        assert_eq!(entries[0].user_name.as_deref(), Some("Clerk"));
    }

    #[test]
    fn test_encrypted_database_rejects_wrong_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("secret.db");
        let path = path.to_str().unwrap();

        let db = Database::new_with_key(path, Some("right")).unwrap();
        assert!(db.is_encrypted());
        db.apply_balance_delta(dec("10")).unwrap();
        drop(db);

        assert!(Database::new_with_key(path, Some("wrong")).is_err());
        let reopened = Database::new_with_key(path, Some("right")).unwrap();
        assert_eq!(total(&reopened), dec("10.00"));
    }

    #[test]
    fn test_derive_key_is_stable() {
        let a = derive_key("passphrase").unwrap();
        let b = derive_key("passphrase").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, derive_key("other").unwrap());
    }
}

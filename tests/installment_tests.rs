// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use billfold::commands::installments::{
    self, installment_details, installment_projection, InstallmentInput,
};
use billfold::db;
use billfold::errors::EngineError;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

fn setup() -> (Connection, i64) {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    conn.execute(
        "INSERT INTO payment_methods(user_id, name, kind, closing_day)
         VALUES ('alice', 'Visa', 'credit_card', 10)",
        [],
    )
    .unwrap();
    let card = conn.last_insert_rowid();
    (conn, card)
}

fn input(card: i64, description: &str, total: &str, count: u32, start: NaiveDate) -> InstallmentInput {
    InstallmentInput {
        description: description.to_string(),
        total: total.parse().unwrap(),
        count,
        start,
        category_id: None,
        payment_method_id: card,
        billing_cycle_id: None,
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn splits_into_equal_monthly_installments() {
    let (mut conn, card) = setup();
    let first = installments::create_installments(
        &mut conn,
        "alice",
        &input(card, "TV", "1200", 12, d(2025, 1, 15)),
    )
    .unwrap();
    assert_eq!(first.amount, Decimal::from(100));
    assert_eq!(first.description, "TV (1/12)");

    let mut stmt = conn
        .prepare(
            "SELECT date, amount, group_id, description FROM transactions
             WHERE user_id='alice' ORDER BY date",
        )
        .unwrap();
    let rows: Vec<(String, String, String, String)> = stmt
        .query_map([], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
        })
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(rows.len(), 12);
    assert!(rows.iter().all(|(_, amt, _, _)| amt == "100"));
    assert!(rows.iter().all(|(_, _, g, _)| *g == rows[0].2));
    for (i, (date, _, _, desc)) in rows.iter().enumerate() {
        let month = 1 + i as u32;
        assert!(date.starts_with(&format!("2025-{:02}-15", month)));
        assert_eq!(*desc, format!("TV ({}/12)", i + 1));
    }
}

#[test]
fn rounding_remainder_lands_on_last_installment() {
    let (mut conn, card) = setup();
    installments::create_installments(
        &mut conn,
        "alice",
        &input(card, "Phone", "100", 3, d(2025, 1, 15)),
    )
    .unwrap();

    let mut stmt = conn
        .prepare("SELECT amount FROM transactions WHERE user_id='alice' ORDER BY date")
        .unwrap();
    let amounts: Vec<String> = stmt
        .query_map([], |r| r.get(0))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(amounts, vec!["33.33", "33.33", "33.34"]);

    let total: Decimal = amounts.iter().map(|a| a.parse::<Decimal>().unwrap()).sum();
    assert_eq!(total, Decimal::from(100));
}

#[test]
fn rejects_non_card_methods_and_zero_count() {
    let (mut conn, _) = setup();
    conn.execute(
        "INSERT INTO payment_methods(user_id, name, kind) VALUES ('alice', 'Cash', 'cash')",
        [],
    )
    .unwrap();
    let cash = conn.last_insert_rowid();

    let err = installments::create_installments(
        &mut conn,
        "alice",
        &input(cash, "TV", "100", 3, d(2025, 1, 15)),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::Validation(_))
    ));

    let (mut conn, card) = setup();
    let err = installments::create_installments(
        &mut conn,
        "alice",
        &input(card, "TV", "100", 0, d(2025, 1, 15)),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::Validation(_))
    ));
}

#[test]
fn details_split_pending_and_completed_groups() {
    let (mut conn, card) = setup();
    let today = d(2025, 6, 20);
    installments::create_installments(
        &mut conn,
        "alice",
        &input(card, "Old couch", "300", 3, d(2025, 1, 10)),
    )
    .unwrap();
    installments::create_installments(
        &mut conn,
        "alice",
        &input(card, "New laptop", "400", 4, d(2025, 5, 10)),
    )
    .unwrap();

    let details = installment_details(&conn, "alice", today).unwrap();
    assert_eq!(details.completed.len(), 1);
    assert_eq!(details.pending.len(), 1);

    let done = &details.completed[0];
    assert_eq!(done.description, "Old couch");
    assert!(done.completed);
    assert_eq!(done.last_date, d(2025, 3, 10));

    let open = &details.pending[0];
    assert_eq!(open.description, "New laptop");
    assert_eq!(open.per_installment, Decimal::from(100));
    assert_eq!(open.installment_count, 4);
    // May and June installments have passed this month's end marker
    assert_eq!(open.current_index, 2);
    // June, July, August are still pending this month or later
    assert_eq!(open.pending_amount, Decimal::from(300));
}

#[test]
fn pending_groups_sort_by_pending_amount_descending() {
    let (mut conn, card) = setup();
    let today = d(2025, 6, 20);
    installments::create_installments(
        &mut conn,
        "alice",
        &input(card, "Small", "60", 3, d(2025, 6, 1)),
    )
    .unwrap();
    installments::create_installments(
        &mut conn,
        "alice",
        &input(card, "Big", "900", 3, d(2025, 6, 1)),
    )
    .unwrap();

    let details = installment_details(&conn, "alice", today).unwrap();
    assert_eq!(details.pending[0].description, "Big");
    assert_eq!(details.pending[1].description, "Small");
}

#[test]
fn projection_is_exactly_twelve_zero_filled_buckets() {
    let (mut conn, card) = setup();
    let today = d(2025, 6, 20);
    installments::create_installments(
        &mut conn,
        "alice",
        &input(card, "Laptop", "400", 4, d(2025, 5, 10)),
    )
    .unwrap();

    let buckets = installment_projection(&conn, "alice", today).unwrap();
    assert_eq!(buckets.len(), 12);
    assert_eq!((buckets[0].year, buckets[0].month), (2024, 12));
    assert_eq!((buckets[11].year, buckets[11].month), (2025, 11));

    for b in &buckets {
        let expected = match (b.year, b.month) {
            (2025, 5) | (2025, 6) | (2025, 7) | (2025, 8) => Decimal::from(100),
            _ => Decimal::ZERO,
        };
        assert_eq!(b.total, expected, "bucket {}-{:02}", b.year, b.month);
    }
}

#[test]
fn update_replaces_the_whole_group() {
    let (mut conn, card) = setup();
    let first = installments::create_installments(
        &mut conn,
        "alice",
        &input(card, "TV", "300", 3, d(2025, 1, 15)),
    )
    .unwrap();
    let old_group = first.group_id.clone().unwrap();

    let rebuilt = installments::update_installments(
        &mut conn,
        "alice",
        &old_group,
        &input(card, "TV deluxe", "500", 5, d(2025, 2, 1)),
    )
    .unwrap();
    let new_group = rebuilt.group_id.clone().unwrap();
    assert_ne!(old_group, new_group);

    let old_left: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM transactions WHERE group_id=?1",
            params![old_group],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(old_left, 0);
    let new_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM transactions WHERE group_id=?1",
            params![new_group],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(new_count, 5);
}

#[test]
fn delete_removes_every_sibling() {
    let (mut conn, card) = setup();
    let first = installments::create_installments(
        &mut conn,
        "alice",
        &input(card, "TV", "300", 3, d(2025, 1, 15)),
    )
    .unwrap();
    let group = first.group_id.unwrap();

    let removed = installments::delete_installments(&conn, "alice", &group).unwrap();
    assert_eq!(removed, 3);

    let left: i64 = conn
        .query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(left, 0);

    let err = installments::delete_installments(&conn, "alice", &group).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::NotFound(_))
    ));
}

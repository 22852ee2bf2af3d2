// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use billfold::commands::cards;
use billfold::db;
use billfold::errors::EngineError;
use billfold::utils::fmt_ts;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    conn
}

fn ts(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
}

fn add_card(conn: &Connection, name: &str, closing_day: Option<u32>) -> i64 {
    conn.execute(
        "INSERT INTO payment_methods(user_id, name, kind, closing_day)
         VALUES ('alice', ?1, 'credit_card', ?2)",
        params![name, closing_day],
    )
    .unwrap();
    conn.last_insert_rowid()
}

fn add_charge(conn: &Connection, card_id: i64, date: DateTime<Utc>, amount: &str) -> i64 {
    conn.execute(
        "INSERT INTO transactions(user_id, date, amount, kind, description,
                                  payment_method_id, card_id, is_card_payment, is_paid)
         VALUES ('alice', ?1, ?2, 'expense', 'charge', ?3, ?3, 1, 0)",
        params![fmt_ts(date), amount, card_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}

#[test]
fn window_after_closing_day_runs_into_next_month() {
    let (start, end) = cards::statement_window(ts(2025, 6, 15, 12), Some(10)).unwrap();
    assert_eq!(start, ts(2025, 6, 11, 0));
    assert_eq!(
        end,
        Utc.with_ymd_and_hms(2025, 7, 10, 23, 59, 59).unwrap()
            + chrono::Duration::milliseconds(999)
    );
}

#[test]
fn window_on_or_before_closing_day_starts_last_month() {
    let (start, end) = cards::statement_window(ts(2025, 6, 5, 12), Some(10)).unwrap();
    assert_eq!(start, ts(2025, 5, 11, 0));
    assert_eq!(
        end,
        Utc.with_ymd_and_hms(2025, 6, 10, 23, 59, 59).unwrap()
            + chrono::Duration::milliseconds(999)
    );

    // the closing day itself still belongs to the current window
    let (start2, _) = cards::statement_window(ts(2025, 6, 10, 23), Some(10)).unwrap();
    assert_eq!(start2, start);
}

#[test]
fn window_clamps_closing_day_to_short_months() {
    let (start, end) = cards::statement_window(ts(2025, 2, 15, 12), Some(31)).unwrap();
    // January closes on the 31st, February on its last day
    assert_eq!(start, ts(2025, 2, 1, 0));
    assert_eq!(
        end,
        Utc.with_ymd_and_hms(2025, 2, 28, 23, 59, 59).unwrap()
            + chrono::Duration::milliseconds(999)
    );
}

#[test]
fn missing_closing_day_means_always_open_statement() {
    let now = ts(2025, 6, 15, 12);
    let (start, end) = cards::statement_window(now, None).unwrap();
    assert_eq!(start, DateTime::UNIX_EPOCH);
    assert_eq!(end, now);
}

#[test]
fn fifo_settles_only_fully_covered_charges() {
    let conn = setup();
    let card = add_card(&conn, "Visa", Some(10));
    let first = add_charge(&conn, card, ts(2025, 1, 1, 9), "100");
    let second = add_charge(&conn, card, ts(2025, 1, 2, 9), "200");
    let third = add_charge(&conn, card, ts(2025, 1, 3, 9), "50");

    let (settled, remaining) = cards::pay_statement(
        &conn,
        "alice",
        card,
        Decimal::from(150),
        ts(2025, 1, 20, 9),
        card,
        "Visa statement",
        None,
    )
    .unwrap();
    assert_eq!(settled, 1);
    assert_eq!(remaining, Decimal::from(50));

    let paid = |id: i64| -> bool {
        conn.query_row(
            "SELECT is_paid FROM transactions WHERE id=?1",
            params![id],
            |r| r.get(0),
        )
        .unwrap()
    };
    assert!(paid(first));
    assert!(!paid(second));
    assert!(!paid(third));

    // the settlement row itself
    let (kind, is_summary, is_card): (String, bool, bool) = conn
        .query_row(
            "SELECT kind, is_summary_payment, is_card_payment FROM transactions
             WHERE is_summary_payment=1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap();
    assert_eq!(kind, "expense");
    assert!(is_summary);
    assert!(!is_card);
}

#[test]
fn window_scoping_skips_charges_outside_it() {
    let conn = setup();
    let card = add_card(&conn, "Visa", Some(10));
    let old = add_charge(&conn, card, ts(2025, 4, 1, 9), "40");
    let inside = add_charge(&conn, card, ts(2025, 6, 12, 9), "60");

    let window = cards::statement_window(ts(2025, 6, 15, 12), Some(10)).unwrap();
    let (settled, remaining) = cards::pay_statement(
        &conn,
        "alice",
        card,
        Decimal::from(100),
        ts(2025, 6, 15, 12),
        card,
        "Visa statement",
        Some(window),
    )
    .unwrap();
    assert_eq!(settled, 1);
    assert_eq!(remaining, Decimal::from(40));

    let old_paid: bool = conn
        .query_row(
            "SELECT is_paid FROM transactions WHERE id=?1",
            params![old],
            |r| r.get(0),
        )
        .unwrap();
    let inside_paid: bool = conn
        .query_row(
            "SELECT is_paid FROM transactions WHERE id=?1",
            params![inside],
            |r| r.get(0),
        )
        .unwrap();
    assert!(!old_paid);
    assert!(inside_paid);
}

#[test]
fn pending_summaries_sum_window_and_sort_descending() {
    let conn = setup();
    let now = ts(2025, 6, 15, 12);
    let visa = add_card(&conn, "Visa", Some(10));
    let amex = add_card(&conn, "Amex", Some(10));
    let idle = add_card(&conn, "Idle", Some(10));

    add_charge(&conn, visa, ts(2025, 6, 12, 9), "30");
    add_charge(&conn, visa, ts(2025, 6, 13, 9), "20");
    add_charge(&conn, amex, ts(2025, 6, 14, 9), "500");
    // outside Visa's window, must not count
    add_charge(&conn, visa, ts(2025, 4, 1, 9), "999");
    let _ = idle;

    let pending = cards::pending_summaries(&conn, "alice", now).unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].card_name, "Amex");
    assert_eq!(pending[0].total, Decimal::from(500));
    assert_eq!(pending[1].card_name, "Visa");
    assert_eq!(pending[1].total, Decimal::from(50));
    assert_eq!(pending[1].charge_count, 2);
}

#[test]
fn disabled_cards_are_not_summarized() {
    let conn = setup();
    let card = add_card(&conn, "Visa", Some(10));
    add_charge(&conn, card, ts(2025, 6, 12, 9), "30");
    conn.execute("UPDATE payment_methods SET enabled=0 WHERE id=?1", params![card])
        .unwrap();

    let pending = cards::pending_summaries(&conn, "alice", ts(2025, 6, 15, 12)).unwrap();
    assert!(pending.is_empty());
}

#[test]
fn paid_summaries_keep_last_ten_within_six_months() {
    let conn = setup();
    let card = add_card(&conn, "Visa", Some(10));
    for day in 1..=12 {
        cards::pay_statement(
            &conn,
            "alice",
            card,
            Decimal::from(10 + day),
            ts(2025, 6, day as u32, 9),
            card,
            "statement",
            None,
        )
        .unwrap();
    }
    // too old to show up
    cards::pay_statement(
        &conn,
        "alice",
        card,
        Decimal::from(999),
        ts(2024, 6, 1, 9),
        card,
        "ancient statement",
        None,
    )
    .unwrap();

    let paid = cards::paid_summaries(&conn, "alice", ts(2025, 6, 15, 12)).unwrap();
    assert_eq!(paid.len(), 10);
    assert_eq!(paid[0].date, ts(2025, 6, 12, 9));
    assert!(paid.iter().all(|p| p.amount != Decimal::from(999)));
    assert!(paid.windows(2).all(|w| w[0].date >= w[1].date));
}

#[test]
fn settlement_category_falls_back_from_taxes_to_other() {
    let conn = setup();
    let card = add_card(&conn, "Visa", Some(10));
    conn.execute("DELETE FROM categories WHERE name='Taxes'", [])
        .unwrap();

    cards::pay_statement(
        &conn,
        "alice",
        card,
        Decimal::from(10),
        ts(2025, 6, 1, 9),
        card,
        "statement",
        None,
    )
    .unwrap();
    let cat: String = conn
        .query_row(
            "SELECT c.name FROM transactions t JOIN categories c ON t.category_id=c.id
             WHERE t.is_summary_payment=1",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(cat, "Other");

    conn.execute("DELETE FROM categories WHERE name='Other'", [])
        .unwrap();
    let err = cards::pay_statement(
        &conn,
        "alice",
        card,
        Decimal::from(10),
        ts(2025, 6, 2, 9),
        card,
        "statement",
        None,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::NotFound(_))
    ));
}

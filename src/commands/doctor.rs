// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::Connection;

/// Read-only anomaly scan. Duplicate open cycles and missing period keys are
/// also repaired lazily by their owning reads; this just makes them visible.
pub fn handle(conn: &Connection) -> Result<()> {
    let mut rows = Vec::new();

    // 1) Users with more than one open billing cycle
    let mut stmt = conn.prepare(
        "SELECT user_id, COUNT(*) FROM billing_cycles
         WHERE end_date IS NULL GROUP BY user_id HAVING COUNT(*) > 1",
    )?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let user: String = r.get(0)?;
        let n: i64 = r.get(1)?;
        rows.push(vec!["duplicate_open_cycles".into(), format!("{} ({})", user, n)]);
    }

    // 2) Recurring charges still missing a period key
    let mut stmt2 = conn.prepare(
        "SELECT user_id, name, date FROM taxes WHERE month IS NULL OR year IS NULL",
    )?;
    let mut cur2 = stmt2.query([])?;
    while let Some(r) = cur2.next()? {
        let user: String = r.get(0)?;
        let name: String = r.get(1)?;
        let date: String = r.get(2)?;
        rows.push(vec![
            "missing_period_key".into(),
            format!("{} '{}' {}", user, name, date),
        ]);
    }

    // 3) Card charges whose payment method is not a credit card
    let mut stmt3 = conn.prepare(
        "SELECT t.id FROM transactions t
         LEFT JOIN payment_methods p ON t.card_id=p.id
         WHERE t.is_card_payment=1 AND (p.id IS NULL OR p.kind != 'credit_card')",
    )?;
    let mut cur3 = stmt3.query([])?;
    while let Some(r) = cur3.next()? {
        let id: i64 = r.get(0)?;
        rows.push(vec!["card_charge_without_card".into(), format!("tx {}", id)]);
    }

    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

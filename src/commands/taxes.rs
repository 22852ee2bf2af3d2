// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::EngineError;
use crate::models::Tax;
use crate::utils::{
    active_user, day_start, fmt_ts, maybe_print_json, parse_date, parse_decimal, parse_ts,
    pretty_table,
};
use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::collections::HashSet;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    let user = active_user(conn)?;
    match m.subcommand() {
        Some(("list", sub)) => list(conn, &user, sub)?,
        Some(("add", sub)) => add(conn, &user, sub)?,
        Some(("pay", sub)) => pay(conn, &user, sub)?,
        _ => {}
    }
    Ok(())
}

/// Assign a `(month, year)` period key to every recurring-charge row that
/// lacks one, deriving it from the row's UTC date. When the derived key
/// collides with an existing `(name, month, year)`, the month advances
/// (rolling the year past December) until a free slot is found; no row is
/// ever deleted or merged. All assignments land in one batch write. Returns
/// the number of repaired rows.
pub fn reconcile_periods(conn: &mut Connection, user_id: &str) -> Result<usize> {
    let mut taken: HashSet<(String, u32, i32)> = HashSet::new();
    {
        let mut stmt = conn.prepare(
            "SELECT name, month, year FROM taxes
             WHERE user_id=?1 AND month IS NOT NULL AND year IS NOT NULL",
        )?;
        let mut rows = stmt.query(params![user_id])?;
        while let Some(r) = rows.next()? {
            taken.insert((r.get(0)?, r.get(1)?, r.get(2)?));
        }
    }

    let mut repairs: Vec<(i64, u32, i32)> = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT id, name, date FROM taxes
             WHERE user_id=?1 AND (month IS NULL OR year IS NULL)
             ORDER BY date ASC, id ASC",
        )?;
        let mut rows = stmt.query(params![user_id])?;
        while let Some(r) = rows.next()? {
            let id: i64 = r.get(0)?;
            let name: String = r.get(1)?;
            let date_s: String = r.get(2)?;
            let date = parse_ts(&date_s)?;
            let mut month = date.month0();
            let mut year = date.year();
            while taken.contains(&(name.clone(), month, year)) {
                month += 1;
                if month > 11 {
                    month = 0;
                    year += 1;
                }
            }
            taken.insert((name, month, year));
            repairs.push((id, month, year));
        }
    }

    let repaired = repairs.len();
    let tx = conn.transaction()?;
    for (id, month, year) in repairs {
        tx.execute(
            "UPDATE taxes SET month=?1, year=?2 WHERE id=?3",
            params![month, year, id],
        )
        .context("Failed to reconcile recurring-charge periods")?;
    }
    tx.commit()?;
    Ok(repaired)
}

/// All recurring charges, reconciling missing period keys first.
pub fn list_taxes(conn: &mut Connection, user_id: &str) -> Result<Vec<Tax>> {
    reconcile_periods(conn, user_id)?;
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, date, amount, month, year, is_paid FROM taxes
         WHERE user_id=?1 ORDER BY year DESC, month DESC, name ASC",
    )?;
    let mut rows = stmt.query(params![user_id])?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? {
        let date_s: String = r.get(3)?;
        let amt_s: String = r.get(4)?;
        out.push(Tax {
            id: r.get(0)?,
            user_id: r.get(1)?,
            name: r.get(2)?,
            date: parse_ts(&date_s)?,
            amount: amt_s
                .parse::<Decimal>()
                .with_context(|| format!("Invalid amount '{}' in taxes", amt_s))?,
            month: r.get(5)?,
            year: r.get(6)?,
            is_paid: r.get(7)?,
        });
    }
    Ok(out)
}

fn list(conn: &mut Connection, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let taxes = list_taxes(conn, user)?;
    if !maybe_print_json(json_flag, jsonl_flag, &taxes)? {
        let rows = taxes
            .iter()
            .map(|t| {
                vec![
                    t.id.to_string(),
                    t.name.clone(),
                    match (t.year, t.month) {
                        (Some(y), Some(m)) => format!("{}-{:02}", y, m + 1),
                        _ => "?".into(),
                    },
                    format!("{:.2}", t.amount),
                    if t.is_paid { "paid" } else { "due" }.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Id", "Name", "Period", "Amount", "Status"], rows)
        );
    }
    Ok(())
}

fn add(conn: &mut Connection, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let name = sub.get_one::<String>("name").unwrap().trim();
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap().trim())?;
    let date = match sub.get_one::<String>("date") {
        Some(s) => day_start(parse_date(s.trim())?)?,
        None => Utc::now(),
    };
    // Insert without a period key; the reconciler assigns the next free one,
    // which is also what keeps repeated adds for the same name collision-free.
    conn.execute(
        "INSERT INTO taxes(user_id, name, date, amount) VALUES (?1, ?2, ?3, ?4)",
        params![user, name, fmt_ts(date), amount.to_string()],
    )?;
    reconcile_periods(conn, user)?;
    println!("Added recurring charge '{}' of {}", name, amount);
    Ok(())
}

fn pay(conn: &mut Connection, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let id: i64 = *sub.get_one::<i64>("id").unwrap();
    let changed = conn.execute(
        "UPDATE taxes SET is_paid=1 WHERE id=?1 AND user_id=?2",
        params![id, user],
    )?;
    if changed == 0 {
        return Err(EngineError::NotFound(format!("recurring charge {}", id)).into());
    }
    println!("Marked recurring charge {} as paid", id);
    Ok(())
}

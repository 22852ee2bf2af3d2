// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::EngineError;
use crate::models::BillingCycle;
use crate::utils::{
    active_user, day_start, fmt_ts, maybe_print_json, parse_date, parse_ts, pretty_table,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let user = active_user(conn)?;
    match m.subcommand() {
        Some(("start", sub)) => start(conn, &user, sub)?,
        Some(("current", sub)) => current(conn, &user, sub)?,
        Some(("list", sub)) => list(conn, &user, sub)?,
        Some(("summary", sub)) => summary(conn, &user, sub)?,
        _ => {}
    }
    Ok(())
}

/// The user's current accounting period. With several open cycles on disk
/// (a duplicate-write race), the one with the latest start wins and every
/// other open cycle is closed to just before it, as a side effect of the
/// read. With none open, the most recently started closed cycle is returned.
pub fn current_cycle(conn: &Connection, user_id: &str) -> Result<Option<BillingCycle>> {
    let open = open_cycles(conn, user_id).context("Failed to read billing cycles")?;
    match open.split_first() {
        None => last_closed(conn, user_id),
        Some((canonical, [])) => Ok(Some(canonical.clone())),
        Some((canonical, rest)) => {
            let repaired_end = canonical.start_date - Duration::milliseconds(1);
            for cycle in rest {
                conn.execute(
                    "UPDATE billing_cycles SET end_date=?1 WHERE id=?2",
                    params![fmt_ts(repaired_end), cycle.id],
                )
                .context("Failed to repair duplicate open billing cycles")?;
            }
            Ok(Some(canonical.clone()))
        }
    }
}

/// Open a new cycle starting at `start`, closing every open cycle just
/// before it. Rejects (without touching any row) when an open cycle does not
/// strictly precede the new start.
pub fn start_cycle(
    conn: &Connection,
    user_id: &str,
    start: DateTime<Utc>,
) -> Result<BillingCycle> {
    let open = open_cycles(conn, user_id).context("Failed to read billing cycles")?;
    let candidate_end = start - Duration::milliseconds(1);
    for cycle in &open {
        if cycle.start_date >= candidate_end {
            return Err(EngineError::Validation(format!(
                "new cycle start {} must be strictly after open cycle start {}",
                fmt_ts(start),
                fmt_ts(cycle.start_date)
            ))
            .into());
        }
    }
    for cycle in &open {
        conn.execute(
            "UPDATE billing_cycles SET end_date=?1 WHERE id=?2",
            params![fmt_ts(candidate_end), cycle.id],
        )
        .context("Failed to start new billing cycle")?;
    }
    conn.execute(
        "INSERT INTO billing_cycles(user_id, start_date) VALUES (?1, ?2)",
        params![user_id, fmt_ts(start)],
    )
    .context("Failed to start new billing cycle")?;
    Ok(BillingCycle {
        id: conn.last_insert_rowid(),
        user_id: user_id.to_string(),
        start_date: start,
        end_date: None,
    })
}

/// Income/expense totals of transactions dated inside the current cycle.
pub fn cycle_totals(
    conn: &Connection,
    user_id: &str,
    cycle: &BillingCycle,
    now: DateTime<Utc>,
) -> Result<(Decimal, Decimal)> {
    let upper = cycle.end_date.unwrap_or(now);
    let mut stmt = conn.prepare(
        "SELECT kind, amount FROM transactions
         WHERE user_id=?1 AND date>=?2 AND date<=?3 AND kind IN ('income','expense')",
    )?;
    let mut rows = stmt.query(params![user_id, fmt_ts(cycle.start_date), fmt_ts(upper)])?;
    let mut income = Decimal::ZERO;
    let mut expense = Decimal::ZERO;
    while let Some(r) = rows.next()? {
        let kind: String = r.get(0)?;
        let amt_s: String = r.get(1)?;
        let amt = amt_s
            .parse::<Decimal>()
            .with_context(|| format!("Invalid amount '{}' in transactions", amt_s))?;
        if kind == "income" {
            income += amt;
        } else {
            expense += amt;
        }
    }
    Ok((income, expense))
}

fn open_cycles(conn: &Connection, user_id: &str) -> Result<Vec<BillingCycle>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, start_date, end_date FROM billing_cycles
         WHERE user_id=?1 AND end_date IS NULL ORDER BY start_date DESC",
    )?;
    let mut rows = stmt.query(params![user_id])?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? {
        out.push(row_to_cycle(r)?);
    }
    Ok(out)
}

fn last_closed(conn: &Connection, user_id: &str) -> Result<Option<BillingCycle>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, start_date, end_date FROM billing_cycles
         WHERE user_id=?1 AND end_date IS NOT NULL ORDER BY start_date DESC LIMIT 1",
    )?;
    let mut rows = stmt.query(params![user_id])?;
    match rows.next()? {
        Some(r) => Ok(Some(row_to_cycle(r)?)),
        None => Ok(None),
    }
}

fn row_to_cycle(r: &rusqlite::Row<'_>) -> Result<BillingCycle> {
    let start_s: String = r.get(2)?;
    let end_s: Option<String> = r.get(3)?;
    Ok(BillingCycle {
        id: r.get(0)?,
        user_id: r.get(1)?,
        start_date: parse_ts(&start_s)?,
        end_date: end_s.as_deref().map(parse_ts).transpose()?,
    })
}

fn start(conn: &Connection, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let start = match sub.get_one::<String>("date") {
        Some(s) => day_start(parse_date(s.trim())?)?,
        None => Utc::now(),
    };
    let cycle = start_cycle(conn, user, start)?;
    println!("Started billing cycle #{} at {}", cycle.id, fmt_ts(cycle.start_date));
    Ok(())
}

fn current(conn: &Connection, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    match current_cycle(conn, user)? {
        Some(cycle) => {
            if !maybe_print_json(json_flag, jsonl_flag, &cycle)? {
                let status = if cycle.is_open() { "open" } else { "closed" };
                println!(
                    "Cycle #{} ({}) started {}{}",
                    cycle.id,
                    status,
                    fmt_ts(cycle.start_date),
                    cycle
                        .end_date
                        .map(|e| format!(", ended {}", fmt_ts(e)))
                        .unwrap_or_default()
                );
            }
        }
        None => println!("No billing cycle yet; run 'billfold cycle start'"),
    }
    Ok(())
}

fn list(conn: &Connection, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let mut stmt = conn.prepare(
        "SELECT id, user_id, start_date, end_date FROM billing_cycles
         WHERE user_id=?1 ORDER BY start_date DESC",
    )?;
    let mut rows = stmt.query(params![user])?;
    let mut cycles = Vec::new();
    while let Some(r) = rows.next()? {
        cycles.push(row_to_cycle(r)?);
    }
    if !maybe_print_json(json_flag, jsonl_flag, &cycles)? {
        let data = cycles
            .iter()
            .map(|c| {
                vec![
                    c.id.to_string(),
                    fmt_ts(c.start_date),
                    c.end_date.map(fmt_ts).unwrap_or_else(|| "open".into()),
                ]
            })
            .collect();
        println!("{}", pretty_table(&["Id", "Start", "End"], data));
    }
    Ok(())
}

fn summary(conn: &Connection, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let Some(cycle) = current_cycle(conn, user)? else {
        println!("No billing cycle yet; run 'billfold cycle start'");
        return Ok(());
    };
    let (income, expense) = cycle_totals(conn, user, &cycle, Utc::now())?;
    let net = income - expense;
    if !maybe_print_json(
        json_flag,
        jsonl_flag,
        &serde_json::json!({
            "cycle_id": cycle.id,
            "income": income,
            "expense": expense,
            "net": net,
        }),
    )? {
        let data = vec![vec![
            cycle.id.to_string(),
            format!("{:.2}", income),
            format!("{:.2}", expense),
            format!("{:.2}", net),
        ]];
        println!(
            "{}",
            pretty_table(&["Cycle", "Income", "Expense", "Net"], data)
        );
    }
    Ok(())
}

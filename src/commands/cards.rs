// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::EngineError;
use crate::models::{CardSummary, PaidSummary, PaymentMethod};
use crate::utils::{
    active_user, clamped_day, day_end, day_start, fmt_ts, maybe_print_json, method_by_name,
    parse_date, parse_decimal, parse_ts, pretty_table,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Months, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let user = active_user(conn)?;
    match m.subcommand() {
        Some(("summaries", sub)) => summaries(conn, &user, sub)?,
        Some(("pay", sub)) => pay(conn, &user, sub)?,
        _ => {}
    }
    Ok(())
}

/// The statement window a charge at `now` falls into, for a card closing on
/// `closing_day` of each month. On or before the closing day the window runs
/// from just after last month's closing to this month's; after it, from just
/// after this month's closing to next month's. The closing day is clamped to
/// short months. A card without a closing day has an always-open statement.
pub fn statement_window(
    now: DateTime<Utc>,
    closing_day: Option<u32>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let Some(day) = closing_day else {
        return Ok((DateTime::UNIX_EPOCH, now));
    };
    let close_cur = clamped_day(now.year(), now.month(), day)?;
    let end_cur = day_end(close_cur)?;
    if now > end_cur {
        let start = day_start(close_cur.succ_opt().context("Date overflow")?)?;
        let anchor = clamped_day(now.year(), now.month(), 1)?
            .checked_add_months(Months::new(1))
            .context("Month arithmetic overflow")?;
        let close_next = clamped_day(anchor.year(), anchor.month(), day)?;
        Ok((start, day_end(close_next)?))
    } else {
        let anchor = clamped_day(now.year(), now.month(), 1)?
            .checked_sub_months(Months::new(1))
            .context("Month arithmetic overflow")?;
        let close_prev = clamped_day(anchor.year(), anchor.month(), day)?;
        let start = day_start(close_prev.succ_opt().context("Date overflow")?)?;
        Ok((start, end_cur))
    }
}

/// Unpaid statement totals per enabled credit card, largest first. Cards
/// with no unpaid charge inside their window are omitted.
pub fn pending_summaries(
    conn: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<CardSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, closing_day FROM payment_methods
         WHERE user_id=?1 AND kind='credit_card' AND enabled=1 ORDER BY name",
    )?;
    let mut rows = stmt.query(params![user_id])?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? {
        let card_id: i64 = r.get(0)?;
        let card_name: String = r.get(1)?;
        let closing_day: Option<u32> = r.get(2)?;
        let (start, end) = statement_window(now, closing_day)?;
        let (total, count) = unpaid_in_window(conn, user_id, card_id, start, end)?;
        if count > 0 {
            out.push(CardSummary {
                card_id,
                card_name,
                total,
                charge_count: count,
                window_start: start,
                window_end: end,
            });
        }
    }
    out.sort_by(|a, b| b.total.cmp(&a.total));
    Ok(out)
}

/// Settlement history: the last 10 statement payments within 6 months.
pub fn paid_summaries(
    conn: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<PaidSummary>> {
    let since = now
        .checked_sub_months(Months::new(6))
        .context("Month arithmetic overflow")?;
    let mut stmt = conn.prepare(
        "SELECT id, date, amount, description FROM transactions
         WHERE user_id=?1 AND is_summary_payment=1 AND date>=?2
         ORDER BY date DESC, id DESC LIMIT 10",
    )?;
    let mut rows = stmt.query(params![user_id, fmt_ts(since)])?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? {
        let date_s: String = r.get(1)?;
        let amt_s: String = r.get(2)?;
        out.push(PaidSummary {
            id: r.get(0)?,
            date: parse_ts(&date_s)?,
            amount: amt_s
                .parse::<Decimal>()
                .with_context(|| format!("Invalid amount '{}' in transactions", amt_s))?,
            description: r.get(3)?,
        });
    }
    Ok(out)
}

/// Record a statement payment and settle outstanding charges oldest-first.
/// A charge is either fully covered or left untouched; whatever payment is
/// left after the first charge it cannot cover stays unapplied. Returns how
/// many charges were settled and the unapplied remainder.
#[allow(clippy::too_many_arguments)]
pub fn pay_statement(
    conn: &Connection,
    user_id: &str,
    card_id: i64,
    payment_amount: Decimal,
    date: DateTime<Utc>,
    payment_method_id: i64,
    description: &str,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Result<(usize, Decimal)> {
    if payment_amount <= Decimal::ZERO {
        return Err(
            EngineError::Validation(format!("payment amount {} must be positive", payment_amount))
                .into(),
        );
    }
    let category_id = fallback_category(conn)?;
    conn.execute(
        "INSERT INTO transactions(user_id, date, amount, kind, description, category_id,
                                  payment_method_id, is_card_payment, is_paid, is_summary_payment)
         VALUES (?1, ?2, ?3, 'expense', ?4, ?5, ?6, 0, 1, 1)",
        params![
            user_id,
            fmt_ts(date),
            payment_amount.to_string(),
            description,
            category_id,
            payment_method_id
        ],
    )
    .context("Failed to record statement payment")?;

    let charges = if let Some((start, end)) = window {
        let mut stmt = conn.prepare(
            "SELECT id, amount FROM transactions
             WHERE user_id=?1 AND card_id=?2 AND is_card_payment=1 AND is_paid=0
               AND date>=?3 AND date<=?4
             ORDER BY date ASC, id ASC",
        )?;
        let rows = stmt.query(params![user_id, card_id, fmt_ts(start), fmt_ts(end)])?;
        collect_charges(rows)?
    } else {
        let mut stmt = conn.prepare(
            "SELECT id, amount FROM transactions
             WHERE user_id=?1 AND card_id=?2 AND is_card_payment=1 AND is_paid=0
             ORDER BY date ASC, id ASC",
        )?;
        let rows = stmt.query(params![user_id, card_id])?;
        collect_charges(rows)?
    };

    let mut remaining = payment_amount;
    let mut settled = 0usize;
    for (id, amount) in charges {
        if remaining < amount {
            break;
        }
        conn.execute(
            "UPDATE transactions SET is_paid=1 WHERE id=?1",
            params![id],
        )
        .context("Failed to settle card charge")?;
        remaining -= amount;
        settled += 1;
    }
    Ok((settled, remaining))
}

fn collect_charges(mut rows: rusqlite::Rows<'_>) -> Result<Vec<(i64, Decimal)>> {
    let mut charges = Vec::new();
    while let Some(r) = rows.next()? {
        let id: i64 = r.get(0)?;
        let amt_s: String = r.get(1)?;
        let amt = amt_s
            .parse::<Decimal>()
            .with_context(|| format!("Invalid amount '{}' in transactions", amt_s))?;
        charges.push((id, amt));
    }
    Ok(charges)
}

fn unpaid_in_window(
    conn: &Connection,
    user_id: &str,
    card_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(Decimal, usize)> {
    let mut stmt = conn.prepare_cached(
        "SELECT amount FROM transactions
         WHERE user_id=?1 AND card_id=?2 AND is_card_payment=1 AND is_paid=0
           AND date>=?3 AND date<=?4",
    )?;
    let mut rows = stmt.query(params![user_id, card_id, fmt_ts(start), fmt_ts(end)])?;
    let mut total = Decimal::ZERO;
    let mut count = 0usize;
    while let Some(r) = rows.next()? {
        let amt_s: String = r.get(0)?;
        total += amt_s
            .parse::<Decimal>()
            .with_context(|| format!("Invalid amount '{}' in transactions", amt_s))?;
        count += 1;
    }
    Ok((total, count))
}

fn fallback_category(conn: &Connection) -> Result<i64> {
    for name in ["Taxes", "Other"] {
        let id: Option<i64> = conn
            .query_row("SELECT id FROM categories WHERE name=?1", params![name], |r| {
                r.get(0)
            })
            .optional()?;
        if let Some(id) = id {
            return Ok(id);
        }
    }
    Err(EngineError::NotFound("no 'Taxes' or 'Other' category for statement payments".into()).into())
}

fn require_card(conn: &Connection, user: &str, name: &str) -> Result<PaymentMethod> {
    let method = method_by_name(conn, user, name)?;
    if !method.is_credit_card() {
        return Err(
            EngineError::Validation(format!("'{}' is not a credit card", method.name)).into(),
        );
    }
    Ok(method)
}

fn summaries(conn: &Connection, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let now = Utc::now();
    let pending = pending_summaries(conn, user, now)?;
    let paid = paid_summaries(conn, user, now)?;
    if !maybe_print_json(
        json_flag,
        jsonl_flag,
        &serde_json::json!({ "pending": pending, "paid": paid }),
    )? {
        let pending_rows = pending
            .iter()
            .map(|s| {
                vec![
                    s.card_name.clone(),
                    format!("{:.2}", s.total),
                    s.charge_count.to_string(),
                    fmt_ts(s.window_start),
                    fmt_ts(s.window_end),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Card", "Unpaid", "Charges", "Window start", "Window end"],
                pending_rows
            )
        );
        let paid_rows = paid
            .iter()
            .map(|p| {
                vec![
                    fmt_ts(p.date),
                    format!("{:.2}", p.amount),
                    p.description.clone(),
                ]
            })
            .collect();
        println!("{}", pretty_table(&["Paid on", "Amount", "Description"], paid_rows));
    }
    Ok(())
}

fn pay(conn: &Connection, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let card_name = sub.get_one::<String>("card").unwrap().trim();
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap().trim())?;
    let method_name = sub.get_one::<String>("method").unwrap().trim();
    let description = sub
        .get_one::<String>("description")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| format!("{} statement payment", card_name));
    let date = match sub.get_one::<String>("date") {
        Some(s) => day_start(parse_date(s.trim())?)?,
        None => Utc::now(),
    };

    let card = require_card(conn, user, card_name)?;
    let method = method_by_name(conn, user, method_name)?;
    let window = if sub.get_flag("current-window") {
        Some(statement_window(Utc::now(), card.closing_day)?)
    } else {
        None
    };

    let (settled, remaining) = pay_statement(
        conn,
        user,
        card.id,
        amount,
        date,
        method.id,
        &description,
        window,
    )?;
    println!(
        "Paid {} toward '{}': {} charge(s) settled",
        amount, card.name, settled
    );
    if !remaining.is_zero() {
        println!("Note: {} of the payment was not applied to any charge", remaining);
    }
    Ok(())
}

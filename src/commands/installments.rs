// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::EngineError;
use crate::models::{InstallmentDetails, InstallmentGroup, MonthBucket, Transaction};
use crate::utils::{
    active_user, add_months, clamped_day, day_start, fmt_ts, maybe_print_json, method_by_id,
    method_by_name, month_key, parse_date, parse_decimal, parse_ts, pretty_table,
};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::collections::HashMap;

static ANNOTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(\d+/\d+\)$").unwrap());

pub struct InstallmentInput {
    pub description: String,
    pub total: Decimal,
    pub count: u32,
    pub start: NaiveDate,
    pub category_id: Option<i64>,
    pub payment_method_id: i64,
    pub billing_cycle_id: Option<i64>,
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    let user = active_user(conn)?;
    match m.subcommand() {
        Some(("list", sub)) => list(conn, &user, sub)?,
        Some(("projection", sub)) => projection(conn, &user, sub)?,
        Some(("update", sub)) => update(conn, &user, sub)?,
        Some(("rm", sub)) => remove(conn, &user, sub)?,
        _ => {}
    }
    Ok(())
}

/// Split one purchase into `count` monthly charges sharing a fresh group id.
/// Each installment is the 2dp-rounded even split; the last one absorbs the
/// rounding residue so the group always sums to the purchase total. Returns
/// the first created transaction.
pub fn create_installments(
    conn: &mut Connection,
    user_id: &str,
    input: &InstallmentInput,
) -> Result<Transaction> {
    validate(conn, user_id, input)?;
    let group_id: String =
        conn.query_row("SELECT lower(hex(randomblob(16)))", [], |r| r.get(0))?;
    let tx = conn.transaction()?;
    let first = insert_group(&tx, user_id, &group_id, input)
        .context("Failed to create installment purchase")?;
    tx.commit()?;
    Ok(first)
}

/// Replace-not-patch: drop the whole group and regenerate it from the new
/// values. Member ids change; a fresh group id is issued.
pub fn update_installments(
    conn: &mut Connection,
    user_id: &str,
    group_id: &str,
    input: &InstallmentInput,
) -> Result<Transaction> {
    validate(conn, user_id, input)?;
    let new_group: String =
        conn.query_row("SELECT lower(hex(randomblob(16)))", [], |r| r.get(0))?;
    let tx = conn.transaction()?;
    let removed = tx.execute(
        "DELETE FROM transactions WHERE user_id=?1 AND group_id=?2",
        params![user_id, group_id],
    )?;
    if removed == 0 {
        return Err(EngineError::NotFound(format!("installment group '{}'", group_id)).into());
    }
    let first = insert_group(&tx, user_id, &new_group, input)
        .context("Failed to update installment purchase")?;
    tx.commit()?;
    Ok(first)
}

/// Deleting any member deletes every sibling in the group.
pub fn delete_installments(conn: &Connection, user_id: &str, group_id: &str) -> Result<usize> {
    let removed = conn
        .execute(
            "DELETE FROM transactions WHERE user_id=?1 AND group_id=?2",
            params![user_id, group_id],
        )
        .context("Failed to delete installment purchase")?;
    if removed == 0 {
        return Err(EngineError::NotFound(format!("installment group '{}'", group_id)).into());
    }
    Ok(removed)
}

fn validate(conn: &Connection, user_id: &str, input: &InstallmentInput) -> Result<()> {
    if input.count < 1 {
        return Err(EngineError::Validation("installment count must be at least 1".into()).into());
    }
    if input.total <= Decimal::ZERO {
        return Err(
            EngineError::Validation(format!("total {} must be positive", input.total)).into(),
        );
    }
    let method = method_by_id(conn, user_id, input.payment_method_id)?;
    if !method.is_credit_card() {
        return Err(EngineError::Validation(format!(
            "installment purchases require a credit card, '{}' is not one",
            method.name
        ))
        .into());
    }
    Ok(())
}

fn insert_group(
    conn: &Connection,
    user_id: &str,
    group_id: &str,
    input: &InstallmentInput,
) -> Result<Transaction> {
    let count = input.count;
    let per = (input.total / Decimal::from(count)).round_dp(2);
    let last = input.total - per * Decimal::from(count - 1);
    let mut first: Option<Transaction> = None;
    for i in 0..count {
        let date = day_start(add_months(input.start, i as i32)?)?;
        let amount = if i == count - 1 { last } else { per };
        let description = format!("{} ({}/{})", input.description, i + 1, count);
        conn.execute(
            "INSERT INTO transactions(user_id, date, amount, kind, description, category_id,
                                      payment_method_id, group_id, card_id, is_card_payment,
                                      is_paid, is_summary_payment, billing_cycle_id)
             VALUES (?1, ?2, ?3, 'expense', ?4, ?5, ?6, ?7, ?6, 1, 0, 0, ?8)",
            params![
                user_id,
                fmt_ts(date),
                amount.to_string(),
                description,
                input.category_id,
                input.payment_method_id,
                group_id,
                input.billing_cycle_id
            ],
        )?;
        if first.is_none() {
            first = Some(Transaction {
                id: conn.last_insert_rowid(),
                user_id: user_id.to_string(),
                date,
                amount,
                kind: "expense".to_string(),
                description,
                category_id: input.category_id,
                payment_method_id: Some(input.payment_method_id),
                group_id: Some(group_id.to_string()),
                card_id: Some(input.payment_method_id),
                is_card_payment: true,
                is_paid: false,
                is_summary_payment: false,
                savings_fund_id: None,
                billing_cycle_id: input.billing_cycle_id,
            });
        }
    }
    first.context("Installment group produced no rows")
}

/// Re-aggregate every installment group into pending/completed views.
pub fn installment_details(
    conn: &Connection,
    user_id: &str,
    today: NaiveDate,
) -> Result<InstallmentDetails> {
    let mut stmt = conn.prepare(
        "SELECT group_id, date, amount, description FROM transactions
         WHERE user_id=?1 AND kind='expense' AND group_id IS NOT NULL
         ORDER BY date ASC, id ASC",
    )?;
    let mut rows = stmt.query(params![user_id])?;
    let mut groups: HashMap<String, Vec<(NaiveDate, Decimal, String)>> = HashMap::new();
    while let Some(r) = rows.next()? {
        let group_id: String = r.get(0)?;
        let date_s: String = r.get(1)?;
        let amt_s: String = r.get(2)?;
        let description: String = r.get(3)?;
        let date = parse_ts(&date_s)?.date_naive();
        let amount = amt_s
            .parse::<Decimal>()
            .with_context(|| format!("Invalid amount '{}' in transactions", amt_s))?;
        groups
            .entry(group_id)
            .or_default()
            .push((date, amount, description));
    }

    let month_start = clamped_day(today.year(), today.month(), 1)?;
    let month_end = clamped_day(today.year(), today.month(), 31)?;
    let mut pending = Vec::new();
    let mut completed = Vec::new();
    for (group_id, members) in groups {
        // ORDER BY in the query keeps members date-sorted
        let count = members.len();
        let (first_date, per_installment, first_desc) = members[0].clone();
        let last_date = members[count - 1].0;
        let current_index = members.iter().filter(|(d, _, _)| *d <= month_end).count();
        let pending_amount: Decimal = members
            .iter()
            .filter(|(d, _, _)| *d >= month_start)
            .map(|(_, a, _)| *a)
            .sum();
        let group = InstallmentGroup {
            group_id,
            description: ANNOTATION.replace(&first_desc, "").into_owned(),
            per_installment,
            installment_count: count,
            current_index,
            pending_amount,
            first_date,
            last_date,
            completed: last_date < today,
        };
        if group.completed {
            completed.push(group);
        } else {
            pending.push(group);
        }
    }
    pending.sort_by(|a, b| b.pending_amount.cmp(&a.pending_amount));
    completed.sort_by(|a, b| b.last_date.cmp(&a.last_date));
    Ok(InstallmentDetails { pending, completed })
}

/// Installment load per calendar month over a fixed 12-bucket window,
/// 6 months back through 5 months forward of `today`. Months with no
/// installment activity appear as zero.
pub fn installment_projection(
    conn: &Connection,
    user_id: &str,
    today: NaiveDate,
) -> Result<Vec<MonthBucket>> {
    let anchor = clamped_day(today.year(), today.month(), 1)?;
    let window_start = day_start(add_months(anchor, -6)?)?;
    let last_month = add_months(anchor, 5)?;
    let window_end = day_start(add_months(last_month, 1)?)?;

    let mut stmt = conn.prepare(
        "SELECT date, amount FROM transactions
         WHERE user_id=?1 AND kind='expense' AND group_id IS NOT NULL
           AND date>=?2 AND date<?3",
    )?;
    let mut rows = stmt.query(params![user_id, fmt_ts(window_start), fmt_ts(window_end)])?;
    let mut by_month: HashMap<(i32, u32), Decimal> = HashMap::new();
    while let Some(r) = rows.next()? {
        let date_s: String = r.get(0)?;
        let amt_s: String = r.get(1)?;
        let date = parse_ts(&date_s)?.date_naive();
        let amount = amt_s
            .parse::<Decimal>()
            .with_context(|| format!("Invalid amount '{}' in transactions", amt_s))?;
        *by_month.entry(month_key(date)).or_insert(Decimal::ZERO) += amount;
    }

    let mut buckets = Vec::with_capacity(12);
    for i in -6..=5 {
        let month = add_months(anchor, i)?;
        let key = month_key(month);
        buckets.push(MonthBucket {
            year: key.0,
            month: key.1,
            total: by_month.get(&key).copied().unwrap_or(Decimal::ZERO),
        });
    }
    Ok(buckets)
}

fn list(conn: &Connection, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let details = installment_details(conn, user, Utc::now().date_naive())?;
    if !maybe_print_json(json_flag, jsonl_flag, &details)? {
        let row = |g: &InstallmentGroup| {
            vec![
                g.group_id[..8.min(g.group_id.len())].to_string(),
                g.description.clone(),
                format!("{:.2}", g.per_installment),
                format!("{}/{}", g.current_index, g.installment_count),
                format!("{:.2}", g.pending_amount),
                g.last_date.to_string(),
            ]
        };
        let headers = &["Group", "Description", "Per", "Progress", "Pending", "Last"];
        println!(
            "{}",
            pretty_table(headers, details.pending.iter().map(row).collect())
        );
        if !details.completed.is_empty() {
            println!(
                "{}",
                pretty_table(headers, details.completed.iter().map(row).collect())
            );
        }
    }
    Ok(())
}

fn projection(conn: &Connection, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let buckets = installment_projection(conn, user, Utc::now().date_naive())?;
    if !maybe_print_json(json_flag, jsonl_flag, &buckets)? {
        let rows = buckets
            .iter()
            .map(|b| {
                vec![
                    format!("{}-{:02}", b.year, b.month),
                    format!("{:.2}", b.total),
                ]
            })
            .collect();
        println!("{}", pretty_table(&["Month", "Installments"], rows));
    }
    Ok(())
}

fn update(conn: &mut Connection, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let group_id = resolve_group(conn, user, sub.get_one::<String>("group").unwrap().trim())?;
    let description = sub.get_one::<String>("description").unwrap().trim();
    let total = parse_decimal(sub.get_one::<String>("amount").unwrap().trim())?;
    let count: u32 = *sub.get_one::<u32>("count").unwrap();
    let start = parse_date(sub.get_one::<String>("start").unwrap().trim())?;
    let method = method_by_name(conn, user, sub.get_one::<String>("method").unwrap().trim())?;
    let category_id = match sub.get_one::<String>("category") {
        Some(name) => Some(crate::utils::id_for_category(conn, name.trim())?),
        None => None,
    };
    let input = InstallmentInput {
        description: description.to_string(),
        total,
        count,
        start,
        category_id,
        payment_method_id: method.id,
        billing_cycle_id: None,
    };
    let first = update_installments(conn, user, &group_id, &input)?;
    println!(
        "Rebuilt installment purchase '{}' as {} x {} (group {})",
        description,
        count,
        first.amount,
        first.group_id.as_deref().unwrap_or("?")
    );
    Ok(())
}

fn remove(conn: &mut Connection, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let group_id = resolve_group(conn, user, sub.get_one::<String>("group").unwrap().trim())?;
    let removed = delete_installments(conn, user, &group_id)?;
    println!("Removed {} installment(s) of group {}", removed, group_id);
    Ok(())
}

/// Accept a full group id or an unambiguous prefix (the listing shows the
/// first 8 hex chars).
fn resolve_group(conn: &Connection, user: &str, prefix: &str) -> Result<String> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT group_id FROM transactions
         WHERE user_id=?1 AND group_id LIKE ?2 || '%'",
    )?;
    let mut rows = stmt.query(params![user, prefix])?;
    let mut matches = Vec::new();
    while let Some(r) = rows.next()? {
        matches.push(r.get::<_, String>(0)?);
    }
    match matches.len() {
        0 => Err(EngineError::NotFound(format!("installment group '{}'", prefix)).into()),
        1 => Ok(matches.remove(0)),
        n => Err(EngineError::Validation(format!(
            "group prefix '{}' is ambiguous ({} matches)",
            prefix, n
        ))
        .into()),
    }
}

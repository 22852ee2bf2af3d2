// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{cycles, installments};
use crate::errors::EngineError;
use crate::utils::{
    active_user, day_start, fmt_ts, id_for_category, maybe_print_json, method_by_name, parse_date,
    parse_decimal, pretty_table,
};
use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

const KINDS: [&str; 4] = ["income", "expense", "deposit", "withdrawal"];

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => remove(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn add(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user = active_user(conn)?;
    let date = match sub.get_one::<String>("date") {
        Some(s) => day_start(parse_date(s.trim())?)?,
        None => Utc::now(),
    };
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap().trim())?;
    let kind = sub
        .get_one::<String>("kind")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "expense".into());
    if !KINDS.contains(&kind.as_str()) {
        return Err(EngineError::Validation(format!(
            "unknown kind '{}', expected one of {}",
            kind,
            KINDS.join("|")
        ))
        .into());
    }
    let description = sub.get_one::<String>("description").unwrap().trim();
    let category_id = match sub.get_one::<String>("category") {
        Some(name) => Some(id_for_category(conn, name.trim())?),
        None => None,
    };
    let method = match sub.get_one::<String>("method") {
        Some(name) => Some(method_by_name(conn, &user, name.trim())?),
        None => None,
    };
    let cycle_id = cycles::current_cycle(conn, &user)?
        .filter(|c| c.is_open())
        .map(|c| c.id);

    if let Some(count) = sub.get_one::<u32>("installments") {
        let method = method.ok_or_else(|| {
            EngineError::Validation("installment purchases require --method".into())
        })?;
        let input = installments::InstallmentInput {
            description: description.to_string(),
            total: amount,
            count: *count,
            start: date.date_naive(),
            category_id,
            payment_method_id: method.id,
            billing_cycle_id: cycle_id,
        };
        let first = installments::create_installments(conn, &user, &input)?;
        println!(
            "Recorded {} as {} installment(s) of {} (group {})",
            amount,
            count,
            first.amount,
            first.group_id.as_deref().unwrap_or("?")
        );
        return Ok(());
    }

    let is_card = method.as_ref().is_some_and(|m| m.is_credit_card());
    let card_id = method.as_ref().filter(|m| m.is_credit_card()).map(|m| m.id);
    conn.execute(
        "INSERT INTO transactions(user_id, date, amount, kind, description, category_id,
                                  payment_method_id, card_id, is_card_payment, is_paid,
                                  is_summary_payment, billing_cycle_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 0, ?10)",
        params![
            user,
            fmt_ts(date),
            amount.to_string(),
            kind,
            description,
            category_id,
            method.as_ref().map(|m| m.id),
            card_id,
            is_card,
            cycle_id
        ],
    )?;
    println!("Recorded {} {} '{}'", kind, amount, description);
    Ok(())
}

#[derive(Serialize)]
pub struct TransactionRow {
    pub id: i64,
    pub date: String,
    pub kind: String,
    pub amount: String,
    pub description: String,
    pub category: String,
    pub method: String,
    pub group_id: String,
    pub paid: bool,
}

pub fn query_rows(conn: &Connection, sub: &clap::ArgMatches) -> Result<Vec<TransactionRow>> {
    let user = active_user(conn)?;
    let mut sql = String::from(
        "SELECT t.id, t.date, t.kind, t.amount, t.description, c.name, p.name, t.group_id, t.is_paid
         FROM transactions t
         LEFT JOIN categories c ON t.category_id=c.id
         LEFT JOIN payment_methods p ON t.payment_method_id=p.id
         WHERE t.user_id=?",
    );
    let mut params_vec: Vec<String> = vec![user];

    if let Some(month) = sub.get_one::<String>("month") {
        sql.push_str(" AND substr(t.date,1,7)=?");
        params_vec.push(month.into());
    }
    if let Some(kind) = sub.get_one::<String>("kind") {
        sql.push_str(" AND t.kind=?");
        params_vec.push(kind.into());
    }
    if let Some(card) = sub.get_one::<String>("card") {
        sql.push_str(" AND p.name=? AND t.is_card_payment=1");
        params_vec.push(card.into());
    }
    sql.push_str(" ORDER BY t.date DESC, t.id DESC");
    if let Some(limit) = sub.get_one::<usize>("limit") {
        sql.push_str(" LIMIT ?");
        params_vec.push(limit.to_string());
    }

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::ToSql> = params_vec
        .iter()
        .map(|s| s as &dyn rusqlite::ToSql)
        .collect();
    let mut rows = stmt.query(rusqlite::params_from_iter(params))?;

    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        let category: Option<String> = r.get(5)?;
        let method: Option<String> = r.get(6)?;
        let group_id: Option<String> = r.get(7)?;
        data.push(TransactionRow {
            id: r.get(0)?,
            date: r.get(1)?,
            kind: r.get(2)?,
            amount: r.get(3)?,
            description: r.get(4)?,
            category: category.unwrap_or_default(),
            method: method.unwrap_or_default(),
            group_id: group_id.unwrap_or_default(),
            paid: r.get(8)?,
        });
    }
    Ok(data)
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let data = query_rows(conn, sub)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.date.clone(),
                    r.kind.clone(),
                    r.amount.clone(),
                    r.description.clone(),
                    r.category.clone(),
                    r.method.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Id", "Date", "Kind", "Amount", "Description", "Category", "Method"],
                rows,
            )
        );
    }
    Ok(())
}

/// Removing a transaction that belongs to an installment group removes the
/// whole group, never a lone member.
fn remove(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user = active_user(conn)?;
    let id: i64 = *sub.get_one::<i64>("id").unwrap();
    let group_id: Option<Option<String>> = conn
        .query_row(
            "SELECT group_id FROM transactions WHERE id=?1 AND user_id=?2",
            params![id, user],
            |r| r.get(0),
        )
        .optional()?;
    match group_id {
        None => Err(EngineError::NotFound(format!("transaction {}", id)).into()),
        Some(Some(group)) => {
            let removed = installments::delete_installments(conn, &user, &group)?;
            println!("Removed installment group {} ({} transactions)", group, removed);
            Ok(())
        }
        Some(None) => {
            conn.execute(
                "DELETE FROM transactions WHERE id=?1 AND user_id=?2",
                params![id, user],
            )?;
            println!("Removed transaction {}", id);
            Ok(())
        }
    }
}

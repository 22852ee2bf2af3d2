// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::active_user;
use anyhow::Result;
use rusqlite::{params, Connection};
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => export_transactions(conn, sub),
        _ => Ok(()),
    }
}

fn export_transactions(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
    let out = sub.get_one::<String>("out").unwrap();
    let user = active_user(conn)?;

    let mut stmt = conn.prepare(
        "SELECT t.date, t.kind, t.amount, t.description, c.name as category,
                p.name as method, t.group_id, t.is_paid
         FROM transactions t
         LEFT JOIN categories c ON t.category_id=c.id
         LEFT JOIN payment_methods p ON t.payment_method_id=p.id
         WHERE t.user_id=?1
         ORDER BY t.date, t.id",
    )?;
    let rows = stmt.query_map(params![user], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, Option<String>>(4)?,
            r.get::<_, Option<String>>(5)?,
            r.get::<_, Option<String>>(6)?,
            r.get::<_, bool>(7)?,
        ))
    })?;

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record([
                "date", "kind", "amount", "description", "category", "method", "group", "paid",
            ])?;
            for row in rows {
                let (d, k, amt, desc, cat, meth, group, paid) = row?;
                wtr.write_record([
                    d,
                    k,
                    amt,
                    desc,
                    cat.unwrap_or_default(),
                    meth.unwrap_or_default(),
                    group.unwrap_or_default(),
                    paid.to_string(),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            let mut items = Vec::new();
            for row in rows {
                let (d, k, amt, desc, cat, meth, group, paid) = row?;
                items.push(json!({
                    "date": d, "kind": k, "amount": amt, "description": desc,
                    "category": cat, "method": meth, "group": group, "paid": paid
                }));
            }
            std::fs::write(out, serde_json::to_string_pretty(&items)?)?;
        }
        _ => {
            eprintln!("Unknown format: {} (use csv|json)", fmt);
        }
    }
    println!("Exported transactions to {}", out);
    Ok(())
}

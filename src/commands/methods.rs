// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::EngineError;
use crate::utils::{active_user, pretty_table};
use anyhow::Result;
use rusqlite::{params, Connection};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let user = active_user(conn)?;
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = sub.get_one::<String>("name").unwrap().trim();
            let kind = sub.get_one::<String>("kind").unwrap().trim();
            let closing_day = sub.get_one::<u32>("closing-day").copied();
            if let Some(day) = closing_day {
                if kind != "credit_card" {
                    return Err(EngineError::Validation(
                        "--closing-day only applies to credit_card methods".into(),
                    )
                    .into());
                }
                if !(1..=31).contains(&day) {
                    return Err(EngineError::Validation(format!(
                        "closing day {} must be between 1 and 31",
                        day
                    ))
                    .into());
                }
            }
            conn.execute(
                "INSERT INTO payment_methods(user_id, name, kind, closing_day) VALUES (?1, ?2, ?3, ?4)",
                params![user, name, kind, closing_day],
            )?;
            println!("Added payment method '{}' ({})", name, kind);
        }
        Some(("list", _)) => {
            let mut stmt = conn.prepare(
                "SELECT name, kind, closing_day, enabled FROM payment_methods
                 WHERE user_id=?1 ORDER BY name",
            )?;
            let rows = stmt.query_map(params![user], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, Option<u32>>(2)?,
                    r.get::<_, bool>(3)?,
                ))
            })?;
            let mut data = Vec::new();
            for row in rows {
                let (n, k, d, e) = row?;
                data.push(vec![
                    n,
                    k,
                    d.map(|d| d.to_string()).unwrap_or_default(),
                    if e { "yes" } else { "no" }.to_string(),
                ]);
            }
            println!(
                "{}",
                pretty_table(&["Name", "Kind", "Closing day", "Enabled"], data)
            );
        }
        Some(("disable", sub)) => {
            let name = sub.get_one::<String>("name").unwrap().trim();
            conn.execute(
                "UPDATE payment_methods SET enabled=0 WHERE user_id=?1 AND name=?2",
                params![user, name],
            )?;
            println!("Disabled payment method '{}'", name);
        }
        _ => {}
    }
    Ok(())
}

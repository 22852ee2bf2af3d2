// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::EngineError;
use crate::models::PaymentMethod;
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Months, NaiveDate, SecondsFormat, TimeZone, Utc};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

/// Timestamps are stored as fixed-width RFC3339 UTC strings with millisecond
/// precision, so lexicographic order in SQL equals chronological order.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    let fixed = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp '{}', expected RFC3339", s))?;
    Ok(fixed.with_timezone(&Utc))
}

/// Midnight UTC at the start of `date`.
pub fn day_start(date: NaiveDate) -> Result<DateTime<Utc>> {
    let dt = date
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("Invalid date {}", date))?;
    Ok(Utc.from_utc_datetime(&dt))
}

/// Last representable millisecond of `date` in UTC.
pub fn day_end(date: NaiveDate) -> Result<DateTime<Utc>> {
    let dt = date
        .and_hms_milli_opt(23, 59, 59, 999)
        .with_context(|| format!("Invalid date {}", date))?;
    Ok(Utc.from_utc_datetime(&dt))
}

pub fn add_months(date: NaiveDate, months: i32) -> Result<NaiveDate> {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new((-months) as u32))
    };
    shifted.with_context(|| format!("Month arithmetic overflow: {} {:+}", date, months))
}

/// The `day`-th of the given month, clamped to the month's length
/// (day 31 in February yields February's last day).
pub fn clamped_day(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
        return Ok(d);
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .with_context(|| format!("Invalid month {}-{}", year, month))?;
    let next = add_months(first, 1)?;
    Ok(next.pred_opt().context("Date underflow")?)
}

pub fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

pub fn id_for_category(conn: &Connection, name: &str) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT id FROM categories WHERE name=?1")?;
    let id: i64 = stmt
        .query_row(params![name], |r| r.get(0))
        .with_context(|| format!("Category '{}' not found", name))?;
    Ok(id)
}

pub fn method_by_id(conn: &Connection, user_id: &str, id: i64) -> Result<PaymentMethod> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, kind, closing_day, enabled
         FROM payment_methods WHERE id=?1 AND user_id=?2",
    )?;
    let m = stmt
        .query_row(params![id, user_id], row_to_method)
        .optional()?;
    m.ok_or_else(|| EngineError::NotFound(format!("payment method {}", id)).into())
}

pub fn method_by_name(conn: &Connection, user_id: &str, name: &str) -> Result<PaymentMethod> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, kind, closing_day, enabled
         FROM payment_methods WHERE user_id=?1 AND name=?2",
    )?;
    let m = stmt
        .query_row(params![user_id, name], row_to_method)
        .optional()?;
    m.ok_or_else(|| EngineError::NotFound(format!("payment method '{}'", name)).into())
}

fn row_to_method(r: &rusqlite::Row<'_>) -> rusqlite::Result<PaymentMethod> {
    Ok(PaymentMethod {
        id: r.get(0)?,
        user_id: r.get(1)?,
        name: r.get(2)?,
        kind: r.get(3)?,
        closing_day: r.get(4)?,
        enabled: r.get(5)?,
    })
}

// Acting-user settings
pub fn active_user(conn: &Connection) -> Result<String> {
    let v: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key='active_user'",
            [],
            |r| r.get(0),
        )
        .optional()?;
    Ok(v.unwrap_or_else(|| "default".to_string()))
}

pub fn set_active_user(conn: &Connection, user: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES('active_user', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![user],
    )?;
    Ok(())
}

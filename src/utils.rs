// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

const UA: &str = concat!(
    "costbook/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/alphavelocity/costbook)"
);

pub fn http_client() -> Result<reqwest::blocking::Client> {
    let c = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .user_agent(UA)
        .build()?;
    Ok(c)
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| {
        format!("Invalid date '{}', expected YYYY-MM-DD or RFC 3339", s)
    })?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("Invalid date '{}'", s))?;
    Ok(midnight.and_utc())
}

/// Canonical storage form; sorts lexicographically in time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s.trim()))
}

pub fn stored_decimal(s: &str, field: &str, row_id: i64) -> Result<Decimal> {
    Decimal::from_str_exact(s)
        .with_context(|| format!("Invalid stored {} '{}' in row {}", field, s, row_id))
}

pub fn fmt_decimal(d: &Decimal, dp: u32) -> String {
    format!("{:.*}", dp as usize, d.round_dp(dp))
}

pub fn fmt_optional(d: Option<Decimal>, dp: u32) -> String {
    d.map(|v| fmt_decimal(&v, dp)).unwrap_or_else(|| "-".to_string())
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

pub fn id_for_account(conn: &Connection, name: &str) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT id FROM accounts WHERE name=?1")?;
    let id: i64 = stmt
        .query_row(params![name], |r| r.get(0))
        .with_context(|| format!("Account '{}' not found", name))?;
    Ok(id)
}

pub fn id_for_asset(conn: &Connection, ticker: &str) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT id FROM assets WHERE ticker=?1")?;
    let id: i64 = stmt
        .query_row(params![ticker], |r| r.get(0))
        .with_context(|| format!("Asset '{}' not found", ticker))?;
    Ok(id)
}

/// Trimmed value of a required string argument.
pub fn required_arg(m: &clap::ArgMatches, name: &str) -> Result<String> {
    m.get_one::<String>(name)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow!("Missing required argument --{}", name))
}

pub fn optional_arg(m: &clap::ArgMatches, name: &str) -> Option<String> {
    m.get_one::<String>(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn timestamps_accept_dates_and_rfc3339() {
        let day = parse_timestamp(" 2025-01-02 ").unwrap();
        assert_eq!(day, Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap());

        let offset = parse_timestamp("2025-01-02T10:30:00+02:00").unwrap();
        assert_eq!(offset, Utc.with_ymd_and_hms(2025, 1, 2, 8, 30, 0).unwrap());
        assert_eq!(format_timestamp(&offset), "2025-01-02T08:30:00Z");

        let err = parse_timestamp("02/01/2025").unwrap_err();
        assert!(err.to_string().contains("Invalid date '02/01/2025'"));
    }

    #[test]
    fn decimals_are_trimmed_and_formatted() {
        assert_eq!(parse_decimal(" 1.50 ").unwrap(), dec!(1.5));
        assert!(parse_decimal("abc").is_err());
        assert_eq!(fmt_decimal(&dec!(752.5), 2), "752.50");
        assert_eq!(fmt_decimal(&dec!(1.005), 2), "1.00");
        assert_eq!(fmt_optional(None, 2), "-");
    }

    #[test]
    fn stored_decimal_names_the_row() {
        let err = stored_decimal("x", "price", 12).unwrap_err();
        assert_eq!(err.to_string(), "Invalid stored price 'x' in row 12");
    }
}

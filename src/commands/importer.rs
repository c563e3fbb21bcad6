// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::transactions::record_transactions;
use crate::models::{NewTransaction, Side};
use crate::utils::{id_for_account, id_for_asset, parse_decimal, parse_timestamp, required_arg};
use crate::validation::{normalize_ticker, validate_trade};
use anyhow::{Context, Result, anyhow, bail};
use csv::{ReaderBuilder, StringRecord, Trim};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::{HashMap, hash_map::Entry};

const REQUIRED_COLUMNS: [&str; 5] = ["symbol", "type", "quantity", "price", "date"];

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => {
            let account = required_arg(sub, "account")?;
            let path = required_arg(sub, "path")?;
            let count = import_transactions(conn, &account, &path, sub.get_flag("strict"))?;
            println!("Imported {} transactions from {}", count, path);
            Ok(())
        }
        _ => Ok(()),
    }
}

struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !index.contains_key(*c))
            .collect();
        if !missing.is_empty() {
            bail!("Missing required columns: {}", missing.join(", "));
        }
        Ok(Self { index })
    }

    fn get<'r>(&self, rec: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.index
            .get(column)
            .and_then(|&i| rec.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn require<'r>(&self, rec: &'r StringRecord, column: &str) -> Result<&'r str> {
        self.get(rec, column)
            .ok_or_else(|| anyhow!("{} is required", column))
    }
}

/// Imports a CSV of trades into `account`. Every row is validated first; if any
/// row is bad nothing is written and all row errors are reported together.
pub fn import_transactions(
    conn: &Connection,
    account: &str,
    path: &str,
    strict: bool,
) -> Result<usize> {
    let account_id = id_for_account(conn, account)?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path))?;
    let columns = Columns::from_headers(rdr.headers()?)?;

    let mut asset_cache: HashMap<String, i64> = HashMap::new();
    let mut batch = Vec::new();
    let mut errors = Vec::new();

    for (i, result) in rdr.records().enumerate() {
        // header is line 1
        let line = i + 2;
        let rec = result.with_context(|| format!("Row {}: unreadable CSV record", line))?;
        match parse_row(conn, &columns, &rec, account_id, &mut asset_cache) {
            Ok(new) => batch.push(new),
            Err(e) => errors.push(format!("Row {}: {:#}", line, e)),
        }
    }

    if !errors.is_empty() {
        tracing::warn!(path, rejected = errors.len(), "import aborted");
        bail!("{}", errors.join("\n"));
    }
    if batch.is_empty() {
        return Ok(0);
    }
    record_transactions(conn, &batch, strict)
        .with_context(|| format!("Import of {} failed", path))?;
    Ok(batch.len())
}

fn parse_row(
    conn: &Connection,
    columns: &Columns,
    rec: &StringRecord,
    account_id: i64,
    asset_cache: &mut HashMap<String, i64>,
) -> Result<NewTransaction> {
    let ticker = normalize_ticker(columns.require(rec, "symbol")?)?;
    let side = columns.require(rec, "type")?.parse::<Side>()?;
    let quantity = parse_decimal(columns.require(rec, "quantity")?)?;
    let price = parse_decimal(columns.require(rec, "price")?)?;
    let fee = match columns.get(rec, "fee") {
        Some(raw) => parse_decimal(raw)?,
        None => Decimal::ZERO,
    };
    let executed_at = parse_timestamp(columns.require(rec, "date")?)?;
    validate_trade(quantity, price, fee)?;

    let asset_id = match asset_cache.entry(ticker) {
        Entry::Occupied(entry) => *entry.get(),
        Entry::Vacant(entry) => {
            let fetched = id_for_asset(conn, entry.key())?;
            *entry.insert(fetched)
        }
    };

    Ok(NewTransaction {
        account_id,
        asset_id,
        side,
        quantity,
        price,
        fee,
        executed_at,
        note: columns.get(rec, "note").map(str::to_string),
    })
}

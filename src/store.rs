// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Row loaders shared by the commands. Everything that needs holdings goes
//! through [`account_holdings`], so there is exactly one fold per account.

use crate::config::Config;
use crate::holdings::compute_holdings;
use crate::models::{Allocation, Asset, Holding, Side, Transaction};
use crate::utils::{parse_timestamp, stored_decimal};
use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use std::collections::{BTreeMap, HashMap};

const TX_COLUMNS: &str =
    "id, account_id, asset_id, side, quantity, price, fee, executed_at, note";

type RawTransaction = (
    i64,
    i64,
    i64,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
);

fn transaction_from_raw(raw: RawTransaction) -> Result<Transaction> {
    let (id, account_id, asset_id, side_s, qty_s, price_s, fee_s, ts_s, note) = raw;
    let side = side_s
        .parse::<Side>()
        .with_context(|| format!("Transaction {} has an invalid side", id))?;
    let executed_at = parse_timestamp(&ts_s)
        .with_context(|| format!("Invalid executed_at '{}' for transaction {}", ts_s, id))?;
    Ok(Transaction {
        id,
        account_id,
        asset_id,
        side,
        quantity: stored_decimal(&qty_s, "quantity", id)?,
        price: stored_decimal(&price_s, "price", id)?,
        fee: stored_decimal(&fee_s, "fee", id)?,
        executed_at,
        note,
    })
}

fn raw_transaction(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawTransaction> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
        r.get(8)?,
    ))
}

/// An account's transactions oldest first, optionally limited to one asset.
pub fn load_transactions(
    conn: &Connection,
    account_id: i64,
    asset_id: Option<i64>,
) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {TX_COLUMNS} FROM transactions
         WHERE account_id=?1 AND (?2 IS NULL OR asset_id=?2)
         ORDER BY executed_at, id"
    ))?;
    let rows = stmt.query_map(params![account_id, asset_id], raw_transaction)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(transaction_from_raw(row?)?);
    }
    Ok(out)
}

pub fn load_transaction(conn: &Connection, id: i64) -> Result<Transaction> {
    let raw = conn
        .query_row(
            &format!("SELECT {TX_COLUMNS} FROM transactions WHERE id=?1"),
            params![id],
            raw_transaction,
        )
        .with_context(|| format!("Transaction {} not found", id))?;
    transaction_from_raw(raw)
}

/// Allocations in creation order.
pub fn load_allocations(conn: &Connection, account_id: i64) -> Result<Vec<Allocation>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, asset_id, target_percentage FROM allocations WHERE account_id=?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![account_id], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, i64>(1)?,
            r.get::<_, String>(2)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, asset_id, target_s) = row?;
        out.push(Allocation {
            id,
            account_id,
            asset_id,
            target_percentage: stored_decimal(&target_s, "target percentage", id)?,
        });
    }
    Ok(out)
}

pub fn load_assets(conn: &Connection) -> Result<HashMap<i64, Asset>> {
    let mut stmt = conn.prepare_cached("SELECT id, ticker, name, currency FROM assets")?;
    let rows = stmt.query_map([], |r| {
        Ok(Asset {
            id: r.get(0)?,
            ticker: r.get(1)?,
            name: r.get(2)?,
            currency: r.get(3)?,
        })
    })?;
    let mut out = HashMap::new();
    for row in rows {
        let asset = row?;
        out.insert(asset.id, asset);
    }
    Ok(out)
}

/// Folds an account's full history (or one asset's slice of it) into holdings.
pub fn account_holdings(
    conn: &Connection,
    cfg: &Config,
    account_id: i64,
    asset_id: Option<i64>,
) -> Result<BTreeMap<i64, Holding>> {
    let txs = load_transactions(conn, account_id, asset_id)?;
    tracing::debug!(
        account = account_id,
        transactions = txs.len(),
        fee_policy = %cfg.fee_policy,
        "folding holdings"
    );
    Ok(compute_holdings(&txs, cfg.fee_policy))
}

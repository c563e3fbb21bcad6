// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{NewTransaction, Side};
use crate::store::{load_assets, load_transaction, load_transactions};
use crate::utils::{
    format_timestamp, id_for_account, id_for_asset, maybe_print_json, optional_arg,
    parse_decimal, parse_timestamp, pretty_table, required_arg,
};
use crate::validation::{check_oversell, normalize_ticker, validate_trade};
use anyhow::{Result, bail};
use chrono::Utc;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("update", sub)) => update(conn, sub)?,
        Some(("rm", sub)) => remove(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let account = required_arg(sub, "account")?;
    let ticker = normalize_ticker(&required_arg(sub, "ticker")?)?;
    let side = required_arg(sub, "side")?.parse::<Side>()?;
    let quantity = parse_decimal(&required_arg(sub, "quantity")?)?;
    let price = parse_decimal(&required_arg(sub, "price")?)?;
    let fee = match optional_arg(sub, "fee") {
        Some(raw) => parse_decimal(&raw)?,
        None => Decimal::ZERO,
    };
    let executed_at = match optional_arg(sub, "date") {
        Some(raw) => parse_timestamp(&raw)?,
        None => Utc::now(),
    };

    let new = NewTransaction {
        account_id: id_for_account(conn, &account)?,
        asset_id: id_for_asset(conn, &ticker)?,
        side,
        quantity,
        price,
        fee,
        executed_at,
        note: optional_arg(sub, "note"),
    };
    let ids = record_transactions(conn, &[new], sub.get_flag("strict"))?;
    println!(
        "Recorded #{} {} {} x {} @ {} (fee {}) in '{}'",
        ids[0], side, quantity, ticker, price, fee, account
    );
    Ok(())
}

/// Validates and writes `batch` atomically.
///
/// With `strict`, each touched asset's history is replayed after the insert and
/// the whole batch is rolled back if any sell exceeds the position at that time.
pub fn record_transactions(
    conn: &Connection,
    batch: &[NewTransaction],
    strict: bool,
) -> Result<Vec<i64>> {
    for new in batch {
        validate_trade(new.quantity, new.price, new.fee)?;
    }

    let tx = conn.unchecked_transaction()?;
    let mut ids = Vec::with_capacity(batch.len());
    {
        let mut insert = tx.prepare_cached(
            "INSERT INTO transactions(account_id, asset_id, side, quantity, price, fee, executed_at, note)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        )?;
        for new in batch {
            insert.execute(params![
                new.account_id,
                new.asset_id,
                new.side.as_str(),
                new.quantity.to_string(),
                new.price.to_string(),
                new.fee.to_string(),
                format_timestamp(&new.executed_at),
                new.note,
            ])?;
            ids.push(tx.last_insert_rowid());
        }
    }

    if strict {
        let assets = load_assets(&tx)?;
        let ticker_of = |id: i64| {
            assets
                .get(&id)
                .map(|a| a.ticker.clone())
                .unwrap_or_else(|| id.to_string())
        };
        let touched: BTreeSet<(i64, i64)> =
            batch.iter().map(|n| (n.account_id, n.asset_id)).collect();
        for (account_id, asset_id) in touched {
            let history = load_transactions(&tx, account_id, Some(asset_id))?;
            check_oversell(&history, ticker_of)?;
        }
    }

    tx.commit()?;
    tracing::info!(count = ids.len(), strict, "recorded transactions");
    Ok(ids)
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
                    r.executed_at.clone(),
                    r.account.clone(),
                    r.ticker.clone(),
                    r.side.clone(),
                    r.quantity.clone(),
                    r.price.clone(),
                    r.fee.clone(),
                    r.note.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "ID", "Executed", "Account", "Ticker", "Side", "Qty", "Price", "Fee", "Note"
                ],
                rows,
            )
        );
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRow {
    pub id: i64,
    pub executed_at: String,
    pub account: String,
    pub ticker: String,
    pub side: String,
    pub quantity: String,
    pub price: String,
    pub fee: String,
    pub note: String,
}

/// Newest first, filtered by the optional `--account`, `--ticker` and `--limit`.
pub fn query_rows(conn: &Connection, sub: &clap::ArgMatches) -> Result<Vec<TransactionRow>> {
    let mut sql = String::from(
        "SELECT t.id, t.executed_at, a.name, s.ticker, t.side, t.quantity, t.price, t.fee, t.note
         FROM transactions t
         JOIN accounts a ON t.account_id=a.id
         JOIN assets s ON t.asset_id=s.id
         WHERE 1=1",
    );
    let mut params_vec: Vec<String> = Vec::new();

    if let Some(acct) = optional_arg(sub, "account") {
        sql.push_str(" AND a.name=?");
        params_vec.push(acct);
    }
    if let Some(ticker) = optional_arg(sub, "ticker") {
        sql.push_str(" AND s.ticker=?");
        params_vec.push(ticker.to_uppercase());
    }
    sql.push_str(" ORDER BY t.executed_at DESC, t.id DESC");
    if let Some(limit) = sub.get_one::<usize>("limit") {
        sql.push_str(" LIMIT ?");
        params_vec.push(limit.to_string());
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params_vec.iter()))?;

    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        let note: Option<String> = r.get(8)?;
        data.push(TransactionRow {
            id: r.get(0)?,
            executed_at: r.get(1)?,
            account: r.get(2)?,
            ticker: r.get(3)?,
            side: r.get(4)?,
            quantity: r.get(5)?,
            price: r.get(6)?,
            fee: r.get(7)?,
            note: note.unwrap_or_default(),
        });
    }
    Ok(data)
}

fn update(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id = *sub
        .get_one::<i64>("id")
        .ok_or_else(|| anyhow::anyhow!("Missing required argument --id"))?;
    let mut current = load_transaction(conn, id)?;

    if let Some(raw) = optional_arg(sub, "ticker") {
        current.asset_id = id_for_asset(conn, &normalize_ticker(&raw)?)?;
    }
    if let Some(raw) = optional_arg(sub, "side") {
        current.side = raw.parse::<Side>()?;
    }
    if let Some(raw) = optional_arg(sub, "quantity") {
        current.quantity = parse_decimal(&raw)?;
    }
    if let Some(raw) = optional_arg(sub, "price") {
        current.price = parse_decimal(&raw)?;
    }
    if let Some(raw) = optional_arg(sub, "fee") {
        current.fee = parse_decimal(&raw)?;
    }
    if let Some(raw) = optional_arg(sub, "date") {
        current.executed_at = parse_timestamp(&raw)?;
    }
    if let Some(note) = optional_arg(sub, "note") {
        current.note = Some(note);
    }
    validate_trade(current.quantity, current.price, current.fee)?;

    conn.execute(
        "UPDATE transactions
         SET asset_id=?1, side=?2, quantity=?3, price=?4, fee=?5, executed_at=?6, note=?7,
             updated_at=datetime('now')
         WHERE id=?8",
        params![
            current.asset_id,
            current.side.as_str(),
            current.quantity.to_string(),
            current.price.to_string(),
            current.fee.to_string(),
            format_timestamp(&current.executed_at),
            current.note,
            id
        ],
    )?;
    println!("Updated transaction #{}", id);
    Ok(())
}

fn remove(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id = *sub
        .get_one::<i64>("id")
        .ok_or_else(|| anyhow::anyhow!("Missing required argument --id"))?;
    let removed = conn.execute("DELETE FROM transactions WHERE id=?1", params![id])?;
    if removed == 0 {
        bail!("Transaction {} not found", id);
    }
    println!("Removed transaction #{}", id);
    Ok(())
}

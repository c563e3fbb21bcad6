// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::Asset;
use crate::utils::{pretty_table, required_arg};
use crate::validation::normalize_ticker;
use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add_asset(conn, sub)?,
        Some(("list", _)) => print_assets(list_assets(conn)?),
        Some(("search", sub)) => {
            let query = required_arg(sub, "query")?;
            print_assets(search_assets(conn, &query)?);
        }
        Some(("show", sub)) => {
            let ticker = normalize_ticker(&required_arg(sub, "ticker")?)?;
            let asset = asset_by_ticker(conn, &ticker)?;
            print_assets(vec![asset]);
        }
        _ => {}
    }
    Ok(())
}

fn add_asset(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let ticker = normalize_ticker(&required_arg(sub, "ticker")?)?;
    let name = required_arg(sub, "name")?;
    let currency = required_arg(sub, "currency")?.to_uppercase();
    if name.is_empty() {
        bail!("Asset name cannot be empty");
    }
    conn.execute(
        "INSERT INTO assets(ticker, name, currency) VALUES (?1,?2,?3)",
        params![ticker, name, currency],
    )
    .with_context(|| format!("Could not add asset '{}'", ticker))?;
    println!("Added asset {} ({}) {}", ticker, name, currency);
    Ok(())
}

fn print_assets(assets: Vec<Asset>) {
    let data = assets
        .into_iter()
        .map(|a| vec![a.ticker, a.name, a.currency])
        .collect();
    println!("{}", pretty_table(&["Ticker", "Name", "CCY"], data));
}

pub fn list_assets(conn: &Connection) -> Result<Vec<Asset>> {
    query_assets(conn, "SELECT id, ticker, name, currency FROM assets ORDER BY ticker", &[])
}

/// Case-insensitive match on ticker or name.
pub fn search_assets(conn: &Connection, query: &str) -> Result<Vec<Asset>> {
    let pattern = format!("%{}%", query.trim().to_lowercase());
    query_assets(
        conn,
        "SELECT id, ticker, name, currency FROM assets
         WHERE lower(ticker) LIKE ?1 OR lower(name) LIKE ?1
         ORDER BY ticker",
        &[&pattern],
    )
}

pub fn asset_by_ticker(conn: &Connection, ticker: &str) -> Result<Asset> {
    query_assets(
        conn,
        "SELECT id, ticker, name, currency FROM assets WHERE ticker=?1",
        &[&ticker],
    )?
    .into_iter()
    .next()
    .with_context(|| format!("Asset '{}' not found", ticker))
}

fn query_assets(
    conn: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Asset>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, |r| {
        Ok(Asset {
            id: r.get(0)?,
            ticker: r.get(1)?,
            name: r.get(2)?,
            currency: r.get(3)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::{
    format_timestamp, http_client, id_for_asset, maybe_print_json, optional_arg, parse_decimal,
    parse_timestamp, pretty_table, required_arg,
};
use crate::validation::normalize_ticker;
use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => set(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("fetch", _)) => fetch(conn)?,
        _ => {}
    }
    Ok(())
}

/// Stores one quote. A second quote for the same asset and instant replaces the first.
pub fn record_price(
    conn: &Connection,
    asset_id: i64,
    as_of: &DateTime<Utc>,
    price: Decimal,
    source: &str,
) -> Result<()> {
    if price.is_sign_negative() {
        bail!("Price must not be negative (got {})", price);
    }
    conn.execute(
        "INSERT INTO prices(asset_id, as_of, price, source) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(asset_id, as_of) DO UPDATE SET price=excluded.price, source=excluded.source",
        params![asset_id, format_timestamp(as_of), price.to_string(), source],
    )?;
    Ok(())
}

fn set(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let ticker = normalize_ticker(&required_arg(sub, "ticker")?)?;
    let price = parse_decimal(&required_arg(sub, "price")?)?;
    let as_of = match optional_arg(sub, "date") {
        Some(raw) => parse_timestamp(&raw)?,
        None => Utc::now(),
    };
    let asset_id = id_for_asset(conn, &ticker)?;
    record_price(conn, asset_id, &as_of, price, "manual")?;
    println!("Price for {} set to {} as of {}", ticker, price, format_timestamp(&as_of));
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRow {
    pub ticker: String,
    pub as_of: String,
    pub price: String,
    pub currency: String,
    pub source: String,
}

/// Most recent quotes first.
pub fn recent_prices(conn: &Connection, limit: usize) -> Result<Vec<PriceRow>> {
    let mut stmt = conn.prepare(
        "SELECT a.ticker, p.as_of, p.price, a.currency, p.source
         FROM prices p JOIN assets a ON p.asset_id=a.id
         ORDER BY p.as_of DESC, p.id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |r| {
        Ok(PriceRow {
            ticker: r.get(0)?,
            as_of: r.get(1)?,
            price: r.get(2)?,
            currency: r.get(3)?,
            source: r.get(4)?,
        })
    })?;
    let mut data = Vec::new();
    for row in rows {
        data.push(row?);
    }
    Ok(data)
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let data = recent_prices(conn, 50)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .into_iter()
            .map(|p| vec![p.ticker, p.as_of, p.price, p.currency, p.source])
            .collect();
        println!(
            "{}",
            pretty_table(&["Ticker", "As Of", "Price", "CCY", "Source"], rows)
        );
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooResponse {
    quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    result: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    symbol: Option<String>,
}

/// Matches quotes back to asset ids; unknown symbols and missing prices are skipped.
fn matched_quotes(
    id_by_ticker: &HashMap<&str, i64>,
    quotes: Vec<YahooQuote>,
) -> Vec<(i64, Decimal)> {
    let mut updates = Vec::with_capacity(quotes.len());
    for q in quotes {
        let (Some(sym), Some(px)) = (q.symbol, q.regular_market_price) else {
            continue;
        };
        let Some(&asset_id) = id_by_ticker.get(sym.as_str()) else {
            tracing::debug!(symbol = %sym, "quote for unknown symbol");
            continue;
        };
        if let Some(px) = Decimal::from_f64(px).filter(|p| !p.is_sign_negative()) {
            updates.push((asset_id, px.normalize()));
        }
    }
    updates
}

fn fetch(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare_cached("SELECT id, ticker FROM assets ORDER BY ticker")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?;
    let mut assets = Vec::new();
    for row in rows {
        assets.push(row?);
    }
    drop(stmt);

    if assets.is_empty() {
        println!("No assets to fetch");
        return Ok(());
    }

    let symbols = assets
        .iter()
        .map(|(_, ticker)| ticker.as_str())
        .collect::<Vec<_>>();
    let url = format!(
        "https://query1.finance.yahoo.com/v7/finance/quote?symbols={}",
        symbols.join(",")
    );
    tracing::info!(symbols = symbols.len(), "fetching quotes");
    let resp = http_client()?.get(url).send()?.error_for_status()?;
    let yr: YahooResponse = resp.json()?;

    let id_by_ticker: HashMap<&str, i64> = assets
        .iter()
        .map(|(id, ticker)| (ticker.as_str(), *id))
        .collect();
    let updates = matched_quotes(&id_by_ticker, yr.quote_response.result);

    let now = Utc::now();
    if updates.is_empty() {
        println!("No prices updated at {}", format_timestamp(&now));
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    for (asset_id, price) in &updates {
        record_price(&tx, *asset_id, &now, *price, "yahoo")?;
    }
    tx.commit()?;

    println!("Fetched {} prices at {}", updates.len(), format_timestamp(&now));
    Ok(())
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Config;
use crate::holdings::{project_all, summarize};
use crate::models::{Holding, PortfolioSummary};
use crate::pricing::{PriceSource, StoredPrices};
use crate::store::{account_holdings, load_assets};
use crate::utils::{
    fmt_decimal, fmt_optional, id_for_account, id_for_asset, maybe_print_json, optional_arg,
    pretty_table, required_arg,
};
use crate::validation::normalize_ticker;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRow {
    pub ticker: String,
    pub name: String,
    pub currency: String,
    #[serde(flatten)]
    pub holding: Holding,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioReport {
    pub account: String,
    #[serde(flatten)]
    pub summary: PortfolioSummary,
    pub holdings: Vec<HoldingRow>,
    pub last_updated: DateTime<Utc>,
}

/// Open positions for `account`, marked to `prices`, sorted by ticker.
pub fn holdings_report<P: PriceSource + ?Sized>(
    conn: &Connection,
    cfg: &Config,
    account: &str,
    ticker: Option<&str>,
    prices: &P,
) -> Result<Vec<HoldingRow>> {
    let account_id = id_for_account(conn, account)?;
    let asset_id = match ticker {
        Some(t) => Some(id_for_asset(conn, &normalize_ticker(t)?)?),
        None => None,
    };
    let holdings = project_all(account_holdings(conn, cfg, account_id, asset_id)?, prices);
    let assets = load_assets(conn)?;

    let mut rows: Vec<HoldingRow> = holdings
        .into_values()
        .map(|holding| {
            let (ticker, name, currency) = match assets.get(&holding.asset_id) {
                Some(a) => (a.ticker.clone(), a.name.clone(), a.currency.clone()),
                None => (
                    "Unknown".to_string(),
                    "Unknown Asset".to_string(),
                    String::new(),
                ),
            };
            HoldingRow {
                ticker,
                name,
                currency,
                holding,
            }
        })
        .collect();
    rows.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    Ok(rows)
}

pub fn portfolio_report<P: PriceSource + ?Sized>(
    conn: &Connection,
    cfg: &Config,
    account: &str,
    prices: &P,
) -> Result<PortfolioReport> {
    let holdings = holdings_report(conn, cfg, account, None, prices)?;
    let summary = summarize(holdings.iter().map(|r| &r.holding));
    Ok(PortfolioReport {
        account: account.to_string(),
        summary,
        holdings,
        last_updated: Utc::now(),
    })
}

fn holding_table(rows: &[HoldingRow]) -> comfy_table::Table {
    let data = rows
        .iter()
        .map(|r| {
            let h = &r.holding;
            vec![
                r.ticker.clone(),
                r.currency.clone(),
                fmt_decimal(&h.quantity, 4),
                fmt_decimal(&h.average_cost, 4),
                fmt_decimal(&h.total_cost, 2),
                fmt_optional(h.current_price, 2),
                fmt_optional(h.current_value, 2),
                fmt_optional(h.unrealized_gain_loss, 2),
                fmt_optional(h.unrealized_gain_loss_percent, 2),
            ]
        })
        .collect();
    pretty_table(
        &[
            "Ticker", "CCY", "Qty", "Avg Cost", "Cost", "Price", "Value", "Gain/Loss", "G/L %",
        ],
        data,
    )
}

pub fn handle_holdings(conn: &Connection, cfg: &Config, sub: &clap::ArgMatches) -> Result<()> {
    let account = required_arg(sub, "account")?;
    let ticker = optional_arg(sub, "ticker");
    let prices = StoredPrices::load(conn)?;
    let rows = holdings_report(conn, cfg, &account, ticker.as_deref(), &prices)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
        println!("{}", holding_table(&rows));
    }
    Ok(())
}

pub fn handle_summary(conn: &Connection, cfg: &Config, sub: &clap::ArgMatches) -> Result<()> {
    let account = required_arg(sub, "account")?;
    let prices = StoredPrices::load(conn)?;
    let report = portfolio_report(conn, cfg, &account, &prices)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &report)? {
        return Ok(());
    }
    println!("{}", holding_table(&report.holdings));
    let s = &report.summary;
    println!(
        "{}",
        pretty_table(
            &["Account", "Cost", "Value", "Gain/Loss", "G/L %"],
            vec![vec![
                report.account.clone(),
                fmt_decimal(&s.total_cost, 2),
                fmt_decimal(&s.total_value, 2),
                fmt_decimal(&s.total_gain_loss, 2),
                fmt_decimal(&s.total_gain_loss_percent, 2),
            ]],
        )
    );
    Ok(())
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Config;
use crate::errors::ValidationError;
use crate::holdings::{allocation_summary, project_all, summarize};
use crate::models::AllocationSummary;
use crate::pricing::{PriceSource, StoredPrices};
use crate::store::{account_holdings, load_allocations, load_assets};
use crate::utils::{
    fmt_decimal, id_for_account, id_for_asset, maybe_print_json, parse_decimal, pretty_table,
    required_arg,
};
use crate::validation::{normalize_ticker, validate_target};
use anyhow::{Result, bail};
use chrono::Utc;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;

pub fn handle(conn: &Connection, cfg: &Config, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => set(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => remove(conn, sub)?,
        Some(("summary", sub)) => summary(conn, cfg, sub)?,
        _ => {}
    }
    Ok(())
}

fn set(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let account = required_arg(sub, "account")?;
    let ticker = normalize_ticker(&required_arg(sub, "ticker")?)?;
    let target = parse_decimal(&required_arg(sub, "target")?)?;
    set_target(conn, &account, &ticker, target)?;
    println!("Target for {} in '{}' set to {}%", ticker, account, target);
    Ok(())
}

/// Creates or replaces the target for one asset, keeping the account total at or below 100%.
pub fn set_target(conn: &Connection, account: &str, ticker: &str, target: Decimal) -> Result<()> {
    validate_target(target)?;
    let account_id = id_for_account(conn, account)?;
    let asset_id = id_for_asset(conn, ticker)?;

    let others: Decimal = load_allocations(conn, account_id)?
        .iter()
        .filter(|a| a.asset_id != asset_id)
        .map(|a| a.target_percentage)
        .sum();
    let total = others + target;
    if total > Decimal::ONE_HUNDRED {
        return Err(ValidationError::TargetsExceedHundred {
            account: account.to_string(),
            total,
        }
        .into());
    }

    conn.execute(
        "INSERT INTO allocations(account_id, asset_id, target_percentage) VALUES (?1,?2,?3)
         ON CONFLICT(account_id, asset_id)
         DO UPDATE SET target_percentage=excluded.target_percentage, updated_at=datetime('now')",
        params![account_id, asset_id, target.to_string()],
    )?;
    tracing::debug!(account = %account, ticker = %ticker, %target, "allocation target saved");
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRow {
    pub ticker: String,
    pub name: String,
    pub target_percentage: Decimal,
}

pub fn list_targets(conn: &Connection, account: &str) -> Result<Vec<TargetRow>> {
    let account_id = id_for_account(conn, account)?;
    let assets = load_assets(conn)?;
    Ok(load_allocations(conn, account_id)?
        .into_iter()
        .map(|a| {
            let (ticker, name) = assets
                .get(&a.asset_id)
                .map(|s| (s.ticker.clone(), s.name.clone()))
                .unwrap_or_else(|| ("Unknown".to_string(), "Unknown Asset".to_string()));
            TargetRow {
                ticker,
                name,
                target_percentage: a.target_percentage,
            }
        })
        .collect())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let account = required_arg(sub, "account")?;
    let data = list_targets(conn, &account)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let total: Decimal = data.iter().map(|r| r.target_percentage).sum();
        let mut rows: Vec<Vec<String>> = data
            .into_iter()
            .map(|r| vec![r.ticker, r.name, fmt_decimal(&r.target_percentage, 2)])
            .collect();
        rows.push(vec!["".into(), "Total".into(), fmt_decimal(&total, 2)]);
        println!("{}", pretty_table(&["Ticker", "Name", "Target %"], rows));
    }
    Ok(())
}

fn remove(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let account = required_arg(sub, "account")?;
    let ticker = normalize_ticker(&required_arg(sub, "ticker")?)?;
    let account_id = id_for_account(conn, &account)?;
    let asset_id = id_for_asset(conn, &ticker)?;
    let removed = conn.execute(
        "DELETE FROM allocations WHERE account_id=?1 AND asset_id=?2",
        params![account_id, asset_id],
    )?;
    if removed == 0 {
        bail!("No allocation for {} in '{}'", ticker, account);
    }
    println!("Removed allocation for {} in '{}'", ticker, account);
    Ok(())
}

/// Target-vs-actual drift for `account`, valued with `prices`.
pub fn summary_report<P: PriceSource + ?Sized>(
    conn: &Connection,
    cfg: &Config,
    account: &str,
    prices: &P,
) -> Result<AllocationSummary> {
    let account_id = id_for_account(conn, account)?;
    let holdings = project_all(account_holdings(conn, cfg, account_id, None)?, prices);
    let total_value = summarize(holdings.values()).total_value;
    let allocations = load_allocations(conn, account_id)?;
    Ok(allocation_summary(
        account_id,
        &allocations,
        &holdings,
        total_value,
        Utc::now(),
    ))
}

fn summary(conn: &Connection, cfg: &Config, sub: &clap::ArgMatches) -> Result<()> {
    let account = required_arg(sub, "account")?;
    let prices = StoredPrices::load(conn)?;
    let report = summary_report(conn, cfg, &account, &prices)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &report)? {
        return Ok(());
    }

    let assets = load_assets(conn)?;
    let rows = report
        .rows
        .iter()
        .map(|r| {
            vec![
                assets
                    .get(&r.asset_id)
                    .map(|a| a.ticker.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                fmt_decimal(&r.target_percentage, 2),
                fmt_decimal(&r.current_percentage, 2),
                fmt_decimal(&r.deviation, 2),
                fmt_decimal(&r.current_value, 2),
                fmt_decimal(&r.target_value, 2),
                fmt_decimal(&r.rebalance_amount, 2),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &[
                "Ticker", "Target %", "Current %", "Deviation", "Value", "Target Value",
                "Rebalance",
            ],
            rows,
        )
    );
    println!(
        "Total value {} | targets sum to {}%",
        fmt_decimal(&report.total_value, 2),
        fmt_decimal(&report.total_target_percentage, 2)
    );
    Ok(())
}

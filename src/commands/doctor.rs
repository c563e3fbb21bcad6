// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Config;
use crate::holdings::compute_holdings;
use crate::models::Side;
use crate::pricing::{PriceSource, StoredPrices};
use crate::store::{load_allocations, load_assets, load_transactions};
use crate::utils::{fmt_decimal, maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: &'static str,
    pub detail: String,
}

fn issue(kind: &'static str, detail: String) -> Issue {
    Issue { kind, detail }
}

/// Scans every account for anomalies the holdings fold tolerates silently.
pub fn find_issues(conn: &Connection, cfg: &Config) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();
    let assets = load_assets(conn)?;
    let ticker_of = |id: i64| {
        assets
            .get(&id)
            .map(|a| a.ticker.clone())
            .unwrap_or_else(|| format!("#{}", id))
    };
    let prices = StoredPrices::load(conn)?;

    let mut stmt = conn.prepare("SELECT id, name FROM accounts ORDER BY name")?;
    let accounts = stmt
        .query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for (account_id, name) in accounts {
        let history = load_transactions(conn, account_id, None)?;

        // 1) sells against an empty position, in execution order
        let mut running: HashMap<i64, Decimal> = HashMap::new();
        for t in &history {
            let qty = running.entry(t.asset_id).or_default();
            match t.side {
                Side::Buy => *qty = qty.saturating_add(t.quantity),
                Side::Sell => {
                    if *qty <= Decimal::ZERO {
                        issues.push(issue(
                            "sell_without_position",
                            format!(
                                "{}: tx #{} sells {} {}",
                                name,
                                t.id,
                                t.quantity,
                                ticker_of(t.asset_id)
                            ),
                        ));
                    }
                    *qty = qty.saturating_sub(t.quantity);
                }
            }
        }

        // 2) negative positions and 3) open positions nobody has priced
        for h in compute_holdings(&history, cfg.fee_policy).values() {
            if h.quantity.is_sign_negative() {
                issues.push(issue(
                    "negative_position",
                    format!("{}: {} {}", name, ticker_of(h.asset_id), h.quantity),
                ));
            }
            if prices.price_for(h.asset_id).is_none() {
                issues.push(issue(
                    "missing_price",
                    format!("{}: {}", name, ticker_of(h.asset_id)),
                ));
            }
        }

        // 4) targets that do not add up
        let allocations = load_allocations(conn, account_id)?;
        if !allocations.is_empty() {
            let total: Decimal = allocations.iter().map(|a| a.target_percentage).sum();
            if total != Decimal::ONE_HUNDRED {
                issues.push(issue(
                    "allocation_total",
                    format!("{}: targets sum to {}%", name, fmt_decimal(&total, 2)),
                ));
            }
        }
    }
    tracing::debug!(found = issues.len(), "doctor scan complete");
    Ok(issues)
}

pub fn handle(conn: &Connection, cfg: &Config, sub: &clap::ArgMatches) -> Result<()> {
    let issues = find_issues(conn, cfg)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &issues)? {
        return Ok(());
    }
    if issues.is_empty() {
        println!("doctor: no issues found");
    } else {
        let rows = issues
            .into_iter()
            .map(|i| vec![i.kind.to_string(), i.detail])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

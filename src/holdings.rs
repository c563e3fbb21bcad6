// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Average-cost holdings: folding a transaction log into positions, marking them
//! to market, and comparing them against target allocations.
//!
//! Everything here is pure. Transactions are folded in the order given; callers
//! are responsible for passing them chronologically.

use crate::models::{
    Allocation, AllocationSummary, AllocationSummaryRow, FeePolicy, Holding, PortfolioSummary,
    Side, Transaction,
};
use crate::pricing::PriceSource;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Folds `transactions` into one holding per asset.
///
/// Sells remove cost basis at the average cost held *before* the sale. Assets whose
/// quantity nets to exactly zero are dropped; oversold (negative) positions are kept.
pub fn compute_holdings(
    transactions: &[Transaction],
    policy: FeePolicy,
) -> BTreeMap<i64, Holding> {
    let mut running: BTreeMap<i64, Holding> = BTreeMap::new();

    for tx in transactions {
        let holding = running
            .entry(tx.asset_id)
            .or_insert_with(|| Holding::empty(tx.asset_id));

        match tx.side {
            Side::Buy => {
                holding.quantity = add(holding.quantity, tx.quantity);
                holding.total_cost = add(holding.total_cost, mul(tx.quantity, tx.price));
                if policy == FeePolicy::Capitalize {
                    holding.total_cost = add(holding.total_cost, tx.fee);
                }
            }
            Side::Sell => {
                if holding.quantity > Decimal::ZERO {
                    holding.average_cost = div(holding.total_cost, holding.quantity);
                } else {
                    debug!(
                        transaction = tx.id,
                        asset = tx.asset_id,
                        "sell against an empty position, keeping last average cost"
                    );
                }
                holding.quantity = sub(holding.quantity, tx.quantity);
                holding.total_cost =
                    sub(holding.total_cost, mul(tx.quantity, holding.average_cost));
                if holding.quantity < Decimal::ZERO {
                    warn!(
                        transaction = tx.id,
                        asset = tx.asset_id,
                        quantity = %holding.quantity,
                        "position oversold"
                    );
                }
            }
        }

        holding.average_cost = if holding.quantity > Decimal::ZERO {
            div(holding.total_cost, holding.quantity)
        } else {
            Decimal::ZERO
        };
    }

    running.retain(|_, h| !h.quantity.is_zero());
    running
}

/// Marks a holding to `current_price`.
pub fn project(mut holding: Holding, current_price: Decimal) -> Holding {
    let current_value = mul(current_price, holding.quantity);
    let gain_loss = sub(current_value, holding.total_cost);
    holding.current_price = Some(current_price);
    holding.current_value = Some(current_value);
    holding.unrealized_gain_loss = Some(gain_loss);
    holding.unrealized_gain_loss_percent = Some(percent_of(gain_loss, holding.total_cost));
    holding
}

/// Projects every holding the price source can quote; the rest stay unprojected.
pub fn project_all<P: PriceSource + ?Sized>(
    holdings: BTreeMap<i64, Holding>,
    prices: &P,
) -> BTreeMap<i64, Holding> {
    holdings
        .into_iter()
        .map(|(asset_id, holding)| match prices.price_for(asset_id) {
            Some(price) => (asset_id, project(holding, price)),
            None => (asset_id, holding),
        })
        .collect()
}

pub fn summarize<'a, I>(holdings: I) -> PortfolioSummary
where
    I: IntoIterator<Item = &'a Holding>,
{
    let (total_cost, total_value) =
        holdings
            .into_iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(cost, value), h| {
                (
                    add(cost, h.total_cost),
                    add(value, h.current_value.unwrap_or(Decimal::ZERO)),
                )
            });
    let total_gain_loss = sub(total_value, total_cost);
    PortfolioSummary {
        total_value,
        total_cost,
        total_gain_loss,
        total_gain_loss_percent: percent_of(total_gain_loss, total_cost),
    }
}

/// One row per allocation, in the order the allocations were given.
pub fn deviation_summary(
    allocations: &[Allocation],
    holdings: &BTreeMap<i64, Holding>,
    total_value: Decimal,
) -> Vec<AllocationSummaryRow> {
    allocations
        .iter()
        .map(|allocation| {
            let current_value = holdings
                .get(&allocation.asset_id)
                .and_then(|h| h.current_value)
                .unwrap_or(Decimal::ZERO);
            let current_percentage = percent_of(current_value, total_value);
            let target_value = mul(
                div(allocation.target_percentage, Decimal::ONE_HUNDRED),
                total_value,
            );
            AllocationSummaryRow {
                asset_id: allocation.asset_id,
                target_percentage: allocation.target_percentage,
                current_percentage,
                deviation: sub(current_percentage, allocation.target_percentage),
                current_value,
                target_value,
                rebalance_amount: sub(target_value, current_value),
            }
        })
        .collect()
}

pub fn allocation_summary(
    account_id: i64,
    allocations: &[Allocation],
    holdings: &BTreeMap<i64, Holding>,
    total_value: Decimal,
    last_updated: DateTime<Utc>,
) -> AllocationSummary {
    AllocationSummary {
        account_id,
        rows: deviation_summary(allocations, holdings, total_value),
        total_target_percentage: allocations.iter().map(|a| a.target_percentage).sum(),
        total_value,
        last_updated,
    }
}

// part / whole * 100, or 0 when whole is not positive
fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole > Decimal::ZERO {
        mul(div(part, whole), Decimal::ONE_HUNDRED)
    } else {
        Decimal::ZERO
    }
}

// Arithmetic that saturates at Decimal::MIN/MAX instead of panicking, so the
// fold stays total over any stored log.

fn add(a: Decimal, b: Decimal) -> Decimal {
    a.checked_add(b).unwrap_or_else(|| {
        warn!(lhs = %a, rhs = %b, "addition overflowed, saturating");
        a.saturating_add(b)
    })
}

fn sub(a: Decimal, b: Decimal) -> Decimal {
    a.checked_sub(b).unwrap_or_else(|| {
        warn!(lhs = %a, rhs = %b, "subtraction overflowed, saturating");
        a.saturating_sub(b)
    })
}

fn mul(a: Decimal, b: Decimal) -> Decimal {
    a.checked_mul(b).unwrap_or_else(|| {
        warn!(lhs = %a, rhs = %b, "multiplication overflowed, saturating");
        a.saturating_mul(b)
    })
}

// `b` is never zero at the call sites.
fn div(a: Decimal, b: Decimal) -> Decimal {
    a.checked_div(b).unwrap_or_else(|| {
        warn!(lhs = %a, rhs = %b, "division overflowed, saturating");
        if a.is_sign_negative() == b.is_sign_negative() {
            Decimal::MAX
        } else {
            Decimal::MIN
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    const AAPL: i64 = 1;
    const MSFT: i64 = 2;

    fn tx(id: i64, asset_id: i64, side: Side, quantity: Decimal, price: Decimal) -> Transaction {
        Transaction {
            id,
            account_id: 1,
            asset_id,
            side,
            quantity,
            price,
            fee: Decimal::ZERO,
            executed_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::days(id),
            note: None,
        }
    }

    fn buy(id: i64, asset_id: i64, quantity: Decimal, price: Decimal) -> Transaction {
        tx(id, asset_id, Side::Buy, quantity, price)
    }

    fn sell(id: i64, asset_id: i64, quantity: Decimal, price: Decimal) -> Transaction {
        tx(id, asset_id, Side::Sell, quantity, price)
    }

    fn holding(asset_id: i64, total_cost: Decimal, current_value: Option<Decimal>) -> Holding {
        Holding {
            total_cost,
            current_value,
            ..Holding::empty(asset_id)
        }
    }

    fn allocation(id: i64, asset_id: i64, target: Decimal) -> Allocation {
        Allocation {
            id,
            account_id: 1,
            asset_id,
            target_percentage: target,
        }
    }

    #[test]
    fn fully_sold_positions_are_dropped() {
        let txs = vec![
            buy(1, AAPL, dec!(10), dec!(100)),
            buy(2, MSFT, dec!(3), dec!(300)),
            sell(3, AAPL, dec!(4), dec!(120)),
            sell(4, AAPL, dec!(6), dec!(130)),
        ];
        let holdings = compute_holdings(&txs, FeePolicy::Capitalize);
        assert!(!holdings.contains_key(&AAPL));
        assert_eq!(holdings[&MSFT].quantity, dec!(3));
    }

    #[test]
    fn partial_sell_removes_cost_at_pre_sale_average() {
        let txs = vec![
            buy(1, AAPL, dec!(10), dec!(100)),
            sell(2, AAPL, dec!(4), dec!(150)),
        ];
        let h = &compute_holdings(&txs, FeePolicy::Capitalize)[&AAPL];
        assert_eq!(h.quantity, dec!(6));
        assert_eq!(h.average_cost, dec!(100));
        assert_eq!(h.total_cost, dec!(600));
    }

    #[test]
    fn folding_twice_gives_the_same_holdings() {
        let txs = vec![
            buy(1, AAPL, dec!(10), dec!(150.50)),
            buy(2, MSFT, dec!(5), dec!(380)),
            sell(3, AAPL, dec!(3), dec!(160)),
            buy(4, AAPL, dec!(2), dec!(149.25)),
        ];
        assert_eq!(
            compute_holdings(&txs, FeePolicy::Capitalize),
            compute_holdings(&txs, FeePolicy::Capitalize)
        );
    }

    #[test]
    fn reversed_order_changes_the_result() {
        let chronological = vec![
            buy(1, AAPL, dec!(10), dec!(100)),
            sell(2, AAPL, dec!(4), dec!(150)),
        ];
        let mut reversed = chronological.clone();
        reversed.reverse();

        let forward = compute_holdings(&chronological, FeePolicy::Capitalize);
        let backward = compute_holdings(&reversed, FeePolicy::Capitalize);
        assert_ne!(forward, backward);

        // the early sell hits an empty position and removes no cost
        let h = &backward[&AAPL];
        assert_eq!(h.quantity, dec!(6));
        assert_eq!(h.total_cost, dec!(1000));
    }

    #[test]
    fn single_asset_walkthrough() {
        let txs = vec![
            buy(1, AAPL, dec!(10), dec!(150.50)),
            sell(2, AAPL, dec!(5), dec!(160.00)),
        ];
        let h = &compute_holdings(&txs, FeePolicy::Capitalize)[&AAPL];
        assert_eq!(h.quantity, dec!(5));
        assert_eq!(h.average_cost, dec!(150.50));
        assert_eq!(h.total_cost, dec!(752.5));
    }

    #[test]
    fn other_assets_do_not_leak_into_a_position() {
        let txs = vec![
            buy(1, AAPL, dec!(10), dec!(150.50)),
            buy(2, MSFT, dec!(5), dec!(380.00)),
            sell(3, AAPL, dec!(5), dec!(160.00)),
        ];
        let holdings = compute_holdings(&txs, FeePolicy::Capitalize);
        assert_eq!(holdings[&AAPL].total_cost, dec!(752.5));
        assert_eq!(holdings[&MSFT].total_cost, dec!(1900));
    }

    #[test]
    fn buy_fees_follow_the_fee_policy() {
        let mut first = buy(1, AAPL, dec!(10), dec!(100));
        first.fee = dec!(10);
        let mut exit = sell(2, AAPL, dec!(5), dec!(120));
        exit.fee = dec!(7);
        let txs = vec![first, exit];

        let capitalized = &compute_holdings(&txs, FeePolicy::Capitalize)[&AAPL];
        assert_eq!(capitalized.average_cost, dec!(101));
        assert_eq!(capitalized.total_cost, dec!(505));

        let ignored = &compute_holdings(&txs, FeePolicy::Ignore)[&AAPL];
        assert_eq!(ignored.average_cost, dec!(100));
        assert_eq!(ignored.total_cost, dec!(500));
    }

    #[test]
    fn oversell_passes_through_as_negative_position() {
        let txs = vec![
            buy(1, AAPL, dec!(2), dec!(50)),
            sell(2, AAPL, dec!(5), dec!(60)),
        ];
        let h = &compute_holdings(&txs, FeePolicy::Capitalize)[&AAPL];
        assert_eq!(h.quantity, dec!(-3));
        assert_eq!(h.total_cost, dec!(-150));
        assert_eq!(h.average_cost, Decimal::ZERO);
    }

    #[test]
    fn sell_from_nothing_does_not_divide_by_zero() {
        let txs = vec![sell(1, AAPL, dec!(1), dec!(10))];
        let h = &compute_holdings(&txs, FeePolicy::Capitalize)[&AAPL];
        assert_eq!(h.quantity, dec!(-1));
        assert_eq!(h.total_cost, Decimal::ZERO);
    }

    #[test]
    fn empty_log_has_no_holdings() {
        assert!(compute_holdings(&[], FeePolicy::Capitalize).is_empty());
    }

    #[test]
    fn projection_marks_to_market() {
        let base = Holding {
            quantity: dec!(6),
            average_cost: dec!(100),
            total_cost: dec!(600),
            ..Holding::empty(AAPL)
        };
        let h = project(base, dec!(125));
        assert_eq!(h.current_price, Some(dec!(125)));
        assert_eq!(h.current_value, Some(dec!(750)));
        assert_eq!(h.unrealized_gain_loss, Some(dec!(150)));
        assert_eq!(h.unrealized_gain_loss_percent, Some(dec!(25)));
    }

    #[test]
    fn projection_with_zero_cost_reports_zero_percent() {
        let free = Holding {
            quantity: dec!(3),
            ..Holding::empty(AAPL)
        };
        let h = project(free, dec!(10));
        assert_eq!(h.unrealized_gain_loss, Some(dec!(30)));
        assert_eq!(h.unrealized_gain_loss_percent, Some(Decimal::ZERO));
    }

    #[test]
    fn project_all_skips_unpriced_assets() {
        let txs = vec![
            buy(1, AAPL, dec!(10), dec!(100)),
            buy(2, MSFT, dec!(1), dec!(300)),
        ];
        let prices = HashMap::from([(AAPL, dec!(110))]);
        let projected = project_all(compute_holdings(&txs, FeePolicy::Capitalize), &prices);
        assert_eq!(projected[&AAPL].current_value, Some(dec!(1100)));
        assert_eq!(projected[&MSFT].current_value, None);
    }

    #[test]
    fn summary_totals_gain_and_percent() {
        let holdings = [
            holding(AAPL, dec!(600), Some(dec!(700))),
            holding(MSFT, dec!(400), Some(dec!(350))),
        ];
        let summary = summarize(&holdings);
        assert_eq!(summary.total_cost, dec!(1000));
        assert_eq!(summary.total_value, dec!(1050));
        assert_eq!(summary.total_gain_loss, dec!(50));
        assert_eq!(summary.total_gain_loss_percent, dec!(5));
    }

    #[test]
    fn summary_counts_unprojected_holdings_as_zero_value() {
        let holdings = [holding(AAPL, dec!(200), None)];
        let summary = summarize(&holdings);
        assert_eq!(summary.total_value, Decimal::ZERO);
        assert_eq!(summary.total_gain_loss, dec!(-200));
        assert_eq!(summary.total_gain_loss_percent, dec!(-100));
    }

    #[test]
    fn summary_of_nothing_is_all_zero() {
        let summary = summarize(std::iter::empty::<&Holding>());
        assert_eq!(summary.total_cost, Decimal::ZERO);
        assert_eq!(summary.total_gain_loss_percent, Decimal::ZERO);
    }

    #[test]
    fn deviation_rows_follow_allocation_order() {
        let holdings = BTreeMap::from([
            (AAPL, holding(AAPL, dec!(500), Some(dec!(750)))),
            (MSFT, holding(MSFT, dec!(200), Some(dec!(250)))),
        ]);
        let allocations = [allocation(1, MSFT, dec!(40)), allocation(2, AAPL, dec!(60))];
        let rows = deviation_summary(&allocations, &holdings, dec!(1000));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].asset_id, MSFT);
        assert_eq!(rows[0].current_percentage, dec!(25));
        assert_eq!(rows[0].deviation, dec!(-15));
        assert_eq!(rows[0].target_value, dec!(400));
        assert_eq!(rows[0].rebalance_amount, dec!(150));

        assert_eq!(rows[1].asset_id, AAPL);
        assert_eq!(rows[1].current_percentage, dec!(75));
        assert_eq!(rows[1].deviation, dec!(15));
        assert_eq!(rows[1].rebalance_amount, dec!(-150));
    }

    #[test]
    fn oversized_values_saturate_instead_of_panicking() {
        let huge = Decimal::from_scientific("1e22").unwrap();
        let txs = vec![buy(1, AAPL, huge, huge), buy(2, MSFT, huge, huge)];

        let holdings = compute_holdings(&txs, FeePolicy::Capitalize);
        assert_eq!(holdings[&AAPL].quantity, huge);
        assert_eq!(holdings[&AAPL].total_cost, Decimal::MAX);

        let prices = HashMap::from([(AAPL, huge), (MSFT, huge)]);
        let projected = project_all(holdings, &prices);
        assert_eq!(projected[&AAPL].current_value, Some(Decimal::MAX));
        assert_eq!(projected[&AAPL].unrealized_gain_loss, Some(Decimal::ZERO));

        let summary = summarize(projected.values());
        assert_eq!(summary.total_value, Decimal::MAX);
        assert_eq!(summary.total_cost, Decimal::MAX);

        let rows = deviation_summary(&[allocation(1, AAPL, dec!(50))], &projected, Decimal::MAX);
        assert_eq!(rows[0].current_percentage, dec!(100));
    }

    #[test]
    fn deviation_with_zero_total_value_never_divides() {
        let holdings = BTreeMap::from([(AAPL, holding(AAPL, dec!(500), None))]);
        let allocations = [allocation(1, AAPL, dec!(70)), allocation(2, MSFT, dec!(30))];
        let rows = deviation_summary(&allocations, &holdings, Decimal::ZERO);
        for row in rows {
            assert_eq!(row.current_percentage, Decimal::ZERO);
            assert_eq!(row.rebalance_amount, Decimal::ZERO);
            assert_eq!(row.deviation, -row.target_percentage);
        }
    }

    #[test]
    fn allocation_summary_totals_targets() {
        let holdings = BTreeMap::from([(AAPL, holding(AAPL, dec!(100), Some(dec!(100))))]);
        let allocations = [allocation(1, AAPL, dec!(55.5)), allocation(2, MSFT, dec!(30))];
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let summary = allocation_summary(9, &allocations, &holdings, dec!(100), now);
        assert_eq!(summary.account_id, 9);
        assert_eq!(summary.total_target_percentage, dec!(85.5));
        assert_eq!(summary.rows.len(), 2);
        assert_eq!(summary.rows[1].rebalance_amount, dec!(30));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["lastUpdated"], "2025-03-01T12:00:00Z");
        assert!(json["allocations"].is_array());
    }
}

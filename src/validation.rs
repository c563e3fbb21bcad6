// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Policy checks applied on the write path. The fold reports whatever the log
//! implies; anything stricter lives here.

use crate::errors::ValidationError;
use crate::models::{Side, Transaction};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;

static TICKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9.\-^=]{0,14}$").expect("valid ticker regex"));

pub fn normalize_ticker(raw: &str) -> Result<String, ValidationError> {
    let ticker = raw.trim().to_uppercase();
    if TICKER_RE.is_match(&ticker) {
        Ok(ticker)
    } else {
        Err(ValidationError::InvalidTicker(raw.trim().to_string()))
    }
}

pub fn validate_trade(
    quantity: Decimal,
    price: Decimal,
    fee: Decimal,
) -> Result<(), ValidationError> {
    if quantity <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveQuantity(quantity));
    }
    if price < Decimal::ZERO {
        return Err(ValidationError::NegativePrice(price));
    }
    if fee < Decimal::ZERO {
        return Err(ValidationError::NegativeFee(fee));
    }
    if quantity
        .checked_mul(price)
        .and_then(|notional| notional.checked_add(fee))
        .is_none()
    {
        return Err(ValidationError::ValueOverflow { quantity, price });
    }
    Ok(())
}

pub fn validate_target(target: Decimal) -> Result<(), ValidationError> {
    if target < Decimal::ZERO || target > Decimal::ONE_HUNDRED {
        return Err(ValidationError::TargetOutOfRange(target));
    }
    Ok(())
}

/// Replays `transactions` (chronological) and rejects the first sell larger than
/// the position held at that moment.
pub fn check_oversell<F>(transactions: &[Transaction], ticker_of: F) -> Result<(), ValidationError>
where
    F: Fn(i64) -> String,
{
    let mut held: HashMap<i64, Decimal> = HashMap::new();
    for tx in transactions {
        let available = held.entry(tx.asset_id).or_insert(Decimal::ZERO);
        match tx.side {
            Side::Buy => *available = available.saturating_add(tx.quantity),
            Side::Sell => {
                if tx.quantity > *available {
                    return Err(ValidationError::Oversell {
                        ticker: ticker_of(tx.asset_id),
                        requested: tx.quantity,
                        available: *available,
                    });
                }
                *available = available.saturating_sub(tx.quantity);
            }
        }
    }
    Ok(())
}

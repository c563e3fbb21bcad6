// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use thiserror::Error;

/// Input rejected before it reaches the store. The holdings fold itself never fails.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Quantity must be greater than zero, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("Price must not be negative, got {0}")]
    NegativePrice(Decimal),

    #[error("Fee must not be negative, got {0}")]
    NegativeFee(Decimal),

    #[error("Trade value {quantity} x {price} is too large to represent")]
    ValueOverflow { quantity: Decimal, price: Decimal },

    #[error("Target percentage must be between 0 and 100, got {0}")]
    TargetOutOfRange(Decimal),

    #[error("Allocation targets for account '{account}' would total {total}%, above 100%")]
    TargetsExceedHundred { account: String, total: Decimal },

    #[error("Sell of {requested} {ticker} exceeds the {available} held at that time")]
    Oversell {
        ticker: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid ticker '{0}'")]
    InvalidTicker(String),

    #[error("Unknown transaction side '{0}', expected buy or sell")]
    UnknownSide(String),

    #[error("Unknown fee policy '{0}', expected capitalize or ignore")]
    UnknownFeePolicy(String),
}

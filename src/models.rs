// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::ValidationError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: i64,
    pub ticker: String,
    pub name: String,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl FromStr for Side {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(ValidationError::UnknownSide(s.trim().to_string())),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single executed trade. Never mutated by the holdings fold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub asset_id: i64,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub executed_at: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub id: i64,
    pub account_id: i64,
    pub asset_id: i64,
    pub target_percentage: Decimal, // 0..=100
}

/// Current position in one asset, derived from the transaction log.
///
/// The market fields stay `None` until the holding is projected against a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub asset_id: i64,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub total_cost: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrealized_gain_loss: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrealized_gain_loss_percent: Option<Decimal>,
}

impl Holding {
    pub fn empty(asset_id: i64) -> Self {
        Self {
            asset_id,
            quantity: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            current_price: None,
            current_value: None,
            unrealized_gain_loss: None,
            unrealized_gain_loss_percent: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_value: Decimal,
    pub total_cost: Decimal,
    pub total_gain_loss: Decimal,
    pub total_gain_loss_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSummaryRow {
    pub asset_id: i64,
    pub target_percentage: Decimal,
    pub current_percentage: Decimal,
    pub deviation: Decimal,
    pub current_value: Decimal,
    pub target_value: Decimal,
    pub rebalance_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSummary {
    pub account_id: i64,
    #[serde(rename = "allocations")]
    pub rows: Vec<AllocationSummaryRow>,
    pub total_target_percentage: Decimal,
    pub total_value: Decimal,
    pub last_updated: DateTime<Utc>,
}

/// Whether buy-side fees are added to the cost basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeePolicy {
    #[default]
    Capitalize,
    Ignore,
}

impl FeePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeePolicy::Capitalize => "capitalize",
            FeePolicy::Ignore => "ignore",
        }
    }
}

impl FromStr for FeePolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "capitalize" => Ok(FeePolicy::Capitalize),
            "ignore" => Ok(FeePolicy::Ignore),
            _ => Err(ValidationError::UnknownFeePolicy(s.trim().to_string())),
        }
    }
}

impl fmt::Display for FeePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trade about to be written; ids and timestamps already resolved.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: i64,
    pub asset_id: i64,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub executed_at: DateTime<Utc>,
    pub note: Option<String>,
}

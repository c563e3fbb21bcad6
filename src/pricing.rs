// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Quotes a current price per asset. Holdings are only marked to market when one exists.
pub trait PriceSource {
    fn price_for(&self, asset_id: i64) -> Option<Decimal>;
}

impl PriceSource for HashMap<i64, Decimal> {
    fn price_for(&self, asset_id: i64) -> Option<Decimal> {
        self.get(&asset_id).copied()
    }
}

/// Latest stored quote per asset from the `prices` table.
#[derive(Debug, Default)]
pub struct StoredPrices {
    latest: HashMap<i64, Decimal>,
}

impl StoredPrices {
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare_cached(
            "SELECT asset_id, price FROM (
                 SELECT asset_id,
                        price,
                        ROW_NUMBER() OVER (
                            PARTITION BY asset_id
                            ORDER BY as_of DESC, id DESC
                        ) AS rn
                 FROM prices
             ) WHERE rn = 1",
        )?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?;

        let mut latest = HashMap::new();
        for row in rows {
            let (asset_id, price_s) = row?;
            let price = Decimal::from_str_exact(&price_s).with_context(|| {
                format!("Invalid stored price '{}' for asset {}", price_s, asset_id)
            })?;
            latest.insert(asset_id, price);
        }
        tracing::debug!(quotes = latest.len(), "loaded stored prices");
        Ok(Self { latest })
    }
}

impl PriceSource for StoredPrices {
    fn price_for(&self, asset_id: i64) -> Option<Decimal> {
        self.latest.get(&asset_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE prices(
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                asset_id INTEGER NOT NULL,
                as_of TEXT NOT NULL,
                price TEXT NOT NULL,
                source TEXT NOT NULL
            );
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn latest_quote_wins() {
        let conn = setup_conn();
        conn.execute_batch(
            r#"
            INSERT INTO prices(asset_id, as_of, price, source) VALUES (1, '2025-01-01T00:00:00Z', '10.00', 'manual');
            INSERT INTO prices(asset_id, as_of, price, source) VALUES (1, '2025-02-01T00:00:00Z', '12.50', 'manual');
            INSERT INTO prices(asset_id, as_of, price, source) VALUES (2, '2025-01-15T00:00:00Z', '99', 'yahoo');
            "#,
        )
        .unwrap();

        let prices = StoredPrices::load(&conn).unwrap();
        assert_eq!(prices.price_for(1), Some(dec!(12.50)));
        assert_eq!(prices.price_for(2), Some(dec!(99)));
        assert_eq!(prices.price_for(3), None);
    }

    #[test]
    fn corrupt_price_is_an_error() {
        let conn = setup_conn();
        conn.execute(
            "INSERT INTO prices(asset_id, as_of, price, source) VALUES (4, '2025-01-01', 'n/a', 'manual')",
            [],
        )
        .unwrap();
        let err = StoredPrices::load(&conn).unwrap_err();
        assert!(err.to_string().contains("Invalid stored price 'n/a' for asset 4"));
    }
}

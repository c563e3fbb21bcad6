// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::FeePolicy;
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

/// Overrides the database location.
pub const DB_ENV: &str = "COSTBOOK_DB";
/// Overrides the stored fee policy for one invocation.
pub const FEE_POLICY_ENV: &str = "COSTBOOK_FEE_POLICY";
/// `tracing` filter directives, e.g. `costbook=debug`.
pub const LOG_ENV: &str = "COSTBOOK_LOG";

const FEE_POLICY_KEY: &str = "fee_policy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    pub fee_policy: FeePolicy,
}

impl Config {
    pub fn load(conn: &Connection) -> Result<Self> {
        Self::resolve(conn, std::env::var(FEE_POLICY_ENV).ok())
    }

    /// Environment value first, then the settings table, then defaults.
    pub fn resolve(conn: &Connection, env_fee_policy: Option<String>) -> Result<Self> {
        let raw = match env_fee_policy.filter(|v| !v.trim().is_empty()) {
            Some(v) => Some(v),
            None => get_setting(conn, FEE_POLICY_KEY)?,
        };
        let fee_policy = match raw {
            Some(v) => v
                .parse::<FeePolicy>()
                .with_context(|| format!("Invalid fee policy configuration '{}'", v))?,
            None => FeePolicy::default(),
        };
        Ok(Self { fee_policy })
    }
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn set_fee_policy(conn: &Connection, policy: FeePolicy) -> Result<()> {
    set_setting(conn, FEE_POLICY_KEY, policy.as_str())
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::{Config, DB_ENV, FEE_POLICY_ENV, LOG_ENV, set_fee_policy};
use crate::db::db_path;
use crate::models::FeePolicy;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::{Result, anyhow};
use rusqlite::Connection;
use serde::Serialize;

pub fn handle(conn: &Connection, cfg: &Config, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("show", sub)) => show(cfg, sub)?,
        Some(("set-fee-policy", sub)) => {
            let raw = sub
                .get_one::<String>("policy")
                .ok_or_else(|| anyhow!("Missing fee policy"))?;
            let policy = raw.parse::<FeePolicy>()?;
            set_fee_policy(conn, policy)?;
            if std::env::var_os(FEE_POLICY_ENV).is_some() {
                tracing::warn!("{} is set and overrides the stored policy", FEE_POLICY_ENV);
            }
            println!("Fee policy set to {}", policy);
        }
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Settings {
    fee_policy: FeePolicy,
    database: String,
    log_filter: Option<String>,
}

fn show(cfg: &Config, sub: &clap::ArgMatches) -> Result<()> {
    let settings = Settings {
        fee_policy: cfg.fee_policy,
        database: db_path()?.display().to_string(),
        log_filter: std::env::var(LOG_ENV).ok(),
    };
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &settings)? {
        return Ok(());
    }
    let rows = vec![
        vec![
            "fee_policy".to_string(),
            settings.fee_policy.to_string(),
            FEE_POLICY_ENV.to_string(),
        ],
        vec!["database".to_string(), settings.database, DB_ENV.to_string()],
        vec![
            "log".to_string(),
            settings.log_filter.unwrap_or_else(|| "warn".to_string()),
            LOG_ENV.to_string(),
        ],
    ];
    println!("{}", pretty_table(&["Setting", "Value", "Env override"], rows));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli;

    fn run(conn: &Connection, args: &[&str]) -> Result<()> {
        let matches = cli::build_cli().get_matches_from(args.iter().copied());
        let Some(("config", m)) = matches.subcommand() else {
            panic!("no config subcommand");
        };
        handle(conn, &Config::default(), m)
    }

    #[test]
    fn fee_policy_is_persisted() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();

        run(&conn, &["costbook", "config", "set-fee-policy", "Ignore"]).unwrap();
        let cfg = Config::resolve(&conn, None).unwrap();
        assert_eq!(cfg.fee_policy, FeePolicy::Ignore);

        assert!(run(&conn, &["costbook", "config", "set-fee-policy", "fifo"]).is_err());
        let cfg = Config::resolve(&conn, None).unwrap();
        assert_eq!(cfg.fee_policy, FeePolicy::Ignore);
    }
}

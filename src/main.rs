// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use costbook::config::{Config, LOG_ENV};
use costbook::{cli, commands, db};

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let conn = db::open_or_init()?;
    let cfg = Config::load(&conn)?;
    tracing::debug!(fee_policy = %cfg.fee_policy, "configuration loaded");

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path()?.display());
        }
        Some(("account", sub)) => commands::accounts::handle(&conn, sub)?,
        Some(("asset", sub)) => commands::assets::handle(&conn, sub)?,
        Some(("tx", sub)) => commands::transactions::handle(&conn, sub)?,
        Some(("allocation", sub)) => commands::allocations::handle(&conn, &cfg, sub)?,
        Some(("holdings", sub)) => commands::portfolio::handle_holdings(&conn, &cfg, sub)?,
        Some(("summary", sub)) => commands::portfolio::handle_summary(&conn, &cfg, sub)?,
        Some(("price", sub)) => commands::prices::handle(&conn, sub)?,
        Some(("import", sub)) => commands::importer::handle(&conn, sub)?,
        Some(("config", sub)) => commands::settings::handle(&conn, &cfg, sub)?,
        Some(("doctor", sub)) => commands::doctor::handle(&conn, &cfg, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}

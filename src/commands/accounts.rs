// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::Account;
use crate::utils::{pretty_table, required_arg};
use anyhow::{Result, bail};
use rusqlite::{Connection, params};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = required_arg(sub, "name")?;
            let kind = required_arg(sub, "kind")?.to_lowercase();
            if name.is_empty() {
                bail!("Account name cannot be empty");
            }
            conn.execute(
                "INSERT INTO accounts(name, kind) VALUES (?1, ?2)",
                params![name, kind],
            )?;
            println!("Added account '{}' ({})", name, kind);
        }
        Some(("list", _)) => {
            let data = list_accounts(conn)?
                .into_iter()
                .map(|a| vec![a.name, a.kind, a.created_at])
                .collect();
            println!("{}", pretty_table(&["Name", "Kind", "Created"], data));
        }
        Some(("rm", sub)) => {
            let name = required_arg(sub, "name")?;
            let removed = conn.execute("DELETE FROM accounts WHERE name=?1", params![name])?;
            if removed == 0 {
                bail!("Account '{}' not found", name);
            }
            tracing::info!(account = %name, "account removed with its transactions and allocations");
            println!("Removed account '{}'", name);
        }
        _ => {}
    }
    Ok(())
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare("SELECT id, name, kind, created_at FROM accounts ORDER BY name")?;
    let rows = stmt.query_map([], |r| {
        Ok(Account {
            id: r.get(0)?,
            name: r.get(1)?,
            kind: r.get(2)?,
            created_at: r.get(3)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, value_parser};

fn opt(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help)
}

fn req(name: &'static str, help: &'static str) -> Arg {
    opt(name, help).required(true)
}

// Negative values must reach validation instead of parsing as flags.
fn amount(arg: Arg) -> Arg {
    arg.allow_negative_numbers(true)
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help).action(ArgAction::SetTrue)
}

fn output_flags(cmd: Command) -> Command {
    cmd.arg(flag("json", "Print pretty JSON").conflicts_with("jsonl"))
        .arg(flag("jsonl", "Print one JSON object per line"))
}

pub fn build_cli() -> Command {
    Command::new("costbook")
        .about("Average-cost portfolio tracker")
        .version(clap::crate_version!())
        .subcommand(Command::new("init").about("Create the database if needed"))
        .subcommand(
            Command::new("account")
                .about("Manage accounts")
                .subcommand(
                    Command::new("add")
                        .arg(req("name", "Account name"))
                        .arg(opt("kind", "Account kind").default_value("brokerage")),
                )
                .subcommand(Command::new("list"))
                .subcommand(Command::new("rm").arg(req("name", "Account name"))),
        )
        .subcommand(
            Command::new("asset")
                .about("Manage assets")
                .subcommand(
                    Command::new("add")
                        .arg(req("ticker", "Ticker symbol"))
                        .arg(req("name", "Display name"))
                        .arg(opt("currency", "Quote currency").default_value("USD")),
                )
                .subcommand(Command::new("list"))
                .subcommand(Command::new("search").arg(req("query", "Ticker or name fragment")))
                .subcommand(Command::new("show").arg(req("ticker", "Ticker symbol"))),
        )
        .subcommand(
            Command::new("tx")
                .about("Record and browse buy/sell transactions")
                .subcommand(
                    Command::new("add")
                        .arg(req("account", "Account name"))
                        .arg(req("ticker", "Ticker symbol"))
                        .arg(req("side", "buy or sell"))
                        .arg(amount(req("quantity", "Units traded")))
                        .arg(amount(req("price", "Price per unit")))
                        .arg(amount(opt("fee", "Transaction fee")))
                        .arg(opt("date", "Execution time, YYYY-MM-DD or RFC 3339 (default now)"))
                        .arg(opt("note", "Free-form note"))
                        .arg(flag("strict", "Reject sells larger than the current position")),
                )
                .subcommand(output_flags(
                    Command::new("list")
                        .arg(opt("account", "Only this account"))
                        .arg(opt("ticker", "Only this asset"))
                        .arg(opt("limit", "Maximum rows").value_parser(value_parser!(usize))),
                ))
                .subcommand(
                    Command::new("update")
                        .arg(req("id", "Transaction id").value_parser(value_parser!(i64)))
                        .arg(opt("ticker", "Move the trade to another asset"))
                        .arg(opt("side", "buy or sell"))
                        .arg(amount(opt("quantity", "Units traded")))
                        .arg(amount(opt("price", "Price per unit")))
                        .arg(amount(opt("fee", "Transaction fee")))
                        .arg(opt("date", "Execution time"))
                        .arg(opt("note", "Free-form note")),
                )
                .subcommand(
                    Command::new("rm")
                        .arg(req("id", "Transaction id").value_parser(value_parser!(i64))),
                ),
        )
        .subcommand(
            Command::new("allocation")
                .about("Target allocations and drift")
                .subcommand(
                    Command::new("set")
                        .arg(req("account", "Account name"))
                        .arg(req("ticker", "Ticker symbol"))
                        .arg(amount(req("target", "Target percentage (0-100)"))),
                )
                .subcommand(output_flags(
                    Command::new("list").arg(req("account", "Account name")),
                ))
                .subcommand(
                    Command::new("rm")
                        .arg(req("account", "Account name"))
                        .arg(req("ticker", "Ticker symbol")),
                )
                .subcommand(output_flags(
                    Command::new("summary").arg(req("account", "Account name")),
                )),
        )
        .subcommand(output_flags(
            Command::new("holdings")
                .about("Current positions derived from the transaction log")
                .arg(req("account", "Account name"))
                .arg(opt("ticker", "Only this asset")),
        ))
        .subcommand(output_flags(
            Command::new("summary")
                .about("Portfolio value, cost, and unrealized gain/loss")
                .arg(req("account", "Account name")),
        ))
        .subcommand(
            Command::new("price")
                .about("Market prices used for valuation")
                .subcommand(
                    Command::new("set")
                        .arg(req("ticker", "Ticker symbol"))
                        .arg(amount(req("price", "Price per unit")))
                        .arg(opt("date", "Quote time (default now)")),
                )
                .subcommand(output_flags(Command::new("list")))
                .subcommand(Command::new("fetch").about("Fetch quotes from Yahoo Finance")),
        )
        .subcommand(
            Command::new("import")
                .about("Bulk import")
                .subcommand(
                    Command::new("transactions")
                        .arg(req("account", "Account name"))
                        .arg(req("path", "CSV file: symbol,type,quantity,price,date[,fee,note]"))
                        .arg(flag("strict", "Reject sells larger than the position at that point")),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Show or change settings")
                .subcommand(output_flags(Command::new("show")))
                .subcommand(
                    Command::new("set-fee-policy")
                        .arg(Arg::new("policy").required(true).help("capitalize or ignore")),
                ),
        )
        .subcommand(output_flags(
            Command::new("doctor").about("Report data-integrity anomalies"),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn negative_amounts_parse_as_values() {
        let m = build_cli()
            .try_get_matches_from([
                "costbook", "tx", "update", "--id", "1", "--price", "-1", "--fee", "-0.5",
            ])
            .unwrap();
        let Some(("tx", tx)) = m.subcommand() else {
            panic!("no tx subcommand");
        };
        let Some(("update", update)) = tx.subcommand() else {
            panic!("no update subcommand");
        };
        assert_eq!(update.get_one::<String>("price").unwrap(), "-1");
        assert_eq!(update.get_one::<String>("fee").unwrap(), "-0.5");
    }

    #[test]
    fn json_flags_conflict() {
        let res = build_cli().try_get_matches_from([
            "costbook", "summary", "--account", "A", "--json", "--jsonl",
        ]);
        assert!(res.is_err());
    }
}

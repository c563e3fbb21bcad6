// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use costbook::config::Config;
use costbook::store::{account_holdings, load_transactions};
use costbook::{cli, commands::importer, db};
use rusqlite::Connection;
use rust_decimal_macros::dec;
use std::io::Write;
use tempfile::NamedTempFile;

fn base_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn.execute_batch(
        r#"
        INSERT INTO accounts(id, name, kind) VALUES (1, 'Broker', 'brokerage');
        INSERT INTO assets(id, ticker, name, currency) VALUES (1, 'ABC', 'ABC Corp', 'USD');
        INSERT INTO assets(id, ticker, name, currency) VALUES (2, 'XYZ', 'XYZ Corp', 'USD');
        "#,
    )
    .unwrap();
    conn
}

fn csv_file(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", body).unwrap();
    file.flush().unwrap();
    file
}

fn tx_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
        .unwrap()
}

#[test]
fn importer_trims_cli_path_argument() {
    let conn = base_conn();
    let file = csv_file("symbol,type,quantity,price,date\nABC,buy,10,100,2025-01-01\n");

    let path = file.path().to_str().unwrap().to_string();
    let padded = format!("  {}  ", path);
    let matches = cli::build_cli().get_matches_from([
        "costbook",
        "import",
        "transactions",
        "--account",
        " Broker ",
        "--path",
        &padded,
    ]);
    if let Some(("import", import_m)) = matches.subcommand() {
        importer::handle(&conn, import_m).unwrap();
    } else {
        panic!("no import subcommand");
    }
    assert_eq!(tx_count(&conn), 1);
}

#[test]
fn importer_trims_fields_and_reads_optional_columns() {
    let conn = base_conn();
    let file = csv_file(
        "Date,Symbol,Type,Quantity,Price,Fee,Note\n\
         2025-01-01, abc , BUY ,10, 100 , 5 ,  first lot  \n\
         2025-01-03T15:30:00Z,ABC,sell,4,120,,\n",
    );

    let n = importer::import_transactions(
        &conn,
        "Broker",
        file.path().to_str().unwrap(),
        false,
    )
    .unwrap();
    assert_eq!(n, 2);

    let stored = load_transactions(&conn, 1, None).unwrap();
    assert_eq!(stored[0].fee, dec!(5));
    assert_eq!(stored[0].note.as_deref(), Some("first lot"));
    assert_eq!(stored[1].fee, dec!(0));
    assert_eq!(stored[1].note, None);

    let holdings = account_holdings(&conn, &Config::default(), 1, None).unwrap();
    let abc = &holdings[&1];
    assert_eq!(abc.quantity, dec!(6));
    assert_eq!(abc.average_cost, dec!(100.5));
    assert_eq!(abc.total_cost, dec!(603));
}

#[test]
fn importer_reports_every_bad_row_and_writes_nothing() {
    let conn = base_conn();
    let file = csv_file(
        "symbol,type,quantity,price,date\n\
         ABC,buy,10,100,2025-01-01\n\
         ABC,hold,1,100,2025-01-02\n\
         XYZ,buy,0,100,2025-01-02\n\
         ABC,buy,1,100,2025-13-03\n\
         NOPE,buy,1,1,2025-01-04\n",
    );

    let err = importer::import_transactions(&conn, "Broker", file.path().to_str().unwrap(), false)
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Row 3: Unknown transaction side 'hold'"), "{}", msg);
    assert!(msg.contains("Row 4: "), "{}", msg);
    assert!(msg.contains("Row 5: Invalid date '2025-13-03'"), "{}", msg);
    assert!(msg.contains("Row 6: Asset 'NOPE' not found"), "{}", msg);
    assert!(!msg.contains("Row 2"));
    assert_eq!(tx_count(&conn), 0);
}

#[test]
fn importer_requires_core_columns() {
    let conn = base_conn();
    let file = csv_file("symbol,quantity,price\nABC,1,1\n");

    let err = importer::import_transactions(&conn, "Broker", file.path().to_str().unwrap(), false)
        .unwrap_err();
    assert_eq!(err.to_string(), "Missing required columns: type, date");
}

#[test]
fn strict_import_rolls_back_on_oversell() {
    let conn = base_conn();
    let file = csv_file(
        "symbol,type,quantity,price,date\n\
         XYZ,buy,2,10,2025-01-01\n\
         XYZ,sell,3,12,2025-01-02\n",
    );
    let path = file.path().to_str().unwrap();

    let err = importer::import_transactions(&conn, "Broker", path, true).unwrap_err();
    assert!(format!("{:#}", err).contains("Sell of 3 XYZ exceeds the 2 held at that time"));
    assert_eq!(tx_count(&conn), 0);

    assert_eq!(importer::import_transactions(&conn, "Broker", path, false).unwrap(), 2);
}

#[test]
fn unknown_account_is_rejected_before_reading() {
    let conn = base_conn();
    let err = importer::import_transactions(&conn, "Nobody", "/does/not/matter.csv", false)
        .unwrap_err();
    assert_eq!(err.to_string(), "Account 'Nobody' not found");
}

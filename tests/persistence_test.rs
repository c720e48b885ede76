#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

mod common;

#[test]
fn test_state_survives_across_invocations() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("ledger_db");
    let seed = dir.path().join("accounts.csv");
    common::write_seed_csv(&seed);

    // 1. Seed the database.
    Command::new(cargo_bin!("sarafu"))
        .arg("--db-path")
        .arg(&db_path)
        .args(["seed"])
        .arg(&seed)
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered 2 accounts"));

    // 2. Deposit in a fresh process.
    Command::new(cargo_bin!("sarafu"))
        .arg("--db-path")
        .arg(&db_path)
        .args(["deposit", "--account", common::ALICE, "1000.00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("New balance: 16000.00"));

    // 3. The balance is still there in a third process.
    Command::new(cargo_bin!("sarafu"))
        .arg("--db-path")
        .arg(&db_path)
        .args(["balance", "--account", common::ALICE])
        .assert()
        .success()
        .stdout(predicate::str::contains("16000.00"));
}

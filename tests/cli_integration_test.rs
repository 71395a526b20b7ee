//! CLI integration tests.
//!
//! These run the hashdb binary via std::process::Command against fixture
//! hash sets in a temporary directory.

mod common;

use common::*;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn hashdb(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hashdb"))
        .args(args)
        .env("HASHDB_LOG", "off")
        .output()
        .expect("failed to run hashdb")
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).unwrap_or_else(|e| panic!("bad JSON {:?}: {}", stdout, e))
}

#[test]
fn test_index_then_lookup() {
    let dir = TempDir::new().unwrap();
    let db = write(dir.path(), "sums.md5", md5sum_listing().as_bytes());

    let output = hashdb(&["--db", arg(&db), "index"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(dir.path().join("sums.md5-md5.idx").exists());

    let output = hashdb(&["--db", arg(&db), "--output", "json", "lookup", EMPTY_MD5, MISSING_MD5]);
    assert!(output.status.success(), "{:?}", output);
    let value = json(&output);
    assert_eq!(value["tool"], "hashdb");
    assert_eq!(value["data"]["found_count"], 1);
    assert_eq!(value["data"]["total_count"], 2);
    assert_eq!(value["data"]["results"][0]["matches"][0]["file_name"], "empty.txt");
    assert_eq!(value["data"]["results"][1]["found"], false);
}

#[test]
fn test_info_reports_type() {
    let dir = TempDir::new().unwrap();
    let db = write(dir.path(), "NSRLFile.txt", nsrl_listing().as_bytes());

    let output = hashdb(&["--db", arg(&db), "--output", "json", "info"]);
    assert!(output.status.success(), "{:?}", output);
    let value = json(&output);
    assert_eq!(value["data"]["db_type"], "nsrl");
    assert_eq!(value["data"]["display_name"], "NSRLFile");
    assert_eq!(value["data"]["accepts_updates"], false);
    assert_eq!(value["data"]["indexes"][0]["present"], false);
}

#[test]
fn test_create_add_lookup_verbose() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("known.kdb");

    assert!(hashdb(&["create", arg(&db)]).status.success());
    let output = hashdb(&[
        "--db",
        arg(&db),
        "add",
        "--md5",
        EMPTY_MD5,
        "--sha1",
        EMPTY_SHA1,
        "--name",
        "empty.txt",
    ]);
    assert!(output.status.success(), "{:?}", output);

    let output = hashdb(&["--db", arg(&db), "--output", "json", "lookup", "--verbose", EMPTY_SHA1]);
    assert!(output.status.success(), "{:?}", output);
    let value = json(&output);
    let details = &value["data"]["results"][0]["details"];
    assert_eq!(details["md5"], EMPTY_MD5);
    assert_eq!(details["file_names"][0], "empty.txt");
}

#[test]
fn test_bulk_add_from_listing() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("known.kdb");
    let listing = write(dir.path(), "evidence.md5", md5sum_listing().as_bytes());
    assert!(hashdb(&["create", arg(&db)]).status.success());

    // The BSD line is not a "<hash> <name>" line, so the batch fails whole.
    let output = hashdb(&["--db", arg(&db), "add", "--from", arg(&listing)]);
    assert!(!output.status.success());

    let output = hashdb(&["--db", arg(&db), "--output", "json", "lookup", "--quick", EMPTY_MD5]);
    assert_eq!(json(&output)["data"]["found_count"], 0);

    let clean = write(
        dir.path(),
        "clean.md5",
        format!("{}  empty.txt\n# comment\n\n{} *abc.bin\n", EMPTY_MD5, ABC_MD5).as_bytes(),
    );
    let output = hashdb(&["--db", arg(&db), "--output", "json", "add", "--from", arg(&clean)]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(json(&output)["data"]["added"], 2);
}

#[test]
fn test_create_rejects_other_extensions() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("x.dat");

    let output = hashdb(&["--output", "json", "create", arg(&db)]);
    assert!(!output.status.success());
    assert!(!db.exists());
    let value = json(&output);
    assert_eq!(value["data"]["code"], "HDB-E001");
    assert_eq!(value["data"]["operation"], "create");
}

#[test]
fn test_unknown_format_exit_code() {
    let dir = TempDir::new().unwrap();
    let db = write(dir.path(), "notes.txt", b"plain prose\n");

    let output = hashdb(&["--db", arg(&db), "info"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("HDB-E101"), "{}", stderr);
}

#[test]
fn test_index_reports_sha1_path() {
    let dir = TempDir::new().unwrap();
    let db = write(dir.path(), "NSRLFile.txt", nsrl_listing().as_bytes());

    let output = hashdb(&["--db", arg(&db), "--output", "json", "index", "--hint", "nsrl-sha1"]);
    assert!(output.status.success(), "{:?}", output);
    let value = json(&output);
    let index_path = value["data"]["index_path"].as_str().unwrap();
    assert!(index_path.ends_with("NSRLFile.txt-sha1.idx"), "{}", index_path);
    assert!(dir.path().join("NSRLFile.txt-sha1.idx").exists());
}

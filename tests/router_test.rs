//! Integration tests for opening databases by path and by index path.

mod common;

use common::*;
use hashdb::index::IndexBuilder;
use hashdb::{DbType, ErrorKind, HashAlgorithm, HashDatabase, LookupHit, LookupMode, OpenMode};
use std::ops::ControlFlow;
use tempfile::TempDir;

#[test]
fn test_empty_path_is_rejected() {
    let err = HashDatabase::open("", OpenMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(err.operation(), "open");
}

#[test]
fn test_missing_database_fails_to_open() {
    let dir = TempDir::new().unwrap();
    let err = HashDatabase::open(dir.path().join("absent.txt"), OpenMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Open);
}

#[test]
fn test_unrecognized_database_is_unknown_type() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "notes.txt", b"not a hash set\n");
    let err = HashDatabase::open(&path, OpenMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownType);
    assert!(err.to_string().contains("error determining hash database type"));
}

#[test]
fn test_index_path_resolves_to_database() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "sums.md5", md5sum_listing().as_bytes());
    HashDatabase::open(&path, OpenMode::Normal)
        .unwrap()
        .make_index("")
        .unwrap();

    let index = dir.path().join("sums.md5-md5.idx");
    let mut db = HashDatabase::open(&index, OpenMode::Normal).unwrap();
    assert_eq!(db.db_type(), DbType::Md5sum);
    assert_eq!(db.db_path(), path.as_path());
    assert_eq!(db.index_path(HashAlgorithm::Md5).unwrap(), index);
    assert!(db.lookup_str(EMPTY_MD5, LookupMode::Quick).unwrap().is_found());
}

#[test]
fn test_sha1_index_path_resolves_to_database() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "NSRLFile.txt", nsrl_listing().as_bytes());
    let db = HashDatabase::open(dir.path().join("NSRLFile.txt-sha1.idx"), OpenMode::Normal).unwrap();
    assert_eq!(db.db_type(), DbType::Nsrl);
    assert_eq!(db.db_path(), path.as_path());
}

#[test]
fn test_index_without_database_opens_index_only() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "sums.md5", md5sum_listing().as_bytes());
    HashDatabase::open(&path, OpenMode::Normal)
        .unwrap()
        .make_index("")
        .unwrap();
    std::fs::remove_file(&path).unwrap();

    let mut db = HashDatabase::open(dir.path().join("sums.md5-md5.idx"), OpenMode::Normal).unwrap();
    assert_eq!(db.db_type(), DbType::IndexOnly);
    assert!(db.is_index_only());
    assert!(db.uses_external_index());
    assert!(!db.accepts_updates());
    assert_eq!(db.db_path(), path.as_path());
    // The name recorded when the index was built survives the database.
    assert_eq!(db.display_name(), "sums");

    let mut hits = 0;
    let mut count = |hit: &LookupHit<'_>| {
        assert!(hit.file_name.is_none());
        assert!(hit.comment.is_none());
        hits += 1;
        ControlFlow::Continue(())
    };
    let status = db
        .lookup_str(EMPTY_MD5, LookupMode::Enumerate(&mut count))
        .unwrap();
    assert!(status.is_found());
    assert_eq!(hits, 1);

    assert!(!db.lookup_str(A_MD5, LookupMode::Quick).unwrap().is_found());
    assert_eq!(db.make_index("md5sum").unwrap_err().kind(), ErrorKind::Procedure);
    db.close().unwrap();
}

#[test]
fn test_empty_index_reports_not_found() {
    let dir = TempDir::new().unwrap();
    let index = dir.path().join("set-md5.idx");
    IndexBuilder::new(HashAlgorithm::Md5)
        .finish(&index, DbType::Md5sum, "set")
        .unwrap();

    let mut db = HashDatabase::open(&index, OpenMode::Normal).unwrap();
    assert!(db.is_index_only());
    assert!(db.has_index(HashAlgorithm::Md5));
    let status = db.lookup_str(EMPTY_MD5, LookupMode::Quick).unwrap();
    assert!(!status.is_found());
    assert_eq!(status.code(), 0);
}

#[test]
fn test_index_only_mode_skips_database() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "NSRLFile.txt", nsrl_listing().as_bytes());
    HashDatabase::open(&path, OpenMode::Normal)
        .unwrap()
        .make_index("nsrl-sha1")
        .unwrap();

    let index = dir.path().join("NSRLFile.txt-sha1.idx");
    let mut db = HashDatabase::open(&index, OpenMode::IndexOnly).unwrap();
    assert!(db.is_index_only());
    assert!(db.lookup_str(ABC_SHA1, LookupMode::Quick).unwrap().is_found());
}

#[test]
fn test_missing_index_and_database_fails() {
    let dir = TempDir::new().unwrap();
    let err = HashDatabase::open(dir.path().join("gone-md5.idx"), OpenMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Open);

    let err = HashDatabase::open(dir.path().join("gone-md5.idx"), OpenMode::IndexOnly).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Open);
}

#[test]
fn test_corrupt_index_is_a_backend_error() {
    let dir = TempDir::new().unwrap();
    let index = write(dir.path(), "set-md5.idx", b"garbage\n");
    let mut db = HashDatabase::open(&index, OpenMode::Normal).unwrap();
    assert!(!db.has_index(HashAlgorithm::Md5));
    let err = db.lookup_str(EMPTY_MD5, LookupMode::Quick).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
}

#[test]
fn test_unsupported_algorithm_names_the_calling_operation() {
    let dir = TempDir::new().unwrap();
    let index = dir.path().join("set-md5.idx");
    IndexBuilder::new(HashAlgorithm::Md5)
        .finish(&index, DbType::Md5sum, "set")
        .unwrap();
    let mut db = HashDatabase::open(&index, OpenMode::IndexOnly).unwrap();
    let sha256 = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    let err = db.lookup_str(sha256, LookupMode::Quick).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Procedure);
    assert_eq!(err.operation(), "lookup");
    assert!(err.to_string().starts_with("lookup:"), "{}", err);

    let err = db.open_index(HashAlgorithm::Sha256).unwrap_err();
    assert_eq!(err.operation(), "open_index");
    let err = db.index_path(HashAlgorithm::Sha256).unwrap_err();
    assert_eq!(err.operation(), "index_path");
}

#[test]
fn test_index_record_with_multibyte_text_is_a_backend_error() {
    let dir = TempDir::new().unwrap();
    let mut contents = b"# hashdb index v1\n# algorithm: md5\n".to_vec();
    contents.extend_from_slice("a".repeat(31).as_bytes());
    contents.extend_from_slice("é|000000000000000\n".as_bytes());
    let index = write(dir.path(), "set-md5.idx", &contents);

    let mut db = HashDatabase::open(&index, OpenMode::Normal).unwrap();
    let err = db.lookup_str(EMPTY_MD5, LookupMode::Quick).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
}

//! HashKeeper CSV hash sets.

use super::{decode_digest, sniff_line, for_each_line, line_at, split_csv, EmitFn, TextFormat, TextRecord};
use crate::detect::DbType;
use crate::error::Result;
use crate::hash::HashAlgorithm;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Leading columns every HashKeeper header starts with.
const HEADER_PREFIX: &str = "\"file_id\",\"hashset_id\",\"file_name\",\"directory\",\"hash\"";

const NAME_COL: usize = 2;
const DIR_COL: usize = 3;
const HASH_COL: usize = 4;
const COMMENT_COL: usize = 9;

fn parse(line: &str) -> Option<TextRecord> {
    let fields = split_csv(line);
    let md5 = decode_digest(fields.get(HASH_COL)?, HashAlgorithm::Md5)?;
    let non_empty = |col: usize| fields.get(col).map(|f| f.trim()).filter(|f| !f.is_empty());

    let file_name = match (non_empty(DIR_COL), non_empty(NAME_COL)) {
        (Some(dir), Some(name)) => Some(format!("{}\\{}", dir.trim_end_matches('\\'), name)),
        (None, Some(name)) => Some(name.to_string()),
        _ => None,
    };
    Some(TextRecord {
        md5: Some(md5),
        sha1: None,
        file_name,
        comment: non_empty(COMMENT_COL).map(String::from),
    })
}

#[derive(Debug)]
pub struct HashKeeper;

impl TextFormat for HashKeeper {
    const DB_TYPE: DbType = DbType::HashKeeper;
    const INDEX_HINTS: &'static [(&'static str, HashAlgorithm)] = &[("hk", HashAlgorithm::Md5)];

    fn sniff(reader: &mut dyn BufRead) -> bool {
        sniff_line(reader).is_some_and(|line| line.starts_with(HEADER_PREFIX))
    }

    fn load(_reader: &mut BufReader<File>, _db_path: &Path) -> Result<Self> {
        Ok(HashKeeper)
    }

    fn scan(
        &self,
        reader: &mut BufReader<File>,
        _algorithm: HashAlgorithm,
        emit: &mut EmitFn<'_>,
    ) -> Result<u64> {
        let mut skipped = 0u64;
        for_each_line(reader, |line, offset| {
            if offset == 0 || line.trim().is_empty() {
                return Ok(());
            }
            match parse(line).and_then(|r| r.md5) {
                Some(digest) => emit(digest, offset),
                None => {
                    skipped += 1;
                    Ok(())
                }
            }
        })?;
        Ok(skipped)
    }

    fn record_at(&self, reader: &mut BufReader<File>, offset: u64) -> Result<Option<TextRecord>> {
        Ok(parse(&line_at(reader, offset)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record() {
        let record = parse(
            r#"1,7,"cmd.exe","C:\WINDOWS\system32\","5746BD7E255DD6A8AFA06F7C42C1BA41",389120,"08/04/2004","12:00:00",,"known good",,"#,
        )
        .unwrap();
        assert_eq!(record.file_name.as_deref(), Some(r"C:\WINDOWS\system32\cmd.exe"));
        assert_eq!(record.comment.as_deref(), Some("known good"));
        assert_eq!(hex::encode(record.md5.unwrap()), "5746bd7e255dd6a8afa06f7c42c1ba41");
    }

    #[test]
    fn test_header_is_not_a_record() {
        assert!(parse(HEADER_PREFIX).is_none());
    }
}

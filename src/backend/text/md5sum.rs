//! `md5sum` style listings.
//!
//! Accepts GNU output (`<hash>  <name>`, `<hash> *<name>`), BSD output
//! (`MD5 (<name>) = <hash>`) and bare hash lines.

use super::{decode_digest, for_each_line, line_at, sniff_line, EmitFn, TextFormat, TextRecord};
use crate::detect::DbType;
use crate::error::Result;
use crate::hash::HashAlgorithm;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

/// How many leading lines the sniff test looks at.
const SNIFF_LINES: usize = 64;

static GNU_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{32})(?:[ \t]+\*?(.+))?$").expect("static regex is valid")
});

static BSD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^MD5 ?\((.*)\) ?= ?([0-9A-Fa-f]{32})$").expect("static regex is valid")
});

fn parse(line: &str) -> Option<TextRecord> {
    let (hash, name) = if let Some(caps) = GNU_LINE.captures(line) {
        (caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str()))
    } else {
        let caps = BSD_LINE.captures(line)?;
        (caps.get(2)?.as_str(), caps.get(1).map(|m| m.as_str()))
    };
    Some(TextRecord {
        md5: Some(decode_digest(hash, HashAlgorithm::Md5)?),
        sha1: None,
        file_name: name.map(str::trim).filter(|n| !n.is_empty()).map(String::from),
        comment: None,
    })
}

#[derive(Debug)]
pub struct Md5sum;

impl TextFormat for Md5sum {
    const DB_TYPE: DbType = DbType::Md5sum;
    const INDEX_HINTS: &'static [(&'static str, HashAlgorithm)] = &[("md5sum", HashAlgorithm::Md5)];

    fn sniff(reader: &mut dyn BufRead) -> bool {
        for _ in 0..SNIFF_LINES {
            match sniff_line(reader) {
                Some(line) if parse(&line).is_some() => return true,
                Some(_) => {}
                None => return false,
            }
        }
        false
    }

    fn load(_reader: &mut BufReader<File>, _db_path: &Path) -> Result<Self> {
        Ok(Md5sum)
    }

    fn scan(
        &self,
        reader: &mut BufReader<File>,
        _algorithm: HashAlgorithm,
        emit: &mut EmitFn<'_>,
    ) -> Result<u64> {
        let mut skipped = 0u64;
        for_each_line(reader, |line, offset| {
            if line.trim().is_empty() {
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

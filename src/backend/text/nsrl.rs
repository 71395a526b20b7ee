//! NSRL `NSRLFile.txt` hash sets.
//!
//! Two column layouts have shipped over the years; the header line says
//! which one a file uses. Both carry SHA-1 and MD5, so an NSRL set can be
//! indexed by either.

use super::{decode_digest, sniff_line, for_each_line, line_at, split_csv, EmitFn, TextFormat, TextRecord};
use crate::detect::DbType;
use crate::error::{HashDbError, Result};
use crate::hash::HashAlgorithm;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

const HEADER_V1: &str = "\"SHA-1\",\"FileName\",\"FileSize\",\"ProductCode\",\"OpSystemCode\",\"MD4\",\"MD5\",\"CRC32\",\"SpecialCode\"";
const HEADER_V2: &str = "\"SHA-1\",\"MD5\",\"CRC32\",\"FileName\",\"FileSize\",\"ProductCode\",\"OpSystemCode\",\"SpecialCode\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// SHA-1, FileName, FileSize, ProductCode, OpSystemCode, MD4, MD5, ...
    V1,
    /// SHA-1, MD5, CRC32, FileName, ...
    V2,
}

impl Layout {
    fn from_header(line: &str) -> Option<Self> {
        if line.starts_with(HEADER_V1) {
            Some(Layout::V1)
        } else if line.starts_with(HEADER_V2) {
            Some(Layout::V2)
        } else {
            None
        }
    }

    /// Column positions of (sha1, md5, file name).
    const fn columns(self) -> (usize, usize, usize) {
        match self {
            Layout::V1 => (0, 6, 1),
            Layout::V2 => (0, 1, 3),
        }
    }
}

#[derive(Debug)]
pub struct Nsrl {
    layout: Layout,
}

impl Nsrl {
    fn parse(&self, line: &str) -> Option<TextRecord> {
        let fields = split_csv(line);
        let (sha1_col, md5_col, name_col) = self.layout.columns();
        let sha1 = decode_digest(fields.get(sha1_col)?, HashAlgorithm::Sha1)?;
        let md5 = decode_digest(fields.get(md5_col)?, HashAlgorithm::Md5)?;
        Some(TextRecord {
            md5: Some(md5),
            sha1: Some(sha1),
            file_name: fields.get(name_col).filter(|n| !n.is_empty()).cloned(),
            comment: None,
        })
    }
}

impl TextFormat for Nsrl {
    const DB_TYPE: DbType = DbType::Nsrl;
    const INDEX_HINTS: &'static [(&'static str, HashAlgorithm)] = &[
        ("nsrl-md5", HashAlgorithm::Md5),
        ("nsrl-sha1", HashAlgorithm::Sha1),
    ];

    fn sniff(reader: &mut dyn BufRead) -> bool {
        sniff_line(reader).is_some_and(|line| Layout::from_header(&line).is_some())
    }

    fn load(reader: &mut BufReader<File>, db_path: &Path) -> Result<Self> {
        let line = sniff_line(reader).unwrap_or_default();
        reader
            .seek(SeekFrom::Start(0))
            .map_err(HashDbError::io("open"))?;
        let layout = Layout::from_header(&line).ok_or_else(|| HashDbError::UnknownType {
            op: "open",
            path: db_path.display().to_string(),
        })?;
        Ok(Self { layout })
    }

    fn scan(
        &self,
        reader: &mut BufReader<File>,
        algorithm: HashAlgorithm,
        emit: &mut EmitFn<'_>,
    ) -> Result<u64> {
        let mut skipped = 0u64;
        for_each_line(reader, |line, offset| {
            if offset == 0 || line.is_empty() {
                return Ok(());
            }
            match self.parse(line).and_then(|r| r.digest(algorithm).map(<[u8]>::to_vec)) {
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
        Ok(self.parse(&line_at(reader, offset)?))
    }
}

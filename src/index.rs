//! Sorted external index files for text-format hash databases.
//!
//! An index is a small text header followed by fixed-width records:
//!
//! ```text
//! # hashdb index v1
//! # algorithm: md5
//! # db_type: md5sum
//! # db_name: known-good
//! 0cc175b9c0f1b6a831c399e269772661|0000000000000000
//! d41d8cd98f00b204e9800998ecf8427e|0000000000000029
//! ```
//!
//! Each record maps a lowercase hex digest to the byte offset of the
//! database record it came from. Records are sorted by hash then offset, so
//! lookups binary search the data region and then scan forward across
//! duplicates.

use crate::detect::DbType;
use crate::error::{HashDbError, Result};
use crate::hash::{HashAlgorithm, HashKey};
use crate::platform::open_db_file;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const INDEX_MAGIC: &str = "# hashdb index v1";
const OFFSET_DIGITS: usize = 16;

fn record_width(algorithm: HashAlgorithm) -> usize {
    algorithm.hex_len() + 1 + OFFSET_DIGITS + 1
}

/// Metadata stored in an index header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub algorithm: HashAlgorithm,
    pub db_type: String,
    pub db_name: String,
}

/// Collects (hash, offset) pairs and writes them out as a sorted index.
#[derive(Debug)]
pub struct IndexBuilder {
    algorithm: HashAlgorithm,
    entries: Vec<(Vec<u8>, u64)>,
}

impl IndexBuilder {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            entries: Vec::new(),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Record a digest found at `offset` in the database file.
    pub fn push(&mut self, digest: Vec<u8>, offset: u64) -> Result<()> {
        if digest.len() != self.algorithm.byte_len() {
            return Err(HashDbError::argument(
                "make_index",
                format!(
                    "{} digest has {} bytes, expected {}",
                    self.algorithm,
                    digest.len(),
                    self.algorithm.byte_len()
                ),
            ));
        }
        self.entries.push((digest, offset));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort, deduplicate and write the index to `path`, replacing any
    /// existing file only once the new one is complete.
    pub fn finish(mut self, path: &Path, db_type: DbType, db_name: &str) -> Result<usize> {
        const OP: &str = "make_index";

        self.entries.sort_unstable();
        self.entries.dedup();

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temp = NamedTempFile::new_in(&dir).map_err(HashDbError::io(OP))?;
        let mut out = BufWriter::new(temp);

        // Names end up on a single header line.
        let db_name = db_name.replace(['\r', '\n'], " ");
        writeln!(out, "{}", INDEX_MAGIC).map_err(HashDbError::io(OP))?;
        writeln!(out, "# algorithm: {}", self.algorithm).map_err(HashDbError::io(OP))?;
        writeln!(out, "# db_type: {}", db_type.as_str()).map_err(HashDbError::io(OP))?;
        writeln!(out, "# db_name: {}", db_name).map_err(HashDbError::io(OP))?;
        for (digest, offset) in &self.entries {
            writeln!(out, "{}|{:016x}", hex::encode(digest), offset)
                .map_err(HashDbError::io(OP))?;
        }

        let temp = out
            .into_inner()
            .map_err(|e| HashDbError::io(OP)(e.into_error()))?;
        temp.as_file().sync_all().map_err(HashDbError::io(OP))?;
        temp.persist(path)
            .map_err(|e| HashDbError::io(OP)(e.error))?;

        tracing::info!(
            path = %path.display(),
            algorithm = %self.algorithm,
            records = self.entries.len(),
            "Wrote hash index"
        );
        Ok(self.entries.len())
    }
}

/// An open, validated index file.
#[derive(Debug)]
pub struct SortedIndex {
    path: PathBuf,
    file: File,
    header: IndexHeader,
    data_start: u64,
    record_count: u64,
}

impl SortedIndex {
    /// Open an index and validate its header against `algorithm`.
    pub fn open(path: &Path, algorithm: HashAlgorithm) -> Result<Self> {
        const OP: &str = "open_index";

        let file = open_db_file(path).map_err(|e| HashDbError::OpenFailed {
            op: OP,
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let (header, data_start) = read_header(&file, path)?;
        if header.algorithm != algorithm {
            return Err(corrupt(
                path,
                format!("index holds {} hashes, expected {}", header.algorithm, algorithm),
            ));
        }

        let len = file.metadata().map_err(HashDbError::io(OP))?.len();
        let width = record_width(algorithm) as u64;
        let data_len = len - data_start;
        if data_len % width != 0 {
            return Err(corrupt(
                path,
                format!("data region of {} bytes is not a multiple of {}", data_len, width),
            ));
        }

        tracing::debug!(path = %path.display(), records = data_len / width, "Opened hash index");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            data_start,
            record_count: data_len / width,
        })
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Database offsets of every record matching `key`, in offset order.
    pub fn find(&mut self, key: &HashKey) -> Result<Vec<u64>> {
        if key.algorithm() != self.header.algorithm {
            return Err(HashDbError::argument(
                "lookup",
                format!(
                    "{} hash cannot be looked up in a {} index",
                    key.algorithm(),
                    self.header.algorithm
                ),
            ));
        }
        let target = key.to_hex();

        // Lower bound: first record whose hash is >= target.
        let (mut lo, mut hi) = (0u64, self.record_count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (hash, _) = self.record(mid)?;
            if hash.as_str() < target.as_str() {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        let mut offsets = Vec::new();
        let mut i = lo;
        while i < self.record_count {
            let (hash, offset) = self.record(i)?;
            if hash != target {
                break;
            }
            offsets.push(offset);
            i += 1;
        }
        Ok(offsets)
    }

    /// True when at least one record matches `key`.
    pub fn contains(&mut self, key: &HashKey) -> Result<bool> {
        Ok(!self.find(key)?.is_empty())
    }

    fn record(&mut self, i: u64) -> Result<(String, u64)> {
        const OP: &str = "lookup";
        let hex_len = self.header.algorithm.hex_len();
        let width = record_width(self.header.algorithm);
        let mut buf = vec![0u8; width];
        self.file
            .seek(SeekFrom::Start(self.data_start + i * width as u64))
            .map_err(HashDbError::io(OP))?;
        self.file.read_exact(&mut buf).map_err(HashDbError::io(OP))?;

        let line = std::str::from_utf8(&buf)
            .ok()
            .filter(|line| line.is_ascii())
            .ok_or_else(|| corrupt(&self.path, format!("record {} is not ASCII", i)))?;
        let (hash, rest) = line.split_at(hex_len);
        if !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(corrupt(&self.path, format!("record {} has a malformed hash", i)));
        }
        let offset = rest
            .strip_prefix('|')
            .and_then(|r| r.strip_suffix('\n'))
            .and_then(|r| u64::from_str_radix(r, 16).ok())
            .ok_or_else(|| corrupt(&self.path, format!("record {} is malformed", i)))?;
        Ok((hash.to_string(), offset))
    }
}

/// Read only the header of an index file.
pub fn read_index_header(path: &Path) -> Result<IndexHeader> {
    let file = open_db_file(path).map_err(|e| HashDbError::OpenFailed {
        op: "open_index",
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    read_header(&file, path).map(|(header, _)| header)
}

fn read_header(file: &File, path: &Path) -> Result<(IndexHeader, u64)> {
    const OP: &str = "open_index";
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut consumed = 0u64;

    let mut algorithm = None;
    let mut db_type = None;
    let mut db_name = None;

    let n = reader.read_line(&mut line).map_err(HashDbError::io(OP))?;
    if line.trim_end() != INDEX_MAGIC {
        return Err(corrupt(path, "missing index signature"));
    }
    consumed += n as u64;

    loop {
        line.clear();
        let n = reader.read_line(&mut line).map_err(HashDbError::io(OP))?;
        if n == 0 || !line.starts_with('#') {
            break;
        }
        consumed += n as u64;
        let Some((key, value)) = line[1..].trim().split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "algorithm" => algorithm = HashAlgorithm::parse(&value),
            "db_type" => db_type = Some(value),
            "db_name" => db_name = Some(value),
            _ => {}
        }
    }

    let algorithm = algorithm.ok_or_else(|| corrupt(path, "missing or unknown algorithm"))?;
    Ok((
        IndexHeader {
            algorithm,
            db_type: db_type.unwrap_or_default(),
            db_name: db_name.unwrap_or_default(),
        },
        consumed,
    ))
}

fn corrupt(path: &Path, reason: impl Into<String>) -> HashDbError {
    HashDbError::CorruptIndex {
        op: "open_index",
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(hex: &str) -> HashKey {
        HashKey::from_hex("test", hex).unwrap()
    }

    #[test]
    fn test_duplicates_are_returned_in_offset_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("set-md5.idx");
        let mut builder = IndexBuilder::new(HashAlgorithm::Md5);
        let a = key("0cc175b9c0f1b6a831c399e269772661");
        let b = key("d41d8cd98f00b204e9800998ecf8427e");
        builder.push(b.as_bytes().to_vec(), 300).unwrap();
        builder.push(a.as_bytes().to_vec(), 10).unwrap();
        builder.push(b.as_bytes().to_vec(), 120).unwrap();
        builder.push(b.as_bytes().to_vec(), 120).unwrap();
        assert_eq!(builder.finish(&path, DbType::Md5sum, "set").unwrap(), 3);

        let mut index = SortedIndex::open(&path, HashAlgorithm::Md5).unwrap();
        assert_eq!(index.record_count(), 3);
        assert_eq!(index.header().db_type, "md5sum");
        assert_eq!(index.header().db_name, "set");
        assert_eq!(index.find(&b).unwrap(), vec![120, 300]);
        assert_eq!(index.find(&a).unwrap(), vec![10]);
        assert!(!index
            .contains(&key("ffffffffffffffffffffffffffffffff"))
            .unwrap());
        assert!(!index
            .contains(&key("00000000000000000000000000000000"))
            .unwrap());
    }

    #[test]
    fn test_empty_index_finds_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty-md5.idx");
        IndexBuilder::new(HashAlgorithm::Md5)
            .finish(&path, DbType::Md5sum, "empty")
            .unwrap();

        let mut index = SortedIndex::open(&path, HashAlgorithm::Md5).unwrap();
        assert_eq!(index.record_count(), 0);
        assert!(index.find(&key("d41d8cd98f00b204e9800998ecf8427e")).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_algorithm_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("set-md5.idx");
        IndexBuilder::new(HashAlgorithm::Md5)
            .finish(&path, DbType::Md5sum, "set")
            .unwrap();
        let err = SortedIndex::open(&path, HashAlgorithm::Sha1).unwrap_err();
        assert!(matches!(err, HashDbError::CorruptIndex { .. }));
    }

    #[test]
    fn test_truncated_index_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad-md5.idx");
        std::fs::write(
            &path,
            "# hashdb index v1\n# algorithm: md5\nd41d8cd98f00b204e9800998ecf8427e|00\n",
        )
        .unwrap();
        let err = SortedIndex::open(&path, HashAlgorithm::Md5).unwrap_err();
        assert!(matches!(err, HashDbError::CorruptIndex { .. }));
    }

    fn write_index(path: &Path, record: &[u8]) {
        let mut contents = b"# hashdb index v1\n# algorithm: md5\n# db_type: md5sum\n".to_vec();
        contents.extend_from_slice(record);
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_multibyte_record_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("set-md5.idx");
        // 31 hex digits, then a two-byte character straddling the hash field.
        let mut record = "a".repeat(31).into_bytes();
        record.extend_from_slice("é|".as_bytes());
        record.extend_from_slice(b"000000000000000\n");
        assert_eq!(record.len(), record_width(HashAlgorithm::Md5));
        write_index(&path, &record);

        let mut index = SortedIndex::open(&path, HashAlgorithm::Md5).unwrap();
        let err = index
            .find(&key("d41d8cd98f00b204e9800998ecf8427e"))
            .unwrap_err();
        assert!(matches!(err, HashDbError::CorruptIndex { .. }));
    }

    #[test]
    fn test_non_hex_record_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("set-md5.idx");
        write_index(&path, b"zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz|0000000000000000\n");

        let mut index = SortedIndex::open(&path, HashAlgorithm::Md5).unwrap();
        assert!(matches!(
            index.contains(&key("d41d8cd98f00b204e9800998ecf8427e")),
            Err(HashDbError::CorruptIndex { .. })
        ));
    }

    #[test]
    fn test_non_index_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain-md5.idx");
        std::fs::write(&path, "hello\n").unwrap();
        assert!(SortedIndex::open(&path, HashAlgorithm::Md5).is_err());
    }
}

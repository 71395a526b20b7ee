//! Text-format hash databases that are searched through an external index.
//!
//! Each format only knows how to sniff itself, walk its records and parse
//! the record at a given offset ([`TextFormat`]). [`TextDb`] supplies the
//! rest of the backend contract on top of that: index paths, index builds,
//! binary-searched lookups and record enumeration.

mod encase;
mod hashkeeper;
mod md5sum;
mod nsrl;

pub use encase::EnCase;
pub use hashkeeper::HashKeeper;
pub use md5sum::Md5sum;
pub use nsrl::Nsrl;

use super::{HashDbBackend, HashInfo, LookupHit, LookupMode, LookupStatus};
use crate::detect::DbType;
use crate::error::{HashDbError, Result};
use crate::hash::{HashAlgorithm, HashKey};
use crate::index::{IndexBuilder, SortedIndex};
use crate::path::{display_name_from_path, index_path_for};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub type NsrlDb = TextDb<Nsrl>;
pub type Md5sumDb = TextDb<Md5sum>;
pub type EnCaseDb = TextDb<EnCase>;
pub type HashKeeperDb = TextDb<HashKeeper>;

/// One parsed database record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextRecord {
    pub md5: Option<Vec<u8>>,
    pub sha1: Option<Vec<u8>>,
    pub file_name: Option<String>,
    pub comment: Option<String>,
}

impl TextRecord {
    pub fn digest(&self, algorithm: HashAlgorithm) -> Option<&[u8]> {
        match algorithm {
            HashAlgorithm::Md5 => self.md5.as_deref(),
            HashAlgorithm::Sha1 => self.sha1.as_deref(),
            HashAlgorithm::Sha256 => None,
        }
    }
}

/// Callback receiving each (digest, record offset) pair during a scan.
pub type EmitFn<'a> = dyn FnMut(Vec<u8>, u64) -> Result<()> + 'a;

/// A line- or record-oriented hash set format.
pub trait TextFormat: Sized {
    const DB_TYPE: DbType;

    /// Index flavors this format can build, by hint name. The first entry
    /// is the default.
    const INDEX_HINTS: &'static [(&'static str, HashAlgorithm)];

    /// Cheap content test used by format detection.
    fn sniff(reader: &mut dyn BufRead) -> bool;

    /// Read whatever header state the format needs.
    fn load(reader: &mut BufReader<File>, db_path: &Path) -> Result<Self>;

    fn display_name(&self, db_path: &Path) -> String {
        display_name_from_path(db_path)
    }

    /// Walk every record from the start of the file, emitting the digest
    /// for `algorithm`. Returns the number of records skipped as invalid.
    fn scan(
        &self,
        reader: &mut BufReader<File>,
        algorithm: HashAlgorithm,
        emit: &mut EmitFn<'_>,
    ) -> Result<u64>;

    /// Parse the record starting at `offset`.
    fn record_at(&self, reader: &mut BufReader<File>, offset: u64) -> Result<Option<TextRecord>>;

    fn supports(algorithm: HashAlgorithm) -> bool {
        Self::INDEX_HINTS.iter().any(|(_, a)| *a == algorithm)
    }

    /// Map an index hint to an algorithm. Empty means the default.
    fn resolve_hint(hint: &str) -> Result<HashAlgorithm> {
        let hint = hint.trim();
        if hint.is_empty() {
            return Ok(Self::INDEX_HINTS[0].1);
        }
        Self::INDEX_HINTS
            .iter()
            .find(|(name, _)| *name == hint)
            .map(|(_, algorithm)| *algorithm)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::INDEX_HINTS.iter().map(|(n, _)| *n).collect();
                HashDbError::argument(
                    "make_index",
                    format!(
                        "index type {:?} does not match a {} database (expected one of {})",
                        hint,
                        Self::DB_TYPE,
                        known.join(", ")
                    ),
                )
            })
    }
}

/// Index paths and open index handles for one database.
#[derive(Debug)]
pub(crate) struct IndexSet {
    db_path: PathBuf,
    db_type: DbType,
    paths: HashMap<HashAlgorithm, PathBuf>,
    open: HashMap<HashAlgorithm, SortedIndex>,
}

impl IndexSet {
    pub(crate) fn new(db_path: &Path, db_type: DbType) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            db_type,
            paths: HashMap::new(),
            open: HashMap::new(),
        }
    }

    /// Index path for `algorithm`. `op` names the caller in errors.
    pub(crate) fn path(&mut self, op: &'static str, algorithm: HashAlgorithm) -> Result<PathBuf> {
        if let Some(path) = self.paths.get(&algorithm) {
            return Ok(path.clone());
        }
        let path = index_path_for(&self.db_path, algorithm).ok_or(HashDbError::Unsupported {
            op,
            db_type: format!("{} with {} hashes", self.db_type, algorithm),
        })?;
        self.paths.insert(algorithm, path.clone());
        Ok(path)
    }

    pub(crate) fn open(
        &mut self,
        op: &'static str,
        algorithm: HashAlgorithm,
    ) -> Result<&mut SortedIndex> {
        if !self.open.contains_key(&algorithm) {
            let path = self.path(op, algorithm)?;
            let index = SortedIndex::open(&path, algorithm)?;
            self.open.insert(algorithm, index);
        }
        self.open.get_mut(&algorithm).ok_or(HashDbError::Unsupported {
            op,
            db_type: self.db_type.to_string(),
        })
    }

    /// Drop an open handle so the next lookup sees a rebuilt file.
    pub(crate) fn forget(&mut self, algorithm: HashAlgorithm) {
        self.open.remove(&algorithm);
    }
}

/// Backend for any [`TextFormat`].
#[derive(Debug)]
pub struct TextDb<F> {
    db_path: PathBuf,
    display_name: String,
    reader: BufReader<File>,
    indexes: IndexSet,
    format: F,
}

impl<F: TextFormat> TextDb<F> {
    /// Take ownership of an already opened database file.
    pub fn open(file: File, db_path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(0))
            .map_err(HashDbError::io("open"))?;
        let format = F::load(&mut reader, db_path)?;
        let display_name = format.display_name(db_path);
        Ok(Self {
            db_path: db_path.to_path_buf(),
            display_name,
            reader,
            indexes: IndexSet::new(db_path, F::DB_TYPE),
            format,
        })
    }

    fn offsets(&mut self, key: &HashKey) -> Result<Vec<u64>> {
        if !F::supports(key.algorithm()) {
            return Err(HashDbError::Unsupported {
                op: "lookup",
                db_type: format!("{} with {} hashes", F::DB_TYPE, key.algorithm()),
            });
        }
        self.indexes.open("lookup", key.algorithm())?.find(key)
    }

    fn record(&mut self, key: &HashKey, offset: u64) -> Result<TextRecord> {
        let record = self.format.record_at(&mut self.reader, offset)?;
        match record {
            Some(record) if record.digest(key.algorithm()) == Some(key.as_bytes()) => Ok(record),
            _ => Err(HashDbError::MalformedRecord {
                op: "lookup",
                path: self.db_path.display().to_string(),
                offset,
            }),
        }
    }
}

impl<F: TextFormat> HashDbBackend for TextDb<F> {
    fn db_type(&self) -> DbType {
        F::DB_TYPE
    }

    fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn index_path(&mut self, algorithm: HashAlgorithm) -> Result<PathBuf> {
        self.indexes.path("index_path", algorithm)
    }

    fn open_index(&mut self, algorithm: HashAlgorithm) -> Result<()> {
        self.indexes.open("open_index", algorithm).map(|_| ())
    }

    fn make_index(&mut self, hint: &str) -> Result<HashAlgorithm> {
        let algorithm = F::resolve_hint(hint)?;
        let path = self.indexes.path("make_index", algorithm)?;
        self.indexes.forget(algorithm);

        self.reader
            .seek(SeekFrom::Start(0))
            .map_err(HashDbError::io("make_index"))?;
        let mut builder = IndexBuilder::new(algorithm);
        let skipped = self.format.scan(&mut self.reader, algorithm, &mut |digest, offset| {
            builder.push(digest, offset)
        })?;
        if skipped > 0 {
            tracing::warn!(
                db = %self.db_path.display(),
                skipped,
                "Skipped invalid records while building index"
            );
        }
        builder.finish(&path, F::DB_TYPE, &self.display_name)?;
        Ok(algorithm)
    }

    fn lookup(&mut self, key: &HashKey, mode: LookupMode<'_>) -> Result<LookupStatus> {
        let offsets = self.offsets(key)?;
        if offsets.is_empty() {
            return Ok(LookupStatus::NotFound);
        }

        if let LookupMode::Enumerate(callback) = mode {
            for offset in offsets {
                let record = self.record(key, offset)?;
                let hit = LookupHit {
                    hash: key,
                    file_name: record.file_name.as_deref(),
                    comment: record.comment.as_deref(),
                };
                if callback(&hit).is_break() {
                    break;
                }
            }
        }
        Ok(LookupStatus::Found)
    }

    fn lookup_verbose(&mut self, key: &HashKey) -> Result<Option<HashInfo>> {
        let offsets = self.offsets(key)?;
        if offsets.is_empty() {
            return Ok(None);
        }

        let mut info = HashInfo::for_key(key);
        for offset in offsets {
            let record = self.record(key, offset)?;
            if info.md5.is_none() {
                info.md5 = record.md5.as_deref().map(hex::encode);
            }
            if info.sha1.is_none() {
                info.sha1 = record.sha1.as_deref().map(hex::encode);
            }
            info.absorb(&LookupHit {
                hash: key,
                file_name: record.file_name.as_deref(),
                comment: record.comment.as_deref(),
            });
        }
        Ok(Some(info))
    }

    fn close(self: Box<Self>) -> Result<()> {
        tracing::debug!(db = %self.db_path.display(), "Closing text hash database");
        Ok(())
    }
}

/// Call `each` with every line (newline stripped) and its starting offset.
/// The reader must be positioned at the start of the file.
pub(crate) fn for_each_line(
    reader: &mut BufReader<File>,
    mut each: impl FnMut(&str, u64) -> Result<()>,
) -> Result<()> {
    let mut buf = Vec::new();
    let mut offset = 0u64;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(HashDbError::io("make_index"))?;
        if n == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        each(line.trim_end_matches(['\r', '\n']), offset)?;
        offset += n as u64;
    }
}

/// Read the single line starting at `offset`, newline stripped.
pub(crate) fn line_at(reader: &mut BufReader<File>, offset: u64) -> Result<String> {
    reader
        .seek(SeekFrom::Start(offset))
        .map_err(HashDbError::io("lookup"))?;
    let mut buf = Vec::new();
    reader
        .read_until(b'\n', &mut buf)
        .map_err(HashDbError::io("lookup"))?;
    Ok(String::from_utf8_lossy(&buf)
        .trim_end_matches(['\r', '\n'])
        .to_string())
}

/// Longest line a sniff test will read. A longer line means the stream is
/// not a text hash set.
pub(crate) const MAX_SNIFF_LINE: u64 = 8 * 1024;

/// Next line of a sniffed stream, newline stripped. `None` at end of
/// stream, on a read error, or when the line is longer than
/// [`MAX_SNIFF_LINE`].
pub(crate) fn sniff_line(reader: &mut dyn BufRead) -> Option<String> {
    let mut buf = Vec::new();
    match Read::take(&mut *reader, MAX_SNIFF_LINE).read_until(b'\n', &mut buf) {
        Ok(0) | Err(_) => None,
        Ok(n) if n as u64 == MAX_SNIFF_LINE && !buf.ends_with(b"\n") => None,
        Ok(_) => Some(
            String::from_utf8_lossy(&buf)
                .trim_end_matches(['\r', '\n'])
                .to_string(),
        ),
    }
}

/// Split one CSV line into fields, honoring double-quoted fields and `""`
/// escapes inside them.
pub(crate) fn split_csv(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Decode a hex field of exactly `algorithm`'s length.
pub(crate) fn decode_digest(field: &str, algorithm: HashAlgorithm) -> Option<Vec<u8>> {
    let field = field.trim();
    if !crate::hash::is_hex_of_len(field, algorithm.hex_len()) {
        return None;
    }
    hex::decode(field).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_split_csv_quoted_commas() {
        let fields = split_csv(r#""a,b","c""d",3,"""#);
        assert_eq!(fields, vec!["a,b", "c\"d", "3", ""]);
    }

    #[test]
    fn test_sniff_line_is_bounded() {
        let mut long = Cursor::new(vec![b'a'; 64 * 1024]);
        assert_eq!(sniff_line(&mut long), None);
        assert_eq!(long.position(), MAX_SNIFF_LINE);

        let mut lines = Cursor::new(b"first\r\nsecond".to_vec());
        assert_eq!(sniff_line(&mut lines).as_deref(), Some("first"));
        assert_eq!(sniff_line(&mut lines).as_deref(), Some("second"));
        assert_eq!(sniff_line(&mut lines), None);
    }

    #[test]
    fn test_decode_digest() {
        assert!(decode_digest("d41d8cd98f00b204e9800998ecf8427e", HashAlgorithm::Md5).is_some());
        assert!(decode_digest("d41d8cd98f00b204e9800998ecf8427e", HashAlgorithm::Sha1).is_none());
        assert!(decode_digest("SHA-1", HashAlgorithm::Sha1).is_none());
    }
}

//! Hash database format detection.
//!
//! Detection is content based. The SQLite header is checked first since it
//! is unambiguous; then every text format's sniff test runs and exactly one
//! of them must succeed. A file that satisfies two grammars is rejected as
//! [`DbType::Unknown`] rather than guessed at.

use crate::backend::text::{EnCase, HashKeeper, Md5sum, Nsrl, TextFormat};
use serde::Serialize;
use std::fmt;
use std::io::{BufReader, Read, Seek, SeekFrom};

/// SQLite magic bytes: "SQLite format 3\0"
pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Hash database formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DbType {
    /// NSRL `NSRLFile.txt` listing
    #[serde(rename = "nsrl")]
    Nsrl,
    /// `md5sum` output listing
    #[serde(rename = "md5sum")]
    Md5sum,
    /// EnCase hash set
    #[serde(rename = "encase")]
    EnCase,
    /// HashKeeper CSV listing
    #[serde(rename = "hk")]
    HashKeeper,
    /// SQLite hash database
    #[serde(rename = "sqlite")]
    Sqlite,
    /// External index without its source database
    #[serde(rename = "idxonly")]
    IndexOnly,
    /// Unknown or ambiguous format
    #[serde(rename = "unknown")]
    Unknown,
}

impl DbType {
    pub const fn as_str(self) -> &'static str {
        match self {
            DbType::Nsrl => "nsrl",
            DbType::Md5sum => "md5sum",
            DbType::EnCase => "encase",
            DbType::HashKeeper => "hk",
            DbType::Sqlite => "sqlite",
            DbType::IndexOnly => "idxonly",
            DbType::Unknown => "unknown",
        }
    }

    /// True for formats whose lookups go through a separately built index.
    pub const fn uses_external_index(self) -> bool {
        matches!(
            self,
            DbType::Nsrl | DbType::Md5sum | DbType::EnCase | DbType::HashKeeper | DbType::IndexOnly
        )
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if the stream starts with the SQLite header. Leaves the
/// stream at its start.
pub fn is_sqlite<R: Read + Seek>(stream: &mut R) -> bool {
    let mut header = [0u8; 16];
    let matched = stream.seek(SeekFrom::Start(0)).is_ok()
        && stream.read_exact(&mut header).is_ok()
        && header == *SQLITE_MAGIC;
    let _ = stream.seek(SeekFrom::Start(0));
    matched
}

/// Determine the format of an open database file.
///
/// The stream is returned to the position it had on entry, whatever the
/// outcome, so a freshly opened file can be handed straight to a backend.
pub fn detect_db_type<R: Read + Seek>(stream: &mut R) -> DbType {
    let entry = stream.stream_position().unwrap_or(0);
    let db_type = detect(stream);
    let _ = stream.seek(SeekFrom::Start(entry));
    db_type
}

fn detect<R: Read + Seek>(stream: &mut R) -> DbType {
    if is_sqlite(stream) {
        tracing::debug!("Detected SQLite hash database");
        return DbType::Sqlite;
    }

    let candidates = [
        (DbType::Nsrl, sniff::<Nsrl, R>(stream)),
        (DbType::Md5sum, sniff::<Md5sum, R>(stream)),
        (DbType::EnCase, sniff::<EnCase, R>(stream)),
        (DbType::HashKeeper, sniff::<HashKeeper, R>(stream)),
    ];

    let matched: Vec<DbType> = candidates
        .iter()
        .filter(|(_, hit)| *hit)
        .map(|(db_type, _)| *db_type)
        .collect();

    match matched.as_slice() {
        [single] => {
            tracing::debug!(db_type = %single, "Detected text hash database");
            *single
        }
        [] => DbType::Unknown,
        several => {
            tracing::warn!(
                candidates = ?several,
                "Hash database matches several formats; refusing to guess"
            );
            DbType::Unknown
        }
    }
}

fn sniff<F: TextFormat, R: Read + Seek>(stream: &mut R) -> bool {
    if stream.seek(SeekFrom::Start(0)).is_err() {
        return false;
    }
    let mut reader = BufReader::new(&mut *stream);
    F::sniff(&mut reader)
}

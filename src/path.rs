//! Database and index path conventions.
//!
//! An external index lives next to its text database, named by appending an
//! algorithm-tagged suffix to the database path (`NSRLFile.txt-md5.idx`).

use crate::hash::HashAlgorithm;
use std::path::{Path, PathBuf};

pub const MD5_INDEX_SUFFIX: &str = "-md5.idx";
pub const SHA1_INDEX_SUFFIX: &str = "-sha1.idx";

/// Extension a creatable (SQLite) database must carry.
pub const CREATABLE_EXTENSION: &str = ".kdb";

/// Index suffix for an algorithm. Text formats never index SHA-256.
pub fn index_suffix(algorithm: HashAlgorithm) -> Option<&'static str> {
    match algorithm {
        HashAlgorithm::Md5 => Some(MD5_INDEX_SUFFIX),
        HashAlgorithm::Sha1 => Some(SHA1_INDEX_SUFFIX),
        HashAlgorithm::Sha256 => None,
    }
}

/// Index file path for a database path.
pub fn index_path_for(db_path: &Path, algorithm: HashAlgorithm) -> Option<PathBuf> {
    let suffix = index_suffix(algorithm)?;
    let mut raw = db_path.as_os_str().to_os_string();
    raw.push(suffix);
    Some(PathBuf::from(raw))
}

/// If `path` names an external index, return the database path it belongs
/// to and the algorithm it indexes.
///
/// Matching is exact and case-sensitive, and only the two suffix forms are
/// recognized. A bare suffix with nothing before it is not an index path.
pub fn split_index_path(path: &Path) -> Option<(PathBuf, HashAlgorithm)> {
    let raw = path.to_str()?;
    [
        (MD5_INDEX_SUFFIX, HashAlgorithm::Md5),
        (SHA1_INDEX_SUFFIX, HashAlgorithm::Sha1),
    ]
    .into_iter()
    .find_map(|(suffix, algorithm)| {
        raw.strip_suffix(suffix)
            .filter(|base| !base.is_empty())
            .map(|base| (PathBuf::from(base), algorithm))
    })
}

/// Human-readable name for a database: its file name without extension.
pub fn display_name_from_path(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// True when `path` may be passed to [`crate::HashDatabase::create`].
pub fn has_creatable_extension(path: &Path) -> bool {
    path.to_str()
        .and_then(|raw| raw.rfind('.').map(|dot| &raw[dot..]))
        .is_some_and(|ext| ext == CREATABLE_EXTENSION)
}

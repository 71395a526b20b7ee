//! Index-only databases.
//!
//! When a text hash set has been deleted but its sorted index survives, the
//! index alone still answers "is this hash known?". There is no source file
//! to read names from, so enumeration reports a single detail-free hit.

use super::text::IndexSet;
use super::{HashDbBackend, LookupHit, LookupMode, LookupStatus};
use crate::detect::DbType;
use crate::error::{HashDbError, Result};
use crate::hash::{HashAlgorithm, HashKey};
use crate::index::read_index_header;
use crate::path::{display_name_from_path, index_path_for};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct IndexOnlyDb {
    db_path: PathBuf,
    display_name: String,
    indexes: IndexSet,
}

impl IndexOnlyDb {
    /// `db_path` is where the source database would live; indexes are
    /// found next to it by suffix.
    pub fn open(db_path: &Path) -> Result<Self> {
        // Prefer the name recorded when the index was built.
        let recorded_name = [HashAlgorithm::Md5, HashAlgorithm::Sha1]
            .into_iter()
            .filter_map(|algorithm| index_path_for(db_path, algorithm))
            .filter_map(|path| read_index_header(&path).ok())
            .map(|header| header.db_name)
            .find(|name| !name.is_empty());

        Ok(Self {
            db_path: db_path.to_path_buf(),
            display_name: recorded_name.unwrap_or_else(|| display_name_from_path(db_path)),
            indexes: IndexSet::new(db_path, DbType::IndexOnly),
        })
    }
}

impl HashDbBackend for IndexOnlyDb {
    fn db_type(&self) -> DbType {
        DbType::IndexOnly
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

    fn make_index(&mut self, _hint: &str) -> Result<HashAlgorithm> {
        Err(HashDbError::Unsupported {
            op: "make_index",
            db_type: DbType::IndexOnly.to_string(),
        })
    }

    fn lookup(&mut self, key: &HashKey, mode: LookupMode<'_>) -> Result<LookupStatus> {
        if !self.indexes.open("lookup", key.algorithm())?.contains(key)? {
            return Ok(LookupStatus::NotFound);
        }
        if let LookupMode::Enumerate(callback) = mode {
            let _ = callback(&LookupHit {
                hash: key,
                file_name: None,
                comment: None,
            });
        }
        Ok(LookupStatus::Found)
    }

    fn close(self: Box<Self>) -> Result<()> {
        tracing::debug!(db = %self.db_path.display(), "Closing index-only hash database");
        Ok(())
    }
}

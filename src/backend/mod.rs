//! Backend abstraction for the supported hash database formats.
//!
//! The [`HashDbBackend`] trait is the uniform contract every format
//! implements, so callers never branch on format. Mutation is an optional
//! sub-interface ([`HashDbUpdater`]): backends that accept updates expose it
//! through [`HashDbBackend::updater_mut`], everyone else inherits the `None`
//! default. The capability gate itself lives in [`crate::HashDatabase`].

pub mod idxonly;
pub mod sqlite;
pub mod text;

use crate::detect::DbType;
use crate::error::Result;
use crate::hash::{HashAlgorithm, HashKey};
use serde::Serialize;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

/// Outcome of a successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStatus {
    NotFound,
    Found,
}

impl LookupStatus {
    /// Numeric form: 0 for not found, 1 for found.
    pub const fn code(self) -> i8 {
        match self {
            LookupStatus::NotFound => 0,
            LookupStatus::Found => 1,
        }
    }

    pub const fn is_found(self) -> bool {
        matches!(self, LookupStatus::Found)
    }
}

/// Tri-state numeric form of a lookup result: -1 error, 0 not found, 1 found.
pub fn lookup_code<E>(result: &std::result::Result<LookupStatus, E>) -> i8 {
    match result {
        Ok(status) => status.code(),
        Err(_) => -1,
    }
}

/// One matching record handed to an enumeration callback.
#[derive(Debug, Clone, Copy)]
pub struct LookupHit<'a> {
    /// The hash that was looked up.
    pub hash: &'a HashKey,
    pub file_name: Option<&'a str>,
    pub comment: Option<&'a str>,
}

/// Per-match callback. Returning `Break` stops the enumeration.
pub type LookupCallback<'a> = dyn FnMut(&LookupHit<'_>) -> ControlFlow<()> + 'a;

/// How much work a lookup should do.
pub enum LookupMode<'a> {
    /// Existence only; no callback, no record materialization.
    Quick,
    /// Invoke the callback once per matching record.
    Enumerate(&'a mut LookupCallback<'a>),
}

impl LookupMode<'_> {
    pub fn is_quick(&self) -> bool {
        matches!(self, LookupMode::Quick)
    }
}

/// Everything a database knows about one hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HashInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub file_names: Vec<String>,
    pub comments: Vec<String>,
}

impl HashInfo {
    /// Start a record for `key`, filling the field for its algorithm.
    pub fn for_key(key: &HashKey) -> Self {
        let mut info = HashInfo::default();
        let hex = Some(key.to_hex());
        match key.algorithm() {
            HashAlgorithm::Md5 => info.md5 = hex,
            HashAlgorithm::Sha1 => info.sha1 = hex,
            HashAlgorithm::Sha256 => info.sha256 = hex,
        }
        info
    }

    fn absorb(&mut self, hit: &LookupHit<'_>) {
        if let Some(name) = hit.file_name {
            if !self.file_names.iter().any(|n| n == name) {
                self.file_names.push(name.to_string());
            }
        }
        if let Some(comment) = hit.comment {
            if !self.comments.iter().any(|c| c == comment) {
                self.comments.push(comment.to_string());
            }
        }
    }
}

/// A new record for [`HashDbUpdater::add_entry`]. All fields are optional
/// here; backends decide which ones they require.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashEntry<'a> {
    pub file_name: Option<&'a str>,
    pub md5: Option<&'a str>,
    pub sha1: Option<&'a str>,
    pub sha256: Option<&'a str>,
    pub comment: Option<&'a str>,
}

/// Backend trait for abstracting over hash database formats.
///
/// All backend implementations must provide these core operations:
/// - Path and name accessors
/// - Index location, opening and building
/// - Hash lookup, with optional per-record enumeration
/// - Close, releasing everything the constructor acquired
pub trait HashDbBackend {
    fn db_type(&self) -> DbType;

    /// Path of the primary database file.
    fn db_path(&self) -> &Path;

    fn display_name(&self) -> &str;

    /// True when lookups require a separately built index.
    fn uses_external_index(&self) -> bool {
        self.db_type().uses_external_index()
    }

    /// Path of the index for `algorithm`. Paths are computed once and stay
    /// stable for the life of the backend.
    fn index_path(&mut self, algorithm: HashAlgorithm) -> Result<PathBuf>;

    /// Make the index for `algorithm` ready for lookups.
    fn open_index(&mut self, algorithm: HashAlgorithm) -> Result<()>;

    /// Build (or rebuild) an index. `hint` names the index flavor
    /// (`nsrl-md5`, `nsrl-sha1`, `md5sum`, `encase`, `hk`); empty picks the
    /// format's default. Returns the algorithm of the index written.
    fn make_index(&mut self, hint: &str) -> Result<HashAlgorithm>;

    fn lookup(&mut self, key: &HashKey, mode: LookupMode<'_>) -> Result<LookupStatus>;

    /// Single rich result for `key`.
    ///
    /// The default collects every enumerated record into one [`HashInfo`].
    fn lookup_verbose(&mut self, key: &HashKey) -> Result<Option<HashInfo>> {
        let mut info = HashInfo::for_key(key);
        let mut collect = |hit: &LookupHit<'_>| {
            info.absorb(hit);
            ControlFlow::Continue(())
        };
        let status = self.lookup(key, LookupMode::Enumerate(&mut collect))?;
        Ok(status.is_found().then_some(info))
    }

    /// Mutation sub-interface, if this backend accepts updates.
    fn updater(&self) -> Option<&dyn HashDbUpdater> {
        None
    }

    fn updater_mut(&mut self) -> Option<&mut dyn HashDbUpdater> {
        None
    }

    /// Release every resource held by the backend.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Optional mutation and transaction operations.
///
/// Only [`crate::HashDatabase`] calls these, after its capability and
/// transaction-state checks, so implementations can assume every call is
/// legal.
pub trait HashDbUpdater {
    /// Add one record. Outside a transaction this commits immediately.
    fn add_entry(&mut self, entry: &HashEntry<'_>) -> Result<()>;

    fn begin_transaction(&mut self) -> Result<()>;

    fn commit_transaction(&mut self) -> Result<()>;

    fn rollback_transaction(&mut self) -> Result<()>;
}

//! The caller-facing hash database handle.
//!
//! [`HashDatabase::open`] resolves the caller's path, detects the format and
//! builds the matching backend. Every other operation goes through the
//! [`HashDbBackend`] contract, so nothing here branches on format. Mutation
//! is gated centrally: the capability check and the transaction state
//! machine live here, never in the backends.

use crate::backend::idxonly::IndexOnlyDb;
use crate::backend::sqlite::SqliteDb;
use crate::backend::text::{EnCaseDb, HashKeeperDb, Md5sumDb, NsrlDb};
use crate::backend::{HashDbBackend, HashDbUpdater, HashEntry, HashInfo, LookupMode, LookupStatus};
use crate::detect::{detect_db_type, DbType};
use crate::error::{HashDbError, Result};
use crate::hash::{HashAlgorithm, HashKey};
use crate::path::{has_creatable_extension, split_index_path, CREATABLE_EXTENSION};
use crate::platform::open_db_file;
use std::fs::File;
use std::path::{Path, PathBuf};

/// How [`HashDatabase::open`] should treat the primary database file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenMode {
    /// Open the database and detect its format; fall back to index-only when
    /// an index path was given and the database is missing.
    #[default]
    Normal,
    /// Skip the database entirely and use its external index.
    IndexOnly,
}

/// Transaction state of a database handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Active,
}

/// An open hash database of any supported format.
pub struct HashDatabase {
    db_type: DbType,
    backend: Box<dyn HashDbBackend>,
    transaction: TransactionState,
}

impl std::fmt::Debug for HashDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashDatabase")
            .field("db_type", &self.db_type)
            .field("db_path", &self.backend.db_path())
            .field("transaction", &self.transaction)
            .finish_non_exhaustive()
    }
}

impl HashDatabase {
    /// Create a new, empty SQLite hash database.
    ///
    /// Only `.kdb` paths can be created; every other format is distributed
    /// pre-built. The extension is checked before the filesystem is touched.
    pub fn create(path: impl AsRef<Path>) -> Result<()> {
        const OP: &str = "create";
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(HashDbError::argument(OP, "empty file path"));
        }
        if !has_creatable_extension(path) {
            return Err(HashDbError::argument(
                OP,
                format!("path must end in {} extension", CREATABLE_EXTENSION),
            ));
        }
        if path.exists() {
            return Err(HashDbError::argument(
                OP,
                format!("{} already exists", path.display()),
            ));
        }
        SqliteDb::create(path)
    }

    /// Open an existing hash database, or the external index of one.
    ///
    /// `path` may name the database itself or one of its `-md5.idx` /
    /// `-sha1.idx` index files. Failure leaves nothing open.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        const OP: &str = "open";
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(HashDbError::argument(OP, "empty file path"));
        }

        let index_path = split_index_path(path);
        let db_path: PathBuf = match &index_path {
            Some((db_path, _)) => db_path.clone(),
            None => path.to_path_buf(),
        };

        let (db_type, file) = match mode {
            OpenMode::IndexOnly => (DbType::IndexOnly, None),
            OpenMode::Normal => match open_db_file(&db_path) {
                Ok(mut file) => match detect_db_type(&mut file) {
                    DbType::Unknown => {
                        return Err(HashDbError::UnknownType {
                            op: OP,
                            path: db_path.display().to_string(),
                        })
                    }
                    db_type => (db_type, Some(file)),
                },
                Err(_) if index_path.is_some() => {
                    tracing::debug!(
                        db = %db_path.display(),
                        "Hash database missing; falling back to its index"
                    );
                    (DbType::IndexOnly, None)
                }
                Err(e) => {
                    return Err(HashDbError::OpenFailed {
                        op: OP,
                        path: db_path.display().to_string(),
                        reason: e.to_string(),
                    })
                }
            },
        };

        let backend = Self::construct(db_type, file, path, &db_path)?;
        tracing::debug!(db = %db_path.display(), db_type = %db_type, "Opened hash database");
        Ok(Self {
            db_type,
            backend,
            transaction: TransactionState::Idle,
        })
    }

    fn construct(
        db_type: DbType,
        file: Option<File>,
        user_path: &Path,
        db_path: &Path,
    ) -> Result<Box<dyn HashDbBackend>> {
        const OP: &str = "open";
        let missing_handle = || HashDbError::OpenFailed {
            op: OP,
            path: db_path.display().to_string(),
            reason: "no file handle for text database".to_string(),
        };

        let backend: Box<dyn HashDbBackend> = match db_type {
            DbType::Nsrl => Box::new(NsrlDb::open(file.ok_or_else(missing_handle)?, db_path)?),
            DbType::Md5sum => Box::new(Md5sumDb::open(file.ok_or_else(missing_handle)?, db_path)?),
            DbType::EnCase => Box::new(EnCaseDb::open(file.ok_or_else(missing_handle)?, db_path)?),
            DbType::HashKeeper => {
                Box::new(HashKeeperDb::open(file.ok_or_else(missing_handle)?, db_path)?)
            }
            DbType::Sqlite => {
                // SQLite opens its own connection.
                drop(file);
                Box::new(SqliteDb::open(db_path)?)
            }
            DbType::IndexOnly => {
                // Without the database, the index is the only thing lookups
                // can use, so it must exist.
                open_db_file(user_path).map_err(|e| HashDbError::OpenFailed {
                    op: OP,
                    path: user_path.display().to_string(),
                    reason: format!("database is index only, failed to open index: {}", e),
                })?;
                Box::new(IndexOnlyDb::open(db_path)?)
            }
            DbType::Unknown => {
                return Err(HashDbError::UnknownType {
                    op: OP,
                    path: db_path.display().to_string(),
                })
            }
        };
        Ok(backend)
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    /// Path of the primary database file. For a database opened through an
    /// index path this is the path with the index suffix removed.
    pub fn db_path(&self) -> &Path {
        self.backend.db_path()
    }

    pub fn display_name(&self) -> &str {
        self.backend.display_name()
    }

    /// True when only an external index backs this database.
    pub fn is_index_only(&self) -> bool {
        self.db_type == DbType::IndexOnly
    }

    pub fn uses_external_index(&self) -> bool {
        self.backend.uses_external_index()
    }

    pub fn index_path(&mut self, algorithm: HashAlgorithm) -> Result<PathBuf> {
        self.backend.index_path(algorithm)
    }

    pub fn open_index(&mut self, algorithm: HashAlgorithm) -> Result<()> {
        self.backend.open_index(algorithm)
    }

    /// True when the index for `algorithm` opens. A successful check leaves
    /// the index open.
    pub fn has_index(&mut self, algorithm: HashAlgorithm) -> bool {
        self.backend.open_index(algorithm).is_ok()
    }

    /// Build (or rebuild) the external index named by `hint`. See
    /// [`HashDbBackend::make_index`] for hint names. Returns the algorithm
    /// the new index covers.
    pub fn make_index(&mut self, hint: &str) -> Result<HashAlgorithm> {
        self.backend.make_index(hint)
    }

    /// Look up a hexadecimal hash.
    pub fn lookup_str(&mut self, hash: &str, mode: LookupMode<'_>) -> Result<LookupStatus> {
        let key = HashKey::from_hex("lookup_str", hash)?;
        self.backend.lookup(&key, mode)
    }

    /// Look up a raw digest. Its length selects the algorithm.
    pub fn lookup_raw(&mut self, hash: &[u8], mode: LookupMode<'_>) -> Result<LookupStatus> {
        let key = HashKey::from_raw("lookup_raw", hash)?;
        self.backend.lookup(&key, mode)
    }

    /// Look up an already parsed key.
    pub fn lookup_key(&mut self, key: &HashKey, mode: LookupMode<'_>) -> Result<LookupStatus> {
        self.backend.lookup(key, mode)
    }

    /// Everything the database knows about a hexadecimal hash, or `None`.
    pub fn lookup_verbose(&mut self, hash: &str) -> Result<Option<HashInfo>> {
        let key = HashKey::from_hex("lookup_verbose", hash)?;
        self.backend.lookup_verbose(&key)
    }

    pub fn accepts_updates(&self) -> bool {
        self.backend.updater().is_some()
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.transaction
    }

    pub fn transaction_in_progress(&self) -> bool {
        self.transaction == TransactionState::Active
    }

    fn updater(&mut self, op: &'static str) -> Result<&mut dyn HashDbUpdater> {
        let db_type = self.db_type;
        self.backend
            .updater_mut()
            .ok_or_else(|| HashDbError::Unsupported {
                op,
                db_type: db_type.to_string(),
            })
    }

    /// Add a record. Outside a transaction the write commits immediately.
    pub fn add_entry(&mut self, entry: &HashEntry<'_>) -> Result<()> {
        self.updater("add_entry")?.add_entry(entry)
    }

    pub fn begin_transaction(&mut self) -> Result<()> {
        const OP: &str = "begin_transaction";
        let state = self.transaction;
        let updater = self.updater(OP)?;
        if state == TransactionState::Active {
            return Err(HashDbError::TransactionState {
                op: OP,
                reason: "transaction already begun".to_string(),
            });
        }
        updater.begin_transaction()?;
        self.transaction = TransactionState::Active;
        Ok(())
    }

    /// Commit the active transaction.
    ///
    /// If the backend fails to commit, the handle stays
    /// [`TransactionState::Active`]: the caller must retry the commit or
    /// roll back before doing anything else with the database.
    pub fn commit_transaction(&mut self) -> Result<()> {
        const OP: &str = "commit_transaction";
        let state = self.transaction;
        let updater = self.updater(OP)?;
        if state != TransactionState::Active {
            return Err(HashDbError::TransactionState {
                op: OP,
                reason: "transaction not begun".to_string(),
            });
        }
        updater.commit_transaction()?;
        self.transaction = TransactionState::Idle;
        Ok(())
    }

    /// Discard the active transaction. A backend failure leaves the handle
    /// [`TransactionState::Active`].
    pub fn rollback_transaction(&mut self) -> Result<()> {
        const OP: &str = "rollback_transaction";
        let state = self.transaction;
        let updater = self.updater(OP)?;
        if state != TransactionState::Active {
            return Err(HashDbError::TransactionState {
                op: OP,
                reason: "transaction not begun".to_string(),
            });
        }
        updater.rollback_transaction()?;
        self.transaction = TransactionState::Idle;
        Ok(())
    }

    /// Close the database, releasing every backend resource.
    pub fn close(self) -> Result<()> {
        if self.transaction == TransactionState::Active {
            tracing::warn!(
                db = %self.backend.db_path().display(),
                "Closing hash database with an uncommitted transaction"
            );
        }
        self.backend.close()
    }
}

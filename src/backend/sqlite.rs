//! SQLite backend implementation.
//!
//! SqliteDb is the only backend that accepts updates. Hashes are stored as
//! blobs keyed by MD5; file names and comments hang off the hash row. The
//! database is its own index, so there is nothing to build.

use super::{HashDbBackend, HashDbUpdater, HashEntry, HashInfo, LookupHit, LookupMode, LookupStatus};
use crate::detect::DbType;
use crate::error::{HashDbError, Result};
use crate::hash::{is_hex_of_len, HashAlgorithm, HashKey};
use crate::path::display_name_from_path;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: &str = "1";

const SCHEMA_SQL: &str = "
CREATE TABLE db_properties (name TEXT NOT NULL, value TEXT);
CREATE TABLE hashes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    md5 BLOB UNIQUE,
    sha1 BLOB,
    sha2_256 BLOB
);
CREATE TABLE file_names (
    name TEXT NOT NULL,
    hash_id INTEGER NOT NULL,
    PRIMARY KEY (name, hash_id)
);
CREATE TABLE comments (
    comment TEXT NOT NULL,
    hash_id INTEGER NOT NULL,
    PRIMARY KEY (comment, hash_id)
);
CREATE INDEX md5_index ON hashes (md5);
CREATE INDEX sha1_index ON hashes (sha1);
CREATE INDEX sha2_256_index ON hashes (sha2_256);
";

fn hash_column(algorithm: HashAlgorithm) -> &'static str {
    match algorithm {
        HashAlgorithm::Md5 => "md5",
        HashAlgorithm::Sha1 => "sha1",
        HashAlgorithm::Sha256 => "sha2_256",
    }
}

/// SQLite hash database.
#[derive(Debug)]
pub struct SqliteDb {
    conn: Connection,
    db_path: PathBuf,
    display_name: String,
}

impl SqliteDb {
    /// Create a new, empty hash database at `db_path`.
    pub fn create(db_path: &Path) -> Result<()> {
        const OP: &str = "create";
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let mut conn = Connection::open_with_flags(db_path, flags).map_err(|e| {
            HashDbError::OpenFailed {
                op: OP,
                path: db_path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        let tx = conn.transaction().map_err(HashDbError::sqlite(OP))?;
        tx.execute_batch(SCHEMA_SQL).map_err(HashDbError::sqlite(OP))?;
        tx.execute(
            "INSERT INTO db_properties (name, value) VALUES ('Schema Version', ?1)",
            params![SCHEMA_VERSION],
        )
        .map_err(HashDbError::sqlite(OP))?;
        tx.commit().map_err(HashDbError::sqlite(OP))?;
        tracing::info!(path = %db_path.display(), "Created SQLite hash database");
        Ok(())
    }

    /// Open an existing SQLite hash database.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    pub fn open(db_path: &Path) -> Result<Self> {
        const OP: &str = "open";
        let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_WRITE)
            .map_err(|e| HashDbError::OpenFailed {
                op: OP,
                path: db_path.display().to_string(),
                reason: e.to_string(),
            })?;

        // A SQLite file without our tables is not a hash database.
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('hashes', 'file_names', 'comments')",
                [],
                |row| row.get(0),
            )
            .map_err(HashDbError::sqlite(OP))?;
        if tables != 3 {
            return Err(HashDbError::UnknownType {
                op: OP,
                path: db_path.display().to_string(),
            });
        }

        Ok(Self {
            conn,
            db_path: db_path.to_path_buf(),
            display_name: display_name_from_path(db_path),
        })
    }

    fn hash_ids(&self, key: &HashKey) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT id FROM hashes WHERE {} = ?1 ORDER BY id",
            hash_column(key.algorithm())
        );
        let mut stmt = self.conn.prepare_cached(&sql).map_err(HashDbError::sqlite("lookup"))?;
        let ids = stmt
            .query_map(params![key.as_bytes()], |row| row.get(0))
            .map_err(HashDbError::sqlite("lookup"))?
            .collect::<rusqlite::Result<Vec<i64>>>()
            .map_err(HashDbError::sqlite("lookup"))?;
        Ok(ids)
    }

    fn strings_for(&self, sql: &str, hash_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(HashDbError::sqlite("lookup"))?;
        let values = stmt
            .query_map(params![hash_id], |row| row.get(0))
            .map_err(HashDbError::sqlite("lookup"))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(HashDbError::sqlite("lookup"))?;
        Ok(values)
    }

    fn names(&self, hash_id: i64) -> Result<Vec<String>> {
        self.strings_for(
            "SELECT name FROM file_names WHERE hash_id = ?1 ORDER BY rowid",
            hash_id,
        )
    }

    fn comments(&self, hash_id: i64) -> Result<Vec<String>> {
        self.strings_for(
            "SELECT comment FROM comments WHERE hash_id = ?1 ORDER BY rowid",
            hash_id,
        )
    }
}

/// Decode an optional hex field of `add_entry`.
fn entry_digest(field: Option<&str>, algorithm: HashAlgorithm) -> Result<Option<Vec<u8>>> {
    let Some(value) = field.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if !is_hex_of_len(value, algorithm.hex_len()) {
        return Err(HashDbError::argument(
            "add_entry",
            format!("invalid {} hash {:?}", algorithm, value),
        ));
    }
    hex::decode(value)
        .map(Some)
        .map_err(|e| HashDbError::argument("add_entry", e.to_string()))
}

impl HashDbBackend for SqliteDb {
    fn db_type(&self) -> DbType {
        DbType::Sqlite
    }

    fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn index_path(&mut self, _algorithm: HashAlgorithm) -> Result<PathBuf> {
        Ok(self.db_path.clone())
    }

    fn open_index(&mut self, _algorithm: HashAlgorithm) -> Result<()> {
        Ok(())
    }

    fn make_index(&mut self, _hint: &str) -> Result<HashAlgorithm> {
        Err(HashDbError::Unsupported {
            op: "make_index",
            db_type: DbType::Sqlite.to_string(),
        })
    }

    fn lookup(&mut self, key: &HashKey, mode: LookupMode<'_>) -> Result<LookupStatus> {
        let ids = self.hash_ids(key)?;
        if ids.is_empty() {
            return Ok(LookupStatus::NotFound);
        }

        if let LookupMode::Enumerate(callback) = mode {
            'rows: for id in ids {
                let names = self.names(id)?;
                let comments = self.comments(id)?;
                let comment = comments.first().map(String::as_str);
                if names.is_empty() {
                    let hit = LookupHit { hash: key, file_name: None, comment };
                    if callback(&hit).is_break() {
                        break;
                    }
                    continue;
                }
                for name in &names {
                    let hit = LookupHit {
                        hash: key,
                        file_name: Some(name.as_str()),
                        comment,
                    };
                    if callback(&hit).is_break() {
                        break 'rows;
                    }
                }
            }
        }
        Ok(LookupStatus::Found)
    }

    fn lookup_verbose(&mut self, key: &HashKey) -> Result<Option<HashInfo>> {
        let sql = format!(
            "SELECT id, md5, sha1, sha2_256 FROM hashes WHERE {} = ?1 ORDER BY id LIMIT 1",
            hash_column(key.algorithm())
        );
        let row = self
            .conn
            .query_row(&sql, params![key.as_bytes()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<Vec<u8>>>(1)?,
                    row.get::<_, Option<Vec<u8>>>(2)?,
                    row.get::<_, Option<Vec<u8>>>(3)?,
                ))
            })
            .optional()
            .map_err(HashDbError::sqlite("lookup_verbose"))?;

        let Some((id, md5, sha1, sha256)) = row else {
            return Ok(None);
        };
        Ok(Some(HashInfo {
            md5: md5.map(hex::encode),
            sha1: sha1.map(hex::encode),
            sha256: sha256.map(hex::encode),
            file_names: self.names(id)?,
            comments: self.comments(id)?,
        }))
    }

    fn updater(&self) -> Option<&dyn HashDbUpdater> {
        Some(self)
    }

    fn updater_mut(&mut self) -> Option<&mut dyn HashDbUpdater> {
        Some(self)
    }

    fn close(self: Box<Self>) -> Result<()> {
        let this = *self;
        if !this.conn.is_autocommit() {
            tracing::warn!(db = %this.db_path.display(), "Closing with an open transaction; rolling back");
            this.conn
                .execute_batch("ROLLBACK")
                .map_err(HashDbError::sqlite("close"))?;
        }
        this.conn
            .close()
            .map_err(|(_, e)| HashDbError::sqlite("close")(e))
    }
}

impl HashDbUpdater for SqliteDb {
    fn add_entry(&mut self, entry: &HashEntry<'_>) -> Result<()> {
        const OP: &str = "add_entry";
        let md5 = entry_digest(entry.md5, HashAlgorithm::Md5)?
            .ok_or_else(|| HashDbError::argument(OP, "an MD5 hash is required"))?;
        let sha1 = entry_digest(entry.sha1, HashAlgorithm::Sha1)?;
        let sha256 = entry_digest(entry.sha256, HashAlgorithm::Sha256)?;

        // A savepoint nests inside an explicit transaction and acts as its
        // own transaction outside one.
        let sp = self.conn.savepoint().map_err(HashDbError::sqlite(OP))?;
        sp.execute(
            "INSERT OR IGNORE INTO hashes (md5, sha1, sha2_256) VALUES (?1, ?2, ?3)",
            params![md5, sha1, sha256],
        )
        .map_err(HashDbError::sqlite(OP))?;
        let id: i64 = sp
            .query_row("SELECT id FROM hashes WHERE md5 = ?1", params![md5], |row| row.get(0))
            .map_err(HashDbError::sqlite(OP))?;
        sp.execute(
            "UPDATE hashes SET sha1 = COALESCE(sha1, ?2), sha2_256 = COALESCE(sha2_256, ?3) WHERE id = ?1",
            params![id, sha1, sha256],
        )
        .map_err(HashDbError::sqlite(OP))?;

        if let Some(name) = entry.file_name.filter(|n| !n.is_empty()) {
            sp.execute(
                "INSERT OR IGNORE INTO file_names (name, hash_id) VALUES (?1, ?2)",
                params![name, id],
            )
            .map_err(HashDbError::sqlite(OP))?;
        }
        if let Some(comment) = entry.comment.filter(|c| !c.is_empty()) {
            sp.execute(
                "INSERT OR IGNORE INTO comments (comment, hash_id) VALUES (?1, ?2)",
                params![comment, id],
            )
            .map_err(HashDbError::sqlite(OP))?;
        }
        sp.commit().map_err(HashDbError::sqlite(OP))
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.conn
            .execute_batch("BEGIN")
            .map_err(HashDbError::sqlite("begin_transaction"))
    }

    fn commit_transaction(&mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(HashDbError::sqlite("commit_transaction"))
    }

    fn rollback_transaction(&mut self) -> Result<()> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(HashDbError::sqlite("rollback_transaction"))
    }
}

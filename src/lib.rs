//! hashdb - Polymorphic hash database engine.
//!
//! This library opens forensic hash sets in several on-disk formats behind a
//! single handle and answers "is this hash known?" for each of them. Flat
//! text and binary formats are searched through a separately built sorted
//! index; SQLite databases are searched directly and are the only format
//! that accepts new records.
//!
//! # Features
//!
//! - **Format detection**: NSRL, md5sum, EnCase, HashKeeper and SQLite sets
//!   are recognized from their content, not their names
//! - **Index-only mode**: a lone `-md5.idx` / `-sha1.idx` index still
//!   answers existence queries after its source set is gone
//! - **Enumerating lookups**: per-record file names and comments, with
//!   early termination from the callback
//! - **Transactions**: add records to SQLite sets singly or in batches
//!
//! # Quick Start
//!
//! ```no_run
//! use hashdb::{HashDatabase, LookupMode, OpenMode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut db = HashDatabase::open("NSRLFile.txt", OpenMode::Normal)?;
//! if !db.has_index(hashdb::HashAlgorithm::Md5) {
//!     db.make_index("nsrl-md5")?;
//! }
//! let status = db.lookup_str("d41d8cd98f00b204e9800998ecf8427e", LookupMode::Quick)?;
//! println!("found: {}", status.is_found());
//! db.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`backend`] - Backend contract and per-format implementations
//! - [`db`] - The caller-facing handle, format router and transaction gate
//! - [`detect`] - Content-based format detection
//! - [`error`] - Error types
//! - [`hash`] - Hash algorithms and parsed lookup keys
//! - [`index`] - Sorted external index files
//! - [`output`] - Response types for the command-line tool

pub mod backend;
pub mod db;
pub mod detect;
pub mod error;
pub mod hash;
pub mod index;
pub mod output;
pub mod path;
pub mod platform;

pub use backend::{
    lookup_code, HashDbBackend, HashDbUpdater, HashEntry, HashInfo, LookupCallback, LookupHit,
    LookupMode, LookupStatus,
};
pub use db::{HashDatabase, OpenMode, TransactionState};
pub use detect::{detect_db_type, DbType};
pub use error::{ErrorKind, HashDbError, Result};
pub use hash::{HashAlgorithm, HashKey};

use clap::{Parser, Subcommand};
use hashdb::error::HashDbError;
use hashdb::output::{
    render_json, AddResponse, CreateResponse, ErrorResponse, IndexResponse, IndexStatus,
    InfoResponse, LookupBatchResponse, LookupMatch, LookupResponse, OutputFormat,
};
use hashdb::{HashAlgorithm, HashDatabase, HashEntry, LookupHit, LookupMode, OpenMode};
use serde::Serialize;
use std::io::{BufRead, BufReader};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "HASHDB_LOG";

#[derive(Parser)]
#[command(
    name = "hashdb",
    version = env!("CARGO_PKG_VERSION"),
    about = "Look up file hashes in forensic hash databases"
)]
struct Cli {
    #[arg(long, global = true, default_value_t = OutputFormat::Human)]
    output: OutputFormat,

    /// Hash database, or one of its -md5.idx / -sha1.idx index files
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Use the external index only, without opening the database itself
    #[arg(long, global = true)]
    index_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new, empty SQLite hash database (.kdb)
    #[command(after_help = CREATE_EXAMPLES)]
    Create {
        path: PathBuf,
    },

    /// Show the detected type, name and index state of a database
    Info,

    /// Build the external index of a text hash database
    #[command(after_help = INDEX_EXAMPLES)]
    Index {
        /// Index flavor: nsrl-md5, nsrl-sha1, md5sum, encase or hk
        #[arg(long, default_value = "")]
        hint: String,
    },

    /// Look up hashes; reads one hash per line from stdin when none are given
    #[command(after_help = LOOKUP_EXAMPLES)]
    Lookup {
        hashes: Vec<String>,

        /// Only report whether each hash is known
        #[arg(long, conflicts_with = "verbose")]
        quick: bool,

        /// Report every known digest, name and comment for each hash
        #[arg(long)]
        verbose: bool,
    },

    /// Add records to a SQLite hash database
    #[command(after_help = ADD_EXAMPLES)]
    Add {
        #[arg(long, required_unless_present = "from")]
        md5: Option<String>,

        #[arg(long, requires = "md5")]
        sha1: Option<String>,

        #[arg(long, requires = "md5")]
        sha256: Option<String>,

        #[arg(long, requires = "md5")]
        name: Option<String>,

        #[arg(long, requires = "md5")]
        comment: Option<String>,

        /// md5sum-formatted listing to add in a single transaction
        #[arg(long, conflicts_with = "md5")]
        from: Option<PathBuf>,
    },
}

const CREATE_EXAMPLES: &str = r#"
Examples:
  hashdb create known-good.kdb
"#;

const INDEX_EXAMPLES: &str = r#"
Examples:
  # Default index for the detected format
  hashdb --db NSRLFile.txt index

  # SHA-1 index of an NSRL listing
  hashdb --db NSRLFile.txt index --hint nsrl-sha1
"#;

const LOOKUP_EXAMPLES: &str = r#"
Examples:
  hashdb --db NSRLFile.txt lookup d41d8cd98f00b204e9800998ecf8427e

  # Existence only, against an index whose database is gone
  hashdb --db NSRLFile.txt-md5.idx lookup --quick d41d8cd98f00b204e9800998ecf8427e

  # Hashes from stdin, JSON output
  cut -d' ' -f1 evidence.md5 | hashdb --db known.kdb --output json lookup
"#;

const ADD_EXAMPLES: &str = r#"
Examples:
  hashdb --db known.kdb add --md5 d41d8cd98f00b204e9800998ecf8427e --name empty.txt

  # Bulk load an md5sum listing, all or nothing
  hashdb --db known.kdb add --from evidence.md5
"#;

fn main() {
    init_logging();

    let cli = Cli::parse();
    if let Err(err) = dispatch(&cli) {
        emit_error(&cli, &err);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn dispatch(cli: &Cli) -> Result<(), HashDbError> {
    match &cli.command {
        Command::Create { path } => run_create(cli, path),
        Command::Info => run_info(cli),
        Command::Index { hint } => run_index(cli, hint),
        Command::Lookup {
            hashes,
            quick,
            verbose,
        } => run_lookup(cli, hashes, *quick, *verbose),
        Command::Add {
            md5,
            sha1,
            sha256,
            name,
            comment,
            from,
        } => match from {
            Some(listing) => run_add_listing(cli, listing),
            None => run_add(
                cli,
                &HashEntry {
                    md5: md5.as_deref(),
                    sha1: sha1.as_deref(),
                    sha256: sha256.as_deref(),
                    file_name: name.as_deref(),
                    comment: comment.as_deref(),
                },
            ),
        },
    }
}

fn open_db(cli: &Cli) -> Result<HashDatabase, HashDbError> {
    let path = cli.db.as_ref().ok_or_else(|| HashDbError::InvalidArgument {
        op: "open",
        reason: "no database given; pass --db <PATH>".to_string(),
    })?;
    let mode = if cli.index_only {
        OpenMode::IndexOnly
    } else {
        OpenMode::Normal
    };
    HashDatabase::open(path, mode)
}

fn run_create(cli: &Cli, path: &Path) -> Result<(), HashDbError> {
    HashDatabase::create(path)?;
    match cli.output {
        OutputFormat::Human => println!("Created {}", path.display()),
        OutputFormat::Json | OutputFormat::Pretty => emit_json(
            cli,
            CreateResponse {
                db_path: path.display().to_string(),
            },
        ),
    }
    Ok(())
}

fn run_info(cli: &Cli) -> Result<(), HashDbError> {
    let mut db = open_db(cli)?;

    let mut indexes = Vec::new();
    for algorithm in [HashAlgorithm::Md5, HashAlgorithm::Sha1] {
        let path = db.index_path(algorithm).ok();
        let present = path.is_some() && db.has_index(algorithm);
        indexes.push(IndexStatus {
            algorithm,
            path: path.map(|p| p.display().to_string()),
            present,
        });
    }
    let info = InfoResponse {
        db_path: db.db_path().display().to_string(),
        display_name: db.display_name().to_string(),
        db_type: db.db_type(),
        index_only: db.is_index_only(),
        uses_external_index: db.uses_external_index(),
        accepts_updates: db.accepts_updates(),
        indexes,
    };
    db.close()?;

    match cli.output {
        OutputFormat::Human => {
            println!("Database: {}", info.db_path);
            println!("Name: {}", info.display_name);
            println!("Type: {}", info.db_type);
            println!("Index only: {}", info.index_only);
            println!("External index: {}", info.uses_external_index);
            println!("Accepts updates: {}", info.accepts_updates);
            for index in &info.indexes {
                let state = if index.present { "present" } else { "missing" };
                match &index.path {
                    Some(path) => println!("Index ({}): {} [{}]", index.algorithm, path, state),
                    None => println!("Index ({}): unsupported", index.algorithm),
                }
            }
        }
        OutputFormat::Json | OutputFormat::Pretty => emit_json(cli, info),
    }
    Ok(())
}

fn run_index(cli: &Cli, hint: &str) -> Result<(), HashDbError> {
    let mut db = open_db(cli)?;
    let algorithm = db.make_index(hint)?;
    let index_path = db.index_path(algorithm)?;
    let response = IndexResponse {
        db_path: db.db_path().display().to_string(),
        hint: hint.to_string(),
        index_path: index_path.display().to_string(),
    };
    db.close()?;

    match cli.output {
        OutputFormat::Human => println!("Wrote {}", response.index_path),
        OutputFormat::Json | OutputFormat::Pretty => emit_json(cli, response),
    }
    Ok(())
}

fn run_lookup(cli: &Cli, hashes: &[String], quick: bool, verbose: bool) -> Result<(), HashDbError> {
    let hashes = if hashes.is_empty() {
        read_stdin_hashes()?
    } else {
        hashes.to_vec()
    };

    let mut db = open_db(cli)?;
    let mut results = Vec::with_capacity(hashes.len());
    for hash in &hashes {
        results.push(lookup_one(&mut db, hash, quick, verbose)?);
    }
    let response = LookupBatchResponse {
        db_path: db.db_path().display().to_string(),
        found_count: results.iter().filter(|r| r.found).count() as u64,
        total_count: results.len() as u64,
        results,
    };
    db.close()?;

    match cli.output {
        OutputFormat::Human => print_lookup_human(&response),
        OutputFormat::Json | OutputFormat::Pretty => emit_json(cli, response),
    }
    Ok(())
}

fn lookup_one(
    db: &mut HashDatabase,
    hash: &str,
    quick: bool,
    verbose: bool,
) -> Result<LookupResponse, HashDbError> {
    if verbose {
        let details = db.lookup_verbose(hash)?;
        return Ok(LookupResponse {
            hash: hash.trim().to_ascii_lowercase(),
            found: details.is_some(),
            matches: Vec::new(),
            details,
        });
    }

    let mut matches = Vec::new();
    let status = if quick {
        db.lookup_str(hash, LookupMode::Quick)?
    } else {
        let mut collect = |hit: &LookupHit<'_>| {
            matches.push(LookupMatch {
                file_name: hit.file_name.map(String::from),
                comment: hit.comment.map(String::from),
            });
            ControlFlow::Continue(())
        };
        db.lookup_str(hash, LookupMode::Enumerate(&mut collect))?
    };
    Ok(LookupResponse {
        hash: hash.trim().to_ascii_lowercase(),
        found: status.is_found(),
        matches,
        details: None,
    })
}

fn read_stdin_hashes() -> Result<Vec<String>, HashDbError> {
    let stdin = std::io::stdin();
    let mut hashes = Vec::new();
    for line in stdin.lock().lines() {
        let line = line.map_err(|source| HashDbError::Io {
            op: "lookup",
            source,
        })?;
        let line = line.trim();
        if !line.is_empty() {
            hashes.push(line.to_string());
        }
    }
    Ok(hashes)
}

fn print_lookup_human(response: &LookupBatchResponse) {
    for result in &response.results {
        if !result.found {
            println!("{}\tnot found", result.hash);
            continue;
        }
        println!("{}\tfound", result.hash);
        for hit in &result.matches {
            match (&hit.file_name, &hit.comment) {
                (Some(name), Some(comment)) => println!("  {} ({})", name, comment),
                (Some(name), None) => println!("  {}", name),
                (None, Some(comment)) => println!("  ({})", comment),
                (None, None) => {}
            }
        }
        if let Some(details) = &result.details {
            for (label, digest) in [
                ("MD5", &details.md5),
                ("SHA-1", &details.sha1),
                ("SHA-256", &details.sha256),
            ] {
                if let Some(digest) = digest {
                    println!("  {}: {}", label, digest);
                }
            }
            for name in &details.file_names {
                println!("  Name: {}", name);
            }
            for comment in &details.comments {
                println!("  Comment: {}", comment);
            }
        }
    }
    eprintln!(
        "{} of {} hashes found",
        response.found_count, response.total_count
    );
}

fn run_add(cli: &Cli, entry: &HashEntry<'_>) -> Result<(), HashDbError> {
    let mut db = open_db(cli)?;
    db.add_entry(entry)?;
    let db_path = db.db_path().display().to_string();
    db.close()?;
    report_added(cli, db_path, 1);
    Ok(())
}

fn run_add_listing(cli: &Cli, listing: &Path) -> Result<(), HashDbError> {
    let file = std::fs::File::open(listing).map_err(|source| HashDbError::Io { op: "add", source })?;

    let mut db = open_db(cli)?;
    db.begin_transaction()?;
    let added = match add_listing(&mut db, BufReader::new(file)) {
        Ok(added) => added,
        Err(err) => {
            if let Err(rollback_err) = db.rollback_transaction() {
                tracing::error!(error = %rollback_err, "Rollback after failed bulk add also failed");
            }
            return Err(err);
        }
    };
    db.commit_transaction()?;
    let db_path = db.db_path().display().to_string();
    db.close()?;

    report_added(cli, db_path, added);
    Ok(())
}

/// Add each `<md5> [*]<name>` line. Blank lines and `#` comments are skipped.
fn add_listing(db: &mut HashDatabase, reader: impl BufRead) -> Result<u64, HashDbError> {
    let mut added = 0u64;
    for line in reader.lines() {
        let line = line.map_err(|source| HashDbError::Io { op: "add", source })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (md5, name) = match line.split_once(char::is_whitespace) {
            Some((md5, rest)) => (md5, Some(rest.trim().trim_start_matches('*'))),
            None => (line, None),
        };
        db.add_entry(&HashEntry {
            md5: Some(md5),
            file_name: name.filter(|n| !n.is_empty()),
            ..HashEntry::default()
        })?;
        added += 1;
    }
    Ok(added)
}

fn report_added(cli: &Cli, db_path: String, added: u64) {
    match cli.output {
        OutputFormat::Human => println!("Added {} record(s) to {}", added, db_path),
        OutputFormat::Json | OutputFormat::Pretty => emit_json(cli, AddResponse { db_path, added }),
    }
}

fn emit_json<T: Serialize>(cli: &Cli, data: T) {
    match render_json(data, matches!(cli.output, OutputFormat::Pretty)) {
        Ok(payload) => println!("{}", payload),
        Err(ser_err) => eprintln!("ERROR: {}", ser_err),
    }
}

fn emit_error(cli: &Cli, err: &HashDbError) {
    match cli.output {
        OutputFormat::Human => {
            eprintln!("ERROR [{}]: {}", err.error_code(), err);
            if let Some(hint) = err.remediation() {
                eprintln!("Hint: {}", hint);
            }
        }
        OutputFormat::Json | OutputFormat::Pretty => emit_json(
            cli,
            ErrorResponse {
                code: err.error_code().to_string(),
                error: err.severity().to_string(),
                kind: format!("{:?}", err.kind()).to_lowercase(),
                operation: err.operation().to_string(),
                message: err.to_string(),
                remediation: err.remediation().map(|s| s.to_string()),
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_command_parses_hashes() {
        let cli = Cli::try_parse_from([
            "hashdb",
            "--db",
            "NSRLFile.txt",
            "lookup",
            "--quick",
            "d41d8cd98f00b204e9800998ecf8427e",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("NSRLFile.txt")));
        match cli.command {
            Command::Lookup {
                hashes,
                quick,
                verbose,
            } => {
                assert_eq!(hashes, vec!["d41d8cd98f00b204e9800998ecf8427e"]);
                assert!(quick);
                assert!(!verbose);
            }
            _ => panic!("Expected Command::Lookup"),
        }
    }

    #[test]
    fn test_quick_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["hashdb", "lookup", "--quick", "--verbose", "00"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_add_requires_md5_or_listing() {
        assert!(Cli::try_parse_from(["hashdb", "--db", "a.kdb", "add", "--name", "x"]).is_err());
        assert!(Cli::try_parse_from(["hashdb", "--db", "a.kdb", "add", "--from", "list.md5"]).is_ok());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["hashdb", "info", "--db", "set-md5.idx", "--index-only"]).unwrap();
        assert!(cli.index_only);
        assert!(matches!(cli.command, Command::Info));
    }

    #[test]
    fn test_add_listing_rolls_back_on_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bulk.kdb");
        HashDatabase::create(&path).unwrap();
        let mut db = HashDatabase::open(&path, OpenMode::Normal).unwrap();

        db.begin_transaction().unwrap();
        let listing = "d41d8cd98f00b204e9800998ecf8427e  empty.txt\nnot-a-hash  broken.txt\n";
        assert!(add_listing(&mut db, listing.as_bytes()).is_err());
        db.rollback_transaction().unwrap();

        let status = db
            .lookup_str("d41d8cd98f00b204e9800998ecf8427e", LookupMode::Quick)
            .unwrap();
        assert!(!status.is_found());
        db.close().unwrap();
    }
}

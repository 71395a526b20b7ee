use chrono::Utc;
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;

use crate::backend::HashInfo;
use crate::detect::DbType;
use crate::hash::HashAlgorithm;

const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Pretty,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            OutputFormat::Human => "human",
            OutputFormat::Json => "json",
            OutputFormat::Pretty => "pretty",
        };
        write!(f, "{}", value)
    }
}

#[derive(Serialize)]
pub struct JsonResponse<T> {
    pub schema_version: &'static str,
    pub execution_id: String,
    pub tool: &'static str,
    pub timestamp: String,
    pub data: T,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub error: String,
    pub kind: String,
    pub operation: String,
    pub message: String,
    pub remediation: Option<String>,
}

/// Per-algorithm index state reported by `info`.
#[derive(Serialize)]
pub struct IndexStatus {
    pub algorithm: HashAlgorithm,
    pub path: Option<String>,
    pub present: bool,
}

#[derive(Serialize)]
pub struct InfoResponse {
    pub db_path: String,
    pub display_name: String,
    pub db_type: DbType,
    pub index_only: bool,
    pub uses_external_index: bool,
    pub accepts_updates: bool,
    pub indexes: Vec<IndexStatus>,
}

/// One record reported by an enumerating lookup.
#[derive(Serialize)]
pub struct LookupMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Serialize)]
pub struct LookupResponse {
    pub hash: String,
    pub found: bool,
    /// Per-record hits; empty for quick lookups.
    pub matches: Vec<LookupMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashInfo>,
}

#[derive(Serialize)]
pub struct LookupBatchResponse {
    pub db_path: String,
    pub results: Vec<LookupResponse>,
    pub found_count: u64,
    pub total_count: u64,
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub db_path: String,
    pub hint: String,
    pub index_path: String,
}

#[derive(Serialize)]
pub struct CreateResponse {
    pub db_path: String,
}

#[derive(Serialize)]
pub struct AddResponse {
    pub db_path: String,
    pub added: u64,
}

pub fn json_response<T>(data: T) -> JsonResponse<T> {
    JsonResponse {
        schema_version: SCHEMA_VERSION,
        execution_id: execution_id(),
        tool: "hashdb",
        timestamp: Utc::now().to_rfc3339(),
        data,
    }
}

pub fn execution_id() -> String {
    let timestamp = Utc::now().timestamp();
    let pid = std::process::id();
    format!("{:x}-{:x}", timestamp, pid)
}

/// Serialize `data` in the JSON envelope, compact or pretty.
pub fn render_json<T: Serialize>(data: T, pretty: bool) -> serde_json::Result<String> {
    let response = json_response(data);
    if pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    }
}

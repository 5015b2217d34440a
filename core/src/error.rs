use std::path::PathBuf;

/// Errors raised by the ingestion and retrieval paths.
///
/// Recoverable conditions (end of stream between records, records without a
/// body, unknown field sources, missing index metadata, unknown ranking
/// models) never surface here; they are handled in place and logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended inside a record.
    #[error("truncated record #{record} at byte offset {offset}")]
    TruncatedRecord { record: u64, offset: u64 },

    /// The record framing is invalid (bad type code, negative length, ...).
    #[error("corrupt record #{record} at byte offset {offset}: {detail}")]
    CorruptRecord { record: u64, offset: u64, detail: String },

    /// A fatal error while ingesting one corpus file.
    #[error("failed to ingest {path}: {source}")]
    Ingest {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("index not found at {path}")]
    IndexNotFound { path: PathBuf },

    #[error("failed to open index at {path}: {detail}")]
    IndexOpen { path: PathBuf, detail: String },

    #[error("index is full: {0}")]
    Capacity(String),

    #[error("index serialization error: {0}")]
    Persist(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unregistered analyzer '{name}' (known: {known})")]
    UnknownAnalyzer { name: String, known: String },

    #[error("failed to read stopwords from {path}: {source}")]
    Stopwords {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid field configuration: {0}")]
    FieldConfig(String),

    /// The ranking specification string is not a list of `key:value` pairs.
    #[error("malformed similarity spec '{spec}': {detail}")]
    RankingSyntax { spec: String, detail: String },

    /// A ranking parameter is present but unparsable or out of range.
    #[error("invalid value '{value}' for similarity parameter '{name}': {detail}")]
    RankingParam { name: String, value: String, detail: String },

    #[error("cannot parse query {query_id}: {detail}")]
    QuerySyntax { query_id: String, detail: String },

    #[error("unknown query file format '{0}' (expected one of: fedweb, json, indri)")]
    UnknownQueryFormat(String),

    #[error("malformed query file {path}: {detail}")]
    QueryFile { path: PathBuf, detail: String },
}

impl Error {
    /// True for decode failures of the record stream itself.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::TruncatedRecord { .. } | Error::CorruptRecord { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

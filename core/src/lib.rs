//! Stream-corpus ingestion and ranked retrieval.
//!
//! Ingestion: [`compress`] → [`corpus`] → [`fields`] → [`index::IndexWriter`].
//! Retrieval: [`metadata`] → [`ranking`] + [`retrieval::QueryExecutor`].

pub mod analyzer;
pub mod compress;
pub mod corpus;
pub mod error;
pub mod fields;
pub mod index;
pub mod ingest;
pub mod metadata;
pub mod persist;
pub mod query;
pub mod ranking;
pub mod retrieval;
pub mod search;
pub mod similarity;
pub mod thrift;
pub mod topics;

pub use error::{Error, Result};
pub use index::{DocId, Dictionary, DocumentSink, FieldStats, IndexWriter, InvertedIndex, Posting, StoredDoc, TermId, TermStats};
pub use search::{Hit, IndexSearcher};

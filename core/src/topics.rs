//! Batch query files.

use crate::analyzer::word_tokens;
use crate::error::{Error, Result};
use crate::retrieval::QueryRequest;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

lazy_static! {
    static ref QUERY_ELEMENT: Regex = Regex::new(r"(?s)<query>(.*?)</query>").expect("valid regex");
    static ref INDRI_NUMBER: Regex = Regex::new(r"(?s)<number>(.*?)</number>").expect("valid regex");
    static ref INDRI_TEXT: Regex = Regex::new(r"(?s)<text>(.*?)</text>").expect("valid regex");
    static ref INDRI_OPERATOR: Regex = Regex::new(r"#[A-Za-z0-9]+\(|[()]").expect("valid regex");
    static ref FEDWEB_TOPIC: Regex = Regex::new(r"(?s)<topic\b([^>]*)>(.*?)</topic>").expect("valid regex");
    static ref FEDWEB_ID: Regex = Regex::new(r#"\bid\s*=\s*["']([^"']+)["']"#).expect("valid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFormat {
    Fedweb,
    Json,
    Indri,
}

impl FromStr for QueryFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fedweb" => Ok(QueryFormat::Fedweb),
            "json" => Ok(QueryFormat::Json),
            "indri" => Ok(QueryFormat::Indri),
            other => Err(Error::UnknownQueryFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JsonTopics {
    queries: Vec<JsonTopic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JsonTopic {
    #[serde(alias = "number")]
    title: String,
    text: String,
}

/// Turn free text into weighted terms `term^count`, in first-occurrence order.
/// Only word tokens survive, so punctuation never reaches the query grammar.
pub fn weighted_query(text: &str) -> String {
    let mut counts: Vec<(String, u32)> = Vec::new();
    let lowered = text.to_lowercase();
    for token in word_tokens(&lowered) {
        let token = token.to_string();
        match counts.iter_mut().find(|(t, _)| *t == token) {
            Some((_, c)) => *c += 1,
            None => counts.push((token, 1)),
        }
    }
    counts.iter().map(|(t, c)| format!("{t}^{c}")).collect::<Vec<_>>().join(" ")
}

/// Read a topic file in `format`, one request per topic.
pub fn read_queries(path: &Path, format: QueryFormat) -> Result<Vec<QueryRequest>> {
    let text = fs::read_to_string(path)?;
    let malformed = |detail: String| Error::QueryFile { path: path.to_path_buf(), detail };
    let raw: Vec<(String, String)> = match format {
        QueryFormat::Json => {
            let topics: JsonTopics = serde_json::from_str(&text).map_err(|e| malformed(e.to_string()))?;
            topics.queries.into_iter().map(|t| (t.title, t.text)).collect()
        }
        QueryFormat::Fedweb => {
            let mut out = Vec::new();
            for topic in FEDWEB_TOPIC.captures_iter(&text) {
                let id = FEDWEB_ID
                    .captures(&topic[1])
                    .or_else(|| INDRI_NUMBER.captures(&topic[2]))
                    .map(|c| c[1].trim().to_string())
                    .ok_or_else(|| malformed("topic without id".into()))?;
                let query = QUERY_ELEMENT
                    .captures(&topic[2])
                    .map(|c| c[1].trim().to_string())
                    .ok_or_else(|| malformed(format!("topic {id} without <query>")))?;
                out.push((id, query));
            }
            out
        }
        QueryFormat::Indri => {
            let mut out = Vec::new();
            for block in QUERY_ELEMENT.captures_iter(&text) {
                let body = &block[1];
                let number = INDRI_NUMBER
                    .captures(body)
                    .map(|c| c[1].trim().to_string())
                    .ok_or_else(|| malformed("query without <number>".into()))?;
                let query = INDRI_TEXT
                    .captures(body)
                    .map(|c| INDRI_OPERATOR.replace_all(&c[1], " ").into_owned())
                    .ok_or_else(|| malformed(format!("query {number} without <text>")))?;
                out.push((number, query));
            }
            out
        }
    };
    Ok(raw
        .into_iter()
        .map(|(id, text)| QueryRequest { id, text: weighted_query(&text) })
        .collect())
}

use crate::corpus::CorpusRecord;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub const FIELD_DOCNO: &str = "docno";
pub const FIELD_TEXT: &str = "text";
pub const FIELD_EPOCH: &str = "epoch";

/// Record attribute a field is filled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    DocId,
    Timestamp,
    Body,
}

impl FieldSource {
    /// `None` for unset or unrecognized selectors.
    pub fn parse(source: &str) -> Option<Self> {
        match source.trim() {
            "doc_id" => Some(FieldSource::DocId),
            "timestamp" => Some(FieldSource::Timestamp),
            "body" => Some(FieldSource::Body),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFlags {
    pub stored: bool,
    pub indexed: bool,
    /// Run the value through the analyzer instead of indexing it verbatim.
    pub analyzed: bool,
}

/// Configured target index field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub stored: bool,
    #[serde(default = "default_true")]
    pub indexed: bool,
    #[serde(default)]
    pub analyzed: bool,
}

fn default_true() -> bool { true }

impl FieldMapping {
    pub fn new(name: &str, source: &str, flags: FieldFlags) -> Self {
        Self {
            name: name.to_string(),
            source: Some(source.to_string()),
            stored: flags.stored,
            indexed: flags.indexed,
            analyzed: flags.analyzed,
        }
    }

    pub fn flags(&self) -> FieldFlags {
        FieldFlags { stored: self.stored, indexed: self.indexed, analyzed: self.analyzed }
    }

    pub fn resolved_source(&self) -> Option<FieldSource> {
        self.source.as_deref().and_then(FieldSource::parse)
    }
}

/// Field set used when no field configuration is supplied.
pub fn default_mappings() -> Vec<FieldMapping> {
    vec![
        FieldMapping::new(FIELD_DOCNO, "doc_id", FieldFlags { stored: true, indexed: true, analyzed: false }),
        FieldMapping::new(FIELD_EPOCH, "timestamp", FieldFlags { stored: true, indexed: true, analyzed: false }),
        FieldMapping::new(FIELD_TEXT, "body", FieldFlags { stored: false, indexed: true, analyzed: true }),
    ]
}

/// Read a JSON list of field mappings.
pub fn load_mappings(path: &Path) -> Result<Vec<FieldMapping>> {
    let text = fs::read_to_string(path)?;
    let mappings: Vec<FieldMapping> = serde_json::from_str(&text)?;
    validate_mappings(&mappings)?;
    for m in &mappings {
        if let Some(src) = m.source.as_deref() {
            if !src.trim().is_empty() && m.resolved_source().is_none() {
                tracing::warn!(field = %m.name, source = src, "unknown field source; field will be omitted");
            }
        }
    }
    Ok(mappings)
}

pub fn validate_mappings(mappings: &[FieldMapping]) -> Result<()> {
    let mut seen = HashSet::new();
    for m in mappings {
        if m.name.trim().is_empty() {
            return Err(Error::FieldConfig("field with empty name".into()));
        }
        if !seen.insert(m.name.as_str()) {
            return Err(Error::FieldConfig(format!("duplicate field '{}'", m.name)));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocField {
    pub name: String,
    pub value: String,
    pub flags: FieldFlags,
}

/// Fields built from one record, in mapping order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexDocument {
    pub fields: Vec<DocField>,
}

impl IndexDocument {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value.as_str())
    }
}

/// Build the document for `record`, or `None` when it has no usable body.
pub fn map_record(record: &CorpusRecord, mappings: &[FieldMapping]) -> Option<IndexDocument> {
    let body = match record.body.as_deref() {
        Some(body) if !body.is_empty() => body,
        _ => return None,
    };
    let timestamp = record.timestamp.map(|t| t.to_string());
    let mut doc = IndexDocument::default();
    for mapping in mappings {
        let value = match mapping.resolved_source() {
            Some(FieldSource::DocId) => Some(record.id.as_str()),
            Some(FieldSource::Timestamp) => timestamp.as_deref(),
            Some(FieldSource::Body) => Some(body),
            None => None,
        };
        if let Some(value) = value {
            doc.fields.push(DocField { name: mapping.name.clone(), value: value.to_string(), flags: mapping.flags() });
        }
    }
    Some(doc)
}

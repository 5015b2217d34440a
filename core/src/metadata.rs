use crate::analyzer::{Analyzer, DEFAULT_ANALYZER};
use crate::error::Result;
use crate::persist::{load_index_metadata, IndexPaths};
use crate::ranking::{ParsedRanking, RankingModel, DEFAULT_SIMILARITY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const KEY_ANALYZER: &str = "analyzer";
pub const KEY_SIMILARITY: &str = "similarity";
pub const KEY_STOPWORDS: &str = "stopwords";

/// Settings given explicitly by the operator. Empty strings count as unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSettings {
    pub analyzer: Option<String>,
    pub similarity: Option<String>,
    pub stopwords: Option<String>,
}

/// Settings in force for a search run.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSettings {
    pub analyzer: String,
    pub similarity: String,
    pub stopwords: Option<PathBuf>,
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

/// Merge explicit settings over persisted index metadata, then defaults.
pub fn resolve(explicit: &SearchSettings, persisted: &BTreeMap<String, String>) -> EffectiveSettings {
    let pick = |mine: &Option<String>, key: &str| {
        non_empty(mine.as_deref()).or_else(|| non_empty(persisted.get(key).map(String::as_str)))
    };
    EffectiveSettings {
        analyzer: pick(&explicit.analyzer, KEY_ANALYZER).unwrap_or_else(|| DEFAULT_ANALYZER.to_string()),
        similarity: pick(&explicit.similarity, KEY_SIMILARITY).unwrap_or_else(|| DEFAULT_SIMILARITY.to_string()),
        stopwords: pick(&explicit.stopwords, KEY_STOPWORDS).map(PathBuf::from),
    }
}

/// Read the index's metadata file and resolve against it.
pub fn resolve_for_index(explicit: &SearchSettings, index: &Path) -> Result<EffectiveSettings> {
    let persisted = load_index_metadata(&IndexPaths::new(index))?;
    if persisted.is_empty() {
        tracing::debug!(index = %index.display(), "no index metadata, using defaults");
    }
    Ok(resolve(explicit, &persisted))
}

impl EffectiveSettings {
    pub fn build_analyzer(&self) -> Result<Analyzer> {
        Analyzer::from_registry(&self.analyzer, self.stopwords.as_deref())
    }

    pub fn ranking(&self) -> Result<ParsedRanking> {
        RankingModel::parse(&self.similarity)
    }
}

//! Similarity specifications: `method:<model>[,param:value]*`.

use crate::error::{Error, Result};
use crate::similarity::{Bm25Similarity, DirichletSimilarity, JelinekMercerSimilarity, Similarity, TfIdfSimilarity};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_MU: f32 = 2500.0;
pub const DEFAULT_LAMBDA: f32 = 0.5;
pub const DEFAULT_K1: f32 = 1.2;
pub const DEFAULT_B: f32 = 0.75;
pub const DEFAULT_SIMILARITY: &str = "method:dirichlet,mu:2500";

const DIRICHLET_PARAMS: &[&str] = &["mu"];
const JM_PARAMS: &[&str] = &["lambda"];
const BM25_PARAMS: &[&str] = &["k1", "b"];
const NO_PARAMS: &[&str] = &[];

/// Syntactic form of a similarity specification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RankingSpec {
    pub method: Option<String>,
    /// Remaining parameters, still unparsed.
    pub params: BTreeMap<String, String>,
}

impl RankingSpec {
    /// Split `spec` into pairs. A lone identifier without `:` names the method.
    pub fn parse(spec: &str) -> Result<Self> {
        let syntax = |detail: &str| Error::RankingSyntax { spec: spec.to_string(), detail: detail.to_string() };
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(syntax("empty specification"));
        }
        if !trimmed.contains(':') && !trimmed.contains(',') {
            return Ok(Self { method: Some(trimmed.to_ascii_lowercase()), params: BTreeMap::new() });
        }
        let mut out = Self::default();
        for pair in trimmed.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                return Err(syntax("empty entry"));
            }
            let (key, value) = pair
                .split_once(':')
                .ok_or_else(|| syntax(&format!("entry '{pair}' is not key:value")))?;
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim().to_string();
            if key.is_empty() {
                return Err(syntax(&format!("entry '{pair}' has an empty key")));
            }
            if key == "method" {
                if out.method.replace(value.to_ascii_lowercase()).is_some() {
                    return Err(syntax("method given twice"));
                }
            } else if out.params.insert(key.clone(), value).is_some() {
                return Err(syntax(&format!("parameter '{key}' given twice")));
            }
        }
        Ok(out)
    }

    /// Numeric parameter, `None` when absent.
    fn param(&self, name: &str) -> Result<Option<f32>> {
        let Some(raw) = self.params.get(name) else { return Ok(None) };
        let value: f32 = raw.parse().map_err(|_| Error::RankingParam {
            name: name.to_string(),
            value: raw.clone(),
            detail: "not a number".into(),
        })?;
        if !value.is_finite() {
            return Err(Error::RankingParam { name: name.to_string(), value: raw.clone(), detail: "not finite".into() });
        }
        Ok(Some(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RankingModel {
    Dirichlet { mu: f32 },
    JelinekMercer { lambda: f32 },
    Bm25 { k1: f32, b: f32 },
    TfIdf,
}

impl Default for RankingModel {
    fn default() -> Self { RankingModel::Dirichlet { mu: DEFAULT_MU } }
}

impl fmt::Display for RankingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankingModel::Dirichlet { mu } => write!(f, "method:dirichlet,mu:{mu}"),
            RankingModel::JelinekMercer { lambda } => write!(f, "method:jm,lambda:{lambda}"),
            RankingModel::Bm25 { k1, b } => write!(f, "method:bm25,k1:{k1},b:{b}"),
            RankingModel::TfIdf => write!(f, "method:tfidf"),
        }
    }
}

/// A resolved model plus any warnings raised while resolving it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRanking {
    pub model: RankingModel,
    pub warnings: Vec<String>,
}

fn check_range(name: &str, value: f32, ok: bool, expected: &str) -> Result<f32> {
    if ok {
        Ok(value)
    } else {
        Err(Error::RankingParam { name: name.to_string(), value: value.to_string(), detail: format!("expected {expected}") })
    }
}

impl RankingModel {
    /// Resolve a parsed spec. Unknown models fall back to Dirichlet(mu=2500) with a
    /// warning; unknown parameters are ignored.
    pub fn from_spec(spec: &RankingSpec) -> Result<ParsedRanking> {
        let (model, known): (RankingModel, &[&str]) = match spec.method.as_deref() {
            Some("dir") | Some("dirichlet") => {
                let mu = spec.param("mu")?.unwrap_or(DEFAULT_MU);
                (RankingModel::Dirichlet { mu: check_range("mu", mu, mu > 0.0, "mu > 0")? }, DIRICHLET_PARAMS)
            }
            Some("jm") | Some("linear") | Some("jelinek-mercer") => {
                let lambda = spec.param("lambda")?.unwrap_or(DEFAULT_LAMBDA);
                let lambda = check_range("lambda", lambda, lambda > 0.0 && lambda <= 1.0, "0 < lambda <= 1")?;
                (RankingModel::JelinekMercer { lambda }, JM_PARAMS)
            }
            Some("bm25") => {
                let k1 = spec.param("k1")?.unwrap_or(DEFAULT_K1);
                let b = spec.param("b")?.unwrap_or(DEFAULT_B);
                let model = RankingModel::Bm25 {
                    k1: check_range("k1", k1, k1 >= 0.0, "k1 >= 0")?,
                    b: check_range("b", b, (0.0..=1.0).contains(&b), "0 <= b <= 1")?,
                };
                (model, BM25_PARAMS)
            }
            Some("tfidf") => (RankingModel::TfIdf, NO_PARAMS),
            other => {
                let warning = format!(
                    "unknown similarity '{}', defaulting to Dirichlet(mu={DEFAULT_MU})",
                    other.unwrap_or("<none>")
                );
                return Ok(ParsedRanking { model: RankingModel::default(), warnings: vec![warning] });
            }
        };
        for name in spec.params.keys().filter(|k| !known.contains(&k.as_str())) {
            tracing::debug!(param = %name, %model, "ignoring unknown similarity parameter");
        }
        Ok(ParsedRanking { model, warnings: Vec::new() })
    }

    /// Parse and resolve a specification string, logging any warnings.
    pub fn parse(spec: &str) -> Result<ParsedRanking> {
        let parsed = Self::from_spec(&RankingSpec::parse(spec)?)?;
        for w in &parsed.warnings {
            tracing::warn!("{w}");
        }
        Ok(parsed)
    }

    pub fn similarity(&self) -> Box<dyn Similarity> {
        match *self {
            RankingModel::Dirichlet { mu } => Box::new(DirichletSimilarity { mu }),
            RankingModel::JelinekMercer { lambda } => Box::new(JelinekMercerSimilarity { lambda }),
            RankingModel::Bm25 { k1, b } => Box::new(Bm25Similarity { k1, b }),
            RankingModel::TfIdf => Box::new(TfIdfSimilarity),
        }
    }
}

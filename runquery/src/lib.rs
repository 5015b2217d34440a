use anyhow::{bail, Context, Result};
use clap::Parser;
use searchcore::fields::{FIELD_DOCNO, FIELD_TEXT};
use searchcore::metadata::{resolve_for_index, SearchSettings};
use searchcore::retrieval::{QueryExecutor, QueryRequest, DEFAULT_TOP_K};
use searchcore::topics::{read_queries, QueryFormat};
use searchcore::IndexSearcher;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Flags that take a value; also accepted with a single leading dash.
const VALUE_FLAGS: &[&str] = &[
    "analyzer", "index", "field", "docno", "querynum", "query", "queryfile", "format", "similarity", "stopwords",
    "name", "top-k",
];

#[derive(Parser, Debug)]
#[command(name = "runquery")]
#[command(about = "Run ranked queries against an index and print a TREC-format run", long_about = None)]
pub struct Cli {
    /// JSON run configuration file (exclusive with the flags)
    #[arg(conflicts_with_all = ["analyzer", "index", "field", "docno", "query", "queryfile", "format", "similarity", "stopwords", "name", "top_k"])]
    pub config: Option<PathBuf>,
    /// Analyzer identifier
    #[arg(long)]
    pub analyzer: Option<String>,
    /// Path to index
    #[arg(long)]
    pub index: Option<String>,
    /// Field(s) to search, comma-separated
    #[arg(long)]
    pub field: Option<String>,
    /// Field holding the document key
    #[arg(long)]
    pub docno: Option<String>,
    /// Identifier of the inline query
    #[arg(long, default_value = "1")]
    pub querynum: String,
    /// Inline query text
    #[arg(long, allow_hyphen_values = true)]
    pub query: Option<String>,
    /// Query file
    #[arg(long)]
    pub queryfile: Option<String>,
    /// Query file format (fedweb, json, indri)
    #[arg(long)]
    pub format: Option<String>,
    /// Similarity spec, e.g. method:dir,mu:2500
    #[arg(long)]
    pub similarity: Option<String>,
    /// Stopword list
    #[arg(long)]
    pub stopwords: Option<String>,
    /// Run name
    #[arg(long)]
    pub name: Option<String>,
    /// Hits retrieved per query before deduplication
    #[arg(long)]
    pub top_k: Option<usize>,
}

/// Where the run configuration comes from.
#[derive(Debug)]
pub enum ConfigSource {
    File(PathBuf),
    Flags(RunQueryConfig),
}

impl Cli {
    /// Validate the invocation. `Err` carries a usage message.
    pub fn source(self) -> std::result::Result<ConfigSource, String> {
        if let Some(path) = self.config {
            return Ok(ConfigSource::File(path));
        }
        let Some(index) = self.index.filter(|i| !i.trim().is_empty()) else {
            return Err("either a configuration file or --index is required".into());
        };
        let mut config = RunQueryConfig {
            index,
            analyzer: self.analyzer,
            similarity: self.similarity,
            stopwords: self.stopwords,
            docno: self.docno,
            field: self.field,
            run_name: self.name,
            top_k: self.top_k,
            ..Default::default()
        };
        match (self.query.filter(|q| !q.is_empty()), self.queryfile) {
            (Some(text), _) => {
                config.queries.push(QuerySpec { number: self.querynum, text: text.replace('\'', "\"") });
            }
            (None, Some(path)) => {
                let format = self.format.unwrap_or_else(|| "json".into());
                config.query_file = Some(QueryFileConfig { path, format });
            }
            (None, None) => return Err("one of --query or --queryfile is required".into()),
        }
        Ok(ConfigSource::Flags(config))
    }
}

/// Rewrite `-index` style flags to `--index`, leaving flag values untouched.
pub fn normalize_args<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    let mut out = Vec::new();
    let mut expect_value = false;
    for (i, arg) in args.into_iter().enumerate() {
        if i == 0 || expect_value {
            expect_value = false;
            out.push(arg);
            continue;
        }
        let name = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-'));
        match name {
            Some(name) if VALUE_FLAGS.contains(&name) => {
                expect_value = true;
                out.push(format!("--{name}"));
            }
            Some(name) if VALUE_FLAGS.iter().any(|f| name.starts_with(&format!("{f}="))) => {
                out.push(format!("--{name}"));
            }
            _ => out.push(arg),
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub number: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFileConfig {
    pub path: String,
    pub format: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunQueryConfig {
    pub index: String,
    pub analyzer: Option<String>,
    pub similarity: Option<String>,
    pub stopwords: Option<String>,
    pub docno: Option<String>,
    /// Comma-separated search fields.
    pub field: Option<String>,
    pub run_name: Option<String>,
    pub top_k: Option<usize>,
    pub queries: Vec<QuerySpec>,
    /// Replaces `queries` when present.
    pub query_file: Option<QueryFileConfig>,
}

impl RunQueryConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("configuration file {} not readable", path.display()))?;
        let config: RunQueryConfig =
            serde_json::from_str(&text).with_context(|| format!("parsing configuration file {}", path.display()))?;
        Ok(config)
    }

    fn search_fields(&self) -> Vec<String> {
        let fields: Vec<String> = self
            .field
            .as_deref()
            .unwrap_or(FIELD_TEXT)
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect();
        if fields.is_empty() { vec![FIELD_TEXT.to_string()] } else { fields }
    }

    fn requests(&self) -> Result<Vec<QueryRequest>> {
        if let Some(qf) = &self.query_file {
            let format: QueryFormat = qf.format.parse()?;
            return read_queries(Path::new(&qf.path), format).with_context(|| format!("reading query file {}", qf.path));
        }
        Ok(self.queries.iter().map(|q| QueryRequest { id: q.number.clone(), text: q.text.clone() }).collect())
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub queries: usize,
    pub lines: usize,
    /// Ids of queries that produced an error instead of results.
    pub failed: Vec<String>,
}

/// Execute every configured query and write run lines to `out` in query order.
///
/// A failing query is logged and skipped; setup failures (index, analyzer,
/// similarity parameters) abort the run.
pub fn run<W: Write>(config: &RunQueryConfig, out: &mut W) -> Result<RunSummary> {
    if config.index.trim().is_empty() {
        bail!("no index configured");
    }
    let index = Path::new(&config.index);
    let explicit = SearchSettings {
        analyzer: config.analyzer.clone(),
        similarity: config.similarity.clone(),
        stopwords: config.stopwords.clone(),
    };
    let settings = resolve_for_index(&explicit, index)?;
    let analyzer = settings.build_analyzer()?;
    let ranking = settings.ranking()?;
    tracing::info!(similarity = %ranking.model, analyzer = %analyzer.name(), "search settings resolved");

    let searcher = IndexSearcher::open(index).with_context(|| format!("opening index {}", index.display()))?;
    let similarity = ranking.model.similarity();
    let docno = config.docno.as_deref().filter(|d| !d.is_empty()).unwrap_or(FIELD_DOCNO);
    let run_tag = config.run_name.as_deref().filter(|n| !n.is_empty()).unwrap_or("default");
    let executor = QueryExecutor::new(&searcher, &analyzer, similarity.as_ref())
        .fields(config.search_fields())
        .docno_field(docno)
        .run_tag(run_tag)
        .top_k(config.top_k.unwrap_or(DEFAULT_TOP_K));

    let requests = config.requests()?;
    if requests.is_empty() {
        tracing::warn!("no queries configured");
    }
    let mut summary = RunSummary { queries: requests.len(), ..Default::default() };
    for (request, outcome) in requests.iter().zip(executor.execute_batch(&requests)) {
        match outcome {
            Ok(results) => {
                for r in &results {
                    writeln!(out, "{r}")?;
                }
                summary.lines += results.len();
            }
            Err(e) => {
                tracing::error!(query = %request.id, error = %e, "query failed");
                summary.failed.push(request.id.clone());
            }
        }
    }
    Ok(summary)
}

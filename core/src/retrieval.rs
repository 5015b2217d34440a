use crate::analyzer::Analyzer;
use crate::error::Result;
use crate::query::QueryParser;
use crate::search::IndexSearcher;
use crate::similarity::Similarity;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt;

pub const DEFAULT_TOP_K: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub id: String,
    pub text: String,
}

/// One line of a run: `queryId Q0 docKey rank score runTag`.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub query_id: String,
    /// 0-based, consecutive after duplicate keys are dropped.
    pub rank: usize,
    pub doc_key: String,
    pub score: f32,
    pub run_tag: String,
}

impl fmt::Display for RankedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Q0 {} {} {} {}", self.query_id, self.doc_key, self.rank, self.score, self.run_tag)
    }
}

/// Runs parsed queries against a searcher and reports one result per document key.
pub struct QueryExecutor<'a> {
    searcher: &'a IndexSearcher,
    analyzer: &'a Analyzer,
    similarity: &'a dyn Similarity,
    fields: Vec<String>,
    docno_field: String,
    run_tag: String,
    top_k: usize,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(searcher: &'a IndexSearcher, analyzer: &'a Analyzer, similarity: &'a dyn Similarity) -> Self {
        Self {
            searcher,
            analyzer,
            similarity,
            fields: vec![crate::fields::FIELD_TEXT.to_string()],
            docno_field: crate::fields::FIELD_DOCNO.to_string(),
            run_tag: "default".to_string(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn docno_field(mut self, field: &str) -> Self {
        self.docno_field = field.to_string();
        self
    }

    pub fn run_tag(mut self, tag: &str) -> Self {
        self.run_tag = tag.to_string();
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn execute(&self, request: &QueryRequest) -> Result<Vec<RankedResult>> {
        let parser = QueryParser::new(self.fields.clone(), self.analyzer);
        let query = parser.parse(&request.id, &request.text)?;
        let hits = self.searcher.search(&query, self.similarity, self.top_k)?;
        let mut seen: HashSet<&str> = HashSet::new();
        let mut results = Vec::new();
        for hit in hits {
            let Some(key) = self.searcher.doc(hit.doc_id).and_then(|d| d.get(&self.docno_field)) else {
                tracing::debug!(query = %request.id, doc_id = hit.doc_id, field = %self.docno_field, "hit without document key");
                continue;
            };
            if !seen.insert(key) {
                continue;
            }
            results.push(RankedResult {
                query_id: request.id.clone(),
                rank: results.len(),
                doc_key: key.to_string(),
                score: hit.score,
                run_tag: self.run_tag.clone(),
            });
        }
        Ok(results)
    }

    /// Execute independent queries concurrently. Outcomes come back in request order.
    pub fn execute_batch(&self, requests: &[QueryRequest]) -> Vec<Result<Vec<RankedResult>>> {
        requests.par_iter().map(|r| self.execute(r)).collect()
    }
}

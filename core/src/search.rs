use crate::error::Result;
use crate::persist::{load_index_header, load_postings_for_term, IndexPaths, MetaFile};
use crate::query::{Leaf, Occur, Query};
use crate::similarity::{CollectionStats, Similarity, TermStatistics};
use crate::{DocId, Dictionary, Posting, StoredDoc};
use std::collections::HashMap;
use std::path::Path;

/// One scored document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub doc_id: DocId,
    pub score: f32,
}

/// Read-only view over a committed index. Postings are loaded per term on demand.
pub struct IndexSearcher {
    paths: IndexPaths,
    dictionary: Dictionary,
    docs: Vec<StoredDoc>,
    meta: MetaFile,
}

#[derive(Default)]
struct DocAccumulator {
    score: f32,
    matched: usize,
    required: usize,
    prohibited: bool,
}

impl IndexSearcher {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let paths = IndexPaths::new(root);
        let (dictionary, docs, meta) = load_index_header(&paths)?;
        tracing::debug!(path = %paths.root.display(), num_docs = meta.num_docs, "index opened");
        Ok(Self { paths, dictionary, docs, meta })
    }

    pub fn num_docs(&self) -> u32 { self.meta.num_docs }

    pub fn doc(&self, doc_id: DocId) -> Option<&StoredDoc> { self.docs.get(doc_id as usize) }

    fn collection_stats(&self, field: &str) -> CollectionStats {
        let stats = self.meta.fields.get(field).copied().unwrap_or_default();
        CollectionStats { num_docs: self.meta.num_docs, doc_count: stats.doc_count, total_terms: stats.total_terms }
    }

    fn term_postings(&self, field: &str, term: &str) -> Result<Option<(TermStatistics, Vec<Posting>)>> {
        let Some(tid) = self.dictionary.lookup(field, term) else { return Ok(None) };
        let stats = self.dictionary.stats(tid);
        let postings = load_postings_for_term(&self.paths, tid)?;
        Ok(Some((TermStatistics { doc_freq: stats.df, total_term_freq: stats.cf }, postings)))
    }

    /// Postings of a phrase, with statistics computed over its matches.
    fn phrase_postings(&self, field: &str, terms: &[(String, u32)]) -> Result<Option<(TermStatistics, Vec<Posting>)>> {
        let mut lists = Vec::with_capacity(terms.len());
        for (term, offset) in terms {
            match self.term_postings(field, term)? {
                Some((_, postings)) => lists.push((postings, *offset)),
                None => return Ok(None),
            }
        }
        lists.sort_by_key(|(p, _)| p.len());
        let (first, first_offset) = &lists[0];
        let mut out = Vec::new();
        for posting in first {
            let mut others = Vec::with_capacity(lists.len() - 1);
            for (list, offset) in &lists[1..] {
                match list.binary_search_by_key(&posting.doc_id, |p| p.doc_id) {
                    Ok(idx) => others.push((&list[idx], *offset)),
                    Err(_) => break,
                }
            }
            if others.len() != lists.len() - 1 {
                continue;
            }
            let positions: Vec<u32> = posting
                .positions
                .iter()
                .filter_map(|p| p.checked_sub(*first_offset))
                .filter(|start| {
                    others.iter().all(|(other, offset)| other.positions.binary_search(&(start + offset)).is_ok())
                })
                .collect();
            if !positions.is_empty() {
                out.push(Posting { doc_id: posting.doc_id, tf: positions.len() as u32, positions });
            }
        }
        if out.is_empty() {
            return Ok(None);
        }
        out.sort_by_key(|p| p.doc_id);
        let stats = TermStatistics { doc_freq: out.len() as u32, total_term_freq: out.iter().map(|p| p.tf as u64).sum() };
        Ok(Some((stats, out)))
    }

    /// Score `query` and return at most `top_k` hits by descending score; equal
    /// scores keep doc id order.
    pub fn search(&self, query: &Query, similarity: &dyn Similarity, top_k: usize) -> Result<Vec<Hit>> {
        let mut acc: HashMap<DocId, DocAccumulator> = HashMap::new();
        let required_clauses = query.clauses.iter().filter(|c| c.occur == Occur::Must).count();
        for clause in &query.clauses {
            let mut clause_scores: HashMap<DocId, f32> = HashMap::new();
            for leaf in &clause.alternatives {
                let (field, found) = match leaf {
                    Leaf::Term { field, term } => (field, self.term_postings(field, term)?),
                    Leaf::Phrase { field, terms } => (field, self.phrase_postings(field, terms)?),
                };
                let Some((term_stats, postings)) = found else { continue };
                let coll = self.collection_stats(field);
                for p in postings {
                    let len = self.doc(p.doc_id).map(|d| d.field_len(field)).unwrap_or(0) as f32;
                    let s = similarity.score(p.tf as f32, len, &term_stats, &coll);
                    *clause_scores.entry(p.doc_id).or_insert(0.0) += s;
                }
            }
            for (doc_id, s) in clause_scores {
                let entry = acc.entry(doc_id).or_default();
                match clause.occur {
                    Occur::MustNot => entry.prohibited = true,
                    Occur::Must => {
                        entry.required += 1;
                        entry.matched += 1;
                        entry.score += clause.boost * s;
                    }
                    Occur::Should => {
                        entry.matched += 1;
                        entry.score += clause.boost * s;
                    }
                }
            }
        }

        let max_overlap = query.scoring_clauses();
        let mut hits: Vec<Hit> = acc
            .into_iter()
            .filter(|(_, a)| !a.prohibited && a.required == required_clauses && a.matched > 0)
            .map(|(doc_id, a)| Hit { doc_id, score: a.score * similarity.coord(a.matched, max_overlap) })
            .collect();
        hits.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::corpus::CorpusRecord;
    use crate::fields::{default_mappings, map_record};
    use crate::index::{DocumentSink, IndexWriter};
    use crate::query::QueryParser;
    use crate::ranking::RankingModel;

    fn build(docs: &[(&str, &str)]) -> (tempfile::TempDir, IndexSearcher) {
        let dir = tempfile::tempdir().unwrap();
        let writer = IndexWriter::create(dir.path(), Analyzer::standard()).unwrap();
        for (id, body) in docs {
            let record = CorpusRecord { id: id.to_string(), timestamp: None, body: Some(body.to_string()) };
            writer.add(map_record(&record, &default_mappings()).unwrap()).unwrap();
        }
        writer.commit().unwrap();
        let searcher = IndexSearcher::open(dir.path()).unwrap();
        (dir, searcher)
    }

    fn run(searcher: &IndexSearcher, text: &str, model: &str) -> Vec<Hit> {
        let analyzer = Analyzer::standard();
        let q = QueryParser::new(vec!["text".into()], &analyzer).parse("1", text).unwrap();
        let sim = RankingModel::parse(model).unwrap().model.similarity();
        searcher.search(&q, sim.as_ref(), 1000).unwrap()
    }

    #[test]
    fn scores_descend_for_every_model() {
        let (_dir, s) = build(&[("a", "cat"), ("b", "cat cat dog"), ("c", "dog bird"), ("d", "cat bird fish")]);
        for model in ["method:dir", "method:jm", "method:bm25", "method:tfidf"] {
            let hits = run(&s, "cat bird", model);
            assert!(!hits.is_empty(), "{model}");
            assert!(hits.windows(2).all(|w| w[0].score >= w[1].score), "{model}");
        }
    }

    #[test]
    fn required_and_prohibited_clauses() {
        let (_dir, s) = build(&[("a", "cat dog"), ("b", "cat"), ("c", "dog")]);
        let hits = run(&s, "+cat -dog", "bm25");
        assert_eq!(hits.iter().map(|h| h.doc_id).collect::<Vec<_>>(), vec![1]);
        assert!(run(&s, "-cat", "bm25").is_empty());
    }

    #[test]
    fn phrase_requires_adjacency() {
        let (_dir, s) = build(&[("a", "the cat sat"), ("b", "the sat cat")]);
        let hits = run(&s, "\"cat sat\"", "bm25");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, 0);
    }

    #[test]
    fn top_k_truncates() {
        let (_dir, s) = build(&[("a", "cat"), ("b", "cat"), ("c", "cat")]);
        let analyzer = Analyzer::standard();
        let q = QueryParser::new(vec!["text".into()], &analyzer).parse("1", "cat").unwrap();
        let sim = RankingModel::default().similarity();
        let hits = s.search(&q, sim.as_ref(), 2).unwrap();
        assert_eq!(hits.iter().map(|h| h.doc_id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn unknown_terms_match_nothing() {
        let (_dir, s) = build(&[("a", "cat")]);
        assert!(run(&s, "zebra", "method:dir").is_empty());
    }
}

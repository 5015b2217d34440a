use crate::analyzer::Analyzer;
use crate::error::{Error, Result};
use crate::fields::IndexDocument;
use crate::metadata::KEY_ANALYZER;
use crate::persist::{
    load_dictionary, load_docs, load_index_metadata, load_meta, load_postings_for_term, save_dictionary,
    save_docs, save_index_metadata, save_meta, save_postings_for_term, IndexPaths, MetaFile, FORMAT_VERSION,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

pub type TermId = u32;
pub type DocId = u32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
    pub positions: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TermStats {
    /// Documents containing the term.
    pub df: u32,
    /// Total occurrences across the collection.
    pub cf: u64,
}

/// Per-field term dictionaries sharing one term id space.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Dictionary {
    pub fields: HashMap<String, HashMap<String, TermId>>,
    pub stats: Vec<TermStats>,
}

impl Dictionary {
    pub fn lookup(&self, field: &str, term: &str) -> Option<TermId> {
        self.fields.get(field).and_then(|terms| terms.get(term)).copied()
    }

    pub fn stats(&self, term_id: TermId) -> TermStats {
        self.stats.get(term_id as usize).copied().unwrap_or_default()
    }

    pub fn num_terms(&self) -> usize { self.stats.len() }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FieldStats {
    /// Documents with at least one token in the field.
    pub doc_count: u32,
    /// Sum of field lengths over all documents.
    pub total_terms: u64,
}

/// Stored values and per-field token counts of one indexed document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredDoc {
    pub stored: Vec<(String, String)>,
    pub lengths: HashMap<String, u32>,
}

impl StoredDoc {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.stored.iter().find(|(name, _)| name == field).map(|(_, v)| v.as_str())
    }

    pub fn field_len(&self, field: &str) -> u32 {
        self.lengths.get(field).copied().unwrap_or(0)
    }
}

#[derive(Default)]
pub struct InvertedIndex {
    pub dictionary: Dictionary,
    pub postings: HashMap<TermId, Vec<Posting>>,
    pub docs: Vec<StoredDoc>,
    pub fields: BTreeMap<String, FieldStats>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    pub fn num_docs(&self) -> u32 { self.docs.len() as u32 }

    /// Invert one document. Postings stay sorted by doc id because ids are
    /// handed out in insertion order.
    pub fn add(&mut self, doc: &IndexDocument, analyzer: &Analyzer) -> Result<DocId> {
        let doc_id = DocId::try_from(self.docs.len())
            .ok()
            .filter(|id| *id < DocId::MAX)
            .ok_or_else(|| Error::Capacity(format!("{} documents", self.docs.len())))?;
        let mut stored = StoredDoc::default();
        for field in &doc.fields {
            if field.flags.stored {
                stored.stored.push((field.name.clone(), field.value.clone()));
            }
            if !field.flags.indexed {
                continue;
            }
            let tokens: Vec<(String, usize)> = if field.flags.analyzed {
                analyzer.analyze(&field.value)
            } else {
                vec![(field.value.clone(), 0)]
            };
            if tokens.is_empty() {
                continue;
            }
            let mut positions: HashMap<String, Vec<u32>> = HashMap::new();
            for (term, pos) in tokens.iter() {
                positions.entry(term.clone()).or_default().push(*pos as u32);
            }
            *stored.lengths.entry(field.name.clone()).or_insert(0) += tokens.len() as u32;
            let stats = self.fields.entry(field.name.clone()).or_default();
            stats.doc_count += 1;
            stats.total_terms += tokens.len() as u64;

            let next_term_id = self.dictionary.stats.len() as TermId;
            let terms = self.dictionary.fields.entry(field.name.clone()).or_default();
            let mut new_terms = 0;
            for (term, pos) in positions {
                let tid = *terms.entry(term).or_insert_with(|| {
                    new_terms += 1;
                    next_term_id + new_terms - 1
                });
                if tid as usize >= self.dictionary.stats.len() {
                    self.dictionary.stats.resize(tid as usize + 1, TermStats::default());
                }
                let ts = &mut self.dictionary.stats[tid as usize];
                ts.df += 1;
                ts.cf += pos.len() as u64;
                self.postings.entry(tid).or_default().push(Posting { doc_id, tf: pos.len() as u32, positions: pos });
            }
        }
        self.docs.push(stored);
        Ok(doc_id)
    }
}

/// Destination for documents built during ingestion.
pub trait DocumentSink: Send + Sync {
    /// Commit-order append of one document.
    fn add(&self, doc: IndexDocument) -> Result<()>;

    /// Analyzer applied to analyzed fields.
    fn analyzer(&self) -> &Analyzer;
}

/// Writer session over an index directory. Safe to share between ingestion workers.
pub struct IndexWriter {
    paths: IndexPaths,
    analyzer: Analyzer,
    index: Mutex<InvertedIndex>,
    metadata: Mutex<BTreeMap<String, String>>,
}

impl IndexWriter {
    /// Start a fresh index at `root`, discarding any previous contents.
    pub fn create<P: AsRef<Path>>(root: P, analyzer: Analyzer) -> Result<Self> {
        let paths = IndexPaths::new(root);
        prepare_dir(&paths)?;
        let postings = paths.root.join("postings");
        if postings.exists() {
            fs::remove_dir_all(&postings).map_err(|e| open_error(&paths, e))?;
        }
        Ok(Self { paths, analyzer, index: Mutex::new(InvertedIndex::new()), metadata: Mutex::new(BTreeMap::new()) })
    }

    /// Append to the index at `root` if one exists, otherwise create it.
    /// Appending with an analyzer other than the one the index was built with is refused.
    pub fn open_or_create<P: AsRef<Path>>(root: P, analyzer: Analyzer) -> Result<Self> {
        let paths = IndexPaths::new(&root);
        if !paths.exists() {
            return Self::create(root, analyzer);
        }
        let meta = load_meta(&paths)?;
        let dictionary = load_dictionary(&paths)?;
        let docs = load_docs(&paths)?;
        let mut postings = HashMap::new();
        for tid in 0..dictionary.num_terms() as TermId {
            postings.insert(tid, load_postings_for_term(&paths, tid)?);
        }
        let metadata = load_index_metadata(&paths)?;
        if let Some(built_with) = metadata.get(KEY_ANALYZER).filter(|a| a.as_str() != analyzer.name()) {
            return Err(Error::IndexOpen {
                path: paths.root.clone(),
                detail: format!("index was built with analyzer '{built_with}', cannot append with '{}'", analyzer.name()),
            });
        }
        tracing::info!(path = %paths.root.display(), num_docs = meta.num_docs, "appending to existing index");
        let index = InvertedIndex { dictionary, postings, docs, fields: meta.fields };
        Ok(Self { paths, analyzer, index: Mutex::new(index), metadata: Mutex::new(metadata) })
    }

    pub fn root(&self) -> &Path { &self.paths.root }

    pub fn num_docs(&self) -> u32 { self.index.lock().num_docs() }

    /// Record a `key=value` entry for the index metadata file.
    pub fn set_metadata(&self, key: &str, value: &str) {
        self.metadata.lock().insert(key.to_string(), value.to_string());
    }

    /// Persist everything added so far. Can be called repeatedly.
    pub fn commit(&self) -> Result<()> {
        let index = self.index.lock();
        for (tid, postings) in index.postings.iter() {
            save_postings_for_term(&self.paths, *tid, postings)?;
        }
        save_dictionary(&self.paths, &index.dictionary)?;
        save_docs(&self.paths, &index.docs)?;
        let mut metadata = self.metadata.lock();
        metadata.insert(KEY_ANALYZER.to_string(), self.analyzer.name().to_string());
        save_index_metadata(&self.paths, &metadata)?;
        let meta = MetaFile {
            num_docs: index.num_docs(),
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "".into()),
            version: FORMAT_VERSION,
            fields: index.fields.clone(),
        };
        save_meta(&self.paths, &meta)?;
        tracing::info!(path = %self.paths.root.display(), num_docs = meta.num_docs, num_terms = index.dictionary.num_terms(), "index committed");
        Ok(())
    }
}

impl DocumentSink for IndexWriter {
    fn add(&self, doc: IndexDocument) -> Result<()> {
        self.index.lock().add(&doc, &self.analyzer)?;
        Ok(())
    }

    fn analyzer(&self) -> &Analyzer { &self.analyzer }
}

fn open_error(paths: &IndexPaths, e: std::io::Error) -> Error {
    Error::IndexOpen { path: paths.root.clone(), detail: e.to_string() }
}

fn prepare_dir(paths: &IndexPaths) -> Result<()> {
    if paths.root.exists() && !paths.root.is_dir() {
        return Err(Error::IndexOpen { path: paths.root.clone(), detail: "not a directory".into() });
    }
    fs::create_dir_all(&paths.root).map_err(|e| open_error(paths, e))
}

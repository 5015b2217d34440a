use crate::error::{Error, Result};
use crate::{Dictionary, FieldStats, Posting, StoredDoc, TermId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;
pub const METADATA_FILE: &str = "index.metadata";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldStats>,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn dictionary(&self) -> PathBuf { self.root.join("dictionary.bin") }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn postings_dir(&self) -> PathBuf { self.root.join("postings") }
    pub fn metadata(&self) -> PathBuf { self.root.join(METADATA_FILE) }

    /// An index exists once its first commit has written `meta.json`.
    pub fn exists(&self) -> bool { self.meta().is_file() }
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = File::create(path)?;
    f.write_all(bytes)?;
    Ok(())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

pub fn save_dictionary(paths: &IndexPaths, dict: &Dictionary) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_bytes(&paths.dictionary(), &bincode::serialize(dict)?)
}

pub fn load_dictionary(paths: &IndexPaths) -> Result<Dictionary> {
    Ok(bincode::deserialize(&read_bytes(&paths.dictionary())?)?)
}

pub fn save_docs(paths: &IndexPaths, docs: &Vec<StoredDoc>) -> Result<()> {
    write_bytes(&paths.docs(), &bincode::serialize(docs)?)
}

pub fn load_docs(paths: &IndexPaths) -> Result<Vec<StoredDoc>> {
    Ok(bincode::deserialize(&read_bytes(&paths.docs())?)?)
}

pub fn save_postings_for_term(paths: &IndexPaths, term_id: TermId, postings: &Vec<Posting>) -> Result<()> {
    let dir = paths.postings_dir();
    create_dir_all(&dir)?;
    let file = dir.join(format!("{term_id:08}.postings.bin"));
    write_bytes(&file, &bincode::serialize(postings)?)
}

pub fn load_postings_for_term(paths: &IndexPaths, term_id: TermId) -> Result<Vec<Posting>> {
    let file = paths.postings_dir().join(format!("{term_id:08}.postings.bin"));
    Ok(bincode::deserialize(&read_bytes(&file)?)?)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let json = serde_json::to_string_pretty(meta)?;
    write_bytes(&paths.meta(), json.as_bytes())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    if meta.version != FORMAT_VERSION {
        return Err(Error::IndexOpen {
            path: paths.root.clone(),
            detail: format!("format version {} (expected {FORMAT_VERSION})", meta.version),
        });
    }
    Ok(meta)
}

/// Load only the header structures required to search: dictionary, docs, meta.
pub fn load_index_header(paths: &IndexPaths) -> Result<(Dictionary, Vec<StoredDoc>, MetaFile)> {
    if !paths.exists() {
        return Err(Error::IndexNotFound { path: paths.root.clone() });
    }
    let meta = load_meta(paths)?;
    let dict = load_dictionary(paths)?;
    let docs = load_docs(paths)?;
    Ok((dict, docs, meta))
}

/// Write the `key=value` metadata file consulted when searching.
pub fn save_index_metadata(paths: &IndexPaths, entries: &BTreeMap<String, String>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut text = String::new();
    for (k, v) in entries {
        text.push_str(&format!("{k}={v}\n"));
    }
    write_bytes(&paths.metadata(), text.as_bytes())
}

/// Read the `key=value` metadata file. A missing file yields an empty map.
pub fn load_index_metadata(paths: &IndexPaths) -> Result<BTreeMap<String, String>> {
    let text = match std::fs::read_to_string(paths.metadata()) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(parse_index_metadata(&text))
}

pub fn parse_index_metadata(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// Tokens longer than this are dropped, matching the usual standard tokenizer limit.
pub const MAX_TOKEN_LENGTH: usize = 255;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}][\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref ENGLISH_STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerKind {
    /// Unicode word tokens, lowercased; stopwords only when a list is supplied.
    Standard,
    /// Standard tokens, English stopwords, English snowball stemming.
    English,
    /// Standard tokens with English snowball stemming; stopwords only when a list is supplied.
    Snowball,
    /// Whitespace-delimited, lowercased tokens.
    Whitespace,
}

/// Closed set of analyzer identifiers accepted in configuration and index metadata.
pub const REGISTRY: &[(&str, AnalyzerKind)] = &[
    ("standard", AnalyzerKind::Standard),
    ("english", AnalyzerKind::English),
    ("snowball", AnalyzerKind::Snowball),
    ("whitespace", AnalyzerKind::Whitespace),
];

pub const DEFAULT_ANALYZER: &str = "standard";

/// Text normalization chain shared by indexing and query parsing.
#[derive(Debug, Clone)]
pub struct Analyzer {
    name: String,
    kind: AnalyzerKind,
    stopwords: HashSet<String>,
}

impl Analyzer {
    /// Look up `name` in the registry and build it, optionally with a stopword file
    /// replacing the analyzer's built-in list.
    pub fn from_registry(name: &str, stopwords: Option<&Path>) -> Result<Self> {
        let key = name.trim().to_ascii_lowercase();
        let kind = REGISTRY
            .iter()
            .find(|(id, _)| *id == key)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| Error::UnknownAnalyzer {
                name: name.to_string(),
                known: REGISTRY.iter().map(|(id, _)| *id).collect::<Vec<_>>().join(", "),
            })?;
        let stopwords = match stopwords {
            Some(path) => load_stopwords(path)?,
            None if kind == AnalyzerKind::English => {
                ENGLISH_STOPWORDS.iter().map(|w| w.to_string()).collect()
            }
            None => HashSet::new(),
        };
        Ok(Self { name: key, kind, stopwords })
    }

    pub fn standard() -> Self {
        Self { name: DEFAULT_ANALYZER.to_string(), kind: AnalyzerKind::Standard, stopwords: HashSet::new() }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn kind(&self) -> AnalyzerKind { self.kind }

    fn is_stopword(&self, token: &str) -> bool { self.stopwords.contains(token) }

    /// Tokenize text into (term, position). Positions count removed stopwords so
    /// phrase adjacency is preserved across gaps.
    pub fn analyze(&self, text: &str) -> Vec<(String, usize)> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let raw: Vec<&str> = match self.kind {
            AnalyzerKind::Whitespace => normalized.split_whitespace().collect(),
            AnalyzerKind::Standard | AnalyzerKind::English | AnalyzerKind::Snowball => word_tokens(&normalized).collect(),
        };
        let mut tokens = Vec::new();
        for (pos, token) in raw.into_iter().enumerate() {
            if token.chars().count() > MAX_TOKEN_LENGTH { continue; }
            if self.is_stopword(token) { continue; }
            let term = match self.kind {
                AnalyzerKind::English | AnalyzerKind::Snowball => STEMMER.stem(token).to_string(),
                _ => token.to_string(),
            };
            tokens.push((term, pos));
        }
        tokens
    }

    /// Terms only, positions dropped.
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|(t, _)| t).collect()
    }
}

/// Unicode word tokens of `text`, split the way the standard tokenizer does.
pub fn word_tokens(text: &str) -> impl Iterator<Item = &str> + '_ {
    RE.find_iter(text).map(|m| m.as_str())
}

/// Read a stopword list: one word per line, blank lines and `#` comments skipped.
pub fn load_stopwords(path: &Path) -> Result<HashSet<String>> {
    let text = fs::read_to_string(path)
        .map_err(|source| Error::Stopwords { path: path.to_path_buf(), source })?;
    Ok(text
        .lines()
        .map(|l| l.split('#').next().unwrap_or("").trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect())
}

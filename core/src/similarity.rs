//! Scoring functions applied per (query term, field, document).

/// Collection-level statistics of one field.
#[derive(Debug, Clone, Copy)]
pub struct CollectionStats {
    pub num_docs: u32,
    /// Documents that have the field.
    pub doc_count: u32,
    /// Total tokens in the field over all documents.
    pub total_terms: u64,
}

impl CollectionStats {
    pub fn avg_field_len(&self) -> f32 {
        if self.doc_count == 0 { 1.0 } else { self.total_terms as f32 / self.doc_count as f32 }
    }
}

/// Statistics of one term (or phrase) within a field.
#[derive(Debug, Clone, Copy)]
pub struct TermStatistics {
    pub doc_freq: u32,
    pub total_term_freq: u64,
}

pub trait Similarity: Send + Sync {
    /// Contribution of one matched term to a document's score.
    fn score(&self, tf: f32, field_len: f32, term: &TermStatistics, collection: &CollectionStats) -> f32;

    /// Multiplier for a document matching `overlap` of `max_overlap` query clauses.
    fn coord(&self, _overlap: usize, _max_overlap: usize) -> f32 { 1.0 }

    fn name(&self) -> &str;
}

/// Smoothed collection probability of a term.
fn collection_probability(term: &TermStatistics, collection: &CollectionStats) -> f32 {
    (term.total_term_freq as f32 + 1.0) / (collection.total_terms as f32 + 1.0)
}

/// Language model with Dirichlet prior smoothing.
pub struct DirichletSimilarity {
    pub mu: f32,
}

impl Similarity for DirichletSimilarity {
    fn score(&self, tf: f32, field_len: f32, term: &TermStatistics, collection: &CollectionStats) -> f32 {
        let p = collection_probability(term, collection);
        let score = (1.0 + tf / (self.mu * p)).ln() + (self.mu / (field_len + self.mu)).ln();
        // documents longer than the prior can push the sum negative
        score.max(0.0)
    }

    fn name(&self) -> &str { "dirichlet" }
}

/// Language model with linear (Jelinek-Mercer) interpolation.
pub struct JelinekMercerSimilarity {
    pub lambda: f32,
}

impl Similarity for JelinekMercerSimilarity {
    fn score(&self, tf: f32, field_len: f32, term: &TermStatistics, collection: &CollectionStats) -> f32 {
        let p = collection_probability(term, collection);
        let doc_model = (1.0 - self.lambda) * tf / field_len.max(1.0);
        (1.0 + doc_model / (self.lambda * p)).ln()
    }

    fn name(&self) -> &str { "jelinek-mercer" }
}

/// Okapi BM25.
pub struct Bm25Similarity {
    pub k1: f32, // Term frequency saturation
    pub b: f32,  // Length normalization strength
}

impl Bm25Similarity {
    fn idf(doc_freq: u32, num_docs: u32) -> f32 {
        let df = doc_freq as f32;
        (1.0 + (num_docs as f32 - df + 0.5) / (df + 0.5)).ln()
    }
}

impl Similarity for Bm25Similarity {
    fn score(&self, tf: f32, field_len: f32, term: &TermStatistics, collection: &CollectionStats) -> f32 {
        let idf = Self::idf(term.doc_freq, collection.num_docs);
        let norm = 1.0 - self.b + self.b * (field_len / collection.avg_field_len());
        idf * tf * (self.k1 + 1.0) / (tf + self.k1 * norm)
    }

    fn name(&self) -> &str { "bm25" }
}

/// Classic vector-space TF-IDF with length normalization and coordination.
pub struct TfIdfSimilarity;

impl TfIdfSimilarity {
    fn idf(doc_freq: u32, num_docs: u32) -> f32 {
        1.0 + (num_docs as f32 / (doc_freq as f32 + 1.0)).ln()
    }
}

impl Similarity for TfIdfSimilarity {
    fn score(&self, tf: f32, field_len: f32, term: &TermStatistics, collection: &CollectionStats) -> f32 {
        let idf = Self::idf(term.doc_freq, collection.num_docs);
        tf.sqrt() * idf * idf / field_len.max(1.0).sqrt()
    }

    fn coord(&self, overlap: usize, max_overlap: usize) -> f32 {
        if max_overlap == 0 { 1.0 } else { overlap as f32 / max_overlap as f32 }
    }

    fn name(&self) -> &str { "tfidf" }
}

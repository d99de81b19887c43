//! Ranking functions over index-resident statistics.
//!
//! Every model scores a document against the distinct terms of a query. Scores are only
//! comparable within one model.
//!
//! References:
//! - Robertson & Zaragoza (2009). "The Probabilistic Relevance Framework: BM25 and Beyond."
//! - Zhai & Lafferty (2004). "A study of smoothing methods for language models applied to IR."

use crate::error::Error;
use crate::index::{term_frequency_in, DocId, InvertedIndex, Posting};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Weight of the collection model in Jelinek-Mercer smoothing.
pub const JELINEK_MERCER_LAMBDA: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Length normalization.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Model names as they appear in configuration.
///
/// Parsing ignores case and punctuation, so `BM25`, `Jelinek-Mercer` and `classic_tfidf` are all
/// accepted, from the command line and from JSON alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum ModelKind {
    #[default]
    Bm25,
    Boolean,
    JelinekMercer,
    ClassicTfidf,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Bm25 => "bm25",
            ModelKind::Boolean => "boolean",
            ModelKind::JelinekMercer => "jelinek-mercer",
            ModelKind::ClassicTfidf => "classic-tfidf",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "bm25" | "default" => Ok(ModelKind::Bm25),
            "boolean" | "bool" => Ok(ModelKind::Boolean),
            "jelinekmercer" | "jm" | "lm" => Ok(ModelKind::JelinekMercer),
            "classictfidf" | "tfidf" | "classic" => Ok(ModelKind::ClassicTfidf),
            _ => Err(Error::Configuration(format!("unknown scoring model {s:?}"))),
        }
    }
}

impl TryFrom<String> for ModelKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ModelKind> for String {
    fn from(kind: ModelKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoringModel {
    /// Okapi BM25 with Lucene's non-negative IDF.
    Bm25(Bm25Params),
    /// Number of distinct query terms the document contains.
    Boolean,
    /// Query likelihood with Jelinek-Mercer smoothing; `lambda` weights the collection model.
    JelinekMercer { lambda: f32 },
    /// `sqrt(tf) * idf^2 / sqrt(doc_len)` with `idf = 1 + ln(N / (df + 1))`.
    ClassicTfidf,
}

impl Default for ScoringModel {
    fn default() -> Self {
        ScoringModel::Bm25(Bm25Params::default())
    }
}

impl ScoringModel {
    pub fn jelinek_mercer() -> Self {
        ScoringModel::JelinekMercer { lambda: JELINEK_MERCER_LAMBDA }
    }

    pub fn from_kind(kind: ModelKind, bm25: Bm25Params) -> Self {
        match kind {
            ModelKind::Bm25 => ScoringModel::Bm25(bm25),
            ModelKind::Boolean => ScoringModel::Boolean,
            ModelKind::JelinekMercer => ScoringModel::jelinek_mercer(),
            ModelKind::ClassicTfidf => ScoringModel::ClassicTfidf,
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ScoringModel::Bm25(_) => ModelKind::Bm25,
            ScoringModel::Boolean => ModelKind::Boolean,
            ScoringModel::JelinekMercer { .. } => ModelKind::JelinekMercer,
            ScoringModel::ClassicTfidf => ModelKind::ClassicTfidf,
        }
    }
}

/// A distinct query term that exists in the index.
#[derive(Debug, Clone)]
pub struct QueryTerm<'a> {
    /// How often the term occurred in the raw query.
    pub query_count: u32,
    pub postings: &'a [Posting],
    pub collection_frequency: u64,
}

/// Read-only view of index statistics plus the selected model, shared by every document scored
/// for one query.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    index: &'a InvertedIndex,
    model: ScoringModel,
    num_docs: f32,
    avg_doc_len: f32,
    total_terms: f32,
}

impl<'a> ScoringContext<'a> {
    pub fn new(index: &'a InvertedIndex, model: ScoringModel) -> Self {
        Self {
            index,
            model,
            num_docs: index.document_count() as f32,
            avg_doc_len: index.average_document_length(),
            total_terms: index.total_terms() as f32,
        }
    }

    /// Looks `term` up; `None` when the index has never seen it.
    pub fn resolve(&self, term: &str, query_count: u32) -> Option<QueryTerm<'a>> {
        let index: &'a InvertedIndex = self.index;
        let term_id = index.term_id(term)?;
        Some(QueryTerm {
            query_count,
            postings: index.postings_by_id(term_id),
            collection_frequency: index.collection_frequency(term),
        })
    }

    pub fn score(&self, terms: &[QueryTerm<'_>], doc_id: DocId) -> f32 {
        let doc_len = self.index.document_length(doc_id) as f32;
        match self.model {
            ScoringModel::Bm25(params) => terms
                .iter()
                .map(|t| t.query_count as f32 * self.bm25(t, doc_id, doc_len, params))
                .sum(),
            ScoringModel::Boolean => {
                terms.iter().filter(|t| term_frequency_in(t.postings, doc_id) > 0).count() as f32
            }
            ScoringModel::JelinekMercer { lambda } => {
                terms.iter().map(|t| self.jelinek_mercer(t, doc_id, doc_len, lambda)).sum()
            }
            ScoringModel::ClassicTfidf => terms
                .iter()
                .map(|t| t.query_count as f32 * self.classic_tfidf(t, doc_id, doc_len))
                .sum(),
        }
    }

    fn bm25(&self, term: &QueryTerm<'_>, doc_id: DocId, doc_len: f32, params: Bm25Params) -> f32 {
        let tf = term_frequency_in(term.postings, doc_id) as f32;
        if tf == 0.0 {
            return 0.0;
        }
        let df = term.postings.len() as f32;
        let idf = (1.0 + (self.num_docs - df + 0.5) / (df + 0.5)).ln();
        let length_ratio = if self.avg_doc_len > 0.0 { doc_len / self.avg_doc_len } else { 1.0 };
        let norm = params.k1 * (1.0 - params.b + params.b * length_ratio);
        idf * tf * (params.k1 + 1.0) / (tf + norm)
    }

    /// Absent terms still contribute their smoothed background probability.
    fn jelinek_mercer(
        &self,
        term: &QueryTerm<'_>,
        doc_id: DocId,
        doc_len: f32,
        lambda: f32,
    ) -> f32 {
        let tf = term_frequency_in(term.postings, doc_id) as f32;
        let p_doc = if doc_len > 0.0 { tf / doc_len } else { 0.0 };
        let p_collection = if self.total_terms > 0.0 {
            term.collection_frequency as f32 / self.total_terms
        } else {
            0.0
        };
        let p = (1.0 - lambda) * p_doc + lambda * p_collection;
        if p > 0.0 {
            p.ln()
        } else {
            0.0
        }
    }

    fn classic_tfidf(&self, term: &QueryTerm<'_>, doc_id: DocId, doc_len: f32) -> f32 {
        let tf = term_frequency_in(term.postings, doc_id) as f32;
        if tf == 0.0 {
            return 0.0;
        }
        let df = term.postings.len() as f32;
        let idf = 1.0 + (self.num_docs / (df + 1.0)).ln();
        let field_norm = 1.0 / doc_len.max(1.0).sqrt();
        tf.sqrt() * idf * idf * field_norm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build;
    use crate::parser::ParsedDocument;
    use crate::tokenizer::Normalizer;

    // d0 = "a x x y" (len 4), d1 = "b y z" (len 3)
    fn index() -> InvertedIndex {
        let docs = vec![
            ParsedDocument { title: "A".into(), categories: String::new(), body: "x x y".into() },
            ParsedDocument { title: "B".into(), categories: String::new(), body: "y z".into() },
        ];
        build(&docs, &Normalizer::verbatim())
    }

    fn terms<'a>(ctx: &ScoringContext<'a>, words: &[&str]) -> Vec<QueryTerm<'a>> {
        words.iter().filter_map(|w| ctx.resolve(w, 1)).collect()
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn boolean_counts_distinct_matches() {
        let ix = index();
        let ctx = ScoringContext::new(&ix, ScoringModel::Boolean);
        let q = terms(&ctx, &["x", "y"]);
        assert_eq!(ctx.score(&q, 0), 2.0);
        assert_eq!(ctx.score(&q, 1), 1.0);
    }

    #[test]
    fn bm25_matches_closed_form() {
        let ix = index();
        let params = Bm25Params::default();
        let ctx = ScoringContext::new(&ix, ScoringModel::Bm25(params));
        let q = terms(&ctx, &["x"]);
        let idf = (1.0f32 + (2.0 - 1.0 + 0.5) / (1.0 + 0.5)).ln();
        let norm = 1.2 * (1.0 - 0.75 + 0.75 * (4.0 / 3.5));
        let expected = idf * 2.0 * 2.2 / (2.0 + norm);
        assert!(close(ctx.score(&q, 0), expected));
        assert_eq!(ctx.score(&q, 1), 0.0);
    }

    #[test]
    fn bm25_repeated_query_terms_weigh_more() {
        let ix = index();
        let ctx = ScoringContext::new(&ix, ScoringModel::default());
        let once = vec![ctx.resolve("y", 1).unwrap()];
        let twice = vec![ctx.resolve("y", 2).unwrap()];
        assert!(close(ctx.score(&twice, 0), 2.0 * ctx.score(&once, 0)));
    }

    #[test]
    fn jelinek_mercer_includes_background_for_absent_terms() {
        let ix = index();
        let ctx = ScoringContext::new(&ix, ScoringModel::jelinek_mercer());
        let q = terms(&ctx, &["x", "z"]);
        let expected = (0.5f32 * 0.5 + 0.5 * 2.0 / 7.0).ln() + (0.5f32 * 1.0 / 7.0).ln();
        assert!(close(ctx.score(&q, 0), expected));
    }

    #[test]
    fn classic_tfidf_matches_closed_form() {
        let ix = index();
        let ctx = ScoringContext::new(&ix, ScoringModel::ClassicTfidf);
        let q = terms(&ctx, &["x"]);
        // idf = 1 + ln(2 / 2) = 1
        assert!(close(ctx.score(&q, 0), 2.0f32.sqrt() / 2.0));
    }

    #[test]
    fn unknown_terms_do_not_resolve() {
        let ix = index();
        let ctx = ScoringContext::new(&ix, ScoringModel::Boolean);
        assert!(ctx.resolve("nowhere", 1).is_none());
    }

    #[test]
    fn parses_model_names() {
        assert_eq!("BM25".parse::<ModelKind>().unwrap(), ModelKind::Bm25);
        assert_eq!("JelinekMercer".parse::<ModelKind>().unwrap(), ModelKind::JelinekMercer);
        assert_eq!("jelinek-mercer".parse::<ModelKind>().unwrap(), ModelKind::JelinekMercer);
        assert_eq!("ClassicTFIDF".parse::<ModelKind>().unwrap(), ModelKind::ClassicTfidf);
        assert!("pagerank".parse::<ModelKind>().is_err());
    }
}

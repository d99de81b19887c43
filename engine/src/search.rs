use crate::error::Error;
use crate::index::{DocId, InvertedIndex};
use crate::scoring::{QueryTerm, ScoringContext, ScoringModel};
use crate::tokenizer::{Normalizer, PLACEHOLDER_TERM};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub doc_id: DocId,
    pub title: String,
    pub categories: String,
    pub score: f32,
}

/// Ranks the documents that contain at least one query term.
///
/// Results are ordered by score descending, then doc id ascending, and cut to `top_k`. Repeated
/// query words collapse into one term that remembers its count. A query with no known terms
/// returns an empty list.
pub fn query(
    raw: &str,
    normalizer: &Normalizer,
    index: &InvertedIndex,
    model: ScoringModel,
    top_k: usize,
) -> Result<Vec<RankedResult>, Error> {
    index.check_normalizer(normalizer)?;

    // Sorted so per-document sums are accumulated in the same order on every run.
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for term in normalizer.normalize(raw)? {
        if term != PLACEHOLDER_TERM {
            *counts.entry(term).or_insert(0) += 1;
        }
    }
    if counts.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let ctx = ScoringContext::new(index, model);
    let terms: Vec<QueryTerm<'_>> =
        counts.iter().filter_map(|(term, &count)| ctx.resolve(term, count)).collect();
    let candidates: BTreeSet<DocId> =
        terms.iter().flat_map(|t| t.postings.iter().map(|p| p.doc_id)).collect();

    let mut scored: Vec<(DocId, f32)> = candidates
        .into_iter()
        .map(|doc_id| (doc_id, ctx.score(&terms, doc_id)))
        .filter(|(_, score)| score.is_finite())
        .collect();
    scored.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    scored.truncate(top_k);

    Ok(scored
        .into_iter()
        .filter_map(|(doc_id, score)| {
            index.doc(doc_id).map(|meta| RankedResult {
                doc_id,
                title: meta.title.clone(),
                categories: meta.categories.clone(),
                score,
            })
        })
        .collect())
}

/// One read-only index snapshot paired with the normalizer and model used to query it.
///
/// Cheap to clone and safe to share across threads.
#[derive(Debug, Clone)]
pub struct Searcher {
    index: Arc<InvertedIndex>,
    normalizer: Normalizer,
    model: ScoringModel,
    top_k: usize,
}

impl Searcher {
    pub fn new(
        index: Arc<InvertedIndex>,
        normalizer: Normalizer,
        model: ScoringModel,
        top_k: usize,
    ) -> Result<Self, Error> {
        index.check_normalizer(&normalizer)?;
        if top_k == 0 {
            return Err(Error::Configuration("top_k must be at least 1".into()));
        }
        Ok(Self { index, normalizer, model, top_k })
    }

    pub fn search(&self, raw: &str) -> Result<Vec<RankedResult>, Error> {
        query(raw, &self.normalizer, &self.index, self.model, self.top_k)
    }

    pub fn model(&self) -> ScoringModel {
        self.model
    }
}

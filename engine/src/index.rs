use crate::error::Error;
use crate::parser::ParsedDocument;
use crate::tokenizer::{NormalizationMode, Normalizer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type TermId = u32;
pub type DocId = u32;

/// Stored, retrievable attributes of an indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    /// Exact title, not tokenized.
    pub title: String,
    /// Normalized categories, space-joined.
    pub categories: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_frequency: u32,
}

/// Term → postings plus the corpus statistics the scoring models need.
///
/// Built once by [`IndexBuilder`] and read-only afterwards, so a shared reference can serve any
/// number of concurrent queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub(crate) mode: NormalizationMode,
    pub(crate) dictionary: HashMap<String, TermId>,
    /// Indexed by term id; each list is ascending by doc id.
    pub(crate) postings: Vec<Vec<Posting>>,
    /// Total occurrences of each term across the corpus, by term id.
    pub(crate) collection_frequency: Vec<u64>,
    /// Indexed by doc id.
    pub(crate) docs: Vec<DocMeta>,
    pub(crate) doc_lengths: Vec<u32>,
    pub(crate) total_terms: u64,
    /// Lemma list the documents were normalized with, for lemmatized generations.
    pub(crate) lemma_fingerprint: Option<String>,
}

impl InvertedIndex {
    pub fn mode(&self) -> NormalizationMode {
        self.mode
    }

    pub fn lemma_fingerprint(&self) -> Option<&str> {
        self.lemma_fingerprint.as_deref()
    }

    /// Queries must be normalized exactly like the documents were: same mode, same lemma list.
    pub fn check_normalizer(&self, normalizer: &Normalizer) -> Result<(), Error> {
        if normalizer.mode() != self.mode {
            return Err(Error::Configuration(format!(
                "index was built with {} normalization but {} was requested",
                self.mode,
                normalizer.mode()
            )));
        }
        if normalizer.lemma_fingerprint() != self.lemma_fingerprint() {
            return Err(Error::Configuration(format!(
                "index was built with lemma table {} but {} was requested; rebuild the index",
                self.lemma_fingerprint().unwrap_or("<none>"),
                normalizer.lemma_fingerprint().unwrap_or("<none>")
            )));
        }
        Ok(())
    }

    pub fn document_count(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn num_terms(&self) -> usize {
        self.postings.len()
    }

    /// Sum of all document lengths.
    pub fn total_terms(&self) -> u64 {
        self.total_terms
    }

    /// Token count of the document's indexed text; 0 for unknown ids.
    pub fn document_length(&self, doc_id: DocId) -> u32 {
        self.doc_lengths.get(doc_id as usize).copied().unwrap_or(0)
    }

    pub fn average_document_length(&self) -> f32 {
        if self.docs.is_empty() {
            return 0.0;
        }
        (self.total_terms as f64 / self.docs.len() as f64) as f32
    }

    pub fn doc(&self, doc_id: DocId) -> Option<&DocMeta> {
        self.docs.get(doc_id as usize)
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.dictionary.get(term).copied()
    }

    /// Postings for `term`, empty if the term is unknown.
    pub fn postings(&self, term: &str) -> &[Posting] {
        self.term_id(term).map(|tid| self.postings_by_id(tid)).unwrap_or(&[])
    }

    pub fn postings_by_id(&self, term_id: TermId) -> &[Posting] {
        self.postings.get(term_id as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.postings(term).len() as u32
    }

    pub fn collection_frequency(&self, term: &str) -> u64 {
        self.term_id(term)
            .and_then(|tid| self.collection_frequency.get(tid as usize).copied())
            .unwrap_or(0)
    }

    pub fn term_frequency(&self, term: &str, doc_id: DocId) -> u32 {
        term_frequency_in(self.postings(term), doc_id)
    }

    /// Checks the structural invariants a queryable index must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.docs.len();
        if self.doc_lengths.len() != n {
            return Err(format!("{} document lengths for {n} documents", self.doc_lengths.len()));
        }
        if self.collection_frequency.len() != self.postings.len() {
            return Err("collection frequencies do not match postings".into());
        }
        if self.dictionary.len() != self.postings.len() {
            return Err("dictionary does not match postings".into());
        }
        if self.doc_lengths.iter().map(|&l| l as u64).sum::<u64>() != self.total_terms {
            return Err("document lengths do not add up to total terms".into());
        }
        for (term, &tid) in &self.dictionary {
            let list = self
                .postings
                .get(tid as usize)
                .ok_or_else(|| format!("term {term:?} points past the postings table"))?;
            if list.len() > n {
                return Err(format!("term {term:?} has document frequency above document count"));
            }
            if !list.windows(2).all(|w| w[0].doc_id < w[1].doc_id) {
                return Err(format!("postings of {term:?} are not strictly ascending by doc id"));
            }
            if list.iter().any(|p| p.doc_id as usize >= n || p.term_frequency == 0) {
                return Err(format!("postings of {term:?} reference an invalid document"));
            }
            let occurrences: u64 = list.iter().map(|p| p.term_frequency as u64).sum();
            if occurrences != self.collection_frequency[tid as usize] {
                return Err(format!("collection frequency of {term:?} disagrees with its postings"));
            }
        }
        Ok(())
    }
}

/// Term frequency of `doc_id` within an ascending postings list.
pub fn term_frequency_in(postings: &[Posting], doc_id: DocId) -> u32 {
    postings
        .binary_search_by_key(&doc_id, |p| p.doc_id)
        .map(|i| postings[i].term_frequency)
        .unwrap_or(0)
}

/// Single-writer, append-only index construction.
pub struct IndexBuilder<'a> {
    normalizer: &'a Normalizer,
    dictionary: HashMap<String, TermId>,
    postings: Vec<Vec<Posting>>,
    collection_frequency: Vec<u64>,
    docs: Vec<DocMeta>,
    doc_lengths: Vec<u32>,
    total_terms: u64,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(normalizer: &'a Normalizer) -> Self {
        Self {
            normalizer,
            dictionary: HashMap::new(),
            postings: Vec::new(),
            collection_frequency: Vec::new(),
            docs: Vec::new(),
            doc_lengths: Vec::new(),
            total_terms: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Normalizes and indexes one document, returning its doc id.
    ///
    /// Normalization happens before anything is recorded, so a failure leaves the builder
    /// unchanged and doc ids stay dense.
    pub fn add(&mut self, doc: &ParsedDocument) -> Result<DocId, Error> {
        let categories = self.normalizer.normalize(&doc.categories)?;
        let text = format!("{} {} {}", doc.title, doc.categories, doc.body);
        let terms = self.normalizer.normalize(&text)?;

        let doc_id = self.docs.len() as DocId;
        let mut tf_counts: HashMap<TermId, u32> = HashMap::new();
        for term in terms.iter() {
            let next_id = self.postings.len() as TermId;
            let tid = *self.dictionary.entry(term.clone()).or_insert(next_id);
            if tid == next_id {
                self.postings.push(Vec::new());
                self.collection_frequency.push(0);
            }
            *tf_counts.entry(tid).or_insert(0) += 1;
            self.collection_frequency[tid as usize] += 1;
        }
        for (tid, term_frequency) in tf_counts {
            self.postings[tid as usize].push(Posting { doc_id, term_frequency });
        }

        self.doc_lengths.push(terms.len() as u32);
        self.total_terms += terms.len() as u64;
        self.docs.push(DocMeta { title: doc.title.clone(), categories: categories.join(" ") });
        Ok(doc_id)
    }

    /// Sorts every postings list so the index is queryable.
    pub fn finish(mut self) -> InvertedIndex {
        for list in self.postings.iter_mut() {
            list.sort_unstable_by_key(|p| p.doc_id);
        }
        tracing::debug!(num_docs = self.docs.len(), num_terms = self.postings.len(), "index built");
        InvertedIndex {
            mode: self.normalizer.mode(),
            dictionary: self.dictionary,
            postings: self.postings,
            collection_frequency: self.collection_frequency,
            docs: self.docs,
            doc_lengths: self.doc_lengths,
            total_terms: self.total_terms,
            lemma_fingerprint: self.normalizer.lemma_fingerprint().map(str::to_string),
        }
    }
}

/// Builds an in-memory index from already parsed documents, skipping (and logging) documents
/// whose normalization fails.
pub fn build(documents: &[ParsedDocument], normalizer: &Normalizer) -> InvertedIndex {
    let mut builder = IndexBuilder::new(normalizer);
    for doc in documents {
        if let Err(e) = builder.add(doc) {
            tracing::warn!(title = %doc.title, error = %e, "skipping document");
        }
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lemma::LemmaTable;
    use std::sync::Arc;

    fn doc(title: &str, categories: &str, body: &str) -> ParsedDocument {
        ParsedDocument { title: title.into(), categories: categories.into(), body: body.into() }
    }

    #[test]
    fn records_statistics() {
        let normalizer = Normalizer::verbatim();
        let docs = [
            doc("Paris", "capital city", "Paris is the capital of France"),
            doc("Lyon", "", "a city"),
        ];
        let index = build(&docs, &normalizer);
        assert_eq!(index.document_count(), 2);
        // "paris capital city paris is the capital of france"
        assert_eq!(index.document_length(0), 9);
        // "lyon a city"
        assert_eq!(index.document_length(1), 3);
        assert_eq!(index.average_document_length(), 6.0);
        assert_eq!(index.term_frequency("paris", 0), 2);
        assert_eq!(index.document_frequency("city"), 2);
        assert_eq!(index.collection_frequency("capital"), 2);
        assert_eq!(index.doc(0).unwrap().categories, "capital city");
        assert_eq!(index.doc(1).unwrap().categories, ".");
        assert!(index.validate().is_ok());
    }

    #[test]
    fn postings_are_ascending_without_duplicates() {
        let normalizer = Normalizer::verbatim();
        let docs: Vec<ParsedDocument> =
            (0..20).map(|i| doc(&format!("T{i}"), "shared", &format!("word word u{i}"))).collect();
        let index = build(&docs, &normalizer);
        let list = index.postings("word");
        assert_eq!(list.len(), 20);
        assert!(list.windows(2).all(|w| w[0].doc_id < w[1].doc_id));
        assert!(list.iter().all(|p| p.term_frequency == 2));
    }

    #[test]
    fn failed_normalization_keeps_doc_ids_dense() {
        let failing = |w: &str| -> anyhow::Result<String> {
            if w == "boom" {
                anyhow::bail!("no root for {w}")
            }
            Ok(w.to_string())
        };
        let normalizer = Normalizer::lemmatized(Arc::new(failing));
        let docs = [doc("A", "", "fine"), doc("B", "", "boom"), doc("C", "", "fine")];
        let index = build(&docs, &normalizer);
        assert_eq!(index.document_count(), 2);
        assert_eq!(index.doc(1).unwrap().title, "C");
        assert!(index.validate().is_ok());
    }

    #[test]
    fn validate_detects_unsorted_postings() {
        let normalizer = Normalizer::verbatim();
        let mut index = build(&[doc("A", "", "x"), doc("B", "", "x")], &normalizer);
        let tid = index.term_id("x").unwrap() as usize;
        index.postings[tid].reverse();
        assert!(index.validate().is_err());
    }

    #[test]
    fn another_lemma_table_cannot_query_the_index() {
        let built_with = LemmaTable::parse("went\tgo\n").unwrap();
        let other = LemmaTable::parse("went\twend\n").unwrap();
        let normalizer = Normalizer::lemmatized(Arc::new(built_with));
        let index = build(&[doc("A", "", "went home")], &normalizer);
        assert!(index.lemma_fingerprint().is_some());

        let same = Normalizer::lemmatized(Arc::new(LemmaTable::parse("went\tgo\n").unwrap()));
        assert!(index.check_normalizer(&same).is_ok());
        let err = index.check_normalizer(&Normalizer::lemmatized(Arc::new(other))).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        let err = index.check_normalizer(&Normalizer::verbatim()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}

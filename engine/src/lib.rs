//! Clue-answering retrieval engine: parses wiki-style corpus records, builds an inverted index per
//! normalization mode, ranks documents with BM25, Boolean, Jelinek-Mercer or classic TF-IDF
//! scoring, and measures precision@1 and MRR over labeled questions.

pub mod config;
pub mod corpus;
pub mod error;
pub mod eval;
pub mod index;
pub mod lemma;
pub mod parser;
pub mod persist;
pub mod scoring;
pub mod search;
pub mod tokenizer;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use eval::{evaluate, EvaluationReport, QueryRecord, QuestionSet};
pub use index::{DocId, DocMeta, InvertedIndex, Posting, TermId};
pub use lemma::{LemmaTable, Lemmatizer};
pub use parser::ParsedDocument;
pub use scoring::{Bm25Params, ModelKind, ScoringModel};
pub use search::{query, RankedResult, Searcher};
pub use tokenizer::{NormalizationMode, Normalizer};

use crate::error::Error;
use crate::lemma::{LemmaTable, Lemmatizer};
use crate::persist::IndexPaths;
use crate::scoring::{Bm25Params, ModelKind, ScoringModel};
use crate::search::DEFAULT_TOP_K;
use crate::tokenizer::{NormalizationMode, Normalizer};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Engine settings, loadable from a JSON file. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub normalization_mode: NormalizationMode,
    pub scoring_model: ModelKind,
    pub top_k: usize,
    pub bm25: Bm25Params,
    pub index_path: PathBuf,
    pub corpus_path: PathBuf,
    pub questions_path: PathBuf,
    /// `word<TAB>lemma` file backing lemmatized mode.
    pub lemma_table: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            normalization_mode: NormalizationMode::default(),
            scoring_model: ModelKind::default(),
            top_k: DEFAULT_TOP_K,
            bm25: Bm25Params::default(),
            index_path: PathBuf::from("./index"),
            corpus_path: PathBuf::from("./data/corpus"),
            questions_path: PathBuf::from("./data/questions.txt"),
            lemma_table: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|e| Error::unavailable(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.top_k == 0 {
            return Err(Error::Configuration("top_k must be at least 1".into()));
        }
        if self.normalization_mode == NormalizationMode::Lemmatized && self.lemma_table.is_none() {
            return Err(Error::Configuration("lemmatized mode requires lemma_table".into()));
        }
        let Bm25Params { k1, b } = self.bm25;
        if !k1.is_finite() || k1 < 0.0 || !b.is_finite() || !(0.0..=1.0).contains(&b) {
            return Err(Error::Configuration(format!("invalid BM25 parameters k1={k1} b={b}")));
        }
        Ok(())
    }

    pub fn scoring_model(&self) -> ScoringModel {
        ScoringModel::from_kind(self.scoring_model, self.bm25)
    }

    pub fn index_paths(&self) -> IndexPaths {
        IndexPaths::new(&self.index_path, self.normalization_mode)
    }

    /// Builds the normalizer for the configured mode, loading the lemma table when needed.
    pub fn normalizer(&self) -> Result<Normalizer, Error> {
        let lemmatizer: Option<Arc<dyn Lemmatizer>> =
            match (self.normalization_mode, &self.lemma_table) {
                (NormalizationMode::Lemmatized, Some(path)) => {
                    Some(Arc::new(LemmaTable::load(path)?))
                }
                _ => None,
            };
        Normalizer::new(self.normalization_mode, lemmatizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{
            "normalization_mode": "stemmed",
            "scoring_model": "JelinekMercer",
            "bm25": {"k1": 2.0}
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.normalization_mode, NormalizationMode::Stemmed);
        assert_eq!(config.scoring_model, ModelKind::JelinekMercer);
        assert_eq!(config.top_k, 10);
        assert_eq!(config.bm25, Bm25Params { k1: 2.0, b: 0.75 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unusable_settings() {
        let config = EngineConfig { top_k: 0, ..EngineConfig::default() };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            normalization_mode: NormalizationMode::Lemmatized,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate().unwrap_err(), Error::Configuration(_)));

        let config =
            EngineConfig { bm25: Bm25Params { k1: 1.2, b: 1.5 }, ..EngineConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn index_paths_are_per_mode() {
        let config = EngineConfig {
            normalization_mode: NormalizationMode::Stemmed,
            ..EngineConfig::default()
        };
        assert_eq!(config.index_paths().generation(), PathBuf::from("./index/stemmed"));
    }

    #[test]
    fn names_in_json_ignore_case_like_the_command_line() {
        let parse = |json: &str| serde_json::from_str::<EngineConfig>(json);
        for (name, kind) in [
            ("Bm25", ModelKind::Bm25),
            ("BOOLEAN", ModelKind::Boolean),
            ("jelinekmercer", ModelKind::JelinekMercer),
            ("TFIDF", ModelKind::ClassicTfidf),
            ("classic_tfidf", ModelKind::ClassicTfidf),
        ] {
            let config = parse(&format!(r#"{{"scoring_model": "{name}"}}"#)).unwrap();
            assert_eq!(config.scoring_model, kind, "{name}");
            assert_eq!(name.parse::<ModelKind>().unwrap(), kind);
        }
        let config = parse(r#"{"normalization_mode": "Stemmed"}"#).unwrap();
        assert_eq!(config.normalization_mode, NormalizationMode::Stemmed);
        let config = parse(r#"{"normalization_mode": "LEMMA"}"#).unwrap();
        assert_eq!(config.normalization_mode, NormalizationMode::Lemmatized);

        assert!(parse(r#"{"scoring_model": "pagerank"}"#).is_err());
        assert!(parse(r#"{"normalization_mode": "soundex"}"#).is_err());
    }

    #[test]
    fn names_serialize_in_canonical_form() {
        let model = serde_json::to_string(&ModelKind::JelinekMercer).unwrap();
        assert_eq!(model, r#""jelinek-mercer""#);
        let mode = serde_json::to_string(&NormalizationMode::Stemmed).unwrap();
        assert_eq!(mode, r#""stemmed""#);
    }
}

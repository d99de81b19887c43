use crate::error::Error;
use crate::lemma::Lemmatizer;
use lazy_static::lazy_static;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Stands in for an empty field so every document contributes at least one token.
pub const PLACEHOLDER_TERM: &str = ".";

/// How raw words become index terms. An index generation is built under exactly one mode and must
/// be queried under the same one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum NormalizationMode {
    #[default]
    Verbatim,
    Stemmed,
    Lemmatized,
}

impl NormalizationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            NormalizationMode::Verbatim => "verbatim",
            NormalizationMode::Stemmed => "stemmed",
            NormalizationMode::Lemmatized => "lemmatized",
        }
    }
}

impl fmt::Display for NormalizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verbatim" | "none" => Ok(NormalizationMode::Verbatim),
            "stemmed" | "stem" => Ok(NormalizationMode::Stemmed),
            "lemmatized" | "lemma" => Ok(NormalizationMode::Lemmatized),
            other => Err(Error::Configuration(format!("unknown normalization mode {other:?}"))),
        }
    }
}

impl TryFrom<String> for NormalizationMode {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NormalizationMode> for String {
    fn from(mode: NormalizationMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Tokenize text using NFKC normalization, lowercasing and whitespace splitting. Punctuation is
/// trimmed from both ends of each token; tokens left empty are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    normalized
        .split_whitespace()
        .map(|raw| raw.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn stem(token: &str) -> String {
    STEMMER.stem(token).into_owned()
}

/// Maps text to index terms under one [`NormalizationMode`].
#[derive(Clone)]
pub struct Normalizer {
    mode: NormalizationMode,
    lemmatizer: Option<Arc<dyn Lemmatizer>>,
    lemma_fingerprint: Option<String>,
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer")
            .field("mode", &self.mode)
            .field("lemmatizer", &self.lemmatizer.is_some())
            .field("lemma_fingerprint", &self.lemma_fingerprint)
            .finish()
    }
}

impl Normalizer {
    pub fn verbatim() -> Self {
        Self { mode: NormalizationMode::Verbatim, lemmatizer: None, lemma_fingerprint: None }
    }

    pub fn stemmed() -> Self {
        Self { mode: NormalizationMode::Stemmed, lemmatizer: None, lemma_fingerprint: None }
    }

    pub fn lemmatized(lemmatizer: Arc<dyn Lemmatizer>) -> Self {
        let lemma_fingerprint = lemmatizer.fingerprint();
        Self {
            mode: NormalizationMode::Lemmatized,
            lemmatizer: Some(lemmatizer),
            lemma_fingerprint,
        }
    }

    /// Builds a normalizer for `mode`; lemmatized mode needs a lemmatizer.
    pub fn new(
        mode: NormalizationMode,
        lemmatizer: Option<Arc<dyn Lemmatizer>>,
    ) -> Result<Self, Error> {
        match (mode, lemmatizer) {
            (NormalizationMode::Verbatim, _) => Ok(Self::verbatim()),
            (NormalizationMode::Stemmed, _) => Ok(Self::stemmed()),
            (NormalizationMode::Lemmatized, Some(l)) => Ok(Self::lemmatized(l)),
            (NormalizationMode::Lemmatized, None) => {
                Err(Error::Configuration("lemmatized mode requires a lemmatizer".into()))
            }
        }
    }

    pub fn mode(&self) -> NormalizationMode {
        self.mode
    }

    /// Fingerprint of the lemma list in use; `None` outside lemmatized mode.
    pub fn lemma_fingerprint(&self) -> Option<&str> {
        self.lemma_fingerprint.as_deref()
    }

    /// Ordered index terms for `text`, or the placeholder term alone when nothing survives
    /// tokenization.
    pub fn normalize(&self, text: &str) -> Result<Vec<String>, Error> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Ok(vec![PLACEHOLDER_TERM.to_string()]);
        }
        match (self.mode, &self.lemmatizer) {
            (NormalizationMode::Verbatim, _) => Ok(tokens),
            (NormalizationMode::Stemmed, _) => Ok(tokens.iter().map(|t| stem(t)).collect()),
            (NormalizationMode::Lemmatized, Some(lemmatizer)) => tokens
                .iter()
                .map(|word| {
                    lemmatizer.root_form(word).map_err(|e| {
                        tracing::warn!(word = %word, error = %e, "lemmatizer failed");
                        Error::DependencyFailure { word: word.clone(), reason: e.to_string() }
                    })
                })
                .collect(),
            (NormalizationMode::Lemmatized, None) => {
                Err(Error::Configuration("lemmatized mode requires a lemmatizer".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Paris, the City of Light!");
        assert_eq!(t, vec!["paris", "the", "city", "of", "light"]);
    }

    #[test]
    fn empty_text_yields_placeholder() {
        assert_eq!(Normalizer::verbatim().normalize("").unwrap(), vec!["."]);
        assert_eq!(Normalizer::stemmed().normalize("  -- ").unwrap(), vec!["."]);
    }

    #[test]
    fn stemmed_mode_reduces_inflections() {
        let terms = Normalizer::stemmed().normalize("Running runs").unwrap();
        assert_eq!(terms, vec!["run", "run"]);
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("Stemmed".parse::<NormalizationMode>().unwrap(), NormalizationMode::Stemmed);
        assert!("fuzzy".parse::<NormalizationMode>().is_err());
    }

    #[test]
    fn lemmatized_mode_without_lemmatizer_is_rejected() {
        let err = Normalizer::new(NormalizationMode::Lemmatized, None).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}

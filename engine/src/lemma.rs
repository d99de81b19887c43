//! Root-form lookup used by lemmatized normalization.
//!
//! The engine only sees the [`Lemmatizer`] trait; any deterministic implementation works. The
//! bundled [`LemmaTable`] reads a `word<TAB>lemma` file, which is how lemma lists exported from
//! morphological toolkits are usually shipped.

use crate::error::Error;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub trait Lemmatizer: Send + Sync {
    /// Root form of an already-lowercased word. Must return the same answer for the same word.
    fn root_form(&self, word: &str) -> anyhow::Result<String>;

    /// Identifies the word list behind this lemmatizer, if there is one. An index remembers it,
    /// and opening that index through a different list is refused.
    fn fingerprint(&self) -> Option<String> {
        None
    }
}

impl<F> Lemmatizer for F
where
    F: Fn(&str) -> anyhow::Result<String> + Send + Sync,
{
    fn root_form(&self, word: &str) -> anyhow::Result<String> {
        self(word)
    }
}

/// In-memory lemma dictionary. Unknown words are their own root.
#[derive(Debug, Default, Clone)]
pub struct LemmaTable {
    lemmas: HashMap<String, String>,
}

impl LemmaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, word: impl Into<String>, lemma: impl Into<String>) {
        self.lemmas.insert(word.into(), lemma.into());
    }

    pub fn len(&self) -> usize {
        self.lemmas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lemmas.is_empty()
    }

    /// Parses `word<TAB>lemma` lines. Blank lines and `#` comments are ignored; the first
    /// occurrence of a word wins.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let mut table = LemmaTable::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (word, lemma) = line.split_once('\t').ok_or_else(|| {
                Error::MalformedInput(format!("lemma table line {}: missing tab", lineno + 1))
            })?;
            table
                .lemmas
                .entry(word.trim().to_lowercase())
                .or_insert_with(|| lemma.trim().to_lowercase());
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|e| Error::unavailable(path, e))?;
        let table = Self::parse(&text)?;
        tracing::info!(path = %path.display(), entries = table.len(), "loaded lemma table");
        Ok(table)
    }
}

impl Lemmatizer for LemmaTable {
    fn root_form(&self, word: &str) -> anyhow::Result<String> {
        Ok(self.lemmas.get(word).cloned().unwrap_or_else(|| word.to_string()))
    }

    /// SHA-1 of the sorted entries, so the same table loaded twice gives the same value.
    fn fingerprint(&self) -> Option<String> {
        let mut entries: Vec<(&String, &String)> = self.lemmas.iter().collect();
        entries.sort_unstable();
        let mut hasher = Sha1::new();
        for (word, lemma) in entries {
            hasher.update(word.as_bytes());
            hasher.update(b"\t");
            hasher.update(lemma.as_bytes());
            hasher.update(b"\n");
        }
        Some(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_known_words_and_passes_through_unknown() {
        let table = LemmaTable::parse("# comment\nwent\tgo\nMice\tmouse\n\nwent\tgoes\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.root_form("went").unwrap(), "go");
        assert_eq!(table.root_form("mice").unwrap(), "mouse");
        assert_eq!(table.root_form("paris").unwrap(), "paris");
    }

    #[test]
    fn rejects_lines_without_tab() {
        assert!(matches!(LemmaTable::parse("went go").unwrap_err(), Error::MalformedInput(_)));
    }

    #[test]
    fn closures_are_lemmatizers() {
        let upper = |w: &str| -> anyhow::Result<String> { Ok(w.to_uppercase()) };
        assert_eq!(upper.root_form("abc").unwrap(), "ABC");
        assert!(upper.fingerprint().is_none());
    }

    #[test]
    fn fingerprint_follows_content_not_order() {
        let a = LemmaTable::parse("went\tgo\nmice\tmouse\n").unwrap();
        let b = LemmaTable::parse("# same entries\nmice\tmouse\nwent\tgo\n").unwrap();
        let c = LemmaTable::parse("went\tgo\nmice\tmice\n").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().unwrap().len(), 40);
    }
}

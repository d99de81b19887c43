use crate::corpus::{build_from_corpus, BuildStats};
use crate::error::Error;
use crate::index::{DocMeta, InvertedIndex, Posting, TermId};
use crate::tokenizer::{NormalizationMode, Normalizer};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub mode: NormalizationMode,
    pub num_docs: u32,
    pub num_terms: u32,
    pub total_terms: u64,
    pub created_at: String,
    /// Fingerprint of the lemma table a lemmatized generation was built with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma_fingerprint: Option<String>,
}

/// Locates the index generation of one normalization mode under a root directory:
/// `{root}/{mode}/`.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
    pub mode: NormalizationMode,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P, mode: NormalizationMode) -> Self {
        Self { root: root.as_ref().to_path_buf(), mode }
    }
    pub fn generation(&self) -> PathBuf { self.root.join(self.mode.as_str()) }
    fn staging(&self) -> PathBuf { self.root.join(format!(".{}.building", self.mode)) }
    fn retired(&self) -> PathBuf { self.root.join(format!(".{}.retired", self.mode)) }
    fn dictionary(dir: &Path) -> PathBuf { dir.join("dictionary.bin") }
    fn postings(dir: &Path) -> PathBuf { dir.join("postings.bin") }
    fn docs(dir: &Path) -> PathBuf { dir.join("docs.bin") }
    fn meta(dir: &Path) -> PathBuf { dir.join("meta.json") }

    /// A generation exists once its meta header has been written.
    pub fn exists(&self) -> bool {
        Self::meta(&self.generation()).is_file()
    }
}

fn write_bincode<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let bytes = bincode::serialize(value).map_err(|e| Error::unavailable(path, e))?;
    let mut f = File::create(path).map_err(|e| Error::unavailable(path, e))?;
    f.write_all(&bytes).map_err(|e| Error::unavailable(path, e))?;
    f.sync_all().map_err(|e| Error::unavailable(path, e))
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let mut f = File::open(path).map_err(|e| Error::unavailable(path, e))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf).map_err(|e| Error::unavailable(path, e))?;
    bincode::deserialize(&buf).map_err(|e| Error::corrupt(path, e))
}

pub fn save_meta(dir: &Path, meta: &MetaFile) -> Result<(), Error> {
    let path = IndexPaths::meta(dir);
    let json = serde_json::to_string_pretty(meta).map_err(|e| Error::unavailable(&path, e))?;
    fs::write(&path, json).map_err(|e| Error::unavailable(&path, e))
}

pub fn load_meta(dir: &Path) -> Result<MetaFile, Error> {
    let path = IndexPaths::meta(dir);
    let text = fs::read_to_string(&path).map_err(|e| Error::unavailable(&path, e))?;
    serde_json::from_str(&text).map_err(|e| Error::corrupt(&path, e))
}

fn write_files(dir: &Path, index: &InvertedIndex) -> Result<(), Error> {
    create_dir_all(dir).map_err(|e| Error::unavailable(dir, e))?;
    write_bincode(&IndexPaths::dictionary(dir), &(&index.dictionary, &index.collection_frequency))?;
    write_bincode(&IndexPaths::postings(dir), &index.postings)?;
    write_bincode(&IndexPaths::docs(dir), &(&index.docs, &index.doc_lengths))?;
    // Written last: its presence marks the generation as complete.
    let meta = MetaFile {
        version: FORMAT_VERSION,
        mode: index.mode,
        num_docs: index.document_count(),
        num_terms: index.num_terms() as u32,
        total_terms: index.total_terms,
        created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        lemma_fingerprint: index.lemma_fingerprint.clone(),
    };
    save_meta(dir, &meta)
}

/// Persists `index` as the generation for `paths.mode`, replacing any previous one.
///
/// Files go to a staging directory that is renamed into place only when complete. The previous
/// generation is first renamed aside and deleted only after the swap, so at every point either
/// the old or the new generation can be recovered.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<(), Error> {
    if index.mode != paths.mode {
        return Err(Error::Configuration(format!(
            "refusing to store a {} index as the {} generation",
            index.mode, paths.mode
        )));
    }
    let staging = paths.staging();
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| Error::unavailable(&staging, e))?;
    }
    if let Err(e) = write_files(&staging, index) {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }
    let generation = paths.generation();
    let retired = paths.retired();
    if retired.exists() {
        fs::remove_dir_all(&retired).map_err(|e| Error::unavailable(&retired, e))?;
    }
    let replacing = generation.exists();
    if replacing {
        fs::rename(&generation, &retired).map_err(|e| Error::unavailable(&generation, e))?;
    }
    if let Err(e) = fs::rename(&staging, &generation) {
        if replacing {
            let _ = fs::rename(&retired, &generation);
        }
        return Err(Error::unavailable(&generation, e));
    }
    if replacing {
        if let Err(e) = fs::remove_dir_all(&retired) {
            tracing::warn!(
                path = %retired.display(),
                error = %e,
                "could not remove old generation"
            );
        }
    }
    Ok(())
}

/// Puts a generation that was renamed aside back in place when the save that replaced it never
/// finished. Returns whether anything was restored.
fn restore_retired(paths: &IndexPaths) -> Result<bool, Error> {
    let retired = paths.retired();
    if paths.exists() || !IndexPaths::meta(&retired).is_file() {
        return Ok(false);
    }
    let generation = paths.generation();
    if generation.exists() {
        fs::remove_dir_all(&generation).map_err(|e| Error::unavailable(&generation, e))?;
    }
    fs::rename(&retired, &generation).map_err(|e| Error::unavailable(&generation, e))?;
    tracing::warn!(path = %generation.display(), "restored generation from an interrupted save");
    Ok(true)
}

/// Loads a persisted generation read-only, checking its mode and invariants.
pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex, Error> {
    let dir = paths.generation();
    let meta = load_meta(&dir)?;
    if meta.version != FORMAT_VERSION {
        return Err(Error::corrupt(&dir, format!("unsupported format version {}", meta.version)));
    }
    if meta.mode != paths.mode {
        return Err(Error::Configuration(format!(
            "index at {} was built with {} normalization but {} was requested",
            dir.display(),
            meta.mode,
            paths.mode
        )));
    }
    let (dictionary, collection_frequency): (HashMap<String, TermId>, Vec<u64>) =
        read_bincode(&IndexPaths::dictionary(&dir))?;
    let postings: Vec<Vec<Posting>> = read_bincode(&IndexPaths::postings(&dir))?;
    let (docs, doc_lengths): (Vec<DocMeta>, Vec<u32>) = read_bincode(&IndexPaths::docs(&dir))?;

    let index = InvertedIndex {
        mode: meta.mode,
        dictionary,
        postings,
        collection_frequency,
        docs,
        doc_lengths,
        total_terms: meta.total_terms,
        lemma_fingerprint: meta.lemma_fingerprint,
    };
    if index.document_count() != meta.num_docs || index.num_terms() != meta.num_terms as usize {
        return Err(Error::corrupt(&dir, "header counts disagree with stored data"));
    }
    index.validate().map_err(|reason| Error::corrupt(&dir, reason))?;
    Ok(index)
}

/// An index ready for querying, and how it was obtained.
#[derive(Debug)]
pub struct OpenedIndex {
    pub index: InvertedIndex,
    /// Present when this call built the index instead of loading it.
    pub built: Option<BuildStats>,
}

/// Loads the generation for the normalizer's mode if one exists, otherwise builds it from the
/// corpus and persists it. `rebuild` forces construction.
pub fn open_or_build(
    paths: &IndexPaths,
    normalizer: &Normalizer,
    corpus: &Path,
    rebuild: bool,
) -> Result<OpenedIndex, Error> {
    if normalizer.mode() != paths.mode {
        return Err(Error::Configuration(format!(
            "normalizer mode {} does not match index generation {}",
            normalizer.mode(),
            paths.mode
        )));
    }
    if !rebuild && (paths.exists() || restore_retired(paths)?) {
        let index = load_index(paths)?;
        index.check_normalizer(normalizer)?;
        tracing::info!(
            path = %paths.generation().display(),
            num_docs = index.document_count(),
            num_terms = index.num_terms(),
            "opened existing index"
        );
        return Ok(OpenedIndex { index, built: None });
    }

    let (index, stats) = build_from_corpus(corpus, normalizer)?;
    save_index(paths, &index)?;
    tracing::info!(
        path = %paths.generation().display(),
        num_docs = index.document_count(),
        "index build complete"
    );
    Ok(OpenedIndex { index, built: Some(stats) })
}

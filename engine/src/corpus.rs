use crate::error::Error;
use crate::index::{IndexBuilder, InvertedIndex};
use crate::parser::{parse_str, ParseOutput, ParseStats};
use crate::tokenizer::Normalizer;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a corpus build processed and what it had to leave out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub files: usize,
    pub parse: ParseStats,
    pub indexed: usize,
    /// Documents whose normalization failed.
    pub skipped: usize,
}

/// Corpus files under `path`, sorted so doc ids are assigned reproducibly.
pub fn corpus_files(path: &Path) -> Result<Vec<PathBuf>, Error> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(Error::unavailable(path, "corpus path does not exist"));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::unavailable(path, e))?;
        if entry.file_type().is_file() && !is_hidden(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).map_or(false, |n| n.starts_with('.'))
}

/// Parses one corpus file. Invalid UTF-8 is replaced rather than rejected.
pub fn parse_file(path: &Path) -> Result<ParseOutput, Error> {
    let bytes = fs::read(path).map_err(|e| Error::unavailable(path, e))?;
    Ok(parse_str(&String::from_utf8_lossy(&bytes)))
}

/// Reads and indexes every corpus file. Any unreadable file aborts the whole build.
pub fn build_from_corpus(
    corpus: &Path,
    normalizer: &Normalizer,
) -> Result<(InvertedIndex, BuildStats), Error> {
    let files = corpus_files(corpus)?;
    let mut stats = BuildStats { files: files.len(), ..BuildStats::default() };
    let mut builder = IndexBuilder::new(normalizer);

    for file in &files {
        let parsed = parse_file(file)?;
        stats.parse.merge(parsed.stats);
        for doc in &parsed.documents {
            match builder.add(doc) {
                Ok(_) => stats.indexed += 1,
                Err(e) if e.is_per_record() => {
                    tracing::warn!(title = %doc.title, error = %e, "skipping document");
                    stats.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(
            file = %file.display(),
            documents = parsed.documents.len(),
            "parsed corpus file"
        );
    }

    if builder.is_empty() {
        tracing::warn!(corpus = %corpus.display(), "corpus produced no documents");
    }
    tracing::info!(
        files = stats.files,
        indexed = stats.indexed,
        dropped_media = stats.parse.dropped_media,
        malformed = stats.parse.malformed,
        skipped = stats.skipped,
        "ingested corpus"
    );
    Ok((builder.finish(), stats))
}

//! Splits raw wiki-dump text into documents.
//!
//! A corpus file is a run of records, each introduced by a `[[Title]]` line and followed by an
//! optional `CATEGORIES:` line, `=Heading=` lines and body lines. Template spans
//! (`[tpl] ... [/tpl]`) are removed from body text, and the sections listed in
//! [`EXCLUDED_SECTIONS`] are skipped up to the next heading.

use crate::error::Error;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

lazy_static! {
    static ref TEMPLATE_MARKER: Regex = Regex::new(r"\[/?tpl\]").expect("valid regex");
}

pub const EXCLUDED_SECTIONS: &[&str] =
    &["References", "See also", "External links", "Further reading", "Notes"];
const CATEGORIES_PREFIX: &str = "CATEGORIES:";
const TEMPLATE_OPEN: &str = "[tpl]";
const TEMPLATE_CLOSE: &str = "[/tpl]";

/// One corpus record before it is assigned a doc id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub title: String,
    pub categories: String,
    pub body: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    pub emitted: usize,
    /// Records titled `Image:...` / `File:...`.
    pub dropped_media: usize,
    pub malformed: usize,
}

impl ParseStats {
    pub fn merge(&mut self, other: ParseStats) {
        self.emitted += other.emitted;
        self.dropped_media += other.dropped_media;
        self.malformed += other.malformed;
    }
}

#[derive(Debug, Default)]
pub struct ParseOutput {
    pub documents: Vec<ParsedDocument>,
    pub stats: ParseStats,
}

enum Line<'a> {
    Title(&'a str),
    Categories(&'a str),
    Heading(&'a str),
    Body(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.chars().count() > 4 && trimmed.starts_with("[[") && trimmed.ends_with("]]") {
        return Line::Title(&trimmed[2..trimmed.len() - 2]);
    }
    if let Some(rest) = line.strip_prefix(CATEGORIES_PREFIX) {
        return Line::Categories(rest.trim());
    }
    if trimmed.starts_with('=') && trimmed.ends_with('=') {
        return Line::Heading(strip_heading(trimmed));
    }
    Line::Body(line)
}

/// Peels `=` pairs off both ends while the line stays symmetric.
pub fn strip_heading(line: &str) -> &str {
    let mut text = line;
    while text.len() > 2 && text.starts_with('=') && text.ends_with('=') {
        text = &text[1..text.len() - 1];
    }
    text.trim()
}

/// Deletes every `[tpl] ... [/tpl]` span, markers included. Spans nest: text resumes only once
/// the outermost span is closed. A closing marker with no open span is kept as text.
///
/// An opening marker without a closing one is malformed input.
pub fn strip_templates(line: &str) -> Result<String, Error> {
    let mut out = String::with_capacity(line.len());
    let mut depth = 0usize;
    let mut kept_from = 0;
    for marker in TEMPLATE_MARKER.find_iter(line) {
        let closing = marker.as_str() == TEMPLATE_CLOSE;
        match (depth, closing) {
            (0, true) => {}
            (0, false) => {
                out.push_str(&line[kept_from..marker.start()]);
                depth = 1;
            }
            (_, false) => depth += 1,
            (_, true) => {
                depth -= 1;
                if depth == 0 {
                    kept_from = marker.end();
                }
            }
        }
    }
    if depth > 0 {
        return Err(Error::MalformedInput(format!("unmatched {TEMPLATE_OPEN} marker in {line:?}")));
    }
    out.push_str(&line[kept_from..]);
    Ok(out)
}

fn is_media_title(title: &str) -> bool {
    title.contains("Image:") || title.contains("File:")
}

/// State of the record currently being accumulated. Each line consumes the state and returns the
/// next one, so nothing leaks from one record into the next.
#[derive(Debug, Default)]
struct PendingRecord {
    title: String,
    categories: String,
    body: String,
    in_excluded_section: bool,
    malformed: bool,
}

impl PendingRecord {
    fn titled(title: &str) -> Self {
        Self { title: title.to_string(), ..Self::default() }
    }

    fn consume(mut self, line: &str, out: &mut ParseOutput) -> Self {
        match classify(line) {
            Line::Title(title) => {
                self.flush(out);
                return PendingRecord::titled(title);
            }
            Line::Categories(categories) => self.categories = categories.to_string(),
            Line::Heading(heading) => {
                self.in_excluded_section = EXCLUDED_SECTIONS.contains(&heading);
                if !self.in_excluded_section && !heading.is_empty() {
                    self.push_body(heading);
                }
            }
            Line::Body(_) if self.in_excluded_section => {}
            Line::Body(text) => match strip_templates(text) {
                Ok(clean) => self.push_body(&clean),
                Err(e) => {
                    if !self.malformed {
                        warn!(title = %self.title, error = %e, "malformed body line");
                    }
                    self.malformed = true;
                }
            },
        }
        self
    }

    fn push_body(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.body.push_str(text);
        self.body.push(' ');
    }

    fn flush(self, out: &mut ParseOutput) {
        if self.title.trim().is_empty() {
            if !self.categories.is_empty() || !self.body.is_empty() {
                warn!("dropping record without a title");
                out.stats.malformed += 1;
            }
            return;
        }
        if is_media_title(&self.title) {
            debug!(title = %self.title, "skipping media record");
            out.stats.dropped_media += 1;
            return;
        }
        if self.malformed {
            warn!(title = %self.title, "dropping record with unmatched template marker");
            out.stats.malformed += 1;
            return;
        }
        out.stats.emitted += 1;
        out.documents.push(ParsedDocument {
            title: self.title,
            categories: self.categories,
            body: self.body.trim_end().to_string(),
        });
    }
}

/// Parse a sequence of corpus lines into documents.
pub fn parse_lines<I, S>(lines: I) -> ParseOutput
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = ParseOutput::default();
    let last = lines
        .into_iter()
        .fold(PendingRecord::default(), |pending, line| pending.consume(line.as_ref(), &mut out));
    last.flush(&mut out);
    out
}

pub fn parse_str(text: &str) -> ParseOutput {
    parse_lines(text.lines())
}

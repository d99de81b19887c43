//! Replays labeled clues through a [`Searcher`] and scores the answers.
//!
//! Question files hold four-line groups: category, clue, gold answer, blank separator.

use crate::error::Error;
use crate::search::{RankedResult, Searcher};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    pub category: String,
    pub clue: String,
    pub gold_answer: String,
}

impl QueryRecord {
    pub fn query_text(&self) -> String {
        format!("{} {}", self.category, self.clue)
    }
}

#[derive(Debug, Default, Clone)]
pub struct QuestionSet {
    pub records: Vec<QueryRecord>,
    /// Groups skipped because they were incomplete or lacked the blank separator.
    pub malformed: usize,
}

pub fn parse_questions(text: &str) -> QuestionSet {
    let lines: Vec<&str> = text.lines().collect();
    let mut set = QuestionSet::default();
    for (group, chunk) in lines.chunks(4).enumerate() {
        if chunk.len() < 4 {
            warn!(group, remaining = chunk.len(), "incomplete trailing question record");
            set.malformed += 1;
            continue;
        }
        if !chunk[3].trim().is_empty() {
            warn!(group, separator = chunk[3], "question record is not followed by a blank line");
            set.malformed += 1;
            continue;
        }
        set.records.push(QueryRecord {
            category: chunk[0].trim().to_string(),
            clue: chunk[1].trim().to_string(),
            gold_answer: chunk[2].trim().to_string(),
        });
    }
    set
}

pub fn read_questions(path: &Path) -> Result<QuestionSet, Error> {
    let text = fs::read_to_string(path).map_err(|e| Error::unavailable(path, e))?;
    Ok(parse_questions(&text))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub total_questions: usize,
    pub correct_at_1: usize,
    pub reciprocal_rank_sum: f64,
    /// Questions whose query failed on a per-record error; they earn no credit.
    pub failed_queries: usize,
    pub malformed_records: usize,
}

impl EvaluationReport {
    pub fn precision_at_1(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        self.correct_at_1 as f64 / self.total_questions as f64
    }

    pub fn mrr(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        self.reciprocal_rank_sum / self.total_questions as f64
    }

    pub fn precision_at_1_percent(&self) -> f64 {
        self.precision_at_1() * 100.0
    }

    pub fn mrr_percent(&self) -> f64 {
        self.mrr() * 100.0
    }
}

/// Zero-based rank of the first result titled `gold`.
pub fn gold_rank(results: &[RankedResult], gold: &str) -> Option<usize> {
    results.iter().position(|r| r.title == gold)
}

/// Runs every question once. An empty question set is a configuration error: there is nothing
/// meaningful to report.
pub fn evaluate(searcher: &Searcher, questions: &QuestionSet) -> Result<EvaluationReport, Error> {
    if questions.records.is_empty() {
        return Err(Error::Configuration("question set contains no usable questions".into()));
    }
    let mut report = EvaluationReport {
        total_questions: questions.records.len(),
        malformed_records: questions.malformed,
        ..EvaluationReport::default()
    };

    for (i, record) in questions.records.iter().enumerate() {
        let results = match searcher.search(&record.query_text()) {
            Ok(results) => results,
            Err(e) if e.is_per_record() => {
                warn!(question = i, error = %e, "query failed");
                report.failed_queries += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        let rank = gold_rank(&results, &record.gold_answer);
        match rank {
            Some(0) => {
                report.correct_at_1 += 1;
                report.reciprocal_rank_sum += 1.0;
            }
            Some(r) => report.reciprocal_rank_sum += 1.0 / (r + 1) as f64,
            None => {}
        }
        debug!(
            question = i,
            gold = %record.gold_answer,
            rank = ?rank,
            top = results.first().map(|r| r.title.as_str()).unwrap_or(""),
            "evaluated question"
        );
    }

    info!(
        total = report.total_questions,
        correct_at_1 = report.correct_at_1,
        failed = report.failed_queries,
        malformed = report.malformed_records,
        precision_at_1 = report.precision_at_1(),
        mrr = report.mrr(),
        "evaluation complete"
    );
    Ok(report)
}

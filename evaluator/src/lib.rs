use anyhow::{Context, Result};
use engine::eval::{evaluate, read_questions, EvaluationReport};
use engine::persist::open_or_build;
use engine::{EngineConfig, RankedResult, Searcher};
use std::sync::Arc;

/// Opens (or builds) the index described by `config` and wraps it in a searcher.
pub fn open_searcher(config: &EngineConfig, rebuild: bool) -> Result<Searcher> {
    config.validate()?;
    let normalizer = config.normalizer()?;
    let paths = config.index_paths();
    let opened = open_or_build(&paths, &normalizer, &config.corpus_path, rebuild)
        .with_context(|| format!("opening index at {}", paths.generation().display()))?;
    if let Some(stats) = opened.built {
        tracing::info!(
            indexed = stats.indexed,
            files = stats.files,
            "built index before evaluating"
        );
    }
    let index = Arc::new(opened.index);
    let searcher = Searcher::new(index, normalizer, config.scoring_model(), config.top_k)?;
    Ok(searcher)
}

/// Full evaluation pass over the configured question set.
pub fn run_evaluation(config: &EngineConfig, rebuild: bool) -> Result<EvaluationReport> {
    let searcher = open_searcher(config, rebuild)?;
    let questions = read_questions(&config.questions_path)
        .with_context(|| format!("reading questions from {}", config.questions_path.display()))?;
    tracing::info!(
        questions = questions.records.len(),
        malformed = questions.malformed,
        model = %searcher.model().kind(),
        mode = %config.normalization_mode,
        "starting evaluation"
    );
    let report = evaluate(&searcher, &questions)?;
    Ok(report)
}

pub fn run_query(config: &EngineConfig, text: &str, rebuild: bool) -> Result<Vec<RankedResult>> {
    let searcher = open_searcher(config, rebuild)?;
    Ok(searcher.search(text)?)
}

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use engine::{EngineConfig, ModelKind, NormalizationMode};
use evaluator::{run_evaluation, run_query};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "evaluator")]
#[command(
    about = "Answer clues against the corpus index and report precision@1 and MRR",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    settings: Settings,
    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of the optional JSON config file.
#[derive(Args)]
struct Settings {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// verbatim, stemmed or lemmatized
    #[arg(long, global = true)]
    mode: Option<NormalizationMode>,
    /// bm25, boolean, jelinek-mercer or classic-tfidf
    #[arg(long, global = true)]
    model: Option<ModelKind>,
    #[arg(long, global = true)]
    top_k: Option<usize>,
    #[arg(long, global = true)]
    k1: Option<f32>,
    #[arg(long, global = true)]
    b: Option<f32>,
    /// Index root directory
    #[arg(long, global = true)]
    index: Option<PathBuf>,
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,
    #[arg(long, global = true)]
    questions: Option<PathBuf>,
    #[arg(long, global = true)]
    lemma_table: Option<PathBuf>,
    /// Rebuild the index even if one exists
    #[arg(long, global = true, default_value_t = false)]
    rebuild: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every question and print precision@1 and MRR as percentages
    Eval,
    /// Print the ranked titles for one clue
    Query {
        text: String,
    },
}

impl Settings {
    fn into_config(self) -> Result<(EngineConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path)?,
            None => EngineConfig::default(),
        };
        if let Some(mode) = self.mode { config.normalization_mode = mode; }
        if let Some(model) = self.model { config.scoring_model = model; }
        if let Some(top_k) = self.top_k { config.top_k = top_k; }
        if let Some(k1) = self.k1 { config.bm25.k1 = k1; }
        if let Some(b) = self.b { config.bm25.b = b; }
        if let Some(index) = self.index { config.index_path = index; }
        if let Some(corpus) = self.corpus { config.corpus_path = corpus; }
        if let Some(questions) = self.questions { config.questions_path = questions; }
        if self.lemma_table.is_some() { config.lemma_table = self.lemma_table; }
        Ok((config, self.rebuild))
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let (config, rebuild) = cli.settings.into_config()?;

    match cli.command {
        Commands::Eval => {
            let report = run_evaluation(&config, rebuild)?;
            println!(
                "Percentage of correct answers using precision at 1: {:.2}",
                report.precision_at_1_percent()
            );
            println!("Mean Reciprocal Rank result: {:.2}", report.mrr_percent());
            if report.failed_queries > 0 || report.malformed_records > 0 {
                println!(
                    "({} questions, {} failed queries, {} malformed records skipped)",
                    report.total_questions, report.failed_queries, report.malformed_records
                );
            }
        }
        Commands::Query { text } => {
            let results = run_query(&config, &text, rebuild)?;
            if results.is_empty() {
                println!("no matching documents");
            }
            for (rank, hit) in results.iter().enumerate() {
                println!("{:>2}. {:<40} {:.4}", rank + 1, hit.title, hit.score);
            }
        }
    }
    Ok(())
}

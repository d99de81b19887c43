use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::persist::{load_index, load_meta, open_or_build, IndexPaths};
use engine::{EngineConfig, NormalizationMode};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(
    about = "Build and inspect per-mode inverted indexes of the clue corpus",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index for a normalization mode, or open it if it already exists
    Build {
        /// Corpus file or directory
        #[arg(long)]
        corpus: PathBuf,
        /// Index root directory; each mode gets its own subdirectory
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// verbatim, stemmed or lemmatized
        #[arg(long, default_value = "verbatim")]
        mode: NormalizationMode,
        /// Tab-separated word/lemma table, required for lemmatized mode
        #[arg(long)]
        lemma_table: Option<PathBuf>,
        /// Discard an existing index and rebuild from the corpus
        #[arg(long, default_value_t = false)]
        rebuild: bool,
    },
    /// Print statistics of a persisted index
    Stats {
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        #[arg(long, default_value = "verbatim")]
        mode: NormalizationMode,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { corpus, index, mode, lemma_table, rebuild } => {
            let config = EngineConfig {
                normalization_mode: mode,
                index_path: index,
                corpus_path: corpus,
                lemma_table,
                ..EngineConfig::default()
            };
            build_index(&config, rebuild)
        }
        Commands::Stats { index, mode } => print_stats(&IndexPaths::new(index, mode)),
    }
}

fn build_index(config: &EngineConfig, rebuild: bool) -> Result<()> {
    config.validate()?;
    let normalizer = config.normalizer()?;
    let paths = config.index_paths();
    let opened = open_or_build(&paths, &normalizer, &config.corpus_path, rebuild)
        .with_context(|| format!("opening index at {}", paths.generation().display()))?;

    tracing::info!(mode = %paths.mode, num_docs = opened.index.document_count(), "index ready");
    match opened.built {
        Some(stats) => println!(
            "built {}: {} documents from {} files \
             ({} media records dropped, {} malformed, {} skipped)",
            paths.generation().display(),
            stats.indexed,
            stats.files,
            stats.parse.dropped_media,
            stats.parse.malformed,
            stats.skipped
        ),
        None => println!(
            "index {} already exists with {} documents; pass --rebuild to rebuild",
            paths.generation().display(),
            opened.index.document_count()
        ),
    }
    Ok(())
}

fn print_stats(paths: &IndexPaths) -> Result<()> {
    let dir = paths.generation();
    let meta = load_meta(&dir).with_context(|| format!("reading {}", dir.display()))?;
    let index = load_index(paths)?;
    println!("index:           {}", dir.display());
    println!("mode:            {}", meta.mode);
    println!("created:         {}", meta.created_at);
    println!("documents:       {}", index.document_count());
    println!("terms:           {}", index.num_terms());
    println!("tokens:          {}", index.total_terms());
    println!("avg doc length:  {:.2}", index.average_document_length());
    if let Some(fingerprint) = index.lemma_fingerprint() {
        println!("lemma table:     {fingerprint}");
    }
    Ok(())
}

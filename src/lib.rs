pub mod config;
pub mod corpus;
pub mod model;
pub mod search;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use config::SearchConfig;
use corpus::{CorpusStore, loader};
use search::embed_cache::CachedEmbedder;
use search::embedder::{Embedder, HashEmbedder};
use search::hybrid::{HybridRetriever, SearchMode};
use search::lexical::LexicalIndex;
use search::numeric::NumericRetriever;
use search::semantic::SemanticIndex;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "fes",
    version,
    about = "Hybrid evidence retrieval over fund records and FAQ entries"
)]
pub struct Cli {
    /// FAQ source file (question,answer CSV)
    #[arg(long, env = "FES_FAQS", default_value = "data/faqs.csv")]
    pub faqs: PathBuf,

    /// Fund metrics source file (CSV or TSV)
    #[arg(long, env = "FES_FUNDS", default_value = "data/funds.csv")]
    pub funds: PathBuf,

    /// Cache directory for indexes (defaults to platform data dir)
    #[arg(long, env = "FES_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the indexes and persist them, without serving a query
    Index,
    /// Answer a single query and print ranked JSON results
    Search {
        /// Natural-language query
        query: String,

        /// Retrieval strategy: lexical, semantic, or hybrid
        #[arg(long, default_value = "hybrid")]
        mode: String,

        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
}

pub fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);

    match cli.command {
        Commands::Index => {
            let engine = build_engine(&cli.faqs, &cli.funds, &data_dir)?;
            info!(documents = engine.corpus().len(), "indexes built");
            Ok(())
        }
        Commands::Search { query, mode, top_k } => {
            let mode: SearchMode = mode.parse()?;
            let engine = build_engine(&cli.faqs, &cli.funds, &data_dir)?;
            let results = engine.retrieve(&query, mode, top_k);
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
    }
}

/// Load both collections and assemble the full retrieval stack.
pub fn build_engine(faqs: &Path, funds: &Path, data_dir: &Path) -> Result<HybridRetriever> {
    let faq_records = loader::load_faqs(faqs)?;
    let fund_records = loader::load_funds(funds)?;
    let corpus = Arc::new(CorpusStore::build(faq_records, fund_records)?);

    let embedder: Arc<dyn Embedder> = {
        let base = Arc::new(HashEmbedder::default());
        Arc::new(
            CachedEmbedder::open(base, &data_dir.join("embedding_cache.db"))
                .context("open embedding cache")?,
        )
    };

    let lexical = LexicalIndex::build(&corpus);
    let semantic = SemanticIndex::open(
        corpus.clone(),
        embedder,
        Some(&data_dir.join("vector_index.fvix")),
    )?;
    let numeric = NumericRetriever::new(corpus.clone());

    Ok(HybridRetriever::new(
        corpus,
        lexical,
        semantic,
        numeric,
        SearchConfig::from_env(),
    ))
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fund_evidence_search=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "fund-evidence-search", "fund-evidence-search")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".fes"))
}

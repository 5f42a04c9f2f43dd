//! Planwizard CLI entry point

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::Parser;
use corpusstore::{CorpusStore, DocFilter, DocType};
use eyre::{Context, Result};
use tracing::{debug, info};

use planwizard::cli::{Cli, Command};
use planwizard::config::Config;
use planwizard::domain::DistrictProfile;
use planwizard::export::{ExportFormat, export_plan};
use planwizard::index::{CorpusRecord, Indexer};
use planwizard::llm::{create_embedding_client, create_llm_client};
use planwizard::orchestrator::Orchestrator;
use planwizard::persist::FileSessionStore;
use planwizard::progress::GenerationProgress;
use planwizard::prompts::doc_title;
use planwizard::retrieve::Retriever;
use planwizard::stream::encode_frame;
use planwizard::wizard::WizardSession;

fn setup_logging(cli_level: Option<&str>) -> Result<()> {
    // Stdout carries the event stream, so logs go to stderr
    let default_level = cli_level.unwrap_or("info").to_lowercase();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_level.as_deref())?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Index { seed, reseed } => cmd_index(&config, &seed, reseed).await,
        Command::Search { query, doc_type, top_k } => cmd_search(&config, &query, doc_type.as_deref(), top_k).await,
        Command::Plan {
            profile,
            output,
            format,
        } => cmd_plan(&config, &profile, output, &format).await,
    }
}

fn open_store(config: &Config) -> Result<CorpusStore> {
    if let Some(parent) = config.storage.db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create store directory")?;
    }
    CorpusStore::open(&config.storage.db_path, config.embedding.dim).context("Failed to open corpus store")
}

/// Embed and ingest a corpus seed file
async fn cmd_index(config: &Config, seed: &Path, reseed: bool) -> Result<()> {
    let content = fs::read_to_string(seed).context(format!("Failed to read seed file {}", seed.display()))?;
    let records: Vec<CorpusRecord> = serde_json::from_str(&content).context("Failed to parse seed file")?;
    info!(records = records.len(), seed = %seed.display(), "seed file loaded");

    let embedder = create_embedding_client(&config.embedding)?;
    let store = open_store(config)?;

    if reseed {
        let mut cleared = 0;
        for doc_type in [DocType::Standard, DocType::Policy, DocType::Curriculum] {
            cleared += store.delete_by_type(doc_type).context("Failed to clear existing documents")?;
        }
        println!("Cleared {cleared} existing documents");
    }

    let indexer = Indexer::new(embedder, Arc::new(Mutex::new(store)), config.indexing.clone());
    let report = indexer.ingest_batch(&records).await.context("Ingestion failed")?;

    println!(
        "Indexed {} documents ({} updated) in {} batches",
        report.documents, report.updated, report.batches
    );
    Ok(())
}

/// Run one retrieval query and print the ranked hits
async fn cmd_search(config: &Config, query: &str, doc_type: Option<&str>, top_k: Option<usize>) -> Result<()> {
    let embedder = create_embedding_client(&config.embedding)?;
    let store = Arc::new(Mutex::new(open_store(config)?));

    let mut retrieval = config.retrieval.clone();
    if let Some(k) = top_k {
        retrieval.top_k = k;
    }
    let retriever = Retriever::new(embedder, store, retrieval);

    let mut filter = DocFilter::new();
    if let Some(t) = doc_type {
        filter = filter.with_doc_type(DocType::parse(t).context("Invalid document type")?);
    }

    let hits = retriever.retrieve(query, &filter).await.context("Search failed")?;
    if hits.is_empty() {
        println!("No matching documents");
        return Ok(());
    }
    for hit in hits {
        println!(
            "{:.3}  {:<12} {:<24} {}",
            hit.score,
            hit.document.doc_type,
            hit.document.id,
            doc_title(&hit.document.content)
        );
    }
    Ok(())
}

/// Generate a plan end to end from a profile file
async fn cmd_plan(config: &Config, profile_path: &Path, output: Option<PathBuf>, format: &str) -> Result<()> {
    config.validate()?;
    let format: ExportFormat = format.parse()?;

    let content =
        fs::read_to_string(profile_path).context(format!("Failed to read profile {}", profile_path.display()))?;
    let profile: DistrictProfile = serde_yaml::from_str(&content).context("Failed to parse profile")?;

    let llm = create_llm_client(&config.llm)?;
    let embedder = create_embedding_client(&config.embedding)?;
    let store = Arc::new(Mutex::new(open_store(config)?));
    let orchestrator = Arc::new(Orchestrator::new(
        llm,
        embedder,
        store,
        config.retrieval.clone(),
        &config.llm,
    )?);
    let sessions = Arc::new(FileSessionStore::new(&config.storage.data_dir));
    let mut session = WizardSession::new(orchestrator, sessions);

    session.submit_profile(profile)?;
    let mut handle = session.begin_generation()?;

    let stdout = std::io::stdout();
    let mut progress = GenerationProgress::new();
    while let Some(event) = handle.next_event().await {
        if event.is_terminal() {
            progress.complete();
        } else {
            progress.tick();
        }
        debug!(progress = format!("{:.0}%", progress.value() * 100.0), "generation event");

        let frame = encode_frame(&event).context("Failed to encode event frame")?;
        let mut out = stdout.lock();
        out.write_all(&frame)?;
        out.flush()?;
    }
    let result = handle.into_result().await;
    session.complete_exchange(result)?;

    let plan = session
        .current_plan()
        .ok_or_else(|| eyre::eyre!("generation finished without a plan"))?;
    let rendered = export_plan(plan, format)?;

    match output {
        Some(path) => {
            fs::write(&path, rendered).context(format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), version = plan.version, "plan exported");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

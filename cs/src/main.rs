use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use corpusstore::cli::Cli;
use corpusstore::config::Config;
use corpusstore::{CorpusStore, DocType};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("corpusstore starting");

    let store = CorpusStore::open(&config.db_path, config.embedding_dim)?;

    match cli.command {
        corpusstore::cli::Command::Stats => {
            let stats = store.stats()?;
            println!("Documents: {}", stats.document_count);
            println!("  Standards: {}", stats.standards);
            println!("  Policies: {}", stats.policies);
            println!("  Curricula: {}", stats.curricula);
            println!("Embedding versions: {}", stats.embedding_versions.join(", "));
        }
        corpusstore::cli::Command::List { doc_type } => {
            let doc_type = doc_type.as_deref().map(DocType::parse).transpose()?;
            let ids = store.list_ids(doc_type)?;
            if ids.is_empty() {
                println!("No documents found");
            } else {
                for id in ids {
                    println!("{}", id);
                }
            }
        }
        corpusstore::cli::Command::Cat { id } => match store.get(&id)? {
            Some(doc) => {
                println!("{} ({})", doc.id.cyan(), doc.doc_type);
                for (k, v) in &doc.metadata {
                    println!("  {}: {}", k.dimmed(), v);
                }
                println!("{}", doc.content);
            }
            None => println!("Document not found: {}", id),
        },
        corpusstore::cli::Command::Delete { doc_type } => {
            let doc_type = DocType::parse(&doc_type)?;
            let deleted = store.delete_by_type(doc_type)?;
            println!("{} Deleted {} {} documents", "✓".green(), deleted, doc_type);
        }
    }

    Ok(())
}

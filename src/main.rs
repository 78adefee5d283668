// src/main.rs
// Sentira CLI - analyze text sentiment, ingest documents, analyze documents

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use sentira::config::{ApiKeys, EnvConfig, ProfileStore};
use sentira::db::DatabasePool;
use sentira::hooks::builtin_registry;
use sentira::llm::AdapterFactory;
use sentira::tasks::prompts::IclMode;
use sentira::tasks::{
    DocumentInput, SentimentRequest, TaskEnv, add_document, analyze_document,
    run_sentiment_analysis,
};

#[derive(Parser)]
#[command(name = "sentira")]
#[command(about = "LLM sentiment analysis pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the sentiment of one piece of text
    Analyze {
        /// Text to analyze
        text: String,
        /// LLM profile name from profiles.toml
        #[arg(short, long, default_value = "dev")]
        profile: String,
        /// Sampling temperature in [0,1]
        #[arg(short = 't', long = "temp")]
        temperature: Option<f32>,
        /// In-context-learning mode: zero-shot or few-shot
        #[arg(long, default_value = "zero-shot")]
        icl: String,
        /// Sentence this text belongs to (enables caching/persistence)
        #[arg(long)]
        sentence_id: Option<i64>,
        /// Force re-analysis of an already-persisted result
        #[arg(long)]
        persist_override: bool,
        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
    },

    /// Ingest a document from a JSON file ({title, content, doc_type?, document_date?})
    AddDocument {
        /// Path to the JSON file
        #[arg(long)]
        json_path: PathBuf,
    },

    /// Analyze every sentence of a stored document
    AnalyzeDocument {
        /// Document id
        #[arg(long)]
        doc_id: i64,
        /// LLM profile name from profiles.toml
        #[arg(short, long, default_value = "dev")]
        profile: String,
        /// Sampling temperature in [0,1]
        #[arg(short = 't', long = "temp")]
        temperature: Option<f32>,
        /// In-context-learning mode: zero-shot or few-shot
        #[arg(long, default_value = "zero-shot")]
        icl: String,
        /// Force re-analysis of already-persisted results
        #[arg(long)]
        persist_override: bool,
    },
}

fn parse_icl(value: &str) -> Result<IclMode> {
    IclMode::parse(value)
        .ok_or_else(|| anyhow::anyhow!("invalid --icl '{value}', expected zero-shot or few-shot"))
}

async fn build_env(config: &EnvConfig) -> Result<TaskEnv> {
    let pool = Arc::new(DatabasePool::open(&config.db_path).await?);
    let profiles = ProfileStore::load(&config.profiles_path)?;
    let hooks = builtin_registry(pool.clone(), config);
    let adapters = AdapterFactory::new(ApiKeys::from_env());
    Ok(TaskEnv {
        pool,
        profiles,
        hooks,
        adapters,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EnvConfig::from_env();

    match cli.command {
        Commands::Analyze {
            text,
            profile,
            temperature,
            icl,
            sentence_id,
            persist_override,
            pretty,
        } => {
            let env = build_env(&config).await?;
            let analysis = run_sentiment_analysis(
                &env,
                SentimentRequest {
                    text,
                    profile,
                    temperature,
                    icl: parse_icl(&icl)?,
                    sentence_id,
                    persist_override,
                },
            )
            .await?;
            print_json(&analysis, pretty)?;
        }

        Commands::AddDocument { json_path } => {
            let text = std::fs::read_to_string(&json_path)?;
            let input: DocumentInput = serde_json::from_str(&text)?;

            let pool = DatabasePool::open(&config.db_path).await?;
            let ingested = add_document(&pool, input).await?;
            print_json(
                &serde_json::json!({
                    "doc_id": ingested.document.id,
                    "created": ingested.created,
                    "sentence_count": ingested.sentences.len(),
                }),
                true,
            )?;
        }

        Commands::AnalyzeDocument {
            doc_id,
            profile,
            temperature,
            icl,
            persist_override,
        } => {
            let env = build_env(&config).await?;
            let summary = analyze_document(
                &env,
                doc_id,
                &profile,
                temperature,
                parse_icl(&icl)?,
                persist_override,
            )
            .await?;
            print_json(&summary, true)?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

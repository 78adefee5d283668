// src/tasks/mod.rs
// Task entry points: one-shot sentiment analysis, document ingestion, and
// whole-document analysis
//
// Tasks are the pipeline's callers: they check the persisted cache before
// spending a provider call, resolve a profile into a client, and convert a
// soft validation miss into a caller-facing error.

pub mod prompts;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::config::ProfileStore;
use crate::db::{
    DatabasePool, DocumentRecord, SentenceRecord, SentimentOutput, documents, sentiments,
};
use crate::error::{Result, SentiraError};
use crate::hooks::HookRegistry;
use crate::llm::{AdapterFactory, LlmClient, Message, OutputSchema, RequestContext};
use crate::utils::{content_fingerprint, split_sentences};
use self::prompts::{IclMode, build_sentiment_prompt};

/// Everything tasks need to run: the store, profile configuration, the hook
/// registry, and adapter construction.
pub struct TaskEnv {
    pub pool: Arc<DatabasePool>,
    pub profiles: ProfileStore,
    pub hooks: HookRegistry,
    pub adapters: AdapterFactory,
}

/// Parameters for one sentiment analysis
#[derive(Debug, Clone)]
pub struct SentimentRequest {
    pub text: String,
    pub profile: String,
    pub temperature: Option<f32>,
    pub icl: IclMode,
    pub sentence_id: Option<i64>,
    pub persist_override: bool,
}

/// Whether the result came from the store or a fresh provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Cached,
    Created,
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cached => f.write_str("cached"),
            Self::Created => f.write_str("created"),
        }
    }
}

/// Result of one sentiment analysis
#[derive(Debug, Clone, Serialize)]
pub struct SentimentAnalysis {
    #[serde(flatten)]
    pub output: SentimentOutput,
    pub status: AnalysisStatus,
}

/// Analyze one piece of text, reusing a persisted result when it exists.
pub async fn run_sentiment_analysis(
    env: &TaskEnv,
    request: SentimentRequest,
) -> Result<SentimentAnalysis> {
    if let Some(t) = request.temperature {
        if !(0.0..=1.0).contains(&t) {
            return Err(SentiraError::InvalidInput(format!(
                "temperature {t} outside [0,1]"
            )));
        }
    }
    let fingerprint = content_fingerprint(&request.text);

    // Cache check happens before any resolution or provider work
    if let Some(sentence_id) = request.sentence_id {
        ensure_sentence_exists(&env.pool, sentence_id).await?;
        if !request.persist_override {
            if let Some(output) = cached_result(&env.pool, sentence_id, &fingerprint).await? {
                info!(sentence_id, "Existing sentiment analysis found, skipping re-analysis");
                return Ok(SentimentAnalysis {
                    output,
                    status: AnalysisStatus::Cached,
                });
            }
        }
    }

    let client = LlmClient::resolve(&request.profile, &env.profiles, &env.hooks, &env.adapters)?;
    analyze_with_client(&client, request, fingerprint).await
}

/// Look up a complete persisted result for (sentence, fingerprint).
async fn cached_result(
    pool: &DatabasePool,
    sentence_id: i64,
    fingerprint: &str,
) -> Result<Option<SentimentOutput>> {
    let fp = fingerprint.to_string();
    let existing = pool
        .interact(move |conn| sentiments::find_by_fingerprint(conn, sentence_id, &fp))
        .await?;
    Ok(existing.and_then(|record| record.output()))
}

async fn ensure_sentence_exists(pool: &DatabasePool, sentence_id: i64) -> Result<()> {
    let found = pool
        .interact(move |conn| documents::get_sentence(conn, sentence_id))
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(SentiraError::SentenceNotFound(sentence_id)),
    }
}

/// Run the pipeline for one text with an already-resolved client. Persistence
/// happens through the profile's after-hooks; a soft validation miss becomes
/// `OutputNotParseable` at this boundary.
async fn analyze_with_client(
    client: &LlmClient,
    request: SentimentRequest,
    fingerprint: String,
) -> Result<SentimentAnalysis> {
    let prompt = build_sentiment_prompt(&request.text, request.icl);
    let ctx = RequestContext::new("sentiment_analysis", vec![Message::user(prompt)])
        .with_schema(OutputSchema::of::<SentimentOutput>("SentimentOutput"))
        .with_temperature(request.temperature)
        .with_subject(request.text.clone(), request.sentence_id, fingerprint)
        .with_persist_override(request.persist_override);

    let ctx = client.execute(ctx).await?;
    let parsed = ctx.parsed.ok_or(SentiraError::OutputNotParseable)?;
    let output: SentimentOutput = serde_json::from_value(parsed)?;
    Ok(SentimentAnalysis {
        output,
        status: AnalysisStatus::Created,
    })
}

/// A document as supplied to ingestion (e.g. parsed from a JSON file)
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    pub title: String,
    pub content: String,
    #[serde(default = "default_doc_type")]
    pub doc_type: String,
    pub document_date: Option<String>,
}

fn default_doc_type() -> String {
    "other".to_string()
}

const DOC_TYPES: &[&str] = &["report", "news_article", "research_paper", "sentence", "other"];

/// An ingested document with its split sentences
#[derive(Debug)]
pub struct IngestedDocument {
    pub document: DocumentRecord,
    pub created: bool,
    pub sentences: Vec<SentenceRecord>,
}

/// Ingest a document: get-or-create by content hash, split into sentences,
/// and store them. Re-ingesting identical content is a no-op beyond the
/// lookup.
pub async fn add_document(pool: &DatabasePool, input: DocumentInput) -> Result<IngestedDocument> {
    if input.title.trim().is_empty() || input.content.trim().is_empty() {
        return Err(SentiraError::InvalidInput(
            "document requires non-empty title and content".into(),
        ));
    }
    if !DOC_TYPES.contains(&input.doc_type.as_str()) {
        return Err(SentiraError::InvalidInput(format!(
            "invalid doc_type '{}', expected one of: {}",
            input.doc_type,
            DOC_TYPES.join(", ")
        )));
    }

    let (document, created, sentences) = pool
        .interact(move |conn| {
            let (document, created) = documents::get_or_create_document(
                conn,
                &input.title,
                &input.content,
                &input.doc_type,
                input.document_date.as_deref(),
            )?;
            let split = split_sentences(&input.content);
            let sentences = documents::insert_sentences(conn, document.id, &split)?;
            Ok((document, created, sentences))
        })
        .await?;

    info!(
        doc_id = document.id,
        created,
        sentence_count = sentences.len(),
        "Document ingested"
    );
    Ok(IngestedDocument {
        document,
        created,
        sentences,
    })
}

/// Outcome of analyzing every sentence of a document
#[derive(Debug, Serialize)]
pub struct DocumentAnalysis {
    pub doc_id: i64,
    pub analyzed: usize,
    pub cached: usize,
    pub failed: usize,
}

/// Analyze all sentences of a stored document with one resolved client.
/// Unparseable outputs are counted, not fatal; everything else aborts.
pub async fn analyze_document(
    env: &TaskEnv,
    doc_id: i64,
    profile: &str,
    temperature: Option<f32>,
    icl: IclMode,
    persist_override: bool,
) -> Result<DocumentAnalysis> {
    let document = env
        .pool
        .interact(move |conn| documents::get_document(conn, doc_id))
        .await?
        .ok_or(SentiraError::DocumentNotFound(doc_id))?;

    let sentences = env
        .pool
        .interact(move |conn| documents::sentences_for_document(conn, doc_id))
        .await?;

    let client = LlmClient::resolve(profile, &env.profiles, &env.hooks, &env.adapters)?;

    let mut summary = DocumentAnalysis {
        doc_id: document.id,
        analyzed: 0,
        cached: 0,
        failed: 0,
    };

    for sentence in sentences {
        let fingerprint = sentence.text_hash.clone();
        if !persist_override {
            if let Some(_output) = cached_result(&env.pool, sentence.id, &fingerprint).await? {
                summary.cached += 1;
                continue;
            }
        }

        let request = SentimentRequest {
            text: sentence.text.clone(),
            profile: profile.to_string(),
            temperature,
            icl,
            sentence_id: Some(sentence.id),
            persist_override,
        };
        match analyze_with_client(&client, request, fingerprint).await {
            Ok(_) => summary.analyzed += 1,
            Err(SentiraError::OutputNotParseable) => summary.failed += 1,
            Err(other) => return Err(other),
        }
    }

    info!(
        doc_id = summary.doc_id,
        analyzed = summary.analyzed,
        cached = summary.cached,
        failed = summary.failed,
        "Document analysis finished"
    );
    Ok(summary)
}

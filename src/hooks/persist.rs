// src/hooks/persist.rs
// Persistence hook: upserts the validated sentiment for the context's
// (sentence, fingerprint) pair
//
// Skips quietly when the context lacks a parent, fingerprint, or parsed
// result, since not every request through the pipeline persists. Store failures
// are real observer failures and propagate, aborting the after-phase.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{Hook, HookError};
use crate::db::{DatabasePool, SentimentOutput, sentiments};
use crate::llm::RequestContext;

pub struct PersistHook {
    pool: Arc<DatabasePool>,
}

impl PersistHook {
    pub fn new(pool: Arc<DatabasePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Hook for PersistHook {
    fn name(&self) -> &'static str {
        "persist"
    }

    async fn call(&self, ctx: &mut RequestContext) -> Result<(), HookError> {
        let (Some(sentence_id), Some(fingerprint), Some(parsed)) =
            (ctx.parent_id, ctx.fingerprint.clone(), ctx.parsed.clone())
        else {
            debug!(trace_id = %ctx.trace_id, "Persist hook skipped: missing required data");
            return Ok(());
        };

        let output: SentimentOutput = serde_json::from_value(parsed)
            .map_err(|e| HookError::Other(format!("parsed output is not a sentiment: {e}")))?;

        let persist_override = ctx.persist_override;
        let (record, status) = self
            .pool
            .interact(move |conn| {
                sentiments::upsert_sentiment(
                    conn,
                    sentence_id,
                    &fingerprint,
                    &output,
                    persist_override,
                )
            })
            .await?;

        info!(
            trace_id = %ctx.trace_id,
            sentence_id,
            record_id = record.id,
            revision = record.revision,
            %status,
            "Sentiment persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::documents::{get_or_create_document, insert_sentences};
    use crate::llm::Message;
    use crate::utils::content_fingerprint;

    async fn seeded_pool() -> (Arc<DatabasePool>, i64) {
        let pool = Arc::new(DatabasePool::open_in_memory().await.unwrap());
        let sentence_id = pool
            .interact(|conn| {
                let (doc, _) =
                    get_or_create_document(conn, "t", "I love this!", "other", None)?;
                let sentences = insert_sentences(conn, doc.id, &["I love this!".to_string()])?;
                Ok(sentences[0].id)
            })
            .await
            .unwrap();
        (pool, sentence_id)
    }

    fn parsed_ctx(sentence_id: i64) -> RequestContext {
        let mut ctx = RequestContext::new("sentiment_analysis", vec![Message::user("x")])
            .with_subject("I love this!", Some(sentence_id), content_fingerprint("I love this!"));
        ctx.parsed = Some(serde_json::json!({"sentiment": "positive", "confidence": 0.95}));
        ctx
    }

    #[tokio::test]
    async fn test_persists_parsed_sentiment() {
        let (pool, sentence_id) = seeded_pool().await;
        let hook = PersistHook::new(pool.clone());

        let mut ctx = parsed_ctx(sentence_id);
        hook.call(&mut ctx).await.unwrap();

        let hash = content_fingerprint("I love this!");
        let record = pool
            .interact(move |conn| sentiments::find_by_fingerprint(conn, sentence_id, &hash))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.revision, 1);
        assert!(record.is_complete());
    }

    #[tokio::test]
    async fn test_skips_without_parsed_result() {
        let (pool, sentence_id) = seeded_pool().await;
        let hook = PersistHook::new(pool.clone());

        let mut ctx = parsed_ctx(sentence_id);
        ctx.parsed = None;
        hook.call(&mut ctx).await.unwrap();

        let hash = content_fingerprint("I love this!");
        let record = pool
            .interact(move |conn| sentiments::find_by_fingerprint(conn, sentence_id, &hash))
            .await
            .unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_wrong_shape_parsed_is_an_error() {
        let (pool, sentence_id) = seeded_pool().await;
        let hook = PersistHook::new(pool);

        let mut ctx = parsed_ctx(sentence_id);
        ctx.parsed = Some(serde_json::json!({"unexpected": true}));
        let err = hook.call(&mut ctx).await.unwrap_err();
        assert!(matches!(err, HookError::Other(_)));
    }
}

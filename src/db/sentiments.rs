// src/db/sentiments.rs
// Sentiment analysis records: the fingerprint-keyed upsert
//
// One row per (sentence_id, text_hash). The UNIQUE constraint is the final
// arbiter for concurrent writers: the upsert inserts, catches the conflict if
// another writer won, and re-reads the winner's row instead of raising.

use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::documents::is_unique_violation;

/// Sentiment classification labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated LLM output for one sentiment analysis
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SentimentOutput {
    pub sentiment: SentimentLabel,
    #[serde(deserialize_with = "unit_interval")]
    pub confidence: f32,
}

/// Reject confidence values outside [0,1] at deserialization time.
fn unit_interval<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f32::deserialize(deserializer)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(serde::de::Error::custom(format!(
            "confidence {value} outside [0,1]"
        )));
    }
    Ok(value)
}

/// A persisted sentiment analysis
#[derive(Debug, Clone)]
pub struct SentimentRecord {
    pub id: i64,
    pub sentence_id: i64,
    pub text_hash: String,
    pub sentiment: Option<SentimentLabel>,
    pub confidence: Option<f32>,
    pub revision: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl SentimentRecord {
    /// Whether this record already carries a result
    pub fn is_complete(&self) -> bool {
        self.sentiment.is_some()
    }

    /// The typed output stored in this record, when complete
    pub fn output(&self) -> Option<SentimentOutput> {
        Some(SentimentOutput {
            sentiment: self.sentiment?,
            confidence: self.confidence.unwrap_or(0.0),
        })
    }
}

/// How an upsert resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStatus {
    /// A new row was inserted
    Created,
    /// An existing complete row was returned untouched
    Cached,
    /// An existing row was overwritten (override, or it was incomplete)
    Updated,
}

impl fmt::Display for UpsertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Cached => "cached",
            Self::Updated => "updated",
        };
        f.write_str(s)
    }
}

fn parse_sentiment_row(row: &rusqlite::Row) -> rusqlite::Result<SentimentRecord> {
    let label: Option<String> = row.get(3)?;
    Ok(SentimentRecord {
        id: row.get(0)?,
        sentence_id: row.get(1)?,
        text_hash: row.get(2)?,
        sentiment: label.as_deref().and_then(SentimentLabel::parse),
        confidence: row.get(4)?,
        revision: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const COLS: &str = "id, sentence_id, text_hash, sentiment, confidence, revision, created_at, updated_at";

/// Look up the record for a (sentence, fingerprint) pair
pub fn find_by_fingerprint(
    conn: &Connection,
    sentence_id: i64,
    text_hash: &str,
) -> Result<Option<SentimentRecord>> {
    let sql = format!("SELECT {COLS} FROM sentiments WHERE sentence_id = ?1 AND text_hash = ?2");
    conn.query_row(&sql, params![sentence_id, text_hash], parse_sentiment_row)
        .optional()
        .map_err(Into::into)
}

/// Insert-or-update one sentiment analysis, keyed by (sentence_id, text_hash).
///
/// - absent: insert with revision 1; a concurrent winner's UNIQUE violation is
///   caught and resolved by re-reading, then reconciling as "present"
/// - present, complete, no override: return untouched with `Cached`
/// - present with override, or incomplete: overwrite, bump revision, stamp
///   updated_at
pub fn upsert_sentiment(
    conn: &Connection,
    sentence_id: i64,
    text_hash: &str,
    output: &SentimentOutput,
    persist_override: bool,
) -> Result<(SentimentRecord, UpsertStatus)> {
    let existing = match find_by_fingerprint(conn, sentence_id, text_hash)? {
        Some(record) => Some(record),
        None => match try_insert(conn, sentence_id, text_hash, output)? {
            Some(record) => return Ok((record, UpsertStatus::Created)),
            // Lost the race: the row exists now, reconcile below
            None => find_by_fingerprint(conn, sentence_id, text_hash)?,
        },
    };

    let existing = existing.ok_or_else(|| {
        anyhow!("sentiment for sentence {sentence_id} not found after unique violation")
    })?;

    if existing.is_complete() && !persist_override {
        return Ok((existing, UpsertStatus::Cached));
    }

    update_result(conn, &existing, output)?;
    let updated = find_by_fingerprint(conn, sentence_id, text_hash)?
        .ok_or_else(|| anyhow!("sentiment {} vanished during update", existing.id))?;
    Ok((updated, UpsertStatus::Updated))
}

/// Try the insert; `Ok(None)` means a concurrent writer won the UNIQUE race.
fn try_insert(
    conn: &Connection,
    sentence_id: i64,
    text_hash: &str,
    output: &SentimentOutput,
) -> Result<Option<SentimentRecord>> {
    let inserted = conn.execute(
        "INSERT INTO sentiments (sentence_id, text_hash, sentiment, confidence) \
         VALUES (?1, ?2, ?3, ?4)",
        params![
            sentence_id,
            text_hash,
            output.sentiment.as_str(),
            output.confidence
        ],
    );
    match inserted {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            let sql = format!("SELECT {COLS} FROM sentiments WHERE id = ?1");
            let record = conn.query_row(&sql, params![id], parse_sentiment_row)?;
            Ok(Some(record))
        }
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn update_result(
    conn: &Connection,
    existing: &SentimentRecord,
    output: &SentimentOutput,
) -> Result<()> {
    conn.execute(
        "UPDATE sentiments SET sentiment = ?1, confidence = ?2, revision = revision + 1, \
         updated_at = datetime('now') WHERE id = ?3",
        params![output.sentiment.as_str(), output.confidence, existing.id],
    )?;
    Ok(())
}

// src/db/schema.rs
// Database schema
//
// Idempotent: every statement is IF NOT EXISTS, so re-running at open is
// safe. The UNIQUE constraints here are load-bearing: they are the final
// arbiter for concurrent upserts (documents by content hash, sentiments by
// (sentence_id, text_hash)).

use anyhow::Result;
use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    doc_type TEXT NOT NULL DEFAULT 'other',
    content_hash TEXT NOT NULL UNIQUE,
    document_date TEXT,
    added_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS sentences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_id INTEGER NOT NULL REFERENCES documents(id),
    position INTEGER NOT NULL,
    text TEXT NOT NULL,
    text_hash TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(doc_id, text_hash)
);
CREATE INDEX IF NOT EXISTS idx_sentences_doc ON sentences(doc_id);

CREATE TABLE IF NOT EXISTS sentiments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sentence_id INTEGER NOT NULL REFERENCES sentences(id),
    text_hash TEXT NOT NULL,
    sentiment TEXT,
    confidence REAL,
    revision INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(sentence_id, text_hash)
);
";

/// Run schema setup. Called during pool initialization.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

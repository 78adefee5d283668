// src/db/documents.rs
// Document and sentence storage
//
// Documents are content-addressed: ingest looks a document up by its content
// hash before creating one, so re-ingesting identical source material never
// produces duplicate parents. Sentences carry their own (doc_id, text_hash)
// uniqueness so re-splitting a document is a no-op.

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::utils::content_fingerprint;

/// A stored source document
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub doc_type: String,
    pub content_hash: String,
    pub document_date: Option<String>,
    pub added_at: String,
}

/// One sentence of a document
#[derive(Debug, Clone)]
pub struct SentenceRecord {
    pub id: i64,
    pub doc_id: i64,
    pub position: i64,
    pub text: String,
    pub text_hash: String,
}

/// Parse DocumentRecord from a row with standard column order:
/// (id, title, content, doc_type, content_hash, document_date, added_at)
fn parse_document_row(row: &rusqlite::Row) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        doc_type: row.get(3)?,
        content_hash: row.get(4)?,
        document_date: row.get(5)?,
        added_at: row.get(6)?,
    })
}

fn parse_sentence_row(row: &rusqlite::Row) -> rusqlite::Result<SentenceRecord> {
    Ok(SentenceRecord {
        id: row.get(0)?,
        doc_id: row.get(1)?,
        position: row.get(2)?,
        text: row.get(3)?,
        text_hash: row.get(4)?,
    })
}

const DOCUMENT_COLS: &str = "id, title, content, doc_type, content_hash, document_date, added_at";
const SENTENCE_COLS: &str = "id, doc_id, position, text, text_hash";

/// Find a document by its content hash
pub fn find_document_by_hash(conn: &Connection, content_hash: &str) -> Result<Option<DocumentRecord>> {
    let sql = format!("SELECT {DOCUMENT_COLS} FROM documents WHERE content_hash = ?1");
    conn.query_row(&sql, params![content_hash], parse_document_row)
        .optional()
        .map_err(Into::into)
}

/// Get a document by id
pub fn get_document(conn: &Connection, id: i64) -> Result<Option<DocumentRecord>> {
    let sql = format!("SELECT {DOCUMENT_COLS} FROM documents WHERE id = ?1");
    conn.query_row(&sql, params![id], parse_document_row)
        .optional()
        .map_err(Into::into)
}

/// Insert a document or return the existing one with identical content.
///
/// Returns (record, created). The hash lookup runs first to skip the insert;
/// the UNIQUE constraint settles races; a conflicting concurrent insert is
/// caught and resolved by re-reading the winner's row.
pub fn get_or_create_document(
    conn: &Connection,
    title: &str,
    content: &str,
    doc_type: &str,
    document_date: Option<&str>,
) -> Result<(DocumentRecord, bool)> {
    let content_hash = content_fingerprint(content);

    if let Some(existing) = find_document_by_hash(conn, &content_hash)? {
        return Ok((existing, false));
    }

    let inserted = conn.execute(
        "INSERT INTO documents (title, content, doc_type, content_hash, document_date) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![title, content, doc_type, content_hash, document_date],
    );

    match inserted {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            let record = get_document(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("document {id} vanished after insert"))?;
            Ok((record, true))
        }
        Err(err) if is_unique_violation(&err) => {
            // Concurrent writer won the race; their row is ours now
            let record = find_document_by_hash(conn, &content_hash)?.ok_or_else(|| {
                anyhow::anyhow!("conflicting document not found after unique violation")
            })?;
            Ok((record, false))
        }
        Err(err) => Err(err.into()),
    }
}

/// Insert a document's sentences in order, skipping ones already stored.
/// Returns all sentences of the document, in position order.
pub fn insert_sentences(
    conn: &mut Connection,
    doc_id: i64,
    sentences: &[String],
) -> Result<Vec<SentenceRecord>> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO sentences (doc_id, position, text, text_hash) \
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (position, text) in sentences.iter().enumerate() {
            stmt.execute(params![
                doc_id,
                position as i64,
                text,
                content_fingerprint(text)
            ])?;
        }
    }
    tx.commit()?;
    sentences_for_document(conn, doc_id)
}

/// All sentences of a document, in position order
pub fn sentences_for_document(conn: &Connection, doc_id: i64) -> Result<Vec<SentenceRecord>> {
    let sql = format!("SELECT {SENTENCE_COLS} FROM sentences WHERE doc_id = ?1 ORDER BY position");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![doc_id], parse_sentence_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Get a sentence by id
pub fn get_sentence(conn: &Connection, id: i64) -> Result<Option<SentenceRecord>> {
    let sql = format!("SELECT {SENTENCE_COLS} FROM sentences WHERE id = ?1");
    conn.query_row(&sql, params![id], parse_sentence_row)
        .optional()
        .map_err(Into::into)
}

/// Check if a rusqlite error is a UNIQUE (or primary key) constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    use rusqlite::ffi;
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

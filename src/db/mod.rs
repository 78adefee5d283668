// src/db/mod.rs
// SQLite persistence: pooled access, schema, and the fingerprint-keyed repos

pub mod documents;
pub mod pool;
pub mod schema;
pub mod sentiments;

pub use documents::{DocumentRecord, SentenceRecord};
pub use pool::DatabasePool;
pub use sentiments::{SentimentLabel, SentimentOutput, SentimentRecord, UpsertStatus};

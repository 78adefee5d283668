// src/utils.rs
// Small shared helpers: content fingerprints, sentence splitting, previews

use sha2::{Digest, Sha256};

/// Compute the content fingerprint of a piece of text.
///
/// The text is canonicalized (trimmed, internal whitespace runs collapsed)
/// before hashing so that incidental formatting differences don't produce
/// distinct fingerprints for the same logical content.
pub fn content_fingerprint(text: &str) -> String {
    let canonical = canonicalize(text);
    let digest = Sha256::digest(canonical.as_bytes());
    hex_encode(&digest)
}

fn canonicalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Split text into sentences on terminal punctuation and blank lines.
///
/// This is a deliberately simple splitter: a sentence ends at `.`, `!` or `?`
/// followed by whitespace, or at a newline. Abbreviation handling is out of
/// scope for document ingestion.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            push_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            if let Some(next) = chars.peek() {
                if next.is_whitespace() {
                    push_sentence(&mut sentences, &mut current);
                }
            }
        }
    }
    push_sentence(&mut sentences, &mut current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

/// Truncate a string for log previews, respecting char boundaries.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

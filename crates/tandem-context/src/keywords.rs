//! Query tokenization for the gather phase.
//!
//! Turns a free-text user query into search keywords: lowercase, strip
//! punctuation (path characters survive), drop stop words in English and
//! Spanish, dedupe in order. Generic action verbs are dropped whenever a
//! more specific keyword remains, so "explain src/index.ts" searches for
//! the path, not for "explain".

use std::collections::HashSet;

/// English + Spanish stop words removed before searching.
const STOP_WORDS: &[&str] = &[
    // English
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "to", "of", "in", "on",
    "at", "for", "with", "and", "or", "but", "not", "this", "that", "these", "those", "it", "its",
    "as", "by", "from", "do", "does", "did", "can", "could", "should", "would", "will", "i",
    "you", "we", "they", "he", "she", "my", "your", "our", "their", "me", "all", "please",
    "about", "what", "how", "why", "where", "when",
    // Spanish
    "el", "la", "los", "las", "un", "una", "unos", "unas", "es", "son", "era", "de", "del", "en",
    "y", "o", "pero", "no", "que", "como", "por", "para", "con", "se", "su", "sus", "al", "lo",
    "este", "esta", "estos", "estas", "mi", "tu", "te", "favor",
];

/// Generic request verbs, dropped when anything more specific survives.
const ACTION_VERBS: &[&str] = &[
    // English
    "explain", "find", "show", "describe", "list", "tell", "give", "get", "look", "search",
    "check", "display", "refactor", "fix", "update",
    // Spanish
    "explica", "explicar", "muestra", "mostrar", "busca", "buscar", "encuentra", "encontrar",
    "lista", "listar", "dime", "dame", "ver", "arregla", "corrige",
];

/// Extract search keywords from a free-text query.
#[must_use]
pub fn extract_keywords(query: &str) -> Vec<String> {
    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    let verbs: HashSet<&str> = ACTION_VERBS.iter().copied().collect();

    let mut seen = HashSet::new();
    let mut keywords = Vec::new();
    for raw in query.to_lowercase().split_whitespace() {
        let token = strip_punctuation(raw);
        if token.is_empty() || stop.contains(token) {
            continue;
        }
        if seen.insert(token.to_owned()) {
            keywords.push(token.to_owned());
        }
    }

    // Keep action verbs only when nothing more specific survived.
    let specific: Vec<String> = keywords
        .iter()
        .filter(|k| !verbs.contains(k.as_str()))
        .cloned()
        .collect();
    if specific.is_empty() { keywords } else { specific }
}

/// Trim leading/trailing punctuation, preserving path-like characters
/// (`/`, `.`, `_`, `-`) inside the token.
fn strip_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric() && !matches!(c, '/' | '.' | '_' | '-'))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

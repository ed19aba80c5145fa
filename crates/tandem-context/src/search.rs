//! Search collaborator interface and output parsing.
//!
//! The orchestrator does not run searches itself; it hands a keyword string
//! to an external [`SearchCollaborator`] and parses whatever text comes
//! back. Tools differ, so parsing falls through several formats per line:
//! JSON, `path (N matches)`, ripgrep `path:line:text`, and finally a bare
//! path.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::errors::ContextError;

/// External search interface consumed by the orchestrator.
#[async_trait]
pub trait SearchCollaborator: Send + Sync {
    /// Run a search and return a text listing of matched paths/snippets.
    async fn search(&self, query: &str, max_results: usize) -> Result<String, ContextError>;
}

#[allow(clippy::unwrap_used)]
static MATCH_COUNT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s+\(\d+\s+match(?:es)?\)$").unwrap());

#[allow(clippy::unwrap_used)]
static GREP_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([^:\s]+):\d+:").unwrap());

/// Parse search output into distinct file paths, in discovery order.
#[must_use]
pub fn parse_search_output(output: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(path) = parse_line(line) {
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        }
    }
    paths
}

fn parse_line(line: &str) -> Option<String> {
    // JSON line: {"path": "..."} or {"file": "..."}
    if line.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
            for key in ["path", "file"] {
                if let Some(path) = value.get(key).and_then(|v| v.as_str()) {
                    return Some(path.to_owned());
                }
            }
        }
        return None;
    }

    // "path (N matches)"
    if let Some(caps) = MATCH_COUNT_LINE.captures(line) {
        return Some(caps[1].to_owned());
    }

    // ripgrep "path:line:text"
    if let Some(caps) = GREP_LINE.captures(line) {
        return Some(caps[1].to_owned());
    }

    // Bare path: no internal whitespace, path-shaped
    if !line.contains(char::is_whitespace) && (line.contains('/') || line.contains('.')) {
        return Some(line.to_owned());
    }

    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

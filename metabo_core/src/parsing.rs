//! Parsing of free-form collaborator output into structured values.
//!
//! Collaborators answer in loosely formatted text: JSON wrapped in markdown
//! fences, Python-style tuple lists, or bullet lines. The functions here pull
//! out what can be trusted and return `None` when nothing can.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::knowledge_base::Triple;

/// Default cap on triples taken from a single response.
pub const MAX_TRIPLES: usize = 10;

/// Runs of the same triple longer than this are reported as degenerate output.
const REPETITION_WARN_RUN: usize = 3;

static JSON_SNIPPET: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}|\[.*\]").ok());

static LIST_SNIPPET: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").ok());

static QUOTED_TRIPLE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"[\(\[]\s*['"]([^'"]*)['"]\s*,\s*['"]([^'"]*)['"]\s*,\s*['"]([^'"]*)['"]\s*[\)\]]"#,
    )
    .ok()
});

static LIST_ITEM: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+)$").ok());

static UNQUOTED_SEPARATOR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[\]\)]\s*[,\n]\s*[\[\(]").ok());

/// Remove a surrounding markdown code fence, including its language tag.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !(trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() >= 6) {
        return trimmed;
    }
    let inner = &trimmed[3..trimmed.len() - 3];
    match inner.find('\n') {
        Some(newline) => inner[newline + 1..].trim(),
        None => inner.trim(),
    }
}

/// Parse JSON from a collaborator response.
///
/// Strips code fences, then tries the whole text and finally the first
/// object- or array-shaped span.
pub fn parse_json_safe(text: &str) -> Option<Value> {
    let stripped = strip_code_fence(text);
    if let Ok(value) = serde_json::from_str(stripped) {
        return Some(value);
    }
    let snippet = JSON_SNIPPET.as_ref()?.find(stripped)?;
    serde_json::from_str(snippet.as_str()).ok()
}

/// Parse a list of triples from raw text.
///
/// Accepts JSON arrays of 3-element arrays or `{subject, relation, object}`
/// objects, Python-style lists of quoted tuples, and bracketed lists of
/// unquoted triples. Returns `None` if the text has no recognizable list.
pub fn parse_triples(text: &str) -> Option<Vec<Triple>> {
    let stripped = strip_code_fence(text);

    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        if let Some(triples) = triples_from_json(&value) {
            return Some(triples);
        }
    }

    let snippet = LIST_SNIPPET
        .as_ref()
        .and_then(|re| re.find(stripped))
        .map(|m| m.as_str());

    if let Some(snippet) = snippet {
        if let Some(triples) = serde_json::from_str::<Value>(snippet)
            .ok()
            .and_then(|v| triples_from_json(&v))
        {
            return Some(triples);
        }
    }

    let quoted = quoted_triples(snippet.unwrap_or(stripped));
    if !quoted.is_empty() {
        return Some(quoted);
    }

    parse_unquoted(snippet.unwrap_or(stripped))
}

/// Parse, de-duplicate in order, and cap a list of triples.
pub fn extract_triples(text: &str, max: usize) -> Vec<Triple> {
    let Some(triples) = parse_triples(text) else {
        log::info!("[parsing] No triples extracted");
        return Vec::new();
    };
    dedup_triples(triples, max)
}

/// De-duplicate `triples` keeping first occurrences, then cap at `max`.
///
/// Runs of one triple repeated more than three times in a row are logged as
/// a warning since they usually mean the collaborator got stuck.
pub fn dedup_triples(triples: Vec<Triple>, max: usize) -> Vec<Triple> {
    let mut run = 1;
    for pair in triples.windows(2) {
        if pair[0] == pair[1] {
            run += 1;
            if run == REPETITION_WARN_RUN + 1 {
                log::warn!("[parsing] Repeated triple: {}", pair[1]);
            }
        } else {
            run = 1;
        }
    }

    let mut unique: Vec<Triple> = Vec::with_capacity(triples.len());
    for triple in triples {
        if !unique.contains(&triple) {
            unique.push(triple);
        }
    }

    if unique.len() > max {
        log::info!("[parsing] Limiting to {} triples", max);
        unique.truncate(max);
    }
    unique
}

/// Parse 2 to 5 subgoals from a JSON string list or list-item lines.
///
/// List items start with `-`, `*`, `•`, or a number followed by `.` or `)`.
/// Lines without a marker are ignored. Returns an empty list when the text
/// holds neither form.
pub fn parse_subgoals(text: &str) -> Vec<String> {
    if let Some(Value::Array(items)) = parse_json_safe(text) {
        if items.iter().all(Value::is_string) {
            return items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    let Some(item) = LIST_ITEM.as_ref() else {
        return Vec::new();
    };
    let lines: Vec<String> = text
        .lines()
        .filter_map(|line| item.captures(line))
        .map(|caps| caps[1].trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    if (2..=5).contains(&lines.len()) {
        lines
    } else {
        Vec::new()
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn triples_from_json(value: &Value) -> Option<Vec<Triple>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("triples").or_else(|| map.get("facts")) {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };

    let triples = items
        .iter()
        .filter_map(|item| match item {
            Value::Array(parts) if parts.len() == 3 => Some(Triple::new(
                value_text(&parts[0]),
                value_text(&parts[1]),
                value_text(&parts[2]),
            )),
            Value::Object(map) => {
                let subject = map.get("subject")?;
                let relation = map.get("relation").or_else(|| map.get("predicate"))?;
                let object = map.get("object")?;
                Some(Triple::new(
                    value_text(subject),
                    value_text(relation),
                    value_text(object),
                ))
            }
            _ => None,
        })
        .collect();
    Some(triples)
}

fn quoted_triples(text: &str) -> Vec<Triple> {
    let Some(re) = QUOTED_TRIPLE.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .map(|caps| Triple::new(caps[1].trim(), caps[2].trim(), caps[3].trim()))
        .collect()
}

fn parse_unquoted(text: &str) -> Option<Vec<Triple>> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
        return None;
    }
    let inner = trimmed[1..trimmed.len() - 1].trim();
    let segments: Vec<&str> = match UNQUOTED_SEPARATOR.as_ref() {
        Some(re) => re.split(inner).collect(),
        None => vec![inner],
    };

    let mut triples = Vec::new();
    for segment in segments {
        let segment = segment.trim().trim_matches(|c: char| "[]()".contains(c));
        if segment.is_empty() {
            continue;
        }
        let parts: Vec<&str> = segment
            .split(',')
            .map(|p| p.trim_matches(|c: char| " '\"".contains(c)))
            .collect();
        if parts.len() != 3 {
            return None;
        }
        triples.push(Triple::new(parts[0], parts[1], parts[2]));
    }
    Some(triples)
}

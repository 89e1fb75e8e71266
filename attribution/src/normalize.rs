//! Text passes that turn one raw query line into the candidate statements
//! the attributor classifies.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::dictionary::Dictionaries;

static SET_OPERATORS: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\b(?:union\s+all|union|all|and|partitions)\b"));
static AGGREGATE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\b(?:sum|min|max|avg|if)\s*\(|\bif\s+"));
static SCHEMA_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\b(?:dcpublic|dcbo|dc|dim)\."));

pub(crate) fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        // Every pattern is exercised by the unit tests.
        Err(err) => panic!("invalid regex pattern `{pattern}`: {err}"),
    }
}

/// One SELECT statement cut out of a query line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCandidate {
    /// The lower-cased slice of the original line.
    pub raw: String,
    /// `raw` with quoting, schema prefixes and aggregation noise removed.
    pub normalized: String,
}

/// Split a lower-cased line into one slice per `select` occurrence, each
/// running up to the next occurrence. A line with at most one `select` is
/// returned whole.
pub fn split_candidates(line: &str) -> Vec<&str> {
    let starts: Vec<usize> = line.match_indices("select").map(|(idx, _)| idx).collect();
    if starts.len() <= 1 {
        return vec![line];
    }
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(line.len());
            line[start..end].trim()
        })
        .collect()
}

/// Remove quoting, schema prefixes, set operators, aggregate calls and
/// parentheses.
pub fn strip_noise(candidate: &str) -> String {
    let text = candidate.replace(['"', '\''], "");
    let text = SCHEMA_PREFIX.replace_all(&text, "");
    let text = AGGREGATE_OPEN.replace_all(&text, "");
    let text = SET_OPERATORS.replace_all(&text, "");
    let text = text.replace(['(', ')'], "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The prefix that identifies which table a candidate reads: everything up
/// to the end of the first word after `from` that names a table of
/// interest.
fn table_key<'a>(normalized: &'a str, dict: &Dictionaries) -> Option<&'a str> {
    let from = find_word(normalized, "from")?;
    let mut offset = from;
    for word in normalized[from..].split_inclusive(char::is_whitespace) {
        let end = offset + word.trim_end().len();
        let bare = word.trim().trim_matches(',');
        if dict.mentions_table(bare) {
            return Some(&normalized[..end]);
        }
        offset += word.len();
    }
    None
}

/// Normalize every candidate of `line` and drop candidates that do not read
/// a table of interest or repeat an already kept `select ... from <table>`.
pub fn candidates(line: &str, dict: &Dictionaries) -> Vec<QueryCandidate> {
    let lower = line.to_lowercase();
    let mut kept: Vec<QueryCandidate> = Vec::new();
    for raw in split_candidates(&lower) {
        let normalized = strip_noise(raw);
        let Some(key) = table_key(&normalized, dict) else {
            tracing::debug!("no table of interest in candidate: {normalized}");
            continue;
        };
        if kept.iter().any(|k| k.normalized.contains(key)) {
            tracing::debug!("dropping duplicate candidate: {normalized}");
            continue;
        }
        kept.push(QueryCandidate {
            raw: raw.to_string(),
            normalized,
        });
    }
    kept
}

/// Byte offset of the first occurrence of `word` delimited by non-word
/// characters.
pub(crate) fn find_word(text: &str, word: &str) -> Option<usize> {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    text.match_indices(word).map(|(idx, _)| idx).find(|&idx| {
        let before = text[..idx].chars().next_back();
        let after = text[idx + word.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

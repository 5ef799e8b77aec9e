//! Error Enrichment (§4.6): turns a raw, failed `ExecutionResult` into an
//! `ErrorContext` with a source-line anchor, available-name candidates, and
//! a single fuzzy suggestion.
//!
//! Grounded on `dasa.errors.enrichment.ErrorEnricher`; fuzzy matching is
//! longest-common-subsequence based (unlike the teacher's
//! `SuggestionEngine::levenshtein_distance` in `error/suggestions.rs`) to
//! match the source system's `difflib`-style cutoff semantics.

use crate::interpreter::{ExecutionResult, InterpreterSession};
use crate::profile::ColumnProfile;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

const SIMILARITY_CUTOFF: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct ErrorLine {
    pub line_number: usize,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub error_line: Option<ErrorLine>,
    pub available_names: Vec<String>,
    pub suggestion: Option<String>,
    pub install_hint: Option<String>,
}

fn line_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"line (\d+)").unwrap())
}

fn subscript_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*\[").unwrap())
}

/// Longest-common-subsequence length between two byte/char slices.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb { prev[j] + 1 } else { prev[j + 1].max(curr[j]) };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `difflib`-style similarity ratio: `2 * lcs / (len(a) + len(b))`.
fn similarity(a: &str, b: &str) -> f64 {
    let ca: Vec<char> = a.chars().collect();
    let cb: Vec<char> = b.chars().collect();
    if ca.is_empty() && cb.is_empty() {
        return 1.0;
    }
    let lcs = lcs_len(&ca, &cb);
    2.0 * lcs as f64 / (ca.len() + cb.len()) as f64
}

/// Picks the best candidate for `target` among `candidates`, if any clears
/// the similarity cutoff (spec: cutoff 0.5, n=1 — best single suggestion).
fn best_match<'a>(target: &str, candidates: impl Iterator<Item = &'a String>) -> Option<String> {
    candidates
        .map(|c| (c, similarity(target, c)))
        .filter(|(_, score)| *score >= SIMILARITY_CUTOFF)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(c, _)| c.clone())
}

fn find_error_line(traceback: &[String], source: &str) -> Option<ErrorLine> {
    let lines: Vec<&str> = source.lines().collect();
    for frame in traceback.iter().rev() {
        if let Some(cap) = line_number_re().captures(frame) {
            if let Ok(n) = cap[1].parse::<usize>() {
                if n >= 1 && n <= lines.len() {
                    return Some(ErrorLine {
                        line_number: n,
                        content: lines[n - 1].to_string(),
                    });
                }
            }
        }
    }
    None
}

fn extract_key_error_key(message: &str) -> Option<String> {
    message.trim().trim_matches('\'').trim_matches('"').split_whitespace().next().map(|s| {
        s.trim_matches(|c| c == '\'' || c == '"' || c == ':').to_string()
    })
}

fn extract_name_error_name(message: &str) -> Option<String> {
    let re = Regex::new(r"name '([^']+)' is not defined").ok()?;
    re.captures(message).map(|c| c[1].to_string())
}

fn extract_module_name(message: &str) -> Option<String> {
    let re = Regex::new(r"No module named '([^']+)'").ok()?;
    re.captures(message).map(|c| c[1].to_string())
}

fn subscripted_names(source: &str) -> Vec<String> {
    subscript_re().captures_iter(source).map(|c| c[1].to_string()).collect()
}

/// Given `profile_cache` (candidate-name → known column list), resolves
/// available columns without a live probe; falls back to the probe when the
/// cache has nothing for any candidate.
pub async fn enrich(
    result: &ExecutionResult,
    source: &str,
    profile_cache: &BTreeMap<String, Vec<String>>,
    session: Option<&mut dyn InterpreterSession>,
) -> ErrorContext {
    let mut ctx = ErrorContext::default();
    if result.success {
        return ctx;
    }

    ctx.error_line = find_error_line(&result.traceback_frames, source);

    match result.error_kind.as_deref() {
        Some("KeyError") => {
            let Some(message) = &result.error_message else { return ctx };
            let Some(missing_key) = extract_key_error_key(message) else { return ctx };
            let mut columns = None;
            for candidate in subscripted_names(source) {
                if let Some(cols) = profile_cache.get(&candidate) {
                    columns = Some(cols.clone());
                    break;
                }
            }
            if columns.is_none() {
                if let Some(session) = session {
                    if let Some(candidate) = subscripted_names(source).into_iter().next() {
                        columns = probe_columns(session, &candidate).await;
                    }
                }
            }
            if let Some(columns) = columns {
                ctx.suggestion = best_match(&missing_key, columns.iter());
                ctx.available_names = columns;
            }
        }
        Some("NameError") => {
            let Some(message) = &result.error_message else { return ctx };
            let Some(missing_name) = extract_name_error_name(message) else { return ctx };
            if let Some(session) = session {
                if let Some(names) = probe_identifiers(session).await {
                    ctx.suggestion = best_match(&missing_name, names.iter());
                    ctx.available_names = names;
                }
            }
        }
        Some("ModuleNotFoundError") => {
            if let Some(message) = &result.error_message {
                if let Some(module) = extract_module_name(message) {
                    ctx.install_hint = Some(format!("pip install {module}"));
                }
            }
        }
        Some("TypeError") | Some("ValueError") | Some("AttributeError") => {
            ctx.suggestion = Some("check variable types and values".to_string());
        }
        _ => {}
    }

    ctx
}

async fn probe_columns(session: &mut dyn InterpreterSession, variable: &str) -> Option<Vec<String>> {
    let probe = format!("list(getattr({variable}, 'columns', []))");
    let result = session.execute(&probe, Duration::from_secs(5)).await.ok()?;
    parse_name_list(result.display_value.as_deref())
}

async fn probe_identifiers(session: &mut dyn InterpreterSession) -> Option<Vec<String>> {
    let probe = "[n for n in dir() if not n.startswith('_')]".to_string();
    let result = session.execute(&probe, Duration::from_secs(5)).await.ok()?;
    parse_name_list(result.display_value.as_deref())
}

fn parse_name_list(raw: Option<&str>) -> Option<Vec<String>> {
    let raw = raw?;
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    Some(
        trimmed
            .split(',')
            .map(|s| s.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

/// Flattens a `ColumnProfile` list into the name list `enrich` expects from
/// the Profile Cache.
pub fn column_names(columns: &[ColumnProfile]) -> Vec<String> {
    columns.iter().map(|c| c.name.clone()).collect()
}

//! Structured-output extraction — coerces free-text model output into a
//! validated typed value.
//!
//! Models wrap JSON in markdown fences, chat around it, emit trailing commas,
//! or get cut off mid-array by the output-token cap. This module absorbs all
//! of that: isolate the JSON span, attempt a direct parse, and fall back to a
//! mechanical repair pass before giving up. Pure function over text — no
//! model calls, no I/O, never panics on malformed input.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Extraction failures. `Parse` and `Schema` are deliberately distinct: the
/// pipeline retries a schema mismatch with corrective feedback, while a
/// response with no parseable JSON at all moves straight to the next model.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unparseable model output: {0}")]
    Parse(String),

    #[error("schema mismatch: {0}")]
    Schema(String),
}

static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Extracts a `T` from raw model output.
pub fn extract<T: DeserializeOwned>(raw: &str) -> Result<T, ExtractionError> {
    let value = extract_value(raw)?;
    serde_json::from_value(value).map_err(|e| ExtractionError::Schema(e.to_string()))
}

/// Extracts the JSON value from raw model output, repairing if necessary.
pub fn extract_value(raw: &str) -> Result<Value, ExtractionError> {
    let candidate = isolate_json(raw);

    match serde_json::from_str(&candidate) {
        Ok(value) => Ok(value),
        Err(direct_err) => {
            let repaired = repair_json(&candidate);
            serde_json::from_str(&repaired)
                .map_err(|_| ExtractionError::Parse(direct_err.to_string()))
        }
    }
}

/// Picks the most plausible JSON span out of the raw response:
/// a fenced ```json block, else the first `{`-to-last-`}` span, else the
/// trimmed text as-is.
fn isolate_json(raw: &str) -> String {
    if let Some(inner) = fenced_block(raw) {
        return inner.to_string();
    }
    if let Some(span) = brace_span(raw) {
        return span.to_string();
    }
    raw.trim().to_string()
}

fn fenced_block(raw: &str) -> Option<&str> {
    let start = raw.find("```")?;
    let after = &raw[start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    let end = after.find("```")?;
    Some(after[..end].trim())
}

/// First `{` through the last `}`. When the response was truncated before the
/// closing brace, the span runs to the end of the text and repair closes it.
fn brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    match raw.rfind('}') {
        Some(end) if end > start => Some(&raw[start..=end]),
        _ => Some(raw[start..].trim_end()),
    }
}

/// Mechanical JSON repair:
/// 1. strip trailing commas before `}` / `]`
/// 2. if braces are unbalanced (more opens than closes), truncate back to the
///    last complete `}` — this drops a cut-off trailing entry
/// 3. re-close any still-unmatched `[` and `{`
/// 4. strip trailing commas again
fn repair_json(input: &str) -> String {
    let mut fixed = TRAILING_COMMA.replace_all(input, "$1").into_owned();

    if serde_json::from_str::<Value>(&fixed).is_ok() {
        return fixed;
    }

    let count = |s: &str, c: char| s.matches(c).count();

    if count(&fixed, '{') > count(&fixed, '}') {
        if let Some(last) = fixed.rfind('}') {
            fixed.truncate(last + 1);
        }
    }

    let missing_brackets = count(&fixed, '[').saturating_sub(count(&fixed, ']'));
    fixed.extend(std::iter::repeat(']').take(missing_brackets));
    let missing_braces = count(&fixed, '{').saturating_sub(count(&fixed, '}'));
    fixed.extend(std::iter::repeat('}').take(missing_braces));

    TRAILING_COMMA.replace_all(&fixed, "$1").into_owned()
}

//! Query synthesis and sanitization.
//!
//! Models wrap queries in markdown fences more often than not, even when
//! told not to. [`sanitize`] removes that wrapping; it does not look at the
//! query itself.

use std::time::Duration;
use tabletalk_db::Dialect;
use tabletalk_llm::{generate_within, LlmError, LlmProvider};
use tracing::debug;

use crate::catalog::SchemaCatalog;
use crate::prompts;

const FENCE: &str = "```";

/// Words that start a statement and so are never a fence tag.
const STATEMENT_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "EXPLAIN", "VALUES", "TABLE", "SHOW", "PRAGMA", "INSERT", "UPDATE",
    "DELETE", "CREATE", "DROP", "ALTER",
];

/// Generated query text before and after sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    pub raw: String,
    pub sanitized: String,
}

impl CandidateQuery {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let sanitized = sanitize(&raw);
        Self { raw, sanitized }
    }
}

/// Strip fenced-code markup and surrounding whitespace.
///
/// Removes an opening fence (with its language tag, if any) and a closing
/// fence, repeating until the text stops changing.
pub fn sanitize(raw: &str) -> String {
    let mut current = raw.trim();
    loop {
        let next = strip_fences_once(current);
        if next == current {
            return next.to_string();
        }
        current = next;
    }
}

fn strip_fences_once(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix(FENCE) {
        text = match rest.split_once('\n') {
            Some((first_line, body)) if is_fence_tag(first_line.trim()) => body,
            _ => strip_inline_tag(rest),
        };
    }
    let text = text.trim_end();
    text.strip_suffix(FENCE).unwrap_or(text).trim()
}

/// `sql SELECT 1` on the fence line: drop the leading tag token.
fn strip_inline_tag(rest: &str) -> &str {
    let rest = rest.trim_start();
    match rest.split_once(char::is_whitespace) {
        Some((tag, body)) if !tag.is_empty() && is_fence_tag(tag) => body,
        _ => rest,
    }
}

/// An info string like `sql` or `postgresql`, but not the start of a query.
fn is_fence_tag(line: &str) -> bool {
    if line.is_empty() {
        return true;
    }
    let token_like = line
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'));
    let upper = line.to_ascii_uppercase();
    token_like && !STATEMENT_KEYWORDS.contains(&upper.as_str())
}

/// Ask the model for a query answering `question` in the store's dialect.
pub async fn synthesize(
    llm: &dyn LlmProvider,
    catalog: &SchemaCatalog,
    dialect: Dialect,
    question: &str,
    limit: Option<Duration>,
) -> Result<CandidateQuery, LlmError> {
    let prompt = prompts::synthesis_prompt(catalog.rendered_text(), dialect.display_name(), question);
    let raw = generate_within(llm, &prompt, limit).await?;
    let candidate = CandidateQuery::from_raw(raw);
    debug!(sql = %candidate.sanitized, "Query synthesized");
    Ok(candidate)
}

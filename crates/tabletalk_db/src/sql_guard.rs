//! Read-only policy for generated SQL.
//!
//! Generated statements are untrusted text. The guard only looks at the
//! statement's shape: keywords hidden inside string literals, quoted
//! identifiers and comments are ignored.

use thiserror::Error;

const ALLOWED_LEADING: &[&str] = &["SELECT", "WITH", "EXPLAIN"];
const WRITE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "MERGE", "GRANT",
    "REVOKE", "COPY", "ATTACH", "DETACH", "VACUUM", "REINDEX", "PRAGMA",
];

/// Why a statement was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("Query is empty")]
    Empty,

    #[error("Multiple statements are not allowed")]
    MultipleStatements,

    #[error("Query must start with SELECT, WITH, or EXPLAIN (found {0})")]
    NotAQuery(String),

    #[error("Query contains forbidden keyword: {0}")]
    WriteKeyword(String),
}

/// Validate that a SQL statement is a single read-only query.
pub fn validate_read_only(sql: &str) -> Result<(), GuardViolation> {
    let masked = mask_literals_and_comments(sql);
    if masked.trim().is_empty() {
        return Err(GuardViolation::Empty);
    }

    ensure_single_statement(&masked)?;

    let words = keywords(&masked);
    let first = words
        .first()
        .cloned()
        .ok_or_else(|| GuardViolation::NotAQuery("no keyword".to_string()))?;
    if !ALLOWED_LEADING.contains(&first.as_str()) {
        return Err(GuardViolation::NotAQuery(first));
    }

    if let Some(word) = words.into_iter().find(|w| WRITE_KEYWORDS.contains(&w.as_str())) {
        return Err(GuardViolation::WriteKeyword(word));
    }

    Ok(())
}

/// Validate that `sql` holds at most one statement, whatever it does.
pub fn validate_single_statement(sql: &str) -> Result<(), GuardViolation> {
    ensure_single_statement(&mask_literals_and_comments(sql))
}

fn ensure_single_statement(masked: &str) -> Result<(), GuardViolation> {
    match masked.find(';') {
        Some(idx) if masked[idx + 1..].chars().any(|c| !c.is_whitespace()) => {
            Err(GuardViolation::MultipleStatements)
        }
        _ => Ok(()),
    }
}

/// Upper-cased identifier-like words, in order.
fn keywords(masked: &str) -> Vec<String> {
    masked
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty() && w.chars().next().is_some_and(|c| c.is_ascii_alphabetic()))
        .map(|w| w.to_ascii_uppercase())
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment,
}

/// Replace literals, quoted identifiers and comments with spaces so that only
/// statement structure remains. Byte offsets are preserved for ASCII input.
fn mask_literals_and_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut state = Scan::Code;

    while let Some(ch) = chars.next() {
        match state {
            Scan::Code => match ch {
                '\'' => {
                    state = Scan::SingleQuoted;
                    out.push(' ');
                }
                '"' => {
                    state = Scan::DoubleQuoted;
                    out.push(' ');
                }
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    state = Scan::LineComment;
                    out.push_str("  ");
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = Scan::BlockComment;
                    out.push_str("  ");
                }
                _ => out.push(ch),
            },
            Scan::SingleQuoted => {
                if ch == '\'' {
                    if chars.peek() == Some(&'\'') {
                        // escaped quote inside the literal
                        chars.next();
                        out.push(' ');
                    } else {
                        state = Scan::Code;
                    }
                }
                out.push(' ');
            }
            Scan::DoubleQuoted => {
                if ch == '"' {
                    state = Scan::Code;
                }
                out.push(' ');
            }
            Scan::LineComment => {
                if ch == '\n' {
                    state = Scan::Code;
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            Scan::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = Scan::Code;
                    out.push(' ');
                }
                out.push(' ');
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_queries_pass() {
        assert!(validate_read_only("SELECT AVG(balance) FROM users;").is_ok());
        assert!(validate_read_only("with t as (select 1) select * from t").is_ok());
        assert!(validate_read_only("EXPLAIN SELECT * FROM users").is_ok());
    }

    #[test]
    fn test_write_statements_rejected() {
        assert_eq!(
            validate_read_only("DELETE FROM users"),
            Err(GuardViolation::NotAQuery("DELETE".to_string()))
        );
        assert!(validate_read_only("DROP TABLE users").is_err());
        assert!(validate_read_only("PRAGMA writable_schema = 1").is_err());
        assert_eq!(
            validate_read_only("WITH gone AS (DELETE FROM users RETURNING *) SELECT * FROM gone"),
            Err(GuardViolation::WriteKeyword("DELETE".to_string()))
        );
    }

    #[test]
    fn test_keywords_in_literals_and_comments_ignored() {
        assert!(validate_read_only("SELECT 'DROP TABLE x' AS note").is_ok());
        assert!(validate_read_only("SELECT \"update\" FROM audit").is_ok());
        assert!(validate_read_only("SELECT 1 -- DELETE FROM users").is_ok());
        assert!(validate_read_only("SELECT /* INSERT */ 1").is_ok());
        assert!(validate_read_only("SELECT 'it''s; DROP' FROM t").is_ok());
    }

    #[test]
    fn test_multiple_statements_rejected() {
        assert_eq!(
            validate_read_only("SELECT 1; DROP TABLE users"),
            Err(GuardViolation::MultipleStatements)
        );
        assert!(validate_read_only("SELECT 1;  \n").is_ok());
    }

    #[test]
    fn test_single_statement_check_ignores_statement_kind() {
        assert!(validate_single_statement("UPDATE users SET age = 37;").is_ok());
        assert!(validate_single_statement("SELECT 'a; b' -- x; y").is_ok());
        assert_eq!(
            validate_single_statement("SELECT COUNT(*) FROM users; DELETE FROM users"),
            Err(GuardViolation::MultipleStatements)
        );
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(validate_read_only("   "), Err(GuardViolation::Empty));
        assert_eq!(validate_read_only("-- only a comment"), Err(GuardViolation::Empty));
    }
}

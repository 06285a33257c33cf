//! # SQL Extraction
//!
//! Recovers a single statement from free-form model output. Extraction is lenient on
//! purpose; whatever it returns still has to pass the [`crate::security`] checks.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

static SQL_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```(?:sqlite|postgresql|postgres|mysql|sql)\b[ \t]*\r?\n?(.*?)```")
        .expect("sql fence pattern is valid")
});
static READ_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bSELECT\b").expect("select keyword pattern is valid"));
static STATEMENT_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(SELECT|WITH|DROP|DELETE|TRUNCATE|ALTER|CREATE|INSERT|UPDATE|GRANT|REVOKE)\b",
    )
    .expect("statement start pattern is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("No SQL statement found in model output")]
    NoStatement,
}

/// Extracts one SQL statement from `raw`.
///
/// Attempts, in order: the first ```` ```sql ```` fenced block (dialect tags such as
/// `sqlite` count too), the text from the first
/// `SELECT` to the end, then the whole text when it starts with a statement keyword.
/// One trailing `;` is dropped from the result.
pub fn extract(raw: &str) -> Result<String, ExtractionError> {
    if let Some(body) = SQL_FENCE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|body| !body.is_empty())
    {
        debug!("Extracted SQL from fenced block.");
        return Ok(strip_terminator(body));
    }

    if let Some(found) = READ_KEYWORD.find(raw) {
        debug!("Extracted SQL from first SELECT keyword.");
        return Ok(strip_terminator(raw[found.start()..].trim()));
    }

    let trimmed = raw.trim();
    if STATEMENT_START.is_match(trimmed) {
        debug!("Using whole model output as SQL.");
        return Ok(strip_terminator(trimmed));
    }

    Err(ExtractionError::NoStatement)
}

fn strip_terminator(sql: &str) -> String {
    sql.strip_suffix(';').unwrap_or(sql).trim_end().to_string()
}

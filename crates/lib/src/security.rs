//! # Read-Only Security Policy
//!
//! Every statement produced by the model passes through [`SecurityValidator`] before
//! it can be executed. The checks are purely syntactic and deliberately err on the
//! side of rejecting: a table or column name that happens to precede `(` is treated as
//! a function call and must be on the allow-list.
//!
//! A statement that passes is wrapped in [`ValidatedSql`], the only type a
//! [`crate::providers::db::QueryExecutor`] accepts.

use crate::sql_text::mask_literals;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Function names a statement may call.
pub const ALLOWED_FUNCTIONS: &[&str] = &[
    "COUNT", "SUM", "AVG", "MIN", "MAX", "ROUND", "FLOOR", "CEILING", "CONCAT", "SUBSTRING",
    "TRIM", "DATE", "EXTRACT", "TO_CHAR",
];

/// Keywords that may legitimately be followed by `(` without being a function call.
const NON_FUNCTION_KEYWORDS: &[&str] = &[
    "ALL", "AND", "ANY", "AS", "BETWEEN", "BY", "CASE", "DISTINCT", "ELSE", "EXCEPT", "EXISTS",
    "FILTER", "FROM", "HAVING", "IN", "INTERSECT", "IS", "JOIN", "LATERAL", "LIKE", "NOT", "ON", "OR",
    "OVER", "PARTITION", "RECURSIVE", "SELECT", "SOME", "THEN", "UNION", "USING", "VALUES",
    "WHEN", "WHERE", "WITH", "WITHIN",
];

static BLOCKED_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(DROP|DELETE|TRUNCATE|ALTER|CREATE|INSERT|UPDATE|GRANT|REVOKE)\b")
        .expect("blocked keyword pattern is valid")
});
static STORED_PROCEDURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(xp|sp)_\w*").expect("stored procedure pattern is valid"));
static FUNCTION_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:"(?P<dq>[^"]+)"|`(?P<bt>[^`]+)`|\[(?P<br>[^\]]+)\]|\b(?P<bare>[A-Za-z_][A-Za-z0-9_]*))\s*\("#,
    )
    .expect("function call pattern is valid")
});
static JOIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bJOIN\b").expect("join pattern is valid"));
static SELECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bSELECT\b").expect("select pattern is valid"));

/// A statement that satisfied the security policy.
///
/// Only [`SecurityValidator::validate`] can construct one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidatedSql(String);

impl ValidatedSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ValidatedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The rule a statement violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityRule {
    BlockedKeyword,
    StatementSeparator,
    Comment,
    StoredProcedure,
    UnauthorizedFunction,
    TooLong,
    TooManyJoins,
    TooManySelects,
}

impl fmt::Display for SecurityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecurityRule::BlockedKeyword => "blocked keyword",
            SecurityRule::StatementSeparator => "statement separator",
            SecurityRule::Comment => "comment",
            SecurityRule::StoredProcedure => "stored procedure",
            SecurityRule::UnauthorizedFunction => "unauthorized function",
            SecurityRule::TooLong => "too long",
            SecurityRule::TooManyJoins => "too many joins",
            SecurityRule::TooManySelects => "too many selects",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Query blocked by security policy ({rule}): {detail}")]
pub struct SecurityError {
    pub rule: SecurityRule,
    pub detail: String,
}

impl SecurityError {
    fn new(rule: SecurityRule, detail: impl Into<String>) -> Self {
        Self {
            rule,
            detail: detail.into(),
        }
    }
}

/// Complexity limits. The defaults are the policy's upper bounds; configured values can
/// only tighten them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Maximum statement length in characters.
    pub max_length: usize,
    pub max_joins: usize,
    /// Maximum number of `SELECT` keywords, a proxy for subquery nesting.
    pub max_selects: usize,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            max_length: 5000,
            max_joins: 10,
            max_selects: 6,
        }
    }
}

impl SecurityPolicy {
    /// Caps every limit at its default.
    pub fn clamped(self) -> Self {
        let bounds = Self::default();
        Self {
            max_length: self.max_length.min(bounds.max_length),
            max_joins: self.max_joins.min(bounds.max_joins),
            max_selects: self.max_selects.min(bounds.max_selects),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityValidator {
    policy: SecurityPolicy,
}

impl SecurityValidator {
    /// Creates a validator. Limits looser than the defaults are capped at the defaults.
    pub fn new(policy: SecurityPolicy) -> Self {
        let clamped = policy.clamped();
        if clamped != policy {
            warn!(
                requested = ?policy,
                effective = ?clamped,
                "[security] configured limits exceed the policy bounds and were capped"
            );
        }
        Self { policy: clamped }
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Validates `sql`, reporting the first violation.
    pub fn validate(&self, sql: &str) -> Result<ValidatedSql, SecurityError> {
        match self.validate_all(sql).into_iter().next() {
            Some(violation) => {
                warn!(rule = %violation.rule, "[security] {}", violation.detail);
                Err(violation)
            }
            None => Ok(ValidatedSql(sql.to_string())),
        }
    }

    /// Runs every check and returns all violations in check order.
    pub fn validate_all(&self, sql: &str) -> Vec<SecurityError> {
        let masked = mask_literals(sql);
        let mut violations = Vec::new();

        let keywords = distinct_upper(BLOCKED_KEYWORDS.find_iter(&masked).map(|m| m.as_str()));
        if !keywords.is_empty() {
            violations.push(SecurityError::new(
                SecurityRule::BlockedKeyword,
                format!("mutating or DDL keywords: {}", keywords.join(", ")),
            ));
        }

        if masked.contains(';') {
            violations.push(SecurityError::new(
                SecurityRule::StatementSeparator,
                "multiple statements are not allowed",
            ));
        }

        if masked.contains("--") || masked.contains("/*") {
            violations.push(SecurityError::new(
                SecurityRule::Comment,
                "comments are not allowed",
            ));
        }

        let procedures = distinct_upper(STORED_PROCEDURE.find_iter(&masked).map(|m| m.as_str()));
        if !procedures.is_empty() {
            violations.push(SecurityError::new(
                SecurityRule::StoredProcedure,
                format!("stored procedure references: {}", procedures.join(", ")),
            ));
        }

        let unauthorized = self.unauthorized_functions(&masked);
        if !unauthorized.is_empty() {
            violations.push(SecurityError::new(
                SecurityRule::UnauthorizedFunction,
                format!("functions not on the allow-list: {}", unauthorized.join(", ")),
            ));
        }

        let length = sql.chars().count();
        if length > self.policy.max_length {
            violations.push(SecurityError::new(
                SecurityRule::TooLong,
                format!(
                    "statement is {length} characters, the limit is {}",
                    self.policy.max_length
                ),
            ));
        }

        let joins = JOIN.find_iter(&masked).count();
        if joins > self.policy.max_joins {
            violations.push(SecurityError::new(
                SecurityRule::TooManyJoins,
                format!(
                    "statement has {joins} JOINs, the limit is {}",
                    self.policy.max_joins
                ),
            ));
        }

        let selects = SELECT.find_iter(&masked).count();
        if selects > self.policy.max_selects {
            violations.push(SecurityError::new(
                SecurityRule::TooManySelects,
                format!(
                    "statement has {selects} SELECTs, the limit is {}",
                    self.policy.max_selects
                ),
            ));
        }

        violations
    }

    fn unauthorized_functions(&self, masked: &str) -> Vec<String> {
        let called = FUNCTION_CALL
            .captures_iter(masked)
            .filter_map(|caps| {
                // A quoted name is always an identifier, never a keyword.
                if let Some(bare) = caps.name("bare") {
                    let name = bare.as_str().to_uppercase();
                    return (!NON_FUNCTION_KEYWORDS.contains(&name.as_str())).then_some(name);
                }
                ["dq", "bt", "br"]
                    .iter()
                    .find_map(|group| caps.name(group))
                    .map(|quoted| quoted.as_str().trim().to_uppercase())
            })
            .filter(|name| !ALLOWED_FUNCTIONS.contains(&name.as_str()));
        distinct_upper(called)
    }
}

/// Uppercases, de-duplicates and sorts.
fn distinct_upper<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().to_uppercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

//! Structural reading of a `SELECT` statement without executing it.
//!
//! [`HeuristicSelectParser`] is lexical, not a grammar. It is good enough to find the
//! select list and the `GROUP BY` list of the statements a model typically writes, and
//! it sits behind [`SelectParser`] so a real statement parser can replace it.

use crate::sql_text::{mask_literals, paren_depths, split_top_level};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Debug;

static SELECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bSELECT\b").expect("select pattern is valid"));
static FROM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bFROM\b").expect("from pattern is valid"));
static SELECT_LIST_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(FROM|WHERE|GROUP\s+BY|HAVING|ORDER\s+BY|LIMIT|UNION|INTERSECT|EXCEPT)\b")
        .expect("select list end pattern is valid")
});
static SET_OPERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(UNION|INTERSECT|EXCEPT)\b").expect("set operator pattern is valid")
});
static GROUP_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bGROUP\s+BY\b").expect("group by pattern is valid"));
static GROUP_BY_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(HAVING|ORDER\s+BY|LIMIT|WINDOW|OFFSET|FETCH)\b")
        .expect("group by end pattern is valid")
});
static SELECT_MODIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(DISTINCT|ALL)\b").expect("modifier pattern is valid"));
static ALIAS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)^(.+?)\s+AS\s+("[^"]+"|`[^`]+`|\[[^\]]+\]|[A-Za-z_][A-Za-z0-9_]*)\s*$"#)
        .expect("alias pattern is valid")
});
static AGGREGATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(COUNT|SUM|AVG|MIN|MAX)\b").expect("aggregate pattern is valid")
});
static AGGREGATE_ARGUMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:COUNT|SUM|AVG|MIN|MAX)\s*\(\s*(?:DISTINCT\s+)?([^()]*?)\s*\)")
        .expect("aggregate argument pattern is valid")
});
static COLUMN_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:(?:"[^"]+"|`[^`]+`|\[[^\]]+\]|[A-Za-z_][A-Za-z0-9_]*)\.)*("[^"]+"|`[^`]+`|\[[^\]]+\]|[A-Za-z_][A-Za-z0-9_]*)$"#)
        .expect("column reference pattern is valid")
});

/// Whether a select item is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Dimension,
    Measure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    /// The item's expression without its alias.
    pub expression: String,
    /// Canonical name. `None` for `*` and `table.*`.
    pub name: Option<String>,
    pub role: Role,
}

/// The parts of a statement that drive axis inference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectShape {
    pub items: Vec<SelectItem>,
    /// `GROUP BY` entries resolved to canonical names.
    pub group_by: Vec<String>,
}

impl SelectShape {
    pub fn dimensions(&self) -> impl Iterator<Item = &SelectItem> {
        self.items.iter().filter(|item| item.role == Role::Dimension)
    }

    pub fn measures(&self) -> impl Iterator<Item = &SelectItem> {
        self.items.iter().filter(|item| item.role == Role::Measure)
    }
}

pub trait SelectParser: Send + Sync + Debug {
    /// Reads the shape of `sql`. Unparseable input yields an empty shape.
    fn parse(&self, sql: &str) -> SelectShape;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSelectParser;

impl SelectParser for HeuristicSelectParser {
    fn parse(&self, sql: &str) -> SelectShape {
        let masked = mask_literals(sql);
        let depths = paren_depths(&masked);

        let Some(select) = find_top_level(&SELECT, &masked, &depths, 0) else {
            return SelectShape::default();
        };

        let list_start = select.1;
        let list_end = find_top_level(&SELECT_LIST_END, &masked, &depths, list_start)
            .map(|(start, _)| start)
            .unwrap_or(sql.len());

        let mut list = &sql[list_start..list_end];
        let mut masked_list = &masked[list_start..list_end];
        if let Some(modifier) = SELECT_MODIFIER.find(masked_list) {
            list = &list[modifier.end()..];
            masked_list = &masked_list[modifier.end()..];
        }

        let items: Vec<SelectItem> = split_top_level(list, masked_list)
            .iter()
            .map(String::as_str)
            .map(parse_item)
            .collect();

        let group_by = find_top_level(&FROM, &masked, &depths, list_end)
            .map(|(from, _)| group_by_entries(sql, &masked, &depths, from))
            .unwrap_or_default()
            .iter()
            .map(|entry| resolve_group_entry(entry, &items))
            .collect();

        SelectShape { items, group_by }
    }
}

/// First match of `pattern` at parenthesis depth zero, starting at byte `from`.
fn find_top_level(
    pattern: &Regex,
    masked: &str,
    depths: &[usize],
    from: usize,
) -> Option<(usize, usize)> {
    let mut cursor = from;
    while let Some(found) = pattern.find_at(masked, cursor) {
        if depths.get(found.start()).copied() == Some(0) {
            return Some((found.start(), found.end()));
        }
        cursor = found.end();
    }
    None
}

fn group_by_entries(sql: &str, masked: &str, depths: &[usize], from: usize) -> Vec<String> {
    // Restrict the search to the first query of a compound statement.
    let query_end = find_top_level(&SET_OPERATOR, masked, depths, from)
        .map(|(start, _)| start)
        .unwrap_or(sql.len());

    let Some((_, group_start)) = find_top_level(&GROUP_BY, &masked[..query_end], depths, from)
    else {
        return Vec::new();
    };
    let group_end = find_top_level(&GROUP_BY_END, &masked[..query_end], depths, group_start)
        .map(|(start, _)| start)
        .unwrap_or(query_end);

    split_top_level(
        &sql[group_start..group_end],
        &masked[group_start..group_end],
    )
}

fn parse_item(raw: &str) -> SelectItem {
    let masked = mask_literals(raw);
    let (expression, alias) = match ALIAS.captures(&masked) {
        Some(caps) => match (caps.get(1), caps.get(2)) {
            (Some(expr), Some(alias)) => (
                raw[expr.start()..expr.end()].trim().to_string(),
                Some(unquote(&raw[alias.start()..alias.end()])),
            ),
            _ => (raw.trim().to_string(), None),
        },
        None => (raw.trim().to_string(), None),
    };

    let masked_expression = mask_literals(&expression);
    let role = if AGGREGATE.is_match(&masked_expression) {
        Role::Measure
    } else {
        Role::Dimension
    };

    let name = if is_star(&expression) {
        None
    } else {
        alias
            .or_else(|| column_name(&expression))
            .or_else(|| aggregate_argument(&expression))
            .or_else(|| Some(expression.clone()))
    };

    SelectItem {
        expression,
        name,
        role,
    }
}

/// Maps a `GROUP BY` entry to the canonical name of the select item it refers to.
fn resolve_group_entry(entry: &str, items: &[SelectItem]) -> String {
    if let Ok(ordinal) = entry.parse::<usize>() {
        if let Some(name) = ordinal
            .checked_sub(1)
            .and_then(|i| items.get(i))
            .and_then(|item| item.name.clone())
        {
            return name;
        }
    }

    let normalized = normalize(entry);
    items
        .iter()
        .find(|item| {
            normalize(&item.expression) == normalized
                || item
                    .name
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(entry))
        })
        .and_then(|item| item.name.clone())
        .or_else(|| column_name(entry))
        .unwrap_or_else(|| entry.to_string())
}

fn column_name(expression: &str) -> Option<String> {
    COLUMN_REFERENCE
        .captures(expression.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| unquote(m.as_str()))
}

fn aggregate_argument(expression: &str) -> Option<String> {
    AGGREGATE_ARGUMENT
        .captures(expression)
        .and_then(|caps| caps.get(1))
        .and_then(|m| column_name(m.as_str()))
}

fn is_star(expression: &str) -> bool {
    expression == "*" || expression.ends_with(".*")
}

fn unquote(identifier: &str) -> String {
    let trimmed = identifier.trim();
    let quoted = [('"', '"'), ('`', '`'), ('[', ']')]
        .iter()
        .any(|(open, close)| trimmed.starts_with(*open) && trimmed.ends_with(*close));
    if quoted && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

fn normalize(expression: &str) -> String {
    expression
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> SelectShape {
        HeuristicSelectParser.parse(sql)
    }

    fn names(shape: &SelectShape) -> Vec<Option<&str>> {
        shape.items.iter().map(|i| i.name.as_deref()).collect()
    }

    #[test]
    fn test_aliases_columns_and_aggregates() {
        let shape = parse(
            "SELECT o.region, SUM(o.amount) AS total, AVG(price), COUNT(*) FROM orders o GROUP BY o.region",
        );
        assert_eq!(
            names(&shape),
            vec![Some("region"), Some("total"), Some("price"), Some("COUNT(*)")]
        );
        let roles: Vec<Role> = shape.items.iter().map(|i| i.role).collect();
        assert_eq!(
            roles,
            vec![Role::Dimension, Role::Measure, Role::Measure, Role::Measure]
        );
        assert_eq!(shape.group_by, vec!["region"]);
    }

    #[test]
    fn test_distinct_is_stripped() {
        let shape = parse("SELECT DISTINCT category FROM products");
        assert_eq!(names(&shape), vec![Some("category")]);
    }

    #[test]
    fn test_ordinal_and_expression_group_by() {
        let shape = parse(
            "SELECT strftime('%Y', created_at) AS year, status, COUNT(id) AS n \
             FROM orders GROUP BY 1, status ORDER BY 1",
        );
        assert_eq!(shape.group_by, vec!["year", "status"]);

        let shape = parse(
            "SELECT strftime('%Y', created_at) AS year, COUNT(id) AS n \
             FROM orders GROUP BY strftime('%Y',  created_at)",
        );
        assert_eq!(shape.group_by, vec!["year"]);
    }

    #[test]
    fn test_cte_bodies_are_skipped() {
        let shape = parse(
            "WITH recent AS (SELECT id, amount FROM orders WHERE amount > 0) \
             SELECT day, SUM(amount) AS revenue FROM recent GROUP BY day",
        );
        assert_eq!(names(&shape), vec![Some("day"), Some("revenue")]);
        assert_eq!(shape.group_by, vec!["day"]);
    }

    #[test]
    fn test_nested_from_and_literals_do_not_end_the_list() {
        let shape = parse(
            "SELECT EXTRACT(YEAR FROM d) AS y, 'a, FROM b' AS label FROM t",
        );
        assert_eq!(names(&shape), vec![Some("y"), Some("label")]);
        assert!(shape.group_by.is_empty());
    }

    #[test]
    fn test_group_by_of_compound_statement_uses_first_query() {
        let shape = parse("SELECT a FROM t UNION SELECT b FROM u GROUP BY b");
        assert!(shape.group_by.is_empty());
    }

    #[test]
    fn test_star_has_no_name() {
        let shape = parse("SELECT * FROM t");
        assert_eq!(names(&shape), vec![None]);
    }

    #[test]
    fn test_bare_count_column_reads_as_measure() {
        // Word-based detection: a column literally named `count` counts as aggregated.
        let shape = parse("SELECT name, count FROM inventory");
        assert_eq!(shape.items[1].role, Role::Measure);
        assert_eq!(shape.items[1].name.as_deref(), Some("count"));
    }

    #[test]
    fn test_quoted_alias_is_unquoted() {
        let shape = parse(r#"SELECT SUM(x) AS "Total Sales" FROM t"#);
        assert_eq!(names(&shape), vec![Some("Total Sales")]);
    }

    #[test]
    fn test_no_select() {
        assert_eq!(parse("EXPLAIN nothing"), SelectShape::default());
    }
}

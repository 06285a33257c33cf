//! # Schema Encoder
//!
//! Renders a [`SchemaModel`] into a text block whose cost never exceeds a budget.
//! Tables are rendered whole, in order, until the next one would cross
//! `budget - TRUNCATION_RESERVE`; that table is replaced by [`TRUNCATION_MARKER`] and
//! encoding stops.

use super::{SchemaModel, TableSchema};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The literal that replaces the first table that does not fit.
pub const TRUNCATION_MARKER: &str = "[schema truncated]";

/// Units held back from the running total so the marker always has room.
pub const TRUNCATION_RESERVE: usize = 20;

const BLOCK_SEPARATOR: &str = "\n";

/// How the length of rendered text is measured against the budget.
///
/// Both models are additive over newline-joined blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostModel {
    /// Whitespace-delimited words, a cheap stand-in for model tokens.
    #[default]
    Words,
    Chars,
}

impl CostModel {
    pub fn cost(&self, text: &str) -> usize {
        match self {
            CostModel::Words => text.split_whitespace().count(),
            CostModel::Chars => text.chars().count(),
        }
    }
}

/// Which optional sections are rendered for each table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderOptions {
    pub cost_model: CostModel,
    pub include_keys: bool,
    pub include_indexes: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            cost_model: CostModel::Words,
            include_keys: true,
            include_indexes: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaEncoder {
    options: EncoderOptions,
}

impl SchemaEncoder {
    pub fn new(options: EncoderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Encodes `schema` so that the cost of the result is at most `budget`.
    pub fn encode(&self, schema: &SchemaModel, budget: usize) -> String {
        let cost_model = self.options.cost_model;
        let bound = budget.saturating_sub(TRUNCATION_RESERVE);
        let separator_cost = cost_model.cost(BLOCK_SEPARATOR);

        let mut blocks: Vec<String> = Vec::new();
        let mut total = 0usize;

        for table in &schema.tables {
            let block = self.render_table(table);
            let join_cost = if blocks.is_empty() { 0 } else { separator_cost };
            let block_cost = join_cost + cost_model.cost(&block);

            if total + block_cost <= bound {
                total += block_cost;
                blocks.push(block);
                continue;
            }

            let marker_cost = join_cost + cost_model.cost(TRUNCATION_MARKER);
            if total + marker_cost <= budget {
                total += marker_cost;
                blocks.push(TRUNCATION_MARKER.to_string());
            }
            debug!(
                table = %table.name,
                included = blocks.len(),
                total,
                budget,
                "[schema_encoder] budget reached, truncating schema"
            );
            break;
        }

        blocks.join(BLOCK_SEPARATOR)
    }

    fn render_table(&self, table: &TableSchema) -> String {
        let mut lines = vec![format!("TABLE: {}", table.name), "COLUMNS:".to_string()];

        for column in &table.columns {
            let mut line = format!("  - {} ({})", column.name, column.data_type);
            if !column.nullable {
                line.push_str(" NOT NULL");
            }
            if let Some(default) = &column.default {
                line.push_str(&format!(" DEFAULT {default}"));
            }
            lines.push(line);
        }

        if self.options.include_keys {
            if !table.primary_key.is_empty() {
                lines.push(format!("PRIMARY KEY: ({})", table.primary_key.join(", ")));
            }
            if !table.foreign_keys.is_empty() {
                lines.push("FOREIGN KEYS:".to_string());
                for fk in &table.foreign_keys {
                    lines.push(format!(
                        "  - {} -> {}({})",
                        fk.columns.join(", "),
                        fk.referenced_table,
                        fk.referenced_columns.join(", ")
                    ));
                }
            }
        }

        if self.options.include_indexes && !table.indexes.is_empty() {
            lines.push("INDEXES:".to_string());
            for index in &table.indexes {
                let unique = if index.unique { " UNIQUE" } else { "" };
                lines.push(format!(
                    "  - {}{unique}: ({})",
                    index.name,
                    index.columns.join(", ")
                ));
            }
        }

        lines.join("\n")
    }
}

/// Encodes `schema` with the default options.
pub fn encode(schema: &SchemaModel, budget: usize) -> String {
    SchemaEncoder::default().encode(schema, budget)
}

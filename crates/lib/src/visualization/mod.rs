//! # Visualization Inference
//!
//! Suggests how a result set should be charted before the query runs. The question's
//! wording selects chart types (see [`intent`]) and the statement's structure selects
//! the axes (see [`parser`]). A plain table is always offered first.

pub mod annotations;
pub mod intent;
pub mod parser;

use crate::security::ValidatedSql;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub use annotations::{Annotation, AnnotationMode};
pub use intent::Intent;
pub use parser::{HeuristicSelectParser, Role, SelectItem, SelectParser, SelectShape};

static TIME_HINTS: &[&str] = &["date", "time", "year", "month", "day", "week"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Table,
    Line,
    Pie,
    Bar,
    Scatter,
}

impl ChartType {
    /// Default render settings for the chart type.
    pub fn default_settings(self) -> Value {
        match self {
            ChartType::Table => json!({
                "pagination": true,
                "sortable": true,
                "searchable": true
            }),
            ChartType::Line => json!({
                "interpolation": "monotone",
                "showPoints": true,
                "grid": true,
                "animations": true
            }),
            ChartType::Pie => json!({
                "donut": true,
                "showLabels": true,
                "showLegend": true,
                "gradients": true
            }),
            ChartType::Bar => json!({
                "grouped": true,
                "horizontal": false,
                "showValues": true,
                "animations": true
            }),
            ChartType::Scatter => json!({
                "showTrendline": true,
                "showPoints": true,
                "regressionLine": true
            }),
        }
    }
}

/// Column bindings of a chart. Unresolved axes stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Axes {
    pub x: Option<String>,
    pub y: Option<String>,
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizationSpec {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub settings: Value,
    pub axes: Axes,
    pub annotations: Vec<Annotation>,
}

impl VisualizationSpec {
    pub fn table() -> Self {
        Self {
            chart_type: ChartType::Table,
            settings: ChartType::Table.default_settings(),
            axes: Axes::default(),
            annotations: Vec::new(),
        }
    }
}

/// Every chart suggested for one result, table first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizationOptions {
    pub options: Vec<VisualizationSpec>,
}

impl VisualizationOptions {
    pub fn chart(&self, chart_type: ChartType) -> Option<&VisualizationSpec> {
        self.options.iter().find(|spec| spec.chart_type == chart_type)
    }
}

#[derive(Debug, Clone)]
pub struct VisualizationAnalyzer {
    parser: Arc<dyn SelectParser>,
}

impl Default for VisualizationAnalyzer {
    fn default() -> Self {
        Self::new(Arc::new(HeuristicSelectParser))
    }
}

impl VisualizationAnalyzer {
    pub fn new(parser: Arc<dyn SelectParser>) -> Self {
        Self { parser }
    }

    /// Suggests charts for the result of `sql`. Never fails; the worst case is the
    /// table alone.
    pub fn analyze(&self, question: &str, sql: &ValidatedSql) -> VisualizationOptions {
        let mut options = vec![VisualizationSpec::table()];

        let intents = intent::detect(question);
        if intents.is_empty() {
            return VisualizationOptions { options };
        }

        let axes = infer_axes(&self.parser.parse(sql.as_str()));
        for intent in intents {
            let chart_type = intent.chart_type();
            debug!(intent = intent.name(), "Adding {:?} visualization.", chart_type);
            options.push(VisualizationSpec {
                chart_type,
                settings: chart_type.default_settings(),
                axes: axes.clone(),
                annotations: annotations::for_chart(chart_type, question),
            });
        }
        VisualizationOptions { options }
    }
}

/// Binds axes from the grouping columns first, then from the select list.
pub fn infer_axes(shape: &SelectShape) -> Axes {
    let dimensions: Vec<&str> = shape
        .dimensions()
        .filter_map(|item| item.name.as_deref())
        .collect();
    let first_measure = shape.measures().find_map(|item| item.name.clone());

    let (mut x, group) = if shape.group_by.is_empty() {
        (
            dimensions.first().map(|s| s.to_string()),
            dimensions.get(1).map(|s| s.to_string()),
        )
    } else {
        (shape.group_by.first().cloned(), shape.group_by.get(1).cloned())
    };

    if x.is_none() {
        x = dimensions
            .iter()
            .find(|name| is_time_like(name))
            .or_else(|| dimensions.first())
            .map(|s| s.to_string());
    }

    Axes {
        x,
        y: first_measure,
        group,
    }
}

fn is_time_like(name: &str) -> bool {
    let lowered = name.to_lowercase();
    TIME_HINTS.iter().any(|hint| lowered.contains(hint))
}

use super::ChartType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

static THRESHOLD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bthreshold\s*(?:(?:of|at)\s+|[=:]\s*)?([-+]?\d+(?:\.\d+)?)")
        .expect("threshold pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationMode {
    Trend,
    Average,
    Regression,
    Threshold,
}

/// A line drawn over a chart. Advisory only: nothing here is computed from data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub mode: AnnotationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub style: Value,
}

impl Annotation {
    pub fn trend() -> Self {
        Self {
            mode: AnnotationMode::Trend,
            label: None,
            value: None,
            style: json!({
                "stroke": "rgba(255, 0, 0, 0.5)",
                "strokeWidth": 2,
                "strokeDasharray": "5,5"
            }),
        }
    }

    pub fn average() -> Self {
        Self {
            mode: AnnotationMode::Average,
            label: Some("Average".to_string()),
            value: None,
            style: json!({ "stroke": "#666", "strokeWidth": 1 }),
        }
    }

    pub fn regression() -> Self {
        Self {
            mode: AnnotationMode::Regression,
            label: Some("Regression Line".to_string()),
            value: None,
            style: json!({
                "stroke": "rgba(0, 0, 255, 0.5)",
                "strokeWidth": 2,
                "strokeDasharray": "3,3"
            }),
        }
    }

    pub fn threshold(value: f64) -> Self {
        Self {
            mode: AnnotationMode::Threshold,
            label: Some(format!("Threshold {value}")),
            value: Some(value),
            style: json!({ "stroke": "rgba(255, 0, 0, 0.8)", "strokeWidth": 1 }),
        }
    }
}

/// The number in a "threshold 100" style expression, if the question has one.
pub fn threshold_value(question: &str) -> Option<f64> {
    THRESHOLD
        .captures(question)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Annotations for a chart of `chart_type` answering `question`.
pub fn for_chart(chart_type: ChartType, question: &str) -> Vec<Annotation> {
    let mut annotations = Vec::new();
    match chart_type {
        ChartType::Line => annotations.push(Annotation::trend()),
        ChartType::Bar => annotations.push(Annotation::average()),
        ChartType::Scatter => annotations.push(Annotation::regression()),
        ChartType::Table | ChartType::Pie => {}
    }
    if let Some(value) = threshold_value(question) {
        annotations.push(Annotation::threshold(value));
    }
    annotations
}

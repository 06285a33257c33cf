use super::ChartType;
use once_cell::sync::Lazy;
use regex::Regex;

static TIME_SERIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(trends?|over\s+time|evolution|growth|timeline|time\s+series|historical|daily|weekly|monthly|yearly|per\s+(day|week|month|year))\b",
    )
    .expect("time series pattern is valid")
});
static DISTRIBUTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(distribution|breakdown|proportions?|percentages?|ratio|share)\b")
        .expect("distribution pattern is valid")
});
static COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(compare|comparison|versus|vs|difference|between)\b")
        .expect("comparison pattern is valid")
});
static CORRELATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(correlation|correlates?|correlated|relationship|scatter|plot)\b")
        .expect("correlation pattern is valid")
});

/// What the question asks to see, inferred from its wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    TimeSeries,
    Distribution,
    Comparison,
    Correlation,
}

impl Intent {
    /// All intents, in the order their charts are offered.
    pub const ALL: [Intent; 4] = [
        Intent::TimeSeries,
        Intent::Distribution,
        Intent::Comparison,
        Intent::Correlation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Intent::TimeSeries => "time_series",
            Intent::Distribution => "distribution",
            Intent::Comparison => "comparison",
            Intent::Correlation => "correlation",
        }
    }

    pub fn chart_type(self) -> ChartType {
        match self {
            Intent::TimeSeries => ChartType::Line,
            Intent::Distribution => ChartType::Pie,
            Intent::Comparison => ChartType::Bar,
            Intent::Correlation => ChartType::Scatter,
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Intent::TimeSeries => &TIME_SERIES,
            Intent::Distribution => &DISTRIBUTION,
            Intent::Comparison => &COMPARISON,
            Intent::Correlation => &CORRELATION,
        }
    }
}

/// Returns every intent whose keywords appear in `question`.
pub fn detect(question: &str) -> Vec<Intent> {
    let lowered = question.to_lowercase();
    Intent::ALL
        .into_iter()
        .filter(|intent| intent.pattern().is_match(&lowered))
        .collect()
}

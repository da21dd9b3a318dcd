//! View assemblers.
//!
//! Each view takes a normalized [`Dataset`](crate::models::Dataset) plus the
//! caller's selections and produces a [`ViewReport`]: metric cards, chart
//! specifications and tables. Rendering is left to the CLI layer.

pub mod balance;
pub mod cards;
pub mod comparison;
pub mod expenses;
pub mod shape;
pub mod vehicles;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::Config;
use crate::error::{PanelError, Result};
use crate::models::{Dataset, Field};

// ---------------------------------------------------------------------------
// Metric cards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueFormat {
    Currency,
    Percentage,
    Plain { suffix: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub label: String,
    pub value: f64,
    /// Shown as a percentage next to the value.
    pub delta: Option<f64>,
    pub format: ValueFormat,
}

impl MetricCard {
    pub fn currency(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
            delta: None,
            format: ValueFormat::Currency,
        }
    }

    pub fn percentage(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
            delta: None,
            format: ValueFormat::Percentage,
        }
    }

    pub fn plain(label: impl Into<String>, value: f64, suffix: &str) -> Self {
        Self {
            label: label.into(),
            value,
            delta: None,
            format: ValueFormat::Plain {
                suffix: suffix.to_string(),
            },
        }
    }

    pub fn with_delta(mut self, delta: Option<f64>) -> Self {
        self.delta = delta;
        self
    }
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "chart", rename_all = "snake_case")]
pub enum Chart {
    Bar {
        title: String,
        bars: Vec<(String, f64)>,
        format: ValueFormat,
    },
    GroupedBar {
        title: String,
        series: Vec<Series>,
    },
    Pie {
        title: String,
        slices: Vec<(String, f64)>,
    },
    Line {
        title: String,
        series: Vec<Series>,
        format: ValueFormat,
    },
    Heatmap {
        title: String,
        rows: Vec<String>,
        columns: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
    },
}

impl Chart {
    pub fn title(&self) -> &str {
        match self {
            Chart::Bar { title, .. }
            | Chart::GroupedBar { title, .. }
            | Chart::Pie { title, .. }
            | Chart::Line { title, .. }
            | Chart::Heatmap { title, .. } => title,
        }
    }

    pub fn currency_bar(title: impl Into<String>, bars: Vec<(String, f64)>) -> Self {
        Chart::Bar {
            title: title.into(),
            bars,
            format: ValueFormat::Currency,
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Text(String),
    Date(NaiveDate),
    Currency(f64),
    Percentage(f64),
    Number { value: f64, suffix: String },
    Count(usize),
    /// Growth with a direction arrow; `None` renders as a dash.
    Variation(Option<f64>),
    Empty,
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn opt_text(s: Option<&str>) -> Self {
        s.map(Cell::text).unwrap_or(Cell::Empty)
    }

    pub fn number(value: f64, suffix: &str) -> Self {
        Cell::Number {
            value,
            suffix: suffix.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(title: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            title: title.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewReport {
    pub title: String,
    pub cards: Vec<MetricCard>,
    pub charts: Vec<Chart>,
    pub tables: Vec<Table>,
    pub notices: Vec<String>,
}

impl ViewReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn card(&self, label: &str) -> Option<&MetricCard> {
        self.cards.iter().find(|c| c.label == label)
    }

    pub fn chart(&self, title: &str) -> Option<&Chart> {
        self.charts.iter().find(|c| c.title() == title)
    }

    pub fn table(&self, title: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.title == title)
    }
}

/// Fails with `MissingColumns` naming the canonical headers of any field the
/// dataset did not carry.
pub(crate) fn require(ds: &Dataset, view: &str, fields: &[Field], cfg: &Config) -> Result<()> {
    let missing = ds.missing(fields);
    if missing.is_empty() {
        return Ok(());
    }
    Err(PanelError::MissingColumns {
        view: view.to_string(),
        columns: missing
            .into_iter()
            .map(|f| cfg.columns.canonical(f).to_string())
            .collect(),
    })
}

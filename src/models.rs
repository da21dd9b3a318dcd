use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical expense classification. Every normalized record carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseType {
    Fixed,
    Investment,
    NonOperational,
    Variable,
    /// The business-specific product line tag; its label is configurable.
    ProductLine,
    Unclassified,
}

impl ExpenseType {
    /// The classified kinds, in vocabulary order. `Unclassified` is excluded.
    pub const VOCABULARY: [ExpenseType; 5] = [
        ExpenseType::Fixed,
        ExpenseType::Investment,
        ExpenseType::NonOperational,
        ExpenseType::Variable,
        ExpenseType::ProductLine,
    ];

    pub fn is_classified(&self) -> bool {
        !matches!(self, Self::Unclassified)
    }
}

/// One tabular snapshot as read from disk: ordered headers and rows of
/// optional text cells. Empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Option<String>>) {
        self.rows.push(row);
    }

    /// Index of the first header equal to any of `names`, ignoring case and
    /// surrounding whitespace.
    pub fn column(&self, names: &[String]) -> Option<usize> {
        names.iter().find_map(|name| {
            self.headers
                .iter()
                .position(|h| h.trim().to_lowercase() == name.trim().to_lowercase())
        })
    }

    pub fn cell(&self, row: usize, col: Option<usize>) -> Option<&str> {
        let col = col?;
        self.rows
            .get(row)?
            .get(col)?
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A normalized row of financial activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub account_label: String,
    pub value: f64,
    pub revenue_value: f64,
    pub expense_value: f64,
    pub expense_type: ExpenseType,
    pub category: String,
    pub date: Option<NaiveDate>,
    pub month: Option<u32>,
    pub month_name: Option<String>,
    pub source_year: i32,
    pub user: Option<String>,
    pub vehicle: Option<String>,
    pub odometer_km: Option<f64>,
    pub fuel_liters: Option<f64>,
    pub description: Option<String>,
}

impl Record {
    pub fn is_revenue(&self) -> bool {
        self.revenue_value != 0.0
    }
}

/// Logical input columns. Used to tell which optional fields a snapshot
/// actually carried, so views can refuse to run on incomplete data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Field {
    Account,
    Value,
    TypeTag,
    Category,
    Date,
    MonthYear,
    User,
    Vehicle,
    Odometer,
    Liters,
    Description,
}

/// Normalized records plus the set of columns their source provided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub fields: BTreeSet<Field>,
}

impl Dataset {
    pub fn has(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    pub fn missing(&self, required: &[Field]) -> Vec<Field> {
        required.iter().copied().filter(|f| !self.has(*f)).collect()
    }

    /// Concatenate snapshots of several years into one dataset.
    pub fn merge(datasets: Vec<Dataset>) -> Dataset {
        let mut merged = Dataset::default();
        for ds in datasets {
            merged.fields.extend(ds.fields);
            merged.records.extend(ds.records);
        }
        merged
    }

    pub fn years(&self) -> BTreeSet<i32> {
        self.records.iter().map(|r| r.source_year).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::classifier::{classify, infer_types_from_category};
use crate::config::Config;
use crate::error::{PanelError, Result};
use crate::fmt::decimal;
use crate::models::{Dataset, Field, RawTable, Record};

const ALL_FIELDS: [Field; 11] = [
    Field::Account,
    Field::Value,
    Field::TypeTag,
    Field::Category,
    Field::Date,
    Field::MonthYear,
    Field::User,
    Field::Vehicle,
    Field::Odometer,
    Field::Liters,
    Field::Description,
];

// ---------------------------------------------------------------------------
// Cell parsers
// ---------------------------------------------------------------------------

/// Parse a pt-BR currency string ("R$ 1.234,56") or a plain number. Anything
/// unparseable is zero.
pub fn parse_amount(raw: &str) -> f64 {
    parse_number(raw).unwrap_or(0.0)
}

fn is_symbol(c: char) -> bool {
    !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | ',' | '(' | ')'))
}

/// A currency symbol in front of or behind the digits is dropped, whatever
/// the symbol. With a comma present, dots are thousands separators and the
/// comma is the decimal point. Without one, dots followed by groups of exactly
/// three digits are thousands separators ("1.500"); a single dot before any
/// other group is a decimal point ("1234.5").
pub fn parse_number(raw: &str) -> Option<f64> {
    let s: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '"')
        .collect();
    let mut s = s.trim_matches(is_symbol);

    let parenthesised = s.len() > 2 && s.starts_with('(') && s.ends_with(')');
    if parenthesised {
        s = s[1..s.len() - 1].trim_matches(is_symbol);
    }
    // "-R$ 5,00"
    let negative = s.starts_with('-');
    if negative {
        s = s[1..].trim_start_matches(is_symbol);
    }

    let normalized = if s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else if is_dot_grouped(s) {
        s.replace('.', "")
    } else if s.matches('.').count() > 1 {
        return None;
    } else {
        s.to_string()
    };

    let v: f64 = normalized.parse().ok()?;
    if !v.is_finite() {
        return None;
    }
    Some(if parenthesised ^ negative { -v } else { v })
}

/// "1.500", "12.000.000": every group after a dot has three digits.
fn is_dot_grouped(s: &str) -> bool {
    let mut groups = s.split('.');
    let head = groups.next().unwrap_or("");
    let head = head.strip_prefix('+').unwrap_or(head);
    let mut rest = groups.peekable();
    rest.peek().is_some()
        && (1..=3).contains(&head.len())
        && !head.starts_with('0')
        && head.chars().all(|c| c.is_ascii_digit())
        && rest.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

/// Day-first for slashed dates, ISO otherwise. Unknown shapes are `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
    const DATETIME_FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ];
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                .map(|dt| dt.date())
        })
}

/// Month number from a "Mês Ano" cell: "Janeiro 2024", "March 2024",
/// "01/2024" or "2024-01".
pub fn parse_month_year(raw: &str, cfg: &Config) -> Option<u32> {
    let parts: Vec<&str> = raw
        .split(|c: char| c.is_whitespace() || c == '/' || c == '-')
        .filter(|p| !p.is_empty())
        .collect();
    let first = parts.first()?;
    if let Some(m) = cfg.month_from_name(first) {
        return Some(m);
    }
    let numbers: Vec<u32> = parts.iter().filter_map(|p| p.parse().ok()).collect();
    match numbers.as_slice() {
        [y, m] if *y > 999 && (1..=12).contains(m) => Some(*m),
        [m, y] if *y > 999 && (1..=12).contains(m) => Some(*m),
        _ => None,
    }
}

/// Uppercase the first letter of every word, lowercase the rest. A word
/// starts after any non-alphabetic character.
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_alpha = false;
    for c in raw.trim().chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

pub fn is_revenue_label(label: &str, marker: &str) -> bool {
    let marker = marker.trim().to_lowercase();
    !marker.is_empty() && label.to_lowercase().contains(&marker)
}

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

/// Turn one raw snapshot into normalized records. The table is only read.
pub fn normalize(table: &RawTable, source_year: i32, cfg: &Config) -> Result<Dataset> {
    if table.headers.iter().all(|h| h.trim().is_empty()) {
        return Err(PanelError::NotTabular("no header row".into()));
    }

    let mut cols = std::collections::BTreeMap::new();
    let mut fields = BTreeSet::new();
    for field in ALL_FIELDS {
        let idx = table.column(cfg.columns.aliases(field));
        if idx.is_some() {
            fields.insert(field);
        }
        cols.insert(field, idx);
    }
    let col = |field: Field| cols.get(&field).copied().flatten();

    let mut bad_amounts = 0usize;
    let mut bad_dates = 0usize;
    let mut records = Vec::with_capacity(table.len());

    for i in 0..table.len() {
        let account_label = table
            .cell(i, col(Field::Account))
            .map(title_case)
            .unwrap_or_default();

        let value = match table.cell(i, col(Field::Value)) {
            Some(raw) => parse_number(raw).unwrap_or_else(|| {
                bad_amounts += 1;
                0.0
            }),
            None => 0.0,
        };

        let (revenue_value, expense_value) = if is_revenue_label(&account_label, &cfg.revenue_marker) {
            (value, 0.0)
        } else {
            (0.0, value)
        };

        let category = table
            .cell(i, col(Field::Category))
            .map(title_case)
            .unwrap_or_else(|| cfg.unclassified_category.clone());

        let expense_type = classify(table.cell(i, col(Field::TypeTag)), &cfg.type_rules);

        let date = match table.cell(i, col(Field::Date)) {
            Some(raw) => {
                let parsed = parse_date(raw);
                if parsed.is_none() {
                    bad_dates += 1;
                }
                parsed
            }
            None => None,
        };
        let month = date.map(|d| d.month()).or_else(|| {
            table
                .cell(i, col(Field::MonthYear))
                .and_then(|raw| parse_month_year(raw, cfg))
        });
        let month_name = month.and_then(|m| cfg.month_name(m)).map(str::to_string);

        records.push(Record {
            account_label,
            value,
            revenue_value,
            expense_value,
            expense_type,
            category,
            date,
            month,
            month_name,
            source_year,
            user: table.cell(i, col(Field::User)).map(str::to_string),
            vehicle: table.cell(i, col(Field::Vehicle)).map(str::to_string),
            odometer_km: table.cell(i, col(Field::Odometer)).and_then(parse_number),
            fuel_liters: table.cell(i, col(Field::Liters)).and_then(parse_number),
            description: table.cell(i, col(Field::Description)).map(str::to_string),
        });
    }

    if cfg.infer_types_from_category {
        infer_types_from_category(&mut records, &cfg.category_rules);
    }

    debug!(
        year = source_year,
        rows = records.len(),
        bad_amounts,
        bad_dates,
        "normalized snapshot"
    );

    Ok(Dataset { records, fields })
}

// ---------------------------------------------------------------------------
// to_table
// ---------------------------------------------------------------------------

/// Write records back as a table using canonical headers and canonical cell
/// forms. Normalizing the result gives back the same records.
pub fn to_table(dataset: &Dataset, cfg: &Config) -> RawTable {
    let fields: Vec<Field> = ALL_FIELDS.into_iter().filter(|f| dataset.has(*f)).collect();
    let headers = fields
        .iter()
        .map(|f| cfg.columns.canonical(*f).to_string())
        .collect();
    let mut table = RawTable::new(headers);

    for r in &dataset.records {
        let row = fields
            .iter()
            .map(|field| match field {
                Field::Account => Some(r.account_label.clone()).filter(|s| !s.is_empty()),
                Field::Value => Some(decimal(r.value)),
                Field::TypeTag => Some(cfg.type_label(r.expense_type).to_string()),
                Field::Category => Some(r.category.clone()),
                Field::Date => r.date.map(|d| d.format("%Y-%m-%d").to_string()),
                Field::MonthYear => match (r.date, r.month) {
                    (None, Some(m)) => cfg.month_name(m).map(|n| format!("{n} {}", r.source_year)),
                    _ => None,
                },
                Field::User => r.user.clone(),
                Field::Vehicle => r.vehicle.clone(),
                Field::Odometer => r.odometer_km.map(decimal),
                Field::Liters => r.fuel_liters.map(decimal),
                Field::Description => r.description.clone(),
            })
            .collect();
        table.push_row(row);
    }
    table
}

use colored::{ColoredString, Colorize};
use comfy_table::{Cell as TableCell, CellAlignment, Table as TextTable};

use crate::config::Config;
use crate::fmt::{money_with, percent, plain, variation};
use crate::views::{Cell, Chart, MetricCard, Series, Table, ValueFormat, ViewReport};

const BAR_WIDTH: usize = 30;

// ---------------------------------------------------------------------------
// Pure formatting functions (view report → String)
// ---------------------------------------------------------------------------

pub fn format_report(report: &ViewReport, cfg: &Config) -> String {
    let mut out = format!("{}", report.title.bold());

    if !report.cards.is_empty() {
        out.push_str(&format!("\n{}", format_cards(&report.cards, cfg)));
    }
    for chart in &report.charts {
        out.push_str(&format!("\n\n{}", format_chart(chart, cfg)));
    }
    for table in &report.tables {
        out.push_str(&format!("\n\n{}", format_table(table, cfg)));
    }
    for notice in &report.notices {
        out.push_str(&format!("\n{}", notice.yellow()));
    }
    out
}

pub fn format_cards(cards: &[MetricCard], cfg: &Config) -> String {
    let show_delta = cards.iter().any(|c| c.delta.is_some());
    let mut table = TextTable::new();
    if show_delta {
        table.set_header(vec!["Indicador", "Valor", "Δ"]);
    } else {
        table.set_header(vec!["Indicador", "Valor"]);
    }
    for card in cards {
        let mut row = vec![
            TableCell::new(&card.label),
            TableCell::new(value(card.value, &card.format, cfg)).set_alignment(CellAlignment::Right),
        ];
        if show_delta {
            row.push(TableCell::new(card.delta.map(percent).unwrap_or_default()));
        }
        table.add_row(row);
    }
    table.to_string()
}

pub fn format_chart(chart: &Chart, cfg: &Config) -> String {
    match chart {
        Chart::Bar {
            title,
            bars,
            format,
        } => {
            let max = bars.iter().map(|(_, v)| v.abs()).fold(0.0, f64::max);
            let mut table = TextTable::new();
            table.set_header(vec!["", "Valor", ""]);
            for (label, v) in bars {
                table.add_row(vec![
                    TableCell::new(label),
                    TableCell::new(value(*v, format, cfg)).set_alignment(CellAlignment::Right),
                    TableCell::new(paint(bar(*v, max), cfg.color("primary").as_deref())),
                ]);
            }
            format!("{}\n{table}", title.bold())
        }
        Chart::Pie { title, slices } => {
            let total: f64 = slices.iter().map(|(_, v)| v).sum();
            let max = slices.iter().map(|(_, v)| v.abs()).fold(0.0, f64::max);
            let mut table = TextTable::new();
            table.set_header(vec!["", "Valor", "%", ""]);
            for (label, v) in slices {
                let share = if total != 0.0 { v / total * 100.0 } else { 0.0 };
                table.add_row(vec![
                    TableCell::new(label),
                    TableCell::new(money_with(*v, &cfg.currency_symbol))
                        .set_alignment(CellAlignment::Right),
                    TableCell::new(percent(share)).set_alignment(CellAlignment::Right),
                    TableCell::new(paint(bar(*v, max), cfg.color("secondary").as_deref())),
                ]);
            }
            format!("{}\n{table}", title.bold())
        }
        Chart::Line {
            title,
            series,
            format,
        } => format!("{}\n{}", title.bold(), series_grid(series, format, cfg)),
        Chart::GroupedBar { title, series } => format!(
            "{}\n{}",
            title.bold(),
            series_grid(series, &ValueFormat::Currency, cfg)
        ),
        Chart::Heatmap {
            title,
            rows,
            columns,
            values,
        } => {
            let mut table = TextTable::new();
            let mut header = vec![String::new()];
            header.extend(columns.iter().cloned());
            table.set_header(header);
            for (label, cells) in rows.iter().zip(values) {
                let mut row = vec![TableCell::new(label)];
                row.extend(cells.iter().map(|c| {
                    TableCell::new(
                        c.map(|v| money_with(v, &cfg.currency_symbol))
                            .unwrap_or_else(|| "\u{2014}".to_string()),
                    )
                    .set_alignment(CellAlignment::Right)
                }));
                table.add_row(row);
            }
            format!("{}\n{table}", title.bold())
        }
    }
}

pub fn format_table(table: &Table, cfg: &Config) -> String {
    if table.rows.is_empty() {
        return format!("{}\nNenhum registro.", table.title.bold());
    }
    let mut out = TextTable::new();
    out.set_header(table.columns.clone());
    for row in &table.rows {
        out.add_row(row.iter().map(|c| table_cell(c, cfg)).collect::<Vec<_>>());
    }
    format!("{}\n{out}", table.title.bold())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn value(v: f64, format: &ValueFormat, cfg: &Config) -> String {
    match format {
        ValueFormat::Currency => money_with(v, &cfg.currency_symbol),
        ValueFormat::Percentage => percent(v),
        ValueFormat::Plain { suffix } => plain(v, suffix),
    }
}

fn table_cell(cell: &Cell, cfg: &Config) -> TableCell {
    match cell {
        Cell::Text(s) => TableCell::new(s),
        Cell::Date(d) => TableCell::new(d.format("%d/%m/%Y")),
        Cell::Currency(v) => {
            let s = money_with(*v, &cfg.currency_symbol);
            let s = if *v < 0.0 { s.red().to_string() } else { s };
            TableCell::new(s).set_alignment(CellAlignment::Right)
        }
        Cell::Percentage(v) => TableCell::new(percent(*v)).set_alignment(CellAlignment::Right),
        Cell::Number { value, suffix } => {
            TableCell::new(plain(*value, suffix)).set_alignment(CellAlignment::Right)
        }
        Cell::Count(n) => TableCell::new(n).set_alignment(CellAlignment::Right),
        Cell::Variation(v) => {
            let s = variation(*v);
            let s = match v {
                Some(x) if *x > 0.0 => s.red().to_string(),
                Some(x) if *x < 0.0 => s.green().to_string(),
                _ => s,
            };
            TableCell::new(s)
        }
        Cell::Empty => TableCell::new(""),
    }
}

/// Series laid out as a grid: one row per x label, one column per series.
fn series_grid(series: &[Series], format: &ValueFormat, cfg: &Config) -> String {
    let mut labels: Vec<&str> = Vec::new();
    for s in series {
        for (x, _) in &s.points {
            if !labels.contains(&x.as_str()) {
                labels.push(x);
            }
        }
    }

    let mut table = TextTable::new();
    let mut header = vec![String::new()];
    header.extend(series.iter().map(|s| s.name.clone()));
    table.set_header(header);
    for x in labels {
        let mut row = vec![TableCell::new(x)];
        for s in series {
            let text = s
                .points
                .iter()
                .find(|(px, _)| px == x)
                .map(|(_, v)| value(*v, format, cfg))
                .unwrap_or_default();
            row.push(TableCell::new(text).set_alignment(CellAlignment::Right));
        }
        table.add_row(row);
    }
    table.to_string()
}

fn bar(v: f64, max: f64) -> String {
    if max <= 0.0 || !v.is_finite() {
        return String::new();
    }
    let len = ((v.abs() / max) * BAR_WIDTH as f64).round() as usize;
    "\u{2588}".repeat(len.max(usize::from(v != 0.0)))
}

fn paint(s: String, hex: Option<&str>) -> ColoredString {
    match hex.and_then(rgb) {
        Some((r, g, b)) => s.truecolor(r, g, b),
        None => s.normal(),
    }
}

/// "#3498db" -> (52, 152, 219)
fn rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

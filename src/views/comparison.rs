use std::collections::BTreeMap;

use tracing::debug;

use super::shape::{
    balance_growth_pct, group_sum, growth_pct, pivot_category_year, pivot_month_year, sorted_desc,
};
use super::{require, Cell, Chart, MetricCard, Series, Table, ValueFormat, ViewReport};
use crate::config::Config;
use crate::error::{PanelError, Result};
use crate::metrics::{aggregate, Metrics};
use crate::models::{Dataset, ExpenseType, Field, Record};

pub const TITLE: &str = "Comparativo Anual";

#[derive(Debug, Clone, Default)]
pub struct CompareFilter {
    /// Empty means every year in the dataset.
    pub years: Vec<i32>,
    /// Empty means the five largest categories.
    pub categories: Vec<String>,
}

/// The requested years that actually have rows, ascending. Needs two.
pub fn resolve_years(ds: &Dataset, requested: &[i32]) -> Result<Vec<i32>> {
    let present = ds.years();
    let years: Vec<i32> = if requested.is_empty() {
        present.into_iter().collect()
    } else {
        let mut ys: Vec<i32> = requested.iter().copied().filter(|y| present.contains(y)).collect();
        ys.sort_unstable();
        ys.dedup();
        ys
    };
    if years.len() < 2 {
        return Err(PanelError::NotEnoughYears);
    }
    Ok(years)
}

pub fn build(ds: &Dataset, filter: &CompareFilter, cfg: &Config) -> Result<ViewReport> {
    require(ds, TITLE, &[Field::Value], cfg)?;
    let years = resolve_years(ds, &filter.years)?;
    debug!(?years, "assembling annual comparison");

    let by_year: BTreeMap<i32, Metrics> = years
        .iter()
        .map(|y| aggregate(&ds.records, Some(*y)).map(|m| (*y, m)))
        .collect::<Result<_>>()?;
    let rows: Vec<&Record> = ds
        .records
        .iter()
        .filter(|r| years.contains(&r.source_year))
        .collect();

    let first = years[0];
    let last = years[years.len() - 1];
    let mut report = ViewReport::new(format!("{TITLE} {first}-{last}"));

    // Year over year, latest against the one before it
    let prev = &by_year[&years[years.len() - 2]];
    let cur = &by_year[&last];
    report.cards.push(
        MetricCard::currency(format!("Receitas {last}"), cur.total_revenue)
            .with_delta(growth_pct(cur.total_revenue, prev.total_revenue)),
    );
    report.cards.push(
        MetricCard::currency(format!("Despesas {last}"), cur.total_expenses)
            .with_delta(growth_pct(cur.total_expenses, prev.total_expenses)),
    );
    report.cards.push(
        MetricCard::currency(format!("Balanço {last}"), cur.balance)
            .with_delta(balance_growth_pct(cur.balance, prev.balance)),
    );

    report.charts.push(Chart::currency_bar(
        "Despesas Totais por Ano",
        by_year
            .iter()
            .map(|(y, m)| (y.to_string(), m.total_expenses))
            .collect(),
    ));

    report.tables.push(comparison_table(&years, &by_year, cfg));
    category_section(&mut report, &rows, &years, &filter.categories);
    monthly_section(&mut report, &rows, &years, cfg);

    Ok(report)
}

fn comparison_table(years: &[i32], by_year: &BTreeMap<i32, Metrics>, cfg: &Config) -> Table {
    let mut columns = vec!["Métrica".to_string()];
    columns.extend(years.iter().map(|y| y.to_string()));
    let mut table = Table {
        title: "Tabela Comparativa".into(),
        columns,
        rows: Vec::new(),
    };

    let row = |label: String, cell: &dyn Fn(&Metrics) -> Cell| -> Vec<Cell> {
        let mut r = vec![Cell::Text(label)];
        r.extend(years.iter().map(|y| cell(&by_year[y])));
        r
    };
    table.push(row("Despesa Total".into(), &|m| Cell::Currency(m.total_expenses)));
    for kind in ExpenseType::VOCABULARY {
        table.push(row(format!("Despesas {}", cfg.type_label(kind)), &|m| {
            Cell::Currency(m.type_total(kind))
        }));
    }
    for kind in ExpenseType::VOCABULARY {
        table.push(row(format!("% {}", cfg.type_label(kind)), &|m| {
            Cell::Percentage(m.type_percent(kind))
        }));
    }
    table
}

fn pick_categories(rows: &[&Record], requested: &[String]) -> Vec<String> {
    let totals = group_sum(
        rows,
        |r| (r.expense_value != 0.0).then(|| r.category.clone()),
        |r| r.expense_value,
    );
    if requested.is_empty() {
        return sorted_desc(totals).into_iter().take(5).map(|(c, _)| c).collect();
    }
    let mut picked = Vec::new();
    for want in requested {
        if let Some(found) = totals.keys().find(|c| c.to_lowercase() == want.to_lowercase()) {
            if !picked.contains(found) {
                picked.push(found.clone());
            }
        }
    }
    picked
}

fn category_section(
    report: &mut ViewReport,
    rows: &[&Record],
    years: &[i32],
    requested: &[String],
) {
    let categories = pick_categories(rows, requested);
    if categories.is_empty() {
        report
            .notices
            .push("Nenhuma categoria selecionada para o comparativo.".into());
        return;
    }
    let pivot = pivot_category_year(rows, &categories, years);

    report.charts.push(Chart::GroupedBar {
        title: "Despesas por Categoria e Ano".into(),
        series: years
            .iter()
            .map(|y| Series {
                name: y.to_string(),
                points: categories
                    .iter()
                    .map(|c| (c.clone(), pivot.get(c, *y).unwrap_or(0.0)))
                    .collect(),
            })
            .collect(),
    });

    let mut columns = vec!["Categoria".to_string()];
    columns.extend(years.iter().map(|y| y.to_string()));
    columns.extend(years.windows(2).map(|w| format!("Var {}-{}", w[0], w[1])));
    let mut table = Table {
        title: "Variação Percentual entre Anos".into(),
        columns,
        rows: Vec::new(),
    };
    for (i, category) in pivot.rows.iter().enumerate() {
        let values = &pivot.values[i];
        let mut row = vec![Cell::text(category)];
        row.extend(values.iter().map(|v| v.map(Cell::Currency).unwrap_or(Cell::Empty)));
        row.extend(values.windows(2).map(|w| {
            Cell::Variation(growth_pct(w[1].unwrap_or(0.0), w[0].unwrap_or(0.0)))
        }));
        table.push(row);
    }
    report.tables.push(table);

    report.charts.push(Chart::Line {
        title: "Evolução de Despesas por Categoria".into(),
        series: pivot
            .rows
            .iter()
            .zip(&pivot.values)
            .map(|(category, values)| Series {
                name: category.clone(),
                points: years
                    .iter()
                    .zip(values)
                    .map(|(y, v)| (y.to_string(), v.unwrap_or(0.0)))
                    .collect(),
            })
            .collect(),
        format: ValueFormat::Currency,
    });
}

fn monthly_section(report: &mut ViewReport, rows: &[&Record], years: &[i32], cfg: &Config) {
    let monthly = group_sum(
        rows,
        |r| r.month.map(|m| (r.source_year, m)),
        |r| r.expense_value,
    );
    if monthly.is_empty() {
        report
            .notices
            .push("Sem datas válidas para o comparativo mensal.".into());
        return;
    }

    report.charts.push(Chart::Line {
        title: "Comparativo de Despesas Mensais".into(),
        series: years
            .iter()
            .map(|y| Series {
                name: y.to_string(),
                points: monthly
                    .range((*y, 1)..=(*y, 12))
                    .filter_map(|((_, m), v)| cfg.month_abbreviation(*m).map(|n| (n.to_string(), *v)))
                    .collect(),
            })
            .collect(),
        format: ValueFormat::Currency,
    });

    let heat = pivot_month_year(rows, years, cfg);
    report.charts.push(Chart::Heatmap {
        title: "Heatmap de Despesas Mensais por Ano".into(),
        rows: heat.rows,
        columns: heat.years.iter().map(|y| y.to_string()).collect(),
        values: heat.values,
    });
}

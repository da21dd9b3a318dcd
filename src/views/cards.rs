use std::cmp::Reverse;
use std::collections::BTreeSet;

use tracing::debug;

use super::shape::{group_count, group_sum, outliers, sorted_desc, top_n_with_other};
use super::{require, Cell, Chart, MetricCard, Series, Table, ViewReport};
use crate::config::Config;
use crate::error::{PanelError, Result};
use crate::fmt::money_with;
use crate::metrics::{filter_year, ratio_if_positive};
use crate::models::{Dataset, Field, RawTable, Record};

pub const TITLE: &str = "Cartões Corporativos";

const NO_USER: &str = "-";

/// Which card transactions to show. Empty lists mean "all".
#[derive(Debug, Clone, Default)]
pub struct CardFilter {
    pub year: i32,
    pub users: Vec<String>,
    pub months: Vec<u32>,
}

/// Card transactions carry the card number in the account column.
pub fn is_card_account(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_digit())
}

fn user_of(r: &Record) -> String {
    r.user.clone().unwrap_or_else(|| NO_USER.to_string())
}

/// Card rows of the year, before user and month selections.
fn card_rows<'a>(ds: &'a Dataset, year: i32, cfg: &Config) -> Result<Vec<&'a Record>> {
    require(ds, TITLE, &[Field::User, Field::Account, Field::Value, Field::Date], cfg)?;
    let rows: Vec<&Record> = filter_year(&ds.records, Some(year))?
        .into_iter()
        .filter(|r| is_card_account(&r.account_label))
        .collect();
    if rows.is_empty() {
        return Err(PanelError::NoRows { view: TITLE.into() });
    }
    Ok(rows)
}

/// The filtered card transactions, in table order (most recent first).
pub fn select<'a>(ds: &'a Dataset, filter: &CardFilter, cfg: &Config) -> Result<Vec<&'a Record>> {
    let mut rows: Vec<&Record> = card_rows(ds, filter.year, cfg)?
        .into_iter()
        .filter(|r| {
            filter.users.is_empty()
                || r.user
                    .as_deref()
                    .is_some_and(|u| filter.users.iter().any(|f| f.eq_ignore_ascii_case(u)))
        })
        .filter(|r| {
            filter.months.is_empty() || r.month.is_some_and(|m| filter.months.contains(&m))
        })
        .collect();
    if rows.is_empty() {
        return Err(PanelError::NoRows { view: TITLE.into() });
    }
    // Undated rows sort last
    rows.sort_by_key(|r| Reverse(r.date));
    Ok(rows)
}

pub fn build(ds: &Dataset, filter: &CardFilter, cfg: &Config) -> Result<ViewReport> {
    let all_users: BTreeSet<String> = card_rows(ds, filter.year, cfg)?
        .into_iter()
        .map(user_of)
        .collect();
    let rows = select(ds, filter, cfg)?;
    debug!(year = filter.year, rows = rows.len(), "assembling card transactions");

    let mut report = ViewReport::new(format!("{TITLE} - {}", filter.year));

    let total: f64 = rows.iter().map(|r| r.value).sum();
    let per_user = group_sum(&rows, |r| Some(user_of(r)), |r| r.value);
    let average_per_user = ratio_if_positive(per_user.values().sum(), per_user.len() as f64);
    let count = rows.len();

    report.cards.push(MetricCard::currency("Total Gasto", total));
    report
        .cards
        .push(MetricCard::currency("Média por Funcionário", average_per_user));
    report
        .cards
        .push(MetricCard::plain("Total de Transações", count as f64, ""));
    report.cards.push(MetricCard::currency(
        "Valor Médio por Transação",
        ratio_if_positive(total, count as f64),
    ));

    report.charts.push(Chart::currency_bar(
        "Gastos Totais por Funcionário",
        sorted_desc(per_user),
    ));

    let by_category = group_sum(&rows, |r| Some(r.category.clone()), |r| r.value);
    report.charts.push(Chart::Pie {
        title: "Gastos por Categoria".into(),
        slices: top_n_with_other(by_category.clone(), cfg.top_n, &cfg.other_label),
    });

    // Monthly totals and transaction counts
    let monthly_value = group_sum(&rows, |r| r.month, |r| r.value);
    let monthly_count = group_count(&rows, |r| r.month);
    let mut monthly = Table::new("Evolução Mensal", &["Mês", "Valor", "Transações"]);
    for (month, value) in &monthly_value {
        monthly.push(vec![
            Cell::opt_text(cfg.month_name(*month)),
            Cell::Currency(*value),
            Cell::Count(monthly_count.get(month).copied().unwrap_or(0)),
        ]);
    }
    let month_points = |f: &dyn Fn(u32) -> f64| -> Vec<(String, f64)> {
        monthly_value
            .keys()
            .filter_map(|m| cfg.month_name(*m).map(|n| (n.to_string(), f(*m))))
            .collect()
    };
    report.charts.push(Chart::Line {
        title: format!("Gastos Mensais - {}", filter.year),
        series: vec![Series {
            name: "Valor".into(),
            points: month_points(&|m| monthly_value.get(&m).copied().unwrap_or(0.0)),
        }],
        format: super::ValueFormat::Currency,
    });
    report.charts.push(Chart::Line {
        title: format!("Quantidade de Transações - {}", filter.year),
        series: vec![Series {
            name: "Transações".into(),
            points: month_points(&|m| monthly_count.get(&m).copied().unwrap_or(0) as f64),
        }],
        format: super::ValueFormat::Plain {
            suffix: String::new(),
        },
    });
    report.tables.push(monthly);

    let with_description = ds.has(Field::Description);
    report
        .tables
        .push(transaction_table("Transações Detalhadas", &rows, with_description));

    // Top three categories compared across users
    if all_users.len() > 1 {
        let top3: Vec<String> = sorted_desc(by_category)
            .into_iter()
            .take(3)
            .map(|(c, _)| c)
            .collect();
        let sums = group_sum(
            &rows,
            |r| top3.contains(&r.category).then(|| (r.category.clone(), user_of(r))),
            |r| r.value,
        );
        let users: BTreeSet<String> = rows.iter().map(|r| user_of(r)).collect();
        let series = top3
            .iter()
            .map(|category| Series {
                name: category.clone(),
                points: users
                    .iter()
                    .map(|u| {
                        let v = sums.get(&(category.clone(), u.clone())).copied().unwrap_or(0.0);
                        (u.clone(), v)
                    })
                    .collect(),
            })
            .collect();
        report.charts.push(Chart::GroupedBar {
            title: "Comparativo de Principais Categorias por Funcionário".into(),
            series,
        });
    }

    // Audit
    let (limit, mut flagged) = outliers(&rows);
    match limit {
        Some(limit) if !flagged.is_empty() => {
            report.notices.push(format!(
                "Foram identificadas {} transações com valores atípicos (acima de {}).",
                flagged.len(),
                money_with(limit, &cfg.currency_symbol)
            ));
            flagged.sort_by(|a, b| b.value.total_cmp(&a.value));
            report
                .tables
                .push(transaction_table("Relatório de Auditoria", &flagged, with_description));
        }
        _ => report
            .notices
            .push("Não foram identificadas transações com valores atípicos.".into()),
    }

    Ok(report)
}

fn transaction_table(title: &str, rows: &[&Record], with_description: bool) -> Table {
    let mut columns = vec!["Data", "Usuário", "Categoria", "Valor"];
    if with_description {
        columns.push("Descrição");
    }
    let mut table = Table::new(title, &columns);
    for r in rows {
        let mut row = vec![
            r.date.map(Cell::Date).unwrap_or(Cell::Empty),
            Cell::opt_text(r.user.as_deref()),
            Cell::text(&r.category),
            Cell::Currency(r.value),
        ];
        if with_description {
            row.push(Cell::opt_text(r.description.as_deref()));
        }
        table.push(row);
    }
    table
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

pub fn default_export_name(year: i32) -> String {
    format!("transacoes_cartao_{year}.csv")
}

/// The selected transactions as a table ready to be written out.
pub fn export_table(rows: &[&Record], with_description: bool, cfg: &Config) -> RawTable {
    let mut headers = vec![
        cfg.columns.canonical(Field::Date).to_string(),
        cfg.columns.canonical(Field::User).to_string(),
        cfg.columns.canonical(Field::Category).to_string(),
        cfg.columns.canonical(Field::Value).to_string(),
    ];
    if with_description {
        headers.push(cfg.columns.canonical(Field::Description).to_string());
    }
    let mut table = RawTable::new(headers);
    for r in rows {
        let mut row = vec![
            r.date.map(|d| d.format("%d/%m/%Y").to_string()),
            r.user.clone(),
            Some(r.category.clone()),
            Some(money_with(r.value, &cfg.currency_symbol)),
        ];
        if with_description {
            row.push(r.description.clone());
        }
        table.push_row(row);
    }
    table
}

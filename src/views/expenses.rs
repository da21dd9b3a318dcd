use tracing::debug;

use super::shape::{group_sum, top_n_with_other};
use super::{require, Cell, Chart, MetricCard, Table, ViewReport};
use crate::config::Config;
use crate::error::Result;
use crate::metrics::{aggregate_rows, filter_year};
use crate::models::{Dataset, ExpenseType, Field};

pub const TITLE: &str = "Gastos Gerais";

pub fn build(ds: &Dataset, year: i32, cfg: &Config) -> Result<ViewReport> {
    require(ds, TITLE, &[Field::Value], cfg)?;
    let rows = filter_year(&ds.records, Some(year))?;
    let m = aggregate_rows(&rows, Some(year));
    debug!(year, rows = rows.len(), "assembling general expenses");

    let mut report = ViewReport::new(format!("{TITLE} - {year}"));

    report
        .cards
        .push(MetricCard::currency("Despesa Total", m.total_expenses));
    for kind in ExpenseType::VOCABULARY {
        report.cards.push(
            MetricCard::currency(format!("Despesas {}", cfg.type_label(kind)), m.type_total(kind))
                .with_delta(Some(m.type_percent(kind))),
        );
    }

    let by_type = ExpenseType::VOCABULARY
        .iter()
        .map(|k| (cfg.type_label(*k).to_string(), m.type_total(*k)))
        .collect();
    report.charts.push(Chart::currency_bar("Despesas por Tipo", by_type));

    report.charts.push(Chart::Pie {
        title: "Distribuição por Categoria".into(),
        slices: top_n_with_other(m.expenses_by_category.clone(), cfg.top_n, &cfg.other_label),
    });

    // Type x category, sorted by type then largest value
    let mut pairs: Vec<((String, String), f64)> = group_sum(
        &rows,
        |r| {
            (r.expense_value != 0.0)
                .then(|| (cfg.type_label(r.expense_type).to_string(), r.category.clone()))
        },
        |r| r.expense_value,
    )
    .into_iter()
    .collect();
    pairs.sort_by(|a, b| a.0 .0.cmp(&b.0 .0).then(b.1.total_cmp(&a.1)));

    let mut detail = Table::new(
        "Tabela Detalhada de Despesas",
        &["Tipo de Despesa", "Categoria", "Valor"],
    );
    for ((kind, category), value) in pairs {
        detail.push(vec![Cell::Text(kind), Cell::Text(category), Cell::Currency(value)]);
    }
    report.tables.push(detail);

    if m.expenses_by_month.is_empty() {
        report
            .notices
            .push("Sem datas válidas para a análise mensal.".into());
    } else {
        let monthly = m
            .expenses_by_month
            .iter()
            .filter_map(|(month, v)| cfg.month_name(*month).map(|n| (n.to_string(), *v)))
            .collect();
        report
            .charts
            .push(Chart::currency_bar(format!("Despesas Mensais - {year}"), monthly));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PanelError;
    use crate::views::fixtures::dataset;

    const CSV: &str = "\
Conta,Valor,GASTOS,Categoria,Data
Medição 01,\"R$ 20.000,00\",,Obras,2024-01-10
Aluguel,\"R$ 3.000,00\",Fixo,Aluguel,2024-01-05
Aluguel,\"R$ 3.000,00\",Fixo,Aluguel,2024-02-05
Diesel,\"R$ 1.500,00\",Variável,Combustível,2024-02-12
Notebook,\"R$ 4.500,00\",Investimento,Equipamentos,2024-03-01
Viagem,\"R$ 800,00\",Saída Não Operacional,Viagens,2024-03-15
Perfumes,\"R$ 1.200,00\",TH Parfum,Estoque,
Brindes,\"R$ 100,00\",Variável,Marketing,2024-03-20
Cafe,\"R$ 50,00\",Variável,Copa,2024-03-21
";

    #[test]
    fn test_cards_carry_type_share_as_delta() {
        let cfg = Config::default();
        let report = build(&dataset(2024, CSV), 2024, &cfg).unwrap();
        let total = report.card("Despesa Total").unwrap();
        assert_eq!(total.value, 14_150.0);
        let fixed = report.card("Despesas Fixo").unwrap();
        assert_eq!(fixed.value, 6_000.0);
        let share = fixed.delta.unwrap();
        assert!((share - 6_000.0 / 14_150.0 * 100.0).abs() < 1e-9);
        assert!(report.card("Despesas TH Parfum").is_some());
    }

    #[test]
    fn test_category_pie_is_top_five_plus_other() {
        let cfg = Config::default();
        let report = build(&dataset(2024, CSV), 2024, &cfg).unwrap();
        let Some(Chart::Pie { slices, .. }) = report.chart("Distribuição por Categoria") else {
            panic!("missing pie");
        };
        assert_eq!(slices.len(), 6);
        assert_eq!(slices[0], ("Aluguel".to_string(), 6_000.0));
        assert_eq!(slices[5], ("Outros".to_string(), 150.0));
    }

    #[test]
    fn test_detail_table_sorted_by_type_then_value() {
        let cfg = Config::default();
        let report = build(&dataset(2024, CSV), 2024, &cfg).unwrap();
        let table = report.table("Tabela Detalhada de Despesas").unwrap();
        let variable: Vec<&Cell> = table
            .rows
            .iter()
            .filter(|r| r[0] == Cell::text("Variável"))
            .map(|r| &r[1])
            .collect();
        assert_eq!(
            variable,
            vec![&Cell::text("Combustível"), &Cell::text("Marketing"), &Cell::text("Copa")]
        );
        // revenue rows carry no expense and stay out of the breakdown
        assert!(table.rows.iter().all(|r| r[1] != Cell::text("Obras")));
    }

    #[test]
    fn test_monthly_chart_uses_month_names() {
        let cfg = Config::default();
        let report = build(&dataset(2024, CSV), 2024, &cfg).unwrap();
        let Some(Chart::Bar { bars, .. }) = report.chart("Despesas Mensais - 2024") else {
            panic!("missing monthly chart");
        };
        let names: Vec<&str> = bars.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Janeiro", "Fevereiro", "Março"]);
    }

    #[test]
    fn test_unknown_year_is_reported() {
        let cfg = Config::default();
        let err = build(&dataset(2024, CSV), 2019, &cfg).unwrap_err();
        assert!(matches!(err, PanelError::NoSuchYear(2019)));
    }

    #[test]
    fn test_missing_value_column() {
        let cfg = Config::default();
        let err = build(&dataset(2024, "Conta,Categoria\nA,B\n"), 2024, &cfg).unwrap_err();
        assert!(matches!(err, PanelError::MissingColumns { .. }));
    }
}

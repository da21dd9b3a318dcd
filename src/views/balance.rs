use tracing::debug;

use super::{require, Chart, MetricCard, ViewReport};
use crate::config::Config;
use crate::error::Result;
use crate::metrics::aggregate;
use crate::models::{Dataset, ExpenseType, Field};

pub const TITLE: &str = "Balanço Financeiro";

pub fn build(ds: &Dataset, year: i32, cfg: &Config) -> Result<ViewReport> {
    require(ds, TITLE, &[Field::Account, Field::Value], cfg)?;
    let m = aggregate(&ds.records, Some(year))?;
    debug!(year, rows = m.rows, balance = m.balance, "assembling balance");

    let mut report = ViewReport::new(format!("{TITLE} - {year}"));

    // Summary
    report
        .cards
        .push(MetricCard::currency("Receitas Totais", m.total_revenue));
    report
        .cards
        .push(MetricCard::currency("Despesas Totais", m.total_expenses));
    report.cards.push(MetricCard::currency("Balanço", m.balance));
    report
        .cards
        .push(MetricCard::percentage("Margem de Lucro", m.profit_margin_pct));

    // Operational
    report
        .cards
        .push(MetricCard::percentage("Despesas Fixas", m.fixed_share_pct));
    report
        .cards
        .push(MetricCard::plain("Índice de Liquidez", m.liquidity, ""));
    report.cards.push(MetricCard::percentage(
        "Margem de Contribuição",
        m.contribution_margin_pct(),
    ));
    report
        .cards
        .push(MetricCard::currency("Ponto de Equilíbrio", m.break_even));

    // Strategic
    report.cards.push(MetricCard::percentage("ROI", m.roi_pct));
    report
        .cards
        .push(MetricCard::plain("Payback", m.payback_months, " meses"));
    report.cards.push(MetricCard::currency("EBITDA", m.ebitda));

    report.charts.push(Chart::currency_bar(
        format!("Comparativo Financeiro - {year}"),
        vec![
            ("Receitas".to_string(), m.total_revenue),
            ("Despesas".to_string(), m.total_expenses),
        ],
    ));

    let slices: Vec<(String, f64)> = ExpenseType::VOCABULARY
        .iter()
        .map(|k| (cfg.type_label(*k).to_string(), m.type_total(*k)))
        .filter(|(_, v)| *v != 0.0)
        .collect();
    if slices.is_empty() {
        report
            .notices
            .push("Nenhuma despesa classificada neste ano.".into());
    } else {
        report.charts.push(Chart::Pie {
            title: "Tipos de Despesas".into(),
            slices,
        });
    }

    if m.unclassified_total != 0.0 {
        report.notices.push(format!(
            "{} das despesas não têm tipo reconhecido.",
            crate::fmt::money_with(m.unclassified_total, &cfg.currency_symbol)
        ));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PanelError;
    use crate::views::fixtures::dataset;

    const CSV: &str = "\
Conta,Valor,GASTOS,Data
Medição 1,\"R$ 6.000,00\",,2023-01-15
Medição 2,\"R$ 4.000,00\",,2023-02-15
Aluguel,\"R$ 3.000,00\",Fixo,2023-01-05
Diesel,\"R$ 2.000,00\",Variável,2023-02-05
Máquina,\"R$ 1.000,00\",Investimento,2023-02-20
Taxas,\"R$ 2.000,00\",Diversos,2023-02-21
";

    #[test]
    fn test_summary_and_indicators() {
        let cfg = Config::default();
        let report = build(&dataset(2023, CSV), 2023, &cfg).unwrap();
        assert_eq!(report.card("Receitas Totais").unwrap().value, 10_000.0);
        assert_eq!(report.card("Despesas Totais").unwrap().value, 8_000.0);
        assert_eq!(report.card("Balanço").unwrap().value, 2_000.0);
        assert_eq!(report.card("Margem de Lucro").unwrap().value, 20.0);
        let cm = report.card("Margem de Contribuição").unwrap().value;
        assert!((cm - 80.0).abs() < 1e-9);
        let be = report.card("Ponto de Equilíbrio").unwrap().value;
        assert!((be - 3_750.0).abs() < 1e-9);
        assert_eq!(report.card("ROI").unwrap().value, 200.0);
        // 1000 invested over an average of 5000 revenue a month
        assert!((report.card("Payback").unwrap().value - 0.2).abs() < 1e-12);
        assert_eq!(report.card("EBITDA").unwrap().value, 5_000.0);
        assert!(report.notices.iter().any(|n| n.contains("R$ 2.000,00")));
    }

    #[test]
    fn test_pie_skips_empty_types() {
        let cfg = Config::default();
        let report = build(&dataset(2023, CSV), 2023, &cfg).unwrap();
        let Some(Chart::Pie { slices, .. }) = report.chart("Tipos de Despesas") else {
            panic!("missing pie");
        };
        let names: Vec<&str> = slices.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Fixo", "Investimento", "Variável"]);
    }

    #[test]
    fn test_revenue_only_year_has_zeroed_ratios() {
        let cfg = Config::default();
        let ds = dataset(2023, "Conta,Valor\nMedição,\"R$ 1.000,00\"\n");
        let report = build(&ds, 2023, &cfg).unwrap();
        assert_eq!(report.card("Índice de Liquidez").unwrap().value, 0.0);
        assert_eq!(report.card("ROI").unwrap().value, 0.0);
        assert_eq!(report.card("Payback").unwrap().value, 0.0);
        assert_eq!(report.card("Margem de Lucro").unwrap().value, 100.0);
    }

    #[test]
    fn test_missing_year() {
        let cfg = Config::default();
        assert!(matches!(
            build(&dataset(2023, CSV), 2024, &cfg),
            Err(PanelError::NoSuchYear(2024))
        ));
    }
}

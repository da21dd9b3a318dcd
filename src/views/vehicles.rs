use std::collections::BTreeMap;

use tracing::debug;

use super::shape::{group_sum, sorted_desc};
use super::{require, Cell, Chart, MetricCard, Table, ViewReport};
use crate::config::Config;
use crate::error::{PanelError, Result};
use crate::metrics::{filter_year, km_by_vehicle, ratio_if_positive};
use crate::models::{Dataset, Field, Record};

pub const TITLE: &str = "Análise de Veículos";

#[derive(Debug, Clone, Default)]
pub struct VehicleFilter {
    pub year: i32,
    /// Empty means every vehicle.
    pub vehicles: Vec<String>,
}

pub fn select<'a>(ds: &'a Dataset, filter: &VehicleFilter, cfg: &Config) -> Result<Vec<&'a Record>> {
    require(ds, TITLE, &[Field::Vehicle], cfg)?;
    let rows: Vec<&Record> = filter_year(&ds.records, Some(filter.year))?
        .into_iter()
        .filter(|r| r.vehicle.is_some())
        .filter(|r| {
            filter.vehicles.is_empty()
                || r.vehicle
                    .as_deref()
                    .is_some_and(|v| filter.vehicles.iter().any(|f| f.eq_ignore_ascii_case(v)))
        })
        .collect();
    if rows.is_empty() {
        return Err(PanelError::NoRows { view: TITLE.into() });
    }
    Ok(rows)
}

fn vehicle_of(r: &Record) -> Option<String> {
    r.vehicle.clone()
}

pub fn build(ds: &Dataset, filter: &VehicleFilter, cfg: &Config) -> Result<ViewReport> {
    let rows = select(ds, filter, cfg)?;
    debug!(year = filter.year, rows = rows.len(), "assembling vehicle costs");

    let mut report = ViewReport::new(format!("{TITLE} - {}", filter.year));

    let per_vehicle = group_sum(&rows, vehicle_of, |r| r.expense_value);
    let total: f64 = per_vehicle.values().sum();
    report.cards.push(MetricCard::currency("Total Gasto", total));
    report.cards.push(MetricCard::currency(
        "Gasto Médio por Veículo",
        ratio_if_positive(total, per_vehicle.len() as f64),
    ));

    if ds.has(Field::Odometer) {
        let km_total: f64 = km_by_vehicle(&rows).values().sum();
        report
            .cards
            .push(MetricCard::plain("Quilometragem Total", km_total, " km"));
        let cost_per_km = ratio_if_positive(total, km_total);
        if cost_per_km > 0.0 {
            report
                .cards
                .push(MetricCard::currency("Custo por KM", cost_per_km));
        } else {
            report
                .notices
                .push("Impossível calcular custo por KM.".into());
        }
    } else {
        report
            .notices
            .push("Dados de quilometragem não disponíveis.".into());
    }

    report.charts.push(Chart::currency_bar(
        "Gastos Totais por Veículo",
        sorted_desc(per_vehicle),
    ));

    let categories = group_sum(
        &rows,
        |r| (!r.is_revenue()).then(|| r.category.clone()),
        |r| r.expense_value,
    );
    if categories.is_empty() {
        report
            .notices
            .push("Sem dados de categoria após filtrar medições.".into());
    } else {
        report.charts.push(Chart::Pie {
            title: "Distribuição de Gastos por Categoria".into(),
            slices: sorted_desc(categories),
        });
    }

    if ds.has(Field::Odometer) && ds.has(Field::Liters) {
        report.tables.push(efficiency_table(&rows));
    }
    report.tables.push(monthly_table(&rows, cfg));

    Ok(report)
}

/// km/l and cost per km for vehicles that were refuelled.
fn efficiency_table(rows: &[&Record]) -> Table {
    let fuelled: Vec<&Record> = rows
        .iter()
        .copied()
        .filter(|r| r.fuel_liters.is_some_and(|l| l > 0.0))
        .collect();
    let distance = km_by_vehicle(rows);
    let liters = group_sum(&fuelled, vehicle_of, |r| r.fuel_liters.unwrap_or(0.0));
    let cost = group_sum(&fuelled, vehicle_of, |r| r.expense_value);

    let mut table = Table::new(
        "Eficiência de Combustível",
        &["Veículo", "Quilometragem", "Combustível", "Custo Total", "Eficiência", "Custo por KM"],
    );
    for (vehicle, used) in &liters {
        let km = distance.get(vehicle).copied().unwrap_or(0.0);
        let spent = cost.get(vehicle).copied().unwrap_or(0.0);
        table.push(vec![
            Cell::text(vehicle),
            Cell::number(km, " km"),
            Cell::number(*used, " L"),
            Cell::Currency(spent),
            Cell::number(ratio_if_positive(km, *used), " km/l"),
            Cell::Currency(ratio_if_positive(spent, km)),
        ]);
    }
    table
}

/// Value, distance, fuel and cost per km for each month. A month's distance
/// is the odometer spread of each vehicle within it, summed.
fn monthly_table(rows: &[&Record], cfg: &Config) -> Table {
    let mut odometer: BTreeMap<(u32, &str), (f64, f64)> = BTreeMap::new();
    for r in rows {
        if let (Some(m), Some(v), Some(km)) = (r.month, r.vehicle.as_deref(), r.odometer_km) {
            let e = odometer.entry((m, v)).or_insert((km, km));
            e.0 = e.0.min(km);
            e.1 = e.1.max(km);
        }
    }
    let mut distance: BTreeMap<u32, f64> = BTreeMap::new();
    for ((m, _), (lo, hi)) in &odometer {
        *distance.entry(*m).or_insert(0.0) += hi - lo;
    }
    let value = group_sum(rows, |r| r.month, |r| r.expense_value);
    let liters = group_sum(rows, |r| r.month, |r| r.fuel_liters.unwrap_or(0.0));

    let mut table = Table::new(
        "Análise Mensal",
        &["Mês", "Valor", "KM", "Litros", "Custo por KM"],
    );
    for (month, spent) in &value {
        let km = distance.get(month).copied().unwrap_or(0.0);
        table.push(vec![
            Cell::opt_text(cfg.month_name(*month)),
            Cell::Currency(*spent),
            Cell::number(km, " km"),
            Cell::number(liters.get(month).copied().unwrap_or(0.0), " L"),
            Cell::Currency(ratio_if_positive(*spent, km)),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::fixtures::dataset;

    const CSV: &str = "\
Conta,Valor,Categoria,Data,Veículos,KM,Litros
Posto,\"R$ 300,00\",Combustível,2024-01-05,ABC-1234,10000,50
Posto,\"R$ 240,00\",Combustível,2024-02-05,ABC-1234,10600,40
Oficina,\"R$ 900,00\",Manutenção,2024-02-20,ABC-1234,10800,
Posto,\"R$ 100,00\",Combustível,2024-01-10,XYZ-9876,5000,20
Posto,\"R$ 100,00\",Combustível,2024-01-25,XYZ-9876,5300,20
Medição 7,\"R$ 8.000,00\",Obras,2024-01-30,XYZ-9876,,
Aluguel,\"R$ 2.000,00\",Aluguel,2024-01-01,,,
";

    fn all(year: i32) -> VehicleFilter {
        VehicleFilter {
            year,
            vehicles: Vec::new(),
        }
    }

    #[test]
    fn test_totals_and_distance() {
        let cfg = Config::default();
        let report = build(&dataset(2024, CSV), &all(2024), &cfg).unwrap();
        assert_eq!(report.card("Total Gasto").unwrap().value, 1_640.0);
        assert_eq!(report.card("Gasto Médio por Veículo").unwrap().value, 820.0);
        // 800 km for ABC plus 300 km for XYZ
        assert_eq!(report.card("Quilometragem Total").unwrap().value, 1_100.0);
        let cpk = report.card("Custo por KM").unwrap().value;
        assert!((cpk - 1_640.0 / 1_100.0).abs() < 1e-9);
    }

    #[test]
    fn test_category_pie_skips_revenue() {
        let cfg = Config::default();
        let report = build(&dataset(2024, CSV), &all(2024), &cfg).unwrap();
        let Some(Chart::Pie { slices, .. }) = report.chart("Distribuição de Gastos por Categoria")
        else {
            panic!("missing pie");
        };
        assert!(slices.iter().all(|(c, _)| c != "Obras"));
        assert_eq!(slices[0], ("Manutenção".to_string(), 900.0));
    }

    #[test]
    fn test_efficiency_table() {
        let cfg = Config::default();
        let report = build(&dataset(2024, CSV), &all(2024), &cfg).unwrap();
        let table = report.table("Eficiência de Combustível").unwrap();
        assert_eq!(table.rows.len(), 2);
        // ABC: 800 km over 90 L
        assert_eq!(table.rows[0][0], Cell::text("ABC-1234"));
        assert_eq!(table.rows[0][2], Cell::number(90.0, " L"));
        assert_eq!(table.rows[0][4], Cell::number(800.0 / 90.0, " km/l"));
        // XYZ: 300 km over 40 L
        assert_eq!(table.rows[1][4], Cell::number(7.5, " km/l"));
    }

    #[test]
    fn test_monthly_distance_is_per_vehicle() {
        let cfg = Config::default();
        let report = build(&dataset(2024, CSV), &all(2024), &cfg).unwrap();
        let table = report.table("Análise Mensal").unwrap();
        // January: ABC has a single reading, XYZ went 5000 -> 5300
        assert_eq!(table.rows[0][0], Cell::text("Janeiro"));
        assert_eq!(table.rows[0][2], Cell::number(300.0, " km"));
        // February: ABC went 10600 -> 10800
        assert_eq!(table.rows[1][2], Cell::number(200.0, " km"));
        let monthly: f64 = table
            .rows
            .iter()
            .map(|row| match row[2] {
                Cell::Number { value, .. } => value,
                _ => 0.0,
            })
            .sum();
        assert!(monthly <= report.card("Quilometragem Total").unwrap().value);
    }

    #[test]
    fn test_vehicle_filter() {
        let cfg = Config::default();
        let ds = dataset(2024, CSV);
        let f = VehicleFilter {
            year: 2024,
            vehicles: vec!["xyz-9876".into()],
        };
        let report = build(&ds, &f, &cfg).unwrap();
        assert_eq!(report.card("Total Gasto").unwrap().value, 200.0);
        assert_eq!(report.card("Quilometragem Total").unwrap().value, 300.0);
    }

    #[test]
    fn test_missing_vehicle_column() {
        let cfg = Config::default();
        let ds = dataset(2024, "Conta,Valor\nA,1\n");
        assert!(matches!(
            build(&ds, &all(2024), &cfg),
            Err(PanelError::MissingColumns { .. })
        ));
    }

    #[test]
    fn test_without_odometer_cost_per_km_is_skipped() {
        let cfg = Config::default();
        let ds = dataset(2024, "Conta,Valor,Veículos\nPosto,100,ABC\n");
        let report = build(&ds, &all(2024), &cfg).unwrap();
        assert!(report.card("Custo por KM").is_none());
        assert!(report.card("Quilometragem Total").is_none());
        assert!(report.table("Eficiência de Combustível").is_none());
    }
}

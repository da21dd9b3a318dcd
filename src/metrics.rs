use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{PanelError, Result};
use crate::models::{ExpenseType, Record};

// ---------------------------------------------------------------------------
// Zero guards
// ---------------------------------------------------------------------------

fn finite(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// `num / den`, or 0 when the denominator is not strictly positive.
pub fn ratio_if_positive(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        finite(num / den)
    } else {
        0.0
    }
}

/// `num / den`, or 0 when the denominator is exactly zero.
pub fn ratio_if_nonzero(num: f64, den: f64) -> f64 {
    if den != 0.0 {
        finite(num / den)
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Year filter
// ---------------------------------------------------------------------------

/// Rows of one snapshot year, or all rows when `year` is `None`.
pub fn filter_year(records: &[Record], year: Option<i32>) -> Result<Vec<&Record>> {
    let rows: Vec<&Record> = records
        .iter()
        .filter(|r| year.map_or(true, |y| r.source_year == y))
        .collect();
    match year {
        Some(y) if rows.is_empty() => Err(PanelError::NoSuchYear(y)),
        _ => Ok(rows),
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TypeShare {
    pub total: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub year: Option<i32>,
    pub rows: usize,
    pub total_expenses: f64,
    pub total_revenue: f64,
    pub balance: f64,
    pub profit_margin_pct: f64,
    /// Every vocabulary kind is present, even at zero.
    pub by_type: BTreeMap<ExpenseType, TypeShare>,
    pub unclassified_total: f64,
    pub expenses_by_month: BTreeMap<u32, f64>,
    pub revenue_by_month: BTreeMap<u32, f64>,
    pub expenses_by_category: BTreeMap<String, f64>,
    pub fixed_expense: f64,
    pub variable_expense: f64,
    pub investment_total: f64,
    pub contribution_margin: f64,
    pub break_even: f64,
    pub liquidity: f64,
    pub roi_pct: f64,
    pub average_monthly_revenue: f64,
    pub payback_months: f64,
    pub ebitda: f64,
    pub fixed_share_pct: f64,
    /// km per liter by vehicle, for rows that carry a vehicle.
    pub consumption_by_vehicle: BTreeMap<String, f64>,
}

impl Metrics {
    pub fn type_total(&self, kind: ExpenseType) -> f64 {
        self.by_type.get(&kind).map(|s| s.total).unwrap_or(0.0)
    }

    pub fn type_percent(&self, kind: ExpenseType) -> f64 {
        self.by_type.get(&kind).map(|s| s.percent).unwrap_or(0.0)
    }

    pub fn contribution_margin_pct(&self) -> f64 {
        self.contribution_margin * 100.0
    }
}

pub fn aggregate(records: &[Record], year: Option<i32>) -> Result<Metrics> {
    let rows = filter_year(records, year)?;
    Ok(aggregate_rows(&rows, year))
}

/// Aggregate rows the caller has already filtered.
pub fn aggregate_rows(rows: &[&Record], year: Option<i32>) -> Metrics {
    let total_expenses: f64 = rows.iter().map(|r| r.expense_value).sum();
    let total_revenue: f64 = rows.iter().map(|r| r.revenue_value).sum();
    let balance = total_revenue - total_expenses;

    let mut by_type: BTreeMap<ExpenseType, TypeShare> = ExpenseType::VOCABULARY
        .iter()
        .map(|k| (*k, TypeShare::default()))
        .collect();
    let mut unclassified_total = 0.0;
    for r in rows {
        match by_type.get_mut(&r.expense_type) {
            Some(share) => share.total += r.expense_value,
            None => unclassified_total += r.expense_value,
        }
    }
    for share in by_type.values_mut() {
        share.percent = ratio_if_positive(share.total, total_expenses) * 100.0;
    }

    let mut expenses_by_month = BTreeMap::new();
    let mut revenue_by_month = BTreeMap::new();
    let mut expenses_by_category = BTreeMap::new();
    for r in rows {
        if let Some(m) = r.month {
            *expenses_by_month.entry(m).or_insert(0.0) += r.expense_value;
            *revenue_by_month.entry(m).or_insert(0.0) += r.revenue_value;
        }
        if r.expense_value != 0.0 {
            *expenses_by_category.entry(r.category.clone()).or_insert(0.0) += r.expense_value;
        }
    }

    let total_of = |kind: ExpenseType| by_type.get(&kind).map(|s| s.total).unwrap_or(0.0);
    let fixed_expense = total_of(ExpenseType::Fixed);
    let variable_expense = total_of(ExpenseType::Variable);
    let investment_total = total_of(ExpenseType::Investment);

    let contribution_margin = if total_revenue > 0.0 {
        finite(1.0 - variable_expense / total_revenue)
    } else {
        0.0
    };
    let break_even = ratio_if_positive(fixed_expense, contribution_margin);
    let liquidity = ratio_if_nonzero(total_revenue, total_expenses);
    let roi_pct = ratio_if_positive(balance, investment_total) * 100.0;

    // Months present among dated rows, revenue or not.
    let average_monthly_revenue = if revenue_by_month.is_empty() {
        0.0
    } else {
        finite(revenue_by_month.values().sum::<f64>() / revenue_by_month.len() as f64)
    };
    let payback_months = ratio_if_positive(investment_total, average_monthly_revenue);

    Metrics {
        year,
        rows: rows.len(),
        total_expenses,
        total_revenue,
        balance,
        profit_margin_pct: ratio_if_positive(balance, total_revenue) * 100.0,
        fixed_share_pct: ratio_if_positive(fixed_expense, total_expenses) * 100.0,
        by_type,
        unclassified_total,
        expenses_by_month,
        revenue_by_month,
        expenses_by_category,
        fixed_expense,
        variable_expense,
        investment_total,
        contribution_margin,
        break_even,
        liquidity,
        roi_pct,
        average_monthly_revenue,
        payback_months,
        ebitda: total_revenue - (fixed_expense + variable_expense),
        consumption_by_vehicle: consumption_by_vehicle(rows),
    }
}

// ---------------------------------------------------------------------------
// Vehicles
// ---------------------------------------------------------------------------

/// Distance driven per vehicle: the spread between its highest and lowest
/// odometer reading.
pub fn km_by_vehicle(rows: &[&Record]) -> BTreeMap<String, f64> {
    let mut ranges: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for r in rows {
        let (Some(vehicle), Some(km)) = (&r.vehicle, r.odometer_km) else {
            continue;
        };
        let entry = ranges.entry(vehicle.clone()).or_insert((km, km));
        entry.0 = entry.0.min(km);
        entry.1 = entry.1.max(km);
    }
    ranges
        .into_iter()
        .map(|(v, (lo, hi))| (v, hi - lo))
        .collect()
}

pub fn consumption_by_vehicle(rows: &[&Record]) -> BTreeMap<String, f64> {
    let km = km_by_vehicle(rows);
    let mut liters: BTreeMap<String, f64> = BTreeMap::new();
    for r in rows {
        if let (Some(vehicle), Some(l)) = (&r.vehicle, r.fuel_liters) {
            *liters.entry(vehicle.clone()).or_insert(0.0) += l;
        }
    }
    km.into_iter()
        .map(|(vehicle, distance)| {
            let used = liters.get(&vehicle).copied().unwrap_or(0.0);
            (vehicle, ratio_if_positive(distance, used))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(value: f64, kind: ExpenseType, revenue: bool, month: Option<u32>) -> Record {
        Record {
            account_label: if revenue { "Medição".into() } else { "Conta".into() },
            value,
            revenue_value: if revenue { value } else { 0.0 },
            expense_value: if revenue { 0.0 } else { value },
            expense_type: kind,
            category: "Geral".into(),
            date: None,
            month,
            month_name: None,
            source_year: 2023,
            user: None,
            vehicle: None,
            odometer_km: None,
            fuel_liters: None,
            description: None,
        }
    }

    #[test]
    fn test_balance_and_margin() {
        let rows = vec![
            record(10_000.0, ExpenseType::Unclassified, true, Some(1)),
            record(8_000.0, ExpenseType::Fixed, false, Some(1)),
        ];
        let m = aggregate(&rows, Some(2023)).unwrap();
        assert_eq!(m.total_revenue, 10_000.0);
        assert_eq!(m.total_expenses, 8_000.0);
        assert_eq!(m.balance, 2_000.0);
        assert_eq!(m.profit_margin_pct, 20.0);
    }

    #[test]
    fn test_contribution_margin_and_break_even() {
        let rows = vec![
            record(10_000.0, ExpenseType::Unclassified, true, None),
            record(3_000.0, ExpenseType::Fixed, false, None),
            record(2_000.0, ExpenseType::Variable, false, None),
        ];
        let m = aggregate(&rows, None).unwrap();
        assert!((m.contribution_margin - 0.8).abs() < 1e-12);
        assert!((m.break_even - 3_750.0).abs() < 1e-9);
        assert_eq!(m.ebitda, 5_000.0);
        assert_eq!(m.fixed_share_pct, 60.0);
        assert_eq!(m.type_percent(ExpenseType::Variable), 40.0);
    }

    #[test]
    fn test_zero_guards_without_revenue() {
        let rows = vec![record(500.0, ExpenseType::Investment, false, None)];
        let m = aggregate(&rows, None).unwrap();
        assert_eq!(m.profit_margin_pct, 0.0);
        assert_eq!(m.contribution_margin, 0.0);
        assert_eq!(m.break_even, 0.0);
        assert_eq!(m.liquidity, 0.0);
        assert_eq!(m.payback_months, 0.0);
        // Negative balance over positive investment is still defined.
        assert_eq!(m.roi_pct, -100.0);
    }

    #[test]
    fn test_zero_guards_on_empty_input() {
        let m = aggregate(&[], None).unwrap();
        let all = [
            m.profit_margin_pct,
            m.contribution_margin,
            m.break_even,
            m.liquidity,
            m.roi_pct,
            m.payback_months,
            m.fixed_share_pct,
        ];
        assert!(all.iter().all(|v| *v == 0.0));
        assert!(m.by_type.values().all(|s| s.percent == 0.0));
        assert_eq!(m.by_type.len(), ExpenseType::VOCABULARY.len());
    }

    #[test]
    fn test_negative_expenses_never_produce_nan() {
        let rows = vec![
            record(-100.0, ExpenseType::Fixed, false, Some(2)),
            record(-50.0, ExpenseType::Variable, false, Some(2)),
        ];
        let m = aggregate(&rows, None).unwrap();
        assert_eq!(m.type_percent(ExpenseType::Fixed), 0.0);
        assert_eq!(m.fixed_share_pct, 0.0);
        assert!(m.liquidity.is_finite());
        assert_eq!(m.liquidity, 0.0);
    }

    #[test]
    fn test_explicit_year_without_rows_fails() {
        let rows = vec![record(1.0, ExpenseType::Fixed, false, None)];
        assert!(matches!(aggregate(&rows, Some(1999)), Err(PanelError::NoSuchYear(1999))));
        assert!(aggregate(&[], None).is_ok());
    }

    #[test]
    fn test_payback_averages_months_present() {
        let rows = vec![
            record(1_000.0, ExpenseType::Unclassified, true, Some(1)),
            record(3_000.0, ExpenseType::Unclassified, true, Some(2)),
            record(100.0, ExpenseType::Fixed, false, Some(3)),
            record(6_000.0, ExpenseType::Investment, false, None),
        ];
        let m = aggregate(&rows, None).unwrap();
        // (1000 + 3000 + 0) / 3 months
        assert!((m.average_monthly_revenue - 4_000.0 / 3.0).abs() < 1e-9);
        assert!((m.payback_months - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_unclassified_kept_out_of_type_totals() {
        let rows = vec![
            record(70.0, ExpenseType::Fixed, false, None),
            record(30.0, ExpenseType::Unclassified, false, None),
        ];
        let m = aggregate(&rows, None).unwrap();
        assert_eq!(m.total_expenses, 100.0);
        assert_eq!(m.unclassified_total, 30.0);
        assert_eq!(m.type_percent(ExpenseType::Fixed), 70.0);
    }

    #[test]
    fn test_vehicle_distance_and_consumption() {
        let mut rows = Vec::new();
        for (km, liters) in [(1_000.0, 40.0), (1_400.0, 0.0), (1_200.0, 10.0)] {
            let mut r = record(200.0, ExpenseType::Variable, false, None);
            r.vehicle = Some("ABC-1234".into());
            r.odometer_km = Some(km);
            r.fuel_liters = Some(liters);
            rows.push(r);
        }
        let mut dry = record(50.0, ExpenseType::Variable, false, None);
        dry.vehicle = Some("XYZ-0001".into());
        dry.odometer_km = Some(500.0);
        rows.push(dry);

        let refs: Vec<&Record> = rows.iter().collect();
        assert_eq!(km_by_vehicle(&refs)["ABC-1234"], 400.0);
        let c = consumption_by_vehicle(&refs);
        assert_eq!(c["ABC-1234"], 8.0);
        assert_eq!(c["XYZ-0001"], 0.0);
    }
}

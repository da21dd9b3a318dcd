use std::collections::BTreeMap;

use crate::config::Config;
use crate::models::Record;

/// Sum `value` over rows grouped by `key`. Rows whose key is `None` are
/// skipped.
pub fn group_sum<K, FK, FV>(rows: &[&Record], key: FK, value: FV) -> BTreeMap<K, f64>
where
    K: Ord,
    FK: Fn(&Record) -> Option<K>,
    FV: Fn(&Record) -> f64,
{
    let mut out = BTreeMap::new();
    for r in rows {
        if let Some(k) = key(r) {
            *out.entry(k).or_insert(0.0) += value(r);
        }
    }
    out
}

pub fn group_count<K, FK>(rows: &[&Record], key: FK) -> BTreeMap<K, usize>
where
    K: Ord,
    FK: Fn(&Record) -> Option<K>,
{
    let mut out = BTreeMap::new();
    for r in rows {
        if let Some(k) = key(r) {
            *out.entry(k).or_insert(0) += 1;
        }
    }
    out
}

/// Largest first; equal values keep name order.
pub fn sorted_desc(groups: BTreeMap<String, f64>) -> Vec<(String, f64)> {
    let mut v: Vec<(String, f64)> = groups.into_iter().collect();
    v.sort_by(|a, b| b.1.total_cmp(&a.1));
    v
}

/// Keep the `n` largest groups and fold the rest into one `other` entry.
/// Inputs with `n` groups or fewer come back sorted but otherwise unchanged.
pub fn top_n_with_other(groups: BTreeMap<String, f64>, n: usize, other: &str) -> Vec<(String, f64)> {
    let mut sorted = sorted_desc(groups);
    if sorted.len() <= n {
        return sorted;
    }
    let rest: f64 = sorted.drain(n..).map(|(_, v)| v).sum();
    sorted.push((other.to_string(), rest));
    sorted
}

// ---------------------------------------------------------------------------
// Outliers
// ---------------------------------------------------------------------------

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1). Needs at least two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// `mean + 2 * stddev`, or `None` for fewer than two values.
pub fn outlier_threshold(values: &[f64]) -> Option<f64> {
    Some(mean(values)? + 2.0 * sample_std(values)?)
}

/// Rows whose value is strictly above the threshold, plus the threshold.
pub fn outliers<'a>(rows: &[&'a Record]) -> (Option<f64>, Vec<&'a Record>) {
    let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
    let Some(limit) = outlier_threshold(&values) else {
        return (None, Vec::new());
    };
    let flagged = rows.iter().copied().filter(|r| r.value > limit).collect();
    (Some(limit), flagged)
}

// ---------------------------------------------------------------------------
// Growth
// ---------------------------------------------------------------------------

/// Year-over-year growth for revenue and expenses. Undefined when the
/// previous value is not positive.
pub fn growth_pct(current: f64, previous: f64) -> Option<f64> {
    if previous > 0.0 {
        Some((current - previous) / previous * 100.0)
    } else {
        None
    }
}

/// Growth of a balance, which may be negative: the denominator is the
/// magnitude of the previous value.
pub fn balance_growth_pct(current: f64, previous: f64) -> Option<f64> {
    if previous != 0.0 {
        Some((current - previous) / previous.abs() * 100.0)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Pivots
// ---------------------------------------------------------------------------

/// A label × year grid of expense sums. Cells with no expense rows are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    pub rows: Vec<String>,
    pub years: Vec<i32>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl Pivot {
    pub fn get(&self, row: &str, year: i32) -> Option<f64> {
        let r = self.rows.iter().position(|x| x == row)?;
        let c = self.years.iter().position(|y| *y == year)?;
        self.values[r][c]
    }
}

fn pivot_by<F>(rows: &[&Record], labels: Vec<String>, years: &[i32], label_of: F) -> Pivot
where
    F: Fn(&Record) -> Option<String>,
{
    let sums = group_sum(
        rows,
        |r| {
            if r.is_revenue() {
                return None;
            }
            label_of(r).map(|l| (l, r.source_year))
        },
        |r| r.expense_value,
    );
    let values = labels
        .iter()
        .map(|label| {
            years
                .iter()
                .map(|y| sums.get(&(label.clone(), *y)).copied())
                .collect()
        })
        .collect();
    Pivot {
        rows: labels,
        years: years.to_vec(),
        values,
    }
}

/// Expense per category and year, for the given categories.
pub fn pivot_category_year(rows: &[&Record], categories: &[String], years: &[i32]) -> Pivot {
    pivot_by(rows, categories.to_vec(), years, |r| Some(r.category.clone()))
}

/// Expense per month and year. All twelve months are rows, in calendar
/// order, labelled with their abbreviations.
pub fn pivot_month_year(rows: &[&Record], years: &[i32], cfg: &Config) -> Pivot {
    let labels: Vec<String> = (1..=12)
        .filter_map(|m| cfg.month_abbreviation(m))
        .map(str::to_string)
        .collect();
    pivot_by(rows, labels, years, |r| {
        r.month
            .and_then(|m| cfg.month_abbreviation(m))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::record;
    use crate::models::ExpenseType;

    fn groups(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_top_n_with_other_folds_remainder() {
        let input = groups(&[
            ("A", 10.0),
            ("B", 70.0),
            ("C", 30.0),
            ("D", 5.0),
            ("E", 50.0),
            ("F", 20.0),
            ("G", 1.0),
        ]);
        let total: f64 = input.values().sum();
        let out = top_n_with_other(input, 5, "Outros");
        assert_eq!(out.len(), 6);
        let names: Vec<&str> = out.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["B", "E", "C", "F", "A", "Outros"]);
        assert_eq!(out[5].1, 6.0);
        assert_eq!(out.iter().map(|(_, v)| v).sum::<f64>(), total);
    }

    #[test]
    fn test_top_n_with_few_groups_is_unchanged() {
        let out = top_n_with_other(groups(&[("A", 1.0), ("B", 2.0)]), 5, "Outros");
        assert_eq!(out, vec![("B".to_string(), 2.0), ("A".to_string(), 1.0)]);
        let exactly_five = groups(&[("A", 1.0), ("B", 2.0), ("C", 3.0), ("D", 4.0), ("E", 5.0)]);
        assert_eq!(top_n_with_other(exactly_five, 5, "Outros").len(), 5);
    }

    #[test]
    fn test_outlier_boundary_is_not_flagged() {
        // mean 1, sample std 2 -> threshold 5, which is also the largest value
        let values = [0.0, 0.0, 0.0, 0.0, 1.0, 5.0];
        assert_eq!(mean(&values), Some(1.0));
        assert_eq!(sample_std(&values), Some(2.0));
        assert_eq!(outlier_threshold(&values), Some(5.0));

        let rows: Vec<Record> = values
            .iter()
            .map(|v| record(*v, ExpenseType::Variable, false, None))
            .collect();
        let refs: Vec<&Record> = rows.iter().collect();
        let (limit, flagged) = outliers(&refs);
        assert_eq!(limit, Some(5.0));
        assert!(flagged.is_empty());
    }

    #[test]
    fn test_outlier_above_threshold_is_flagged() {
        let mut rows: Vec<Record> = (0..10)
            .map(|_| record(100.0, ExpenseType::Variable, false, None))
            .collect();
        rows.push(record(5_000.0, ExpenseType::Variable, false, None));
        let refs: Vec<&Record> = rows.iter().collect();
        let (limit, flagged) = outliers(&refs);
        assert!(limit.unwrap() < 5_000.0);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].value, 5_000.0);
    }

    #[test]
    fn test_single_value_has_no_threshold() {
        let rows = [record(10.0, ExpenseType::Fixed, false, None)];
        let refs: Vec<&Record> = rows.iter().collect();
        assert_eq!(outliers(&refs), (None, Vec::new()));
    }

    #[test]
    fn test_growth_guards() {
        assert_eq!(growth_pct(150.0, 100.0), Some(50.0));
        assert_eq!(growth_pct(150.0, 0.0), None);
        assert_eq!(growth_pct(150.0, -10.0), None);
        assert_eq!(balance_growth_pct(-50.0, -100.0), Some(50.0));
        assert_eq!(balance_growth_pct(100.0, -100.0), Some(200.0));
        assert_eq!(balance_growth_pct(100.0, 0.0), None);
    }

    #[test]
    fn test_month_pivot_has_every_month() {
        let cfg = Config::default();
        let mut a = record(10.0, ExpenseType::Fixed, false, Some(1));
        a.source_year = 2023;
        let mut b = record(20.0, ExpenseType::Fixed, false, Some(1));
        b.source_year = 2024;
        let mut c = record(5.0, ExpenseType::Fixed, false, Some(1));
        c.source_year = 2024;
        let rows = [a, b, c];
        let refs: Vec<&Record> = rows.iter().collect();
        let p = pivot_month_year(&refs, &[2023, 2024], &cfg);
        assert_eq!(p.rows.len(), 12);
        assert_eq!(p.get("Jan", 2023), Some(10.0));
        assert_eq!(p.get("Jan", 2024), Some(25.0));
        assert_eq!(p.get("Fev", 2024), None);
    }

    #[test]
    fn test_revenue_only_cells_stay_empty() {
        let cfg = Config::default();
        let mut income = record(9_000.0, ExpenseType::Unclassified, true, Some(2));
        income.source_year = 2024;
        income.category = "Obras".into();
        let mut rent = record(300.0, ExpenseType::Fixed, false, Some(1));
        rent.source_year = 2024;
        let rows = [income, rent];
        let refs: Vec<&Record> = rows.iter().collect();

        let months = pivot_month_year(&refs, &[2024], &cfg);
        assert_eq!(months.get("Fev", 2024), None);
        assert_eq!(months.get("Jan", 2024), Some(300.0));

        let categories = pivot_category_year(&refs, &["Obras".to_string()], &[2024]);
        assert_eq!(categories.get("Obras", 2024), None);
    }
}

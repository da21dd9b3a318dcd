use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::fmt::{decimal, money_with};
use crate::loader::{write_csv, DirSource};
use crate::models::{Field, RawTable};

pub const YEARS: [i32; 3] = [2023, 2024, 2025];

const COLUMNS: [Field; 10] = [
    Field::Account,
    Field::Value,
    Field::TypeTag,
    Field::Category,
    Field::Date,
    Field::User,
    Field::Vehicle,
    Field::Odometer,
    Field::Liters,
    Field::Description,
];

/// Fixed costs charged every month.
struct Recurring {
    day: u32,
    account: &'static str,
    category: &'static str,
    amount: f64,
}

const RECURRING: &[Recurring] = &[
    Recurring { day: 5, account: "Aluguel Escritório", category: "Aluguel", amount: 3500.00 },
    Recurring { day: 5, account: "Folha de Pagamento", category: "Salários", amount: 12000.00 },
    Recurring { day: 10, account: "Conta de Energia", category: "Energia", amount: 780.00 },
    Recurring { day: 10, account: "Internet Fibra", category: "Internet", amount: 219.90 },
];

/// Card purchases cycled through the months: (card, holder, category, base amount).
const CARD_PURCHASES: &[(&str, &str, &str, f64)] = &[
    ("4111", "Ana", "Alimentação", 182.40),
    ("4111", "Ana", "Transporte", 96.50),
    ("4222", "Bruno", "Alimentação", 143.20),
    ("4222", "Bruno", "Viagens", 610.00),
];

/// Fleet: (plate, starting odometer, km per month, km per litre).
const FLEET: &[(&str, f64, f64, f64)] = &[
    ("ABC-1234", 10_000.0, 1_200.0, 8.5),
    ("XYZ-9876", 42_000.0, 800.0, 11.0),
];

const DIESEL_PRICE: f64 = 6.10;

struct Row {
    account: String,
    value: f64,
    type_tag: &'static str,
    category: &'static str,
    date: String,
    user: Option<&'static str>,
    vehicle: Option<&'static str>,
    odometer: Option<f64>,
    liters: Option<f64>,
    description: String,
}

impl Row {
    fn plain(
        account: impl Into<String>,
        value: f64,
        type_tag: &'static str,
        category: &'static str,
        date: String,
    ) -> Self {
        let account = account.into();
        Self {
            description: account.clone(),
            account,
            value,
            type_tag,
            category,
            date,
            user: None,
            vehicle: None,
            odometer: None,
            liters: None,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn make_date(year: i32, month: u32, day: u32) -> String {
    format!("{year:04}-{month:02}-{:02}", day.min(28))
}

/// One year of deterministic activity. Later years grow by a fixed factor so
/// comparisons have something to show.
fn generate_year(year: i32) -> Vec<Row> {
    let offset = (year - YEARS[0]).max(0);
    let growth = 1.0 + offset as f64 * 0.08;
    let mut rows = Vec::new();

    for month in 1..=12u32 {
        let idx = month as usize;

        // Revenue: one measurement per month
        let season = 1.0 + (idx % 4) as f64 * 0.05;
        rows.push(Row::plain(
            format!("Medição de Obra {month:02}/{year}"),
            round2(42_000.0 * growth * season),
            "",
            "Obras",
            make_date(year, month, 28),
        ));

        for r in RECURRING {
            rows.push(Row::plain(
                r.account,
                round2(r.amount * growth),
                "Fixo",
                r.category,
                make_date(year, month, r.day),
            ));
        }

        rows.push(Row::plain(
            "Material de Escritório",
            round2(320.0 + (idx % 5) as f64 * 45.0),
            "Variável",
            "Material de Escritório",
            make_date(year, month, 14),
        ));

        // Corporate cards
        for (i, (card, holder, category, base)) in CARD_PURCHASES.iter().enumerate() {
            let vary = 1.0 + ((idx + i) % 5) as f64 * 0.07;
            rows.push(Row {
                user: Some(*holder),
                description: format!("Compra {category} {holder}"),
                ..Row::plain(
                    *card,
                    round2(base * vary * growth),
                    "Variável",
                    *category,
                    make_date(year, month, 3 + i as u32 * 6),
                )
            });
        }
        // One unusually large purchase to show up in the audit
        if month == 7 {
            rows.push(Row {
                user: Some("Bruno"),
                description: "Passagens internacionais".to_string(),
                ..Row::plain("4222", 9_800.0, "Variável", "Viagens", make_date(year, month, 21))
            });
        }

        // Fleet: one refuel per vehicle, maintenance every quarter
        for (plate, start, per_month, km_per_liter) in FLEET {
            let km = start + offset as f64 * 12.0 * per_month + month as f64 * per_month;
            let liters = round2(per_month / km_per_liter);
            rows.push(Row {
                vehicle: Some(*plate),
                odometer: Some(km),
                liters: Some(liters),
                description: format!("Abastecimento {plate}"),
                ..Row::plain(
                    "Posto Rodovia",
                    round2(liters * DIESEL_PRICE),
                    "Variável",
                    "Combustível",
                    make_date(year, month, 18),
                )
            });
            if month % 3 == 0 {
                rows.push(Row {
                    vehicle: Some(*plate),
                    odometer: Some(km + 40.0),
                    description: format!("Revisão {plate}"),
                    ..Row::plain(
                        "Oficina Mecânica",
                        round2(850.0 * growth),
                        "Variável",
                        "Manutenção",
                        make_date(year, month, 24),
                    )
                });
            }
        }

        if month % 2 == 0 {
            rows.push(Row::plain(
                "Estoque TH Parfum",
                round2(2_200.0 * growth),
                "TH Parfum",
                "Produtos",
                make_date(year, month, 12),
            ));
        }
        if month == 3 || month == 9 {
            rows.push(Row::plain(
                "Compra de Equipamento",
                round2(15_000.0 * growth),
                "Investimento",
                "Investimentos",
                make_date(year, month, 16),
            ));
        }
        if month == 6 {
            rows.push(Row::plain(
                "Parcela Empréstimo",
                5_000.0,
                "Não Operacional",
                "Financiamentos",
                make_date(year, month, 20),
            ));
        }
    }
    rows
}

fn to_table(rows: &[Row], cfg: &Config) -> RawTable {
    let headers = COLUMNS
        .iter()
        .map(|f| cfg.columns.canonical(*f).to_string())
        .collect();
    let mut table = RawTable::new(headers);
    let number = |v: Option<f64>| v.map(decimal);
    for r in rows {
        table.push_row(vec![
            Some(r.account.clone()),
            Some(money_with(r.value, &cfg.currency_symbol)),
            (!r.type_tag.is_empty()).then(|| r.type_tag.to_string()),
            Some(r.category.to_string()),
            Some(r.date.clone()),
            r.user.map(str::to_string),
            r.vehicle.map(str::to_string),
            number(r.odometer),
            number(r.liters),
            Some(r.description.clone()),
        ]);
    }
    table
}

/// Write lgd<year>.csv for each sample year into `dir`. Existing files are
/// left alone unless `force` is set. Returns the files written.
pub fn write_samples(dir: &Path, force: bool, cfg: &Config) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for year in YEARS {
        let path = dir.join(DirSource::file_name(year, "csv"));
        if path.exists() && !force {
            info!(file = %path.display(), "sample exists, skipping");
            continue;
        }
        let rows = generate_year(year);
        write_csv(&path, &to_table(&rows, cfg))?;
        info!(file = %path.display(), rows = rows.len(), "wrote sample");
        written.push(path);
    }
    Ok(written)
}

pub fn run(dir: &Path, force: bool, cfg: &Config) -> Result<()> {
    let written = write_samples(dir, force, cfg)?;

    if written.is_empty() {
        println!(
            "Sample data already present in {} (use --force to overwrite).",
            dir.display()
        );
        return Ok(());
    }

    println!("Sample data written!");
    for path in &written {
        println!("  {}", path.display());
    }
    println!();
    println!("Try these next:");
    println!("  finpanel --data-dir {} years", dir.display());
    println!("  finpanel --data-dir {} expenses", dir.display());
    println!("  finpanel --data-dir {} cards --user Ana", dir.display());
    println!("  finpanel --data-dir {} compare", dir.display());
    println!("  finpanel --data-dir {} dashboard", dir.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_year, DataSource};
    use crate::metrics::aggregate;
    use crate::models::ExpenseType;
    use crate::views::cards::{self, CardFilter};
    use crate::views::comparison::{self, CompareFilter};
    use crate::views::vehicles::{self, VehicleFilter};
    use crate::views::{balance, expenses};

    #[test]
    fn test_samples_load_and_every_view_builds() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let written = write_samples(dir.path(), false, &cfg).unwrap();
        assert_eq!(written.len(), 3);

        let source = DirSource::new(dir.path());
        assert_eq!(
            source.available_years().unwrap().into_iter().collect::<Vec<_>>(),
            YEARS.to_vec()
        );

        let ds = load_year(&source, 2024, &cfg).unwrap();
        assert!(ds.has(Field::Odometer));
        expenses::build(&ds, 2024, &cfg).unwrap();
        balance::build(&ds, 2024, &cfg).unwrap();
        vehicles::build(
            &ds,
            &VehicleFilter {
                year: 2024,
                vehicles: Vec::new(),
            },
            &cfg,
        )
        .unwrap();
        let report = cards::build(
            &ds,
            &CardFilter {
                year: 2024,
                users: Vec::new(),
                months: Vec::new(),
            },
            &cfg,
        )
        .unwrap();
        assert!(report
            .table("Relatório de Auditoria")
            .is_some_and(|t| !t.rows.is_empty()));

        let all = crate::loader::load_years(&source, &YEARS, &cfg).unwrap();
        comparison::build(
            &all,
            &CompareFilter {
                years: YEARS.to_vec(),
                categories: Vec::new(),
            },
            &cfg,
        )
        .unwrap();
    }

    #[test]
    fn test_sample_year_is_profitable_and_fully_typed() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        write_samples(dir.path(), false, &cfg).unwrap();
        let ds = load_year(&DirSource::new(dir.path()), 2023, &cfg).unwrap();
        let m = aggregate(&ds.records, Some(2023)).unwrap();
        assert!(m.total_revenue > m.total_expenses);
        assert_eq!(m.unclassified_total, 0.0);
        for kind in ExpenseType::VOCABULARY {
            assert!(m.type_total(kind) > 0.0, "{kind:?} has no rows");
        }
    }

    #[test]
    fn test_existing_files_are_kept_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let existing = dir.path().join("lgd2024.csv");
        std::fs::write(&existing, "Conta,Valor\nMinha,1\n").unwrap();

        let written = write_samples(dir.path(), false, &cfg).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(
            std::fs::read_to_string(&existing).unwrap(),
            "Conta,Valor\nMinha,1\n"
        );

        let written = write_samples(dir.path(), true, &cfg).unwrap();
        assert_eq!(written.len(), 3);
        assert!(std::fs::read_to_string(&existing).unwrap().contains("Medição"));
    }
}

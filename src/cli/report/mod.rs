pub mod text;

use std::path::PathBuf;

use colored::Colorize;
use tracing::info;

use super::{parse_months, Context, OutputFormat};
use crate::error::{PanelError, Result};
use crate::loader::{write_csv, DataSource};
use crate::models::Field;
use crate::views::cards::{self, CardFilter};
use crate::views::comparison::{self, CompareFilter};
use crate::views::vehicles::{self, VehicleFilter};
use crate::views::{balance, expenses, ViewReport};

/// One view invocation with the user's selections.
#[derive(Debug, Clone)]
pub enum View {
    Expenses {
        year: Option<i32>,
    },
    Cards {
        year: Option<i32>,
        users: Vec<String>,
        months: Vec<String>,
        export: Option<Option<String>>,
    },
    Vehicles {
        year: Option<i32>,
        vehicles: Vec<String>,
    },
    Compare {
        years: Vec<i32>,
        categories: Vec<String>,
    },
    Balance {
        year: Option<i32>,
    },
}

impl View {
    pub fn name(&self) -> &'static str {
        match self {
            View::Expenses { .. } => expenses::TITLE,
            View::Cards { .. } => cards::TITLE,
            View::Vehicles { .. } => vehicles::TITLE,
            View::Compare { .. } => comparison::TITLE,
            View::Balance { .. } => balance::TITLE,
        }
    }
}

/// Load, assemble and print one view. Failures are reported here and never
/// propagate: data problems as warnings, anything else as an error with a
/// hint. Returns whether the view was rendered.
pub fn run_view(ctx: &Context, view: &View) -> bool {
    let result = assemble(ctx, view).and_then(|report| render(ctx, &report));
    match result {
        Ok(()) => true,
        Err(e) if e.is_data_warning() => {
            eprintln!("{} {e}", "Warning:".yellow().bold());
            false
        }
        Err(e) => {
            eprintln!("{} {}: {e}", "Error:".red().bold(), view.name());
            eprintln!("  check that the data files exist and are well formatted");
            false
        }
    }
}

/// Every view for one year. A failing view does not stop the others.
pub fn dashboard(ctx: &Context, year: Option<i32>) -> bool {
    let views = [
        View::Expenses { year },
        View::Cards {
            year,
            users: Vec::new(),
            months: Vec::new(),
            export: None,
        },
        View::Vehicles {
            year,
            vehicles: Vec::new(),
        },
        View::Compare {
            years: Vec::new(),
            categories: Vec::new(),
        },
        View::Balance { year },
    ];
    let mut rendered = 0;
    for view in &views {
        if run_view(ctx, view) {
            rendered += 1;
        }
        if ctx.format == OutputFormat::Text {
            println!();
        }
    }
    info!(rendered, total = views.len(), "dashboard finished");
    rendered > 0
}

pub fn assemble(ctx: &Context, view: &View) -> Result<ViewReport> {
    let cfg = &ctx.cfg;
    match view {
        View::Expenses { year } => {
            let year = ctx.resolve_year(*year)?;
            let ds = ctx.load_year(year)?;
            expenses::build(&ds, year, cfg)
        }
        View::Cards {
            year,
            users,
            months,
            export,
        } => {
            let year = ctx.resolve_year(*year)?;
            let ds = ctx.load_year(year)?;
            let filter = CardFilter {
                year,
                users: users.clone(),
                months: parse_months(months, cfg)?,
            };
            let mut report = cards::build(&ds, &filter, cfg)?;
            if let Some(target) = export {
                let path = target
                    .as_ref()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(cards::default_export_name(year)));
                let rows = cards::select(&ds, &filter, cfg)?;
                write_csv(&path, &cards::export_table(&rows, ds.has(Field::Description), cfg))?;
                info!(rows = rows.len(), file = %path.display(), "exported card transactions");
                report
                    .notices
                    .push(format!("Transações exportadas para {}", path.display()));
            }
            Ok(report)
        }
        View::Vehicles { year, vehicles } => {
            let year = ctx.resolve_year(*year)?;
            let ds = ctx.load_year(year)?;
            let filter = VehicleFilter {
                year,
                vehicles: vehicles.clone(),
            };
            vehicles::build(&ds, &filter, cfg)
        }
        View::Compare { years, categories } => {
            let available = ctx.source.available_years()?;
            let years: Vec<i32> = if years.is_empty() {
                available.into_iter().collect()
            } else {
                years.iter().copied().filter(|y| available.contains(y)).collect()
            };
            if years.len() < 2 {
                return Err(PanelError::NotEnoughYears);
            }
            let ds = ctx.load_years(&years)?;
            let filter = CompareFilter {
                years,
                categories: categories.clone(),
            };
            comparison::build(&ds, &filter, cfg)
        }
        View::Balance { year } => {
            let year = ctx.resolve_year(*year)?;
            let ds = ctx.load_year(year)?;
            balance::build(&ds, year, cfg)
        }
    }
}

fn render(ctx: &Context, report: &ViewReport) -> Result<()> {
    match ctx.format {
        OutputFormat::Text => println!("{}", text::format_report(report, &ctx.cfg)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    fn ctx_for(dir: &std::path::Path) -> Context {
        let path = dir.to_string_lossy().to_string();
        Context::with_settings(Settings::default(), Some(&path), OutputFormat::Json)
    }

    #[test]
    fn test_missing_year_is_a_warning_not_a_crash() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_for(dir.path());
        let err = assemble(&ctx, &View::Balance { year: Some(2030) }).unwrap_err();
        assert!(err.is_data_warning());
        assert!(!run_view(&ctx, &View::Balance { year: Some(2030) }));
    }

    #[test]
    fn test_compare_with_one_year_is_not_enough() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lgd2024.csv"), "Conta,Valor\nA,1\n").unwrap();
        let ctx = ctx_for(dir.path());
        let view = View::Compare {
            years: vec![2023, 2024],
            categories: Vec::new(),
        };
        assert!(matches!(assemble(&ctx, &view), Err(PanelError::NotEnoughYears)));
    }

    #[test]
    fn test_cards_export_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lgd2024.csv"),
            "Conta,Valor,Categoria,Data,Usuário\n4111,\"R$ 10,00\",Táxi,2024-05-02,Ana\n",
        )
        .unwrap();
        let ctx = ctx_for(dir.path());
        let out = dir.path().join("export.csv");
        let view = View::Cards {
            year: Some(2024),
            users: Vec::new(),
            months: Vec::new(),
            export: Some(Some(out.to_string_lossy().to_string())),
        };
        let report = assemble(&ctx, &view).unwrap();
        assert!(report.notices.iter().any(|n| n.contains("export.csv")));
        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.starts_with("Data,Usuário,Categoria,Valor"));
        assert!(written.contains("02/05/2024,Ana,Táxi,\"R$ 10,00\""));
    }

    #[test]
    fn test_dashboard_survives_failing_views() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lgd2024.csv"),
            "Conta,Valor,GASTOS\nAluguel,100,Fixo\nMedição,500,\n",
        )
        .unwrap();
        let ctx = ctx_for(dir.path());
        // cards, vehicles and compare fail on this snapshot
        assert!(dashboard(&ctx, Some(2024)));
    }
}

use comfy_table::Table;
use serde::Serialize;

use crate::error::Result;
use crate::loader::DataSource;

use super::{Context, OutputFormat};

#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub year: i32,
    pub file: String,
}

pub fn list(ctx: &Context) -> Result<Vec<Snapshot>> {
    Ok(ctx
        .source
        .available_years()?
        .into_iter()
        .filter_map(|year| {
            ctx.source.path_for(year).map(|p| Snapshot {
                year,
                file: p.to_string_lossy().to_string(),
            })
        })
        .collect())
}

pub fn format_years(snapshots: &[Snapshot], dir: &std::path::Path) -> String {
    if snapshots.is_empty() {
        return format!(
            "No snapshot files in {}. Run `finpanel sample` to create some.",
            dir.display()
        );
    }
    let mut table = Table::new();
    table.set_header(vec!["Ano", "Arquivo"]);
    for s in snapshots {
        table.add_row(vec![s.year.to_string(), s.file.clone()]);
    }
    format!("Anos disponíveis\n{table}")
}

pub fn run(ctx: &Context) -> Result<()> {
    let snapshots = list(ctx)?;
    match ctx.format {
        OutputFormat::Text => println!("{}", format_years(&snapshots, &ctx.data_dir())),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshots)?),
    }
    Ok(())
}

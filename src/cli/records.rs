use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::loader::{write_csv, write_csv_to};
use crate::normalizer::to_table;

use super::{Context, OutputFormat};

/// Print (or write) the normalized records of one year: canonical headers,
/// title-cased labels, plain numbers and the resolved expense type. Feeding
/// the output back through the loader yields the same records.
pub fn run(ctx: &Context, year: Option<i32>, output: Option<&str>) -> Result<()> {
    let year = ctx.resolve_year(year)?;
    let ds = ctx.load_year(year)?;
    if ds.is_empty() {
        warn!(year, "snapshot has no records");
    }

    match (output, ctx.format) {
        (Some(path), _) => {
            let path = Path::new(path);
            write_csv(path, &to_table(&ds, &ctx.cfg))?;
            info!(year, rows = ds.len(), file = %path.display(), "wrote normalized records");
            println!("Wrote {} records to {}", ds.len(), path.display());
        }
        (None, OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(&ds.records)?);
        }
        (None, OutputFormat::Text) => {
            write_csv_to(std::io::stdout().lock(), &to_table(&ds, &ctx.cfg))?;
        }
    }
    Ok(())
}

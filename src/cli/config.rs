use crate::error::Result;
use crate::loader::DataSource;
use crate::settings::{save_settings, settings_path, shellexpand_path, Settings};

use super::{Context, OutputFormat};

pub fn show(ctx: &Context) -> Result<()> {
    let s = &ctx.settings;
    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(s)?);
        return Ok(());
    }

    let years = ctx.source.available_years().unwrap_or_default();
    println!("Settings:        {}", settings_path().display());
    println!("Data dir:        {}", ctx.data_dir().display());
    if ctx.data_dir().to_string_lossy() != shellexpand_path(&s.data_dir) {
        println!("  (saved:        {})", s.data_dir);
    }
    println!(
        "Default year:    {}",
        s.default_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "(latest available)".to_string())
    );
    println!("Currency:        {}", s.currency_symbol);
    println!("Revenue marker:  {}", s.revenue_marker);
    println!("Product line:    {}", s.product_line_label);
    println!(
        "Infer types:     {}",
        if s.infer_types_from_category { "yes" } else { "no" }
    );
    println!();
    if years.is_empty() {
        println!("No snapshot files found. Run `finpanel sample` to create some.");
    } else {
        let list: Vec<String> = years.iter().map(|y| y.to_string()).collect();
        println!("Years:           {}", list.join(", "));
    }
    Ok(())
}

pub fn set_data_dir(mut settings: Settings, path: &str) -> Result<()> {
    apply_data_dir(&mut settings, path);
    save_settings(&settings)?;
    println!("Data directory set to {}", settings.data_dir);
    Ok(())
}

pub fn set_default_year(mut settings: Settings, year: Option<i32>) -> Result<()> {
    settings.default_year = year;
    save_settings(&settings)?;
    match year {
        Some(y) => println!("Default year set to {y}"),
        None => println!("Default year cleared (latest available year is used)"),
    }
    Ok(())
}

fn apply_data_dir(settings: &mut Settings, path: &str) {
    let expanded = shellexpand_path(path.trim());
    let absolute = std::path::Path::new(&expanded);
    settings.data_dir = if absolute.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(absolute).to_string_lossy().to_string())
            .unwrap_or(expanded)
    } else {
        expanded
    };
}

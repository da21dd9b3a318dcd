pub mod config;
pub mod records;
pub mod report;
pub mod sample;
pub mod years;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::error::{PanelError, Result};
use crate::loader::{self, DataSource, DirSource};
use crate::models::Dataset;
use crate::settings::{load_settings, resolve_data_dir, Settings};

#[derive(Parser)]
#[command(
    name = "finpanel",
    version,
    about = "Expense, revenue and fleet reports from yearly ledger snapshots."
)]
pub struct Cli {
    /// Directory holding lgd<year>.csv files (overrides FINPANEL_DATA_DIR and settings)
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Log pipeline details to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the years that have a snapshot file.
    Years,
    /// General expenses: totals, type shares, categories and months.
    Expenses {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Corporate card transactions.
    Cards {
        #[arg(long)]
        year: Option<i32>,
        /// Only these card holders (repeatable)
        #[arg(long = "user")]
        users: Vec<String>,
        /// Only these months, by number or name (repeatable)
        #[arg(long = "month")]
        months: Vec<String>,
        /// Write the selected transactions to CSV (default: transacoes_cartao_<year>.csv)
        #[arg(long, value_name = "FILE")]
        export: Option<Option<String>>,
    },
    /// Vehicle costs, mileage and fuel efficiency.
    Vehicles {
        #[arg(long)]
        year: Option<i32>,
        /// Only these vehicles (repeatable)
        #[arg(long = "vehicle")]
        vehicles: Vec<String>,
    },
    /// Compare two or more years.
    Compare {
        /// Years to compare (default: every available year)
        #[arg(long, value_delimiter = ',')]
        years: Vec<i32>,
        /// Categories to compare (repeatable; default: the five largest)
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// Revenue against expenses with operational and strategic indicators.
    Balance {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Normalized records of one year as canonical CSV (JSON with --format json).
    Records {
        #[arg(long)]
        year: Option<i32>,
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<String>,
    },
    /// Every view, one after another.
    Dashboard {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Write sample snapshot files to explore finpanel.
    Sample {
        /// Target directory (default: the configured data directory)
        #[arg(long)]
        dir: Option<String>,
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
    /// Show or change settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings.
    Show,
    /// Remember a data directory.
    SetDataDir { path: String },
    /// Remember the year used when --year is omitted (no value clears it).
    SetDefaultYear { year: Option<i32> },
}

/// Everything a command needs: settings, pipeline configuration and the
/// snapshot source.
pub struct Context {
    pub settings: Settings,
    pub cfg: Config,
    pub source: DirSource,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(data_dir: Option<&str>, format: OutputFormat) -> Self {
        Self::with_settings(load_settings(), data_dir, format)
    }

    pub fn with_settings(settings: Settings, data_dir: Option<&str>, format: OutputFormat) -> Self {
        let dir = resolve_data_dir(data_dir, &settings);
        tracing::debug!(dir = %dir.display(), "using data directory");
        Self {
            cfg: Config::from_settings(&settings),
            source: DirSource::new(dir),
            settings,
            format,
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.source.base().to_path_buf()
    }

    /// The explicit year, else the configured default, else the latest
    /// available snapshot.
    pub fn resolve_year(&self, year: Option<i32>) -> Result<i32> {
        if let Some(y) = year.or(self.settings.default_year) {
            return Ok(y);
        }
        self.source
            .available_years()?
            .into_iter()
            .next_back()
            .ok_or_else(|| {
                PanelError::Other(format!(
                    "no lgd<year>.csv files in {} (try `finpanel sample`)",
                    self.source.base().display()
                ))
            })
    }

    pub fn load_year(&self, year: i32) -> Result<Dataset> {
        loader::load_year(&self.source, year, &self.cfg)
    }

    pub fn load_years(&self, years: &[i32]) -> Result<Dataset> {
        loader::load_years(&self.source, years, &self.cfg)
    }
}

/// Month selections accept numbers (3) or names (março, March, Mar).
pub(crate) fn parse_months(raw: &[String], cfg: &Config) -> Result<Vec<u32>> {
    raw.iter()
        .map(|m| {
            m.trim()
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=12).contains(n))
                .or_else(|| cfg.month_from_name(m))
                .ok_or_else(|| PanelError::Other(format!("unknown month: {m}")))
        })
        .collect()
}

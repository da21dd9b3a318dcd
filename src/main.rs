mod classifier;
mod cli;
mod config;
mod error;
mod fmt;
mod loader;
mod metrics;
mod models;
mod normalizer;
mod settings;
mod views;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::report::{self, View};
use cli::{Cli, Commands, ConfigCommands, Context};

/// Logs go to stderr so text and JSON reports on stdout stay clean.
/// `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "finpanel=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Ok(false) means a view reported its own failure.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let ctx = Context::new(cli.data_dir.as_deref(), cli.format);

    let rendered = match cli.command {
        Commands::Years => {
            cli::years::run(&ctx)?;
            true
        }
        Commands::Expenses { year } => report::run_view(&ctx, &View::Expenses { year }),
        Commands::Cards {
            year,
            users,
            months,
            export,
        } => report::run_view(
            &ctx,
            &View::Cards {
                year,
                users,
                months,
                export,
            },
        ),
        Commands::Vehicles { year, vehicles } => {
            report::run_view(&ctx, &View::Vehicles { year, vehicles })
        }
        Commands::Compare { years, categories } => {
            report::run_view(&ctx, &View::Compare { years, categories })
        }
        Commands::Balance { year } => report::run_view(&ctx, &View::Balance { year }),
        Commands::Dashboard { year } => report::dashboard(&ctx, year),
        Commands::Records { year, output } => {
            cli::records::run(&ctx, year, output.as_deref())?;
            true
        }
        Commands::Sample { dir, force } => {
            let dir = dir
                .map(|d| PathBuf::from(settings::shellexpand_path(&d)))
                .unwrap_or_else(|| ctx.data_dir());
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            cli::sample::run(&dir, force, &ctx.cfg)
                .with_context(|| format!("writing sample data to {}", dir.display()))?;
            true
        }
        Commands::Config { command } => {
            match command {
                ConfigCommands::Show => cli::config::show(&ctx)?,
                ConfigCommands::SetDataDir { path } => {
                    cli::config::set_data_dir(ctx.settings, &path).context("saving settings")?
                }
                ConfigCommands::SetDefaultYear { year } => {
                    cli::config::set_default_year(ctx.settings, year).context("saving settings")?
                }
            }
            true
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            true
        }
    };
    Ok(rendered)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

mod cli;
mod commands;
mod config;
mod display;
mod progress;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Manifest declaring the desired resources
    pub manifest_path: PathBuf,
    /// Tracked state written by apply, refresh and import
    pub state_path: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let manifest_path = config::expand_path(&cli.config)?;
    let state_path = match &cli.state {
        Some(path) => config::expand_path(path)?,
        None => config::default_state_path(&manifest_path),
    };

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        manifest_path,
        state_path,
    };
    log::debug!(
        "Manifest {}, state {} (verbosity {})",
        ctx.manifest_path.display(),
        ctx.state_path.display(),
        ctx.verbose
    );

    match cli.command {
        Command::Plan(args) => commands::plan::run(&ctx, args),
        Command::Apply(args) => commands::apply::run(&ctx, args),
        Command::Refresh(args) => commands::refresh::run(&ctx, args),
        Command::Import { address, id } => commands::import::run(&ctx, &address, &id),
        Command::State(cmd) => commands::state::run(&ctx, cmd),
        Command::Show(args) => commands::lookup::show(&ctx, args),
        Command::List(args) => commands::lookup::list(&ctx, args),
        Command::Kinds => commands::kinds::run(),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "n8nform", &mut io::stdout());
            Ok(())
        }
    }
}

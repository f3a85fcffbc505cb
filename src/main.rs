mod cli;
mod commands;
mod config;
mod engine;
mod manifest;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, ConnectionArgs};
use config::RgsyncConfig;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: RgsyncConfig,
    pub connection: ConnectionArgs,
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

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "rgsync", &mut io::stdout());
        return Ok(());
    }

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: RgsyncConfig::load(cli.config.as_deref())?,
        connection: cli.connection,
    };

    match cli.command {
        Command::Plan(args) => commands::apply::plan(&ctx, &args),
        Command::Apply(args) => commands::apply::apply(&ctx, &args),
        Command::Show(args) => commands::show::show(&ctx, &args),
        Command::Import(args) => commands::show::import(&ctx, &args),
        Command::Destroy(args) => commands::destroy::run(&ctx, &args),
        Command::Completions { .. } => Ok(()),
    }
}

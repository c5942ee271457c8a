//! cmpack - configuration composer and build front-end for webpack-style
//! bundlers.
//!
//! Parses the command line, initializes logging and dispatches to a command.

use clap::{CommandFactory, Parser};
use cmpack_cli::cli::{self, Command};
use cmpack_cli::config::EnvSettings;
use cmpack_cli::context::AppContext;
use cmpack_cli::extension::Extensions;
use cmpack_cli::{commands, error, logger, ui, Result};
use owo_colors::OwoColorize;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    if args.no_color {
        ui::disable_colors();
    } else {
        ui::init_colors();
    }

    if args.version {
        ui::pack("version", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let Some(command) = args.command else {
        let _ = cli::Cli::command().print_help();
        return Ok(());
    };

    run(command).await.map_err(error::cli_error_to_miette)
}

async fn run(command: Command) -> Result<()> {
    if let Command::External(words) = &command {
        let name = words.first().map(String::as_str).unwrap_or_default();
        ui::warning(&format!("Unknown script {}.", name.red()));
        return Ok(());
    }

    let settings = EnvSettings::from_env()?;
    let ctx = AppContext::new(std::env::current_dir()?, settings, Extensions::new());

    match command {
        Command::Build(build_args) => commands::build_execute(&ctx, build_args).await,
        Command::BuildDll => commands::build_dll_execute(&ctx).await.map(|_| ()),
        Command::Server => commands::server_execute(&ctx).await,
        Command::External(_) => Ok(()),
    }
}

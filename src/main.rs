use anyhow::Result;
use clap::Parser;

use booster::cli::{Cli, Commands};
use booster::commands;
use booster::logging;
use booster::script::CheckKind;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize structured logging
    logging::init(cli.common.log_level.as_deref());

    let common = &cli.common;

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Deps(args) => commands::deps::run(common, args),
        Commands::Graph(args) => commands::graph::run(common, args),
        Commands::Makefile(args) => commands::makefile::run(common, args),
        Commands::Uses(args) => commands::uses::run(common, args),
        Commands::Context(args) => commands::context::run(common, args),
        Commands::Scan(args) => commands::check::run(common, CheckKind::Scan, args).await,
        Commands::Test(args) => commands::check::run(common, CheckKind::Test, args).await,
        Commands::Mark(args) => commands::mark::run(common, args),
        Commands::Heal => commands::heal::run(common),
        Commands::Exec(args) => commands::exec::run(common, args).await,
        Commands::Config(args) => commands::config::run(common, args.command),
    }
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use panladder::cli::{run as run_datasets, RunArgs};

#[derive(Parser)]
#[command(name = "panladder")]
#[command(version = "0.1.0")]
#[command(about = "Hierarchical pangenome clustering over an identity ladder", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deflate, search, cluster and reinflate one or more datasets
    Run(RunArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("PANLADDER_LOG")
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Run(args) => run_datasets(args)?,
    }
    Ok(())
}

mod commands;
mod exit_code;
mod output;
mod progress;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::output::OutputConfig;

#[derive(Parser, Debug)]
#[command(
    name = "bmu",
    version,
    about = "Upload, fetch, delete and list backup archives in object storage"
)]
pub struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Configuration file (defaults to $BMU_CONFIG, then the user and system paths)
    #[arg(long, global = true, env = "BMU_CONFIG")]
    config: Option<PathBuf>,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging on stderr
    #[arg(long, global = true)]
    debug: bool,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        quiet: cli.quiet,
    };
    let config = cli.config.as_deref();

    let code = match cli.command {
        commands::Commands::Upload(args) => commands::upload::execute(args, config, output).await,
        commands::Commands::Get(args) => commands::get::execute(args, config, output).await,
        commands::Commands::Rm(args) => commands::rm::execute(args, config, output).await,
        commands::Commands::List(args) => commands::list::execute(args, config, output).await,
        commands::Commands::Completions(args) => commands::completions::execute(args),
    };

    code.into()
}

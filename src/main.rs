use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use myd_reader::{execute_command, Command, ServerVersion};
use tracing_subscriber::EnvFilter;

const DEFAULT_TABLE_PATH: &str = "/usr/local/var/mysql/mysql/user.MYD";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Recover accounts and password hashes from a MyISAM user.MYD file",
    long_about = None
)]
struct Cli {
    /// Path to the table's .MYD data file
    #[arg(short, long, default_value = DEFAULT_TABLE_PATH)]
    file: PathBuf,

    /// Server version that wrote the file; 5.0 and 5.1 use a shorter row prefix
    #[arg(long = "server-version", default_value = "5.5")]
    server_version: ServerVersion,

    #[command(subcommand)]
    command: Option<Command>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or_default();

    let mut stdout = std::io::stdout().lock();
    execute_command(&cli.file, cli.server_version, command, &mut stdout)
}

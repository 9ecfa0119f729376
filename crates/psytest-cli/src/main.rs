//! psytest CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "psytest",
    version,
    about = "Test assignment and psychometric scoring engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Directory of .toml instrument definitions
        #[arg(long, default_value = "./instruments")]
        instruments: PathBuf,

        /// Roster TOML mapping cohorts to student ids
        #[arg(long)]
        roster: Option<PathBuf>,

        /// Host address to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value = "7433")]
        port: u16,
    },

    /// Validate instrument TOML files
    Validate {
        /// Path to instrument file or directory
        #[arg(long)]
        instruments: PathBuf,
    },

    /// Drive a synthetic cohort through the full lifecycle and print the aggregate
    Simulate {
        /// Path to instrument file or directory
        #[arg(long)]
        instruments: PathBuf,

        /// Instrument type to simulate (defaults to the only one loaded)
        #[arg(long)]
        instrument_type: Option<String>,

        /// Number of synthetic students
        #[arg(long, default_value = "25")]
        students: usize,

        /// RNG seed for reproducible runs
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Create a starter instrument and roster
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("psytest=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            instruments,
            roster,
            host,
            port,
        } => commands::serve::execute(instruments, roster, host, port).await,
        Commands::Validate { instruments } => commands::validate::execute(instruments),
        Commands::Simulate {
            instruments,
            instrument_type,
            students,
            seed,
        } => commands::simulate::execute(instruments, instrument_type, students, seed).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

//! Lode CLI - Live package and API documentation.
//!
//! Provides commands for:
//! - `packages`: List the contrib repository's workspaces
//! - `package`: Show one package with its exports, symbols and README
//! - `docs`: List guides or show one guide
//! - `stars`: Show the library's star count

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{DocsArgs, PackageArgs, PackagesArgs, StarsArgs};
use output::Output;

/// Lode - Live package and API documentation.
#[derive(Parser)]
#[command(name = "lode", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List contrib workspaces and their build status.
    Packages(PackagesArgs),
    /// Show one contrib package.
    Package(PackageArgs),
    /// List guides or show one guide.
    Docs(DocsArgs),
    /// Show the library's star count.
    Stars(StarsArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::Packages(args) => args.common.verbose,
            Self::Package(args) => args.common.verbose,
            Self::Docs(args) => args.common.verbose,
            Self::Stars(args) => args.common.verbose,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.command.verbose() {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = rt.block_on(async {
        match cli.command {
            Commands::Packages(args) => args.execute().await,
            Commands::Package(args) => args.execute().await,
            Commands::Docs(args) => args.execute().await,
            Commands::Stars(args) => args.execute().await,
        }
    });

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

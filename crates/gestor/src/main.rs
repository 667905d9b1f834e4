//! Gestor CLI.
//!
//! Provides commands for:
//! - `serve`: Start the Empresa management server
//! - `render`: Render one view to stdout
//! - `compile`: Warm the compiled view cache
//! - `cache clear`: Delete compiled views

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CacheCommand, CompileArgs, RenderArgs, ServeArgs};
use output::Output;

/// Gestor - Empresa management with a directive view engine.
#[derive(Parser)]
#[command(name = "gestor", version, about)]
struct Cli {
    /// Enable verbose output (info-level logs).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve(ServeArgs),
    /// Render a view and print the result.
    Render(RenderArgs),
    /// Compile views into the cache.
    Compile(CompileArgs),
    /// Compiled view cache commands.
    #[command(subcommand)]
    Cache(CacheCommand),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Serve(args) => match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(args.execute()),
            Err(e) => Err(e.into()),
        },
        Commands::Render(args) => args.execute(),
        Commands::Compile(args) => args.execute(),
        Commands::Cache(cmd) => cmd.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

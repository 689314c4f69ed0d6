//! qx - XNAT command-line client
//!
//! Lists, downloads, uploads and deletes XNAT imaging data addressed by
//! hierarchical, wildcard-capable paths.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qixnat_cli::commands::{self, Cli};

/// Log targets raised to debug by `--debug`
const DEBUG_FILTER: &str = "qx_core=debug,qx_rest=debug,qixnat_cli=debug";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new(DEBUG_FILTER)
    } else {
        EnvFilter::from_default_env()
    };

    // stdout is reserved for command output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let exit_code = commands::execute(cli).await;

    std::process::exit(exit_code.as_i32());
}

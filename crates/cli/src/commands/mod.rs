//! CLI command definitions and execution
//!
//! This module contains all CLI commands and their implementations.
//! Remote commands open one XNAT session per invocation and close it on
//! every exit path.

use clap::{Parser, Subcommand};
use qx_core::path::REMOTE_PREFIX;
use qx_core::{ConfigManager, ProfileManager, SuffixMode, Tokenized, Xnat, DEFAULT_PROFILE};
use qx_rest::XnatClient;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod completions;
pub mod cp;
mod ls;
mod profile;
mod rm;

/// qx - XNAT command-line client
///
/// List, download, upload and delete XNAT imaging data by path,
/// e.g. `/QIN/Breast*/Session01/scan/1/resource/DICOM`.
#[derive(Parser, Debug)]
#[command(name = "qx")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Server profile to connect with
    #[arg(long, global = true, env = "QX_PROFILE", default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// Treatment of a trailing /files marker: implicit or explicit
    #[arg(long, global = true)]
    pub suffix_mode: Option<SuffixMode>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the objects matching repository paths
    Ls(ls::LsArgs),

    /// Download files from XNAT or upload files into XNAT
    Cp(cp::CpArgs),

    /// Delete the objects matching repository paths
    Rm(rm::RmArgs),

    /// Manage server profiles
    #[command(subcommand)]
    Profile(profile::ProfileCommands),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Settings shared by the remote commands
#[derive(Debug, Clone)]
pub struct Context {
    pub output: OutputConfig,
    pub profile: String,
    pub suffix_mode: SuffixMode,
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    let command = match cli.command {
        Commands::Completions(args) => return completions::execute(args),
        command => command,
    };

    let config = match ConfigManager::new().and_then(|manager| manager.load()) {
        Ok(config) => config,
        Err(e) => return Formatter::new(output_config).fail(&e),
    };
    let ctx = Context {
        output: output_config.with_defaults(&config.defaults),
        profile: cli.profile,
        suffix_mode: cli.suffix_mode.unwrap_or(config.defaults.suffix_mode),
    };

    match command {
        Commands::Ls(args) => ls::execute(args, ctx).await,
        Commands::Cp(args) => cp::execute(args, ctx).await,
        Commands::Rm(args) => rm::execute(args, ctx).await,
        Commands::Profile(cmd) => profile::execute(cmd, ctx.output),
        Commands::Completions(args) => completions::execute(args),
    }
}

/// Open an XNAT session for the selected profile
pub(crate) fn connect(ctx: &Context) -> qx_core::Result<Xnat<XnatClient>> {
    let profile = ProfileManager::new()?.resolve(&ctx.profile)?;
    tracing::debug!(profile = %profile.name, server = %profile.server, "Connecting");
    let client = XnatClient::new(&profile)?;
    Ok(Xnat::new(client).with_suffix_mode(ctx.suffix_mode))
}

/// End the XNAT session; a failure here never changes the exit code
pub(crate) async fn disconnect(xnat: &Xnat<XnatClient>, formatter: &Formatter) {
    if let Err(e) = xnat.close().await {
        formatter.warning(&format!("Failed to close the XNAT session: {e}"));
    }
}

/// Tokenize a repository path argument, with or without the `xnat:` prefix
pub(crate) fn parse_remote(arg: &str) -> qx_core::Result<Tokenized> {
    qx_core::tokenize(arg.strip_prefix(REMOTE_PREFIX).unwrap_or(arg))
}

pub(crate) fn parse_remotes(args: &[String]) -> qx_core::Result<Vec<Tokenized>> {
    args.iter().map(|arg| parse_remote(arg)).collect()
}

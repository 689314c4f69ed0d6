//! cp command - Copy files between XNAT and the local filesystem
//!
//! Remote sources with a local destination download; local sources with a
//! remote destination upload, creating missing hierarchy levels on the way.

use std::path::{Path, PathBuf};

use clap::Args;
use jiff::civil::Date;
use qx_core::{
    parse_location, DownloadOptions, Layout, Location, Modality, Tokenized, Transfer,
    UploadOptions, Xnat,
};
use qx_rest::XnatClient;
use serde::Serialize;

use super::{connect, disconnect, Context};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, ProgressBar};

/// Copy files
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source path(s) followed by the destination; remote paths start with `xnat:`
    #[arg(required = true, num_args = 2..)]
    pub paths: Vec<String>,

    /// Overwrite files that already exist at the destination
    #[arg(short, long, conflicts_with = "skip_existing")]
    pub force: bool,

    /// Leave files that already exist at the destination untouched
    #[arg(long)]
    pub skip_existing: bool,

    /// Download into project/subject/experiment/... directories
    #[arg(long)]
    pub hierarchical: bool,

    /// Modality of a session created by an upload, e.g. MR
    #[arg(long)]
    pub modality: Option<String>,

    /// Acquisition date of a session created by an upload (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<Date>,
}

#[derive(Debug, Serialize)]
struct CpOutput<'a> {
    status: &'static str,
    files: &'a [Transfer],
    total: usize,
    size_bytes: u64,
    size_human: String,
}

/// The direction of a copy
#[derive(Debug)]
enum Plan {
    Download { sources: Vec<Tokenized>, dest: PathBuf },
    Upload { sources: Vec<PathBuf>, dest: Tokenized },
}

/// Execute the cp command
pub async fn execute(args: CpArgs, ctx: Context) -> ExitCode {
    let formatter = Formatter::new(ctx.output.clone());

    let plan = match plan(&args) {
        Ok(plan) => plan,
        Err(message) => {
            formatter.error(&message);
            return ExitCode::UsageError;
        }
    };

    let xnat = match connect(&ctx) {
        Ok(xnat) => xnat,
        Err(e) => return formatter.fail(&e),
    };

    let result = match &plan {
        Plan::Download { sources, dest } => download(&xnat, sources, dest, &args, &ctx).await,
        Plan::Upload { sources, dest } => upload(&xnat, dest, sources, &args, &ctx).await,
    };
    disconnect(&xnat, &formatter).await;

    match result {
        Ok(transfers) => {
            let download = matches!(plan, Plan::Download { .. });
            print_transfers(&transfers, download, &formatter);
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

/// Classify the arguments into a download or an upload
fn plan(args: &CpArgs) -> Result<Plan, String> {
    let (dest, sources) = args
        .paths
        .split_last()
        .ok_or_else(|| "Missing destination".to_string())?;

    let dest = parse_location(dest).map_err(|e| format!("Invalid destination: {e}"))?;
    let sources = sources
        .iter()
        .map(|s| parse_location(s).map_err(|e| format!("Invalid source {s}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;

    match dest {
        Location::Local(dest) if sources.iter().all(Location::is_remote) => {
            if args.modality.is_some() || args.date.is_some() {
                return Err("--modality and --date only apply to uploads".to_string());
            }
            let sources = sources
                .into_iter()
                .filter_map(|s| s.as_remote().cloned())
                .collect();
            Ok(Plan::Download { sources, dest })
        }
        Location::Remote(dest) if sources.iter().all(Location::is_local) => {
            if args.hierarchical {
                return Err("--hierarchical only applies to downloads".to_string());
            }
            let sources = sources
                .into_iter()
                .filter_map(|s| s.as_local().cloned())
                .collect();
            Ok(Plan::Upload { sources, dest })
        }
        _ => Err(
            "Copy either xnat: sources to a local directory or local files to an xnat: path"
                .to_string(),
        ),
    }
}

async fn download(
    xnat: &Xnat<XnatClient>,
    sources: &[Tokenized],
    dest: &Path,
    args: &CpArgs,
    ctx: &Context,
) -> qx_core::Result<Vec<Transfer>> {
    let options = DownloadOptions {
        force: args.force,
        skip_existing: args.skip_existing,
        layout: if args.hierarchical {
            Layout::Hierarchical
        } else {
            Layout::Flat
        },
    };

    let spinner = ProgressBar::spinner(ctx.output.clone(), "Resolving files");
    let files = xnat.plan_download(sources).await;
    spinner.finish_and_clear();
    let files = files?;

    let progress = ProgressBar::new(ctx.output.clone(), files.len() as u64);
    let result = xnat
        .download_files(&files, dest, &options, |transfer| {
            if let Some(name) = transfer.local.file_name() {
                progress.set_message(&name.to_string_lossy());
            }
            progress.inc(1);
        })
        .await;
    progress.finish_and_clear();
    result
}

async fn upload(
    xnat: &Xnat<XnatClient>,
    dest: &Tokenized,
    sources: &[PathBuf],
    args: &CpArgs,
    ctx: &Context,
) -> qx_core::Result<Vec<Transfer>> {
    let options = UploadOptions {
        modality: args.modality.as_deref().map(Modality::new),
        date: args.date,
        force: args.force,
        skip_existing: args.skip_existing,
    };

    let message = format!("Uploading {} file(s)", sources.len());
    let spinner = ProgressBar::spinner(ctx.output.clone(), &message);
    let result = xnat.upload(dest, sources, &options).await;
    spinner.finish_and_clear();
    result
}

fn print_transfers(transfers: &[Transfer], download: bool, formatter: &Formatter) {
    let size_bytes: u64 = transfers
        .iter()
        .filter(|t| !t.skipped)
        .map(|t| t.size_bytes)
        .sum();
    let size_human = humansize::format_size(size_bytes, humansize::BINARY);

    if formatter.is_json() {
        let output = CpOutput {
            status: "success",
            files: transfers,
            total: transfers.len(),
            size_bytes,
            size_human,
        };
        formatter.json(&output);
        return;
    }

    for transfer in transfers {
        let (from, to) = if download {
            (transfer.remote.to_string(), transfer.local.display().to_string())
        } else {
            (transfer.local.display().to_string(), transfer.remote.to_string())
        };
        let line = if transfer.skipped {
            format!("Skipped existing: {to}")
        } else {
            format!(
                "{from} -> {to} ({})",
                humansize::format_size(transfer.size_bytes, humansize::BINARY)
            )
        };
        formatter.println(&line);
    }
    let verb = if download { "Downloaded" } else { "Uploaded" };
    let copied = transfers.iter().filter(|t| !t.skipped).count();
    formatter.success(&format!("{verb} {copied} file(s), {size_human}."));
}

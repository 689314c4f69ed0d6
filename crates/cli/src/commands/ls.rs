//! ls command - List repository objects
//!
//! Expands one or more paths, wildcards included, and prints the full path
//! of every matching object.

use clap::Args;
use qx_core::{RemoteObject, ResolvedSet};
use serde::Serialize;

use super::{connect, disconnect, parse_remotes, Context};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, ProgressBar};

/// List repository objects
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Repository path(s), e.g. /QIN/Breast*/Session01/scan
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Sort the results by path
    #[arg(short, long)]
    pub sorted: bool,

    /// Show the object type and file sizes
    #[arg(short, long)]
    pub long: bool,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput<'a> {
    items: Vec<&'a RemoteObject>,
    total: usize,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, ctx: Context) -> ExitCode {
    let formatter = Formatter::new(ctx.output.clone());

    let paths = match parse_remotes(&args.paths) {
        Ok(paths) => paths,
        Err(e) => return formatter.fail(&e),
    };

    let xnat = match connect(&ctx) {
        Ok(xnat) => xnat,
        Err(e) => return formatter.fail(&e),
    };

    let spinner = ProgressBar::spinner(ctx.output.clone(), "Resolving paths");
    let result = xnat.expand(&paths, args.sorted).await;
    spinner.finish_and_clear();
    disconnect(&xnat, &formatter).await;

    match result {
        Ok(objects) => {
            print_objects(&objects, args.long, &formatter);
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

fn print_objects(objects: &ResolvedSet, long: bool, formatter: &Formatter) {
    if formatter.is_json() {
        let output = LsOutput {
            items: objects.iter().collect(),
            total: objects.len(),
        };
        formatter.json(&output);
        return;
    }

    for object in objects {
        formatter.println(&format_line(object, long));
    }
}

fn format_line(object: &RemoteObject, long: bool) -> String {
    if !long {
        return object.path.to_string();
    }
    let size = object
        .size_bytes
        .map(|bytes| humansize::format_size(bytes, humansize::BINARY))
        .unwrap_or_default();
    format!("{:<12} {:>10} {}", object.entity.to_string(), size, object.path)
}

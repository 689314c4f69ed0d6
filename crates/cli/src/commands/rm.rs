//! rm command - Delete repository objects
//!
//! Deletes every object matching the given paths. Deleting a container
//! removes its contents on the server; single files cannot be deleted.

use clap::Args;
use qx_core::ResolvedSet;
use serde::Serialize;

use super::{connect, disconnect, parse_remotes, Context};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Delete repository objects
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Repository path(s) to delete, e.g. /QIN/Breast003/Session0*
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Only show what would be deleted (dry run)
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    deleted: Vec<String>,
    total: usize,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, ctx: Context) -> ExitCode {
    let formatter = Formatter::new(ctx.output.clone());

    let paths = match parse_remotes(&args.paths) {
        Ok(paths) => paths,
        Err(e) => return formatter.fail(&e),
    };

    let xnat = match connect(&ctx) {
        Ok(xnat) => xnat,
        Err(e) => return formatter.fail(&e),
    };

    let result = if args.dry_run {
        xnat.plan_delete(&paths).await
    } else {
        xnat.delete(&paths).await
    };
    disconnect(&xnat, &formatter).await;

    match result {
        Ok(objects) => {
            print_summary(&objects, args.dry_run, &formatter);
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

fn print_summary(objects: &ResolvedSet, dry_run: bool, formatter: &Formatter) {
    let deleted: Vec<String> = objects.iter().map(|o| o.path.to_string()).collect();

    if formatter.is_json() {
        let output = RmOutput {
            status: if dry_run { "dry_run" } else { "success" },
            total: deleted.len(),
            deleted,
        };
        formatter.json(&output);
        return;
    }

    let verb = if dry_run { "Would remove" } else { "Removed" };
    for path in &deleted {
        formatter.println(&format!("{verb}: {path}"));
    }
    if !dry_run {
        formatter.success(&format!("Removed {} object(s).", deleted.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rm_output_json() {
        let output = RmOutput {
            status: "dry_run",
            deleted: vec!["/project/QIN/subject/Breast003".to_string()],
            total: 1,
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["status"], "dry_run");
        assert_eq!(json["deleted"][0], "/project/QIN/subject/Breast003");
        assert_eq!(json["total"], 1);
    }
}

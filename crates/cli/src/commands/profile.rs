//! Profile management commands
//!
//! Profiles are named XNAT servers with their login details.

use clap::Subcommand;
use qx_core::{Profile, ProfileManager};
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Profile subcommands for managing server connections
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Add or update a profile
    Set(SetArgs),

    /// List all configured profiles
    List(ListArgs),

    /// Remove a profile
    Remove(RemoveArgs),
}

/// Arguments for the `profile set` command
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Profile name (e.g., "default", "central")
    pub name: String,

    /// XNAT server URL (e.g., "https://central.xnat.org")
    pub server: String,

    /// Login user
    pub user: String,

    /// Login password
    #[arg(long, env = "QX_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Allow insecure TLS connections
    #[arg(long, default_value = "false")]
    pub insecure: bool,
}

/// Arguments for the `profile list` command
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show full details including users
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for the `profile remove` command
#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the profile to remove
    pub name: String,
}

/// JSON output for profile list
#[derive(Serialize)]
struct ProfileListOutput {
    profiles: Vec<ProfileInfo>,
}

/// Profile information for JSON output (without the password)
#[derive(Serialize)]
struct ProfileInfo {
    name: String,
    server: String,
    user: String,
    insecure: bool,
}

impl From<&Profile> for ProfileInfo {
    fn from(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            server: profile.server.clone(),
            user: profile.user.clone(),
            insecure: profile.insecure,
        }
    }
}

/// JSON output for profile set/remove operations
#[derive(Serialize)]
struct ProfileOperationOutput {
    success: bool,
    profile: String,
    message: String,
}

/// Execute a profile subcommand
pub fn execute(cmd: ProfileCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let manager = match ProfileManager::new() {
        Ok(manager) => manager,
        Err(e) => return formatter.fail(&e),
    };

    match cmd {
        ProfileCommands::Set(args) => execute_set(args, &manager, &formatter),
        ProfileCommands::List(args) => execute_list(args, &manager, &formatter),
        ProfileCommands::Remove(args) => execute_remove(args, &manager, &formatter),
    }
}

fn execute_set(args: SetArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    if args.name.is_empty() {
        formatter.error("Profile name cannot be empty");
        return ExitCode::UsageError;
    }

    let mut profile = Profile::new(&args.name, &args.server, &args.user, &args.password);
    profile.insecure = args.insecure;

    match manager.set(profile) {
        Ok(()) => {
            let message = format!("Profile '{}' configured successfully", args.name);
            report(formatter, &args.name, message);
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

fn execute_list(args: ListArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    let profiles = match manager.list() {
        Ok(profiles) => profiles,
        Err(e) => return formatter.fail(&e),
    };

    if formatter.is_json() {
        let output = ProfileListOutput {
            profiles: profiles.iter().map(ProfileInfo::from).collect(),
        };
        formatter.json(&output);
    } else if profiles.is_empty() {
        formatter.println("No profiles configured.");
    } else if args.long {
        for profile in &profiles {
            let tls = if profile.insecure { " (insecure)" } else { "" };
            formatter.println(&format!(
                "{:<12} {} as {}{tls}",
                profile.name, profile.server, profile.user
            ));
        }
    } else {
        for profile in &profiles {
            formatter.println(&format!("{:<12} {}", profile.name, profile.server));
        }
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    match manager.remove(&args.name) {
        Ok(()) => {
            let message = format!("Profile '{}' removed successfully", args.name);
            report(formatter, &args.name, message);
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

fn report(formatter: &Formatter, name: &str, message: String) {
    if formatter.is_json() {
        formatter.json(&ProfileOperationOutput {
            success: true,
            profile: name.to_string(),
            message,
        });
    } else {
        formatter.success(&message);
    }
}

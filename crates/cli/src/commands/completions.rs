//! Shell completion generation
//!
//! `qx completions zsh > ~/.zfunc/_qx` installs completions for zsh; bash,
//! fish, elvish and powershell work the same way.

use clap::CommandFactory;
use clap_complete::Shell;

use super::Cli;
use crate::exit_code::ExitCode;

/// Arguments for the completions command
#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Print the completion script for a shell to stdout
pub fn execute(args: CompletionsArgs) -> ExitCode {
    let script = render(args.shell);
    print!("{script}");
    ExitCode::Success
}

fn render(shell: Shell) -> String {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, name, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

//! Command dispatch: bridges CLI args -> resource cache -> output formatting.

pub mod config_cmd;
pub mod fetch;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a command that needs loaded configuration.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Fetch(args) => {
            let cfg = config::load(global)?;
            fetch::handle(args, global, &cfg).await
        }
        Command::Config(args) => config_cmd::handle(&args, global),
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = crate::cli::Cli::command();
            generate(args.shell, &mut cmd, "catalog", &mut std::io::stdout());
            Ok(())
        }
    }
}

//! Command-line interface for studentform.
//!
//! This module provides the CLI structure for the `stform` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DraftCommand, ExportCommand, FieldsArgs, FormArg, LocationsCommand,
    StatusCommand,
};

use crate::logging::Verbosity;

/// stform - Student registration and media release forms
///
/// Look up Kenyan administrative locations, validate and submit registration
/// forms, and manage the locally saved draft.
#[derive(Debug, Parser)]
#[command(name = "stform")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Browse counties, sub-counties and wards
    #[command(subcommand)]
    Locations(LocationsCommand),

    /// Validate a field file and print the report
    Validate(FieldsArgs),

    /// Validate and submit a field file to the local store
    Submit(FieldsArgs),

    /// Show, save or clear the local draft
    #[command(subcommand)]
    Draft(DraftCommand),

    /// Print the PDF file name and page plan for a form
    Export(ExportCommand),

    /// Show stored submissions and today's counts
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "stform");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(3, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_locations() {
        let cli = Cli::try_parse_from(["stform", "locations", "sub-counties", "027", "--json"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Locations(LocationsCommand::SubCounties { ref county_id, json: true })
                if county_id == "027"
        ));
    }

    #[test]
    fn test_parse_submit() {
        let cli = Cli::try_parse_from(["stform", "submit", "form.json"]).unwrap();
        let Command::Submit(args) = cli.command else {
            panic!("expected submit");
        };
        assert_eq!(args.fields, PathBuf::from("form.json"));
    }

    #[test]
    fn test_parse_draft_clear() {
        let cli = Cli::try_parse_from(["stform", "draft", "clear"]).unwrap();
        assert!(matches!(cli.command, Command::Draft(DraftCommand::Clear)));
    }

    #[test]
    fn test_parse_export_defaults() {
        let cli = Cli::try_parse_from(["stform", "export", "-", "--form", "media"]).unwrap();
        let Command::Export(cmd) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(cmd.form, FormArg::Media);
        assert_eq!((cmd.width, cmd.height), (794, 1123));
    }

    #[test]
    fn test_parse_global_flags() {
        let cli =
            Cli::try_parse_from(["stform", "-vv", "-c", "/custom/config.toml", "status"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }
}

//! CLI argument definitions for AllViewer.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// AllViewer - manage the resource directories behind the image gallery.
///
/// Start with `av status` to see whether the gallery is reachable, then
/// `av add <dir>` to configure resource directories.
#[derive(Parser, Debug)]
#[command(name = "av")]
#[command(author, version, long_version = long_version(), about = "Manage the resource directories of the AllViewer gallery", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Debug logging on stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Location of resources.json (overrides AV_RESOURCES_FILE and config.kdl)
    #[arg(long, global = true)]
    pub resources_file: Option<PathBuf>,

    /// Quiet period in milliseconds before typed paths are validated
    #[arg(long, global = true)]
    pub debounce_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the configuration, validate every path, and report the phase
    Status,

    /// List configured resource directories with their accessibility
    List,

    /// Add a resource directory (must exist and be readable)
    Add {
        /// Directory to add; relative paths are made absolute
        path: PathBuf,
    },

    /// Remove a resource directory
    Remove {
        /// Directory to remove, exactly as listed
        path: String,
    },

    /// Check whether a typed path would be accepted, without adding it
    Check {
        /// Path text to validate
        path: String,
    },

    /// Pick a directory interactively and add it
    Browse,

    /// Keep running, re-validating when configured directories change
    Watch {
        /// Do not monitor the filesystem; only report phase changes
        #[arg(long)]
        no_fs: bool,
    },

    /// Preference management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Preference subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved preferences and where each value came from
    Show,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("AV_GIT_COMMIT"),
        ", built ",
        env!("AV_BUILD_TIMESTAMP"),
        ")"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_with_globals() {
        let cli = Cli::parse_from(["av", "add", "/photos", "-H", "--debounce-ms", "0"]);
        assert!(cli.human_readable);
        assert_eq!(cli.debounce_ms, Some(0));
        assert!(matches!(cli.command, Commands::Add { path } if path == PathBuf::from("/photos")));
    }
}

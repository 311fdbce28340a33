//! AllViewer CLI - manage the resource directories behind the image gallery.

use std::process;

use allviewer::Result;
use allviewer::cli::{Cli, Commands, ConfigCommands};
use allviewer::commands::{self, Output};
use allviewer::config::{ResolvedSettings, SettingsOverrides, resolve_settings};
use allviewer::logging::{self, Verbosity};
use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    logging::init_subscriber(Verbosity::from_flags(cli.verbose, cli.quiet), cli.log_json);

    let overrides = SettingsOverrides {
        debounce_ms: cli.debounce_ms,
        resources_file: cli.resources_file.clone(),
        watch: match &cli.command {
            Commands::Watch { no_fs: true } => Some(false),
            _ => None,
        },
    };

    let result = match resolve_settings(&overrides) {
        Ok(settings) => run_command(cli.command, &settings, human).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

async fn run_command(command: Commands, settings: &ResolvedSettings, human: bool) -> Result<()> {
    tracing::debug!(?command, "running command");
    match command {
        Commands::Status => {
            let result = commands::status(settings).await?;
            output(&result, human);
        }
        Commands::List => {
            let result = commands::list(settings).await?;
            output(&result, human);
        }
        Commands::Add { path } => {
            let result = commands::add(settings, &path).await?;
            output(&result, human);
        }
        Commands::Remove { path } => {
            let result = commands::remove(settings, &path).await?;
            output(&result, human);
        }
        Commands::Check { path } => {
            let result = commands::check(settings, &path).await?;
            output(&result, human);
        }
        Commands::Browse => {
            let result = commands::browse(settings).await?;
            output(&result, human);
        }
        Commands::Watch { no_fs } => {
            let result = commands::watch(settings, !no_fs, human).await?;
            output(&result, human);
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let result = commands::config_show(settings)?;
                output(&result, human);
            }
        },
    }
    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

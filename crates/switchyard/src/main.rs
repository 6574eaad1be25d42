// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchyard - plugin registry host.
//!
//! Loads configuration, registers the built-in plugins, autoloads modules,
//! and runs one inspection command against the resulting registry.

mod host;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use switchyard_core::{PluginRequest, Status};

/// Exit status for an invalid configuration.
const EXIT_CONFIG: i32 = 1;
/// Exit status for a failed command.
const EXIT_FAILURE: i32 = 1;
/// Exit status for a fatal registration error.
const EXIT_CATASTROPHIC: i32 = 78;

/// Switchyard - plugin registry host.
#[derive(Parser, Debug)]
#[command(name = "switchyard", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List registries with their items and active selection.
    Registries,
    /// Print the broadcast this process would advertise.
    Broadcast,
    /// Call a registry item, or the active item when no name is given.
    Call {
        kind: String,
        /// Item name; a comma-separated list is called multiplexed.
        name: Option<String>,
        /// Request field as key=value; may be repeated.
        #[arg(long = "param", value_parser = host::parse_param)]
        params: Vec<(String, String)>,
    },
    /// Load a native module and print its declared info.
    Load { path: PathBuf },
    /// Send one result line to the configured loggers.
    Log { message: String },
}

fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => switchyard_config::load_and_validate_path(path),
        None => switchyard_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            switchyard_config::render_errors(&errors);
            std::process::exit(EXIT_CONFIG);
        }
    };

    init_tracing(&config.daemon.log_level);

    let factory = match host::bootstrap_native(&config) {
        Ok(factory) => factory,
        Err(e) => {
            tracing::error!(error = %e, "fatal registration error");
            eprintln!("switchyard: {e}");
            std::process::exit(EXIT_CATASTROPHIC);
        }
    };

    let outcome = match cli.command {
        Some(Commands::Registries) | None => Ok(host::registries(&factory)),
        Some(Commands::Broadcast) => host::broadcast(&factory),
        Some(Commands::Call { kind, name, params }) => {
            let request: PluginRequest = params.into_iter().collect();
            host::call(&factory, &kind, name.as_deref(), &request)
        }
        Some(Commands::Load { path }) => {
            host::load(&factory, &path, &switchyard_registry::NativeModuleLoader)
        }
        Some(Commands::Log { message }) => {
            switchyard_plugins::log_result(&factory, &config, &message)
                .map(|()| serde_json::to_value(Status::ok()).unwrap_or_default())
        }
    };

    match outcome {
        Ok(value) => print_json(&value),
        Err(e) => {
            print_json(&serde_json::to_value(Status::from(&e)).unwrap_or_default());
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("switchyard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_call_with_params() {
        let cli = Cli::try_parse_from([
            "switchyard",
            "--config",
            "/tmp/switchyard.toml",
            "call",
            "logger",
            "tracing,file",
            "--param",
            "string=hello",
        ])
        .expect("valid command line");

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/switchyard.toml")));
        match cli.command {
            Some(Commands::Call { kind, name, params }) => {
                assert_eq!(kind, "logger");
                assert_eq!(name.as_deref(), Some("tracing,file"));
                assert_eq!(params, vec![("string".to_string(), "hello".to_string())]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_malformed_param() {
        assert!(
            Cli::try_parse_from(["switchyard", "call", "config", "--param", "oops"]).is_err()
        );
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = switchyard_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.registry.config_plugin, "filesystem");
    }
}

//! Command-line interface definitions for the relay.
//!
//! This module contains the CLI argument parsing structures and enums
//! used by the `likesync` binary.

use std::env;

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level command-line interface definition.
#[derive(Debug, Parser)]
#[command(name = "likesync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Available subcommands for the relay.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Launch the HTTP control service with the overlay websocket.
    Serve(ServiceArgs),

    /// Run a single polling session in the foreground until interrupted (no HTTP server).
    Run(RunArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
    Pretty,
}

/// Arguments for the control service command.
#[derive(Debug, Parser)]
pub struct ServiceArgs {
    /// Path to the configuration file
    #[arg(short, long, env = "LIKESYNC_CONFIG", default_value = "likesync.toml")]
    pub config: String,

    /// Optional override for the listen port (overrides port in config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Optional override for the bind address (overrides bind in config)
    #[arg(long)]
    pub bind: Option<String>,
}

/// Arguments for the headless run command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Path to the configuration file
    #[arg(short, long, env = "LIKESYNC_CONFIG", default_value = "likesync.toml")]
    pub config: String,

    /// Video to poll, overrides `source.video_id` from the config
    #[arg(long)]
    pub video_id: Option<String>,
}

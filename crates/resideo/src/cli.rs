//! Clap derive structures for the `resideo` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// resideo -- bridge and CLI for Resideo / Honeywell Home devices
#[derive(Debug, Parser)]
#[command(
    name = "resideo",
    version,
    about = "Control Resideo (Honeywell Home) thermostats, leak sensors and valves",
    long_about = "Runs a reconciling bridge for every device on a Resideo account, or\n\
        reads and writes individual characteristics from the command line.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "RESIDEO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "RESIDEO_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Request timeout in seconds (overrides the config file)
    #[arg(long, env = "RESIDEO_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output, Color & Log Enums ────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge until interrupted
    Run,

    /// List the devices on the account
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Pull one device and show every characteristic
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Change one characteristic and wait for the device to confirm
    Set(SetArgs),

    /// Inspect the configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Per-command arguments ────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Include hidden and offline devices
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Device ID or name
    pub device: String,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Device ID or name
    pub device: String,

    /// Characteristic name, e.g. TargetTemperature
    pub characteristic: String,

    /// New value (temperatures in °C; modes as off/heat/cool/auto)
    pub value: String,

    /// Seconds to wait for the device to confirm
    #[arg(long, default_value = "120")]
    pub wait: u64,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the effective configuration (secrets redacted)
    Show,

    /// Store a secret in the system keyring, read from stdin
    SetSecret {
        #[arg(value_enum)]
        secret: SecretArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SecretArg {
    ConsumerKey,
    AccessToken,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}

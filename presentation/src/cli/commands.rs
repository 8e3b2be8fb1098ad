//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// How JSON results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented JSON
    Pretty,
    /// Single-line JSON
    Compact,
}

/// CLI arguments for butlerd-client
#[derive(Parser, Debug)]
#[command(name = "butlerd-client")]
#[command(author, version, about = "Drive a butler daemon over JSON-RPC")]
#[command(long_about = r#"
butlerd-client spawns `butler daemon`, waits for it to announce its socket,
authenticates, and then talks JSON-RPC 2.0 over that socket.

Configuration files are loaded from (in priority order):
1. BUTLERD_* environment variables (e.g. BUTLERD_RPC__REQUEST_TIMEOUT_SECS=30)
2. --config <path>     Explicit config file
3. ./butlerd.toml      Project-level config
4. ~/.config/butlerd-client/config.toml   Global config

Example:
  butlerd-client run
  butlerd-client call Version.Get
  butlerd-client call Fetch.Caves '{"limit": 5}'
  butlerd-client notify Log '{"level": "info", "message": "hello"}'
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress the startup spinner
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// butler binary (overrides daemon.binary)
    #[arg(long, value_name = "PATH", global = true)]
    pub butler: Option<String>,

    /// Database path (overrides daemon.db_path)
    #[arg(long, value_name = "PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Request timeout in seconds (overrides rpc.request_timeout_secs)
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the daemon and keep the session open until Ctrl-C
    Run {
        /// Log `Progress` notifications (shown with -vv)
        #[arg(long)]
        progress: bool,
    },

    /// Send a request on the global session and print its result
    Call {
        /// Method name, e.g. `Version.Get`
        method: String,
        /// JSON object passed as `params`
        params: Option<String>,
    },

    /// Send a notification on the global session
    Notify {
        method: String,
        /// JSON object passed as `params`; omitted when absent
        params: Option<String>,
    },

    /// Show configuration sources and the effective configuration
    Config,
}

//! Configuration file loading for butlerd-client
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `BUTLERD_`-prefixed environment variables (`__` separates sections)
//! 2. `--config <path>` specified file
//! 3. Project root: `./butlerd.toml` or `./.butlerd.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/butlerd-client/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileConfig, FileDaemonConfig, FileLoggingConfig, FileRpcConfig,
};
pub use loader::ConfigLoader;

//! Configuration parsing for the weir pump.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Conversion into listener set and sink target configs

use clap::Parser;

use crate::events::ListenerSetConfig;
use crate::sink::AsyncSinkConfig;

/// Weir: pump stdin lines through a listener set into an async sink.
#[derive(Parser, Debug, Clone)]
#[command(name = "weir")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Maximum number of events held while no listener is attached (0 disables)
    #[arg(long, env = "WEIR_QUEUE_LENGTH", default_value_t = 128)]
    pub queue_length: usize,

    /// Coalesce payload-less events while queued
    #[arg(long, env = "WEIR_COALESCE", default_value_t = false)]
    pub coalesce: bool,

    /// Maximum number of values an async sink delivers per write
    #[arg(long, env = "WEIR_MAX_COUNT_PER_DISPATCH", default_value_t = 16)]
    pub max_count_per_dispatch: usize,

    /// Number of lines buffered before a batch is written
    #[arg(long, env = "WEIR_CHUNK_SIZE", default_value_t = 4)]
    pub chunk_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "WEIR_LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Listener set settings derived from this config.
    pub fn listener_set(&self) -> ListenerSetConfig {
        ListenerSetConfig::from_config(self.queue_length, self.coalesce)
    }

    /// Async sink settings derived from this config.
    pub fn async_sink(&self) -> AsyncSinkConfig {
        AsyncSinkConfig::from_config(self.max_count_per_dispatch)
    }

    /// Create a default configuration for testing.
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            queue_length: 4,
            coalesce: true,
            max_count_per_dispatch: 2,
            chunk_size: 2,
            log_level: "debug".into(),
            log_json: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_length: 128,
            coalesce: false,
            max_count_per_dispatch: 16,
            chunk_size: 4,
            log_level: "info".into(),
            log_json: false,
        }
    }
}

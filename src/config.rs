//! Process configuration for urlthumb.
//!
//! This module covers the command line only; thumbnail groups live in the
//! TOML file loaded by [`crate::settings::Settings`]. It supports:
//! - Subcommands (`serve`, `canonical`, `check`) via clap
//! - Environment variables with the `THUMB_` prefix
//! - Sensible defaults for all optional settings
//!
//! Running the binary without a subcommand is the same as `serve`.
//!
//! # Environment Variables
//!
//! - `THUMB_HOST` - Server bind address (default: 0.0.0.0)
//! - `THUMB_PORT` - Server port (default: 3000)
//! - `THUMB_CONFIG` - Group configuration file (default: urlthumb.toml)
//! - `THUMB_SCRIPT_NAME` - Front script name for non-rewritten deployments
//! - `THUMB_MAX_TRANSFORMS` - Concurrent transforms (default: 8)
//! - `THUMB_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `THUMB_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::server::{DEFAULT_CACHE_MAX_AGE, DEFAULT_MAX_CONCURRENT_TRANSFORMS};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default group configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "urlthumb.toml";

/// Upper bound for `--max-concurrent-transforms`.
pub const MAX_CONCURRENT_TRANSFORMS_LIMIT: usize = 1024;

// =============================================================================
// CLI Arguments
// =============================================================================

/// urlthumb - On-demand image thumbnails addressed by URL.
///
/// Thumbnail parameters are encoded in the requested filename, e.g.
/// `/thumb/d/photo,c_fill,h_100,w_100.jpg`.
#[derive(Parser, Debug, Clone)]
#[command(name = "urlthumb")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// The selected command, defaulting to `serve`.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the thumbnail server.
    Serve(ServeConfig),

    /// Print the canonical URL for a thumbnail request URL.
    Canonical(CanonicalConfig),

    /// Validate the group configuration and each group's directories.
    Check(CheckConfig),
}

// =============================================================================
// Serve
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "THUMB_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "THUMB_PORT")]
    pub port: u16,

    /// Group configuration file (TOML).
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "THUMB_CONFIG")]
    pub config: PathBuf,

    /// Script name for deployments without URL rewriting (e.g. /index.php).
    #[arg(long, env = "THUMB_SCRIPT_NAME")]
    pub script_name: Option<String>,

    /// Maximum number of transforms running at once.
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_TRANSFORMS, env = "THUMB_MAX_TRANSFORMS")]
    pub max_concurrent_transforms: usize,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "THUMB_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "THUMB_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("host must not be empty".to_string());
        }

        if self.max_concurrent_transforms == 0
            || self.max_concurrent_transforms > MAX_CONCURRENT_TRANSFORMS_LIMIT
        {
            return Err(format!(
                "max_concurrent_transforms must be between 1 and {}",
                MAX_CONCURRENT_TRANSFORMS_LIMIT
            ));
        }

        validate_script_name(self.script_name.as_deref())?;

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Canonical
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct CanonicalConfig {
    /// Absolute request URL, e.g. http://img.example.com/thumb/d/a,w_5000.jpg
    pub url: String,

    /// Group configuration file (TOML).
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "THUMB_CONFIG")]
    pub config: PathBuf,

    /// Script name for deployments without URL rewriting.
    #[arg(long, env = "THUMB_SCRIPT_NAME")]
    pub script_name: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CanonicalConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(format!("'{}' is not an absolute http(s) URL", self.url));
        }
        validate_script_name(self.script_name.as_deref())
    }
}

// =============================================================================
// Check
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Group configuration file (TOML).
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "THUMB_CONFIG")]
    pub config: PathBuf,

    /// Also verify watermark layers, fonts and optimizer binaries.
    #[arg(long, default_value_t = false)]
    pub deep: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

fn validate_script_name(script_name: Option<&str>) -> Result<(), String> {
    match script_name {
        Some(name) if !name.is_empty() && !name.starts_with('/') => {
            Err(format!("script_name '{}' must start with '/'", name))
        }
        _ => Ok(()),
    }
}

// =============================================================================
// Tests
// =============================================================================

//! CLI module for Ollamify
//!
//! # Commands
//!
//! - `serve` - Start the node server
//! - `status` - Show a node's cluster status
//! - `route` - Show where a node would execute a model
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Start a node with default config
//! ollamify serve
//!
//! # Ask a peer where it would run a model
//! ollamify route llama3:8b --url https://lab.example.com
//!
//! # Generate shell completions
//! ollamify completions bash > ~/.bash_completion.d/ollamify
//! ```

pub mod completions;
pub mod config;
pub mod output;
pub mod route;
pub mod serve;
pub mod status;

pub use completions::handle_completions;
pub use config::handle_config_init;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Ollamify - GPU-aware request routing for Ollama nodes
#[derive(Parser, Debug)]
#[command(
    name = "ollamify",
    version,
    about = "Telemetry-driven request routing between Ollama GPU instances and friendly nodes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node server
    Serve(ServeArgs),
    /// Show a node's cluster status
    Status(StatusArgs),
    /// Show where a node would execute a model
    Route(RouteArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "ollamify.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "OLLAMIFY_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "OLLAMIFY_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "OLLAMIFY_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Never forward to friendly servers
    #[arg(long)]
    pub no_routing: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Node base URL
    #[arg(long, env = "OLLAMIFY_URL", default_value = "http://localhost:8080")]
    pub url: String,

    /// Bearer credential for the node
    #[arg(long, env = "OLLAMIFY_API_KEY")]
    pub api_key: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "3500")]
    pub timeout_ms: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Model to route
    pub model: String,

    /// Node base URL
    #[arg(long, env = "OLLAMIFY_URL", default_value = "http://localhost:8080")]
    pub url: String,

    /// Bearer credential for the node
    #[arg(long, env = "OLLAMIFY_API_KEY")]
    pub api_key: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "ollamify.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Join a path onto a node base URL given on the command line.
pub(crate) fn node_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

// CLI definitions for localmcp, shared between the binary and build.rs.
//
// This file contains ONLY clap-derived types with no dependencies on the
// library internals, so build.rs can `include!()` it to generate man pages
// and shell completions at build time.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "localmcp")]
#[command(about = "MCP server exposing local command execution over stdio")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (TOML). Defaults to <config dir>/localmcp/config.toml
    #[arg(short, long, env = "LOCALMCP_CONFIG", global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Log filter, e.g. info or localmcp=debug
    #[arg(long, env = "LOCALMCP_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log line format (logs always go to stderr)
    #[arg(long, env = "LOCALMCP_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormatArg>,

    /// Default timeout for synchronous commands, in seconds
    #[arg(long, env = "LOCALMCP_COMMAND_TIMEOUT", global = true)]
    pub command_timeout: Option<u64>,

    /// Maximum size of one input frame, in bytes
    #[arg(long, env = "LOCALMCP_MAX_FRAME_BYTES", global = true)]
    pub max_frame_bytes: Option<usize>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum LogFormatArg {
    Json,
    Text,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve MCP over stdin/stdout (default)
    Serve,

    /// Print the registered tools as JSON and exit
    Tools,

    /// Print the effective configuration as TOML and exit
    Config,
}

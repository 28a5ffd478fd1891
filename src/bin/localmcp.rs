//! localmcp - MCP server over stdio
//!
//! Loads config, registers tools and runs the dispatch loop until stdin
//! closes or Ctrl-C arrives.

#[path = "../cli.rs"]
mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, LogFormatArg};
use localmcp::config::{Config, LogFormat};
use localmcp::mcp::McpServer;
use localmcp::tasks::TaskManager;
use localmcp::{logging, tools};

/// How long runtime shutdown waits on blocking threads, such as a pending stdin read
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config).context("failed to render config")?);
            Ok(())
        }
        Commands::Tools => {
            let tasks = Arc::new(TaskManager::new(config.task_settings()));
            let registry = tools::build_registry(&config, tasks)?;
            println!("{}", serde_json::to_string_pretty(&registry.list())?);
            Ok(())
        }
        Commands::Serve => {
            logging::init(&config.logging)?;
            let rt = tokio::runtime::Runtime::new()?;
            let result = rt.block_on(serve(config));
            // A stdin read in flight cannot be cancelled; abandon it instead of joining
            rt.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
            result
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = match format {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Text => LogFormat::Text,
        };
    }
    if let Some(secs) = cli.command_timeout {
        config.command.default_timeout_secs = secs;
    }
    if let Some(limit) = cli.max_frame_bytes {
        config.server.max_frame_bytes = limit;
    }
    Ok(config)
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let tasks = Arc::new(TaskManager::new(config.task_settings()));
    let registry = Arc::new(tools::build_registry(&config, tasks.clone())?);

    let server = McpServer::new(&config.server.name, &config.server.version, registry)
        .with_max_frame_bytes(config.server.max_frame_bytes);

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            shutdown.cancel();
        }
    });

    let result = server.run_stdio().await.context("dispatch loop failed");

    let cancelled = tasks.cancel_all();
    if cancelled > 0 {
        tracing::info!(cancelled, "cancelled running background tasks on exit");
    }
    result
}

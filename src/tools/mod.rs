//! Tool registry assembly

pub mod command;
pub mod validation;

pub use command::{
    command_tools, CancelCommandTool, CommandRuntime, GetCommandStatusTool, ListCommandsTool,
    RemoveCommandTool, RunCommandAsyncTool, RunCommandTool, RunScriptTool, ShellInfoTool,
};
pub use validation::CommandValidator;

use std::sync::Arc;

use crate::config::Config;
use crate::error::RegistryError;
use crate::registry::ToolRegistry;
use crate::tasks::TaskManager;

/// Registry with every tool enabled in `config`
pub fn build_registry(config: &Config, tasks: Arc<TaskManager>) -> Result<ToolRegistry, RegistryError> {
    let registry = ToolRegistry::new();
    if config.command.enabled {
        let runtime = Arc::new(CommandRuntime::new(config.command.clone(), tasks));
        registry.register_all(command_tools(runtime))?;
        tracing::info!("registered command tools");
    }
    Ok(registry)
}

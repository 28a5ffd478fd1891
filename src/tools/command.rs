//! Command execution tools - sync runs, background tasks, scripts

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::CommandConfig;
use crate::schema::{array_property, empty_object, integer_property, map_property, object, string_property};
use crate::tasks::{CommandSpec, TaskManager};
use crate::tools::validation::CommandValidator;
use crate::{Arguments, BoxFuture, CallContext, Tool, ToolError, ToolResult};

/// Shared state of the command tools
pub struct CommandRuntime {
    config: CommandConfig,
    validator: CommandValidator,
    tasks: Arc<TaskManager>,
}

impl CommandRuntime {
    pub fn new(config: CommandConfig, tasks: Arc<TaskManager>) -> Self {
        let validator = CommandValidator::new(config.allowed_commands.clone(), config.denied_commands.clone());
        Self { config, validator, tasks }
    }

    /// `command`, `args`, `cwd`, `env` → validated spec
    fn spec_from_args(&self, args: &Arguments) -> Result<CommandSpec, ToolError> {
        let mut spec = CommandSpec::new(args.required_str("command")?)
            .args(args.optional_string_array("args")?.unwrap_or_default());
        spec.cwd = args.optional_str("cwd")?.map(Into::into).or_else(|| self.config.working_directory.clone());
        spec.env = args.optional_string_map("env")?.unwrap_or_default();
        self.validator.validate(&spec)?;
        Ok(spec)
    }

    fn timeout_from_args(&self, args: &Arguments) -> Result<Duration, ToolError> {
        let secs = args.i64_or("timeout_seconds", 0)?;
        // Zero or negative falls back to the configured default
        Ok(match u64::try_from(secs) {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => self.config.default_timeout(),
        })
    }
}

fn command_id(args: &Arguments) -> Result<String, ToolError> {
    args.required_str("command_id")
}

fn command_id_schema(description: &str) -> Value {
    object([("command_id", string_property(description))], &["command_id"])
}

// ==================== run_command ====================

pub struct RunCommandTool {
    runtime: Arc<CommandRuntime>,
}

impl Tool for RunCommandTool {
    fn name(&self) -> &str { "run_command" }
    fn description(&self) -> &str { "Execute a command synchronously" }

    fn schema(&self) -> Value {
        object(
            [
                ("command", string_property("Command to execute")),
                ("args", array_property("string", "Command arguments")),
                ("cwd", string_property("Working directory")),
                ("env", map_property("Environment variables")),
                ("timeout_seconds", integer_property("Command timeout in seconds")),
            ],
            &["command"],
        )
    }

    fn call(&self, ctx: CallContext, args: Arguments) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let spec = self.runtime.spec_from_args(&args)?;
            let timeout = self.runtime.timeout_from_args(&args)?;
            tracing::debug!(command = %spec.command_line(), ?timeout, "run_command");
            let output = self.runtime.tasks.run_sync(&ctx, &spec, Some(timeout)).await;
            ToolResult::json(&output)
        })
    }
}

// ==================== run_command_async ====================

pub struct RunCommandAsyncTool {
    runtime: Arc<CommandRuntime>,
}

impl Tool for RunCommandAsyncTool {
    fn name(&self) -> &str { "run_command_async" }
    fn description(&self) -> &str { "Execute a command in the background, returns a command ID to poll" }

    fn schema(&self) -> Value {
        object(
            [
                ("command", string_property("Command to execute")),
                ("args", array_property("string", "Command arguments")),
                ("cwd", string_property("Working directory")),
                ("env", map_property("Environment variables")),
            ],
            &["command"],
        )
    }

    fn call(&self, _ctx: CallContext, args: Arguments) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let spec = self.runtime.spec_from_args(&args)?;
            let id = self.runtime.tasks.spawn(spec)?;
            ToolResult::json(&json!({"command_id": id, "status": "running"}))
        })
    }
}

// ==================== get_command_status ====================

pub struct GetCommandStatusTool {
    runtime: Arc<CommandRuntime>,
}

impl Tool for GetCommandStatusTool {
    fn name(&self) -> &str { "get_command_status" }
    fn description(&self) -> &str { "Get status and captured output of an async command" }
    fn schema(&self) -> Value { command_id_schema("ID of the async command") }

    fn call(&self, _ctx: CallContext, args: Arguments) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let id = command_id(&args)?;
            match self.runtime.tasks.status(&id) {
                Some(snapshot) => ToolResult::json(&snapshot),
                None => Err(ToolError::not_found(format!("command not found: {id}"))),
            }
        })
    }
}

// ==================== cancel_command ====================

pub struct CancelCommandTool {
    runtime: Arc<CommandRuntime>,
}

impl Tool for CancelCommandTool {
    fn name(&self) -> &str { "cancel_command" }
    fn description(&self) -> &str { "Cancel a running async command" }
    fn schema(&self) -> Value { command_id_schema("ID of the command to cancel") }

    fn call(&self, _ctx: CallContext, args: Arguments) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let id = command_id(&args)?;
            if self.runtime.tasks.cancel(&id) {
                Ok(ToolResult::text(format!("Command {id} cancelled")))
            } else {
                Err(ToolError::not_found(format!("command not found or already completed: {id}")))
            }
        })
    }
}

// ==================== list_commands ====================

pub struct ListCommandsTool {
    runtime: Arc<CommandRuntime>,
}

impl Tool for ListCommandsTool {
    fn name(&self) -> &str { "list_commands" }
    fn description(&self) -> &str { "List all tracked async commands" }
    fn schema(&self) -> Value { empty_object() }

    fn call(&self, _ctx: CallContext, _args: Arguments) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move { ToolResult::json(&self.runtime.tasks.list()) })
    }
}

// ==================== remove_command ====================

pub struct RemoveCommandTool {
    runtime: Arc<CommandRuntime>,
}

impl Tool for RemoveCommandTool {
    fn name(&self) -> &str { "remove_command" }
    fn description(&self) -> &str { "Forget a finished async command and its captured output" }
    fn schema(&self) -> Value { command_id_schema("ID of a completed, failed or cancelled command") }

    fn call(&self, _ctx: CallContext, args: Arguments) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let id = command_id(&args)?;
            self.runtime.tasks.remove(&id)?;
            Ok(ToolResult::text(format!("Command {id} removed")))
        })
    }
}

// ==================== run_script ====================

pub struct RunScriptTool {
    runtime: Arc<CommandRuntime>,
}

impl Tool for RunScriptTool {
    fn name(&self) -> &str { "run_script" }
    fn description(&self) -> &str { "Execute a script file" }

    fn schema(&self) -> Value {
        object(
            [
                ("path", string_property("Path to script file")),
                ("interpreter", string_property("Interpreter to use (bash, python, etc.)")),
                ("args", array_property("string", "Script arguments")),
                ("cwd", string_property("Working directory")),
            ],
            &["path"],
        )
    }

    fn call(&self, ctx: CallContext, args: Arguments) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let path = args.required_str("path")?;
            let cwd: Option<PathBuf> =
                args.optional_str("cwd")?.map(Into::into).or_else(|| self.runtime.config.working_directory.clone());

            // Relative scripts resolve against the directory they will run in
            let script = match &cwd {
                Some(dir) if Path::new(&path).is_relative() => dir.join(&path),
                _ => PathBuf::from(&path),
            };
            if tokio::fs::metadata(&script).await.is_err() {
                return Err(ToolError::not_found(format!("script not found: {path}")));
            }
            let interpreter = args
                .optional_str("interpreter")?
                .filter(|i| !i.is_empty())
                .unwrap_or_else(|| self.runtime.config.default_shell.clone());

            let mut spec = CommandSpec::new(interpreter)
                .arg(script.to_string_lossy())
                .args(args.optional_string_array("args")?.unwrap_or_default());
            spec.cwd = cwd;
            self.runtime.validator.validate(&spec)?;

            let output = self.runtime.tasks.run_sync(&ctx, &spec, None).await;
            ToolResult::json(&output)
        })
    }
}

// ==================== get_shell_info ====================

#[cfg(windows)]
const CANDIDATE_SHELLS: &[&str] = &["cmd.exe", "powershell.exe"];
#[cfg(not(windows))]
const CANDIDATE_SHELLS: &[&str] = &["/bin/bash", "/bin/zsh", "/bin/sh"];

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ShellInfoTool {
    runtime: Arc<CommandRuntime>,
}

impl Tool for ShellInfoTool {
    fn name(&self) -> &str { "get_shell_info" }
    fn description(&self) -> &str { "Get information about available shells" }
    fn schema(&self) -> Value { empty_object() }

    fn call(&self, ctx: CallContext, _args: Arguments) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let mut available = Vec::new();
            let mut versions = BTreeMap::new();
            for shell in CANDIDATE_SHELLS {
                if which::which(shell).is_err() {
                    continue;
                }
                available.push(shell.to_string());

                let probe = CommandSpec::new(*shell).arg("--version");
                let output = self.runtime.tasks.run_sync(&ctx, &probe, Some(VERSION_PROBE_TIMEOUT)).await;
                if output.success() {
                    if let Some(first) = output.stdout.lines().next() {
                        versions.insert(shell.to_string(), first.trim().to_string());
                    }
                }
            }

            ToolResult::json(&json!({
                "default_shell": self.runtime.config.default_shell,
                "os": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
                "available_shells": available,
                "shell_versions": versions,
            }))
        })
    }
}

/// All command tools sharing one runtime
pub fn command_tools(runtime: Arc<CommandRuntime>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(RunCommandTool { runtime: runtime.clone() }),
        Arc::new(RunCommandAsyncTool { runtime: runtime.clone() }),
        Arc::new(GetCommandStatusTool { runtime: runtime.clone() }),
        Arc::new(CancelCommandTool { runtime: runtime.clone() }),
        Arc::new(ListCommandsTool { runtime: runtime.clone() }),
        Arc::new(RemoveCommandTool { runtime: runtime.clone() }),
        Arc::new(RunScriptTool { runtime: runtime.clone() }),
        Arc::new(ShellInfoTool { runtime }),
    ]
}

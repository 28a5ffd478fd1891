//! Command allow/deny policy

use crate::error::ToolError;
use crate::tasks::CommandSpec;

#[derive(Debug, Clone, Default)]
pub struct CommandValidator {
    allowed: Vec<String>,
    denied: Vec<String>,
}

impl CommandValidator {
    pub fn new(allowed: Vec<String>, denied: Vec<String>) -> Self {
        Self { allowed, denied }
    }

    /// Denied patterns match anywhere in the full command line; a non-empty
    /// allow list must contain a prefix of the program.
    pub fn validate(&self, spec: &CommandSpec) -> Result<(), ToolError> {
        if spec.program.trim().is_empty() {
            return Err(ToolError::invalid("command", "a non-empty string"));
        }

        let line = spec.command_line();
        if let Some(pattern) = self.denied.iter().find(|p| line.contains(p.as_str())) {
            return Err(ToolError::Denied(format!("command matches denied pattern: {pattern}")));
        }

        if self.allowed.is_empty() || self.allowed.iter().any(|p| spec.program.starts_with(p.as_str())) {
            return Ok(());
        }
        Err(ToolError::Denied("command not in allowed list".to_string()))
    }
}

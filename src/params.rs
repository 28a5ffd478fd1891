//! Argument extraction helpers shared by every tool
//!
//! The registry never validates arguments against the advertised schema.
//! Handlers pull what they need through these accessors, and a missing or
//! mistyped parameter becomes an ordinary `ToolError`.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::ToolError;

/// Argument object of a `tools/call` request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Accepts an object or null; anything else is rejected
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            Value::Null => Some(Self::new()),
            _ => None,
        }
    }

    pub fn required_str(&self, key: &str) -> Result<String, ToolError> {
        self.optional_str(key)?.ok_or_else(|| ToolError::missing(key))
    }

    pub fn optional_str(&self, key: &str) -> Result<Option<String>, ToolError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ToolError::invalid(key, "a string")),
        }
    }

    pub fn required_i64(&self, key: &str) -> Result<i64, ToolError> {
        self.optional_i64(key)?.ok_or_else(|| ToolError::missing(key))
    }

    pub fn i64_or(&self, key: &str, default: i64) -> Result<i64, ToolError> {
        Ok(self.optional_i64(key)?.unwrap_or(default))
    }

    fn optional_i64(&self, key: &str) -> Result<Option<i64>, ToolError> {
        let Some(value) = self.0.get(key) else {
            return Ok(None);
        };
        let Value::Number(n) = value else {
            return Err(ToolError::invalid(key, "an integer"));
        };
        if let Some(i) = n.as_i64() {
            return Ok(Some(i));
        }
        // Clients built on float-only JSON send 30.0 for 30
        match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                Ok(Some(f as i64))
            }
            _ => Err(ToolError::invalid(key, "an integer")),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ToolError> {
        match self.0.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(ToolError::invalid(key, "a boolean")),
        }
    }

    pub fn required_string_array(&self, key: &str) -> Result<Vec<String>, ToolError> {
        self.optional_string_array(key)?.ok_or_else(|| ToolError::missing(key))
    }

    pub fn optional_string_array(&self, key: &str) -> Result<Option<Vec<String>>, ToolError> {
        let Some(value) = self.0.get(key) else {
            return Ok(None);
        };
        let Value::Array(items) = value else {
            return Err(ToolError::invalid(key, "an array"));
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(ToolError::invalid(format!("{key}[{i}]"), "a string")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    pub fn required_string_map(&self, key: &str) -> Result<HashMap<String, String>, ToolError> {
        self.optional_string_map(key)?.ok_or_else(|| ToolError::missing(key))
    }

    pub fn optional_string_map(&self, key: &str) -> Result<Option<HashMap<String, String>>, ToolError> {
        let Some(value) = self.0.get(key) else {
            return Ok(None);
        };
        let Value::Object(entries) = value else {
            return Err(ToolError::invalid(key, "an object"));
        };
        entries
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => Ok((k.clone(), s.clone())),
                _ => Err(ToolError::invalid(format!("{key}.{k}"), "a string")),
            })
            .collect::<Result<HashMap<_, _>, _>>()
            .map(Some)
    }
}

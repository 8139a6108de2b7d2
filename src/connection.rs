//! Router session abstraction.
//!
//! A [`RouterConnection`] is a live session with one router. It exposes the
//! device metadata read while opening the session and a single primitive:
//! invoke a named action on a named service and get back the action's
//! output values.
//!
//! Sessions are opened per request and closed explicitly afterwards. `close`
//! takes the connection by value, so nothing can call into a closed session.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ActionError;

/// Read-only metadata read from the device while opening the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Firmware version string (e.g., "154.07.57").
    pub firmware_version: String,

    /// Model name (e.g., "FRITZ!Box 7590").
    pub model_name: String,
}

/// A single input argument of an action call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ActionValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for ActionValue {
    /// Wire encoding: booleans are sent as `1`/`0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionValue::Bool(b) => write!(f, "{}", u8::from(*b)),
            ActionValue::Int(i) => write!(f, "{}", i),
            ActionValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ActionValue {
    fn from(value: bool) -> Self {
        ActionValue::Bool(value)
    }
}

impl From<i64> for ActionValue {
    fn from(value: i64) -> Self {
        ActionValue::Int(value)
    }
}

impl From<&str> for ActionValue {
    fn from(value: &str) -> Self {
        ActionValue::Text(value.to_string())
    }
}

/// Named input arguments of an action call.
pub type ActionArguments = BTreeMap<String, ActionValue>;

/// Named output values of an action call.
pub type ActionResult = BTreeMap<String, String>;

#[async_trait]
pub trait RouterConnection: Send + Sync {
    /// Metadata read when the session was opened.
    fn device_info(&self) -> &DeviceInfo;

    /// Perform one remote action call. No retries, no caching.
    async fn invoke(
        &self,
        service: &str,
        action: &str,
        arguments: &ActionArguments,
    ) -> Result<ActionResult, ActionError>;

    /// Release the session.
    fn close(self)
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_arguments_encode_as_digits() {
        assert_eq!(ActionValue::from(true).to_string(), "1");
        assert_eq!(ActionValue::from(false).to_string(), "0");
        assert_eq!(ActionValue::from(42_i64).to_string(), "42");
        assert_eq!(ActionValue::from("guest").to_string(), "guest");
    }
}

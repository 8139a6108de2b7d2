//! Guest WiFi control.
//!
//! [`GuestWifiController`] wraps one live [`RouterConnection`] and turns
//! status/enable/disable requests into TR-064 actions on the guest WiFi
//! service.
//!
//! # Status changes are not synchronous
//!
//! After `SetEnable` the router keeps reporting the old status for a little
//! over three seconds. A write is therefore followed by a settle wait (5 s
//! by default) before the status is read again. Writes that would not
//! change anything are skipped, along with their wait.
//!
//! Every write re-reads the current status first. The router can be changed
//! by other clients at any time, so nothing read earlier is trusted.
//!
//! # Action failures
//!
//! A failing action never aborts an operation. It is logged and the affected
//! field carries `{"error": "<message>"}` instead of a value.

use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::config::DEFAULT_SETTLE_SECS;
use crate::connection::{ActionArguments, ActionResult, ActionValue, RouterConnection};
use crate::error::ActionError;

/// Service id of the guest WiFi configuration.
pub const GUEST_WIFI_SERVICE: &str = "WLANConfiguration3";

pub const ACTION_GET_INFO: &str = "GetInfo";
pub const ACTION_GET_SSID: &str = "GetSSID";
pub const ACTION_GET_STATISTICS: &str = "GetStatistics";
pub const ACTION_SET_ENABLE: &str = "SetEnable";

/// The only status value that counts as enabled.
pub const STATUS_ENABLED: &str = "Up";
pub const STATUS_DISABLED: &str = "Down";

pub const DEFAULT_SETTLE_TIME: Duration = Duration::from_secs(DEFAULT_SETTLE_SECS);

/// Guest WiFi status as reported by `GetInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestWifiStatus {
    Up,
    Down,
    /// Any other status string. Treated as not enabled.
    Other(String),
    /// The status could not be read.
    Failed { error: String },
}

impl GuestWifiStatus {
    pub fn from_protocol(value: &str) -> Self {
        match value {
            STATUS_ENABLED => GuestWifiStatus::Up,
            STATUS_DISABLED => GuestWifiStatus::Down,
            other => GuestWifiStatus::Other(other.to_string()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, GuestWifiStatus::Up)
    }
}

impl Serialize for GuestWifiStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            GuestWifiStatus::Up => serializer.serialize_str(STATUS_ENABLED),
            GuestWifiStatus::Down => serializer.serialize_str(STATUS_DISABLED),
            GuestWifiStatus::Other(value) => serializer.serialize_str(value),
            GuestWifiStatus::Failed { error } => Fetched::<()>::Failed {
                error: error.clone(),
            }
            .serialize(serializer),
        }
    }
}

/// A value read from the router, or the reason it could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Fetched<T> {
    Value(T),
    Failed { error: String },
}

impl<T> Fetched<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Fetched::Value(v) => Some(v),
            Fetched::Failed { .. } => None,
        }
    }
}

impl<T> From<Result<T, ActionError>> for Fetched<T> {
    fn from(result: Result<T, ActionError>) -> Self {
        match result {
            Ok(value) => Fetched::Value(value),
            Err(e) => Fetched::Failed {
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestWifiState {
    pub enabled: GuestWifiStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestWifiDetails {
    pub enabled: GuestWifiStatus,
    pub ssid: Fetched<String>,
    pub stats: Fetched<ActionResult>,
}

/// Device metadata plus the guest WiFi details. Built fresh on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestWifiInfo {
    #[serde(rename = "version")]
    pub firmware_version: String,
    #[serde(rename = "model")]
    pub model_name: String,
    #[serde(rename = "guestwifi")]
    pub guest_wifi: GuestWifiDetails,
}

pub struct GuestWifiController<C: RouterConnection> {
    connection: C,
    settle_time: Duration,
}

impl<C: RouterConnection> GuestWifiController<C> {
    pub fn new(connection: C) -> Self {
        Self::with_settle_time(connection, DEFAULT_SETTLE_TIME)
    }

    pub fn with_settle_time(connection: C, settle_time: Duration) -> Self {
        Self {
            connection,
            settle_time,
        }
    }

    pub async fn get_guest_wifi_status(&self) -> GuestWifiState {
        GuestWifiState {
            enabled: self.read_status().await,
        }
    }

    /// Switch the guest WiFi on or off and return the status read after the
    /// settle wait. Returns right away if the status already matches.
    pub async fn set_guest_wifi_status(&self, enable: bool) -> GuestWifiState {
        let status = self.read_status().await;
        tracing::debug!("Guest WiFi status before change: {:?}", status);

        if enable && status.is_enabled() {
            tracing::info!("Guest WiFi already up, nothing to do");
            return GuestWifiState { enabled: status };
        }
        if !enable && !status.is_enabled() {
            tracing::info!("Guest WiFi already disabled, nothing to do");
            return GuestWifiState { enabled: status };
        }

        let mut arguments = ActionArguments::new();
        arguments.insert("NewEnable".to_string(), ActionValue::from(enable));
        // A failed write may still have reached the router, so the wait and
        // re-read run regardless.
        let _ = self.guest_wifi_action(ACTION_SET_ENABLE, &arguments).await;

        tracing::info!(
            "Waiting {}s for the guest WiFi status to change...",
            self.settle_time.as_secs_f32()
        );
        tokio::time::sleep(self.settle_time).await;

        self.get_guest_wifi_status().await
    }

    pub async fn get_info(&self) -> GuestWifiInfo {
        let no_args = ActionArguments::new();
        let (enabled, ssid, stats) = tokio::join!(
            self.read_status(),
            self.guest_wifi_action(ACTION_GET_SSID, &no_args),
            self.guest_wifi_action(ACTION_GET_STATISTICS, &no_args),
        );

        let ssid = ssid.and_then(|mut result| {
            result
                .remove("NewSSID")
                .ok_or_else(|| missing_field(ACTION_GET_SSID, "NewSSID"))
        });

        let device = self.connection.device_info();
        GuestWifiInfo {
            firmware_version: device.firmware_version.clone(),
            model_name: device.model_name.clone(),
            guest_wifi: GuestWifiDetails {
                enabled,
                ssid: ssid.into(),
                stats: stats.into(),
            },
        }
    }

    /// Release the router connection.
    pub fn close(self) {
        self.connection.close();
    }

    async fn read_status(&self) -> GuestWifiStatus {
        let result = self
            .guest_wifi_action(ACTION_GET_INFO, &ActionArguments::new())
            .await
            .and_then(|mut result| {
                result
                    .remove("NewStatus")
                    .ok_or_else(|| missing_field(ACTION_GET_INFO, "NewStatus"))
            });

        match result {
            Ok(status) => GuestWifiStatus::from_protocol(&status),
            Err(e) => GuestWifiStatus::Failed {
                error: e.to_string(),
            },
        }
    }

    async fn guest_wifi_action(
        &self,
        action: &str,
        arguments: &ActionArguments,
    ) -> Result<ActionResult, ActionError> {
        let result = self
            .connection
            .invoke(GUEST_WIFI_SERVICE, action, arguments)
            .await;
        if let Err(e) = &result {
            tracing::error!("Guest WiFi action {} failed: {}", action, e);
        }
        result
    }
}

fn missing_field(action: &str, field: &str) -> ActionError {
    ActionError::MalformedResponse {
        action: action.to_string(),
        message: format!("missing {}", field),
    }
}

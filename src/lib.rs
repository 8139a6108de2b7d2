//! Guest WiFi control for FRITZ!Box routers.
//!
//! This library reads and toggles the guest WiFi of a FRITZ!Box over the
//! router's TR-064 interface and serves the result through a few web
//! endpoints and one HTML page.
//!
//! # Modules
//!
//! - [`config`] - Settings file, environment and CLI overrides, credentials
//! - [`connection`] - The router session abstraction
//! - [`controller`] - Guest WiFi status, enable/disable, aggregated info
//! - [`error`] - Custom error types for the library
//! - [`server`] - HTTP interface and startup probe
//! - [`tr064`] - TR-064 SOAP transport
//!
//! # Example Usage
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use std::time::Duration;
//! use guestwifi::{GuestWifiController, RouterCredentials, Tr064Connection};
//!
//! let credentials = RouterCredentials::new("192.168.178.1", "admin", "secret")?;
//! let connection = Tr064Connection::open(&credentials, Duration::from_secs(10)).await?;
//! let controller = GuestWifiController::new(connection);
//!
//! let state = controller.set_guest_wifi_status(true).await;
//! println!("Guest WiFi: {:?}", state.enabled);
//!
//! controller.close();
//! # Ok(())
//! # }
//! ```

/// Configuration loading: TOML file, environment variables and CLI flags.
pub mod config;

/// Router session trait and the value types of action calls.
pub mod connection;

/// Guest WiFi controller with idempotent writes and settle wait.
pub mod controller;

/// Error module defining custom error types for the library.
/// Uses `thiserror` for ergonomic error handling.
pub mod error;

/// Axum web interface over the controller.
pub mod server;

/// TR-064 transport: device description, SOAP actions, digest auth.
pub mod tr064;

pub use config::{RouterCredentials, Settings};
pub use connection::{ActionArguments, ActionResult, ActionValue, DeviceInfo, RouterConnection};
pub use controller::{Fetched, GuestWifiController, GuestWifiInfo, GuestWifiState, GuestWifiStatus};
pub use error::{ActionError, ConfigError, ConnectionError};
pub use tr064::Tr064Connection;

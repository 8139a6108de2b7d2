use thiserror::Error;

/// Failure to open or authenticate a router session.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Invalid router credentials: {0} must not be empty")]
    InvalidCredentials(&'static str),

    #[error("Invalid router address '{0}'")]
    InvalidAddress(String),

    #[error("Router unreachable: {0}")]
    Unreachable(String),

    #[error("Failed to read device description: {0}")]
    Description(String),
}

/// Failure of a single remote action call.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Unknown service '{0}'")]
    UnknownService(String),

    #[error("HTTP error calling {action}: {message}")]
    Http { action: String, message: String },

    #[error("Authentication failed for {0}")]
    Unauthorized(String),

    #[error("UPnPError {code}: {description}")]
    Fault { code: String, description: String },

    #[error("Malformed response to {action}: {message}")]
    MalformedResponse { action: String, message: String },
}

/// Invalid or missing process configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
}

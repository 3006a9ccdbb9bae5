//! Error types for Stencil
//!
//! All modules use `StencilResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Stencil operations
pub type StencilResult<T> = Result<T, StencilError>;

/// All errors that can occur in Stencil
#[derive(Error, Debug)]
pub enum StencilError {
    // Configuration errors
    #[error("Invalid cache prefix '{0}', expected 1-8 characters matching [A-Za-z0-9][A-Za-z0-9-]*")]
    InvalidPrefix(String),

    #[error("Invalid digest '{0}', expected 40 hexadecimal characters")]
    InvalidDigest(String),

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No database URL configured")]
    DatabaseUrlMissing,

    // Backing store errors
    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Database already exists: {0}")]
    DatabaseExists(String),

    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("Advisory lock {0} is not held by this session")]
    LockNotHeld(i64),

    // Digest errors
    #[error("Module '{module}' not found in addons paths")]
    ModuleNotFound { module: String },

    #[error("Failed to walk {path}: {reason}")]
    Walk { path: PathBuf, reason: String },

    // Builder errors
    #[error("No template builder command configured")]
    BuilderNotConfigured,

    #[error("Template build for {database} failed (exit code {code}):\n{output}")]
    BuildFailed {
        database: String,
        code: i32,
        output: String,
    },

    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl StencilError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidPrefix(_) => Some("Use at most 8 letters, digits or hyphens, e.g. --cache-prefix cache"),
            Self::DatabaseUrlMissing => {
                Some("Pass --database-url, set STENCIL_DATABASE_URL, or run: stencil config init")
            }
            Self::BuilderNotConfigured => Some("Set [builder] command in the stencil config file"),
            Self::ModuleNotFound { .. } => Some("Check [addons] paths in the stencil config file"),
            Self::Store(sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut) => {
                Some("Check that the database server is reachable at the configured URL")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StencilError::InvalidPrefix("way-too-long".to_string());
        assert!(err.to_string().contains("Invalid cache prefix 'way-too-long'"));
    }

    #[test]
    fn error_hint() {
        assert!(StencilError::DatabaseUrlMissing
            .hint()
            .unwrap()
            .contains("STENCIL_DATABASE_URL"));
        assert_eq!(StencilError::Internal("x".to_string()).hint(), None);
    }

    #[test]
    fn lock_error_display() {
        let err = StencilError::LockNotHeld(42);
        assert_eq!(err.to_string(), "Advisory lock 42 is not held by this session");
    }
}

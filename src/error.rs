//! Error types for the tool host

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for host operations
pub type Result<T> = std::result::Result<T, HostError>;

/// Main error type for the tool host
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    #[error("Invalid schema for tool '{tool}': {message}")]
    InvalidSchema { tool: String, message: String },

    #[error("Registry is sealed, cannot register '{0}'")]
    RegistryClosed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidInput(String),

    #[error("Call to '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    #[error("Server busy: concurrency limit reached")]
    ServerBusy,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire-level failure categories
///
/// Start-up failures (duplicate registration, malformed schema, bad config)
/// are fatal and never reach the wire, so they have no kind here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MethodNotFound,
    InvalidParams,
    Timeout,
    ServerBusy,
    InternalError,
}

impl ErrorKind {
    /// JSON-RPC error code for this kind
    pub fn code(self) -> i64 {
        match self {
            ErrorKind::MethodNotFound => -32601,
            ErrorKind::InvalidParams => -32602,
            ErrorKind::Timeout => -32001,
            ErrorKind::ServerBusy => -32002,
            ErrorKind::InternalError => -32603,
        }
    }
}

impl HostError {
    /// Classify this error into its wire-level kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            HostError::MethodNotFound(_) => ErrorKind::MethodNotFound,
            HostError::InvalidInput(_) => ErrorKind::InvalidParams,
            HostError::Timeout { .. } => ErrorKind::Timeout,
            HostError::ServerBusy => ErrorKind::ServerBusy,
            _ => ErrorKind::InternalError,
        }
    }

    /// Get error code for the MCP protocol
    pub fn code(&self) -> i64 {
        self.kind().code()
    }

    /// True for errors that must abort start-up rather than reach the wire
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HostError::DuplicateTool(_)
                | HostError::InvalidSchema { .. }
                | HostError::RegistryClosed(_)
                | HostError::Config(_)
        )
    }
}

/// Normalized, wire-serializable failure record
///
/// Both transports serialize failures from this value, so semantics never
/// differ between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<serde_json::Value>,
}

impl ErrorRecord {
    /// Normalize a host error into its wire record
    pub fn from_error(
        err: &HostError,
        tool: Option<&str>,
        request_id: Option<&serde_json::Value>,
    ) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            tool: tool.map(String::from),
            request_id: request_id.cloned(),
        }
    }

    /// JSON-RPC error code for this record
    pub fn code(&self) -> i64 {
        self.kind.code()
    }
}

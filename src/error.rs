use std::fmt;

/// Coarse error classes surfaced to MCP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Network,
    HttpStatus,
    Protocol,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Network => "network_error",
            Self::HttpStatus => "http_status_error",
            Self::Protocol => "protocol_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum BiolinkMcpError {
    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("HTTP client initialization failed: {0}")]
    HttpClientInit(reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream unavailable: {0}")]
    Network(String),

    #[error("{status} on {path}: {detail}")]
    HttpStatus {
        status: u16,
        path: String,
        detail: String,
    },

    #[error("API JSON error from {path}: {source}")]
    ApiJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport closed: {0}")]
    TransportClosed(#[from] futures::channel::mpsc::SendError),
}

impl BiolinkMcpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::UnknownTool(_) => ErrorKind::Validation,
            Self::HttpClientInit(_) | Self::Http(_) | Self::Network(_) => ErrorKind::Network,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::ApiJson { .. }
            | Self::Protocol(_)
            | Self::Config(_)
            | Self::Json(_)
            | Self::Io(_)
            | Self::TransportClosed(_) => ErrorKind::Protocol,
        }
    }

    /// Upstream HTTP status, when the error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Structured descriptor relayed back to MCP clients.
    pub fn to_descriptor(&self) -> serde_json::Value {
        let mut error = serde_json::Map::new();
        error.insert("kind".into(), self.kind().as_str().into());
        error.insert("message".into(), self.to_string().into());
        if let Some(status) = self.status() {
            error.insert("status".into(), status.into());
        }
        serde_json::json!({ "error": error })
    }
}

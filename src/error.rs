use thiserror::Error;

use crate::model::DiscoveryState;

/// Failures talking to the controller's REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured base URL is not an http(s) URL.
    #[error("invalid controller url '{0}'")]
    InvalidUrl(String),

    /// Connection, TLS or protocol failure reported by the HTTP client.
    #[error("http request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request to {path} timed out after {seconds}s")]
    Timeout { path: String, seconds: u64 },

    /// Non-2xx reply. `body` is an escaped, truncated preview.
    #[error("controller returned {status} for {path}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    /// The reply was not the record shape we expect for `resource`.
    #[error("failed to decode {resource} response: {source}")]
    Decode {
        resource: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A discovery command refused client-side; no request was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandRejected {
    #[error("discovery is busy (status: {0})")]
    Busy(DiscoveryState),

    #[error("a discovery {0} command is already in flight")]
    InFlight(crate::discovery::DiscoveryCommand),
}

/// Errors from the one-shot discovery operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Rejected(#[from] CommandRejected),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors surfaced through a [`crate::sync::SyncHandle`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync scheduler is not running")]
    Stopped,

    #[error(transparent)]
    Rejected(#[from] CommandRejected),

    #[error(transparent)]
    Api(#[from] ApiError),
}


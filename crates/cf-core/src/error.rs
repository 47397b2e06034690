//! Typed error definitions for the chartfeed system.
//!
//! Provides [`FeedError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result` and can
//! be recovered with `err.downcast_ref::<FeedError>()`.

use thiserror::Error;

/// Domain-specific errors for the chartfeed system.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// An adapter could not reach its source or its credentials were rejected.
    #[error("connection error: {0}")]
    Connection(String),

    /// An adapter operation was called before `connect()` succeeded.
    #[error("adapter '{0}' is not connected")]
    NotConnected(String),

    /// `add_adapter` was given a type no factory knows about.
    #[error("unsupported adapter type: {0}")]
    UnsupportedAdapterType(String),

    /// HTTP transport or status error from a REST source.
    #[error("http error: {0}")]
    Http(String),

    /// Response or file payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The remote API throttled the request.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// WebSocket connection, handshake, or communication error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// An adapter call did not finish within the configured budget.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// File system error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

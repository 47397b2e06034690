//! # cf-core
//!
//! Core crate for the chartfeed market-data aggregation system, providing:
//!
//! - **Types** (`types`): enums and market data structs (bars, trades, news, corporate actions)
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): domain-specific `FeedError` via thiserror
//! - **Subscriptions** (`subscription`): subscription records and the closable callback gate
//! - **Deduplication** (`dedup`): corporate-action and news deduplicators
//! - **WebSocket** (`ws`): WS client with auto-reconnect
//! - **Time utilities** (`time_util`): millisecond timestamps and rounding
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod subscription;
pub mod time_util;
pub mod types;
pub mod ws;

// Re-export types at crate root for convenience.
pub use types::*;

//! WebSocket client with auto-reconnect, used by push-based adapters.

pub mod client;

pub use client::{OnMessageCallback, WsConnConfig, WsConnection};

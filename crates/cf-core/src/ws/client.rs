//! Single WebSocket feed connection with auto-reconnect and ping keep-alive.
//!
//! Each `WsConnection` runs as a tokio task that:
//! 1. Connects to the source's WebSocket endpoint (TLS).
//! 2. Sends the subscription message, if any.
//! 3. Reads text frames and forwards them to a callback.
//! 4. Sends periodic WebSocket pings.
//! 5. Automatically reconnects on disconnection with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::FeedError;

/// Callback invoked for each received text frame.
pub type OnMessageCallback = Arc<dyn Fn(&str) + Send + Sync>;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Configuration for a single WebSocket connection.
#[derive(Debug, Clone)]
pub struct WsConnConfig {
    /// Full WebSocket URL (e.g. `wss://stream.binance.com:9443/ws`).
    pub url: String,
    /// Message sent immediately after every (re)connect.
    pub subscribe_msg: Option<String>,
    /// Interval between ping frames.
    pub ping_interval: Option<Duration>,
    /// Label used in log lines (e.g. `"binance:btcusdt@ticker"`).
    pub label: String,
}

/// A single WebSocket connection managed by a background tokio task.
pub struct WsConnection {
    config: WsConnConfig,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WsConnection {
    /// Create a new (not yet started) connection.
    pub fn new(config: WsConnConfig) -> Self {
        Self { config, shutdown_tx: None, task: None }
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start the connection task. Text frames are forwarded to `on_text`.
    pub fn start(&mut self, on_text: OnMessageCallback) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            connection_loop(config, on_text, shutdown_rx).await;
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
    }

    /// Stop the connection and wait for the task to finish.
    ///
    /// Safe to call more than once or on a connection that never started.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Runs one connection until shutdown, reconnecting with backoff.
async fn connection_loop(config: WsConnConfig, on_text: OnMessageCallback, mut shutdown_rx: watch::Receiver<bool>) {
    let mut backoff = INITIAL_BACKOFF;
    let label = config.label.as_str();

    loop {
        if *shutdown_rx.borrow() {
            info!("[ws:{label}] shutdown requested");
            return;
        }

        info!("[ws:{label}] connecting to {}", config.url);

        let ws_stream = match connect_ws(&config.url).await {
            Ok(s) => {
                backoff = INITIAL_BACKOFF;
                info!("[ws:{label}] connected");
                s
            }
            Err(e) => {
                error!("[ws:{label}] {e}, retrying in {backoff:?}");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {},
                    _ = shutdown_rx.changed() => return,
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };

        let (mut ws_write, mut ws_read) = ws_stream.split();

        if let Some(ref sub_msg) = config.subscribe_msg {
            debug!("[ws:{label}] subscribing: {sub_msg}");
            if let Err(e) = ws_write.send(Message::Text(sub_msg.clone().into())).await {
                error!("[ws:{label}] subscribe send failed: {e}, retrying in {backoff:?}");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        }

        let mut ping_timer = config.ping_interval.map(tokio::time::interval);
        if let Some(timer) = ping_timer.as_mut() {
            // the first tick completes immediately
            timer.tick().await;
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("[ws:{label}] shutdown signal received");
                    let _ = ws_write.close().await;
                    return;
                }

                msg = ws_read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => on_text(text.as_str()),
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            warn!("[ws:{label}] received close frame");
                            break;
                        }
                        Some(Err(e)) => {
                            error!("[ws:{label}] read error: {e}");
                            break;
                        }
                        None => {
                            warn!("[ws:{label}] stream ended");
                            break;
                        }
                        _ => {}
                    }
                }

                _ = tick(&mut ping_timer) => {
                    if let Err(e) = ws_write.send(Message::Ping(Vec::new().into())).await {
                        error!("[ws:{label}] ping send error: {e}");
                        break;
                    }
                }
            }
        }

        warn!("[ws:{label}] disconnected, reconnecting in {backoff:?}");
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {},
            _ = shutdown_rx.changed() => return,
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Wait for the next ping tick, or forever when pinging is disabled.
async fn tick(timer: &mut Option<tokio::time::Interval>) {
    match timer {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Establish a (possibly TLS) WebSocket connection.
async fn connect_ws(
    url: &str,
) -> Result<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>, FeedError> {
    let (stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| FeedError::WebSocket(format!("connect {url}: {e}")))?;
    Ok(stream)
}

//! Per-adapter subscription bookkeeping.
//!
//! Every adapter owns a [`FeedSet`]: one entry per `(symbol, data_type)` with
//! the [`SubscriptionGate`] the adapter fires through and the handle of
//! whatever drives it (a poll task or a WebSocket connection). Removing an
//! entry closes the gate first, so the callback is silenced before the task
//! or socket is torn down.

use std::future::Future;
use std::time::Duration;

use ahash::AHashMap;
use cf_core::subscription::{SubscriptionGate, subscription_key};
use cf_core::types::{DataType, DataUpdate};
use cf_core::ws::WsConnection;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Whatever is producing updates for one subscription.
pub enum FeedHandle {
    /// A timer-driven task (REST polling, file replay, synthesis).
    Task(JoinHandle<()>),
    /// A push socket.
    Socket(WsConnection),
    /// Nothing to drive: the source cannot produce this data type.
    Passive,
}

impl FeedHandle {
    async fn halt(self) {
        match self {
            Self::Task(task) => {
                task.abort();
                let _ = task.await;
            }
            Self::Socket(mut conn) => conn.stop().await,
            Self::Passive => {}
        }
    }
}

struct ActiveFeed {
    gate: SubscriptionGate,
    handle: FeedHandle,
}

/// The subscriptions one adapter is currently serving.
pub struct FeedSet {
    label: &'static str,
    feeds: Mutex<AHashMap<String, ActiveFeed>>,
}

impl FeedSet {
    pub fn new(label: &'static str) -> Self {
        Self { label, feeds: Mutex::new(AHashMap::new()) }
    }

    /// Register a feed, replacing (and halting) any previous one for the key.
    pub async fn insert(&self, symbol: &str, data_type: DataType, gate: SubscriptionGate, handle: FeedHandle) {
        let key = subscription_key(symbol, data_type);
        let previous = self.feeds.lock().insert(key.clone(), ActiveFeed { gate, handle });
        if let Some(old) = previous {
            debug!("[{}] replacing feed {key}", self.label);
            old.gate.close();
            old.handle.halt().await;
        }
    }

    /// Halt and forget one feed. Returns `false` if there was none.
    pub async fn remove(&self, symbol: &str, data_type: DataType) -> bool {
        let key = subscription_key(symbol, data_type);
        let removed = self.feeds.lock().remove(&key);
        match removed {
            Some(feed) => {
                feed.gate.close();
                feed.handle.halt().await;
                debug!("[{}] feed {key} stopped", self.label);
                true
            }
            None => false,
        }
    }

    /// Halt every feed.
    pub async fn clear(&self) {
        let drained: Vec<ActiveFeed> = self.feeds.lock().drain().map(|(_, f)| f).collect();
        for feed in &drained {
            feed.gate.close();
        }
        for feed in drained {
            feed.handle.halt().await;
        }
    }

    pub fn len(&self) -> usize {
        self.feeds.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, symbol: &str, data_type: DataType) -> bool {
        self.feeds.lock().contains_key(&subscription_key(symbol, data_type))
    }
}

/// Spawn a timer loop that calls `produce` every `period` (first call
/// immediately) and fires each returned update through `gate`.
///
/// The loop ends by itself once the gate is closed.
pub fn spawn_poll_loop<F, Fut>(period: Duration, gate: SubscriptionGate, mut produce: F) -> FeedHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Vec<DataUpdate>> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !gate.is_open() {
                return;
            }
            for update in produce().await {
                if !gate.fire(&update) {
                    return;
                }
            }
        }
    });
    FeedHandle::Task(task)
}

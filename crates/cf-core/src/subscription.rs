//! Subscription records and the callback gate that enforces
//! "no callback after unsubscribe".
//!
//! A [`DataSubscription`] is what callers register and what the manager hands
//! to every adapter. Adapters never call the callback directly; they wrap it in
//! a [`SubscriptionGate`] and fire through the gate. Closing a gate takes the
//! write side of its lock, so it waits for any invocation already in progress
//! and guarantees nothing fires once `close()` returns.
//!
//! A callback must not unsubscribe its own subscription from inside the
//! callback: the close would wait on the read lock held by that same call.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::{DataType, DataUpdate};

/// Callback invoked for each push update.
pub type DataCallback = Arc<dyn Fn(&DataUpdate) + Send + Sync>;

/// Key under which a `(symbol, data_type)` interest is stored.
pub fn subscription_key(symbol: &str, data_type: DataType) -> String {
    format!("{symbol}_{data_type}")
}

/// One logical interest: a symbol, a data type, and the callback to feed.
#[derive(Clone)]
pub struct DataSubscription {
    pub symbol: String,
    pub data_type: DataType,
    pub callback: DataCallback,
}

impl DataSubscription {
    pub fn new(symbol: impl Into<String>, data_type: DataType, callback: DataCallback) -> Self {
        Self { symbol: symbol.into(), data_type, callback }
    }

    pub fn key(&self) -> String {
        subscription_key(&self.symbol, self.data_type)
    }

    /// `true` if `update` is for this subscription's symbol and data type.
    pub fn matches(&self, update: &DataUpdate) -> bool {
        update.data_type() == self.data_type && update.symbol() == self.symbol
    }
}

impl std::fmt::Debug for DataSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSubscription")
            .field("symbol", &self.symbol)
            .field("data_type", &self.data_type)
            .finish_non_exhaustive()
    }
}

/// A closable slot around a subscription callback.
///
/// Cheap to clone; clones share the same slot.
#[derive(Clone)]
pub struct SubscriptionGate {
    slot: Arc<RwLock<Option<DataCallback>>>,
}

impl SubscriptionGate {
    pub fn new(callback: DataCallback) -> Self {
        Self { slot: Arc::new(RwLock::new(Some(callback))) }
    }

    /// Invoke the callback if the gate is still open.
    ///
    /// Returns `false` once the gate has been closed.
    pub fn fire(&self, update: &DataUpdate) -> bool {
        let guard = self.slot.read();
        match guard.as_ref() {
            Some(cb) => {
                cb(update);
                true
            }
            None => false,
        }
    }

    /// Close the gate. Blocks until any in-flight `fire` has returned.
    pub fn close(&self) {
        self.slot.write().take();
    }

    pub fn is_open(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Wrap this gate as a plain callback, so a gated subscription can be
    /// forwarded to components that only know [`DataCallback`].
    pub fn as_callback(&self) -> DataCallback {
        let gate = self.clone();
        Arc::new(move |update| {
            gate.fire(update);
        })
    }
}

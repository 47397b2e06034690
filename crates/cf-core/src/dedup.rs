//! Event deduplication for merged multi-source results.
//!
//! When several adapters answer the same corporate-action or news query, the
//! same event usually arrives more than once. The deduplicators in this module
//! keep only the *first* occurrence so the merged result reads like a single
//! source.
//!
//! Two strategies are provided:
//!
//! 1. [`CorporateActionDedup`]: exact `(symbol, action_type, date)` identity.
//! 2. [`NewsDedup`]: equal titles whose timestamps lie within
//!    [`NEWS_DEDUP_WINDOW_MS`] of an already accepted event. Titles are hashed
//!    with xxHash64 to bucket candidates; the title text is still compared so a
//!    hash collision never drops an article.

use ahash::{AHashMap, AHashSet};

use crate::types::{CorporateAction, CorporateActionType, NewsEvent};

/// Two same-titled news events closer than this are the same story.
pub const NEWS_DEDUP_WINDOW_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// CorporateActionDedup: exact key
// ---------------------------------------------------------------------------

/// Deduplicator keyed on `(symbol, action_type, date_ms)`.
pub struct CorporateActionDedup {
    seen: AHashSet<(String, CorporateActionType, u64)>,
}

impl CorporateActionDedup {
    pub fn new() -> Self {
        Self { seen: AHashSet::new() }
    }

    /// Returns `true` if the action is new, recording it.
    #[inline]
    pub fn check_and_insert(&mut self, action: &CorporateAction) -> bool {
        self.seen.insert((action.symbol.clone(), action.action_type, action.date_ms))
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

impl Default for CorporateActionDedup {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// NewsDedup: title + time window
// ---------------------------------------------------------------------------

/// Deduplicator for news headlines.
pub struct NewsDedup {
    window_ms: u64,
    /// title hash -> accepted (title, timestamp) pairs in that bucket
    accepted: AHashMap<u64, Vec<(String, u64)>>,
}

impl NewsDedup {
    pub fn new() -> Self {
        Self::with_window(NEWS_DEDUP_WINDOW_MS)
    }

    pub fn with_window(window_ms: u64) -> Self {
        Self { window_ms, accepted: AHashMap::new() }
    }

    #[inline]
    fn hash_title(title: &str) -> u64 {
        xxhash_rust::xxh64::xxh64(title.as_bytes(), 0)
    }

    /// Returns `true` if no accepted event has the same title within the
    /// window; the event is then recorded.
    pub fn check_and_insert(&mut self, event: &NewsEvent) -> bool {
        let bucket = self.accepted.entry(Self::hash_title(&event.title)).or_default();
        let duplicate = bucket
            .iter()
            .any(|(title, ts)| *title == event.title && ts.abs_diff(event.timestamp_ms) < self.window_ms);
        if duplicate {
            false
        } else {
            bucket.push((event.title.clone(), event.timestamp_ms));
            true
        }
    }

    pub fn clear(&mut self) {
        self.accepted.clear();
    }
}

impl Default for NewsDedup {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Merge helpers
// ---------------------------------------------------------------------------

/// Deduplicate and sort corporate actions ascending by date.
pub fn merge_corporate_actions(actions: Vec<CorporateAction>) -> Vec<CorporateAction> {
    let mut dedup = CorporateActionDedup::new();
    let mut out: Vec<CorporateAction> = actions.into_iter().filter(|a| dedup.check_and_insert(a)).collect();
    out.sort_by_key(|a| a.date_ms);
    out
}

/// Sort news newest first, deduplicate, and keep at most `limit` events.
pub fn merge_news(mut events: Vec<NewsEvent>, limit: usize) -> Vec<NewsEvent> {
    events.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
    let mut dedup = NewsDedup::new();
    events.into_iter().filter(|e| dedup.check_and_insert(e)).take(limit).collect()
}

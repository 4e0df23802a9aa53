//! Single-slot message cache
//!
//! Holds the most recent successfully decoded message, last-write-wins.
//! Each store restarts a single-shot expiry timer; when it fires the slot is
//! emptied and an event is emitted so the UI can retract its notification.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::protocol::constants::{DEFAULT_CACHE_TIME_SECS, MAX_CACHE_TIME_SECS};
use crate::Transport;

/// Events emitted by the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A message was stored (or overwritten)
    Stored { source: Transport },
    /// The expiry timer fired and the slot was emptied
    Expired,
}

/// The cached message and its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedMessage {
    pub filename: String,
    pub content_type: String,
    pub payload: Vec<u8>,
    pub source: Transport,
}

struct Inner {
    slot: Option<CachedMessage>,
    ttl: Duration,
    /// Bumped on every store/clear so a stale expiry timer can tell it lost
    generation: u64,
}

/// Single-slot cache with bounded lifetime
#[derive(Clone)]
pub struct MessageCache {
    inner: Arc<Mutex<Inner>>,
    events: mpsc::Sender<CacheEvent>,
}

impl MessageCache {
    /// Create a cache with the given TTL. The receiver carries store and
    /// expiry notifications; dropping it simply mutes them.
    pub fn new(ttl: Duration) -> (Self, mpsc::Receiver<CacheEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let cache = Self {
            inner: Arc::new(Mutex::new(Inner {
                slot: None,
                ttl: clamp_ttl(ttl),
                generation: 0,
            })),
            events: tx,
        };
        (cache, rx)
    }

    /// Overwrite the slot and restart the expiry countdown
    pub async fn store(&self, message: CachedMessage) {
        let source = message.source;
        let (generation, ttl) = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.slot = Some(message);

            // Emitted under the lock so that racing stores notify in the
            // same order they wrote the slot.
            let _ = self.events.send(CacheEvent::Stored { source }).await;
            (inner.generation, inner.ttl)
        };

        // Single-shot timer; a newer store or clear bumps the generation and
        // this task then fires into the void.
        let inner = self.inner.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;

            let expired = {
                let mut inner = inner.lock().await;
                if inner.generation == generation && inner.slot.is_some() {
                    inner.slot = None;
                    true
                } else {
                    false
                }
            };

            if expired {
                debug!("cached message expired after {:?}", ttl);
                let _ = events.send(CacheEvent::Expired).await;
            }
        });
    }

    /// The currently cached message, if any
    pub async fn get(&self) -> Option<CachedMessage> {
        self.inner.lock().await.slot.clone()
    }

    /// Empty the slot and cancel the pending expiry
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.slot = None;
    }

    /// Adjust the TTL (settings push); applies to subsequent stores
    pub async fn set_ttl(&self, ttl: Duration) {
        self.inner.lock().await.ttl = clamp_ttl(ttl);
    }

    pub async fn ttl(&self) -> Duration {
        self.inner.lock().await.ttl
    }
}

fn clamp_ttl(ttl: Duration) -> Duration {
    let max = Duration::from_secs(MAX_CACHE_TIME_SECS);
    if ttl.is_zero() {
        Duration::from_secs(DEFAULT_CACHE_TIME_SECS)
    } else if ttl > max {
        max
    } else {
        ttl
    }
}

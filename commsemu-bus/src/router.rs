use std::panic::AssertUnwindSafe;

use bytes::Bytes;
use futures::FutureExt as _;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::{
    trie::{is_valid_pattern, PrefixTrie},
    BusError, Handler,
};

/// Routes published payloads to the subscriptions whose pattern matches the topic.
///
/// Every subscription owns a queue drained by its own dispatcher task, so payloads for one
/// subscription are handled one at a time and in the order they were routed, while different
/// subscriptions run concurrently.
#[derive(Debug)]
pub(crate) struct Router {
    routes: RwLock<PrefixTrie<mpsc::Sender<Bytes>>>,
    buffer: usize,
}

impl Router {
    pub(crate) fn new(buffer: usize) -> Self {
        Self { routes: RwLock::new(PrefixTrie::new()), buffer: buffer.max(1) }
    }

    /// Registers `handler` for `pattern` and spawns its dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn subscribe(&self, pattern: &str, handler: Handler) -> Result<(), BusError> {
        if !is_valid_pattern(pattern) {
            return Err(BusError::InvalidTopic(pattern.to_owned()));
        }

        let (tx, rx) = mpsc::channel(self.buffer);
        self.routes
            .write()
            .insert(pattern, tx)
            .map_err(|_| BusError::TopicExists(pattern.to_owned()))?;

        tokio::spawn(dispatch(pattern.to_owned(), rx, handler));
        debug!(topic = pattern, "subscribed");

        Ok(())
    }

    /// Queues `payload` for every matching subscription, waiting for queue space if needed.
    /// Returns the number of subscriptions it was delivered to.
    pub(crate) async fn route(&self, topic: &str, payload: Bytes) -> usize {
        let targets: Vec<mpsc::Sender<Bytes>> =
            self.routes.read().matches(topic).into_iter().cloned().collect();

        if targets.is_empty() {
            trace!(topic, "no subscription for topic, discarding");
            return 0;
        }

        let mut delivered = 0;
        for tx in targets {
            if tx.send(payload.clone()).await.is_ok() {
                delivered += 1;
            } else {
                warn!(topic, "subscription dispatcher is gone");
            }
        }

        delivered
    }
}

async fn dispatch(topic: String, mut rx: mpsc::Receiver<Bytes>, handler: Handler) {
    while let Some(payload) = rx.recv().await {
        // A panicking handler must not take the subscription down with it.
        if AssertUnwindSafe(handler(payload)).catch_unwind().await.is_err() {
            error!(topic, "subscription handler panicked");
        }
    }

    debug!(topic, "subscription closed");
}

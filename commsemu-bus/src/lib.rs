#![doc = "Topic-based parameter bus: subscriptions, in-process delivery and a TCP ingress."]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use thiserror::Error;

use commsemu_wire::pubsub;

mod local;
mod router;
mod tcp;
pub mod trie;

pub use local::LocalBus;
pub use tcp::{TcpBus, TcpPublisher};

/// Default capacity of a subscription's delivery queue.
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 1024;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("IO error: {0:?}")]
    Io(#[from] std::io::Error),
    #[error("Wire protocol error: {0:?}")]
    Wire(#[from] pubsub::Error),
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
    #[error("Topic already subscribed: {0}")]
    TopicExists(String),
}

/// Callback invoked with the payload of every sample published on a subscribed topic.
pub type Handler = Arc<dyn Fn(Bytes) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wraps an async closure into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |payload| Box::pin(f(payload)))
}

/// A source of samples keyed by topic.
///
/// Handlers registered for the same topic pattern are invoked one at a time, in publication
/// order. Handlers on different topics may run concurrently.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Registers `handler` for every sample whose topic matches `topic`.
    async fn subscribe(&self, topic: &str, handler: Handler) -> Result<(), BusError>;
}

/// Tuning knobs shared by every [`Bus`] implementation.
#[derive(Debug, Clone)]
pub struct BusOptions {
    /// Maximum number of concurrent publisher sessions. `None` means unlimited.
    pub max_sessions: Option<usize>,
    /// Capacity of each subscription's delivery queue.
    pub subscription_buffer: usize,
}

impl BusOptions {
    /// Caps the number of concurrent publisher sessions.
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = Some(max_sessions);
        self
    }

    /// Sets the capacity of each subscription's delivery queue.
    pub fn with_subscription_buffer(mut self, size: usize) -> Self {
        self.subscription_buffer = size;
        self
    }
}

impl Default for BusOptions {
    fn default() -> Self {
        Self { max_sessions: None, subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER }
    }
}

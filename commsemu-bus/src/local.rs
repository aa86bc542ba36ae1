use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{router::Router, Bus, BusError, BusOptions, Handler};

/// An in-process [`Bus`]. Publishing hands the payload straight to the matching subscriptions.
///
/// Cloning shares the subscriptions.
#[derive(Debug, Clone)]
pub struct LocalBus {
    router: Arc<Router>,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_options(BusOptions::default())
    }

    pub fn with_options(options: BusOptions) -> Self {
        Self { router: Arc::new(Router::new(options.subscription_buffer)) }
    }

    /// Publishes `payload` on `topic`. Returns how many subscriptions it was queued for.
    ///
    /// Resolves once the payload is queued, not once the handlers have run.
    pub async fn publish(&self, topic: &str, payload: impl Into<Bytes>) -> usize {
        self.router.route(topic, payload.into()).await
    }
}

#[async_trait]
impl Bus for LocalBus {
    async fn subscribe(&self, topic: &str, handler: Handler) -> Result<(), BusError> {
        self.router.subscribe(topic, handler)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::handler;

    #[tokio::test]
    async fn wildcard_and_exact_subscriptions() {
        let bus = LocalBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for pattern in ["/emu/a_to_b/delay", "/emu/*/delay"] {
            let seen = Arc::clone(&seen);
            let tag = pattern.to_owned();
            bus.subscribe(
                pattern,
                handler(move |payload| {
                    let seen = Arc::clone(&seen);
                    let tag = tag.clone();
                    async move { seen.lock().push((tag, payload)) }
                }),
            )
            .await
            .unwrap();
        }

        assert_eq!(bus.publish("/emu/a_to_b/delay", "5").await, 2);
        assert_eq!(bus.publish("/emu/c_to_d/delay", "7").await, 1);
        assert_eq!(bus.publish("/emu/a_to_b/bandwidth", "1").await, 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut seen = seen.lock().clone();
        seen.sort();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], ("/emu/*/delay".to_owned(), Bytes::from_static(b"5")));
        assert_eq!(seen[1], ("/emu/*/delay".to_owned(), Bytes::from_static(b"7")));
        assert_eq!(seen[2], ("/emu/a_to_b/delay".to_owned(), Bytes::from_static(b"5")));
    }
}

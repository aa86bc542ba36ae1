use std::{
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{
    net::{TcpListener, ToSocketAddrs},
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, error, warn};

use crate::{router::Router, Bus, BusError, BusOptions, Handler};

mod publisher;
mod session;

pub use publisher::TcpPublisher;
use session::PublisherSession;

/// A [`Bus`] fed by remote [`TcpPublisher`]s.
///
/// Every accepted connection is a publisher session whose messages are routed to the local
/// subscriptions. Dropping the bus stops accepting and closes all sessions.
#[derive(Debug)]
pub struct TcpBus {
    router: Arc<Router>,
    local_addr: SocketAddr,
    driver: JoinHandle<()>,
}

impl TcpBus {
    /// Binds to `addr` with default options.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, BusError> {
        Self::with_options(addr, BusOptions::default()).await
    }

    pub async fn with_options(addr: impl ToSocketAddrs, options: BusOptions) -> Result<Self, BusError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let router = Arc::new(Router::new(options.subscription_buffer));

        let driver = BusDriver {
            id_counter: 0,
            listener,
            options,
            router: Arc::clone(&router),
            sessions: JoinSet::new(),
        };

        debug!(%local_addr, "Bus listening");
        Ok(Self { router, local_addr, driver: tokio::spawn(driver) })
    }

    /// The address the bus is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Publishes `payload` on `topic` as if it came from a remote publisher.
    pub async fn publish(&self, topic: &str, payload: impl Into<Bytes>) -> usize {
        self.router.route(topic, payload.into()).await
    }
}

impl Drop for TcpBus {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[async_trait]
impl Bus for TcpBus {
    async fn subscribe(&self, topic: &str, handler: Handler) -> Result<(), BusError> {
        self.router.subscribe(topic, handler)
    }
}

/// Accepts publisher connections and owns their sessions.
struct BusDriver {
    /// Session ID counter.
    id_counter: u32,
    listener: TcpListener,
    options: BusOptions,
    router: Arc<Router>,
    /// Running sessions. Dropping the set aborts them.
    sessions: JoinSet<()>,
}

impl BusDriver {
    fn at_capacity(&self) -> bool {
        self.options.max_sessions.is_some_and(|max| self.sessions.len() >= max)
    }
}

impl Future for BusDriver {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        loop {
            if let Poll::Ready(Some(result)) = this.sessions.poll_join_next(cx) {
                if let Err(e) = result {
                    if e.is_panic() {
                        error!(err = ?e, "Publisher session panicked");
                    }
                }
                continue;
            }

            // Leave pending connections in the backlog until a session finishes.
            if this.at_capacity() {
                return Poll::Pending;
            }

            match this.listener.poll_accept(cx) {
                Poll::Ready(Ok((stream, addr))) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(%addr, err = ?e, "Failed to set TCP_NODELAY");
                    }

                    let session =
                        PublisherSession::new(this.id_counter, addr, stream, Arc::clone(&this.router));
                    this.sessions.spawn(session.run());

                    debug!(id = this.id_counter, %addr, "New publisher session");
                    this.id_counter = this.id_counter.wrapping_add(1);

                    continue;
                }
                Poll::Ready(Err(e)) => {
                    error!(err = ?e, "Error accepting connection");
                    continue;
                }
                Poll::Pending => {}
            }

            return Poll::Pending;
        }
    }
}

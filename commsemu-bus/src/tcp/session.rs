use std::{net::SocketAddr, sync::Arc};

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use commsemu_wire::pubsub;

use crate::router::Router;

/// Reads samples from a single connected publisher and routes them.
#[must_use = "This session must be spawned"]
pub(super) struct PublisherSession {
    /// The session ID.
    id: u32,
    /// The address of the publisher.
    addr: SocketAddr,
    conn: Framed<TcpStream, pubsub::Codec>,
    router: Arc<Router>,
    /// Sequence number of the last message received.
    last_seq: Option<u32>,
}

impl PublisherSession {
    pub(super) fn new(id: u32, addr: SocketAddr, stream: TcpStream, router: Arc<Router>) -> Self {
        Self { id, addr, conn: Framed::new(stream, pubsub::Codec::new()), router, last_seq: None }
    }

    /// Runs until the publisher disconnects or sends something undecodable.
    pub(super) async fn run(mut self) {
        while let Some(result) = self.conn.next().await {
            match result {
                Ok(msg) => self.on_message(msg).await,
                Err(e) => {
                    // Framing is lost after a decode error, the connection cannot be resumed.
                    warn!(id = self.id, addr = %self.addr, err = ?e, "Dropping publisher session");
                    return;
                }
            }
        }

        debug!(id = self.id, addr = %self.addr, "Publisher disconnected");
    }

    async fn on_message(&mut self, msg: pubsub::Message) {
        let seq = msg.seq();
        if let Some(last) = self.last_seq {
            if seq != last.wrapping_add(1) {
                debug!(id = self.id, last, seq, "Sequence gap from publisher");
            }
        }
        self.last_seq = Some(seq);

        let (topic, payload) = msg.into_parts();
        let Ok(topic) = std::str::from_utf8(&topic) else {
            warn!(id = self.id, addr = %self.addr, "Discarding message with non UTF-8 topic");
            return;
        };

        let delivered = self.router.route(topic, payload).await;
        trace!(id = self.id, topic, seq, delivered, "Routed message");
    }
}

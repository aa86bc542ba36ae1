use bytes::Bytes;
use futures::SinkExt;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use commsemu_wire::pubsub;

use crate::BusError;

/// Publishes samples to a [`TcpBus`](super::TcpBus) over a single connection.
///
/// Messages are numbered from 0 so the receiving side can notice gaps.
#[derive(Debug)]
pub struct TcpPublisher {
    conn: Framed<TcpStream, pubsub::Codec>,
    seq: u32,
}

impl TcpPublisher {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, BusError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        Ok(Self { conn: Framed::new(stream, pubsub::Codec::new()), seq: 0 })
    }

    /// Sends `payload` on `topic` and flushes it.
    pub async fn publish(&mut self, topic: &str, payload: impl Into<Bytes>) -> Result<(), BusError> {
        let msg = pubsub::Message::new(self.seq, Bytes::copy_from_slice(topic.as_bytes()), payload.into())?;
        self.conn.send(msg).await?;
        self.seq = self.seq.wrapping_add(1);

        Ok(())
    }

    /// Flushes and shuts down the connection.
    pub async fn close(mut self) -> Result<(), BusError> {
        self.conn.close().await?;
        Ok(())
    }
}

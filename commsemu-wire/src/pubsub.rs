use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// First byte of every frame.
const WIRE_ID: u8 = 0x03;

/// Fixed part of the header after the wire ID: topic size, sequence number and payload size.
const HEADER_FIXED_LEN: usize = 2 + 4 + 4;

/// Largest payload a frame may carry. Samples are a few bytes of text.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0:?}")]
    Io(#[from] std::io::Error),
    #[error("Unexpected frame marker {0:#04x}")]
    WireId(u8),
    #[error("Topic too large: {0} bytes, max 65535")]
    TopicTooLarge(usize),
    #[error("Payload too large: {0} bytes, max {max}", max = MAX_PAYLOAD_SIZE)]
    PayloadTooLarge(usize),
}

/// A published message: a topic, the publisher's sequence number and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: Header,
    payload: Bytes,
}

impl Message {
    /// Fails if the topic does not fit the 16-bit length field or the payload exceeds
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn new(seq: u32, topic: Bytes, payload: Bytes) -> Result<Self, Error> {
        let topic_size = u16::try_from(topic.len()).map_err(|_| Error::TopicTooLarge(topic.len()))?;
        let size = u32::try_from(payload.len())
            .ok()
            .filter(|&size| size as usize <= MAX_PAYLOAD_SIZE)
            .ok_or(Error::PayloadTooLarge(payload.len()))?;

        Ok(Self { header: Header { topic_size, topic, seq, size }, payload })
    }

    /// Publisher-assigned sequence number, used to spot gaps.
    #[inline]
    pub fn seq(&self) -> u32 {
        self.header.seq
    }

    /// Bytes this message occupies after the wire ID.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        HEADER_FIXED_LEN + self.header.topic.len() + self.payload.len()
    }

    #[inline]
    pub fn topic(&self) -> &[u8] {
        &self.header.topic
    }

    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Splits the message into `(topic, payload)`.
    #[inline]
    pub fn into_parts(self) -> (Bytes, Bytes) {
        (self.header.topic, self.payload)
    }
}

/// Everything in a frame between the wire ID and the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    topic_size: u16,
    topic: Bytes,
    seq: u32,
    /// Payload length, at most [`MAX_PAYLOAD_SIZE`].
    size: u32,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Header,
    Payload(Header),
}

/// Codec for [`Message`]s on a byte stream.
#[derive(Debug, Default)]
pub struct Codec {
    state: State,
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for Codec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match std::mem::take(&mut self.state) {
                State::Header => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let wire_id = src[0];
                    if wire_id != WIRE_ID {
                        return Err(Error::WireId(wire_id));
                    }

                    if src.len() < 3 {
                        return Ok(None);
                    }

                    let topic_size = u16::from_be_bytes([src[1], src[2]]);

                    // Not enough bytes for the topic and the rest of the header yet
                    if src.len() < 1 + HEADER_FIXED_LEN + topic_size as usize {
                        return Ok(None);
                    }

                    src.advance(3);
                    let topic = src.split_to(topic_size as usize).freeze();
                    let seq = src.get_u32();
                    let size = src.get_u32();
                    if size as usize > MAX_PAYLOAD_SIZE {
                        return Err(Error::PayloadTooLarge(size as usize));
                    }
                    let header = Header { topic_size, topic, seq, size };

                    self.state = State::Payload(header);
                }
                State::Payload(header) => {
                    if src.len() < header.size as usize {
                        self.state = State::Payload(header);
                        return Ok(None);
                    }

                    let payload = src.split_to(header.size as usize).freeze();
                    return Ok(Some(Message { header, payload }));
                }
            }
        }
    }
}

impl Encoder<Message> for Codec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(1 + item.encoded_len());

        dst.put_u8(WIRE_ID);
        dst.put_u16(item.header.topic_size);
        dst.put(item.header.topic);
        dst.put_u32(item.header.seq);
        dst.put_u32(item.header.size);
        dst.put(item.payload);

        Ok(())
    }
}

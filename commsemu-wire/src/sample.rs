//! Encoding of a single floating-point sample, the payload of every impairment topic.
//!
//! Samples travel as UTF-8 decimal text so they can be published from a shell as easily as
//! from code. Rust's float formatting round-trips, so no precision is lost.

use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("payload is not valid UTF-8")]
    Utf8,
    #[error("payload is empty")]
    Empty,
    #[error("payload {0:?} is not a number")]
    NotANumber(String),
}

/// Encodes `value` as a sample payload.
pub fn encode(value: f64) -> Bytes {
    Bytes::from(value.to_string())
}

/// Decodes a sample payload. Leading and trailing whitespace is ignored.
///
/// Non-finite values (`NaN`, `inf`) decode successfully; range checks belong to the consumer.
pub fn decode(payload: &[u8]) -> Result<f64, Error> {
    let text = std::str::from_utf8(payload).map_err(|_| Error::Utf8)?.trim();
    if text.is_empty() {
        return Err(Error::Empty);
    }

    text.parse::<f64>().map_err(|_| Error::NotANumber(text.to_owned()))
}

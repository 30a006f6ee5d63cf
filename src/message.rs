//! User message codec contract
//!
//! For each message type the user provides an encoder producing bytes and a
//! decoder producing the message from a byte view. Either may fail; failures
//! surface to handlers as [`NetError::Encoding`] / [`NetError::Decoding`],
//! never as a panic across the API boundary.

use crate::error::{NetError, Result};
use bytes::Bytes;

/// Encode a message into payload bytes.
pub trait Encode {
    fn encode(&self) -> Result<Bytes>;
}

/// Decode a message from a payload view.
pub trait Decode: Sized {
    fn decode(payload: &[u8]) -> Result<Self>;
}

/// A request/response pair served over a [`ServiceServer`] and called through
/// a [`ServiceClient`].
///
/// [`ServiceServer`]: crate::net::server::ServiceServer
/// [`ServiceClient`]: crate::net::client::ServiceClient
pub trait Service: Send + Sync + 'static {
    type Request: Encode + Decode + Send + 'static;
    type Response: Encode + Decode + Send + 'static;
}

impl Encode for String {
    fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(self.as_bytes()))
    }
}

impl Decode for String {
    fn decode(payload: &[u8]) -> Result<Self> {
        String::from_utf8(payload.to_vec()).map_err(|_| NetError::Decoding)
    }
}

impl Encode for Bytes {
    fn encode(&self) -> Result<Bytes> {
        Ok(self.clone())
    }
}

impl Decode for Bytes {
    fn decode(payload: &[u8]) -> Result<Self> {
        Ok(Bytes::copy_from_slice(payload))
    }
}

impl Encode for Vec<u8> {
    fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(self))
    }
}

impl Decode for Vec<u8> {
    fn decode(payload: &[u8]) -> Result<Self> {
        Ok(payload.to_vec())
    }
}

/// Run the user encoder, normalizing any failure to `Encoding`.
pub(crate) fn encode_message<M: Encode>(message: &M) -> Result<Bytes> {
    message.encode().map_err(|_| NetError::Encoding)
}

/// Run the user decoder, normalizing any failure to `Decoding`.
pub(crate) fn decode_message<M: Decode>(payload: &[u8]) -> Result<M> {
    M::decode(payload).map_err(|_| NetError::Decoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trip() {
        let msg = String::from("status report");
        let data = encode_message(&msg).unwrap();
        let back: String = decode_message(&data).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn invalid_utf8_fails_decoding() {
        let err = decode_message::<String>(&[0xFF, 0xFE]).unwrap_err();
        assert!(matches!(err, NetError::Decoding));
    }

    #[test]
    fn byte_codecs_are_identity() {
        let raw = vec![1u8, 2, 3, 4];
        let data = encode_message(&raw).unwrap();
        let back: Vec<u8> = decode_message(&data).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn decoder_errors_are_normalized() {
        struct Picky;
        impl Decode for Picky {
            fn decode(_: &[u8]) -> Result<Self> {
                Err(NetError::InvalidFrame)
            }
        }
        assert!(matches!(
            decode_message::<Picky>(b"x"),
            Err(NetError::Decoding)
        ));
    }
}

//! Length-prefixed frame codec
//!
//! Every message on the wire, TCP or UDP, is a 4-byte big-endian unsigned
//! length `N` followed by exactly `N` payload bytes. No magic, no version,
//! no checksum; integrity is the transport's responsibility.

use crate::error::{NetError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the length prefix in bytes
pub const HEADER_SIZE: usize = 4;

/// Encode a payload into a fresh frame buffer.
pub fn encode(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_into(payload, &mut buf);
    buf.freeze()
}

/// Append a frame (header + payload) to `buf`.
pub fn encode_into(payload: &[u8], buf: &mut BytesMut) {
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
}

/// Parse the payload length out of a frame header.
///
/// Callers must hand in at least [`HEADER_SIZE`] bytes.
pub fn payload_len(header: &[u8]) -> usize {
    debug_assert!(header.len() >= HEADER_SIZE);
    u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize
}

/// Decode one frame from the front of `buf`, consuming it.
///
/// Fails with [`NetError::InvalidFrame`] if fewer than [`HEADER_SIZE`] bytes
/// are available or the announced payload is truncated. A zero-length
/// payload is valid and yields an empty message; whether empty is
/// semantically acceptable is the message decoder's call.
pub fn decode(buf: &mut Bytes) -> Result<Bytes> {
    if buf.len() < HEADER_SIZE {
        return Err(NetError::InvalidFrame);
    }

    let len = payload_len(&buf[..HEADER_SIZE]);
    if buf.len() < HEADER_SIZE + len {
        return Err(NetError::InvalidFrame);
    }

    buf.advance(HEADER_SIZE);
    Ok(buf.split_to(len))
}

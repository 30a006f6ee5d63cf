//! Shared test protocol: a tiny id/type/value message with a fixed 9-byte
//! little-endian encoding.

#![allow(dead_code)]

use bytes::{Buf, BufMut, Bytes, BytesMut};
use framelink::{Decode, Encode, NetError, Result, Service};

pub const REQUEST: u8 = 0x02;
pub const RESPONSE: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestMessage {
    pub id: u32,
    pub message_type: u8,
    pub value: u32,
}

impl TestMessage {
    pub fn request(id: u32) -> Self {
        Self {
            id,
            message_type: REQUEST,
            value: 0,
        }
    }

    pub fn response(id: u32, value: u32) -> Self {
        Self {
            id,
            message_type: RESPONSE,
            value,
        }
    }
}

impl Encode for TestMessage {
    fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(9);
        buf.put_u32_le(self.id);
        buf.put_u8(self.message_type);
        buf.put_u32_le(self.value);
        Ok(buf.freeze())
    }
}

impl Decode for TestMessage {
    fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() != 9 {
            return Err(NetError::Decoding);
        }
        let mut buf = payload;
        Ok(Self {
            id: buf.get_u32_le(),
            message_type: buf.get_u8(),
            value: buf.get_u32_le(),
        })
    }
}

/// Request/response service speaking `TestMessage` both ways.
pub struct TestService;

impl Service for TestService {
    type Request = TestMessage;
    type Response = TestMessage;
}

/// Service carrying opaque payloads, for size-limit and large-transfer tests.
pub struct PayloadService;

impl Service for PayloadService {
    type Request = Bytes;
    type Response = Bytes;
}

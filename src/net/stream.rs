//! Framed read and write on a connected byte stream

use crate::error::{NetError, Result};
use crate::frame::{self, HEADER_SIZE};
use crate::net::closeable::{timed, CloseSignal, TimeBudget};
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Write one frame (header + payload) as a single logical unit.
///
/// The whole frame is flushed to the stream before the call returns; a
/// transport error maps to `FailedOperation`, a deadline or close to
/// `Aborted`.
pub async fn write_frame<S>(
    stream: &mut S,
    payload: &[u8],
    signal: &CloseSignal,
    timeout: Duration,
) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let framed = frame::encode(payload);
    timed(signal, timeout, stream.write_all(&framed)).await?;
    Ok(())
}

/// Read one frame, returning its payload.
///
/// Two stages against one deadline: a fixed-size header read, then an exact
/// read of the announced payload with whatever budget the header read left
/// over. A zero-length payload is a valid empty message. A payload length
/// exceeding `max_payload` is `InvalidFrame`; the connection is unusable
/// afterwards since the oversized body is never consumed.
///
/// `buf` is a scratch receive buffer, cleared on entry; the returned payload
/// is detached from it.
pub async fn read_frame<S>(
    stream: &mut S,
    buf: &mut BytesMut,
    max_payload: usize,
    signal: &CloseSignal,
    timeout: Duration,
) -> Result<Bytes>
where
    S: AsyncRead + Unpin,
{
    let mut budget = TimeBudget::new(timeout);

    buf.clear();
    buf.resize(HEADER_SIZE, 0);
    timed(
        signal,
        budget.remaining(),
        stream.read_exact(&mut buf[..HEADER_SIZE]),
    )
    .await?;

    let len = frame::payload_len(&buf[..HEADER_SIZE]);
    if len == 0 {
        return Ok(Bytes::new());
    }
    if len > max_payload {
        return Err(NetError::InvalidFrame);
    }

    let remaining = budget.advance();
    buf.resize(HEADER_SIZE + len, 0);
    timed(
        signal,
        remaining,
        stream.read_exact(&mut buf[HEADER_SIZE..HEADER_SIZE + len]),
    )
    .await?;

    Ok(Bytes::copy_from_slice(&buf[HEADER_SIZE..HEADER_SIZE + len]))
}

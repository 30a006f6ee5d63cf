//! Framed send and receive on a datagram socket

use crate::error::{NetError, Result};
use crate::frame::{self, HEADER_SIZE};
use crate::net::closeable::{timed, CloseSignal};
use bytes::{Bytes, BytesMut};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;

/// Encode one frame and send it as a single datagram.
///
/// A partial transmission is a `FailedOperation`.
pub async fn send_frame_to(
    socket: &UdpSocket,
    payload: &[u8],
    target: SocketAddr,
    signal: &CloseSignal,
    timeout: Duration,
) -> Result<()> {
    let framed = frame::encode(payload);
    let sent = timed(signal, timeout, socket.send_to(&framed, target)).await?;
    if sent < framed.len() {
        return Err(NetError::failed());
    }
    Ok(())
}

/// Receive one datagram and strip its frame.
///
/// `buf` is sized `max_payload + HEADER_SIZE` so an in-bounds frame always
/// fits; a datagram shorter than its announced payload (including one the
/// buffer truncated) is an `InvalidFrame`.
pub async fn recv_frame_from(
    socket: &UdpSocket,
    buf: &mut BytesMut,
    max_payload: usize,
    signal: &CloseSignal,
    timeout: Duration,
) -> Result<(Bytes, SocketAddr)> {
    buf.clear();
    buf.resize(max_payload + HEADER_SIZE, 0);

    let (received, sender) = timed(signal, timeout, socket.recv_from(&mut buf[..])).await?;

    if received < HEADER_SIZE {
        return Err(NetError::InvalidFrame);
    }
    let len = frame::payload_len(&buf[..HEADER_SIZE]);
    if received < HEADER_SIZE + len {
        return Err(NetError::InvalidFrame);
    }

    Ok((
        Bytes::copy_from_slice(&buf[HEADER_SIZE..HEADER_SIZE + len]),
        sender,
    ))
}

/// Open the sender-side socket: v4, broadcast enabled, ephemeral local port.
pub(crate) fn open_sender_socket() -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    let local = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
    socket.bind(&local.into())?;
    UdpSocket::from_std(socket.into())
}

/// Open the receiver-side socket bound to `(v4, binding_port)` with
/// `reuse_address` and `broadcast` set.
pub(crate) fn open_receiver_socket(binding_port: u16) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    let local = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, binding_port));
    socket.bind(&local.into())?;
    UdpSocket::from_std(socket.into())
}

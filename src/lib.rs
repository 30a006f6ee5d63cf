//! # framelink - Length-Framed Async Networking Primitives
//!
//! A compact networking library that wraps the tokio reactor into four
//! high-level primitives sharing one timeout, cancellation and
//! sequential-operation discipline:
//!
//! - a length-framed TCP request/response service ([`ServiceClient`] /
//!   [`ServiceServer`]),
//! - a length-framed UDP datagram pair ([`DatagramSender`] /
//!   [`DatagramReceiver`]),
//! - a cancellable [`Resolver`],
//! - a cancellable [`Timer`].
//!
//! ## Features
//!
//! - **Handler-Driven**: every entry point is non-blocking; completions run
//!   on executor threads through user handlers
//! - **One-In-Flight**: per-endpoint operation managers serialize work with
//!   FIFO or latest-wins pending policies
//! - **Uniform Cancellation**: timeouts and `cancel()` both abort by closing
//!   the live I/O handle; handlers observe a stable `Aborted` error
//! - **Simple Wire Format**: 4-byte big-endian length prefix, nothing else
//! - **Blocking Rendezvous**: [`Waiter`]/[`Waitable`] let synchronous callers
//!   join handler completions without deadlocking the executor
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use framelink::{NetConfig, ServiceClient, ServiceServer, Service};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! struct Echo;
//! impl Service for Echo {
//!     type Request = Bytes;
//!     type Response = Bytes;
//! }
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() {
//!     let server = ServiceServer::<Echo>::new(10001, NetConfig::new());
//!     server.advertise_service(|_peer, request| request);
//!
//!     let client = ServiceClient::<Echo>::new(NetConfig::new());
//!     client.async_call(
//!         &Bytes::from_static(b"hello"),
//!         "127.0.0.1",
//!         10001,
//!         Duration::from_secs(1),
//!         |response| println!("got {:?}", response),
//!     );
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │   High-Level Endpoints   │  ServiceClient/Server, DatagramSender/Receiver,
//! │                          │  Resolver, Timer
//! ├──────────────────────────┤
//! │   Coordination Layer     │  OperationManager, CloseSignal + timed(),
//! │                          │  Waiter/Waitable
//! ├──────────────────────────┤
//! │   Framed I/O             │  stream / datagram codecs, frame header
//! ├──────────────────────────┤
//! │   Reactor                │  tokio runtime, sockets, timers
//! └──────────────────────────┘
//! ```
//!
//! One call is one connection: the client opens a fresh socket per call and
//! never multiplexes. Errors flow through handlers as [`NetError`], never as
//! panics across the API boundary; the library never retries on its own.

pub mod buffer;
pub mod config;
pub mod error;
pub mod frame;
pub mod message;
pub mod net;

// Re-exports
pub use config::NetConfig;
pub use error::{NetError, Result};
pub use message::{Decode, Encode, Service};
pub use net::{
    DatagramReceiver, DatagramSender, Resolver, ServiceClient, ServiceServer, Timer, Waitable,
    Waiter,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

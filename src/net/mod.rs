//! Runtime-backed networking primitives
//!
//! Everything in this module runs against the tokio reactor: the shared
//! coordination layer (operation manager, closeable timed operations, the
//! waiter rendezvous), the framed stream/datagram I/O, and the four
//! user-facing endpoints built on top of them.

pub mod client;
pub mod closeable;
pub mod datagram;
pub mod manager;
pub mod receiver;
pub mod resolver;
pub mod sender;
pub mod server;
pub mod stream;
pub mod timer;
pub mod waiter;

pub use client::ServiceClient;
pub use closeable::{timed, CloseSignal, TimeBudget};
pub use manager::{
    FinishedNotifier, Operation, OperationManager, PendingPolicy, PendingQueue, PendingReplacer,
};
pub use receiver::DatagramReceiver;
pub use resolver::Resolver;
pub use sender::DatagramSender;
pub use server::ServiceServer;
pub use timer::Timer;
pub use waiter::{WaitCondition, Waitable, Waiter};

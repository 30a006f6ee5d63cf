//! Request/response service server
//!
//! `advertise_service` opens the acceptor and runs an accept loop; every
//! accepted connection is handled independently: framed receive, user
//! handler, framed send. Transient per-connection failures (timeout, bad
//! frame, decode error, peer reset) drop the connection silently and the
//! loop keeps accepting. A new advertise supersedes the previous one by
//! closing the acceptor.

use crate::buffer::BufferPool;
use crate::config::NetConfig;
use crate::frame::HEADER_SIZE;
use crate::message::{self, Service};
use crate::net::closeable::{CloseSignal, CurrentOperation};
use crate::net::manager::{FinishedNotifier, OperationManager, PendingReplacer};
use crate::net::stream::{read_frame, write_frame};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::marker::PhantomData;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

const ACCEPT_BACKLOG: i32 = 128;
const POOLED_BUFFERS: usize = 16;

/// Server side of a [`Service`], bound to one TCP port.
pub struct ServiceServer<S: Service> {
    runtime: Handle,
    binding_port: u16,
    config: NetConfig,
    buffers: Arc<BufferPool>,
    running: Arc<AtomicBool>,
    manager: Arc<OperationManager<PendingReplacer>>,
    current: Arc<CurrentOperation>,
    _service: PhantomData<fn() -> S>,
}

impl<S: Service> ServiceServer<S> {
    /// Create a server for `binding_port` on the ambient tokio runtime.
    ///
    /// Panics outside a runtime context; use [`ServiceServer::with_handle`]
    /// there.
    pub fn new(binding_port: u16, config: NetConfig) -> Self {
        Self::with_handle(Handle::current(), binding_port, config)
    }

    pub fn with_handle(runtime: Handle, binding_port: u16, config: NetConfig) -> Self {
        let current = Arc::new(CurrentOperation::new());
        let running = Arc::new(AtomicBool::new(false));
        let closer = current.clone();
        let running_flag = running.clone();
        Self {
            runtime,
            binding_port,
            buffers: Arc::new(BufferPool::new(
                POOLED_BUFFERS,
                config.max_message_size + HEADER_SIZE,
            )),
            config,
            running,
            manager: OperationManager::new(move || {
                running_flag.store(false, Ordering::SeqCst);
                closer.close();
            }),
            current,
            _service: PhantomData,
        }
    }

    /// Start serving. The handler runs once per received request, on an
    /// executor thread, and returns the response to send back.
    ///
    /// Advertising while already serving replaces the listener: the previous
    /// acceptor is closed, connections already accepted are left to finish
    /// or fail on their own I/O.
    pub fn advertise_service(
        &self,
        handler: impl Fn(SocketAddr, S::Request) -> S::Response + Send + Sync + 'static,
    ) {
        let handler: Arc<dyn Fn(SocketAddr, S::Request) -> S::Response + Send + Sync> =
            Arc::new(handler);

        let runtime = self.runtime.clone();
        let manager = self.manager.clone();
        let current = self.current.clone();
        let running = self.running.clone();
        let buffers = self.buffers.clone();
        let binding_port = self.binding_port;
        let max_message_size = self.config.max_message_size;
        let receive_timeout = self.config.receive_timeout;
        let send_timeout = self.config.send_timeout;

        self.manager.start_operation(move || {
            running.store(true, Ordering::SeqCst);
            let signal = current.arm();
            let notifier = FinishedNotifier::new(manager.clone());

            let task_runtime = runtime.clone();
            runtime.spawn(async move {
                accept_loop::<S>(AcceptLoop {
                    runtime: task_runtime,
                    signal,
                    running,
                    manager,
                    handler,
                    buffers,
                    binding_port,
                    max_message_size,
                    receive_timeout,
                    send_timeout,
                })
                .await;
                // Dropping the notifier dispatches a queued re-advertise.
                drop(notifier);
            });
        });
    }

    /// Stop accepting. In-flight connections finish or fail on their own.
    pub fn cancel(&self) {
        self.manager.cancel_operation();
    }
}

struct AcceptLoop<S: Service> {
    runtime: Handle,
    signal: Arc<CloseSignal>,
    running: Arc<AtomicBool>,
    manager: Arc<OperationManager<PendingReplacer>>,
    handler: Arc<dyn Fn(SocketAddr, S::Request) -> S::Response + Send + Sync>,
    buffers: Arc<BufferPool>,
    binding_port: u16,
    max_message_size: usize,
    receive_timeout: Duration,
    send_timeout: Duration,
}

async fn accept_loop<S: Service>(ctx: AcceptLoop<S>) {
    let listener = match open_listener(ctx.binding_port) {
        Ok(listener) => listener,
        Err(err) => {
            warn!(port = ctx.binding_port, error = %err, "failed to open acceptor");
            return;
        }
    };
    info!(port = ctx.binding_port, "service advertised");

    loop {
        let accepted = tokio::select! {
            _ = ctx.signal.closed() => break,
            accepted = listener.accept() => accepted,
        };

        if !ctx.running.load(Ordering::SeqCst) {
            break;
        }

        match accepted {
            Ok((stream, peer)) => {
                if ctx.manager.is_canceled() {
                    break;
                }
                trace!(%peer, "connection accepted");
                let handler = ctx.handler.clone();
                let buffers = ctx.buffers.clone();
                let max_message_size = ctx.max_message_size;
                let receive_timeout = ctx.receive_timeout;
                let send_timeout = ctx.send_timeout;
                ctx.runtime.spawn(async move {
                    handle_connection::<S>(
                        stream,
                        peer,
                        handler,
                        buffers,
                        max_message_size,
                        receive_timeout,
                        send_timeout,
                    )
                    .await;
                });
            }
            Err(err) => {
                warn!(error = %err, "accept failed");
            }
        }
    }

    debug!(port = ctx.binding_port, "accept loop stopped");
}

async fn handle_connection<S: Service>(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<dyn Fn(SocketAddr, S::Request) -> S::Response + Send + Sync>,
    buffers: Arc<BufferPool>,
    max_message_size: usize,
    receive_timeout: Duration,
    send_timeout: Duration,
) {
    // Deadline closer for this connection only; independent of the acceptor.
    let signal = CloseSignal::new();

    let mut buf = buffers.try_get();
    let received = read_frame(
        &mut stream,
        &mut buf,
        max_message_size,
        &signal,
        receive_timeout,
    )
    .await;
    buffers.try_put(buf);

    let payload = match received {
        Ok(payload) => payload,
        Err(err) => {
            // Treated as if no request ever arrived.
            trace!(%peer, error = %err, "dropping connection");
            return;
        }
    };

    let request = match message::decode_message::<S::Request>(&payload) {
        Ok(request) => request,
        Err(_) => {
            trace!(%peer, "undecodable request, dropping connection");
            return;
        }
    };

    let response = handler(peer, request);
    let data = match message::encode_message(&response) {
        Ok(data) => data,
        Err(_) => {
            trace!(%peer, "response failed to encode");
            return;
        }
    };

    // Delivery is not guaranteed anyway; the send outcome is not surfaced.
    let _ = write_frame(&mut stream, &data, &signal, send_timeout).await;
}

/// Open the acceptor bound to `(v4, port)` with `reuse_address` so a
/// re-advertise can rebind promptly.
fn open_listener(port: u16) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    let local = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&local.into())?;
    socket.listen(ACCEPT_BACKLOG)?;
    TcpListener::from_std(socket.into())
}

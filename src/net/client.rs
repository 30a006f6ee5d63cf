//! One-shot request/response client
//!
//! One call is one connection: resolve, connect, write the framed request,
//! read the framed response, all against a single shrinking time budget.
//! Calls issued while one is in flight queue FIFO behind it.

use crate::buffer::BufferPool;
use crate::config::NetConfig;
use crate::error::Result;
use crate::frame::HEADER_SIZE;
use crate::message::{self, Service};
use crate::net::closeable::{timed, CloseSignal, CurrentOperation, TimeBudget};
use crate::net::manager::{FinishedNotifier, OperationManager, PendingQueue};
use crate::net::stream::{read_frame, write_frame};
use bytes::Bytes;
use std::io;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::runtime::Handle;
use tracing::trace;

const POOLED_BUFFERS: usize = 4;

enum CallTarget {
    Host(String, u16),
    Endpoints(Vec<SocketAddr>),
}

/// RPC client for a [`Service`].
///
/// Every call allocates a fresh socket; there is no pooling and no
/// multiplexing. `cancel` aborts the in-flight call (its handler observes
/// `Aborted`) and drops queued calls without invoking their handlers.
pub struct ServiceClient<S: Service> {
    runtime: Handle,
    max_message_size: usize,
    buffers: Arc<BufferPool>,
    manager: Arc<OperationManager<PendingQueue>>,
    current: Arc<CurrentOperation>,
    _service: PhantomData<fn() -> S>,
}

impl<S: Service> ServiceClient<S> {
    /// Create a client on the ambient tokio runtime.
    ///
    /// Panics outside a runtime context; use [`ServiceClient::with_handle`]
    /// there.
    pub fn new(config: NetConfig) -> Self {
        Self::with_handle(Handle::current(), config)
    }

    pub fn with_handle(runtime: Handle, config: NetConfig) -> Self {
        let current = Arc::new(CurrentOperation::new());
        let closer = current.clone();
        Self {
            runtime,
            max_message_size: config.max_message_size,
            buffers: Arc::new(BufferPool::new(
                POOLED_BUFFERS,
                config.max_message_size + HEADER_SIZE,
            )),
            manager: OperationManager::new(move || closer.close()),
            current,
            _service: PhantomData,
        }
    }

    /// Call the service at `host:port`, resolving the host first.
    pub fn async_call(
        &self,
        request: &S::Request,
        host: impl Into<String>,
        port: u16,
        timeout: Duration,
        handler: impl FnOnce(Result<S::Response>) + Send + 'static,
    ) {
        self.call(request, CallTarget::Host(host.into(), port), timeout, handler);
    }

    /// Call the service at pre-resolved endpoints, tried in order.
    pub fn async_call_endpoints(
        &self,
        request: &S::Request,
        endpoints: Vec<SocketAddr>,
        timeout: Duration,
        handler: impl FnOnce(Result<S::Response>) + Send + 'static,
    ) {
        self.call(request, CallTarget::Endpoints(endpoints), timeout, handler);
    }

    /// Abort the in-flight call and drop queued ones.
    pub fn cancel(&self) {
        self.manager.cancel_operation();
    }

    fn call(
        &self,
        request: &S::Request,
        target: CallTarget,
        timeout: Duration,
        handler: impl FnOnce(Result<S::Response>) + Send + 'static,
    ) {
        let payload = match message::encode_message(request) {
            Ok(payload) => payload,
            Err(err) => {
                // The operation never starts; the handler still runs
                // asynchronously, never on the caller's stack.
                self.runtime.spawn(async move { handler(Err(err)) });
                return;
            }
        };

        let runtime = self.runtime.clone();
        let manager = self.manager.clone();
        let current = self.current.clone();
        let buffers = self.buffers.clone();
        let max_message_size = self.max_message_size;

        self.manager.start_operation(move || {
            let signal = current.arm();
            let notifier = FinishedNotifier::new(manager);

            runtime.spawn(async move {
                let result =
                    run_call::<S>(&signal, payload, target, timeout, max_message_size, &buffers)
                        .await;
                if let Err(err) = &result {
                    trace!(error = %err, "service call failed");
                }
                notifier.notify();
                handler(result);
            });
        });
    }
}

async fn run_call<S: Service>(
    signal: &CloseSignal,
    payload: Bytes,
    target: CallTarget,
    timeout: Duration,
    max_message_size: usize,
    buffers: &BufferPool,
) -> Result<S::Response> {
    let mut budget = TimeBudget::new(timeout);

    let endpoints = match target {
        CallTarget::Host(host, port) => {
            timed(signal, budget.remaining(), async {
                let found = lookup_host((host.as_str(), port)).await?;
                Ok(found.collect::<Vec<_>>())
            })
            .await?
        }
        CallTarget::Endpoints(endpoints) => endpoints,
    };

    let mut stream = connect_any(signal, budget.advance(), &endpoints).await?;

    let write_budget = budget.advance();
    write_frame(&mut stream, &payload, signal, write_budget).await?;

    let read_budget = budget.advance();
    let mut buf = buffers.try_get();
    let read = read_frame(&mut stream, &mut buf, max_message_size, signal, read_budget).await;
    buffers.try_put(buf);

    message::decode_message::<S::Response>(&read?)
}

/// Connect to the first endpoint that accepts, in resolver order.
async fn connect_any(
    signal: &CloseSignal,
    timeout: Duration,
    endpoints: &[SocketAddr],
) -> Result<TcpStream> {
    timed(signal, timeout, async {
        let mut last_error = None;
        for endpoint in endpoints {
            match TcpStream::connect(endpoint).await {
                Ok(stream) => return Ok(stream),
                Err(err) => last_error = Some(err),
            }
        }
        Err(last_error
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no endpoints to try")))
    })
    .await
}

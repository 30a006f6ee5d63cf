//! Cancellable host resolution

use crate::error::Result;
use crate::net::closeable::{timed, CurrentOperation};
use crate::net::manager::{FinishedNotifier, OperationManager, PendingQueue};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::runtime::Handle;

/// Host/port resolution participating in the timeout and cancellation
/// discipline of the other primitives.
///
/// Lookups queue FIFO behind one another; `cancel` aborts the in-flight
/// lookup and drops any queued ones without invoking their handlers.
pub struct Resolver {
    runtime: Handle,
    manager: Arc<OperationManager<PendingQueue>>,
    current: Arc<CurrentOperation>,
}

impl Resolver {
    /// Create a resolver on the ambient tokio runtime.
    ///
    /// Panics outside a runtime context; use [`Resolver::with_handle`] there.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    pub fn with_handle(runtime: Handle) -> Self {
        let current = Arc::new(CurrentOperation::new());
        let closer = current.clone();
        Self {
            runtime,
            manager: OperationManager::new(move || closer.close()),
            current,
        }
    }

    /// Resolve `host:port` to the endpoints to try, in resolver order.
    pub fn async_resolve(
        &self,
        host: impl Into<String>,
        port: u16,
        timeout: Duration,
        handler: impl FnOnce(Result<Vec<SocketAddr>>) + Send + 'static,
    ) {
        let host = host.into();
        let runtime = self.runtime.clone();
        let manager = self.manager.clone();
        let current = self.current.clone();

        self.manager.start_operation(move || {
            let signal = current.arm();
            let notifier = FinishedNotifier::new(manager);

            runtime.spawn(async move {
                let result = timed(&signal, timeout, async {
                    let endpoints = lookup_host((host.as_str(), port)).await?;
                    Ok(endpoints.collect::<Vec<_>>())
                })
                .await;

                notifier.notify();
                handler(result);
            });
        });
    }

    /// Abort the in-flight lookup and drop queued ones.
    pub fn cancel(&self) {
        self.manager.cancel_operation();
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

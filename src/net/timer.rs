//! One-shot and periodic timeouts, cancellable

use crate::net::closeable::CurrentOperation;
use crate::net::manager::{FinishedNotifier, OperationManager, PendingReplacer};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{sleep_until, Instant};

/// Cancellable timer with one-shot and drift-free periodic modes.
///
/// Starting a timeout while one is active replaces it: the active wait is
/// aborted and the new one becomes pending (Replacer policy). `cancel`
/// aborts the active wait without running its handler.
pub struct Timer {
    runtime: Handle,
    manager: Arc<OperationManager<PendingReplacer>>,
    current: Arc<CurrentOperation>,
}

impl Timer {
    /// Create a timer on the ambient tokio runtime.
    ///
    /// Panics outside a runtime context; use [`Timer::with_handle`] there.
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

    /// Arm a one-shot timeout. The handler runs exactly once, on an
    /// executor thread, unless the timer is cancelled or replaced first.
    pub fn start_timeout(&self, duration: Duration, handler: impl FnOnce() + Send + 'static) {
        let runtime = self.runtime.clone();
        let manager = self.manager.clone();
        let current = self.current.clone();

        self.manager.start_operation(move || {
            let signal = current.arm();
            let notifier = FinishedNotifier::new(manager.clone());

            runtime.spawn(async move {
                let deadline = Instant::now() + duration;
                tokio::select! {
                    _ = signal.closed() => {
                        // Superseded or cancelled; the notifier's drop
                        // dispatches whatever replaced us.
                    }
                    _ = sleep_until(deadline) => {
                        if manager.is_canceled() {
                            return;
                        }
                        notifier.notify();
                        handler();
                    }
                }
            });
        });
    }

    /// Arm a strictly periodic timeout.
    ///
    /// Each next expiry is computed from the previous one (`previous +
    /// interval`), not from now, so scheduling jitter does not accumulate.
    /// The chain runs until cancelled or replaced.
    pub fn start_periodic_timeout(
        &self,
        interval: Duration,
        mut handler: impl FnMut() + Send + 'static,
    ) {
        let runtime = self.runtime.clone();
        let manager = self.manager.clone();
        let current = self.current.clone();

        self.manager.start_operation(move || {
            let signal = current.arm();
            let notifier = FinishedNotifier::new(manager.clone());

            runtime.spawn(async move {
                let mut deadline = Instant::now() + interval;
                loop {
                    tokio::select! {
                        _ = signal.closed() => break,
                        _ = sleep_until(deadline) => {
                            if manager.is_canceled() {
                                break;
                            }
                            handler();
                            deadline += interval;
                        }
                    }
                }
                drop(notifier);
            });
        });
    }

    /// Cancel the active timeout. Its handler is not invoked.
    pub fn cancel(&self) {
        self.manager.cancel_operation();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

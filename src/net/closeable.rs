//! Deadline-bounded operations on closeable I/O handles
//!
//! Any in-flight operation in framelink is tied to a [`CloseSignal`]:
//! closing the signal makes the operation complete promptly with
//! [`NetError::Aborted`], whether the close came from a timeout, an explicit
//! `cancel()` or a superseding operation. [`timed`] races the operation
//! against its deadline and the signal; exactly one branch wins and the
//! loser is dropped, so the timeout/completion race of the original pattern
//! collapses into a single poll site.

use crate::error::{NetError, Result};
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Cancellation handle for one in-flight operation.
///
/// Stands in for the `close()` / `is_open()` surface of a closeable I/O
/// object: the I/O future itself is dropped by whoever observes the close,
/// which releases the underlying socket or timer.
#[derive(Debug, Default)]
pub struct CloseSignal {
    closed: AtomicBool,
    notify: Notify,
}

impl CloseSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Close the handle. Idempotent; wakes every task parked in [`closed`].
    ///
    /// [`closed`]: CloseSignal::closed
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the handle has been closed.
    pub async fn closed(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent close()
            // cannot slip between the check and the park.
            notified.as_mut().enable();
            if self.closed.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

/// Run `op` with a deadline against a closeable handle.
///
/// - deadline first: the handle is closed and `Aborted` is reported;
/// - `op` first: a transport error maps to `FailedOperation` with the
///   underlying code attached, success stays success — unless the handle
///   was already closed at completion time, which reports `Aborted`;
/// - handle closed first (cancel or supersede): `Aborted`.
///
/// A zero deadline still enters the race and is expected to abort
/// immediately.
pub async fn timed<T, F>(signal: &CloseSignal, timeout: Duration, op: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    tokio::select! {
        result = op => {
            if !signal.is_open() {
                return Err(NetError::Aborted);
            }
            result.map_err(NetError::from)
        }
        _ = signal.closed() => Err(NetError::Aborted),
        _ = tokio::time::sleep(timeout) => {
            signal.close();
            Err(NetError::Aborted)
        }
    }
}

/// Remaining-time accounting across chained operation stages.
///
/// Each stage of a pipeline (resolve, connect, write, read) consumes part of
/// one overall timeout: [`advance`] subtracts the time spent since the last
/// mark and returns what is left. A stage entered with a zero budget times
/// out immediately.
///
/// [`advance`]: TimeBudget::advance
#[derive(Debug)]
pub struct TimeBudget {
    remaining: Duration,
    mark: Instant,
}

impl TimeBudget {
    pub fn new(total: Duration) -> Self {
        Self {
            remaining: total,
            mark: Instant::now(),
        }
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Charge the elapsed time to the budget and return the remainder.
    pub fn advance(&mut self) -> Duration {
        let now = Instant::now();
        self.remaining = self.remaining.saturating_sub(now - self.mark);
        self.mark = now;
        self.remaining
    }
}

/// Slot tracking the close signal of a component's in-flight operation.
///
/// Each dispatched operation arms a fresh signal; the manager's canceling
/// operation closes whichever signal is current. This mirrors allocating a
/// fresh socket per operation and closing the live one on cancel.
pub(crate) struct CurrentOperation {
    signal: Mutex<Arc<CloseSignal>>,
}

impl CurrentOperation {
    pub(crate) fn new() -> Self {
        Self {
            signal: Mutex::new(CloseSignal::new()),
        }
    }

    /// Install and return a fresh open signal for the next operation.
    pub(crate) fn arm(&self) -> Arc<CloseSignal> {
        let fresh = CloseSignal::new();
        *self.signal.lock().unwrap() = fresh.clone();
        fresh
    }

    /// Close the signal of the operation currently in flight, if any.
    pub(crate) fn close(&self) {
        self.signal.lock().unwrap().close();
    }
}

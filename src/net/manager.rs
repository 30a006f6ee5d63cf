//! Sequential execution of asynchronous operations
//!
//! Every framelink endpoint funnels its operations through an
//! [`OperationManager`]: the first operation starts directly, later ones are
//! held in a pending container until the in-flight one finishes. Finishing
//! dispatches the next pending operation immediately, so all resources and
//! state must be ready for the successor at that point.
//!
//! The pending container decides the policy. [`PendingQueue`] keeps every
//! operation in FIFO order (datagram sender, service client, resolver);
//! [`PendingReplacer`] holds only the most recent one and cancels the
//! in-flight operation when a new one arrives (datagram receiver, timer,
//! service server).
//!
//! Handlers park a [`FinishedNotifier`] in their closure: it calls
//! `finish_operation` exactly once, on `notify()` or at the latest when it
//! is dropped, so an early-exit error path can never stall the pipeline.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Type-erased pending operation record: a captured, zero-argument replay
/// of a previously-arrived request.
pub type Operation = Box<dyn FnOnce() + Send>;

/// Storage strategy for operations that arrive while one is in flight.
pub trait PendingPolicy: Default + Send {
    /// Whether a newly arriving operation cancels the in-flight one.
    const SHOULD_CANCEL: bool;

    fn push(&mut self, op: Operation);
    fn pop(&mut self) -> Option<Operation>;
    fn clear(&mut self);
}

/// FIFO pending container; arrivals queue behind the in-flight operation.
#[derive(Default)]
pub struct PendingQueue {
    operations: VecDeque<Operation>,
}

impl PendingPolicy for PendingQueue {
    const SHOULD_CANCEL: bool = false;

    fn push(&mut self, op: Operation) {
        self.operations.push_back(op);
    }

    fn pop(&mut self) -> Option<Operation> {
        self.operations.pop_front()
    }

    fn clear(&mut self) {
        self.operations.clear();
    }
}

/// Latest-wins pending container; holds at most one operation and asks the
/// manager to cancel the in-flight one on arrival.
#[derive(Default)]
pub struct PendingReplacer {
    operation: Option<Operation>,
}

impl PendingPolicy for PendingReplacer {
    const SHOULD_CANCEL: bool = true;

    fn push(&mut self, op: Operation) {
        self.operation = Some(op);
    }

    fn pop(&mut self) -> Option<Operation> {
        self.operation.take()
    }

    fn clear(&mut self) {
        self.operation = None;
    }
}

struct State<P> {
    running: bool,
    pending: P,
}

/// Per-endpoint serializer of asynchronous operations.
///
/// At most one operation is in flight per manager. The `canceling_operation`
/// passed at construction closes the endpoint's live I/O handle; it runs
/// when `cancel_operation` is called and, under the Replacer policy, when a
/// new operation supersedes the in-flight one. It must not call back into
/// the manager.
///
/// `cancel_operation` drains the pending container; handlers of drained
/// records are never invoked.
pub struct OperationManager<P: PendingPolicy> {
    state: Mutex<State<P>>,
    canceled: AtomicBool,
    canceling_operation: Box<dyn Fn() + Send + Sync>,
}

impl<P: PendingPolicy> OperationManager<P> {
    pub fn new(canceling_operation: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                running: false,
                pending: P::default(),
            }),
            canceled: AtomicBool::new(false),
            canceling_operation: Box::new(canceling_operation),
        })
    }

    /// Start `op` now if the manager is idle, otherwise store it pending.
    ///
    /// In the idle case `op` runs synchronously on the caller's thread; the
    /// lock is released first, so `op` may re-enter the manager (e.g. finish
    /// immediately).
    pub fn start_operation(&self, op: impl FnOnce() + Send + 'static) {
        {
            let mut state = self.state.lock().unwrap();
            if state.running {
                if P::SHOULD_CANCEL {
                    (self.canceling_operation)();
                }
                state.pending.push(Box::new(op));
                return;
            }
            state.running = true;
        }

        op();
    }

    /// Mark the in-flight operation finished and dispatch the next pending
    /// one, if any. Clears the canceled latch.
    pub fn finish_operation(&self) {
        let next = {
            let mut state = self.state.lock().unwrap();
            self.canceled.store(false, Ordering::Release);
            match state.pending.pop() {
                Some(op) => Some(op),
                None => {
                    state.running = false;
                    None
                }
            }
        };

        if let Some(op) = next {
            op();
        }
    }

    /// Latch the canceled flag, close the live I/O handle and drain the
    /// pending container. The in-flight completion still flows through the
    /// finish path, which clears the latch.
    pub fn cancel_operation(&self) {
        {
            let mut state = self.state.lock().unwrap();
            self.canceled.store(true, Ordering::Release);
            (self.canceling_operation)();
            state.pending.clear();
        }
        trace!("operation manager canceled, pending operations dropped");
    }

    /// Observed by in-flight completions to decide whether to swallow their
    /// result.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

/// Scoped guarantee that `finish_operation` runs exactly once.
///
/// Captured inside a handler's closure: `notify()` finishes eagerly, and if
/// the closure exits without notifying (early-exit error, swallowed
/// cancellation) the drop impl finishes instead. Never both.
pub struct FinishedNotifier<P: PendingPolicy> {
    manager: Arc<OperationManager<P>>,
    enabled: AtomicBool,
}

impl<P: PendingPolicy> FinishedNotifier<P> {
    pub fn new(manager: Arc<OperationManager<P>>) -> Self {
        Self {
            manager,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn notify(&self) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            self.manager.finish_operation();
        }
    }
}

impl<P: PendingPolicy> Drop for FinishedNotifier<P> {
    fn drop(&mut self) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            self.manager.finish_operation();
        }
    }
}

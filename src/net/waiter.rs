//! Rendezvous between blocking callers and handler completions
//!
//! A [`Waiter`] owns the mutex/condvar pair; any number of [`Waitable`]s
//! bind to it. Wrapping a handler in a waitable yields a handler that runs
//! the user callback and then flips the waitable ready, waking the waiter.
//!
//! `wait` must be safe to call from a thread that is itself running the
//! executor. On a multi-thread tokio runtime the blocking section is moved
//! out of the cooperative scheduler with `block_in_place`, so handler
//! completions keep flowing while the caller blocks; external threads block
//! on the condvar directly. [`Waiter::stop`] breaks every wait regardless of
//! the predicate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use tokio::runtime::{Handle, RuntimeFlavor};

struct WaiterInner {
    lock: Mutex<()>,
    cond: Condvar,
    stopped: AtomicBool,
}

/// Owner of the rendezvous point.
#[derive(Clone)]
pub struct Waiter {
    inner: Arc<WaiterInner>,
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Waiter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(WaiterInner {
                lock: Mutex::new(()),
                cond: Condvar::new(),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Create a waitable bound to this waiter, initially not ready.
    pub fn waitable(&self) -> Waitable {
        Waitable {
            inner: self.inner.clone(),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Break every current and future wait on this waiter.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        let _guard = self.inner.lock.lock().unwrap();
        self.inner.cond.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Block until `waitable` is ready or the waiter is stopped.
    pub fn wait(&self, waitable: &Waitable) {
        let ready = waitable.ready.clone();
        self.wait_until(&WaitCondition::new(move || ready.load(Ordering::Acquire)));
    }

    /// Block until `condition` holds or the waiter is stopped.
    pub fn wait_until(&self, condition: &WaitCondition) {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                // Hand the worker slot back to the scheduler for the
                // duration of the blocking section.
                tokio::task::block_in_place(|| self.block_on_condition(condition))
            }
            _ => self.block_on_condition(condition),
        }
    }

    fn block_on_condition(&self, condition: &WaitCondition) {
        let inner = &self.inner;
        let mut guard = inner.lock.lock().unwrap();
        while !(condition.predicate)() && !inner.stopped.load(Ordering::Acquire) {
            guard = inner.cond.wait(guard).unwrap();
        }
        drop(guard);
    }
}

/// One ready flag bound to a [`Waiter`]; flips false→true once per use.
#[derive(Clone)]
pub struct Waitable {
    inner: Arc<WaiterInner>,
    ready: Arc<AtomicBool>,
}

impl Waitable {
    /// Wrap a one-argument handler so that completion also signals this
    /// waitable.
    pub fn wrap<A, F>(&self, handler: F) -> impl FnOnce(A) + Send + 'static
    where
        F: FnOnce(A) + Send + 'static,
        A: Send + 'static,
    {
        let signal = self.clone();
        move |arg| {
            handler(arg);
            signal.set_ready();
        }
    }

    /// Wrap a zero-argument handler (timer callbacks).
    pub fn wrap_nullary<F>(&self, handler: F) -> impl FnOnce() + Send + 'static
    where
        F: FnOnce() + Send + 'static,
    {
        let signal = self.clone();
        move || {
            handler();
            signal.set_ready();
        }
    }

    /// Flip ready and wake the waiter.
    pub fn set_ready(&self) {
        {
            let _guard = self.inner.lock.lock().unwrap();
            self.ready.store(true, Ordering::Release);
        }
        self.inner.cond.notify_all();
    }

    /// Reset to not-ready for reuse.
    pub fn set_waiting(&self) {
        let _guard = self.inner.lock.lock().unwrap();
        self.ready.store(false, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Condition that holds when both waitables are ready.
    pub fn and(&self, other: &Waitable) -> WaitCondition {
        let (a, b) = (self.ready.clone(), other.ready.clone());
        WaitCondition::new(move || a.load(Ordering::Acquire) && b.load(Ordering::Acquire))
    }

    /// Condition that holds when either waitable is ready.
    pub fn or(&self, other: &Waitable) -> WaitCondition {
        let (a, b) = (self.ready.clone(), other.ready.clone());
        WaitCondition::new(move || a.load(Ordering::Acquire) || b.load(Ordering::Acquire))
    }
}

/// Boolean composition of waitables, evaluated under the waiter's lock.
pub struct WaitCondition {
    predicate: Box<dyn Fn() -> bool + Send + Sync>,
}

impl WaitCondition {
    fn new(predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }

    pub fn and(self, other: &Waitable) -> WaitCondition {
        let ready = other.ready.clone();
        let lhs = self.predicate;
        WaitCondition::new(move || lhs() && ready.load(Ordering::Acquire))
    }

    pub fn or(self, other: &Waitable) -> WaitCondition {
        let ready = other.ready.clone();
        let lhs = self.predicate;
        WaitCondition::new(move || lhs() || ready.load(Ordering::Acquire))
    }
}

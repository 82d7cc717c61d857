//! Broadcast-once signal
//!
//! A `Signal` settles exactly once and hands a clone of its value to every
//! waiter. Waiters can be callbacks or futures; both go through the same
//! waiter list, so there is one code path for fulfillment.
//!
//! # Design Principles
//!
//! - **Single Fulfillment**: a second `settle` is rejected and the value is handed back
//! - **Ordered Fan-out**: callbacks run in attachment order, each exactly once
//! - **Late Waiters**: attaching after settlement runs the callback immediately
//! - **Reentrancy**: no borrow is held while waiters run, so a waiter may attach
//!   to or settle other signals, or this one
//!
//! # Example
//!
//! ```ignore
//! let signal = Signal::new();
//! signal.on_settle(|v: u32| log::info!("first: {v}"));
//! let later = signal.listen();
//!
//! signal.settle(7).ok();
//! assert_eq!(block_on(later), Ok(7));
//! ```

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use thiserror::Error;

type Waiter<T> = Box<dyn FnOnce(T)>;

enum State<T> {
    Pending(Vec<Waiter<T>>),
    Settled(T),
}

/// Single-fulfillment broadcast value shared by clones of the same signal.
pub struct Signal<T: Clone + 'static> {
    state: Rc<RefCell<State<T>>>,
}

impl<T: Clone + 'static> Signal<T> {
    /// Create a pending signal
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Pending(Vec::new()))),
        }
    }

    /// Create a signal that is already settled with `value`
    #[must_use]
    pub fn settled(value: T) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Settled(value))),
        }
    }

    /// Check if the signal has a value
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(*self.state.borrow(), State::Settled(_))
    }

    /// Get a clone of the settled value, if any
    #[must_use]
    pub fn value(&self) -> Option<T> {
        match &*self.state.borrow() {
            State::Settled(value) => Some(value.clone()),
            State::Pending(_) => None,
        }
    }

    /// Number of waiters still queued
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        match &*self.state.borrow() {
            State::Pending(waiters) => waiters.len(),
            State::Settled(_) => 0,
        }
    }

    /// Run `waiter` once the signal settles, or right now if it already has.
    pub fn on_settle(&self, waiter: impl FnOnce(T) + 'static) {
        let value = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                State::Pending(waiters) => {
                    waiters.push(Box::new(waiter));
                    return;
                }
                State::Settled(value) => value.clone(),
            }
        };
        waiter(value);
    }

    /// Get a future that yields the settled value.
    ///
    /// Resolves to `Err(Dropped)` if every clone of the signal is dropped
    /// while still pending.
    #[must_use]
    pub fn listen(&self) -> Listen<T> {
        let (tx, rx) = oneshot::channel();
        self.on_settle(move |value| {
            // The listener may have been dropped already
            let _ = tx.send(value);
        });
        Listen { rx }
    }

    /// Settle the signal and run every queued waiter in attachment order.
    ///
    /// # Errors
    ///
    /// Returns the value back if the signal was already settled.
    pub fn settle(&self, value: T) -> Result<(), T> {
        let waiters = {
            let mut state = self.state.borrow_mut();
            if matches!(*state, State::Settled(_)) {
                return Err(value);
            }
            match std::mem::replace(&mut *state, State::Settled(value.clone())) {
                State::Pending(waiters) => waiters,
                State::Settled(_) => Vec::new(),
            }
        };

        for waiter in waiters {
            waiter(value.clone());
        }
        Ok(())
    }

    /// Check if two signals share the same state
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl<T: Clone + 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: Clone + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.borrow() {
            State::Pending(waiters) => f
                .debug_struct("Signal")
                .field("waiters", &waiters.len())
                .finish(),
            State::Settled(value) => f.debug_struct("Signal").field("value", value).finish(),
        }
    }
}

/// The signal was dropped before it settled
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("signal dropped before it settled")]
pub struct Dropped;

/// Future returned by [`Signal::listen`]
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Listen<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Listen<T> {
    type Output = Result<T, Dropped>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|r| r.map_err(|_| Dropped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_waiters_fire_in_order() {
        let signal = Signal::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let log = Rc::clone(&log);
            signal.on_settle(move |v: u32| log.borrow_mut().push((tag, v)));
        }
        assert_eq!(signal.waiter_count(), 3);
        assert!(log.borrow().is_empty());

        signal.settle(5).unwrap();
        assert_eq!(*log.borrow(), vec![("a", 5), ("b", 5), ("c", 5)]);
    }

    #[test]
    fn test_late_waiter_runs_immediately() {
        let signal = Signal::settled(9_u32);
        let seen = Rc::new(RefCell::new(None));
        let seen_clone = Rc::clone(&seen);

        signal.on_settle(move |v| *seen_clone.borrow_mut() = Some(v));
        assert_eq!(*seen.borrow(), Some(9));
    }

    #[test]
    fn test_settle_twice_rejected() {
        let signal = Signal::new();
        assert!(signal.settle(1_u32).is_ok());
        assert_eq!(signal.settle(2), Err(2));
        assert_eq!(signal.value(), Some(1));
    }

    #[test]
    fn test_listen_before_and_after() {
        let signal = Signal::new();
        let early = signal.listen();
        signal.settle("ready".to_string()).unwrap();
        let late = signal.listen();

        assert_eq!(block_on(early), Ok("ready".to_string()));
        assert_eq!(block_on(late), Ok("ready".to_string()));
    }

    #[test]
    fn test_listen_dropped_signal() {
        let signal: Signal<u32> = Signal::new();
        let listen = signal.listen();
        drop(signal);
        assert_eq!(block_on(listen), Err(Dropped));
    }

    #[test]
    fn test_waiter_may_attach_during_settle() {
        let signal = Signal::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner_signal = signal.clone();
        let inner_log = Rc::clone(&log);
        signal.on_settle(move |v: u32| {
            inner_log.borrow_mut().push(v);
            let nested_log = Rc::clone(&inner_log);
            inner_signal.on_settle(move |v| nested_log.borrow_mut().push(v + 100));
        });

        signal.settle(1).unwrap();
        assert_eq!(*log.borrow(), vec![1, 101]);
    }
}

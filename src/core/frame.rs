//! Frame-deferred signals
//!
//! Work scheduled during frame N becomes due at the start of frame N+1.
//! The stage uses this to delay "ready" signals by exactly one tick, so that
//! structural setup done in the same frame (physics bodies, materials) is
//! complete before anyone reacts to an instance.
//!
//! # Example
//!
//! ```ignore
//! let mut queue = FrameQueue::new();
//!
//! // Frame N: schedule
//! queue.push(ReadySignal { handle, entity });
//!
//! // Frame N+1: swap, then fire
//! queue.swap();
//! for signal in queue.drain() {
//!     fire(signal);
//! }
//! ```

use std::collections::VecDeque;

use hecs::Entity;

use crate::assets::Handle;

/// "This handle is ready" notice scheduled by the instantiation routine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadySignal {
    /// Handle being signalled
    pub handle: Handle,
    /// Instance root the handle resolves to
    pub entity: Entity,
}

/// Double-buffered queue of items deferred to the next frame.
///
/// Items pushed during frame N are available after the `swap()` that starts
/// frame N+1. Items pushed while draining land in the next frame again.
#[derive(Debug)]
pub struct FrameQueue<T> {
    /// Items scheduled this frame
    pending: VecDeque<T>,
    /// Items due now
    due: VecDeque<T>,
}

impl<T> FrameQueue<T> {
    /// Default initial capacity for both buffers.
    const DEFAULT_CAPACITY: usize = 32;

    /// Create a new queue with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a new queue with the given initial capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(capacity),
            due: VecDeque::with_capacity(capacity),
        }
    }

    /// Schedule an item for the next frame.
    #[inline]
    pub fn push(&mut self, item: T) {
        self.pending.push_back(item);
    }

    /// Start a new frame: everything scheduled so far becomes due.
    ///
    /// Items that were due but not drained are kept in front of the new ones.
    pub fn swap(&mut self) {
        if self.due.is_empty() {
            std::mem::swap(&mut self.pending, &mut self.due);
        } else {
            self.due.append(&mut self.pending);
        }
    }

    /// Take all due items, in scheduling order.
    #[inline]
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.due.drain(..)
    }

    /// Number of items due now.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.due.len()
    }

    /// Check if nothing is due now.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.due.is_empty()
    }

    /// Number of items scheduled for the next frame.
    #[must_use]
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop everything, scheduled and due.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.due.clear();
    }
}

impl<T> Default for FrameQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_not_due_until_swap() {
        let mut queue = FrameQueue::new();

        queue.push(1);
        assert!(queue.is_empty(), "items should not be due before swap");
        assert_eq!(queue.pending_count(), 1);

        queue.swap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_push_during_frame_waits_one_more() {
        let mut queue = FrameQueue::new();

        queue.push("a");
        queue.swap();
        queue.push("b");

        assert_eq!(queue.drain().collect::<Vec<_>>(), vec!["a"]);

        queue.swap();
        assert_eq!(queue.drain().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_undrained_items_keep_order() {
        let mut queue = FrameQueue::new();

        queue.push(1);
        queue.swap();
        queue.push(2);
        queue.swap();

        assert_eq!(queue.drain().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_clear() {
        let mut queue = FrameQueue::new();

        queue.push(1);
        queue.swap();
        queue.push(2);
        queue.clear();

        assert!(queue.is_empty());
        assert_eq!(queue.pending_count(), 0);
    }
}

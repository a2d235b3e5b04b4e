#![forbid(unsafe_code)]

//! The double-buffered input queue.
//!
//! Event callbacks push into the "current" half at any time between frames;
//! once per frame the driver calls [`InputQueue::swap_buffers`], which
//! freezes the collected batch and starts the other half collecting. The
//! swap is a single indivisible step relative to the callbacks (the runtime
//! is cooperative, so nothing can interleave mid-swap): every event lands in
//! exactly one frozen batch, in push order.
//!
//! A full queue drops new events silently — event callbacks must never
//! block, and recency is preferred over completeness. Drops are counted for
//! diagnostics.

use crate::input::{ButtonMask, InputEvent, Modifiers, MouseButton, ScrollDirection};

/// Default capacity of each buffer half.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct InputQueue {
    current: Vec<InputEvent>,
    next: Vec<InputEvent>,
    capacity: usize,
    dropped: u64,
}

impl InputQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            current: Vec::with_capacity(capacity),
            next: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append an event to the collecting half.
    ///
    /// Returns `false` when the queue is at capacity and the event was
    /// dropped.
    pub fn push(&mut self, event: InputEvent) -> bool {
        if self.current.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.current.push(event);
        true
    }

    pub fn push_key_press(&mut self, code: u8, mods: Modifiers) -> bool {
        self.push(InputEvent::KeyPress { code, mods })
    }

    pub fn push_mouse_move(&mut self, x: u8, y: u8, buttons: ButtonMask) -> bool {
        self.push(InputEvent::MouseMove { x, y, buttons })
    }

    pub fn push_mouse_press(&mut self, x: u8, y: u8, button: MouseButton) -> bool {
        self.push(InputEvent::MousePress { x, y, button })
    }

    pub fn push_mouse_release(&mut self, x: u8, y: u8, button: MouseButton) -> bool {
        self.push(InputEvent::MouseRelease { x, y, button })
    }

    pub fn push_mouse_scroll(&mut self, direction: ScrollDirection, x: u8, y: u8) -> bool {
        self.push(InputEvent::MouseScroll { direction, x, y })
    }

    /// Freeze the collected batch and start the other half collecting.
    ///
    /// Clears the stale half, exchanges the two buffer identities, and
    /// returns the batch that was collecting until now. The returned slice
    /// stays valid (and unmutated) until the next swap; subsequent events go
    /// to the new collecting half.
    pub fn swap_buffers(&mut self) -> &[InputEvent] {
        self.next.clear();
        std::mem::swap(&mut self.current, &mut self.next);
        &self.next
    }

    /// Events collected since the last swap.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.current.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events dropped on overflow since construction.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

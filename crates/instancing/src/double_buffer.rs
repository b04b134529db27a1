//! Two alternating slots: writers fill "current", the drain empties "prior".
//!
//! Writing goes through a [`WriteHandle`] that mutably borrows the buffer,
//! so a swap or drain cannot happen while a write is in flight, and only
//! one writer and one drainer can exist at a time.

use std::ops::{Deref, DerefMut};

#[derive(Debug, Default)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    current: usize,
    swaps: u64,
}

impl<T: Default> DoubleBuffer<T> {
    pub fn new() -> Self {
        Self {
            slots: [T::default(), T::default()],
            current: 0,
            swaps: 0,
        }
    }

    /// Take the prior slot's contents, leaving it empty for the next cycle.
    pub fn drain(&mut self) -> T {
        std::mem::take(&mut self.slots[self.current ^ 1])
    }

    /// Empty both slots without swapping.
    pub fn reset(&mut self) {
        self.slots = [T::default(), T::default()];
    }
}

impl<T> DoubleBuffer<T> {
    pub fn write(&mut self) -> WriteHandle<'_, T> {
        WriteHandle {
            slot: &mut self.slots[self.current],
        }
    }

    pub fn current(&self) -> &T {
        &self.slots[self.current]
    }

    pub fn prior(&self) -> &T {
        &self.slots[self.current ^ 1]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn prior_index(&self) -> usize {
        self.current ^ 1
    }

    /// Flip current and prior.
    pub fn swap(&mut self) {
        self.current ^= 1;
        self.swaps += 1;
    }

    pub fn swap_count(&self) -> u64 {
        self.swaps
    }
}

/// Exclusive access to the current write slot.
pub struct WriteHandle<'a, T> {
    slot: &'a mut T,
}

impl<T> Deref for WriteHandle<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.slot
    }
}

impl<T> DerefMut for WriteHandle<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.slot
    }
}

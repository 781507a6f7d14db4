//! Ping-pong pairs.
//!
//! Every resource that is read and rewritten in the same frame (agent state,
//! trail texture, sensing texture) lives in a [`DoubleBuffer`]. The two halves
//! are separate fields, so `current()` and `other()` can never hand out the
//! same object; the only mutable state is which half is "current".

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide unique id of a GPU resource, used for aliasing checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ResourceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Anything that can report its [`ResourceId`].
pub trait Identified {
    fn id(&self) -> ResourceId;
}

/// Which half of a pair currently plays the "read" role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Slot {
    #[default]
    A,
    B,
}

impl Slot {
    pub fn flipped(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// Two owned halves and the current read slot.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    a: T,
    b: T,
    current: Slot,
    swaps: u64,
}

impl<T> DoubleBuffer<T> {
    /// Build a pair from two halves. `a` starts as current.
    pub fn new(a: T, b: T) -> Self {
        Self {
            a,
            b,
            current: Slot::A,
            swaps: 0,
        }
    }

    /// Build a pair by calling `make` once per half.
    pub fn from_fn(mut make: impl FnMut(Slot) -> T) -> Self {
        let a = make(Slot::A);
        let b = make(Slot::B);
        Self::new(a, b)
    }

    /// The half holding the latest data.
    pub fn current(&self) -> &T {
        self.get(self.current)
    }

    /// The half to write this step.
    pub fn other(&self) -> &T {
        self.get(self.current.flipped())
    }

    pub fn get(&self, slot: Slot) -> &T {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }

    /// Both halves, current first.
    pub fn both(&self) -> (&T, &T) {
        (self.current(), self.other())
    }

    /// Mutable access to both halves, current first.
    pub fn both_mut(&mut self) -> (&mut T, &mut T) {
        match self.current {
            Slot::A => (&mut self.a, &mut self.b),
            Slot::B => (&mut self.b, &mut self.a),
        }
    }

    /// Exchange the roles of the two halves.
    pub fn swap(&mut self) {
        self.current = self.current.flipped();
        self.swaps += 1;
    }

    pub fn slot(&self) -> Slot {
        self.current
    }

    /// Restore a previously saved role. Used to roll back a dropped frame.
    pub fn set_slot(&mut self, slot: Slot) {
        self.current = slot;
    }

    /// Total number of swaps since creation.
    pub fn swap_count(&self) -> u64 {
        self.swaps
    }
}

impl<T: Identified> DoubleBuffer<T> {
    pub fn current_id(&self) -> ResourceId {
        self.current().id()
    }

    pub fn other_id(&self) -> ResourceId {
        self.other().id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake(ResourceId);

    impl Identified for Fake {
        fn id(&self) -> ResourceId {
            self.0
        }
    }

    #[test]
    fn ids_are_unique() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn current_and_other_never_alias() {
        let mut pair = DoubleBuffer::from_fn(|_| Fake(ResourceId::next()));
        for _ in 0..4 {
            assert_ne!(pair.current_id(), pair.other_id());
            pair.swap();
        }
    }

    #[test]
    fn swap_exchanges_roles() {
        let mut pair = DoubleBuffer::new("a", "b");
        assert_eq!(*pair.current(), "a");
        assert_eq!(*pair.other(), "b");

        pair.swap();
        assert_eq!(*pair.current(), "b");
        assert_eq!(*pair.other(), "a");
        assert_eq!(pair.slot(), Slot::B);
        assert_eq!(pair.swap_count(), 1);
    }

    #[test]
    fn set_slot_rolls_back_roles() {
        let mut pair = DoubleBuffer::new(1, 2);
        let saved = pair.slot();
        pair.swap();
        pair.swap();
        pair.swap();
        pair.set_slot(saved);
        assert_eq!(*pair.current(), 1);
    }

    #[test]
    fn both_mut_follows_current() {
        let mut pair = DoubleBuffer::new(1, 2);
        pair.swap();
        let (current, other) = pair.both_mut();
        *current += 10;
        *other += 100;
        assert_eq!(*pair.get(Slot::B), 12);
        assert_eq!(*pair.get(Slot::A), 101);
    }
}

//! State lists
//!
//! Singly linked FIFO lists threaded through the PCB arena. A PCB sits on
//! exactly one list at a time; its `link` field belongs to that list.
//!
//! Appends are O(1) through the tail index. Removal of an arbitrary node
//! walks from the head.

use core::fmt;

use super::pcb::{Pcb, SlotIndex};

/// List operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListError {
    /// The slot is not on this list.
    NotOnList(SlotIndex),
}

impl fmt::Display for ListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListError::NotOnList(idx) => write!(f, "slot {} is not on the list", idx),
        }
    }
}

/// FIFO list of arena slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateList {
    head: Option<SlotIndex>,
    tail: Option<SlotIndex>,
    len: usize,
}

impl StateList {
    /// Create an empty list.
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Number of slots on the list.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// First slot, if any.
    pub fn front(&self) -> Option<SlotIndex> {
        self.head
    }

    /// Last slot, if any.
    pub fn back(&self) -> Option<SlotIndex> {
        self.tail
    }

    /// Append `idx` at the tail.
    ///
    /// The caller guarantees `idx` is on no other list.
    pub fn push_back(&mut self, arena: &mut [Pcb], idx: SlotIndex) {
        arena[idx].link = None;
        match self.tail {
            Some(tail) => arena[tail].link = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
    }

    /// Detach and return the head.
    pub fn pop_front(&mut self, arena: &mut [Pcb]) -> Option<SlotIndex> {
        let head = self.head?;
        self.head = arena[head].link.take();
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(head)
    }

    /// Unlink `idx` from anywhere in the list.
    pub fn remove(&mut self, arena: &mut [Pcb], idx: SlotIndex) -> Result<(), ListError> {
        let mut prev: Option<SlotIndex> = None;
        let mut cur = self.head;
        // Bounded by the arena so a corrupted cycle cannot spin forever.
        for _ in 0..arena.len() {
            let Some(node) = cur else { break };
            if node == idx {
                let next = arena[node].link.take();
                match prev {
                    Some(p) => arena[p].link = next,
                    None => self.head = next,
                }
                if self.tail == Some(idx) {
                    self.tail = prev;
                }
                self.len -= 1;
                return Ok(());
            }
            prev = Some(node);
            cur = arena[node].link;
        }
        Err(ListError::NotOnList(idx))
    }

    /// Whether `idx` is on the list.
    pub fn contains(&self, arena: &[Pcb], idx: SlotIndex) -> bool {
        self.iter(arena).any(|node| node == idx)
    }

    /// Walk the list from head to tail.
    ///
    /// The walk stops after `arena.len()` steps even if the links form a
    /// cycle.
    pub fn iter<'a>(&self, arena: &'a [Pcb]) -> Iter<'a> {
        Iter {
            arena,
            cur: self.head,
            remaining: arena.len(),
        }
    }
}

/// Iterator over the slots of a [`StateList`].
pub struct Iter<'a> {
    arena: &'a [Pcb],
    cur: Option<SlotIndex>,
    remaining: usize,
}

impl Iterator for Iter<'_> {
    type Item = SlotIndex;

    fn next(&mut self) -> Option<SlotIndex> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.cur?;
        self.remaining -= 1;
        self.cur = self.arena.get(node).and_then(|pcb| pcb.link);
        Some(node)
    }
}

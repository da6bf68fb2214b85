//! Explicit id allocation
//!
//! The engine never invents ids. Whatever layer builds configuration
//! documents owns an [`IdAllocator`] and hands out ids from it.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::{NodeId, ProtocolId};

/// Monotonic allocator for node and protocol ids
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU32,
}

impl IdAllocator {
    /// Allocator whose first id is `first`
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Allocator that continues after every id already in use
    pub fn after<I: IntoIterator<Item = u32>>(used: I) -> Self {
        let first = used.into_iter().max().map_or(1, |max| max.saturating_add(1));
        Self::starting_at(first)
    }

    fn next_raw(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_node_id(&self) -> NodeId {
        NodeId(self.next_raw())
    }

    pub fn next_protocol_id(&self) -> ProtocolId {
        ProtocolId(self.next_raw())
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_across_kinds() {
        let ids = IdAllocator::default();
        let node = ids.next_node_id();
        let a = ids.next_protocol_id();
        let b = ids.next_protocol_id();
        assert_eq!(node, NodeId(1));
        assert_eq!(a, ProtocolId(2));
        assert_eq!(b, ProtocolId(3));
    }

    #[test]
    fn test_after_existing_ids() {
        let ids = IdAllocator::after([4, 9, 2]);
        assert_eq!(ids.next_protocol_id(), ProtocolId(10));
        assert_eq!(IdAllocator::after([]).next_node_id(), NodeId(1));
    }
}

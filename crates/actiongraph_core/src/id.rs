// SPDX-License-Identifier: MIT OR Apache-2.0
//! Identifiers for objects and parameters.

use std::fmt;

/// Identifier of an action or action graph within a [`Document`](crate::Document)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

/// Identifier of a parameter within a [`Document`](crate::Document)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(u64);

impl ObjectId {
    /// Raw id value
    pub fn value(self) -> u64 {
        self.0
    }
}

impl ParamId {
    /// Raw id value
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "param#{}", self.0)
    }
}

/// Monotonic id allocator owned by a document.
///
/// Ids are never reused, so creation order can be recovered by comparing ids.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Create a new allocator
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate an object id
    pub fn object(&mut self) -> ObjectId {
        ObjectId(self.bump())
    }

    /// Allocate a parameter id
    pub fn param(&mut self) -> ParamId {
        ParamId(self.bump())
    }

    fn bump(&mut self) -> u64 {
        let id = self.next.max(1);
        self.next = id + 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut ids = IdAllocator::new();
        let a = ids.object();
        let p = ids.param();
        let b = ids.object();
        assert!(a.value() < p.value());
        assert!(p.value() < b.value());
    }

    #[test]
    fn test_independent_allocators() {
        let mut first = IdAllocator::new();
        let mut second = IdAllocator::new();
        assert_eq!(first.object().value(), second.object().value());
    }
}

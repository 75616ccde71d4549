//! Identifiers and simple allocators for host entities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bound target identity: a scene object/component or a procedural rig instance.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TargetId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TrackId(pub u32);

/// Key handle, unique within one channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct KeyHandle(pub u32);

/// Weak handle to a host-owned section.
///
/// The slot `index` may be reused once the section is removed; `generation`
/// changes every time that happens so stale handles never resolve.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SectionId {
    pub index: u32,
    pub generation: u32,
}

impl SectionId {
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "section#{}v{}", self.index, self.generation)
    }
}

/// Monotonic allocator for TargetId and TrackId.
#[derive(Default, Debug, Clone)]
pub struct IdAllocator {
    next_target: u32,
    next_track: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_target(&mut self) -> TargetId {
        let id = TargetId(self.next_target);
        self.next_target = self.next_target.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_track(&mut self) -> TrackId {
        let id = TrackId(self.next_track);
        self.next_track = self.next_track.wrapping_add(1);
        id
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_target(), TargetId(0));
        assert_eq!(alloc.alloc_target(), TargetId(1));
        assert_eq!(alloc.alloc_track(), TrackId(0));
        assert_eq!(alloc.alloc_track(), TrackId(1));
        alloc.reset();
        assert_eq!(alloc.alloc_track(), TrackId(0));
    }

    #[test]
    fn section_ids_differ_by_generation() {
        let a = SectionId::new(3, 0);
        let b = SectionId::new(3, 1);
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "section#3v0");
    }
}

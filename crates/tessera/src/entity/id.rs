//! # Identities — Generational Handles for Mains and Subs
//!
//! Every Main and Sub gets an [`EntityId`] when it is initialized. The id is
//! bound once and never changes, so it is safe to hold onto after the entity
//! is gone: lookups with a stale id simply miss.
//!
//! ## Design: Generational Indices
//!
//! Slots are recycled, so a plain counter would let a stale handle alias a
//! newer entity. Each slot carries a generation that is bumped on release:
//!
//! ```text
//! EntityId { index: 5, generation: 0 }  ← original
//! EntityId { index: 5, generation: 1 }  ← after recycle
//! ```
//!
//! Mains and Subs share one allocator, and the typed wrappers [`MainId`] /
//! [`SubId`] keep the two from being mixed up at compile time.

use std::fmt;

/// A generational handle shared by Mains and Subs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl EntityId {
    /// Returns the raw slot index. Useful for diagnostics.
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Identity of a Main entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MainId(pub(crate) EntityId);

/// Identity of a Sub entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubId(pub(crate) EntityId);

impl MainId {
    pub fn entity(self) -> EntityId {
        self.0
    }
}

impl SubId {
    pub fn entity(self) -> EntityId {
        self.0
    }
}

impl fmt::Debug for MainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Main({})", self.0)
    }
}

impl fmt::Display for MainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "main {}", self.0)
    }
}

impl fmt::Debug for SubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

impl fmt::Display for SubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub {}", self.0)
    }
}

/// Hands out ids and recycles released slots.
///
/// ```text
/// generations: [0, 1, 0, 2, 0]   ← one generation per slot ever allocated
/// free_list:   [1, 3]             ← slots available for reuse
/// ```
#[derive(Default)]
pub(crate) struct EntityAllocator {
    generations: Vec<u32>,
    free_list: Vec<u32>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> EntityId {
        if let Some(index) = self.free_list.pop() {
            // Generation was already bumped on release.
            let generation = self.generations[index as usize];
            EntityId { index, generation }
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            EntityId {
                index,
                generation: 0,
            }
        }
    }

    /// Release `id`. Returns `false` if it was already stale.
    pub fn release(&mut self, id: EntityId) -> bool {
        let idx = id.index as usize;
        if idx < self.generations.len() && self.generations[idx] == id.generation {
            self.generations[idx] += 1;
            self.free_list.push(id.index);
            true
        } else {
            false
        }
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        let idx = id.index as usize;
        idx < self.generations.len() && self.generations[idx] == id.generation
    }

    pub fn alive_count(&self) -> usize {
        self.generations.len() - self.free_list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_sequential() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_eq!((a.index, b.index), (0, 1));
        assert_eq!((a.generation, b.generation), (0, 0));
    }

    #[test]
    fn recycle_bumps_generation() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        assert!(alloc.release(a));
        let reused = alloc.allocate();
        assert_eq!(reused.index, a.index);
        assert_eq!(reused.generation, 1);
        assert!(!alloc.is_alive(a));
        assert!(alloc.is_alive(reused));
    }

    #[test]
    fn double_release_returns_false() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        assert!(alloc.release(a));
        assert!(!alloc.release(a));
        assert_eq!(alloc.alive_count(), 0);
    }

    #[test]
    fn typed_ids_format_distinctly() {
        let id = EntityId {
            index: 3,
            generation: 1,
        };
        assert_eq!(format!("{:?}", MainId(id)), "Main(3v1)");
        assert_eq!(SubId(id).to_string(), "sub 3v1");
    }
}

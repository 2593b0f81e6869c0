//! Entity type and allocation utilities.
//!
//! An [`Entity`] is a lightweight `u32` identifier with no inherent data.
//! IDs are handed out by an [`EntityAllocator`] and recycled through a
//! free-list once the owning entity is deleted.

use serde::{Deserialize, Serialize};

/// A unique entity identifier.
///
/// Entities are pure identifiers — they carry no data of their own. An
/// entity only has meaning through the components attached to it.
///
/// ID 0 is reserved as the invalid/unassigned sentinel; on the wire it
/// marks a create intent whose ID has not yet been assigned by the
/// authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(pub u32);

impl Entity {
    /// The null / invalid entity sentinel.
    pub const INVALID: Entity = Entity(0);

    /// Create an entity from a raw `u32` identifier.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw `u32` identifier.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) entity.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Allocates entity IDs from a monotonic counter with a LIFO free-list.
///
/// IDs start at 1 (0 is reserved for [`Entity::INVALID`]). Deleted IDs are
/// returned through [`EntityAllocator::release`] and handed out again before
/// the counter advances.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    next_id: u32,
    freed: Vec<Entity>,
}

impl EntityAllocator {
    /// Creates a new allocator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 0,
            freed: Vec::new(),
        }
    }

    /// Allocates an entity ID, recycling the most recently freed ID first.
    ///
    /// Returns `None` once the identifier space is exhausted — the counter
    /// stops one short of `u32::MAX` so the sentinel value is never minted.
    pub fn allocate(&mut self) -> Option<Entity> {
        if let Some(id) = self.freed.pop() {
            return Some(id);
        }
        if self.next_id >= u32::MAX - 1 {
            return None;
        }
        self.next_id += 1;
        Some(Entity(self.next_id))
    }

    /// Returns an ID to the free-list for later reuse.
    pub fn release(&mut self, entity: Entity) {
        self.freed.push(entity);
    }

    /// The highest ID the counter has minted so far (recycled IDs included).
    #[must_use]
    pub fn high_water(&self) -> u32 {
        self.next_id
    }
}

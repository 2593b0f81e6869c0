//! Per-kind component storage.
//!
//! One [`Collection`] exists per bound component kind — a map from entity
//! ID to that kind's value. The store reaches collections two ways: typed,
//! through a downcast when the caller names the Rust type, and erased,
//! through [`AnyCollection`] when the replication path dispatches by
//! [`KindId`](tether_component::KindId) alone.

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map;

use tether_component::{Component, Entity};

use crate::error::OpError;

/// A map from entity ID to one kind's component values.
#[derive(Debug)]
pub struct Collection<T> {
    values: HashMap<Entity, T>,
}

impl<T> Collection<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Insert a value, replacing and returning any previous one.
    pub fn insert(&mut self, id: Entity, value: T) -> Option<T> {
        self.values.insert(id, value)
    }

    #[must_use]
    pub fn get(&self, id: Entity) -> Option<&T> {
        self.values.get(&id)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: Entity) -> Option<&mut T> {
        self.values.get_mut(&id)
    }

    pub fn remove(&mut self, id: Entity) -> Option<T> {
        self.values.remove(&id)
    }

    #[must_use]
    pub fn contains(&self, id: Entity) -> bool {
        self.values.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, Entity, T> {
        self.values.iter()
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a [`Collection`], indexed by kind in the store.
///
/// The encode/decode methods carry component values across the replication
/// boundary as MessagePack bytes without the store knowing the Rust type.
pub(crate) trait AnyCollection {
    /// Remove the entity's value; returns `false` if none was present.
    fn erase(&mut self, id: Entity) -> bool;
    /// MessagePack-encode the entity's live value, `None` if absent.
    fn encode(&self, id: Entity) -> Result<Option<Vec<u8>>, OpError>;
    /// Decode a value from MessagePack bytes and insert it, replacing any
    /// previous value.
    fn decode_insert(&mut self, id: Entity, bytes: &[u8]) -> Result<(), OpError>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyCollection for Collection<T> {
    fn erase(&mut self, id: Entity) -> bool {
        self.remove(id).is_some()
    }

    fn encode(&self, id: Entity) -> Result<Option<Vec<u8>>, OpError> {
        match self.get(id) {
            Some(value) => rmp_serde::to_vec(value)
                .map(Some)
                .map_err(|e| OpError::Codec(e.to_string())),
            None => Ok(None),
        }
    }

    fn decode_insert(&mut self, id: Entity, bytes: &[u8]) -> Result<(), OpError> {
        let value: T = rmp_serde::from_slice(bytes).map_err(|e| OpError::Codec(e.to_string()))?;
        self.insert(id, value);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

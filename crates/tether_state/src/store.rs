//! The state store.
//!
//! A [`Store`] owns one [`Collection`] per component kind plus the entity
//! allocator. Every mutation is gated by the kind registry's dependency
//! masks and evaluated against the observer list with before/after mask
//! snapshots, so watched-shape crossings fire exactly once.
//!
//! Entities exist iff they have an existence record; the record's payload
//! is the entity's current [`CompMask`]. No component outlives its owning
//! entity's record.

use std::any::TypeId;
use std::collections::HashMap;

use tracing::{debug, error};

use tether_component::{CompMask, Component, Entity, EntityAllocator, KindId, KindRegistry};

use crate::collection::{AnyCollection, Collection};
use crate::error::OpError;
use crate::observer::{Observer, ObserverId, Observers};

/// The entity-component state store.
pub struct Store {
    registry: KindRegistry,
    allocator: EntityAllocator,
    /// The Existence records: which kinds are presently attached, per
    /// live entity. The Existence bit itself is always set.
    existence: HashMap<Entity, CompMask>,
    /// One erased collection per bound kind, indexed by [`KindId`].
    /// Slot 0 (Existence) stays empty — its payload lives in `existence`.
    collections: Vec<Option<Box<dyn AnyCollection>>>,
    bindings: HashMap<TypeId, KindId>,
    observers: Observers,
    persistent_mask: CompMask,
}

impl Store {
    /// Create a store over a built kind registry. Every non-Existence kind
    /// must be bound to a Rust type with [`Store::bind`] before use.
    #[must_use]
    pub fn new(registry: KindRegistry) -> Self {
        let persistent_mask = registry.persistent_mask();
        let collections = (0..registry.kind_count()).map(|_| None).collect();
        Self {
            registry,
            allocator: EntityAllocator::new(),
            existence: HashMap::new(),
            collections,
            bindings: HashMap::new(),
            observers: Observers::default(),
            persistent_mask,
        }
    }

    /// The kind table this store was built over.
    #[must_use]
    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// Associate the schema kind named by `T::kind_name()` with a typed
    /// collection of `T`.
    ///
    /// # Errors
    ///
    /// `UnboundKind` if the schema never declared the name, `Redundant` if
    /// the kind is already bound.
    pub fn bind<T: Component>(&mut self) -> Result<KindId, OpError> {
        let name = T::kind_name();
        let kind = self
            .registry
            .id_of(name)
            .ok_or_else(|| OpError::UnboundKind(name.to_string()))?;
        if kind == KindId::EXISTENCE {
            return Err(OpError::Redundant);
        }
        if self.collections[kind.index()].is_some() {
            return Err(OpError::Redundant);
        }
        self.collections[kind.index()] = Some(Box::new(Collection::<T>::new()));
        self.bindings.insert(TypeId::of::<T>(), kind);
        debug!(kind = name, id = %kind, "bound component kind");
        Ok(kind)
    }

    // ── Entity lifecycle ────────────────────────────────────────────────

    /// Allocate an entity and create its existence record with only the
    /// Existence bit set.
    ///
    /// # Errors
    ///
    /// `IdSpaceExhausted` when no identifier can be allocated.
    pub fn create_entity(&mut self) -> Result<Entity, OpError> {
        let id = self.allocator.allocate().ok_or(OpError::IdSpaceExhausted)?;
        self.existence.insert(id, CompMask::EXISTENCE);
        self.observers
            .notify(id, CompMask::NONE, CompMask::EXISTENCE);
        Ok(id)
    }

    /// Remove every attached component, erase the existence record, and
    /// return the ID to the free-list. A second call on the same ID returns
    /// `NonexistentEntity`.
    pub fn delete_entity(&mut self, id: Entity) -> Result<(), OpError> {
        self.clear_entity(id)?;
        self.observers
            .notify(id, CompMask::EXISTENCE, CompMask::NONE);
        self.existence.remove(&id);
        self.allocator.release(id);
        Ok(())
    }

    /// Remove all non-Existence components unconditionally, bypassing
    /// dependency checks — everything is going together. Exit notifications
    /// fire per removal with correct mask snapshots.
    pub fn clear_entity(&mut self, id: Entity) -> Result<(), OpError> {
        let mask = *self
            .existence
            .get(&id)
            .ok_or(OpError::NonexistentEntity)?;
        let present: Vec<KindId> = self
            .registry
            .iter()
            .skip(1)
            .filter(|(_, info)| mask.intersects(info.self_bit))
            .map(|(kind, _)| kind)
            .collect();
        for kind in present {
            self.remove_unchecked(kind, id)?;
        }
        let residue = *self
            .existence
            .get(&id)
            .ok_or(OpError::InternalInconsistency)?;
        if residue != CompMask::EXISTENCE {
            error!(%id, %residue, "entity mask did not settle to the existence bit after clear");
            return Err(OpError::InternalInconsistency);
        }
        Ok(())
    }

    /// Delete every entity whose mask holds no persistent kind's bit.
    /// Returns the number of entities deleted.
    pub fn clear(&mut self) -> usize {
        let persistent = self.persistent_mask;
        let doomed: Vec<Entity> = self
            .existence
            .iter()
            .filter(|(_, mask)| !mask.intersects(persistent))
            .map(|(id, _)| *id)
            .collect();
        let mut deleted = 0;
        for id in doomed {
            if self.delete_entity(id).is_ok() {
                deleted += 1;
            }
        }
        deleted
    }

    // ── Typed component operations ──────────────────────────────────────

    /// Attach a component to an entity.
    ///
    /// Failure priority: `NonexistentEntity`, then `PrerequisiteFailure`,
    /// then `Redundant`.
    pub fn add_component<T: Component>(&mut self, id: Entity, value: T) -> Result<(), OpError> {
        let kind = self.kind_of::<T>()?;
        let (before, self_bit) = self.validate_add(kind, id)?;
        self.collection_mut::<T>(kind)?.insert(id, value);
        self.commit_add(id, before, self_bit);
        Ok(())
    }

    /// Detach a component from an entity.
    ///
    /// Fails `DependencyFailure` while any still-present kind lists this
    /// one as a prerequisite. Removal clears exactly this kind's bit.
    pub fn remove_component<T: Component>(&mut self, id: Entity) -> Result<(), OpError> {
        let kind = self.kind_of::<T>()?;
        let (before, self_bit, dependent) = self.validate_remove(kind, id)?;
        if before.intersects(dependent) {
            return Err(OpError::DependencyFailure);
        }
        self.commit_remove(kind, id, before, self_bit)
    }

    /// Replace an entity's component value, or create it when absent.
    ///
    /// Used by the state-sync path. A fresh insert follows the same
    /// prerequisite rules as an add; replacing an existing value leaves the
    /// mask untouched and fires no notifications.
    pub fn insert_component<T: Component>(&mut self, id: Entity, value: T) -> Result<(), OpError> {
        let kind = self.kind_of::<T>()?;
        let info = self.info(kind)?;
        let self_bit = info.self_bit;
        let mask = *self
            .existence
            .get(&id)
            .ok_or(OpError::NonexistentEntity)?;
        if mask.intersects(self_bit) {
            self.collection_mut::<T>(kind)?.insert(id, value);
            Ok(())
        } else {
            self.add_component(id, value)
        }
    }

    /// Borrow an entity's component. Pure lookup, no mutation.
    pub fn get<T: Component>(&self, id: Entity) -> Result<&T, OpError> {
        let kind = self.kind_of::<T>()?;
        if !self.existence.contains_key(&id) {
            return Err(OpError::NonexistentEntity);
        }
        self.collection::<T>(kind)?
            .get(id)
            .ok_or(OpError::NonexistentComponent)
    }

    /// Mutably borrow an entity's component.
    pub fn get_mut<T: Component>(&mut self, id: Entity) -> Result<&mut T, OpError> {
        let kind = self.kind_of::<T>()?;
        if !self.existence.contains_key(&id) {
            return Err(OpError::NonexistentEntity);
        }
        self.collection_mut::<T>(kind)?
            .get_mut(id)
            .ok_or(OpError::NonexistentComponent)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// The entity's current mask, or `NONE` if it does not exist — a live
    /// entity's mask always includes the Existence bit, so the two are
    /// distinguishable.
    #[must_use]
    pub fn component_mask(&self, id: Entity) -> CompMask {
        self.existence.get(&id).copied().unwrap_or(CompMask::NONE)
    }

    /// Whether the entity currently carries the given kind.
    #[must_use]
    pub fn has_component(&self, kind: KindId, id: Entity) -> bool {
        match self.registry.info(kind) {
            Some(info) => self.component_mask(id).intersects(info.self_bit),
            None => false,
        }
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.existence.len()
    }

    /// Iterate all live entity IDs, in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.existence.keys().copied()
    }

    // ── Observers ───────────────────────────────────────────────────────

    /// Register a watched-mask observer. `on_enter` fires when an entity's
    /// mask first covers `watched`; `on_exit` when it stops covering it.
    /// Entities already matching at registration time produce no calls.
    pub fn observe<E, X>(&mut self, watched: CompMask, on_enter: E, on_exit: X) -> ObserverId
    where
        E: FnMut(Entity) + 'static,
        X: FnMut(Entity) + 'static,
    {
        self.observers.register(Observer {
            watched,
            on_enter: Box::new(on_enter),
            on_exit: Box::new(on_exit),
        })
    }

    /// Drop a registration. Returns `false` if it was already removed.
    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }

    // ── Erased operations (replication entry points) ────────────────────

    /// Attach a component from its encoded payload bytes, dispatched by
    /// kind ID. Same validation as the typed path.
    pub fn apply_add(&mut self, kind: KindId, id: Entity, bytes: &[u8]) -> Result<(), OpError> {
        let (before, self_bit) = self.validate_add(kind, id)?;
        self.erased_mut(kind)?.decode_insert(id, bytes)?;
        self.commit_add(id, before, self_bit);
        Ok(())
    }

    /// Replace-or-create a component from encoded payload bytes.
    pub fn apply_insert(&mut self, kind: KindId, id: Entity, bytes: &[u8]) -> Result<(), OpError> {
        let self_bit = self.info(kind)?.self_bit;
        let mask = *self
            .existence
            .get(&id)
            .ok_or(OpError::NonexistentEntity)?;
        if mask.intersects(self_bit) {
            self.erased_mut(kind)?.decode_insert(id, bytes)
        } else {
            self.apply_add(kind, id, bytes)
        }
    }

    /// Detach a component dispatched by kind ID, with the same dependency
    /// checks as the typed path.
    pub fn apply_remove(&mut self, kind: KindId, id: Entity) -> Result<(), OpError> {
        let (before, self_bit, dependent) = self.validate_remove(kind, id)?;
        if before.intersects(dependent) {
            return Err(OpError::DependencyFailure);
        }
        self.commit_remove(kind, id, before, self_bit)
    }

    /// MessagePack-encode an entity's live component value, `None` if the
    /// entity does not carry the kind.
    pub fn encode_component(&self, kind: KindId, id: Entity) -> Result<Option<Vec<u8>>, OpError> {
        self.erased(kind)?.encode(id)
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn kind_of<T: Component>(&self) -> Result<KindId, OpError> {
        self.bindings
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or_else(|| OpError::UnboundKind(T::kind_name().to_string()))
    }

    fn info(&self, kind: KindId) -> Result<&tether_component::KindInfo, OpError> {
        self.registry.info(kind).ok_or(OpError::UnknownKind(kind.0))
    }

    /// Returns the entity's mask before the add and the kind's bit.
    fn validate_add(&self, kind: KindId, id: Entity) -> Result<(CompMask, CompMask), OpError> {
        let info = self.info(kind)?;
        let (required, self_bit) = (info.required, info.self_bit);
        let before = *self
            .existence
            .get(&id)
            .ok_or(OpError::NonexistentEntity)?;
        if !before.contains_all(required) {
            return Err(OpError::PrerequisiteFailure);
        }
        if before.intersects(self_bit) {
            return Err(OpError::Redundant);
        }
        Ok((before, self_bit))
    }

    fn commit_add(&mut self, id: Entity, before: CompMask, self_bit: CompMask) {
        let after = before.with(self_bit);
        self.existence.insert(id, after);
        self.observers.notify(id, before, after);
    }

    /// Dependency check is the caller's: `clear_entity` bypasses it.
    fn validate_remove(
        &self,
        kind: KindId,
        id: Entity,
    ) -> Result<(CompMask, CompMask, CompMask), OpError> {
        let info = self.info(kind)?;
        let (self_bit, dependent) = (info.self_bit, info.dependent);
        let before = *self
            .existence
            .get(&id)
            .ok_or(OpError::NonexistentEntity)?;
        if !before.intersects(self_bit) {
            return Err(OpError::NonexistentComponent);
        }
        Ok((before, self_bit, dependent))
    }

    /// Exit notifications fire before the value is erased, so the component
    /// is still readable from inside a callback's own bookkeeping.
    fn commit_remove(
        &mut self,
        kind: KindId,
        id: Entity,
        before: CompMask,
        self_bit: CompMask,
    ) -> Result<(), OpError> {
        let after = before.without(self_bit);
        self.observers.notify(id, before, after);
        if !self.erased_mut(kind)?.erase(id) {
            error!(%id, %kind, "mask bit set but no stored value to erase");
            return Err(OpError::InternalInconsistency);
        }
        self.existence.insert(id, after);
        Ok(())
    }

    fn remove_unchecked(&mut self, kind: KindId, id: Entity) -> Result<(), OpError> {
        let (before, self_bit, _) = self.validate_remove(kind, id)?;
        self.commit_remove(kind, id, before, self_bit)
    }

    fn erased(&self, kind: KindId) -> Result<&dyn AnyCollection, OpError> {
        let name = &self.info(kind)?.name;
        match self.collections.get(kind.index()).and_then(|s| s.as_deref()) {
            Some(coll) => Ok(coll),
            None => Err(OpError::UnboundKind(name.clone())),
        }
    }

    fn erased_mut(&mut self, kind: KindId) -> Result<&mut (dyn AnyCollection + 'static), OpError> {
        let name = self.info(kind)?.name.clone();
        match self
            .collections
            .get_mut(kind.index())
            .and_then(|s| s.as_deref_mut())
        {
            Some(coll) => Ok(coll),
            None => Err(OpError::UnboundKind(name)),
        }
    }

    fn collection<T: Component>(&self, kind: KindId) -> Result<&Collection<T>, OpError> {
        self.erased(kind)?
            .as_any()
            .downcast_ref::<Collection<T>>()
            .ok_or_else(|| {
                error!(%kind, "collection bound under a different type");
                OpError::InternalInconsistency
            })
    }

    fn collection_mut<T: Component>(&mut self, kind: KindId) -> Result<&mut Collection<T>, OpError> {
        self.erased_mut(kind)?
            .as_any_mut()
            .downcast_mut::<Collection<T>>()
            .ok_or_else(|| {
                error!(%kind, "collection bound under a different type");
                OpError::InternalInconsistency
            })
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("kinds", &self.registry.kind_count())
            .field("entities", &self.existence.len())
            .finish_non_exhaustive()
    }
}

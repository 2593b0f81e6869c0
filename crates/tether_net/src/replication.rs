//! The create/destroy replication protocol.
//!
//! Two roles share one id space. The dependent side ([`replica`]) never
//! allocates canonical IDs: it buffers constructor arguments in a
//! [`CreateRequest`], ships the intent with an unassigned entity field,
//! and waits. The authoritative side ([`authority`]) mints the real ID,
//! applies the payloads through its own store, and re-broadcasts the same
//! intent with the ID filled in; every dependent then replays it.
//!
//! Protocol-ordering precondition: the authority delivers create intents
//! in ID order. The replica's catch-up loop assumes at most a small gap
//! between the remote ID and its local allocator; a gap past
//! [`CATCHUP_CAP`] means the ID spaces have diverged.

use tracing::{debug, warn};

use tether_component::{Component, Entity, KindId, KindRegistry};
use tether_state::{OpError, Store};

use crate::codec::{decode_frame, encode, encode_frame};
use crate::error::NetError;
use crate::intent::{FrameClass, Intent, OpCategory, OpKind, TAG_REQUEST, TAG_SYNC};
use crate::transport::{Channel, Reliability, Transport};

/// Most placeholder entities a replica may synthesize per create intent
/// while catching its allocator up to a remote ID.
pub const CATCHUP_CAP: u32 = 16;

/// A dependent-side create request under construction.
///
/// Buffers encoded constructor arguments per kind without touching the
/// local store; the entity only comes into existence when the authority's
/// response is applied back.
#[derive(Debug)]
pub struct CreateRequest {
    payloads: Vec<Option<Vec<u8>>>,
}

impl CreateRequest {
    /// Open a request against a schema: one absent slot per declared kind.
    #[must_use]
    pub fn open(registry: &KindRegistry) -> Self {
        Self {
            payloads: vec![None; registry.kind_count()],
        }
    }

    /// Buffer constructor arguments for one component kind.
    ///
    /// Non-replicated kinds are skipped with a debug log — they stay
    /// local to whichever side constructs them.
    ///
    /// # Errors
    ///
    /// Returns an error when the schema never declared `T`'s kind or the
    /// value fails to encode.
    pub fn component<T: Component>(
        mut self,
        registry: &KindRegistry,
        value: &T,
    ) -> Result<Self, NetError> {
        let name = T::kind_name();
        let kind = registry
            .id_of(name)
            .ok_or_else(|| OpError::UnboundKind(name.to_string()))?;
        let info = registry
            .info(kind)
            .ok_or(OpError::UnknownKind(kind.0))?;
        if !info.replicated {
            debug!(kind = name, "skipping non-replicated kind in create request");
            return Ok(self);
        }
        self.payloads[kind.index()] = Some(encode(value)?);
        Ok(self)
    }

    /// Close the request into an intent with an unassigned entity field.
    #[must_use]
    pub fn close(self) -> Intent {
        Intent::create(Entity::INVALID, self.payloads)
    }

    /// Close the request and ship it to the authority.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Encode`] if framing fails.
    pub fn send(self, transport: &mut dyn Transport) -> Result<(), NetError> {
        let frame = encode_frame(TAG_REQUEST, &self.close())?;
        transport.send(&frame, Reliability::Reliable, Channel::EcsUpdate);
        Ok(())
    }
}

/// Apply a create intent's present payloads to one entity. A failed kind
/// aborts that kind's application only — the entity stands.
fn apply_payloads(store: &mut Store, id: Entity, payloads: &[Option<Vec<u8>>], fresh: bool) {
    for (index, slot) in payloads.iter().enumerate() {
        let Some(bytes) = slot else { continue };
        let kind = KindId(index as u16);
        let replicated = store
            .registry()
            .info(kind)
            .is_some_and(|info| info.replicated);
        if !replicated {
            warn!(%id, %kind, "ignoring payload for non-replicated or unknown kind");
            continue;
        }
        let result = if fresh {
            store.apply_add(kind, id, bytes)
        } else {
            store.apply_insert(kind, id, bytes)
        };
        if let Err(e) = result {
            warn!(%id, %kind, error = %e, "component payload application failed");
        }
    }
}

/// Encode one entity's current replicated state, one slot per kind.
fn encode_entity_payloads(store: &Store, id: Entity) -> Result<Vec<Option<Vec<u8>>>, NetError> {
    let mut payloads = vec![None; store.registry().kind_count()];
    for (kind, info) in store.registry().iter().skip(1) {
        if info.replicated && store.has_component(kind, id) {
            payloads[kind.index()] = store.encode_component(kind, id)?;
        }
    }
    Ok(payloads)
}

fn check_shape(store: &Store, intent: &Intent) -> Result<(), NetError> {
    let expected = store.registry().kind_count();
    if intent.payloads.len() != expected {
        return Err(NetError::PayloadShape {
            got: intent.payloads.len(),
            expected,
        });
    }
    Ok(())
}

/// The authoritative side: owns the canonical ID space.
pub mod authority {
    use super::*;

    /// Serve one dependent request, returning the intent to broadcast.
    ///
    /// A create request must arrive with an unassigned entity field; the
    /// returned intent carries the freshly minted ID and the same
    /// payloads, ready for every dependent (the originator included).
    ///
    /// # Errors
    ///
    /// Rejects assigned-ID creates, malformed payload lists, and
    /// categories the authority does not serve; propagates store failures
    /// for the entity-level operation itself.
    pub fn handle_request(store: &mut Store, intent: &Intent) -> Result<Intent, NetError> {
        match (intent.category, intent.op) {
            (OpCategory::EntityOp, OpKind::Create) => {
                if intent.entity.is_valid() {
                    return Err(NetError::BadEntityField(intent.entity.id()));
                }
                check_shape(store, intent)?;
                let id = store.create_entity()?;
                apply_payloads(store, id, &intent.payloads, true);
                debug!(%id, "created entity from dependent request");
                Ok(Intent::create(id, intent.payloads.clone()))
            }
            (OpCategory::EntityOp, OpKind::Destroy) => {
                store.delete_entity(intent.entity)?;
                Ok(Intent::destroy(intent.entity))
            }
            (OpCategory::ComponentOp, _) => Err(NetError::UnsupportedRequest),
        }
    }

    /// Drain incoming request frames, apply each, and broadcast the
    /// responses. Rejected requests are logged and dropped; returns the
    /// number served.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Encode`] if a response fails to frame.
    pub fn pump(store: &mut Store, transport: &mut dyn Transport) -> Result<usize, NetError> {
        let frames = transport.receive();
        let mut served = 0;
        for incoming in frames {
            if incoming.class != FrameClass::Request {
                continue;
            }
            let intent = match decode_frame(&incoming.bytes) {
                Ok((_, intent)) => intent,
                Err(e) => {
                    warn!(peer = incoming.peer, error = %e, "dropping malformed request frame");
                    continue;
                }
            };
            match handle_request(store, &intent) {
                Ok(response) => {
                    broadcast(transport, &response)?;
                    served += 1;
                }
                Err(e) => {
                    warn!(peer = incoming.peer, error = %e, "rejected replication request");
                }
            }
        }
        Ok(served)
    }

    /// State-broadcast of a live entity: encodes current component values
    /// rather than constructor arguments, for manually publishing an
    /// entity that was not created through a request.
    ///
    /// # Errors
    ///
    /// `NonexistentEntity` if `id` is not live; codec errors otherwise.
    pub fn publish_entity(store: &Store, id: Entity) -> Result<Intent, NetError> {
        if store.component_mask(id).is_empty() {
            return Err(OpError::NonexistentEntity.into());
        }
        Ok(Intent::create(id, encode_entity_payloads(store, id)?))
    }

    /// Component-level state update for a single kind on a live entity.
    ///
    /// # Errors
    ///
    /// `NonexistentComponent` if the entity does not carry the kind.
    pub fn publish_component(store: &Store, id: Entity, kind: KindId) -> Result<Intent, NetError> {
        let mut payloads = vec![None; store.registry().kind_count()];
        let bytes = store
            .encode_component(kind, id)?
            .ok_or(OpError::NonexistentComponent)?;
        payloads[kind.index()] = Some(bytes);
        Ok(Intent::update(id, payloads))
    }

    /// Delete an entity locally and return the destroy intent to
    /// broadcast. Only the authority originates deletions in the common
    /// case.
    ///
    /// # Errors
    ///
    /// Propagates the local deletion failure.
    pub fn destroy(store: &mut Store, id: Entity) -> Result<Intent, NetError> {
        store.delete_entity(id)?;
        Ok(Intent::destroy(id))
    }

    /// Frame an intent as state-sync and broadcast it to all dependents.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Encode`] if framing fails.
    pub fn broadcast(transport: &mut dyn Transport, intent: &Intent) -> Result<(), NetError> {
        let frame = encode_frame(TAG_SYNC, intent)?;
        transport.send(&frame, Reliability::Reliable, Channel::EcsUpdate);
        Ok(())
    }
}

/// The dependent side: mirrors the authority's ID space.
pub mod replica {
    use super::*;
    use tracing::error;

    /// Apply one authoritative intent to the local store.
    ///
    /// A create intent for a locally unknown ID first synthesizes local
    /// entities until the allocator has minted that ID, so the two ID
    /// spaces stay aligned.
    ///
    /// # Errors
    ///
    /// Rejects unassigned-ID intents and malformed payload lists;
    /// propagates entity-level store failures and catch-up divergence.
    pub fn apply_sync(store: &mut Store, intent: &Intent) -> Result<(), NetError> {
        match (intent.category, intent.op) {
            (OpCategory::EntityOp, OpKind::Create) => {
                if !intent.entity.is_valid() {
                    return Err(NetError::BadEntityField(0));
                }
                check_shape(store, intent)?;
                let fresh = store.component_mask(intent.entity).is_empty();
                if fresh {
                    catch_up(store, intent.entity)?;
                }
                apply_payloads(store, intent.entity, &intent.payloads, fresh);
                Ok(())
            }
            (OpCategory::EntityOp, OpKind::Destroy) => {
                store.delete_entity(intent.entity)?;
                Ok(())
            }
            (OpCategory::ComponentOp, OpKind::Create) => {
                if store.component_mask(intent.entity).is_empty() {
                    return Err(OpError::NonexistentEntity.into());
                }
                check_shape(store, intent)?;
                apply_payloads(store, intent.entity, &intent.payloads, false);
                Ok(())
            }
            (OpCategory::ComponentOp, OpKind::Destroy) => {
                check_shape(store, intent)?;
                for (index, slot) in intent.payloads.iter().enumerate() {
                    if slot.is_none() {
                        continue;
                    }
                    let kind = KindId(index as u16);
                    if let Err(e) = store.apply_remove(kind, intent.entity) {
                        warn!(id = %intent.entity, %kind, error = %e, "component removal failed");
                    }
                }
                Ok(())
            }
        }
    }

    /// Drain incoming state-sync frames and apply each. Failures are
    /// logged and dropped; returns the number applied.
    pub fn pump(store: &mut Store, transport: &mut dyn Transport) -> usize {
        let mut applied = 0;
        for incoming in transport.receive() {
            if incoming.class != FrameClass::StateSync {
                continue;
            }
            match decode_frame(&incoming.bytes) {
                Ok((_, intent)) => match apply_sync(store, &intent) {
                    Ok(()) => applied += 1,
                    Err(e) => {
                        warn!(peer = incoming.peer, error = %e, "failed to apply sync intent");
                    }
                },
                Err(e) => {
                    warn!(peer = incoming.peer, error = %e, "dropping malformed sync frame");
                }
            }
        }
        applied
    }

    fn catch_up(store: &mut Store, target: Entity) -> Result<(), NetError> {
        let mut synthesized = 0u32;
        loop {
            let id = store.create_entity()?;
            if id == target {
                return Ok(());
            }
            synthesized += 1;
            warn!(%id, %target, "synthesized placeholder entity while catching up to remote id");
            if synthesized >= CATCHUP_CAP {
                error!(
                    %target,
                    cap = CATCHUP_CAP,
                    "catch-up cap exceeded; local and remote id spaces have diverged"
                );
                return Err(NetError::Op(OpError::InternalInconsistency));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use tether_component::{CompMask, Schema};

    use super::*;
    use crate::transport::MemoryHub;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Foo {
        a: i32,
        b: i32,
    }
    impl Component for Foo {
        fn kind_name() -> &'static str {
            "Foo"
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Bar {
        number: f32,
    }
    impl Component for Bar {
        fn kind_name() -> &'static str {
            "Bar"
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Secret {
        token: u64,
    }
    impl Component for Secret {
        fn kind_name() -> &'static str {
            "Secret"
        }
    }

    fn schema() -> Schema {
        Schema::new()
            .kind("Foo")
            .kind_deps("Bar", &["Foo"])
            .kind("Secret")
            .unreplicated()
    }

    fn store() -> Store {
        let mut store = Store::new(schema().build().unwrap());
        store.bind::<Foo>().unwrap();
        store.bind::<Bar>().unwrap();
        store.bind::<Secret>().unwrap();
        store
    }

    #[test]
    fn test_request_roundtrip_assigns_id_and_preserves_payload() {
        let mut auth = store();
        let mut rep = store();

        let request = CreateRequest::open(rep.registry())
            .component(rep.registry(), &Foo { a: 1, b: 2 })
            .unwrap()
            .close();
        assert_eq!(request.entity, Entity::INVALID);

        let response = authority::handle_request(&mut auth, &request).unwrap();
        assert!(response.entity.is_valid());
        assert_eq!(response.payloads, request.payloads);
        assert_eq!(auth.get::<Foo>(response.entity).unwrap(), &Foo { a: 1, b: 2 });

        replica::apply_sync(&mut rep, &response).unwrap();
        assert_eq!(rep.get::<Foo>(response.entity).unwrap(), &Foo { a: 1, b: 2 });
        let foo_bit = rep.registry().info(rep.registry().id_of("Foo").unwrap()).unwrap().self_bit;
        assert_eq!(rep.component_mask(response.entity), CompMask::EXISTENCE | foo_bit);
    }

    #[test]
    fn test_payloads_apply_in_schema_order() {
        // Bar requires Foo; schema-order application makes the pair legal
        // inside one create intent.
        let mut auth = store();
        let request = CreateRequest::open(auth.registry())
            .component(auth.registry(), &Bar { number: 4.5 })
            .unwrap()
            .component(auth.registry(), &Foo { a: 0, b: 0 })
            .unwrap()
            .close();
        let response = authority::handle_request(&mut auth, &request).unwrap();
        assert_eq!(auth.get::<Bar>(response.entity).unwrap(), &Bar { number: 4.5 });
    }

    #[test]
    fn test_non_replicated_kind_is_never_encoded() {
        let auth = {
            let mut s = store();
            let e = s.create_entity().unwrap();
            s.add_component(e, Foo { a: 1, b: 1 }).unwrap();
            s.add_component(e, Secret { token: 99 }).unwrap();
            s
        };
        let id = auth.entities().next().unwrap();
        let intent = authority::publish_entity(&auth, id).unwrap();
        let secret = auth.registry().id_of("Secret").unwrap();
        assert!(intent.payloads[secret.index()].is_none());

        let request = CreateRequest::open(auth.registry())
            .component(auth.registry(), &Secret { token: 1 })
            .unwrap()
            .close();
        assert!(request.payloads.iter().all(Option::is_none));
    }

    #[test]
    fn test_authority_rejects_assigned_create() {
        let mut auth = store();
        let intent = Intent::create(Entity::from_raw(5), vec![None; 4]);
        assert!(matches!(
            authority::handle_request(&mut auth, &intent),
            Err(NetError::BadEntityField(5))
        ));
    }

    #[test]
    fn test_replica_rejects_unassigned_create() {
        let mut rep = store();
        let intent = Intent::create(Entity::INVALID, vec![None; 4]);
        assert!(matches!(
            replica::apply_sync(&mut rep, &intent),
            Err(NetError::BadEntityField(0))
        ));
    }

    #[test]
    fn test_payload_shape_mismatch_rejected() {
        let mut auth = store();
        let intent = Intent::create(Entity::INVALID, vec![None, None]);
        assert!(matches!(
            authority::handle_request(&mut auth, &intent),
            Err(NetError::PayloadShape { got: 2, expected: 4 })
        ));
    }

    #[test]
    fn test_replica_catches_up_over_id_gap() {
        let mut auth = store();
        let mut rep = store();

        // The authority created entities the replica never saw spawn.
        for _ in 0..3 {
            auth.create_entity().unwrap();
        }
        let intent = {
            let e = auth.create_entity().unwrap();
            auth.add_component(e, Foo { a: 7, b: 7 }).unwrap();
            authority::publish_entity(&auth, e).unwrap()
        };
        replica::apply_sync(&mut rep, &intent).unwrap();
        assert_eq!(rep.entity_count(), 4);
        assert_eq!(rep.get::<Foo>(intent.entity).unwrap(), &Foo { a: 7, b: 7 });
    }

    #[test]
    fn test_catch_up_cap_exceeded_is_divergence() {
        let mut rep = store();
        let far = Entity::from_raw(CATCHUP_CAP + 10);
        let intent = Intent::create(far, vec![None; 4]);
        assert!(matches!(
            replica::apply_sync(&mut rep, &intent),
            Err(NetError::Op(OpError::InternalInconsistency))
        ));
    }

    #[test]
    fn test_failed_component_does_not_abort_entity() {
        let mut auth = store();
        // Bar without Foo: the Bar payload fails its prerequisite check,
        // the entity itself must still be created.
        let request = CreateRequest::open(auth.registry())
            .component(auth.registry(), &Bar { number: 1.0 })
            .unwrap()
            .close();
        let response = authority::handle_request(&mut auth, &request).unwrap();
        assert!(response.entity.is_valid());
        assert_eq!(auth.component_mask(response.entity), CompMask::EXISTENCE);
    }

    #[test]
    fn test_destroy_roundtrip() {
        let mut auth = store();
        let mut rep = store();

        let e = auth.create_entity().unwrap();
        let create = authority::publish_entity(&auth, e).unwrap();
        replica::apply_sync(&mut rep, &create).unwrap();
        assert_eq!(rep.entity_count(), 1);

        let destroy = authority::destroy(&mut auth, e).unwrap();
        replica::apply_sync(&mut rep, &destroy).unwrap();
        assert_eq!(rep.entity_count(), 0);
        assert_eq!(rep.component_mask(e), CompMask::NONE);
    }

    #[test]
    fn test_component_update_and_removal() {
        let mut auth = store();
        let mut rep = store();

        let e = auth.create_entity().unwrap();
        auth.add_component(e, Foo { a: 1, b: 1 }).unwrap();
        replica::apply_sync(&mut rep, &authority::publish_entity(&auth, e).unwrap()).unwrap();

        auth.get_mut::<Foo>(e).unwrap().a = 42;
        let foo = auth.registry().id_of("Foo").unwrap();
        let update = authority::publish_component(&auth, e, foo).unwrap();
        replica::apply_sync(&mut rep, &update).unwrap();
        assert_eq!(rep.get::<Foo>(e).unwrap().a, 42);

        auth.remove_component::<Foo>(e).unwrap();
        let mut payloads = vec![None; rep.registry().kind_count()];
        payloads[foo.index()] = Some(Vec::new());
        let removal = Intent {
            category: OpCategory::ComponentOp,
            op: OpKind::Destroy,
            entity: e,
            payloads,
        };
        replica::apply_sync(&mut rep, &removal).unwrap();
        assert_eq!(rep.get::<Foo>(e), Err(OpError::NonexistentComponent));
    }

    #[test]
    fn test_pump_round_trip_over_memory_hub() {
        let hub = MemoryHub::new();
        let mut auth_net = hub.endpoint();
        let mut rep_net = hub.endpoint();
        let mut auth = store();
        let mut rep = store();

        CreateRequest::open(rep.registry())
            .component(rep.registry(), &Foo { a: 10, b: 20 })
            .unwrap()
            .send(&mut rep_net)
            .unwrap();

        assert_eq!(authority::pump(&mut auth, &mut auth_net).unwrap(), 1);
        assert_eq!(replica::pump(&mut rep, &mut rep_net), 1);

        assert_eq!(auth.entity_count(), 1);
        assert_eq!(rep.entity_count(), 1);
        let id = auth.entities().next().unwrap();
        assert_eq!(rep.get::<Foo>(id).unwrap(), &Foo { a: 10, b: 20 });
    }
}

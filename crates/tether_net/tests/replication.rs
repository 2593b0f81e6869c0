//! End-to-end replication across an in-memory hub: one authority, two
//! dependents, full request → assign → broadcast → replay cycle.

use serde::{Deserialize, Serialize};
use tether_component::{CompMask, Component, Schema};
use tether_net::{authority, replica, CreateRequest};
use tether_net::{MemoryHub, MemoryTransport};
use tether_state::{OpError, Store};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {
    fn kind_name() -> &'static str {
        "Position"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Velocity {
    dx: f32,
    dy: f32,
}
impl Component for Velocity {
    fn kind_name() -> &'static str {
        "Velocity"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LocalCache {
    scratch: u32,
}
impl Component for LocalCache {
    fn kind_name() -> &'static str {
        "LocalCache"
    }
}

fn build_store() -> Store {
    let registry = Schema::new()
        .kind("Position")
        .kind_deps("Velocity", &["Position"])
        .kind("LocalCache")
        .unreplicated()
        .build()
        .unwrap();
    let mut store = Store::new(registry);
    store.bind::<Position>().unwrap();
    store.bind::<Velocity>().unwrap();
    store.bind::<LocalCache>().unwrap();
    store
}

struct Peer {
    store: Store,
    net: MemoryTransport,
}

fn cluster(hub: &MemoryHub, dependents: usize) -> (Peer, Vec<Peer>) {
    let auth = Peer {
        store: build_store(),
        net: hub.endpoint(),
    };
    let reps = (0..dependents)
        .map(|_| Peer {
            store: build_store(),
            net: hub.endpoint(),
        })
        .collect();
    (auth, reps)
}

#[test]
fn test_request_propagates_to_every_dependent() {
    let hub = MemoryHub::new();
    let (mut auth, mut reps) = cluster(&hub, 2);

    CreateRequest::open(reps[0].store.registry())
        .component(reps[0].store.registry(), &Position { x: 1.0, y: 2.0 })
        .unwrap()
        .component(reps[0].store.registry(), &Velocity { dx: 0.5, dy: 0.0 })
        .unwrap()
        .send(&mut reps[0].net)
        .unwrap();

    // The originator does not mutate its own store until the authority
    // answers.
    assert_eq!(reps[0].store.entity_count(), 0);

    assert_eq!(authority::pump(&mut auth.store, &mut auth.net).unwrap(), 1);
    assert_eq!(auth.store.entity_count(), 1);

    let id = auth.store.entities().next().unwrap();
    for rep in &mut reps {
        assert_eq!(replica::pump(&mut rep.store, &mut rep.net), 1);
        assert_eq!(
            rep.store.get::<Position>(id).unwrap(),
            &Position { x: 1.0, y: 2.0 }
        );
        assert_eq!(
            rep.store.get::<Velocity>(id).unwrap(),
            &Velocity { dx: 0.5, dy: 0.0 }
        );
    }
}

#[test]
fn test_destroy_propagates_and_ids_stay_aligned() {
    let hub = MemoryHub::new();
    let (mut auth, mut reps) = cluster(&hub, 1);

    let first = auth.store.create_entity().unwrap();
    let second = auth.store.create_entity().unwrap();
    for id in [first, second] {
        let intent = authority::publish_entity(&auth.store, id).unwrap();
        authority::broadcast(&mut auth.net, &intent).unwrap();
    }
    let rep0 = &mut reps[0];
    assert_eq!(replica::pump(&mut rep0.store, &mut rep0.net), 2);
    assert_eq!(reps[0].store.entity_count(), 2);

    let destroy = authority::destroy(&mut auth.store, first).unwrap();
    authority::broadcast(&mut auth.net, &destroy).unwrap();
    let rep0 = &mut reps[0];
    assert_eq!(replica::pump(&mut rep0.store, &mut rep0.net), 1);

    assert_eq!(reps[0].store.component_mask(first), CompMask::NONE);
    assert_eq!(reps[0].store.component_mask(second), CompMask::EXISTENCE);
}

#[test]
fn test_local_kind_stays_local() {
    let hub = MemoryHub::new();
    let (mut auth, mut reps) = cluster(&hub, 1);

    let id = auth.store.create_entity().unwrap();
    auth.store
        .add_component(id, Position { x: 0.0, y: 0.0 })
        .unwrap();
    auth.store
        .add_component(id, LocalCache { scratch: 7 })
        .unwrap();

    let intent = authority::publish_entity(&auth.store, id).unwrap();
    authority::broadcast(&mut auth.net, &intent).unwrap();
    let rep0 = &mut reps[0];
    assert_eq!(replica::pump(&mut rep0.store, &mut rep0.net), 1);

    assert!(reps[0].store.get::<Position>(id).is_ok());
    assert_eq!(
        reps[0].store.get::<LocalCache>(id),
        Err(OpError::NonexistentComponent)
    );
}

#[test]
fn test_dependent_failure_on_one_kind_keeps_the_rest() {
    let hub = MemoryHub::new();
    let (mut auth, mut reps) = cluster(&hub, 1);

    // Velocity without its Position prerequisite: the bad payload is
    // dropped on both sides, the entity and nothing else survives.
    CreateRequest::open(reps[0].store.registry())
        .component(reps[0].store.registry(), &Velocity { dx: 1.0, dy: 1.0 })
        .unwrap()
        .send(&mut reps[0].net)
        .unwrap();

    assert_eq!(authority::pump(&mut auth.store, &mut auth.net).unwrap(), 1);
    let rep0 = &mut reps[0];
    assert_eq!(replica::pump(&mut rep0.store, &mut rep0.net), 1);

    let id = auth.store.entities().next().unwrap();
    assert_eq!(auth.store.component_mask(id), CompMask::EXISTENCE);
    assert_eq!(reps[0].store.component_mask(id), CompMask::EXISTENCE);
}

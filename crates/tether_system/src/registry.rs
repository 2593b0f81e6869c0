//! Observer-driven entity match lists.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use tether_component::{CompMask, Entity};
use tether_state::{ObserverId, Store};

/// The shared, running list of matching entities. Cloning is cheap; the
/// store-side observer and the subsystem both hold handles to the same
/// list.
pub type MatchList = Rc<RefCell<Vec<Entity>>>;

/// A live registration of one watched mask against a store.
///
/// While attached, the list gains an entity the moment its component mask
/// starts satisfying the watched mask and loses it the moment it stops.
/// Optional filter predicates can veto either transition, in which case
/// the entity is simply not tracked (a vetoed discover is not retried).
pub struct Registry {
    watched: CompMask,
    ids: MatchList,
    observer: ObserverId,
}

impl Registry {
    /// Attach a match list for `watched` to the store, tracking every
    /// entity that satisfies it.
    pub fn attach(store: &mut Store, watched: CompMask) -> Self {
        Self::attach_filtered(store, watched, |_| true, |_| true)
    }

    /// Like [`Registry::attach`], with discover/forget filter predicates.
    /// A predicate returning `false` leaves the list unchanged for that
    /// transition.
    pub fn attach_filtered<D, F>(
        store: &mut Store,
        watched: CompMask,
        mut discover: D,
        mut forget: F,
    ) -> Self
    where
        D: FnMut(Entity) -> bool + 'static,
        F: FnMut(Entity) -> bool + 'static,
    {
        let ids = MatchList::default();
        let enter_ids = Rc::clone(&ids);
        let exit_ids = Rc::clone(&ids);
        let observer = store.observe(
            watched,
            move |id| {
                if discover(id) {
                    enter_ids.borrow_mut().push(id);
                }
            },
            move |id| {
                let mut ids = exit_ids.borrow_mut();
                if let Some(position) = ids.iter().position(|&known| known == id) {
                    if forget(id) {
                        ids.remove(position);
                    }
                }
            },
        );
        debug!(%watched, "match list attached");
        Self {
            watched,
            ids,
            observer,
        }
    }

    /// Drop the store-side observer and clear the list.
    pub fn detach(self, store: &mut Store) {
        store.unobserve(self.observer);
        self.ids.borrow_mut().clear();
    }

    /// The mask this registry watches.
    #[must_use]
    pub fn watched(&self) -> CompMask {
        self.watched
    }

    /// A handle to the shared match list.
    #[must_use]
    pub fn ids(&self) -> MatchList {
        Rc::clone(&self.ids)
    }

    /// Copy of the current matches, for iteration that mutates the store.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Entity> {
        self.ids.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.borrow().is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: Entity) -> bool {
        self.ids.borrow().contains(&id)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("watched", &self.watched)
            .field("matches", &self.len())
            .finish()
    }
}

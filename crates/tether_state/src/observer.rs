//! Watched-mask observer registrations and edge-trigger evaluation.
//!
//! An observer names a watched mask and a pair of callbacks. On every
//! mutation the store hands this module the entity's mask before and after
//! the change; a callback fires only when the watched shape's subset
//! relation flips between the two snapshots — exactly once per crossing,
//! never on unrelated mutations.

use tether_component::{CompMask, Entity};

/// Handle for one observer registration, returned by
/// [`Store::observe`](crate::Store::observe). IDs are never reused within
/// a store's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) usize);

pub(crate) struct Observer {
    pub watched: CompMask,
    pub on_enter: Box<dyn FnMut(Entity)>,
    pub on_exit: Box<dyn FnMut(Entity)>,
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}

/// True when the entity did not satisfy `watched` before the mutation and
/// does after it.
pub(crate) fn entered(watched: CompMask, before: CompMask, after: CompMask) -> bool {
    !before.contains_all(watched) && after.contains_all(watched)
}

/// True when the entity satisfied `watched` before the mutation and no
/// longer does.
pub(crate) fn exited(watched: CompMask, before: CompMask, after: CompMask) -> bool {
    before.contains_all(watched) && !after.contains_all(watched)
}

/// The store's list of live registrations. Slot-based so unregistering
/// never shifts other observers' IDs.
#[derive(Debug, Default)]
pub(crate) struct Observers {
    slots: Vec<Option<Observer>>,
}

impl Observers {
    pub fn register(&mut self, observer: Observer) -> ObserverId {
        let id = ObserverId(self.slots.len());
        self.slots.push(Some(observer));
        id
    }

    /// Returns `false` if the ID was already unregistered.
    pub fn unregister(&mut self, id: ObserverId) -> bool {
        match self.slots.get_mut(id.0) {
            Some(slot @ Some(_)) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Evaluate every registration against a before/after mask pair and
    /// fire the callbacks whose condition newly holds or newly fails.
    pub fn notify(&mut self, id: Entity, before: CompMask, after: CompMask) {
        for slot in &mut self.slots {
            let Some(observer) = slot else { continue };
            if entered(observer.watched, before, after) {
                (observer.on_enter)(id);
            } else if exited(observer.watched, before, after) {
                (observer.on_exit)(id);
            }
        }
    }
}

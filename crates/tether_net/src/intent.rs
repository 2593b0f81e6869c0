//! Replication intents and message-kind tags.
//!
//! Every frame opens with a one-byte message-kind tag; the rest is a
//! MessagePack body. The tag ranges below are the ones the core owns —
//! anything outside them is the application's own traffic and is surfaced
//! as [`FrameClass::Plain`] payload bytes, untouched.

use serde::{Deserialize, Serialize};
use tether_component::Entity;

/// First application-owned tag. Frames below this value are rejected.
pub const TAG_PLAIN: u8 = 0x10;

/// A create/destroy intent travelling dependent → authority.
pub const TAG_REQUEST: u8 = 0x11;

/// An authoritative intent travelling authority → dependents.
pub const TAG_SYNC: u8 = 0x12;

/// Coarse classification of a received frame by its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    /// Application traffic the replication core does not interpret.
    Plain,
    /// A dependent's request, awaiting authoritative ID assignment.
    Request,
    /// An authoritative state-sync intent.
    StateSync,
}

/// Classify a message-kind tag, `None` for tags outside the owned ranges.
#[must_use]
pub fn classify(tag: u8) -> Option<FrameClass> {
    match tag {
        TAG_REQUEST => Some(FrameClass::Request),
        TAG_SYNC => Some(FrameClass::StateSync),
        t if t >= TAG_PLAIN => Some(FrameClass::Plain),
        _ => None,
    }
}

/// Whether the intent operates on a whole entity or on individual
/// components of an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpCategory {
    EntityOp,
    ComponentOp,
}

/// Create vs. destroy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Create,
    Destroy,
}

/// A serialized mutation intent.
///
/// For create operations, `payloads` holds one slot per declared kind in
/// schema order — `Some(bytes)` carries that kind's encoded constructor
/// arguments or live state, `None` is the explicit absent marker. Slot 0
/// (Existence) is always absent; non-replicated kinds are always encoded
/// absent. Destroy operations carry no payloads.
///
/// `entity` of [`Entity::INVALID`] means "unassigned" — the authority mints
/// the real ID and re-broadcasts the same intent with it filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub category: OpCategory,
    pub op: OpKind,
    pub entity: Entity,
    pub payloads: Vec<Option<Vec<u8>>>,
}

impl Intent {
    /// An entity-level create intent.
    #[must_use]
    pub fn create(entity: Entity, payloads: Vec<Option<Vec<u8>>>) -> Self {
        Self {
            category: OpCategory::EntityOp,
            op: OpKind::Create,
            entity,
            payloads,
        }
    }

    /// An entity-level destroy intent.
    #[must_use]
    pub fn destroy(entity: Entity) -> Self {
        Self {
            category: OpCategory::EntityOp,
            op: OpKind::Destroy,
            entity,
            payloads: Vec::new(),
        }
    }

    /// A component-level state-update intent for an existing entity.
    #[must_use]
    pub fn update(entity: Entity, payloads: Vec<Option<Vec<u8>>>) -> Self {
        Self {
            category: OpCategory::ComponentOp,
            op: OpKind::Create,
            entity,
            payloads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_owned_ranges() {
        assert_eq!(classify(TAG_REQUEST), Some(FrameClass::Request));
        assert_eq!(classify(TAG_SYNC), Some(FrameClass::StateSync));
        assert_eq!(classify(TAG_PLAIN), Some(FrameClass::Plain));
        assert_eq!(classify(0x40), Some(FrameClass::Plain));
        assert_eq!(classify(0x00), None);
        assert_eq!(classify(0x0f), None);
    }

    #[test]
    fn test_intent_roundtrip() {
        let intent = Intent::create(
            Entity::from_raw(0),
            vec![None, Some(vec![1, 2, 3]), None],
        );
        let bytes = rmp_serde::to_vec(&intent).unwrap();
        let restored: Intent = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(intent, restored);
    }

    #[test]
    fn test_destroy_carries_no_payloads() {
        let intent = Intent::destroy(Entity::from_raw(9));
        assert_eq!(intent.op, OpKind::Destroy);
        assert!(intent.payloads.is_empty());
    }
}

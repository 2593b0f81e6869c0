//! Component trait and the runtime kind registry.
//!
//! Every kind's dependency masks live in one table indexed by [`KindId`],
//! populated once from a [`Schema`](crate::schema::Schema) at startup and
//! looked up by ordinary indexing at every mutation.

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::mask::CompMask;

/// Dense index of a component kind, in schema declaration order.
///
/// Kind 0 is always the implicit Existence kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KindId(pub u16);

impl KindId {
    /// The reserved Existence kind.
    pub const EXISTENCE: KindId = KindId(0);

    /// The kind's position in the registry table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for KindId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Kind({})", self.0)
    }
}

/// The contract all stored component data must satisfy.
///
/// Components must be serialisable so their constructor arguments and live
/// state can cross the replication boundary. The kind name ties a Rust type
/// to its schema declaration.
///
/// # Examples
///
/// ```rust
/// use serde::{Serialize, Deserialize};
/// use tether_component::Component;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn kind_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Serialize + DeserializeOwned + 'static {
    /// The schema name this type is declared under.
    fn kind_name() -> &'static str;
}

/// Everything the store needs to know about one component kind.
#[derive(Debug, Clone)]
pub struct KindInfo {
    /// The schema name of the kind.
    pub name: String,
    /// The single bit this kind claims in every [`CompMask`].
    pub self_bit: CompMask,
    /// Kinds that must be present before this one may be added
    /// (always includes the Existence bit).
    pub required: CompMask,
    /// Kinds that list this one as a prerequisite; all of them must be
    /// absent before this one may be removed.
    pub dependent: CompMask,
    /// Survives a bulk clear of all entities.
    pub persistent: bool,
    /// Carried by the replication protocol.
    pub replicated: bool,
}

/// The per-kind dependency table, computed once from a declared schema.
#[derive(Debug, Clone)]
pub struct KindRegistry {
    kinds: Vec<KindInfo>,
    by_name: HashMap<String, KindId>,
}

impl KindRegistry {
    pub(crate) fn new(kinds: Vec<KindInfo>) -> Self {
        let by_name = kinds
            .iter()
            .enumerate()
            .map(|(i, k)| (k.name.clone(), KindId(i as u16)))
            .collect();
        Self { kinds, by_name }
    }

    /// Total number of kinds, Existence included.
    #[must_use]
    pub fn kind_count(&self) -> usize {
        self.kinds.len()
    }

    /// Look up a kind's table entry.
    #[must_use]
    pub fn info(&self, id: KindId) -> Option<&KindInfo> {
        self.kinds.get(id.index())
    }

    /// Resolve a kind name to its ID.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<KindId> {
        self.by_name.get(name).copied()
    }

    /// Iterate all kinds in schema order, Existence first.
    pub fn iter(&self) -> impl Iterator<Item = (KindId, &KindInfo)> {
        self.kinds
            .iter()
            .enumerate()
            .map(|(i, k)| (KindId(i as u16), k))
    }

    /// Union of the self-bits of all persistent kinds.
    #[must_use]
    pub fn persistent_mask(&self) -> CompMask {
        self.kinds
            .iter()
            .filter(|k| k.persistent)
            .fold(CompMask::NONE, |acc, k| acc | k.self_bit)
    }
}

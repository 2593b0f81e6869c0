//! Declared component schema and registry construction.
//!
//! A [`Schema`] lists component kinds with their prerequisite kinds and
//! per-kind attributes. [`Schema::build`] validates the declaration (the
//! prerequisite relation must be acyclic) and computes the required and
//! dependent masks for every kind — all the checking happens here, before
//! any entity exists.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use crate::kind::{KindInfo, KindRegistry};
use crate::mask::CompMask;

/// Number of user-declarable kinds — bit 0 of the mask is reserved for
/// Existence.
pub const MAX_USER_KINDS: usize = 31;

/// The reserved name of the implicit kind every entity carries.
pub const EXISTENCE_NAME: &str = "Existence";

/// Errors detected while building a [`KindRegistry`] from a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Failed to parse a JSON schema document.
    #[error("schema document parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The same kind name was declared twice.
    #[error("duplicate kind: {0}")]
    DuplicateKind(String),

    /// A kind was declared under the reserved Existence name.
    #[error("kind name {0:?} is reserved")]
    ReservedName(String),

    /// A prerequisite names a kind the schema never declares.
    #[error("kind {kind:?} lists unknown prerequisite {prereq:?}")]
    UnknownPrerequisite { kind: String, prereq: String },

    /// The prerequisite relation contains a cycle.
    #[error("prerequisite cycle through kind {0:?}")]
    DependencyCycle(String),

    /// More kinds declared than the mask has bits for.
    #[error("{0} kinds declared, at most {MAX_USER_KINDS} supported")]
    TooManyKinds(usize),
}

#[derive(Debug, Clone, Deserialize)]
struct KindDecl {
    name: String,
    #[serde(default)]
    prereqs: Vec<String>,
    #[serde(default)]
    persistent: bool,
    #[serde(default = "default_replicated")]
    replicated: bool,
}

fn default_replicated() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SchemaDoc {
    kinds: Vec<KindDecl>,
}

/// A component schema under construction.
///
/// Kinds claim mask bits in declaration order. Attribute setters
/// ([`Schema::persistent`], [`Schema::unreplicated`]) apply to the most
/// recently declared kind.
///
/// # Examples
///
/// ```rust
/// use tether_component::Schema;
///
/// let registry = Schema::new()
///     .kind("Position")
///     .kind_deps("Velocity", &["Position"])
///     .build()
///     .unwrap();
/// assert_eq!(registry.kind_count(), 3); // Existence + 2
/// ```
#[derive(Debug, Default)]
pub struct Schema {
    kinds: Vec<KindDecl>,
}

impl Schema {
    /// Start an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a kind with no prerequisites.
    #[must_use]
    pub fn kind(self, name: &str) -> Self {
        self.kind_deps(name, &[])
    }

    /// Declare a kind with prerequisite kinds that must already be present
    /// on an entity before this one may be added.
    #[must_use]
    pub fn kind_deps(mut self, name: &str, prereqs: &[&str]) -> Self {
        self.kinds.push(KindDecl {
            name: name.to_string(),
            prereqs: prereqs.iter().map(|p| (*p).to_string()).collect(),
            persistent: false,
            replicated: true,
        });
        self
    }

    /// Mark the most recently declared kind as surviving a bulk clear.
    #[must_use]
    pub fn persistent(mut self) -> Self {
        if let Some(last) = self.kinds.last_mut() {
            last.persistent = true;
        }
        self
    }

    /// Exclude the most recently declared kind from replication.
    #[must_use]
    pub fn unreplicated(mut self) -> Self {
        if let Some(last) = self.kinds.last_mut() {
            last.replicated = false;
        }
        self
    }

    /// Load a schema from a JSON document of the form
    /// `{"kinds": [{"name": "...", "prereqs": [...], "persistent": false,
    /// "replicated": true}, ...]}`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Parse`] on malformed JSON.
    pub fn from_json(doc: &str) -> Result<Self, SchemaError> {
        let doc: SchemaDoc = serde_json::from_str(doc)?;
        Ok(Self { kinds: doc.kinds })
    }

    /// Validate the declaration and compute the per-kind dependency table.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for duplicate or reserved names, unknown
    /// prerequisites, prerequisite cycles, or too many kinds.
    pub fn build(self) -> Result<KindRegistry, SchemaError> {
        if self.kinds.len() > MAX_USER_KINDS {
            return Err(SchemaError::TooManyKinds(self.kinds.len()));
        }

        let mut index_of = HashMap::new();
        for (i, decl) in self.kinds.iter().enumerate() {
            if decl.name == EXISTENCE_NAME {
                return Err(SchemaError::ReservedName(decl.name.clone()));
            }
            if index_of.insert(decl.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateKind(decl.name.clone()));
            }
        }

        // Resolve prerequisite names to declaration indices.
        let mut prereq_indices = Vec::with_capacity(self.kinds.len());
        for decl in &self.kinds {
            let mut indices = Vec::with_capacity(decl.prereqs.len());
            for prereq in &decl.prereqs {
                let &idx = index_of
                    .get(prereq)
                    .ok_or_else(|| SchemaError::UnknownPrerequisite {
                        kind: decl.name.clone(),
                        prereq: prereq.clone(),
                    })?;
                indices.push(idx);
            }
            prereq_indices.push(indices);
        }

        detect_cycles(&self.kinds, &prereq_indices)?;

        // User kind at declaration index i claims mask bit i + 1.
        let bit_of = |i: usize| CompMask::bit(i as u16 + 1);

        let mut kinds = vec![KindInfo {
            name: EXISTENCE_NAME.to_string(),
            self_bit: CompMask::EXISTENCE,
            required: CompMask::NONE,
            dependent: CompMask::ALL.without(CompMask::EXISTENCE),
            persistent: false,
            replicated: false,
        }];

        for (i, decl) in self.kinds.iter().enumerate() {
            let required = prereq_indices[i]
                .iter()
                .fold(CompMask::EXISTENCE, |acc, &p| acc | bit_of(p));
            let dependent = prereq_indices
                .iter()
                .enumerate()
                .filter(|(_, prereqs)| prereqs.contains(&i))
                .fold(CompMask::NONE, |acc, (d, _)| acc | bit_of(d));
            kinds.push(KindInfo {
                name: decl.name.clone(),
                self_bit: bit_of(i),
                required,
                dependent,
                persistent: decl.persistent,
                replicated: decl.replicated,
            });
        }

        Ok(KindRegistry::new(kinds))
    }
}

/// Depth-first search over the prerequisite graph; a back edge is a cycle.
fn detect_cycles(kinds: &[KindDecl], prereqs: &[Vec<usize>]) -> Result<(), SchemaError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        node: usize,
        kinds: &[KindDecl],
        prereqs: &[Vec<usize>],
        marks: &mut [Mark],
    ) -> Result<(), SchemaError> {
        match marks[node] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                return Err(SchemaError::DependencyCycle(kinds[node].name.clone()));
            }
            Mark::Unvisited => {}
        }
        marks[node] = Mark::InProgress;
        for &p in &prereqs[node] {
            visit(p, kinds, prereqs, marks)?;
        }
        marks[node] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; kinds.len()];
    for node in 0..kinds.len() {
        visit(node, kinds, prereqs, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::KindId;

    fn tiered() -> Schema {
        Schema::new()
            .kind("Foo")
            .kind_deps("Bar", &["Foo"])
            .kind_deps("Meh", &["Foo", "Bar"])
    }

    #[test]
    fn test_required_masks() {
        let registry = tiered().build().unwrap();
        let foo = registry.info(KindId(1)).unwrap();
        let bar = registry.info(KindId(2)).unwrap();
        let meh = registry.info(KindId(3)).unwrap();

        assert_eq!(foo.self_bit, CompMask::bit(1));
        assert_eq!(foo.required, CompMask::EXISTENCE);
        assert_eq!(bar.required, CompMask::EXISTENCE | foo.self_bit);
        assert_eq!(
            meh.required,
            CompMask::EXISTENCE | foo.self_bit | bar.self_bit
        );
    }

    #[test]
    fn test_dependent_masks() {
        let registry = tiered().build().unwrap();
        let foo = registry.info(KindId(1)).unwrap();
        let bar = registry.info(KindId(2)).unwrap();
        let meh = registry.info(KindId(3)).unwrap();

        assert_eq!(foo.dependent, bar.self_bit | meh.self_bit);
        assert_eq!(bar.dependent, meh.self_bit);
        assert_eq!(meh.dependent, CompMask::NONE);
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let err = Schema::new().kind("Foo").kind("Foo").build().unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateKind(name) if name == "Foo"));
    }

    #[test]
    fn test_reserved_name_rejected() {
        let err = Schema::new().kind("Existence").build().unwrap_err();
        assert!(matches!(err, SchemaError::ReservedName(_)));
    }

    #[test]
    fn test_unknown_prerequisite_rejected() {
        let err = Schema::new()
            .kind_deps("Bar", &["Foo"])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::UnknownPrerequisite { kind, prereq }
                if kind == "Bar" && prereq == "Foo"
        ));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = Schema::new()
            .kind_deps("A", &["C"])
            .kind_deps("B", &["A"])
            .kind_deps("C", &["B"])
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DependencyCycle(_)));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let err = Schema::new().kind_deps("A", &["A"]).build().unwrap_err();
        assert!(matches!(err, SchemaError::DependencyCycle(name) if name == "A"));
    }

    #[test]
    fn test_too_many_kinds_rejected() {
        let mut schema = Schema::new();
        let names: Vec<String> = (0..32).map(|i| format!("K{i}")).collect();
        for name in &names {
            schema = schema.kind(name);
        }
        assert!(matches!(
            schema.build().unwrap_err(),
            SchemaError::TooManyKinds(32)
        ));
    }

    #[test]
    fn test_attributes_apply_to_last_kind() {
        let registry = Schema::new()
            .kind("Cache")
            .unreplicated()
            .kind("Player")
            .persistent()
            .build()
            .unwrap();
        let cache = registry.info(registry.id_of("Cache").unwrap()).unwrap();
        let player = registry.info(registry.id_of("Player").unwrap()).unwrap();
        assert!(!cache.replicated);
        assert!(!cache.persistent);
        assert!(player.replicated);
        assert!(player.persistent);
    }

    #[test]
    fn test_from_json() {
        let doc = r#"{
            "kinds": [
                { "name": "Foo" },
                { "name": "Bar", "prereqs": ["Foo"], "replicated": false },
                { "name": "Keep", "persistent": true }
            ]
        }"#;
        let registry = Schema::from_json(doc).unwrap().build().unwrap();
        assert_eq!(registry.kind_count(), 4);
        let bar = registry.info(registry.id_of("Bar").unwrap()).unwrap();
        assert!(!bar.replicated);
        assert!(bar.required.contains_all(CompMask::bit(1)));
        assert!(registry.info(registry.id_of("Keep").unwrap()).unwrap().persistent);
    }

    #[test]
    fn test_from_json_malformed() {
        assert!(matches!(
            Schema::from_json("{").unwrap_err(),
            SchemaError::Parse(_)
        ));
    }
}

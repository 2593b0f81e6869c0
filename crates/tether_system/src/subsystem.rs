//! The subsystem harness: named bundles of match lists with a pause
//! switch.

use tracing::info;

use tether_component::CompMask;
use tether_state::Store;

use crate::registry::Registry;

/// Configuration for a subsystem.
#[derive(Debug, Clone)]
pub struct SubsystemConfig {
    /// Human-readable subsystem name (e.g. `"physics"`).
    pub name: String,
    /// One watched mask per match list the subsystem wants maintained.
    pub watched: Vec<CompMask>,
}

impl SubsystemConfig {
    /// Create a new config with the given name and no watched masks.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            watched: Vec::new(),
        }
    }

    /// Add a watched mask. Match lists are indexed in declaration order.
    #[must_use]
    pub fn watch(mut self, mask: CompMask) -> Self {
        self.watched.push(mask);
        self
    }
}

/// A named collection of attached match lists.
///
/// `attach` wires one [`Registry`] per configured mask; tick code then
/// iterates the lists via [`Subsystem::registry`] or
/// [`Subsystem::snapshot`]. Pausing is a flag for the caller's own tick
/// loop; the match lists keep updating while paused.
#[derive(Debug)]
pub struct Subsystem {
    config: SubsystemConfig,
    registries: Vec<Registry>,
    paused: bool,
}

impl Subsystem {
    /// Create a detached subsystem from its config.
    #[must_use]
    pub fn new(config: SubsystemConfig) -> Self {
        Self {
            config,
            registries: Vec::new(),
            paused: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Wire one observer per configured mask. Entities already in the
    /// store are not backfilled; lists fill as masks transition.
    pub fn attach(&mut self, store: &mut Store) {
        for &mask in &self.config.watched {
            self.registries.push(Registry::attach(store, mask));
        }
        info!(
            subsystem = self.config.name,
            lists = self.registries.len(),
            "subsystem attached"
        );
    }

    /// Drop every observer and clear the lists.
    pub fn detach(&mut self, store: &mut Store) {
        for registry in self.registries.drain(..) {
            registry.detach(store);
        }
        info!(subsystem = self.config.name, "subsystem detached");
    }

    /// The match list at `index`, in configuration order.
    #[must_use]
    pub fn registry(&self, index: usize) -> Option<&Registry> {
        self.registries.get(index)
    }

    /// Copy of the matches at `index`, empty when out of range.
    #[must_use]
    pub fn snapshot(&self, index: usize) -> Vec<tether_component::Entity> {
        self.registries
            .get(index)
            .map(Registry::snapshot)
            .unwrap_or_default()
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

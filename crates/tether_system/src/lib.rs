//! # tether_system
//!
//! Subsystem harness over the entity-component store.
//!
//! A subsystem declares the component masks it cares about; the harness
//! wires one store observer per mask and maintains a running match list
//! of every entity whose mask currently satisfies it. Subsystem tick
//! code iterates those lists directly instead of re-querying the store.

pub mod registry;
pub mod subsystem;

pub use registry::{MatchList, Registry};
pub use subsystem::{Subsystem, SubsystemConfig};

//! # tether_state
//!
//! The state store: one typed collection per component kind, mutation gated
//! by the kind registry's dependency masks, with edge-triggered observer
//! notifications on every add and remove.
//!
//! This crate provides:
//!
//! - [`Store`] — entity lifecycle and per-kind add/remove/get operations.
//! - [`Collection`] — the per-kind entity-to-value map.
//! - [`ObserverId`] — handle for a watched-mask registration.
//! - [`OpError`] — the operation result taxonomy.

pub mod collection;
pub mod error;
pub mod observer;
pub mod store;

pub use collection::Collection;
pub use error::OpError;
pub use observer::ObserverId;
pub use store::Store;

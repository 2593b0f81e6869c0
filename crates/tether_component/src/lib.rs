//! # tether_component
//!
//! Identifier and kind model for the replicated entity-component store.
//!
//! This crate provides:
//!
//! - [`Entity`] — lightweight `u32` entity identifiers.
//! - [`EntityAllocator`] — counter-plus-free-list ID allocator.
//! - [`CompMask`] — bit-set over component kinds.
//! - [`Component`] trait — the contract all stored data must satisfy.
//! - [`KindRegistry`] — per-kind dependency masks, built once from a [`Schema`].

pub mod entity;
pub mod kind;
pub mod mask;
pub mod schema;

pub use entity::{Entity, EntityAllocator};
pub use kind::{Component, KindId, KindInfo, KindRegistry};
pub use mask::CompMask;
pub use schema::{Schema, SchemaError};

//! # tether_net
//!
//! Replication layer for the entity-component store.
//!
//! This crate provides:
//!
//! - [`intent`] — the create/destroy wire intents and message-kind tags.
//! - [`codec`] — tag-framed MessagePack encoding helpers.
//! - [`transport`] — the opaque send/receive channel seam, with an
//!   in-memory mesh for tests and local simulation.
//! - [`nats`] — a NATS-backed [`Transport`] for real deployments.
//! - [`replication`] — the authority/replica protocol that drives store
//!   mutations from received intents.
//! - [`error`] — network-layer error types.

pub mod codec;
pub mod error;
pub mod intent;
pub mod nats;
pub mod replication;
pub mod subjects;
pub mod transport;

pub use codec::{decode_frame, encode_frame};
pub use error::NetError;
pub use intent::{FrameClass, Intent, OpCategory, OpKind};
pub use replication::{authority, replica, CreateRequest, CATCHUP_CAP};
pub use transport::{Channel, Incoming, MemoryHub, MemoryTransport, Reliability, Transport};

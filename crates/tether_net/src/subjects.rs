//! NATS subject hierarchy.
//!
//! All subjects are prefixed with `tether.` to namespace within a shared
//! NATS cluster.

use crate::transport::{Channel, PeerId};

/// Root prefix for all subjects.
pub const PREFIX: &str = "tether";

/// Build the broadcast subject for a channel.
///
/// `tether.frame.<channel>`
#[must_use]
pub fn frame(channel: Channel) -> String {
    format!("{PREFIX}.frame.{}", channel.name())
}

/// Build the direct subject for a single peer.
///
/// `tether.peer.<peer>`
#[must_use]
pub fn peer(peer: PeerId) -> String {
    format!("{PREFIX}.peer.{peer}")
}

/// NATS header keys carrying routing metadata.
pub mod headers {
    /// The sending endpoint's peer ID.
    pub const PEER: &str = "peer-id";
}

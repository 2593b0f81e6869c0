//! Network-layer error types.

use tether_state::OpError;

/// Errors that can occur while encoding, decoding, or applying intents.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Failed to encode a message to MessagePack.
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a message from MessagePack.
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// A frame carried a message-kind tag outside the ranges the core owns.
    #[error("unknown message-kind tag {0:#04x}")]
    UnknownTag(u8),

    /// A frame too short to carry a tag byte.
    #[error("empty frame")]
    EmptyFrame,

    /// A create intent arrived where its ID assignment state made no sense
    /// for the receiving role.
    #[error("intent entity id {0} not valid for this role")]
    BadEntityField(u32),

    /// A request category/op pair the receiving role does not serve.
    #[error("unsupported request")]
    UnsupportedRequest,

    /// An intent's payload list does not line up with the schema.
    #[error("intent carries {got} payload slots, schema has {expected} kinds")]
    PayloadShape { got: usize, expected: usize },

    /// A store operation failed while applying an intent.
    #[error("store operation failed: {0}")]
    Op(#[from] OpError),

    /// NATS connection error.
    #[error("NATS connection error: {0}")]
    Connect(#[from] async_nats::ConnectError),

    /// NATS subscription error.
    #[error("NATS subscribe error: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),
}

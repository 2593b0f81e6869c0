//! Tag-framed MessagePack codec.
//!
//! Thin wrappers around `rmp-serde`: a frame is one message-kind tag byte
//! followed by the MessagePack body.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::NetError;
use crate::intent::{FrameClass, Intent, classify};

/// Encode a value to MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NetError> {
    Ok(rmp_serde::to_vec(value)?)
}

/// Decode a value from MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Decode`] if deserialisation fails.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, NetError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Frame an intent under a message-kind tag.
///
/// # Errors
///
/// Returns [`NetError::Encode`] if serialisation fails.
pub fn encode_frame(tag: u8, intent: &Intent) -> Result<Vec<u8>, NetError> {
    let mut frame = vec![tag];
    frame.extend(encode(intent)?);
    Ok(frame)
}

/// Split a frame into its classified tag and decoded intent.
///
/// # Errors
///
/// Returns [`NetError::EmptyFrame`] for a zero-length frame,
/// [`NetError::UnknownTag`] for a tag outside the owned ranges, and
/// [`NetError::Decode`] for a malformed body.
pub fn decode_frame(frame: &[u8]) -> Result<(FrameClass, Intent), NetError> {
    let (&tag, body) = frame.split_first().ok_or(NetError::EmptyFrame)?;
    let class = classify(tag).ok_or(NetError::UnknownTag(tag))?;
    Ok((class, decode(body)?))
}

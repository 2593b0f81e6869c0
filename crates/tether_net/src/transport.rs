//! The transport seam.
//!
//! The replication core treats the network as an opaque channel: frames go
//! out with a reliability hint and a channel, and already-arrived frames
//! come back from a non-blocking [`Transport::receive`]. Connection
//! management lives behind the implementation.
//!
//! [`MemoryHub`] provides an in-process mesh of mailboxes for tests and
//! single-process simulation; [`NatsTransport`](crate::nats::NatsTransport)
//! covers real deployments.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use tracing::debug;

use crate::intent::{FrameClass, classify};

/// Identifies a remote endpoint. 0 means "unknown sender".
pub type PeerId = u32;

/// Delivery guarantee hint for outgoing frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    Unreliable,
    Reliable,
}

/// Ordered channels keeping unrelated traffic from head-of-line blocking
/// each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Admin,
    EcsUpdate,
    Simulation,
}

impl Channel {
    /// Short name, used in transport addressing.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Channel::Admin => "admin",
            Channel::EcsUpdate => "ecs",
            Channel::Simulation => "sim",
        }
    }
}

/// A received frame, classified coarsely by its message-kind tag.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub class: FrameClass,
    pub peer: PeerId,
    pub bytes: Vec<u8>,
}

/// An opaque send/receive channel.
///
/// All calls are non-blocking: `receive` hands back frames that have
/// already arrived and never suspends.
pub trait Transport {
    /// Broadcast a frame to every other endpoint.
    fn send(&mut self, frame: &[u8], reliability: Reliability, channel: Channel);

    /// Send a frame to one endpoint.
    fn send_to(&mut self, frame: &[u8], peer: PeerId, reliability: Reliability, channel: Channel);

    /// Drain every frame that has arrived since the last call. Frames with
    /// tags outside the owned ranges are dropped with a debug log.
    fn receive(&mut self) -> Vec<Incoming>;
}

#[derive(Debug, Default)]
struct HubInner {
    mailboxes: HashMap<PeerId, VecDeque<(PeerId, Vec<u8>)>>,
    next_peer: PeerId,
}

/// An in-process transport mesh. Every [`MemoryHub::endpoint`] gets a
/// mailbox; `send` broadcasts to all other mailboxes, `send_to` targets one.
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    inner: Rc<RefCell<HubInner>>,
}

impl MemoryHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new endpoint attached to this hub.
    #[must_use]
    pub fn endpoint(&self) -> MemoryTransport {
        let mut inner = self.inner.borrow_mut();
        inner.next_peer += 1;
        let peer = inner.next_peer;
        inner.mailboxes.insert(peer, VecDeque::new());
        MemoryTransport {
            peer,
            inner: Rc::clone(&self.inner),
        }
    }
}

/// One endpoint of a [`MemoryHub`].
#[derive(Debug)]
pub struct MemoryTransport {
    peer: PeerId,
    inner: Rc<RefCell<HubInner>>,
}

impl MemoryTransport {
    /// This endpoint's own peer ID.
    #[must_use]
    pub fn peer(&self) -> PeerId {
        self.peer
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, frame: &[u8], _reliability: Reliability, _channel: Channel) {
        let mut inner = self.inner.borrow_mut();
        let from = self.peer;
        for (&peer, mailbox) in inner.mailboxes.iter_mut() {
            if peer != from {
                mailbox.push_back((from, frame.to_vec()));
            }
        }
    }

    fn send_to(&mut self, frame: &[u8], peer: PeerId, _reliability: Reliability, _channel: Channel) {
        let mut inner = self.inner.borrow_mut();
        let from = self.peer;
        if let Some(mailbox) = inner.mailboxes.get_mut(&peer) {
            mailbox.push_back((from, frame.to_vec()));
        }
    }

    fn receive(&mut self) -> Vec<Incoming> {
        let mut inner = self.inner.borrow_mut();
        let Some(mailbox) = inner.mailboxes.get_mut(&self.peer) else {
            return Vec::new();
        };
        mailbox
            .drain(..)
            .filter_map(|(peer, bytes)| match bytes.first().and_then(|&t| classify(t)) {
                Some(class) => Some(Incoming { class, peer, bytes }),
                None => {
                    debug!(peer, "dropping frame with unowned tag");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{TAG_PLAIN, TAG_REQUEST, TAG_SYNC};

    #[test]
    fn test_broadcast_reaches_all_other_endpoints() {
        let hub = MemoryHub::new();
        let mut a = hub.endpoint();
        let mut b = hub.endpoint();
        let mut c = hub.endpoint();

        a.send(&[TAG_SYNC, 1], Reliability::Reliable, Channel::EcsUpdate);
        assert!(a.receive().is_empty());
        let got_b = b.receive();
        let got_c = c.receive();
        assert_eq!(got_b.len(), 1);
        assert_eq!(got_b[0].class, FrameClass::StateSync);
        assert_eq!(got_b[0].peer, a.peer());
        assert_eq!(got_c.len(), 1);
    }

    #[test]
    fn test_send_to_targets_one_endpoint() {
        let hub = MemoryHub::new();
        let mut a = hub.endpoint();
        let mut b = hub.endpoint();
        let mut c = hub.endpoint();

        a.send_to(
            &[TAG_REQUEST, 2],
            b.peer(),
            Reliability::Reliable,
            Channel::EcsUpdate,
        );
        assert_eq!(b.receive().len(), 1);
        assert!(c.receive().is_empty());
    }

    #[test]
    fn test_receive_classifies_and_drops_unowned() {
        let hub = MemoryHub::new();
        let mut a = hub.endpoint();
        let mut b = hub.endpoint();

        a.send(&[TAG_PLAIN, 0], Reliability::Unreliable, Channel::Admin);
        a.send(&[0x01, 0], Reliability::Unreliable, Channel::Admin);
        let got = b.receive();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].class, FrameClass::Plain);
        assert!(b.receive().is_empty());
    }
}

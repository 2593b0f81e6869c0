//! NATS-backed transport.
//!
//! Bridges the asynchronous NATS client to the synchronous, tick-driven
//! replication core: subscriber tasks buffer arriving frames into a
//! channel that [`Transport::receive`] drains without blocking, and sends
//! are fire-and-forget publishes spawned onto the runtime.
//!
//! Core NATS is at-most-once, so the [`Reliability`] hint does not change
//! delivery here; it is honoured by transports that can.

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::NetError;
use crate::intent::classify;
use crate::subjects;
use crate::transport::{Channel, Incoming, PeerId, Reliability, Transport};

/// Default NATS server URL.
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// The environment variable used to override the NATS URL.
pub const NATS_URL_ENV: &str = "NATS_URL";

/// A [`Transport`] over a NATS cluster.
///
/// Each endpoint subscribes to every channel's broadcast subject plus its
/// own direct subject. Peer IDs must be unique and non-zero per cluster;
/// the sender's ID travels in a NATS header so broadcast frames can be
/// attributed and an endpoint's own publishes filtered out.
pub struct NatsTransport {
    client: async_nats::Client,
    peer: PeerId,
    handle: tokio::runtime::Handle,
    rx: mpsc::UnboundedReceiver<Incoming>,
}

impl NatsTransport {
    /// Connect using the URL from `NATS_URL`, falling back to
    /// [`DEFAULT_NATS_URL`].
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Connect`] if the connection cannot be
    /// established.
    pub async fn connect(peer: PeerId) -> Result<Self, NetError> {
        let url = std::env::var(NATS_URL_ENV).unwrap_or_else(|_| DEFAULT_NATS_URL.to_string());
        Self::connect_to(&url, peer).await
    }

    /// Connect to NATS at the specified URL.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Connect`] or [`NetError::Subscribe`] if setup
    /// fails.
    pub async fn connect_to(url: &str, peer: PeerId) -> Result<Self, NetError> {
        info!(url, peer, "connecting to NATS");
        let client = async_nats::connect(url).await?;
        let (tx, rx) = mpsc::unbounded_channel();

        let mut subject_names = vec![subjects::peer(peer)];
        for channel in [Channel::Admin, Channel::EcsUpdate, Channel::Simulation] {
            subject_names.push(subjects::frame(channel));
        }
        for subject in subject_names {
            let mut sub = client.subscribe(subject).await?;
            let tx = tx.clone();
            let own_peer = peer;
            tokio::spawn(async move {
                while let Some(msg) = sub.next().await {
                    let Some(class) = msg.payload.first().and_then(|&t| classify(t)) else {
                        debug!("dropping frame with unowned tag");
                        continue;
                    };
                    let sender: PeerId = msg
                        .headers
                        .as_ref()
                        .and_then(|h| h.get(subjects::headers::PEER))
                        .and_then(|v| v.as_str().parse().ok())
                        .unwrap_or(0);
                    if sender == own_peer {
                        continue; // our own broadcast echoed back
                    }
                    let incoming = Incoming {
                        class,
                        peer: sender,
                        bytes: msg.payload.to_vec(),
                    };
                    if tx.send(incoming).is_err() {
                        break;
                    }
                }
            });
        }

        info!("NATS connection established");
        Ok(Self {
            client,
            peer,
            handle: tokio::runtime::Handle::current(),
            rx,
        })
    }

    /// This endpoint's peer ID.
    #[must_use]
    pub fn peer(&self) -> PeerId {
        self.peer
    }

    fn publish(&self, subject: String, frame: &[u8]) {
        let client = self.client.clone();
        let mut headers = async_nats::HeaderMap::new();
        headers.insert(subjects::headers::PEER, self.peer.to_string());
        let payload = frame.to_vec();
        self.handle.spawn(async move {
            if let Err(e) = client
                .publish_with_headers(subject, headers, payload.into())
                .await
            {
                warn!(error = %e, "NATS publish failed");
            }
        });
    }
}

impl Transport for NatsTransport {
    fn send(&mut self, frame: &[u8], _reliability: Reliability, channel: Channel) {
        self.publish(subjects::frame(channel), frame);
    }

    fn send_to(&mut self, frame: &[u8], peer: PeerId, _reliability: Reliability, _channel: Channel) {
        self.publish(subjects::peer(peer), frame);
    }

    fn receive(&mut self) -> Vec<Incoming> {
        let mut out = Vec::new();
        while let Ok(incoming) = self.rx.try_recv() {
            out.push(incoming);
        }
        out
    }
}

impl std::fmt::Debug for NatsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsTransport")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

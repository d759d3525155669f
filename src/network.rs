//! In-process duplex links standing in for the peer transport.
//!
//! Frames are JSON strings pushed through unbounded channels, so delivery is
//! in order and lossless while a link is open. The host sees `open`, `data`
//! and `close` events on a single queue; each guest reads its own inbound
//! queue, which ends when the host drops the link. Every link gets a fresh
//! serial so a `close` can be matched to the connection it belongs to.

use crate::error::TransportError;
use crate::player::PeerId;
use crate::protocol::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// What the transport reports to the host.
#[derive(Debug)]
pub enum PeerEvent {
    Open {
        peer: PeerId,
        nickname: Option<String>,
        link: PeerLink,
    },
    Data {
        peer: PeerId,
        raw: String,
    },
    Close {
        peer: PeerId,
        serial: u64,
    },
}

/// Host-side handle for sending to one guest.
#[derive(Debug, Clone)]
pub struct PeerLink {
    peer: PeerId,
    serial: u64,
    tx: UnboundedSender<String>,
}

impl PeerLink {
    pub fn new(peer: PeerId, serial: u64, tx: UnboundedSender<String>) -> Self {
        Self { peer, serial, tx }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn send(&self, message: &Message) -> Result<(), TransportError> {
        let raw = message.encode()?;
        self.tx
            .send(raw)
            .map_err(|_| TransportError::Closed(self.peer.clone()))
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Guest-side handle for sending to the host. Dropping it closes the link.
#[derive(Debug)]
pub struct HostLink {
    me: PeerId,
    serial: u64,
    events: UnboundedSender<PeerEvent>,
}

impl HostLink {
    pub fn me(&self) -> &PeerId {
        &self.me
    }

    pub fn send(&self, message: &Message) -> Result<(), TransportError> {
        let raw = message.encode()?;
        self.events
            .send(PeerEvent::Data {
                peer: self.me.clone(),
                raw,
            })
            .map_err(|_| TransportError::Closed(self.me.clone()))
    }
}

impl Drop for HostLink {
    fn drop(&mut self) {
        debug!(peer = %self.me, "closing link to host");
        let _ = self.events.send(PeerEvent::Close {
            peer: self.me.clone(),
            serial: self.serial,
        });
    }
}

/// Opens a link from a new guest to the host listening on `host_events`.
pub fn connect(
    host_events: &UnboundedSender<PeerEvent>,
    guest: impl Into<PeerId>,
    nickname: Option<String>,
) -> Result<(HostLink, UnboundedReceiver<String>), TransportError> {
    let guest = guest.into();
    let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = unbounded_channel();
    host_events
        .send(PeerEvent::Open {
            peer: guest.clone(),
            nickname,
            link: PeerLink::new(guest.clone(), serial, tx),
        })
        .map_err(|_| TransportError::Closed(guest.clone()))?;
    Ok((
        HostLink {
            me: guest,
            serial,
            events: host_events.clone(),
        },
        rx,
    ))
}

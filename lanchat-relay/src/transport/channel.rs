//! In-process channel transport.
//!
//! Uses [`tokio::sync::mpsc`] channels in place of a network. Created via
//! [`ChannelTransport::new`], which also returns a [`ChannelHandle`]: the
//! handle injects inbound packet bodies and attaches per-endpoint inboxes
//! that collect whatever the relay sends to that endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use super::{Endpoint, Transport, TransportError};

type Inbound = Result<String, TransportError>;
type Outboxes = parking_lot::RwLock<HashMap<Endpoint, mpsc::UnboundedSender<String>>>;

/// Relay-side end of an in-process transport.
///
/// [`recv`](Transport::recv) yields bodies submitted through any
/// [`ChannelHandle`] and returns [`TransportError::Closed`] once every
/// handle has been dropped.
pub struct ChannelTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    outboxes: Arc<Outboxes>,
}

/// Participant-side end of an in-process transport.
#[derive(Clone)]
pub struct ChannelHandle {
    inbound: mpsc::UnboundedSender<Inbound>,
    outboxes: Arc<Outboxes>,
}

impl ChannelTransport {
    /// Create a transport and the handle that feeds it.
    #[must_use]
    pub fn new() -> (Self, ChannelHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let outboxes = Arc::new(Outboxes::default());
        let transport = Self {
            inbound: Mutex::new(rx),
            outboxes: Arc::clone(&outboxes),
        };
        let handle = ChannelHandle {
            inbound: tx,
            outboxes,
        };
        (transport, handle)
    }
}

impl ChannelHandle {
    /// Queue an inbound packet body for the relay.
    ///
    /// Returns `false` if the transport has been dropped.
    pub fn submit(&self, body: impl Into<String>) -> bool {
        self.inbound.send(Ok(body.into())).is_ok()
    }

    /// Make the relay's next receive fail with a recoverable error.
    pub fn fail_next(&self, reason: impl Into<String>) -> bool {
        self.inbound
            .send(Err(TransportError::Receive(reason.into())))
            .is_ok()
    }

    /// Bind an inbox to `endpoint`, replacing any previous one.
    pub fn attach(&self, endpoint: impl Into<Endpoint>) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outboxes.write().insert(endpoint.into(), tx);
        rx
    }

    /// Unbind `endpoint`. Returns `true` if an inbox was bound.
    pub fn detach(&self, endpoint: &Endpoint) -> bool {
        self.outboxes.write().remove(endpoint).is_some()
    }
}

impl Transport for ChannelTransport {
    async fn send(&self, endpoint: &Endpoint, body: &str) -> Result<(), TransportError> {
        let outbox = self.outboxes.read().get(endpoint).cloned();
        let Some(outbox) = outbox else {
            return Err(TransportError::UnknownEndpoint(endpoint.clone()));
        };
        if outbox.send(body.to_string()).is_err() {
            self.outboxes.write().remove(endpoint);
            return Err(TransportError::UnknownEndpoint(endpoint.clone()));
        }
        Ok(())
    }

    async fn recv(&self) -> Result<String, TransportError> {
        let mut rx = self.inbound.lock().await;
        rx.recv().await.unwrap_or(Err(TransportError::Closed))
    }
}

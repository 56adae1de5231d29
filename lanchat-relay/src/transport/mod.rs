//! Transport layer abstraction for the relay.
//!
//! Defines the [`Transport`] trait the relay core consumes. Concrete
//! implementations include:
//! - [`channel::ChannelTransport`] — in-process channel-based transport for
//!   tests and embedding
//! - [`ws::WsTransport`] — WebSocket server transport used by the binary

pub mod channel;
pub mod ws;

use std::fmt;

/// Opaque descriptor of where a participant receives packets.
///
/// The relay never parses it; it is stored at registration and handed back
/// to the transport unchanged when routing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    /// Create a new endpoint from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the string form of this endpoint.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Endpoint {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for Endpoint {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The inbound channel is gone and will never yield another packet.
    #[error("transport closed")]
    Closed,

    /// No connection is bound to the destination endpoint.
    #[error("endpoint {0} is unreachable")]
    UnknownEndpoint(Endpoint),

    /// A single receive failed; later receives may succeed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// An underlying I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Returns `true` if the transport cannot recover from this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Async transport trait for moving packet bodies to and from participants.
///
/// The transport never inspects the bodies it carries. Creating, naming and
/// tearing down the underlying channel is the transport's business; the
/// relay only sends and receives.
pub trait Transport: Send + Sync {
    /// Hand `body` off for delivery to `endpoint`.
    ///
    /// `Ok(())` means the body was accepted by the transport, not that the
    /// participant has read it.
    fn send(
        &self,
        endpoint: &Endpoint,
        body: &str,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Receive the next inbound packet body.
    ///
    /// Waits until a body arrives. Returns [`TransportError::Closed`] once no
    /// more bodies can ever arrive.
    fn recv(&self) -> impl std::future::Future<Output = Result<String, TransportError>> + Send;
}

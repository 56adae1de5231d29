//! Request routing: decides who receives a copy of each request.
//!
//! The [`Dispatcher`] reads the [`Registry`] to resolve recipients, builds
//! one outbound packet per delivery mode, and hands each copy to the
//! [`Transport`]. Delivery failures are logged and counted but never
//! reported back to the sender; the protocol has no acknowledgment channel.

use std::collections::HashSet;
use std::sync::Arc;

use lanchat_proto::{MessageKind, NULL_TOKEN, Packet, Request, join_targets};

use crate::registry::{Participant, Registry};
use crate::transport::{Endpoint, Transport};

/// Outcome counters for one dispatched request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Copies the transport accepted.
    pub delivered: usize,
    /// Copies the transport rejected.
    pub failed: usize,
    /// Recipients that were named but not registered.
    pub skipped: usize,
}

/// Routes requests to registered participants.
pub struct Dispatcher<T> {
    registry: Arc<Registry>,
    transport: Arc<T>,
    relay_endpoint: String,
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a dispatcher that stamps outbound packets with `relay_endpoint`.
    pub fn new(registry: Arc<Registry>, transport: Arc<T>, relay_endpoint: impl Into<String>) -> Self {
        Self {
            registry,
            transport,
            relay_endpoint: relay_endpoint.into(),
        }
    }

    /// The registry this dispatcher reads and mutates.
    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Routes one request and returns what happened to each copy.
    pub async fn dispatch(&self, request: Request) -> DispatchReport {
        let mut report = DispatchReport::default();
        match request {
            Request::Connect { alias, endpoint } => {
                if !self.registry.register(&alias, Endpoint::new(endpoint.as_str())) {
                    tracing::debug!(alias = %alias, "duplicate connect ignored");
                    return report;
                }
                tracing::info!(alias = %alias, endpoint = %endpoint, "participant connected");
                let peers = self.registry.all_except(&alias);
                self.notify(&alias, MessageKind::Connect, &peers, &mut report)
                    .await;
            }
            Request::Disconnect { alias, .. } => {
                if !self.registry.unregister(&alias) {
                    tracing::debug!(alias = %alias, "disconnect for unregistered alias ignored");
                    return report;
                }
                tracing::info!(alias = %alias, "participant disconnected");
                let remaining = self.registry.snapshot();
                self.notify(&alias, MessageKind::Disconnect, &remaining, &mut report)
                    .await;
            }
            Request::Private { from, to, text, .. } => {
                let packet = self.outbound(&from, MessageKind::Private, text, to.clone());
                match self.registry.lookup(&to) {
                    Some(endpoint) => {
                        self.deliver(&to, &endpoint, &packet.to_string(), &mut report)
                            .await;
                    }
                    None => {
                        tracing::debug!(from = %from, to = %to, "private recipient not registered");
                        report.skipped += 1;
                    }
                }
            }
            Request::Group { from, to, text, .. } => {
                let packet = self.outbound(&from, MessageKind::Group, text, join_targets(&to));
                let body = packet.to_string();
                let mut seen = HashSet::new();
                for alias in to.iter().filter(|alias| seen.insert(alias.as_str())) {
                    match self.registry.lookup(alias) {
                        Some(endpoint) => self.deliver(alias, &endpoint, &body, &mut report).await,
                        None => {
                            tracing::debug!(from = %from, to = %alias, "group member not registered");
                            report.skipped += 1;
                        }
                    }
                }
            }
            Request::Broadcast { from, text, .. } => {
                let packet =
                    self.outbound(&from, MessageKind::Broadcast, text, NULL_TOKEN.to_string());
                let body = packet.to_string();
                for peer in self.registry.all_except(&from) {
                    self.deliver(&peer.alias, &peer.endpoint, &body, &mut report)
                        .await;
                }
            }
        }
        report
    }

    /// Tells each of `recipients` that `subject` joined or left.
    async fn notify(
        &self,
        subject: &str,
        kind: MessageKind,
        recipients: &[Participant],
        report: &mut DispatchReport,
    ) {
        let body = self
            .outbound(subject, kind, NULL_TOKEN.to_string(), NULL_TOKEN.to_string())
            .to_string();
        for peer in recipients {
            self.deliver(&peer.alias, &peer.endpoint, &body, report)
                .await;
        }
    }

    /// Builds a packet sent from the relay on behalf of `alias`.
    fn outbound(&self, alias: &str, kind: MessageKind, payload: String, target: String) -> Packet {
        Packet {
            alias: alias.to_string(),
            kind,
            origin_endpoint: self.relay_endpoint.clone(),
            payload,
            target,
        }
    }

    async fn deliver(
        &self,
        alias: &str,
        endpoint: &Endpoint,
        body: &str,
        report: &mut DispatchReport,
    ) {
        match self.transport.send(endpoint, body).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::warn!(to = %alias, endpoint = %endpoint, error = %e, "delivery failed");
                report.failed += 1;
            }
        }
    }
}

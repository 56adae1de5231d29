//! The relay receive loop.
//!
//! [`RelayService::run`] pulls packet bodies from the transport, decodes
//! them, and dispatches each request on its own task so a large fan-out
//! never delays ingestion of the next packet. At most `max_in_flight`
//! dispatches run at once; the rest wait inside their task, not in the loop.
//! Waiting tasks are not capped: under a sustained flood the set of parked
//! tasks grows until permits free up, which keeps the loop from ever
//! applying backpressure to the transport.
//!
//! The loop ends on a `Shutdown` body, on [`ShutdownHandle::shutdown`], or
//! on a fatal transport error. In every case in-flight dispatches are
//! drained before `run` returns.

use std::sync::Arc;

use lanchat_proto::{SHUTDOWN_BODY, decode};
use tokio::sync::{Notify, Semaphore, watch};
use tokio::task::JoinSet;

use crate::dispatch::{DispatchReport, Dispatcher};
use crate::registry::Registry;
use crate::transport::{Transport, TransportError};

/// Default cap on concurrently running dispatches.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;

/// Lifecycle of the receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Constructed, `run` not yet called.
    Idle,
    /// Waiting for the next inbound body.
    Receiving,
    /// Decoding a body and starting its dispatch.
    Dispatching,
    /// The loop has exited and in-flight work has drained.
    Terminated,
}

/// Why a relay stopped gracefully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// A `Shutdown` body arrived on the transport.
    ShutdownPacket,
    /// [`ShutdownHandle::shutdown`] was called.
    Stopped,
}

/// Errors that end the relay non-gracefully.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The transport failed in a way it cannot recover from.
    #[error("transport failed: {0}")]
    Transport(#[source] TransportError),
}

/// Settings for a [`RelayService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Endpoint descriptor stamped on every packet the relay sends.
    pub relay_endpoint: String,
    /// Maximum number of dispatches running at once. Requests past the
    /// limit are still accepted and queue on the permit; `0` counts as `1`.
    pub max_in_flight: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            relay_endpoint: "lanchat-relay".to_string(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Asks a running [`RelayService`] to stop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    /// Request a stop. Takes effect even if the loop has not started yet.
    pub fn shutdown(&self) {
        self.notify.notify_one();
    }
}

/// The relay: one receive loop feeding a [`Dispatcher`].
pub struct RelayService<T> {
    transport: Arc<T>,
    dispatcher: Arc<Dispatcher<T>>,
    limiter: Arc<Semaphore>,
    stop: Arc<Notify>,
    state: watch::Sender<ServiceState>,
}

impl<T: Transport + 'static> RelayService<T> {
    /// Creates a relay over `transport` that routes with `registry`.
    pub fn new(transport: Arc<T>, registry: Arc<Registry>, config: ServiceConfig) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            Arc::clone(&transport),
            config.relay_endpoint,
        ));
        let (state, _) = watch::channel(ServiceState::Idle);
        Self {
            transport,
            dispatcher,
            limiter: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            stop: Arc::new(Notify::new()),
            state,
        }
    }

    /// Handle for stopping the loop from elsewhere.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            notify: Arc::clone(&self.stop),
        }
    }

    /// Watch the loop's [`ServiceState`].
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ServiceState> {
        self.state.subscribe()
    }

    /// The registry requests are routed against.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        self.dispatcher.registry()
    }

    /// Runs the receive loop until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Transport`] if the transport reports a fatal
    /// error. In-flight dispatches are still drained first.
    pub async fn run(self) -> Result<ExitReason, ServiceError> {
        let mut tasks: JoinSet<DispatchReport> = JoinSet::new();
        tracing::info!("relay receive loop started");

        let outcome = loop {
            self.state.send_replace(ServiceState::Receiving);
            reap(&mut tasks);

            let received = tokio::select! {
                biased;
                () = self.stop.notified() => break Ok(ExitReason::Stopped),
                received = self.transport.recv() => received,
            };

            let body = match received {
                Ok(body) => body,
                Err(e) if e.is_fatal() => break Err(ServiceError::Transport(e)),
                Err(e) => {
                    tracing::warn!(error = %e, "receive failed, continuing");
                    continue;
                }
            };

            self.state.send_replace(ServiceState::Dispatching);

            if body == SHUTDOWN_BODY {
                break Ok(ExitReason::ShutdownPacket);
            }

            let request = match decode(&body) {
                Ok(packet) => packet.into_request(),
                Err(e) => {
                    tracing::warn!(error = %e, body = %body, "dropping undecodable packet");
                    continue;
                }
            };

            tracing::debug!(kind = %request.kind(), from = %request.sender(), "dispatching request");
            let dispatcher = Arc::clone(&self.dispatcher);
            let limiter = Arc::clone(&self.limiter);
            tasks.spawn(async move {
                let Ok(_permit) = limiter.acquire_owned().await else {
                    return DispatchReport::default();
                };
                dispatcher.dispatch(request).await
            });
        };

        match &outcome {
            Ok(ExitReason::ShutdownPacket) => tracing::info!("shutdown packet received"),
            Ok(ExitReason::Stopped) => tracing::info!("stop requested"),
            Err(e) => tracing::error!(error = %e, "fatal transport failure, relay stopping"),
        }

        let pending = tasks.len();
        if pending > 0 {
            tracing::info!(pending, "draining in-flight dispatches");
        }
        while let Some(joined) = tasks.join_next().await {
            log_joined(joined);
        }

        self.state.send_replace(ServiceState::Terminated);
        tracing::info!("relay receive loop terminated");
        outcome
    }
}

/// Collects dispatches that have already finished.
fn reap(tasks: &mut JoinSet<DispatchReport>) {
    while let Some(joined) = tasks.try_join_next() {
        log_joined(joined);
    }
}

fn log_joined(joined: Result<DispatchReport, tokio::task::JoinError>) {
    match joined {
        Ok(report) => tracing::debug!(
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "dispatch finished"
        ),
        Err(e) => tracing::error!(error = %e, "dispatch task failed"),
    }
}

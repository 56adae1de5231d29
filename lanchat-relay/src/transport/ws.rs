//! WebSocket transport: an axum server participants connect to.
//!
//! Each participant opens `GET /ws?endpoint=<id>`. The `endpoint` query
//! parameter names the connection; it is the value participants put in the
//! `originEndpoint` field of their packets, and the value the relay hands
//! back to [`Transport::send`] when routing to them. Text frames from any
//! connection are queued as inbound packet bodies.
//!
//! Once the server task ends, for any reason including an abort,
//! [`Transport::recv`] returns [`TransportError::Closed`] after the bodies
//! already queued have been handed out.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, RwLock, mpsc, watch};

use super::{Endpoint, Transport, TransportError};

/// Connection table shared by the axum handlers and the transport.
struct WsState {
    /// Maps an endpoint to the channel feeding its WebSocket writer.
    connections: RwLock<HashMap<Endpoint, mpsc::UnboundedSender<Message>>>,
    /// Inbound packet bodies from every connection.
    inbound: mpsc::UnboundedSender<String>,
}

impl WsState {
    /// Binds `endpoint` to a connection, returning the sender it replaced.
    async fn bind(
        &self,
        endpoint: &Endpoint,
        sender: mpsc::UnboundedSender<Message>,
    ) -> Option<mpsc::UnboundedSender<Message>> {
        let mut conns = self.connections.write().await;
        conns.insert(endpoint.clone(), sender)
    }

    /// Unbinds `endpoint` only if it is still bound to `sender`.
    async fn unbind_if_current(
        &self,
        endpoint: &Endpoint,
        sender: &mpsc::UnboundedSender<Message>,
    ) {
        let mut conns = self.connections.write().await;
        if conns.get(endpoint).is_some_and(|s| s.same_channel(sender)) {
            conns.remove(endpoint);
        }
    }

    async fn get_sender(&self, endpoint: &Endpoint) -> Option<mpsc::UnboundedSender<Message>> {
        let conns = self.connections.read().await;
        conns.get(endpoint).cloned()
    }
}

/// Relay-side WebSocket transport.
pub struct WsTransport {
    state: Arc<WsState>,
    inbound: Mutex<mpsc::UnboundedReceiver<String>>,
    /// Resolves with an error once the server task has dropped its sender.
    server_alive: watch::Receiver<()>,
}

impl WsTransport {
    /// Starts the WebSocket server on `addr`.
    ///
    /// Returns the transport, the bound address (useful with port `0`), and
    /// the join handle of the server task.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the TCP listener cannot bind.
    pub async fn bind(
        addr: &str,
    ) -> Result<(Self, SocketAddr, tokio::task::JoinHandle<()>), TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(WsState {
            connections: RwLock::new(HashMap::new()),
            inbound: tx,
        });

        let app = axum::Router::new()
            .route("/ws", axum::routing::get(ws_handler))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        let (alive_tx, alive_rx) = watch::channel(());
        let handle = tokio::spawn(async move {
            // Dropped with the task, which closes the transport.
            let _alive = alive_tx;
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "websocket server error");
            }
            tracing::warn!("websocket server stopped");
        });

        let transport = Self {
            state,
            inbound: Mutex::new(rx),
            server_alive: alive_rx,
        };
        Ok((transport, bound_addr, handle))
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.state.connections.read().await.len()
    }

    /// Send a Close frame to every connection.
    ///
    /// Each writer task forwards the frame and the client sees the
    /// connection end. Used on relay shutdown.
    pub async fn close_all(&self) {
        let conns = self.state.connections.read().await;
        for (endpoint, sender) in conns.iter() {
            tracing::info!(endpoint = %endpoint, "sending close frame");
            let _ = sender.send(Message::Close(None));
        }
    }
}

impl Transport for WsTransport {
    async fn send(&self, endpoint: &Endpoint, body: &str) -> Result<(), TransportError> {
        let Some(sender) = self.state.get_sender(endpoint).await else {
            return Err(TransportError::UnknownEndpoint(endpoint.clone()));
        };
        if sender.send(Message::Text(body.to_string().into())).is_err() {
            self.state.unbind_if_current(endpoint, &sender).await;
            return Err(TransportError::UnknownEndpoint(endpoint.clone()));
        }
        Ok(())
    }

    async fn recv(&self) -> Result<String, TransportError> {
        let mut rx = self.inbound.lock().await;
        let mut server_alive = self.server_alive.clone();
        tokio::select! {
            biased;
            body = rx.recv() => body.ok_or(TransportError::Closed),
            // No value is ever sent; `changed` only returns once the sender is gone.
            _ = server_alive.changed() => Err(TransportError::Closed),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ConnectParams {
    endpoint: String,
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<WsState>>,
) -> Response {
    if params.endpoint.is_empty() {
        return (StatusCode::BAD_REQUEST, "endpoint must not be empty").into_response();
    }
    let endpoint = Endpoint::new(params.endpoint);
    ws.on_upgrade(move |socket| handle_socket(socket, endpoint, state))
}

/// Handles an upgraded WebSocket connection bound to `endpoint`.
///
/// The connection lifecycle:
/// 1. Bind the endpoint to this connection's writer channel.
/// 2. Forward channel messages to the socket on a writer task.
/// 3. Queue inbound text frames as packet bodies on a reader task.
/// 4. When either task ends, unbind the endpoint.
async fn handle_socket(socket: WebSocket, endpoint: Endpoint, state: Arc<WsState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    if state.bind(&endpoint, tx.clone()).await.is_some() {
        tracing::info!(endpoint = %endpoint, "replaced existing connection");
    }
    tracing::info!(endpoint = %endpoint, "connection bound");

    let writer_endpoint = endpoint.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(endpoint = %writer_endpoint, "websocket write failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let reader_endpoint = endpoint.clone();
    let inbound = state.inbound.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            let body = match msg {
                Message::Text(text) => text.as_str().to_owned(),
                Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::warn!(endpoint = %reader_endpoint, error = %e, "dropping non-UTF-8 frame");
                        continue;
                    }
                },
                Message::Close(_) => {
                    tracing::info!(endpoint = %reader_endpoint, "received close frame");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => continue,
            };
            if inbound.send(body).is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.unbind_if_current(&endpoint, &tx).await;
    tracing::info!(endpoint = %endpoint, "connection closed");
}

//! WebSocket connection handling
//!
//! Each connection gets a fresh session id and is driven by its own task.
//! Frames are handled one at a time, so an admin sees replies in the order
//! it sent commands.

use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use hyper_tungstenite::WebSocketStream;
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::admin::{AdminChannel, AdminResponse};
use crate::server::http::{json_response, AppState};
use crate::server::{Envelope, Role};
use crate::session::{self, DISCONNECT};

/// WebSocket type after upgrade
pub type HyperWebSocket = WebSocketStream<TokioIo<hyper::upgrade::Upgraded>>;

/// Shared write half of a connection
pub type WsSink = Arc<Mutex<SplitSink<HyperWebSocket, WsMessage>>>;

/// Admin channel backed by a live WebSocket
pub struct WsAdminChannel {
    session_id: String,
    sink: WsSink,
}

impl WsAdminChannel {
    pub fn new(session_id: String, sink: WsSink) -> Self {
        Self { session_id, sink }
    }
}

#[async_trait::async_trait]
impl AdminChannel for WsAdminChannel {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn emit(&self, response: AdminResponse) {
        let envelope = Envelope::new(response.event(), response.payload());
        let message = match envelope.to_message() {
            Ok(message) => message,
            Err(e) => {
                error!(admin = %self.session_id, "Failed to encode response: {}", e);
                return;
            }
        };

        if let Err(e) = self.sink.lock().await.send(message).await {
            warn!(admin = %self.session_id, "Failed to send response: {}", e);
        }
    }
}

/// Upgrade the request and spawn the connection task
pub fn upgrade(state: Arc<AppState>, role: Role, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let (response, websocket) = match hyper_tungstenite::upgrade(req, None) {
        Ok(upgrade) => upgrade,
        Err(e) => {
            error!("WebSocket upgrade failed: {}", e);
            return json_response(
                StatusCode::BAD_REQUEST,
                r#"{"error":"WebSocket upgrade failed"}"#.to_string(),
            );
        }
    };

    tokio::spawn(async move {
        match websocket.await {
            Ok(ws) => handle_connection(ws, role, state).await,
            Err(e) => error!("WebSocket connection failed: {}", e),
        }
    });

    let (parts, _body) = response.into_parts();
    Response::from_parts(parts, Full::new(Bytes::new()))
}

async fn handle_connection(ws: HyperWebSocket, role: Role, state: Arc<AppState>) {
    let session_id = session::new_session_id();
    let (sender, mut receiver) = ws.split();
    let sink: WsSink = Arc::new(Mutex::new(sender));
    let admin = WsAdminChannel::new(session_id.clone(), Arc::clone(&sink));

    info!(session = %session_id, "{} connected", role);

    let mut announced_disconnect = false;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => {
                let envelope = match Envelope::decode(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!(session = %session_id, "Ignoring malformed frame: {}", e);
                        continue;
                    }
                };

                match role {
                    Role::Disciple => {
                        state
                            .sessions
                            .on_event(&session_id, &envelope.event, &envelope.data)
                            .await;
                        if envelope.event == DISCONNECT {
                            announced_disconnect = true;
                            break;
                        }
                    }
                    Role::Admin => {
                        state
                            .dispatcher
                            .dispatch(&admin, &envelope.event, &envelope.data)
                            .await;
                    }
                }
            }
            Ok(WsMessage::Ping(data)) => {
                if sink.lock().await.send(WsMessage::Pong(data)).await.is_err() {
                    break;
                }
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => debug!(session = %session_id, "Ignoring non-text frame"),
            Err(e) => {
                warn!(session = %session_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    if role == Role::Disciple && !announced_disconnect {
        state.sessions.disconnected(&session_id).await;
    }

    let _ = sink.lock().await.close().await;
    info!(session = %session_id, "{} disconnected", role);
}

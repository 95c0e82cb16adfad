//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo; every request other than the health probe
//! is expected to be a WebSocket upgrade.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::admin::AdminDispatcher;
use crate::config::Args;
use crate::registry::{DiscipleRegistry, ModelRegistry};
use crate::server::{websocket, Role};
use crate::session::SessionManager;
use crate::types::Result;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Disciple transport events
    pub sessions: SessionManager,
    /// Admin command routing
    pub dispatcher: AdminDispatcher,
}

impl AppState {
    pub fn new(args: Args, disciples: DiscipleRegistry, models: ModelRegistry) -> Self {
        Self {
            args,
            sessions: SessionManager::new(disciples.clone()),
            dispatcher: AdminDispatcher::new(disciples, models),
        }
    }

    fn store_kind(&self) -> &'static str {
        if self.args.memory_store {
            "memory"
        } else {
            "mongodb"
        }
    }
}

/// Bind the configured listeners and serve until an accept loop fails
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let disciple_addr = state.args.disciple_addr();
    let disciples = TcpListener::bind(disciple_addr).await?;
    info!("Disciple listener on {}", disciple_addr);

    let Some(admin_addr) = state.args.admin_addr() else {
        info!("Admin listener disabled (no admin port configured)");
        return serve(disciples, Role::Disciple, state).await;
    };

    let admin = TcpListener::bind(admin_addr).await?;
    info!("Admin listener on {}", admin_addr);

    tokio::try_join!(
        serve(disciples, Role::Disciple, Arc::clone(&state)),
        serve(admin, Role::Admin, state),
    )?;
    Ok(())
}

/// Accept loop for one listener
pub async fn serve(listener: TcpListener, role: Role, state: Arc<AppState>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, role, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        error!("Error serving {} connection from {}: {:?}", role, addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting {} connection: {:?}", role, e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    role: Role,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    debug!("{} {} from {} ({})", req.method(), req.uri().path(), addr, role);

    if req.method() == Method::GET && req.uri().path() == "/health" {
        return Ok(health_check(&state, role));
    }

    if hyper_tungstenite::is_upgrade_request(&req) {
        return Ok(websocket::upgrade(state, role, req));
    }

    Ok(json_response(
        StatusCode::BAD_REQUEST,
        r#"{"error":"WebSocket upgrade required"}"#.to_string(),
    ))
}

/// Liveness probe: always 200 while the process runs
fn health_check(state: &AppState, role: Role) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "status": "ok",
        "service": "disciple-server",
        "version": env!("CARGO_PKG_VERSION"),
        "listener": role.as_str(),
        "store": state.store_kind(),
    });
    json_response(StatusCode::OK, body.to_string())
}

pub(crate) fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

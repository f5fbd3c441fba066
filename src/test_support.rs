// =============================================================================
// In-process mock upstreams for tests
// =============================================================================
//
// * `spawn_rest_upstream` — axum app answering `/products/:ticker/candles`
//   with a canned reply and recording every request it sees.
// * `spawn_ws_upstream` — raw tokio-tungstenite server standing in for the
//   exchange feed. Each accepted connection is handed to the test as an
//   `UpstreamConn` after its first (subscribe) frame arrives.
// * `spawn_relay` — the real router bound to an ephemeral port.
// =============================================================================

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{accept_async, tungstenite::Message};

use crate::app_state::AppState;
use crate::runtime_config::RelayConfig;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// REST upstream
// =============================================================================

#[derive(Debug, Clone)]
pub enum RestReply {
    Json(serde_json::Value),
    Status(u16, String),
    Raw(String),
}

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub ticker: String,
    pub granularity: Option<String>,
}

#[derive(Clone)]
struct RestMockState {
    reply: RestReply,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

pub struct RestUpstream {
    addr: SocketAddr,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl RestUpstream {
    pub fn base_url(&self) -> String {
        format!("http://{}/products", self.addr)
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().clone()
    }
}

pub async fn spawn_rest_upstream(reply: RestReply) -> RestUpstream {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let state = RestMockState {
        reply,
        seen: seen.clone(),
    };

    let app = Router::new()
        .route("/products/:ticker/candles", get(candles))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    RestUpstream { addr, seen }
}

async fn candles(
    State(state): State<RestMockState>,
    Path(ticker): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.seen.lock().push(SeenRequest {
        ticker,
        granularity: params.get("granularity").cloned(),
    });

    match state.reply {
        RestReply::Json(body) => axum::Json(body).into_response(),
        RestReply::Status(code, body) => {
            (StatusCode::from_u16(code).unwrap(), body).into_response()
        }
        RestReply::Raw(body) => (StatusCode::OK, body).into_response(),
    }
}

// =============================================================================
// Streaming upstream
// =============================================================================

/// One accepted upstream connection, as seen from the mock exchange.
pub struct UpstreamConn {
    /// The first frame the relay sent, parsed as JSON.
    pub subscribe: serde_json::Value,
    outbound: mpsc::UnboundedSender<Message>,
    closed: oneshot::Receiver<()>,
}

impl UpstreamConn {
    pub fn send_text(&self, text: &str) {
        self.outbound.send(Message::Text(text.to_string())).unwrap();
    }

    pub fn send_close(&self) {
        self.outbound.send(Message::Close(None)).unwrap();
    }

    /// Resolves once the relay side has closed or dropped the connection.
    pub async fn wait_closed(self) {
        tokio::time::timeout(TEST_TIMEOUT, self.closed)
            .await
            .expect("upstream connection was not closed in time")
            .expect("mock connection task ended without signalling");
    }
}

pub struct WsUpstream {
    addr: SocketAddr,
    conns: mpsc::UnboundedReceiver<UpstreamConn>,
}

impl WsUpstream {
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn next_connection(&mut self) -> UpstreamConn {
        tokio::time::timeout(TEST_TIMEOUT, self.conns.recv())
            .await
            .expect("no upstream connection arrived in time")
            .expect("mock upstream listener stopped")
    }
}

pub async fn spawn_ws_upstream() -> WsUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let conn_tx = conn_tx.clone();
            tokio::spawn(async move {
                let Ok(ws) = accept_async(tcp).await else {
                    return;
                };
                let (mut tx, mut rx) = ws.split();

                let subscribe = match rx.next().await {
                    Some(Ok(Message::Text(text))) => serde_json::from_str(&text).unwrap(),
                    _ => return,
                };

                let (outbound, mut outbound_rx) = mpsc::unbounded_channel();
                let (closed_tx, closed) = oneshot::channel();
                if conn_tx
                    .send(UpstreamConn {
                        subscribe,
                        outbound,
                        closed,
                    })
                    .is_err()
                {
                    return;
                }

                // Only the relay side ending the connection fires `closed`;
                // a dropped test handle merely stops outbound traffic.
                let mut outbound_open = true;
                loop {
                    tokio::select! {
                        cmd = outbound_rx.recv(), if outbound_open => match cmd {
                            Some(msg) => {
                                if tx.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            None => outbound_open = false,
                        },
                        frame = rx.next() => match frame {
                            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                            Some(Ok(_)) => {}
                        },
                    }
                }
                let _ = closed_tx.send(());
            });
        }
    });

    WsUpstream {
        addr,
        conns: conn_rx,
    }
}

// =============================================================================
// Relay under test
// =============================================================================

pub async fn spawn_relay(config: RelayConfig) -> SocketAddr {
    let state = AppState::new(config).unwrap();
    let app = crate::api::rest::router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

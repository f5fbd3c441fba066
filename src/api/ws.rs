// =============================================================================
// WebSocket Relay — one upstream feed per downstream client
// =============================================================================
//
// Clients connect to `/ws` and receive unsolicited `TickerPacket` text frames.
// Per connection:
//   1. Connecting — open the upstream feed and send the subscribe message.
//   2. Streaming  — `tokio::select!` over both sockets; ticker events are
//      stamped and forwarded in arrival order, everything else is dropped.
//   3. Closed     — on downstream close, upstream close, or any fault. The
//      upstream socket gets a close handshake on every path.
//
// Client frames are only read to notice disconnects; pings are answered by
// axum itself.
// There is no reconnect: an upstream failure ends the client session.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::coinbase::feed::{self, UpstreamSocket};
use crate::coinbase::UpstreamEvent;
use crate::error::RelayError;
use crate::types::{RelayExit, RelayPhase};

type DownstreamTx = SplitSink<WebSocket, Message>;
type DownstreamRx = SplitStream<WebSocket>;

// =============================================================================
// WebSocket upgrade handler
// =============================================================================

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let session = Uuid::new_v4();
    info!(%session, "downstream connection accepted — upgrading");
    ws.on_upgrade(move |socket| {
        handle_ws_connection(socket, state).instrument(info_span!("relay", %session))
    })
}

// =============================================================================
// Connection handler
// =============================================================================

async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    match run_relay(socket, &state).await {
        Ok(RelayExit::DownstreamClosed) => info!("downstream disconnected"),
        Ok(exit) => info!(%exit, "relay ended"),
        Err(e) if e.is_transport() => warn!(error = %e, "relay ended on transport fault"),
        Err(e) => warn!(error = %e, "relay ended on protocol fault"),
    }
}

/// Drive one relay session to completion.
///
/// The upstream socket lives entirely inside this call and is closed before
/// it returns, whatever the outcome.
async fn run_relay(downstream: WebSocket, state: &AppState) -> Result<RelayExit, RelayError> {
    let (mut down_tx, mut down_rx) = downstream.split();
    let subscribe = state.subscribe_request().to_json()?;

    debug!(phase = %RelayPhase::Connecting, url = %state.config.ws_url, "opening upstream feed");
    let result = match feed::connect(&state.config.ws_url).await {
        Ok(mut upstream) => {
            let result = match upstream.send(UpstreamMessage::Text(subscribe)).await {
                Ok(()) => {
                    info!(
                        phase = %RelayPhase::Streaming,
                        products = ?state.config.product_ids,
                        channels = ?state.config.channels,
                        "subscribed upstream"
                    );
                    pump(&mut upstream, &mut down_tx, &mut down_rx).await
                }
                Err(e) => Err(RelayError::UpstreamTransport(e)),
            };
            if let Err(e) = upstream.close(None).await {
                debug!(error = %e, "upstream close handshake skipped");
            }
            result
        }
        Err(e) => Err(e),
    };

    // Tell a still-connected client why the stream stopped.
    if !matches!(result, Ok(RelayExit::DownstreamClosed)) {
        let frame = match &result {
            Ok(_) => CloseFrame {
                code: close_code::AWAY,
                reason: "upstream feed closed".into(),
            },
            Err(_) => CloseFrame {
                code: close_code::ERROR,
                reason: "upstream feed failed".into(),
            },
        };
        if let Err(e) = down_tx.send(Message::Close(Some(frame))).await {
            debug!(error = %e, "downstream already gone");
        }
    }

    debug!(phase = %RelayPhase::Closed, "relay finished");
    result
}

/// Forward ticker events until either side ends the session.
async fn pump(
    upstream: &mut UpstreamSocket,
    down_tx: &mut DownstreamTx,
    down_rx: &mut DownstreamRx,
) -> Result<RelayExit, RelayError> {
    loop {
        tokio::select! {
            // ── Upstream: classify and forward ──────────────────────────
            frame = upstream.next() => {
                match frame {
                    Some(Ok(UpstreamMessage::Text(text))) => match feed::parse_event(&text)? {
                        UpstreamEvent::Ticker(packet) => {
                            let json = serde_json::to_string(&packet)?;
                            down_tx
                                .send(Message::Text(json))
                                .await
                                .map_err(RelayError::DownstreamTransport)?;
                            trace!(ticker = %packet.ticker, price = packet.price, "ticker relayed");
                        }
                        UpstreamEvent::Subscriptions => debug!("upstream confirmed subscriptions"),
                        UpstreamEvent::Error(message) => {
                            return Err(RelayError::UpstreamRejected(message));
                        }
                        UpstreamEvent::Other(kind) => trace!(kind = %kind, "upstream event ignored"),
                    },
                    Some(Ok(UpstreamMessage::Close(frame))) => {
                        info!(frame = ?frame, "upstream sent Close frame");
                        return Ok(RelayExit::UpstreamClosed);
                    }
                    // Ping/Pong are handled by tungstenite; binary is unused.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(RelayError::UpstreamTransport(e)),
                    None => return Ok(RelayExit::UpstreamClosed),
                }
            }

            // ── Downstream: disconnect detection only ───────────────────
            frame = down_rx.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => return Ok(RelayExit::DownstreamClosed),
                    // axum queues the Pong itself and flushes it on the next read.
                    Some(Ok(Message::Ping(_))) => trace!("downstream ping"),
                    Some(Ok(_)) => debug!("downstream message ignored"),
                    Some(Err(e)) => return Err(RelayError::DownstreamTransport(e)),
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

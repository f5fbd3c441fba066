// =============================================================================
// Coinbase streaming feed — subscribe message and event classification
// =============================================================================

use anyhow::Context;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::info;

use crate::error::RelayError;
use crate::runtime_config::RelayConfig;
use crate::types::TickerPacket;

pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Kind reported for upstream objects that carry no `type` tag.
pub const UNTYPED: &str = "<untyped>";

/// `{"type":"subscribe","product_ids":[..],"channels":[..]}`
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    #[serde(rename = "type")]
    kind: &'static str,
    pub product_ids: Vec<String>,
    pub channels: Vec<String>,
}

impl SubscribeRequest {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            kind: "subscribe",
            product_ids: config.product_ids.clone(),
            channels: config.channels.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One upstream text frame, classified by its `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    Ticker(TickerPacket),
    Subscriptions,
    Error(String),
    Other(String),
}

/// Open the upstream feed. Only the handshake is performed here; the caller
/// sends the subscribe message.
pub async fn connect(url: &str) -> Result<UpstreamSocket, RelayError> {
    let (socket, _response) = connect_async(url)
        .await
        .map_err(RelayError::UpstreamConnect)?;
    info!(url = %url, "upstream feed connected");
    Ok(socket)
}

/// Classify an upstream text frame. Ticker events are stamped with the
/// relay's wall clock at this point.
pub fn parse_event(text: &str) -> Result<UpstreamEvent, RelayError> {
    let root: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| RelayError::Protocol(format!("upstream frame is not JSON: {e}")))?;

    if !root.is_object() {
        return Err(RelayError::Protocol("upstream frame is not a JSON object".into()));
    }

    // Untyped objects are not ticker events; they are skipped like any other.
    let Some(kind) = root["type"].as_str() else {
        return Ok(UpstreamEvent::Other(UNTYPED.to_string()));
    };

    match kind {
        "ticker" => {
            let ticker = root["product_id"]
                .as_str()
                .ok_or_else(|| RelayError::Protocol("ticker event missing product_id".into()))?;
            let price = parse_price(&root["price"])
                .with_context(|| format!("ticker event for {ticker} has no usable price"))
                .map_err(|e| RelayError::Protocol(format!("{e:#}")))?;
            Ok(UpstreamEvent::Ticker(TickerPacket::stamped(ticker, price)))
        }
        "subscriptions" => Ok(UpstreamEvent::Subscriptions),
        "error" => {
            let message = root["message"].as_str().unwrap_or("unknown error");
            let reason = root["reason"].as_str();
            Ok(UpstreamEvent::Error(match reason {
                Some(reason) => format!("{message}: {reason}"),
                None => message.to_string(),
            }))
        }
        other => Ok(UpstreamEvent::Other(other.to_string())),
    }
}

/// Coinbase sends prices as decimal strings.
fn parse_price(val: &serde_json::Value) -> anyhow::Result<f64> {
    let price = match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse price {s:?}"))?,
        serde_json::Value::Number(n) => n.as_f64().context("price is not a valid f64")?,
        _ => anyhow::bail!("price has unexpected JSON type"),
    };
    if !price.is_finite() {
        anyhow::bail!("price is not finite");
    }
    Ok(price)
}

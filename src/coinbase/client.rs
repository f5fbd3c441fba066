// =============================================================================
// Coinbase REST candle client
// =============================================================================
//
// One `reqwest::Client` is built at startup and owned by `AppState`; every
// `/history/{ticker}` request borrows it. No caching, no retry.
//
// Upstream candle rows are positional:
//   [0] time, [1] low, [2] high, [3] open, [4] close, [5] volume
// and arrive newest-first.
// =============================================================================

use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::error::HistoryError;
use crate::runtime_config::RelayConfig;
use crate::types::Candle;

const MAX_TICKER_LEN: usize = 32;
const MAX_ERROR_BODY_LEN: usize = 256;

/// REST client for the upstream `/products/{ticker}/candles` endpoint.
#[derive(Clone)]
pub struct CandleClient {
    base_url: String,
    granularity_secs: u32,
    limit: usize,
    client: reqwest::Client,
}

impl CandleClient {
    pub fn new(config: &RelayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .context("failed to build upstream HTTP client")?;

        debug!(base_url = %config.rest_base_url, "CandleClient initialised");

        Ok(Self {
            base_url: config.rest_base_url.trim_end_matches('/').to_string(),
            granularity_secs: config.candle_granularity_secs,
            limit: config.history_limit,
            client,
        })
    }

    /// GET `{base}/{ticker}/candles?granularity=N`, normalised oldest-first.
    #[instrument(skip(self), name = "coinbase::fetch_history")]
    pub async fn fetch_history(&self, ticker: &str) -> Result<Vec<Candle>, HistoryError> {
        validate_ticker(ticker)?;

        let url = format!("{}/{}/candles", self.base_url, ticker);
        let resp = self
            .client
            .get(&url)
            .query(&[("granularity", self.granularity_secs)])
            .send()
            .await
            .map_err(HistoryError::UpstreamUnavailable)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(HistoryError::UnknownTicker(ticker.to_string()));
        }
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            truncate_at_char_boundary(&mut body, MAX_ERROR_BODY_LEN);
            return Err(HistoryError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(HistoryError::UpstreamUnavailable)?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| HistoryError::MalformedPayload(format!("invalid JSON: {e}")))?;

        let candles = parse_candles(&body, self.limit)?;
        debug!(ticker, count = candles.len(), "candles fetched");
        Ok(candles)
    }
}

/// Tickers are interpolated into the upstream path, so only symbol-shaped
/// strings are let through.
pub fn validate_ticker(ticker: &str) -> Result<(), HistoryError> {
    let well_formed = !ticker.is_empty()
        && ticker.len() <= MAX_TICKER_LEN
        && ticker.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if well_formed {
        Ok(())
    } else {
        Err(HistoryError::InvalidTicker(ticker.to_string()))
    }
}

/// Reshape the upstream array-of-arrays payload.
///
/// Takes the first `limit` rows (the newest, since upstream is newest-first),
/// maps them positionally and returns them oldest-first.
pub fn parse_candles(body: &serde_json::Value, limit: usize) -> Result<Vec<Candle>, HistoryError> {
    let rows = body
        .as_array()
        .ok_or_else(|| HistoryError::MalformedPayload("candles response is not an array".into()))?;

    let mut candles = rows
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, row)| parse_row(i, row))
        .collect::<Result<Vec<_>, _>>()?;

    candles.reverse();
    // Stable; a no-op for a well-ordered upstream.
    candles.sort_by_key(|c| c.time);
    Ok(candles)
}

fn parse_row(index: usize, row: &serde_json::Value) -> Result<Candle, HistoryError> {
    let arr = row
        .as_array()
        .ok_or_else(|| HistoryError::MalformedPayload(format!("candle {index} is not an array")))?;

    if arr.len() < 5 {
        return Err(HistoryError::MalformedPayload(format!(
            "candle {index} has {} fields, expected at least 5",
            arr.len()
        )));
    }

    let time = arr[0]
        .as_i64()
        .or_else(|| arr[0].as_f64().map(|t| t as i64))
        .ok_or_else(|| HistoryError::MalformedPayload(format!("candle {index} has no time")))?;

    Ok(Candle {
        time,
        low: number_field(&arr[1], index, "low")?,
        high: number_field(&arr[2], index, "high")?,
        open: number_field(&arr[3], index, "open")?,
        close: number_field(&arr[4], index, "close")?,
    })
}

/// Upstream sends numbers, but numeric strings are tolerated too.
fn number_field(val: &serde_json::Value, index: usize, name: &str) -> Result<f64, HistoryError> {
    let parsed = match val {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        HistoryError::MalformedPayload(format!("candle {index} field {name} is not numeric: {val}"))
    })
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

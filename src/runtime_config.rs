// =============================================================================
// Relay Configuration — JSON file + environment overrides
// =============================================================================
//
// Every tunable lives here: listen address, upstream endpoints, and the
// instrument/channel subscription the relay sends upstream. All fields carry
// `#[serde(default)]` so a partial (or empty) JSON file still loads.
//
// Precedence: defaults < JSON file < environment variables.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Candle granularities (seconds) accepted by the upstream REST endpoint.
pub const SUPPORTED_GRANULARITIES: &[u32] = &[60, 300, 900, 3600, 21600, 86400];

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_ws_url() -> String {
    "wss://ws-feed.exchange.coinbase.com".to_string()
}

fn default_rest_base_url() -> String {
    "https://api.exchange.coinbase.com/products".to_string()
}

fn default_product_ids() -> Vec<String> {
    vec![
        "BTC-USD".to_string(),
        "ETH-USD".to_string(),
        "SOL-USD".to_string(),
    ]
}

fn default_channels() -> Vec<String> {
    vec!["ticker".to_string()]
}

fn default_candle_granularity_secs() -> u32 {
    60
}

fn default_history_limit() -> usize {
    100
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("ticker-relay/{}", env!("CARGO_PKG_VERSION"))
}

// =============================================================================
// RelayConfig
// =============================================================================

/// Top-level configuration for the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    // --- Server -------------------------------------------------------------

    /// Address the HTTP/WebSocket server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    // --- Upstream -----------------------------------------------------------

    /// Exchange streaming feed URL.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Exchange REST products URL; candles live at `{rest_base_url}/{ticker}/candles`.
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,

    /// Instruments named in the upstream subscribe message.
    #[serde(default = "default_product_ids")]
    pub product_ids: Vec<String>,

    /// Channels named in the upstream subscribe message.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,

    // --- History ------------------------------------------------------------

    /// Candle bucket size requested from upstream, in seconds.
    #[serde(default = "default_candle_granularity_secs")]
    pub candle_granularity_secs: u32,

    /// Maximum number of candles returned by `/history/{ticker}`.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Overall timeout for one upstream REST request.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// User-Agent sent upstream. Coinbase rejects requests without one.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            ws_url: default_ws_url(),
            rest_base_url: default_rest_base_url(),
            product_ids: default_product_ids(),
            channels: default_channels(),
            candle_granularity_secs: default_candle_granularity_secs(),
            history_limit: default_history_limit(),
            http_timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read relay config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse relay config from {}", path.display()))?;

        info!(
            path = %path.display(),
            products = ?config.product_ids,
            "relay config loaded"
        );

        Ok(config)
    }

    /// Apply `RELAY_*` environment overrides on top of the loaded values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("RELAY_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(url) = lookup("RELAY_WS_URL") {
            self.ws_url = url;
        }
        if let Some(url) = lookup("RELAY_REST_URL") {
            self.rest_base_url = url;
        }
        if let Some(products) = lookup("RELAY_PRODUCTS") {
            self.product_ids = split_list(&products, true);
        }
        if let Some(channels) = lookup("RELAY_CHANNELS") {
            self.channels = split_list(&channels, false);
        }
    }

    /// Reject configurations the relay cannot serve.
    pub fn validate(&self) -> Result<()> {
        if self.product_ids.is_empty() {
            anyhow::bail!("product_ids must name at least one instrument");
        }
        if self.channels.is_empty() {
            anyhow::bail!("channels must name at least one channel");
        }
        if self.history_limit == 0 {
            anyhow::bail!("history_limit must be at least 1");
        }
        if !SUPPORTED_GRANULARITIES.contains(&self.candle_granularity_secs) {
            anyhow::bail!(
                "candle_granularity_secs {} is not one of {:?}",
                self.candle_granularity_secs,
                SUPPORTED_GRANULARITIES
            );
        }
        Ok(())
    }
}

fn split_list(raw: &str, uppercase: bool) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| if uppercase { s.to_uppercase() } else { s.to_string() })
        .collect()
}

// =============================================================================
// Application State — shared read-only context for handlers
// =============================================================================
//
// Handlers receive `Arc<AppState>`. Nothing here is mutated after startup:
// each relay session owns its own upstream socket, and the candle client is
// a cloneable handle over one connection pool that lives as long as the
// server.
// =============================================================================

use std::sync::Arc;

use crate::coinbase::{CandleClient, SubscribeRequest};
use crate::runtime_config::RelayConfig;

pub struct AppState {
    pub config: RelayConfig,
    pub candles: CandleClient,
}

impl AppState {
    pub fn new(config: RelayConfig) -> anyhow::Result<Arc<Self>> {
        let candles = CandleClient::new(&config)?;
        Ok(Arc::new(Self { config, candles }))
    }

    /// The subscribe message every new upstream connection sends.
    pub fn subscribe_request(&self) -> SubscribeRequest {
        SubscribeRequest::from_config(&self.config)
    }
}

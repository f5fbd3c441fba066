pub mod client;
pub mod feed;

pub use client::CandleClient;
pub use feed::{SubscribeRequest, UpstreamEvent};

pub mod store;

use crate::models::Notional;
use serde::Serialize;
pub use store::SpreadBoard;

/// Latest published spread for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadObservation {
    pub symbol: String,
    pub bid_price: String,
    pub ask_price: String,
    pub spread: f64,
    pub delta: f64,
    pub observed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotionalObservation {
    pub symbol: String,
    pub depth: usize,
    #[serde(flatten)]
    pub notional: Notional,
    pub observed_ms: u64,
}

/// Destination of everything the poller derives. Writes are last-write-wins
/// per symbol, so publishing the same value twice is harmless.
pub trait SpreadSink: Send + Sync {
    fn publish(&self, observation: SpreadObservation);

    fn publish_notional(&self, observation: NotionalObservation);

    /// Forget a symbol the poller no longer tracks.
    fn retire(&self, symbol: &str);
}

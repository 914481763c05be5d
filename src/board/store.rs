use super::{NotionalObservation, SpreadObservation, SpreadSink};
use dashmap::DashMap;
use metrics::gauge;
use std::sync::Arc;

pub const SPREAD_GAUGE: &str = "symbol_price_spread";
pub const DELTA_GAUGE: &str = "symbol_price_spread_delta";
pub const NOTIONAL_GAUGE: &str = "order_book_notional";

/// Shared view of the latest observations. Cloning is an `Arc` bump; the
/// poller writes while HTTP handlers read.
#[derive(Clone, Default)]
pub struct SpreadBoard {
    spreads: Arc<DashMap<String, SpreadObservation>>,
    notionals: Arc<DashMap<String, NotionalObservation>>,
}

impl SpreadBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<SpreadObservation> {
        self.spreads.get(symbol).map(|r| r.clone())
    }

    /// All spreads, sorted by symbol.
    pub fn spreads(&self) -> Vec<SpreadObservation> {
        let mut all: Vec<_> = self.spreads.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }

    pub fn notionals(&self) -> Vec<NotionalObservation> {
        let mut all: Vec<_> = self.notionals.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }
}

impl SpreadSink for SpreadBoard {
    fn publish(&self, observation: SpreadObservation) {
        let symbol = observation.symbol.clone();
        gauge!(SPREAD_GAUGE, "symbol" => symbol.clone()).set(observation.spread);
        gauge!(DELTA_GAUGE, "symbol" => symbol.clone()).set(observation.delta);
        self.spreads.insert(symbol, observation);
    }

    fn publish_notional(&self, observation: NotionalObservation) {
        let symbol = observation.symbol.clone();
        gauge!(NOTIONAL_GAUGE, "symbol" => symbol.clone(), "side" => "bids")
            .set(observation.notional.bids);
        gauge!(NOTIONAL_GAUGE, "symbol" => symbol.clone(), "side" => "asks")
            .set(observation.notional.asks);
        self.notionals.insert(symbol, observation);
    }

    fn retire(&self, symbol: &str) {
        // The exporter has no per-series removal, so park the gauges at 0.
        gauge!(SPREAD_GAUGE, "symbol" => symbol.to_string()).set(0.0);
        gauge!(DELTA_GAUGE, "symbol" => symbol.to_string()).set(0.0);
        self.spreads.remove(symbol);
    }
}

pub mod batch;
pub mod notional;
pub mod ranking;

use crate::models::{SpreadRecord, SymbolList, SymbolSnapshot};
use std::collections::HashSet;

pub use batch::batch_symbols;
pub use notional::notional;
pub use ranking::{Metric, Ranking};

/// Normalised bid/ask spread, `(ask - bid) / ask`. Zero when the ask is
/// missing, malformed or not positive.
pub fn spread(snapshot: &SymbolSnapshot) -> f64 {
    let ask = snapshot.ask();
    let bid = snapshot.bid();

    if ask <= 0.0 {
        return 0.0;
    }

    (ask - bid) / ask
}

pub fn spread_record(snapshot: SymbolSnapshot) -> SpreadRecord {
    let spread = spread(&snapshot);
    SpreadRecord { snapshot, spread }
}

/// Symbols quoted in `quote_asset` (case-insensitive), catalogue order, no duplicates.
pub fn filter_by_quote_asset(list: &SymbolList, quote_asset: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    list.symbols
        .iter()
        .filter(|s| s.quote_asset.eq_ignore_ascii_case(quote_asset))
        .filter(|s| seen.insert(s.name.clone()))
        .map(|s| s.name.clone())
        .collect()
}

#[cfg(test)]
pub(crate) fn snapshot(name: &str, bid: &str, ask: &str, volume: &str, trades: u64) -> SymbolSnapshot {
    SymbolSnapshot {
        name: name.to_string(),
        bid_price: bid.to_string(),
        ask_price: ask.to_string(),
        volume: volume.to_string(),
        trade_count: trades,
    }
}

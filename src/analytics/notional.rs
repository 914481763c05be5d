use crate::models::{BookLevel, Notional, OrderBookSnapshot};

/// Sums price × quantity over the first `depth` levels of each side.
/// A side shorter than `depth` contributes only the levels it has.
pub fn notional(book: &OrderBookSnapshot, depth: usize) -> Notional {
    Notional {
        bids: side_total(&book.bids, depth),
        asks: side_total(&book.asks, depth),
    }
}

fn side_total(levels: &[BookLevel], depth: usize) -> f64 {
    levels
        .iter()
        .take(depth)
        .map(|level| level.price * level.quantity)
        .sum()
}

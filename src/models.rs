use serde::{Deserialize, Serialize};

/// One entry of the exchange catalogue.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    #[serde(rename = "symbol")]
    pub name: String,

    #[serde(rename = "quoteAsset")]
    pub quote_asset: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SymbolList {
    pub symbols: Vec<SymbolInfo>,
}

/// 24h statistics for a single symbol. Prices and volume stay as the
/// exchange sends them (decimal strings); accessors read malformed values as 0.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SymbolSnapshot {
    #[serde(rename = "symbol")]
    pub name: String,

    #[serde(rename = "bidPrice")]
    pub bid_price: String,

    #[serde(rename = "askPrice")]
    pub ask_price: String,

    pub volume: String,

    #[serde(rename = "count")]
    pub trade_count: u64,
}

impl SymbolSnapshot {
    pub fn bid(&self) -> f64 {
        parse_or_zero(&self.bid_price)
    }

    pub fn ask(&self) -> f64 {
        parse_or_zero(&self.ask_price)
    }

    pub fn volume(&self) -> f64 {
        parse_or_zero(&self.volume)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
}

/// Both sides best price first, as delivered by the exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBookSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpreadRecord {
    pub snapshot: SymbolSnapshot,
    pub spread: f64,
}

impl SpreadRecord {
    pub fn symbol(&self) -> &str {
        &self.snapshot.name
    }
}

/// Bid and ask notional over the top levels of a book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Notional {
    pub bids: f64,
    pub asks: f64,
}

pub fn parse_or_zero(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

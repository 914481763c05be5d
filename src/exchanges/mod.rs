use crate::errors::ExchangeError;
use crate::models::{OrderBookSnapshot, SymbolList, SymbolSnapshot};
use async_trait::async_trait;
use std::collections::HashMap;

pub mod binance;

/// Read-only market data the poller needs from an exchange.
#[async_trait]
pub trait MarketData: Send + Sync {
    fn name(&self) -> &'static str;

    async fn ping(&self) -> Result<(), ExchangeError>;

    async fn fetch_exchange_symbols(&self) -> Result<SymbolList, ExchangeError>;

    /// 24h statistics for `symbols`, keyed by symbol name. Unknown symbols
    /// are simply missing from the result.
    async fn fetch_symbol_stats(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, SymbolSnapshot>, ExchangeError>;

    async fn fetch_order_book(
        &self,
        symbol: &str,
        depth: usize,
    ) -> Result<OrderBookSnapshot, ExchangeError>;
}

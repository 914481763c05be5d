use crate::analytics::{self, Metric, Ranking, batch_symbols, filter_by_quote_asset};
use crate::board::{NotionalObservation, SpreadObservation, SpreadSink};
use crate::config::Config;
use crate::errors::{ExchangeError, PollError};
use crate::exchanges::MarketData;
use crate::models::{SpreadRecord, SymbolSnapshot};
use crate::tracker::DeltaTracker;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Quote asset of the symbols whose spreads are tracked.
    pub spread_quote_asset: String,
    /// Quote asset of the symbols ranked by volume at startup.
    pub volume_quote_asset: String,
    pub top_n: usize,
    pub order_book_depth: usize,
    pub stats_batch_size: NonZeroUsize,
    pub poll_interval: Duration,
}

impl From<&Config> for PollerSettings {
    fn from(config: &Config) -> Self {
        Self {
            spread_quote_asset: config.spread_quote_asset.clone(),
            volume_quote_asset: config.volume_quote_asset.clone(),
            top_n: config.top_n,
            order_book_depth: config.order_book_depth,
            stats_batch_size: config.stats_batch_size,
            poll_interval: config.poll_interval,
        }
    }
}

/// What one delta cycle produced.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// In ranking order.
    pub published: Vec<SpreadObservation>,
    pub skipped: Vec<String>,
    pub evicted: Vec<String>,
}

/// Owns the delta tracker and drives fetch → rank → spread → delta → publish.
pub struct Poller {
    market: Arc<dyn MarketData>,
    sink: Arc<dyn SpreadSink>,
    tracker: DeltaTracker,
    settings: PollerSettings,
    /// Every symbol quoted in the spread quote asset; re-ranked each cycle.
    universe: Vec<String>,
}

impl Poller {
    pub fn new(
        market: Arc<dyn MarketData>,
        sink: Arc<dyn SpreadSink>,
        tracker: DeltaTracker,
        settings: PollerSettings,
    ) -> Self {
        Self {
            market,
            sink,
            tracker,
            settings,
            universe: Vec::new(),
        }
    }

    pub fn tracker(&self) -> &DeltaTracker {
        &self.tracker
    }

    /// Runs the startup analytics, then one cycle per interval until
    /// `shutdown` flips to true.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        if let Err(e) = self.bootstrap().await {
            tracing::error!(exchange = self.market.name(), error = %e, "failed to get symbol list");
            return;
        }

        loop {
            match self.run_cycle().await {
                Ok(report) => tracing::debug!(
                    published = report.published.len(),
                    skipped = report.skipped.len(),
                    evicted = report.evicted.len(),
                    "cycle complete"
                ),
                Err(e) => tracing::error!(error = %e, "cycle failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = wait_for_shutdown(&mut shutdown) => {
                    tracing::info!("poller stopping");
                    return;
                }
            }
        }
    }

    /// One-off work before the loop: catalogue, volume ranking with book
    /// notional, trade-count ranking and the initial spread baseline.
    /// Only a failed catalogue fetch is fatal.
    pub async fn bootstrap(&mut self) -> Result<(), ExchangeError> {
        let catalogue = self.market.fetch_exchange_symbols().await?;

        let volume_universe = filter_by_quote_asset(&catalogue, &self.settings.volume_quote_asset);
        self.universe = filter_by_quote_asset(&catalogue, &self.settings.spread_quote_asset);

        tracing::info!(
            volume_quote = %self.settings.volume_quote_asset,
            volume_symbols = volume_universe.len(),
            spread_quote = %self.settings.spread_quote_asset,
            spread_symbols = self.universe.len(),
            "symbol catalogue loaded"
        );

        match self.rank(&volume_universe, Metric::Volume).await {
            Ok(ranking) => self.report_notional(&ranking.order).await,
            Err(e) => tracing::error!(error = %e, "unable to retrieve symbol stats"),
        }

        match self.rank(&self.universe, Metric::TradeCount).await {
            Ok(ranking) => {
                let (records, _) = self.spread_records(&ranking).await;
                self.tracker.initialize(records);
                tracing::info!(symbols = self.tracker.len(), "initial spreads recorded");
            }
            Err(e) => tracing::error!(error = %e, "unable to retrieve symbol stats"),
        }

        Ok(())
    }

    /// Re-ranks the universe by trade count and publishes each ranked
    /// symbol's spread and its change since the previous cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, PollError> {
        let ranking = self.rank(&self.universe, Metric::TradeCount).await?;
        let (records, skipped) = self.spread_records(&ranking).await;

        for record in &records {
            if !self.tracker.contains(record.symbol()) {
                tracing::warn!(symbol = %record.symbol(), "symbol entered the ranking, using it as baseline");
                self.tracker.admit(record.clone());
            }
        }

        let cycle = self.tracker.update(records.clone())?;

        let observed_ms = now_ms();
        let mut published = Vec::with_capacity(records.len());
        for record in records {
            let delta = cycle.deltas.get(record.symbol()).copied().unwrap_or_default();
            let observation = SpreadObservation {
                symbol: record.snapshot.name,
                bid_price: record.snapshot.bid_price,
                ask_price: record.snapshot.ask_price,
                spread: record.spread,
                delta,
                observed_ms,
            };

            tracing::info!(
                symbol = %observation.symbol,
                ask_price = %observation.ask_price,
                bid_price = %observation.bid_price,
                spread = observation.spread,
                delta,
                "spread delta"
            );

            self.sink.publish(observation.clone());
            published.push(observation);
        }

        for symbol in &cycle.evicted {
            tracing::info!(symbol = %symbol, "evicting stale symbol");
            self.sink.retire(symbol);
        }

        Ok(CycleReport {
            published,
            skipped,
            evicted: cycle.evicted,
        })
    }

    async fn rank(&self, symbols: &[String], metric: Metric) -> Result<Ranking, ExchangeError> {
        let stats = self.fetch_stats(symbols).await?;
        let ranking = Ranking::new(stats, self.settings.top_n, metric, false);

        tracing::info!(
            metric = metric.label(),
            result = %format!("[{}]", ranking.order.join(", ")),
            "highest over the last 24 hours in descending order"
        );

        Ok(ranking)
    }

    /// Fetches stats batch by batch, concurrently. Failed batches are logged
    /// and left out; the call fails only when every batch failed.
    async fn fetch_stats(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, SymbolSnapshot>, ExchangeError> {
        let batches = batch_symbols(symbols, self.settings.stats_batch_size);
        let results = join_all(
            batches
                .iter()
                .map(|batch| self.market.fetch_symbol_stats(&batch.symbols)),
        )
        .await;

        let mut merged = HashMap::with_capacity(symbols.len());
        let mut last_error = None;
        for (batch, result) in batches.iter().zip(results) {
            match result {
                Ok(stats) => merged.extend(stats),
                Err(e) => {
                    tracing::error!(batch = %batch.label, size = batch.symbols.len(), error = %e, "unable to retrieve symbol stats");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if merged.is_empty() => Err(e),
            _ => Ok(merged),
        }
    }

    /// Spread records for the ranked names, in ranking order. A name whose
    /// stats are not in the ranking is fetched on its own; if that fails it
    /// is skipped for this cycle.
    async fn spread_records(&self, ranking: &Ranking) -> (Vec<SpreadRecord>, Vec<String>) {
        let mut records = Vec::with_capacity(ranking.order.len());
        let mut skipped = Vec::new();

        for name in &ranking.order {
            let snapshot = match ranking.get(name) {
                Some(s) => s.clone(),
                None => match self.fetch_single(name).await {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::error!(symbol = %name, error = %e, "unable to retrieve symbol stats");
                        skipped.push(name.clone());
                        continue;
                    }
                },
            };

            let record = analytics::spread_record(snapshot);
            tracing::debug!(
                symbol = %name,
                ask_price = %record.snapshot.ask_price,
                bid_price = %record.snapshot.bid_price,
                spread = record.spread,
                "bid-ask spread"
            );
            records.push(record);
        }

        (records, skipped)
    }

    async fn fetch_single(&self, name: &str) -> Result<SymbolSnapshot, ExchangeError> {
        let mut stats = self.market.fetch_symbol_stats(&[name.to_string()]).await?;
        stats
            .remove(name)
            .ok_or_else(|| ExchangeError::UnexpectedData(format!("no stats returned for {name}")))
    }

    async fn report_notional(&self, symbols: &[String]) {
        let depth = self.settings.order_book_depth;

        for symbol in symbols {
            let book = match self.market.fetch_order_book(symbol, depth).await {
                Ok(book) => book,
                Err(e) => {
                    tracing::error!(symbol = %symbol, error = %e, "unable to retrieve order book");
                    continue;
                }
            };

            let notional = analytics::notional(&book, depth);
            tracing::info!(
                symbol = %symbol,
                depth,
                bids = notional.bids,
                asks = notional.asks,
                "total notional value"
            );

            self.sink.publish_notional(NotionalObservation {
                symbol: symbol.clone(),
                depth,
                notional,
                observed_ms: now_ms(),
            });
        }
    }
}

/// Resolves once `shutdown` holds `true`. A dropped sender can never signal,
/// so in that case this never resolves.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::snapshot;
    use crate::board::SpreadBoard;
    use crate::models::{BookLevel, OrderBookSnapshot, SymbolInfo, SymbolList};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory exchange whose stats can be swapped between cycles.
    #[derive(Default)]
    struct StubMarket {
        catalogue: Vec<(&'static str, &'static str)>,
        stats: Mutex<HashMap<String, SymbolSnapshot>>,
        books: HashMap<String, OrderBookSnapshot>,
        stats_calls: Mutex<Vec<Vec<String>>>,
        fail_stats: AtomicBool,
        /// Any stats request naming this symbol fails.
        poisoned: Option<&'static str>,
    }

    impl StubMarket {
        fn set_stats(&self, rows: Vec<SymbolSnapshot>) {
            *self.stats.lock().unwrap() = rows.into_iter().map(|s| (s.name.clone(), s)).collect();
        }
    }

    #[async_trait]
    impl MarketData for StubMarket {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn ping(&self) -> Result<(), ExchangeError> {
            Ok(())
        }

        async fn fetch_exchange_symbols(&self) -> Result<SymbolList, ExchangeError> {
            Ok(SymbolList {
                symbols: self
                    .catalogue
                    .iter()
                    .map(|&(name, quote)| SymbolInfo {
                        name: name.to_string(),
                        quote_asset: quote.to_string(),
                    })
                    .collect(),
            })
        }

        async fn fetch_symbol_stats(
            &self,
            symbols: &[String],
        ) -> Result<HashMap<String, SymbolSnapshot>, ExchangeError> {
            self.stats_calls.lock().unwrap().push(symbols.to_vec());
            if self.fail_stats.load(Ordering::SeqCst) {
                return Err(ExchangeError::UnexpectedData("stub outage".to_string()));
            }
            if let Some(bad) = self.poisoned {
                if symbols.iter().any(|s| s == bad) {
                    return Err(ExchangeError::UnexpectedData(format!("batch with {bad} rejected")));
                }
            }

            let stats = self.stats.lock().unwrap();
            Ok(symbols
                .iter()
                .filter_map(|name| stats.get(name).map(|s| (name.clone(), s.clone())))
                .collect())
        }

        async fn fetch_order_book(
            &self,
            symbol: &str,
            _depth: usize,
        ) -> Result<OrderBookSnapshot, ExchangeError> {
            self.books
                .get(symbol)
                .cloned()
                .ok_or_else(|| ExchangeError::UnexpectedData(format!("no book for {symbol}")))
        }
    }

    fn settings(top_n: usize, batch: usize) -> PollerSettings {
        PollerSettings {
            spread_quote_asset: "USDT".to_string(),
            volume_quote_asset: "BTC".to_string(),
            top_n,
            order_book_depth: 2,
            stats_batch_size: NonZeroUsize::new(batch).unwrap(),
            poll_interval: Duration::from_millis(10),
        }
    }

    fn poller(market: &Arc<StubMarket>, board: &SpreadBoard, settings: PollerSettings) -> Poller {
        Poller::new(
            market.clone(),
            Arc::new(board.clone()),
            DeltaTracker::default(),
            settings,
        )
    }

    fn quote(name: &str, bid: &str, ask: &str, trades: u64) -> SymbolSnapshot {
        snapshot(name, bid, ask, "1", trades)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[tokio::test]
    async fn consecutive_cycles_publish_the_spread_change() {
        let market = Arc::new(StubMarket::default());
        let board = SpreadBoard::new();
        let mut poller = poller(&market, &board, settings(5, 100));
        poller.universe = vec!["X".to_string()];

        market.set_stats(vec![quote("X", "98", "100", 10)]);
        let first = poller.run_cycle().await.unwrap();
        assert_eq!(first.published.len(), 1);
        assert_eq!(first.published[0].delta, 0.0);

        market.set_stats(vec![quote("X", "95", "100", 10)]);
        let second = poller.run_cycle().await.unwrap();
        assert!(close(second.published[0].delta, 0.03));

        assert!(close(board.get("X").unwrap().delta, 0.03));
        assert!(close(poller.tracker().get("X").unwrap().spread, 0.05));
    }

    #[tokio::test]
    async fn bootstrap_seeds_baseline_and_reports_notional() {
        let mut books = HashMap::new();
        books.insert(
            "ETHBTC".to_string(),
            OrderBookSnapshot {
                bids: vec![
                    BookLevel { price: 100.0, quantity: 2.0 },
                    BookLevel { price: 99.0, quantity: 1.0 },
                    BookLevel { price: 98.0, quantity: 5.0 },
                ],
                asks: vec![BookLevel { price: 101.0, quantity: 1.0 }],
            },
        );

        let market = Arc::new(StubMarket {
            catalogue: vec![("ETHBTC", "BTC"), ("AUSDT", "USDT"), ("BUSDT", "USDT")],
            books,
            ..Default::default()
        });
        market.set_stats(vec![
            snapshot("ETHBTC", "0.05", "0.051", "900", 1),
            quote("AUSDT", "99", "100", 50),
            quote("BUSDT", "9", "10", 70),
        ]);

        let board = SpreadBoard::new();
        let mut poller = poller(&market, &board, settings(5, 100));
        poller.bootstrap().await.unwrap();

        assert_eq!(poller.universe, vec!["AUSDT", "BUSDT"]);
        assert!(close(poller.tracker().get("AUSDT").unwrap().spread, 0.01));
        assert!(close(poller.tracker().get("BUSDT").unwrap().spread, 0.1));

        let notionals = board.notionals();
        assert_eq!(notionals.len(), 1);
        assert_eq!(notionals[0].notional.bids, 299.0);
        assert_eq!(notionals[0].notional.asks, 101.0);

        market.set_stats(vec![quote("AUSDT", "98", "100", 50), quote("BUSDT", "9", "10", 70)]);
        let report = poller.run_cycle().await.unwrap();
        let order: Vec<_> = report.published.iter().map(|o| o.symbol.as_str()).collect();
        assert_eq!(order, vec!["BUSDT", "AUSDT"]);
        assert!(close(report.published[1].delta, 0.01));
        assert!(close(report.published[0].delta, 0.0));
    }

    #[tokio::test]
    async fn ranking_is_limited_to_top_n_and_stale_symbols_persist() {
        let market = Arc::new(StubMarket::default());
        let board = SpreadBoard::new();
        let mut poller = poller(&market, &board, settings(1, 100));
        poller.universe = vec!["A".to_string(), "B".to_string()];

        market.set_stats(vec![quote("A", "1", "2", 10), quote("B", "1", "4", 5)]);
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.published.len(), 1);
        assert_eq!(report.published[0].symbol, "A");

        market.set_stats(vec![quote("A", "1", "2", 1), quote("B", "1", "4", 5)]);
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.published[0].symbol, "B");
        assert_eq!(report.published[0].delta, 0.0);

        assert!(poller.tracker().contains("A"));
        assert_eq!(poller.tracker().len(), 2);
    }

    #[tokio::test]
    async fn stats_are_requested_in_batches() {
        let market = Arc::new(StubMarket::default());
        let board = SpreadBoard::new();
        let mut poller = poller(&market, &board, settings(10, 2));
        poller.universe = ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect();

        market.set_stats(["A", "B", "C", "D", "E"].iter().map(|n| quote(n, "1", "2", 1)).collect());
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.published.len(), 5);

        let sizes: Vec<usize> = market.stats_calls.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn failed_batch_is_skipped_and_the_rest_are_published() {
        let market = Arc::new(StubMarket {
            poisoned: Some("C"),
            ..Default::default()
        });
        let board = SpreadBoard::new();
        let mut poller = poller(&market, &board, settings(10, 2));
        poller.universe = ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect();

        market.set_stats(["A", "B", "C", "D", "E"].iter().map(|n| quote(n, "1", "2", 1)).collect());
        let report = poller.run_cycle().await.unwrap();

        let published: Vec<_> = report.published.iter().map(|o| o.symbol.as_str()).collect();
        assert_eq!(published, vec!["A", "B", "E"]);
        assert!(!poller.tracker().contains("C"));
        assert!(!poller.tracker().contains("D"));
        assert!(board.get("D").is_none());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_tracker_untouched() {
        let market = Arc::new(StubMarket::default());
        let board = SpreadBoard::new();
        let mut poller = poller(&market, &board, settings(5, 100));
        poller.universe = vec!["X".to_string()];

        market.set_stats(vec![quote("X", "98", "100", 10)]);
        poller.run_cycle().await.unwrap();

        market.fail_stats.store(true, Ordering::SeqCst);
        assert!(matches!(poller.run_cycle().await, Err(PollError::Exchange(_))));
        assert!(close(poller.tracker().get("X").unwrap().spread, 0.02));

        market.fail_stats.store(false, Ordering::SeqCst);
        market.set_stats(vec![quote("X", "90", "100", 10)]);
        let report = poller.run_cycle().await.unwrap();
        assert!(close(report.published[0].delta, 0.08));
    }

    #[tokio::test]
    async fn symbol_missing_from_ranking_stats_is_fetched_alone_or_skipped() {
        let market = Arc::new(StubMarket::default());
        let board = SpreadBoard::new();
        let poller = poller(&market, &board, settings(5, 100));
        market.set_stats(vec![quote("X", "98", "100", 10)]);

        let ranking = Ranking {
            stats: HashMap::new(),
            order: vec!["X".to_string(), "GONE".to_string()],
        };
        let (records, skipped) = poller.spread_records(&ranking).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol(), "X");
        assert_eq!(skipped, vec!["GONE"]);
    }

    #[tokio::test]
    async fn bootstrap_survives_a_stats_outage() {
        let market = Arc::new(StubMarket {
            catalogue: vec![("AUSDT", "USDT")],
            ..Default::default()
        });
        market.fail_stats.store(true, Ordering::SeqCst);

        let board = SpreadBoard::new();
        let mut poller = poller(&market, &board, settings(5, 100));
        poller.bootstrap().await.unwrap();
        assert!(!poller.tracker().is_tracking());

        market.fail_stats.store(false, Ordering::SeqCst);
        market.set_stats(vec![quote("AUSDT", "1", "2", 1)]);
        poller.run_cycle().await.unwrap();
        assert!(poller.tracker().is_tracking());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let market = Arc::new(StubMarket {
            catalogue: vec![("X", "USDT")],
            ..Default::default()
        });
        market.set_stats(vec![quote("X", "98", "100", 10)]);

        let board = SpreadBoard::new();
        let poller = poller(&market, &board, settings(5, 100));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(poller.run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller did not stop")
            .unwrap();
        assert!(board.get("X").is_some());
    }

    #[tokio::test]
    async fn run_keeps_polling_when_shutdown_sender_is_dropped() {
        let market = Arc::new(StubMarket {
            catalogue: vec![("X", "USDT")],
            ..Default::default()
        });
        market.set_stats(vec![quote("X", "98", "100", 10)]);

        let board = SpreadBoard::new();
        let poller = poller(&market, &board, settings(5, 100));
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let handle = tokio::spawn(poller.run(rx));
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(!handle.is_finished());
        // bootstrap plus several cycles
        assert!(market.stats_calls.lock().unwrap().len() >= 4);
        handle.abort();
    }

    #[tokio::test]
    async fn wait_for_shutdown_sees_a_flag_already_set() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(&mut rx))
            .await
            .expect("shutdown flag was missed");
    }
}

use crate::models::SymbolSnapshot;
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::HashMap;

/// What "more" means when ranking symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// 24h base-asset volume, parsed as a float.
    Volume,
    /// 24h number of trades.
    TradeCount,
}

impl Metric {
    fn compare(self, a: &SymbolSnapshot, b: &SymbolSnapshot) -> Ordering {
        match self {
            Metric::Volume => OrderedFloat(a.volume()).cmp(&OrderedFloat(b.volume())),
            Metric::TradeCount => a.trade_count.cmp(&b.trade_count),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Volume => "volume",
            Metric::TradeCount => "trade count",
        }
    }
}

/// Up to `n` symbol names, highest `metric` first (lowest first when
/// `reverse`). Equal values are ordered by name so the result never depends
/// on map iteration order. Asking for more than the population returns the
/// whole population.
pub fn top_n(
    stats: &HashMap<String, SymbolSnapshot>,
    n: usize,
    metric: Metric,
    reverse: bool,
) -> Vec<String> {
    let mut ranked: Vec<(&String, &SymbolSnapshot)> = stats.iter().collect();
    ranked.sort_by(|(a_name, a), (b_name, b)| {
        metric.compare(b, a).then_with(|| a_name.cmp(b_name))
    });

    let mut result: Vec<String> = ranked
        .into_iter()
        .take(n)
        .map(|(name, _)| name.clone())
        .collect();

    if reverse {
        result.reverse();
    }

    result
}

/// A batch of statistics together with the ranked names drawn from it.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    pub stats: HashMap<String, SymbolSnapshot>,
    pub order: Vec<String>,
}

impl Ranking {
    pub fn new(
        stats: HashMap<String, SymbolSnapshot>,
        n: usize,
        metric: Metric,
        reverse: bool,
    ) -> Self {
        let order = top_n(&stats, n, metric, reverse);
        Self { stats, order }
    }

    pub fn get(&self, name: &str) -> Option<&SymbolSnapshot> {
        self.stats.get(name)
    }
}

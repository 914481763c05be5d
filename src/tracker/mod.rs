use crate::errors::TrackerError;
use crate::models::SpreadRecord;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Entry {
    record: SpreadRecord,
    /// Update counter value at the time this record was stored.
    seen_at: u64,
}

/// Result of one tracker update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleDeltas {
    /// Symbol → spread change against the previous stored record.
    pub deltas: HashMap<String, f64>,
    /// Symbols dropped because they were not refreshed within the TTL.
    pub evicted: Vec<String>,
}

/// Remembers the latest spread per symbol and turns each new batch of
/// records into per-symbol deltas.
///
/// Starts uninitialized; [`DeltaTracker::initialize`] stores the baseline.
/// Entries live for the whole process unless a TTL (in updates) is set.
#[derive(Debug, Clone, Default)]
pub struct DeltaTracker {
    entries: Option<HashMap<String, Entry>>,
    updates: u64,
    ttl: Option<u64>,
}

impl DeltaTracker {
    /// `ttl_cycles == 0` disables eviction.
    pub fn with_ttl(ttl_cycles: u64) -> Self {
        Self {
            ttl: (ttl_cycles > 0).then_some(ttl_cycles),
            ..Self::default()
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.entries.is_some()
    }

    pub fn initialize<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = SpreadRecord>,
    {
        let seen_at = self.updates;
        let entries = records
            .into_iter()
            .map(|record| (record.symbol().to_string(), Entry { record, seen_at }))
            .collect();
        self.entries = Some(entries);
    }

    /// Adds a baseline for a symbol the tracker has not seen yet, leaving
    /// existing entries alone. Initializes the tracker if needed.
    pub fn admit(&mut self, record: SpreadRecord) {
        let seen_at = self.updates;
        self.entries
            .get_or_insert_with(HashMap::new)
            .entry(record.symbol().to_string())
            .or_insert(Entry { record, seen_at });
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.entries
            .as_ref()
            .is_some_and(|entries| entries.contains_key(symbol))
    }

    pub fn get(&self, symbol: &str) -> Option<&SpreadRecord> {
        self.entries.as_ref()?.get(symbol).map(|e| &e.record)
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, HashMap::len)
    }

    /// Computes `new.spread - stored.spread` for every record, then replaces
    /// the stored records. Nothing is modified when any symbol is unknown.
    pub fn update(&mut self, records: Vec<SpreadRecord>) -> Result<CycleDeltas, TrackerError> {
        let entries = self.entries.as_mut().ok_or(TrackerError::Uninitialized)?;

        let mut deltas = HashMap::with_capacity(records.len());
        for record in &records {
            let prior = entries
                .get(record.symbol())
                .ok_or_else(|| TrackerError::UnknownSymbol(record.symbol().to_string()))?;
            deltas.insert(record.symbol().to_string(), record.spread - prior.record.spread);
        }

        self.updates += 1;
        let seen_at = self.updates;
        for record in records {
            entries.insert(record.symbol().to_string(), Entry { record, seen_at });
        }

        let mut evicted = Vec::new();
        if let Some(ttl) = self.ttl {
            entries.retain(|symbol, entry| {
                let keep = seen_at - entry.seen_at < ttl;
                if !keep {
                    evicted.push(symbol.clone());
                }
                keep
            });
            evicted.sort();
        }

        Ok(CycleDeltas { deltas, evicted })
    }
}

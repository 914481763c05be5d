use std::num::NonZeroUsize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolBatch {
    /// `batch_1`, `batch_2`, ... in emission order.
    pub label: String,
    pub symbols: Vec<String>,
}

/// Splits `symbols` into chunks of `batch_size`; only the last chunk may be shorter.
pub fn batch_symbols(symbols: &[String], batch_size: NonZeroUsize) -> Vec<SymbolBatch> {
    symbols
        .chunks(batch_size.get())
        .enumerate()
        .map(|(i, chunk)| SymbolBatch {
            label: format!("batch_{}", i + 1),
            symbols: chunk.to_vec(),
        })
        .collect()
}

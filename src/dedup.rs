use crate::collaborators::RowStore;
use anyhow::{Context, Result};
use time::Date;

/// Guards the one-row-per-date invariant. The destination table has no
/// unique constraint of its own, so every write must be preceded by this.
pub struct DedupGate<'a, R: RowStore> {
    store: &'a R,
}

impl<'a, R: RowStore> DedupGate<'a, R> {
    pub fn new(store: &'a R) -> Self {
        Self { store }
    }

    /// Whether a row for `date` already exists. A failed lookup is an error,
    /// never "not found": guessing wrong here writes a duplicate.
    pub async fn exists(&self, date: Date) -> Result<bool> {
        let count = self
            .store
            .count_rows_on(date)
            .await
            .context("existing-row lookup failed")?;
        Ok(count > 0)
    }
}

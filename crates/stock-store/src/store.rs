use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{
    LedgerEntry, LedgerQuery, ReferenceId, Result, SkuId, SkuStockRecord, StockLevels, StoreError,
    Version,
};

/// Durable storage of per-SKU stock counters with an optimistic version token.
///
/// All implementations must be thread-safe (Send + Sync); the reservation
/// engine calls them from many tasks at once.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Registers a SKU with `stock_total` units, all of them available.
    ///
    /// Fails with `DuplicateSku` if the SKU already has a record.
    async fn create(&self, sku_id: SkuId, stock_total: u32) -> Result<SkuStockRecord>;

    /// Reads the current record together with its version.
    ///
    /// Fails with `SkuNotFound` for an unknown SKU.
    async fn read(&self, sku_id: SkuId) -> Result<SkuStockRecord>;

    /// Replaces the counters if the stored version still equals `expected_version`.
    ///
    /// On success the version is incremented and the new record returned.
    /// A mismatch fails with `VersionConflict` and writes nothing. An unknown
    /// SKU fails with `SkuNotFound`, never with a conflict.
    async fn conditional_update(
        &self,
        sku_id: SkuId,
        expected_version: Version,
        levels: StockLevels,
    ) -> Result<SkuStockRecord>;

    /// Returns every stock record.
    async fn list(&self) -> Result<Vec<SkuStockRecord>>;
}

/// A stream of ledger entries.
pub type LedgerStream = Pin<Box<dyn Stream<Item = Result<LedgerEntry>> + Send>>;

/// Append-only log of applied stock mutations.
#[async_trait]
pub trait SnapshotLedger: Send + Sync {
    /// Appends a single entry.
    async fn append(&self, entry: LedgerEntry) -> Result<()>;

    /// Appends entries atomically - either all are recorded or none are.
    async fn append_all(&self, entries: Vec<LedgerEntry>) -> Result<()>;

    /// Retrieves entries matching a query.
    async fn query(&self, query: LedgerQuery) -> Result<Vec<LedgerEntry>>;

    /// Counts entries matching a query. Paging fields are ignored.
    async fn count(&self, query: LedgerQuery) -> Result<usize>;

    /// Streams every entry in append order.
    async fn stream_all(&self) -> Result<LedgerStream>;
}

/// Convenience lookups for audit.
#[async_trait]
pub trait SnapshotLedgerExt: SnapshotLedger {
    /// All entries for one SKU, oldest first.
    async fn entries_for_sku(&self, sku_id: SkuId) -> Result<Vec<LedgerEntry>> {
        self.query(LedgerQuery::for_sku(sku_id)).await
    }

    /// All entries recorded under one reference id.
    async fn entries_for_reference(&self, reference_id: ReferenceId) -> Result<Vec<LedgerEntry>> {
        self.query(LedgerQuery::for_reference(reference_id)).await
    }

    /// The most recently applied entry for a SKU, if any.
    async fn latest_for_sku(&self, sku_id: SkuId) -> Result<Option<LedgerEntry>> {
        let entries = self.entries_for_sku(sku_id).await?;
        Ok(entries.into_iter().max_by_key(|e| e.resulting_version))
    }
}

impl<T: SnapshotLedger + ?Sized> SnapshotLedgerExt for T {}

/// Rejects counters that would break `available <= total`.
pub fn validate_levels(sku_id: SkuId, levels: &StockLevels) -> Result<()> {
    if levels.is_consistent() {
        Ok(())
    } else {
        Err(StoreError::InvalidLevels {
            sku_id,
            total: levels.total,
            available: levels.available,
        })
    }
}

/// Rejects entries that could never come from a real mutation.
pub fn validate_entries_for_append(entries: &[LedgerEntry]) -> Result<()> {
    for entry in entries {
        if entry.quantity == 0 {
            return Err(StoreError::InvalidEntry {
                entry_id: entry.entry_id,
                reason: "zero quantity".to_string(),
            });
        }
        if entry.resulting_stock_available > entry.resulting_stock_total {
            return Err(StoreError::InvalidEntry {
                entry_id: entry.entry_id,
                reason: format!(
                    "available {} above total {}",
                    entry.resulting_stock_available, entry.resulting_stock_total
                ),
            });
        }
    }
    Ok(())
}

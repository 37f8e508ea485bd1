use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    LedgerEntry, LedgerQuery, Result, SkuId, SkuStockRecord, StockLevels, StoreError, Version,
    store::{LedgerStream, SnapshotLedger, StockStore, validate_entries_for_append, validate_levels},
};

/// In-memory stock store for tests and local runs.
///
/// `read` and `conditional_update` take the lock separately, so concurrent
/// writers race exactly as they would against a database row and conflicts
/// surface through the version check.
#[derive(Clone, Default)]
pub struct InMemoryStockStore {
    records: Arc<RwLock<HashMap<SkuId, SkuStockRecord>>>,
    forced_conflicts: Arc<RwLock<HashSet<SkuId>>>,
}

impl InMemoryStockStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered SKUs.
    pub async fn sku_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Makes every conditional update of `sku_id` fail with a version conflict,
    /// as if another writer always got there first.
    pub async fn force_conflicts(&self, sku_id: SkuId) {
        self.forced_conflicts.write().await.insert(sku_id);
    }

    /// Stops forcing conflicts for `sku_id`.
    pub async fn clear_forced_conflicts(&self, sku_id: SkuId) {
        self.forced_conflicts.write().await.remove(&sku_id);
    }

    /// Removes all records.
    pub async fn clear(&self) {
        self.records.write().await.clear();
        self.forced_conflicts.write().await.clear();
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn create(&self, sku_id: SkuId, stock_total: u32) -> Result<SkuStockRecord> {
        let mut records = self.records.write().await;
        if records.contains_key(&sku_id) {
            return Err(StoreError::DuplicateSku(sku_id));
        }

        let record = SkuStockRecord::new(sku_id, stock_total);
        records.insert(sku_id, record.clone());
        Ok(record)
    }

    async fn read(&self, sku_id: SkuId) -> Result<SkuStockRecord> {
        self.records
            .read()
            .await
            .get(&sku_id)
            .cloned()
            .ok_or(StoreError::SkuNotFound(sku_id))
    }

    async fn conditional_update(
        &self,
        sku_id: SkuId,
        expected_version: Version,
        levels: StockLevels,
    ) -> Result<SkuStockRecord> {
        let forced_conflict = self.forced_conflicts.read().await.contains(&sku_id);

        let mut records = self.records.write().await;
        let record = records
            .get_mut(&sku_id)
            .ok_or(StoreError::SkuNotFound(sku_id))?;

        if forced_conflict || record.version != expected_version {
            return Err(StoreError::VersionConflict {
                sku_id,
                expected: expected_version,
                actual: record.version,
            });
        }

        validate_levels(sku_id, &levels)?;

        record.levels = levels;
        record.version = record.version.next();
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn list(&self) -> Result<Vec<SkuStockRecord>> {
        let records = self.records.read().await;
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by_key(|r| r.sku_id);
        Ok(all)
    }
}

/// In-memory ledger for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
    fail_on_append: Arc<AtomicBool>,
}

impl InMemoryLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every append fail until switched off again.
    pub fn set_fail_on_append(&self, fail: bool) {
        self.fail_on_append.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of entries recorded.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_on_append.load(Ordering::SeqCst) {
            return Err(StoreError::LedgerUnavailable(
                "in-memory ledger is rejecting appends".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotLedger for InMemoryLedger {
    async fn append(&self, entry: LedgerEntry) -> Result<()> {
        self.append_all(vec![entry]).await
    }

    async fn append_all(&self, entries: Vec<LedgerEntry>) -> Result<()> {
        self.check_available()?;
        validate_entries_for_append(&entries)?;
        self.entries.write().await.extend(entries);
        Ok(())
    }

    async fn query(&self, query: LedgerQuery) -> Result<Vec<LedgerEntry>> {
        let entries = self.entries.read().await;
        let mut matching: Vec<_> = entries
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            a.applied_at
                .cmp(&b.applied_at)
                .then(a.resulting_version.cmp(&b.resulting_version))
        });

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, query: LedgerQuery) -> Result<usize> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| query.matches(e)).count())
    }

    async fn stream_all(&self) -> Result<LedgerStream> {
        use futures_util::stream;

        let entries = self.entries.read().await.clone();
        let stream = stream::iter(entries.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InventoryChangeType, ReferenceId, SnapshotLedgerExt};

    #[tokio::test]
    async fn create_and_read() {
        let store = InMemoryStockStore::new();
        let sku = SkuId::new();

        let created = store.create(sku, 15).await.unwrap();
        assert_eq!(created.version, Version::first());

        let read = store.read(sku).await.unwrap();
        assert_eq!(read, created);
        assert_eq!(store.sku_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = InMemoryStockStore::new();
        let sku = SkuId::new();
        store.create(sku, 1).await.unwrap();

        let result = store.create(sku, 2).await;
        assert!(matches!(result, Err(StoreError::DuplicateSku(id)) if id == sku));
    }

    #[tokio::test]
    async fn read_unknown_sku() {
        let store = InMemoryStockStore::new();
        let result = store.read(SkuId::new()).await;
        assert!(matches!(result, Err(StoreError::SkuNotFound(_))));
    }

    #[tokio::test]
    async fn conditional_update_bumps_version() {
        let store = InMemoryStockStore::new();
        let sku = SkuId::new();
        store.create(sku, 10).await.unwrap();

        let updated = store
            .conditional_update(
                sku,
                Version::first(),
                StockLevels {
                    total: 10,
                    available: 7,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.version, Version::new(2));
        assert_eq!(updated.stock_available(), 7);
        assert_eq!(store.read(sku).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn stale_version_conflicts_without_writing() {
        let store = InMemoryStockStore::new();
        let sku = SkuId::new();
        store.create(sku, 10).await.unwrap();
        store
            .conditional_update(sku, Version::first(), StockLevels::fully_available(12))
            .await
            .unwrap();

        let result = store
            .conditional_update(sku, Version::first(), StockLevels::fully_available(99))
            .await;

        match result {
            Err(StoreError::VersionConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, Version::first());
                assert_eq!(actual, Version::new(2));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.read(sku).await.unwrap().stock_total(), 12);
    }

    #[tokio::test]
    async fn update_of_unknown_sku_is_not_a_conflict() {
        let store = InMemoryStockStore::new();
        let result = store
            .conditional_update(SkuId::new(), Version::first(), StockLevels::fully_available(1))
            .await;
        assert!(matches!(result, Err(StoreError::SkuNotFound(_))));
    }

    #[tokio::test]
    async fn inconsistent_levels_are_rejected() {
        let store = InMemoryStockStore::new();
        let sku = SkuId::new();
        store.create(sku, 5).await.unwrap();

        let result = store
            .conditional_update(
                sku,
                Version::first(),
                StockLevels {
                    total: 5,
                    available: 6,
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::InvalidLevels { .. })));
        assert_eq!(store.read(sku).await.unwrap().version, Version::first());
    }

    #[tokio::test]
    async fn forced_conflicts_until_cleared() {
        let store = InMemoryStockStore::new();
        let sku = SkuId::new();
        store.create(sku, 5).await.unwrap();
        store.force_conflicts(sku).await;

        let result = store
            .conditional_update(sku, Version::first(), StockLevels::fully_available(5))
            .await;
        assert!(result.unwrap_err().is_conflict());

        store.clear_forced_conflicts(sku).await;
        assert!(
            store
                .conditional_update(sku, Version::first(), StockLevels::fully_available(5))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn ledger_append_and_query() {
        let ledger = InMemoryLedger::new();
        let record = SkuStockRecord::new(SkuId::new(), 10);
        let reference = ReferenceId::new();

        ledger
            .append(LedgerEntry::record(
                &record,
                InventoryChangeType::Reserve,
                2,
                reference,
            ))
            .await
            .unwrap();
        ledger
            .append(LedgerEntry::record(
                &record,
                InventoryChangeType::Release,
                2,
                ReferenceId::new(),
            ))
            .await
            .unwrap();

        assert_eq!(ledger.entry_count().await, 2);
        assert_eq!(ledger.entries_for_sku(record.sku_id).await.unwrap().len(), 2);
        assert_eq!(ledger.entries_for_reference(reference).await.unwrap().len(), 1);
        assert_eq!(
            ledger
                .count(LedgerQuery::new().change_type(InventoryChangeType::Release))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn ledger_paging() {
        let ledger = InMemoryLedger::new();
        let record = SkuStockRecord::new(SkuId::new(), 10);
        let entries: Vec<_> = (0..5)
            .map(|_| {
                LedgerEntry::record(&record, InventoryChangeType::Inbound, 1, ReferenceId::new())
            })
            .collect();
        ledger.append_all(entries).await.unwrap();

        let page = ledger
            .query(LedgerQuery::new().offset(1).limit(3))
            .await
            .unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(ledger.count(LedgerQuery::new().limit(1)).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn failing_ledger_records_nothing() {
        let ledger = InMemoryLedger::new();
        ledger.set_fail_on_append(true);
        let record = SkuStockRecord::new(SkuId::new(), 10);

        let result = ledger
            .append_all(vec![
                LedgerEntry::record(&record, InventoryChangeType::Inbound, 1, ReferenceId::new()),
                LedgerEntry::record(&record, InventoryChangeType::Inbound, 1, ReferenceId::new()),
            ])
            .await;

        assert!(matches!(result, Err(StoreError::LedgerUnavailable(_))));
        assert_eq!(ledger.entry_count().await, 0);
    }

    #[tokio::test]
    async fn stream_all_entries() {
        use futures_util::StreamExt;

        let ledger = InMemoryLedger::new();
        let record = SkuStockRecord::new(SkuId::new(), 10);
        for _ in 0..3 {
            ledger
                .append(LedgerEntry::record(
                    &record,
                    InventoryChangeType::Inbound,
                    1,
                    ReferenceId::new(),
                ))
                .await
                .unwrap();
        }

        let stream = ledger.stream_all().await.unwrap();
        let entries: Vec<_> = stream.collect().await;
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.is_ok()));
    }
}

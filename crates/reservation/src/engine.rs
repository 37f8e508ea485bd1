//! Single adjustments and all-or-nothing batch reservations.

use std::collections::HashMap;
use std::time::Instant;

use common::{ReferenceId, SkuId};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use stock_store::{
    InventoryChangeType, LedgerEntry, LedgerQuery, SkuStockRecord, SnapshotLedger, StockLevels,
    StockStore, StockView, StoreError,
};
use tokio::sync::Mutex;

use crate::config::RetryConfig;
use crate::error::{InventoryError, Result};
use crate::retry::RetryController;

/// One line of a batch: apply `change_type` with `quantity` units to `sku_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub sku_id: SkuId,
    pub quantity: u32,
    pub change_type: InventoryChangeType,
}

impl BatchItem {
    pub fn new(sku_id: SkuId, quantity: u32, change_type: InventoryChangeType) -> Self {
        Self {
            sku_id,
            quantity,
            change_type,
        }
    }

    pub fn reserve(sku_id: SkuId, quantity: u32) -> Self {
        Self::new(sku_id, quantity, InventoryChangeType::Reserve)
    }

    pub fn release(sku_id: SkuId, quantity: u32) -> Self {
        Self::new(sku_id, quantity, InventoryChangeType::Release)
    }
}

/// Orchestrates stock mutations and their audit trail.
///
/// The engine keeps no lock around stock state: correctness comes from the
/// store's version check and the retry controller, so it can be shared
/// across any number of tasks. Different SKUs never contend; the same SKU
/// serializes through conflict and retry.
pub struct InventoryEngine<S, L>
where
    S: StockStore,
    L: SnapshotLedger,
{
    retry: RetryController<S>,
    ledger: L,
    /// Entries whose stock change committed but whose ledger append failed.
    pending_ledger: Mutex<Vec<LedgerEntry>>,
}

impl<S, L> InventoryEngine<S, L>
where
    S: StockStore,
    L: SnapshotLedger,
{
    /// Creates a new engine over a stock store and a ledger.
    pub fn new(store: S, ledger: L, config: RetryConfig) -> Self {
        Self {
            retry: RetryController::new(store, config),
            ledger,
            pending_ledger: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &S {
        self.retry.store()
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &RetryConfig {
        self.retry.config()
    }

    /// Registers a new SKU with all of its units available.
    #[tracing::instrument(skip(self))]
    pub async fn register_sku(&self, sku_id: SkuId, stock_total: u32) -> Result<StockView> {
        let record = self.store().create(sku_id, stock_total).await?;
        tracing::info!(%sku_id, stock_total, "sku registered");
        Ok(record.view())
    }

    /// Current counters of a SKU.
    pub async fn stock_view(&self, sku_id: SkuId) -> Result<StockView> {
        Ok(self.store().read(sku_id).await?.view())
    }

    /// Ledger entries matching `query`, for audit.
    pub async fn ledger_entries(&self, query: LedgerQuery) -> Result<Vec<LedgerEntry>> {
        Ok(self.ledger.query(query).await?)
    }

    /// Applies one change to one SKU and records it in the ledger.
    ///
    /// If the ledger append fails after the stock change has committed, the
    /// change is not undone: the entry is parked for
    /// [`reconcile_pending_ledger`](Self::reconcile_pending_ledger) and the
    /// caller gets `LedgerWriteFailure` carrying the committed view.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_single(
        &self,
        sku_id: SkuId,
        change_type: InventoryChangeType,
        quantity: u32,
        reference_id: ReferenceId,
    ) -> Result<StockView> {
        ensure_positive(sku_id, quantity)?;

        let record = self.apply_change(sku_id, change_type, quantity).await?;
        let view = record.view();

        let entry = LedgerEntry::record(&record, change_type, quantity, reference_id);
        if let Err(e) = self.ledger.append(entry.clone()).await {
            return Err(self
                .ledger_failure(reference_id, vec![entry], vec![view], e)
                .await);
        }

        Ok(view)
    }

    /// Applies every item of a batch, or none of them.
    ///
    /// Feasibility is checked against a snapshot of every SKU before anything
    /// is written. Items are then applied in order; if one fails anyway (a
    /// concurrent writer took the stock, or contention was exhausted) the
    /// items already committed are undone in reverse order before the
    /// original error is returned. Ledger entries under `reference_id` are
    /// appended only once the whole batch has committed, so it ends up with
    /// either one entry per item or none. The forward and undoing changes of
    /// a compensated batch are recorded under `reference_id.compensation()`.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn process_batch(
        &self,
        reference_id: ReferenceId,
        items: Vec<BatchItem>,
    ) -> Result<Vec<StockView>> {
        metrics::counter!("inventory_batches_total").increment(1);
        let started = Instant::now();

        if items.is_empty() {
            return Err(InventoryError::EmptyBatch(reference_id));
        }
        for item in &items {
            ensure_positive(item.sku_id, item.quantity)?;
        }

        self.check_feasibility(&items).await?;

        let mut committed: Vec<(BatchItem, SkuStockRecord)> = Vec::with_capacity(items.len());
        for item in &items {
            match self
                .apply_change(item.sku_id, item.change_type, item.quantity)
                .await
            {
                Ok(record) => committed.push((*item, record)),
                Err(cause) => {
                    tracing::warn!(
                        %reference_id,
                        sku_id = %item.sku_id,
                        committed = committed.len(),
                        error = %cause,
                        "batch item failed, compensating"
                    );
                    let err = self.compensate(reference_id, &committed, cause).await;
                    metrics::histogram!("inventory_batch_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    return Err(err);
                }
            }
        }

        let views: Vec<StockView> = committed.iter().map(|(_, record)| record.view()).collect();
        let entries: Vec<LedgerEntry> = committed
            .iter()
            .map(|(item, record)| {
                LedgerEntry::record(record, item.change_type, item.quantity, reference_id)
            })
            .collect();

        if let Err(e) = self.ledger.append_all(entries.clone()).await {
            return Err(self.ledger_failure(reference_id, entries, views, e).await);
        }

        metrics::histogram!("inventory_batch_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(%reference_id, items = views.len(), "batch applied");
        Ok(views)
    }

    /// Entries whose stock change committed but which are missing from the ledger.
    pub async fn pending_ledger_entries(&self) -> Vec<LedgerEntry> {
        self.pending_ledger.lock().await.clone()
    }

    /// Retries appending every parked entry. Returns how many were recorded.
    ///
    /// The queue is drained before the append, so callers parking new
    /// entries meanwhile never wait on the ledger. On failure the drained
    /// entries go back to the front of the queue and the ledger error is
    /// returned.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_pending_ledger(&self) -> Result<usize> {
        let entries = std::mem::take(&mut *self.pending_ledger.lock().await);
        if entries.is_empty() {
            return Ok(0);
        }

        let recorded = entries.len();
        if let Err(e) = self.ledger.append_all(entries.clone()).await {
            let mut pending = self.pending_ledger.lock().await;
            let parked_meanwhile = std::mem::replace(&mut *pending, entries);
            pending.extend(parked_meanwhile);
            tracing::warn!(pending = pending.len(), error = %e, "reconciliation failed");
            return Err(e.into());
        }

        tracing::info!(recorded, "pending ledger entries reconciled");
        Ok(recorded)
    }

    async fn apply_change(
        &self,
        sku_id: SkuId,
        change_type: InventoryChangeType,
        quantity: u32,
    ) -> Result<SkuStockRecord> {
        let record = self
            .retry
            .apply_with_retry(sku_id, move |levels| {
                change_type.apply(sku_id, levels, quantity)
            })
            .await?;
        metrics::counter!("inventory_adjustments_total", "change" => change_type.as_str())
            .increment(1);
        Ok(record)
    }

    /// Applies the inverse of a committed batch item. Not counted as an adjustment.
    async fn undo_change(&self, item: &BatchItem) -> Result<SkuStockRecord> {
        let BatchItem {
            sku_id,
            quantity,
            change_type,
        } = *item;
        let inverse = change_type.inverse();
        self.retry
            .apply_with_retry(sku_id, move |levels| inverse.apply(sku_id, levels, quantity))
            .await
    }

    /// Simulates the batch in order against one read of every distinct SKU.
    async fn check_feasibility(&self, items: &[BatchItem]) -> Result<()> {
        let mut sku_ids: Vec<SkuId> = items.iter().map(|item| item.sku_id).collect();
        sku_ids.sort();
        sku_ids.dedup();

        let records =
            try_join_all(sku_ids.iter().map(|sku_id| self.store().read(*sku_id))).await?;
        let mut levels: HashMap<SkuId, StockLevels> = records
            .into_iter()
            .map(|record| (record.sku_id, record.levels))
            .collect();

        for item in items {
            let current = levels
                .get_mut(&item.sku_id)
                .ok_or(InventoryError::NotFound(item.sku_id))?;
            *current = item
                .change_type
                .apply(item.sku_id, *current, item.quantity)?;
        }
        Ok(())
    }

    /// Undoes `committed` in reverse order and returns the error to surface.
    ///
    /// Every stock change made on behalf of the failed batch, forward or
    /// undoing, is recorded under the batch's compensation reference.
    async fn compensate(
        &self,
        reference_id: ReferenceId,
        committed: &[(BatchItem, SkuStockRecord)],
        cause: InventoryError,
    ) -> InventoryError {
        if committed.is_empty() {
            return cause;
        }
        metrics::counter!("inventory_batch_compensations_total").increment(1);
        let compensation_id = reference_id.compensation();

        let mut entries: Vec<LedgerEntry> = committed
            .iter()
            .map(|(item, record)| {
                LedgerEntry::record(record, item.change_type, item.quantity, compensation_id)
            })
            .collect();

        let mut uncompensated = Vec::new();
        for (item, _) in committed.iter().rev() {
            let inverse = item.change_type.inverse();
            match self.undo_change(item).await {
                Ok(record) => entries.push(LedgerEntry::record(
                    &record,
                    inverse,
                    item.quantity,
                    compensation_id,
                )),
                Err(e) => {
                    tracing::error!(
                        %reference_id,
                        %compensation_id,
                        sku_id = %item.sku_id,
                        change = %inverse,
                        quantity = item.quantity,
                        error = %e,
                        "compensation failed, stock change left applied"
                    );
                    uncompensated.push(item.sku_id);
                }
            }
        }

        if let Err(e) = self.ledger.append_all(entries.clone()).await {
            self.park_entries(compensation_id, entries, &e).await;
        }

        if uncompensated.is_empty() {
            tracing::info!(
                %reference_id,
                %compensation_id,
                undone = committed.len(),
                "batch compensated"
            );
            cause
        } else {
            InventoryError::CompensationFailed {
                reference_id,
                compensation_id,
                cause: Box::new(cause),
                uncompensated,
            }
        }
    }

    async fn park_entries(
        &self,
        reference_id: ReferenceId,
        entries: Vec<LedgerEntry>,
        error: &StoreError,
    ) {
        metrics::counter!("inventory_ledger_write_failures_total").increment(1);
        tracing::error!(
            %reference_id,
            entries = entries.len(),
            error = %error,
            "ledger write failed after stock commit, parked for reconciliation"
        );
        self.pending_ledger.lock().await.extend(entries);
    }

    async fn ledger_failure(
        &self,
        reference_id: ReferenceId,
        entries: Vec<LedgerEntry>,
        committed: Vec<StockView>,
        error: StoreError,
    ) -> InventoryError {
        self.park_entries(reference_id, entries, &error).await;

        InventoryError::LedgerWriteFailure {
            reference_id,
            committed,
            reason: error.to_string(),
        }
    }
}

fn ensure_positive(sku_id: SkuId, quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(InventoryError::InvalidQuantity { sku_id, quantity });
    }
    Ok(())
}

//! Bounded optimistic retry around a single conditional update.

use common::SkuId;
use stock_store::{SkuStockRecord, StockLevels, StockRuleViolation, StockStore, StoreError};

use crate::config::RetryConfig;
use crate::error::{InventoryError, Result};

/// Applies pure transformations to a stock record under contention.
///
/// Each attempt reads the latest record, computes new levels with the
/// transform and writes them back only if the version is unchanged. A lost
/// race waits `attempt × base_backoff` and starts over from a fresh read.
pub struct RetryController<S: StockStore> {
    store: S,
    config: RetryConfig,
}

impl<S: StockStore> RetryController<S> {
    /// Creates a new retry controller over `store`.
    pub fn new(store: S, config: RetryConfig) -> Self {
        let config = config.with_max_attempts(config.max_attempts);
        Self { store, config }
    }

    /// Returns a reference to the underlying stock store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Applies `transform` to the current levels of `sku_id` and commits the result.
    ///
    /// Business-rule violations from the transform and missing SKUs return
    /// immediately. Version conflicts are retried until `max_attempts`
    /// attempts have been made, then reported as `ContentionExhausted`.
    pub async fn apply_with_retry<F>(&self, sku_id: SkuId, transform: F) -> Result<SkuStockRecord>
    where
        F: Fn(StockLevels) -> std::result::Result<StockLevels, StockRuleViolation> + Send,
    {
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            let current = self.store.read(sku_id).await?;
            let levels = transform(current.levels)?;

            match self
                .store
                .conditional_update(sku_id, current.version, levels)
                .await
            {
                Ok(updated) => {
                    if attempt > 1 {
                        tracing::debug!(%sku_id, attempt, "conditional update succeeded after retry");
                    }
                    return Ok(updated);
                }
                Err(StoreError::VersionConflict { actual, .. }) => {
                    metrics::counter!("inventory_version_conflicts_total").increment(1);
                    if attempt == max_attempts {
                        break;
                    }

                    let delay = self.config.backoff_for_attempt(attempt);
                    tracing::debug!(
                        %sku_id,
                        attempt,
                        read_version = %current.version,
                        actual_version = %actual,
                        ?delay,
                        "version conflict, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        metrics::counter!("inventory_contention_exhausted_total").increment(1);
        tracing::warn!(%sku_id, attempts = max_attempts, "contention exhausted");
        Err(InventoryError::ContentionExhausted {
            sku_id,
            attempts: max_attempts,
        })
    }
}

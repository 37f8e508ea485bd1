//! Reservation engine error types.

use common::{ReferenceId, SkuId};
use stock_store::{StockRuleViolation, StockView, StoreError};
use thiserror::Error;

/// Errors surfaced by the retry controller and the reservation engine.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The SKU has no stock record. Never retried.
    #[error("SKU not found: {0}")]
    NotFound(SkuId),

    /// Quantities must be positive.
    #[error("Invalid quantity {quantity} for SKU {sku_id}: must be positive")]
    InvalidQuantity { sku_id: SkuId, quantity: u32 },

    /// A batch with no items was submitted.
    #[error("Batch {0} contains no items")]
    EmptyBatch(ReferenceId),

    /// Fewer units are available than the change needs. Never retried.
    #[error("Insufficient stock for SKU {sku_id}: requested {requested}, available {available}")]
    InsufficientStock {
        sku_id: SkuId,
        requested: u32,
        available: u32,
    },

    /// The change would push available stock above total stock. Never retried.
    #[error(
        "Capacity exceeded for SKU {sku_id}: adding {requested} to available {available} exceeds total {total}"
    )]
    CapacityExceeded {
        sku_id: SkuId,
        requested: u32,
        available: u32,
        total: u32,
    },

    /// Every attempt lost the race against another writer.
    #[error("Contention exhausted for SKU {sku_id} after {attempts} attempts")]
    ContentionExhausted { sku_id: SkuId, attempts: u32 },

    /// Stock was committed but its audit entries could not be written.
    /// The entries are parked for reconciliation; the stock change stands.
    #[error("Ledger write failed for reference {reference_id}: {reason}")]
    LedgerWriteFailure {
        reference_id: ReferenceId,
        committed: Vec<StockView>,
        reason: String,
    },

    /// A batch failed and some of its committed items could not be undone.
    /// The changes that did commit are recorded under `compensation_id`.
    #[error(
        "Compensation failed for reference {reference_id}, recorded under {compensation_id} (original failure: {cause})"
    )]
    CompensationFailed {
        reference_id: ReferenceId,
        compensation_id: ReferenceId,
        cause: Box<InventoryError>,
        uncompensated: Vec<SkuId>,
    },

    /// Storage failure other than a conflict or a missing SKU.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl InventoryError {
    /// Stable code for callers that map errors onto their own taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            InventoryError::NotFound(_) => "NOT_FOUND",
            InventoryError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            InventoryError::EmptyBatch(_) => "EMPTY_BATCH",
            InventoryError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            InventoryError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            InventoryError::ContentionExhausted { .. } => "CONTENTION_EXHAUSTED",
            InventoryError::LedgerWriteFailure { .. } => "LEDGER_WRITE_FAILURE",
            InventoryError::CompensationFailed { .. } => "COMPENSATION_FAILED",
            InventoryError::Store(_) => "STORE_ERROR",
        }
    }

    /// True if the caller may retry the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(self, InventoryError::ContentionExhausted { .. })
    }

    /// True for business-rule rejections that no amount of retrying will fix.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            InventoryError::InsufficientStock { .. } | InventoryError::CapacityExceeded { .. }
        )
    }
}

impl From<StockRuleViolation> for InventoryError {
    fn from(violation: StockRuleViolation) -> Self {
        match violation {
            StockRuleViolation::InsufficientStock {
                sku_id,
                requested,
                available,
            } => InventoryError::InsufficientStock {
                sku_id,
                requested,
                available,
            },
            StockRuleViolation::CapacityExceeded {
                sku_id,
                requested,
                available,
                total,
            } => InventoryError::CapacityExceeded {
                sku_id,
                requested,
                available,
                total,
            },
        }
    }
}

impl From<StoreError> for InventoryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SkuNotFound(sku_id) => InventoryError::NotFound(sku_id),
            other => InventoryError::Store(other),
        }
    }
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, InventoryError>;

use thiserror::Error;

use crate::{EntryId, SkuId, Version};

/// Errors that can occur when interacting with the stock store or the ledger.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record was updated by another writer after it was read.
    /// No part of the rejected write was applied.
    #[error("Version conflict for SKU {sku_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        sku_id: SkuId,
        expected: Version,
        actual: Version,
    },

    /// No stock record exists for the SKU.
    #[error("SKU not found: {0}")]
    SkuNotFound(SkuId),

    /// A stock record already exists for the SKU.
    #[error("SKU already registered: {0}")]
    DuplicateSku(SkuId),

    /// The requested levels would break `available <= total`.
    #[error("Invalid stock levels for SKU {sku_id}: available {available} exceeds total {total}")]
    InvalidLevels {
        sku_id: SkuId,
        total: u32,
        available: u32,
    },

    /// The ledger refused or failed to persist an entry.
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// An entry handed to the ledger could never come from a real mutation.
    /// Nothing from the rejected batch was appended.
    #[error("Invalid ledger entry {entry_id}: {reason}")]
    InvalidEntry { entry_id: EntryId, reason: String },

    /// A stored value could not be decoded.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if the error is an optimistic version conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// Result type for stock store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

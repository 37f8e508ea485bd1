use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{InventoryChangeType, ReferenceId, SkuId, SkuStockRecord, Version};

/// Unique identifier for a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Creates a new random entry ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entry ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable audit record of one applied stock mutation.
///
/// Entries are only ever appended. The resulting counters and version are
/// taken from the record the mutation committed, so an auditor can line
/// entries up against the version history of the SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub sku_id: SkuId,
    pub change_type: InventoryChangeType,
    /// Always positive; the direction comes from `change_type`.
    pub quantity: u32,
    pub resulting_stock_available: u32,
    pub resulting_stock_total: u32,
    pub resulting_version: Version,
    pub reference_id: ReferenceId,
    pub applied_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Records a change that produced `record`.
    pub fn record(
        record: &SkuStockRecord,
        change_type: InventoryChangeType,
        quantity: u32,
        reference_id: ReferenceId,
    ) -> Self {
        Self {
            entry_id: EntryId::new(),
            sku_id: record.sku_id,
            change_type,
            quantity,
            resulting_stock_available: record.stock_available(),
            resulting_stock_total: record.stock_total(),
            resulting_version: record.version,
            reference_id,
            applied_at: record.updated_at,
        }
    }

    /// Signed effect on available stock.
    pub fn available_delta(&self) -> i64 {
        let quantity = i64::from(self.quantity);
        match self.change_type {
            InventoryChangeType::Inbound | InventoryChangeType::Release => quantity,
            InventoryChangeType::Outbound | InventoryChangeType::Reserve => -quantity,
        }
    }
}

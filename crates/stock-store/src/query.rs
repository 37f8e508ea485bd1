use chrono::{DateTime, Utc};

use crate::{InventoryChangeType, LedgerEntry, ReferenceId, SkuId};

/// Builder for filtering ledger entries.
///
/// Results are ordered by `applied_at`, then by `resulting_version`.
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    /// Filter by SKU.
    pub sku_id: Option<SkuId>,

    /// Filter by reference id (one order or correction).
    pub reference_id: Option<ReferenceId>,

    /// Filter by change types (any of these types).
    pub change_types: Option<Vec<InventoryChangeType>>,

    /// Entries applied at or after this timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Entries applied at or before this timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Maximum number of entries to return.
    pub limit: Option<usize>,

    /// Number of entries to skip.
    pub offset: Option<usize>,
}

impl LedgerQuery {
    /// Creates a query matching every entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for one SKU.
    pub fn for_sku(sku_id: SkuId) -> Self {
        Self {
            sku_id: Some(sku_id),
            ..Default::default()
        }
    }

    /// Creates a query for one reference id.
    pub fn for_reference(reference_id: ReferenceId) -> Self {
        Self {
            reference_id: Some(reference_id),
            ..Default::default()
        }
    }

    pub fn sku_id(mut self, sku_id: SkuId) -> Self {
        self.sku_id = Some(sku_id);
        self
    }

    pub fn reference_id(mut self, reference_id: ReferenceId) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    /// Filters by a single change type.
    pub fn change_type(mut self, change_type: InventoryChangeType) -> Self {
        self.change_types = Some(vec![change_type]);
        self
    }

    /// Filters by multiple change types (any of these).
    pub fn change_types(mut self, change_types: Vec<InventoryChangeType>) -> Self {
        self.change_types = Some(change_types);
        self
    }

    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the entry passes every filter. Paging is not applied.
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if let Some(sku_id) = self.sku_id
            && entry.sku_id != sku_id
        {
            return false;
        }
        if let Some(reference_id) = self.reference_id
            && entry.reference_id != reference_id
        {
            return false;
        }
        if let Some(ref types) = self.change_types
            && !types.contains(&entry.change_type)
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && entry.applied_at < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && entry.applied_at > to
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SkuStockRecord;

    #[test]
    fn query_for_sku() {
        let id = SkuId::new();
        let query = LedgerQuery::for_sku(id);

        assert_eq!(query.sku_id, Some(id));
        assert!(query.reference_id.is_none());
        assert!(query.change_types.is_none());
    }

    #[test]
    fn query_builder_chain() {
        let sku = SkuId::new();
        let reference = ReferenceId::new();
        let query = LedgerQuery::new()
            .sku_id(sku)
            .reference_id(reference)
            .change_type(InventoryChangeType::Reserve)
            .limit(50)
            .offset(10);

        assert_eq!(query.sku_id, Some(sku));
        assert_eq!(query.reference_id, Some(reference));
        assert_eq!(
            query.change_types,
            Some(vec![InventoryChangeType::Reserve])
        );
        assert_eq!(query.limit, Some(50));
        assert_eq!(query.offset, Some(10));
    }

    #[test]
    fn matches_applies_filters() {
        let record = SkuStockRecord::new(SkuId::new(), 10);
        let reference = ReferenceId::new();
        let entry = LedgerEntry::record(&record, InventoryChangeType::Reserve, 1, reference);

        assert!(LedgerQuery::new().matches(&entry));
        assert!(LedgerQuery::for_sku(record.sku_id).matches(&entry));
        assert!(!LedgerQuery::for_sku(SkuId::new()).matches(&entry));
        assert!(!LedgerQuery::for_reference(ReferenceId::new()).matches(&entry));
        assert!(
            !LedgerQuery::new()
                .change_type(InventoryChangeType::Release)
                .matches(&entry)
        );
        assert!(
            !LedgerQuery::new()
                .from_timestamp(entry.applied_at + chrono::Duration::seconds(1))
                .matches(&entry)
        );
    }
}

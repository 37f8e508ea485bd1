//! Stock change types and the counter arithmetic each one performs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{SkuId, StockLevels};

/// Kind of stock mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryChangeType {
    /// Units added to stock (restock, rental returned).
    Inbound,
    /// Units removed from stock (shipped, written off).
    Outbound,
    /// Available units held for a pending order.
    Reserve,
    /// Previously reserved units handed back.
    Release,
}

/// A change that would break the stock invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockRuleViolation {
    #[error("Insufficient stock for SKU {sku_id}: requested {requested}, available {available}")]
    InsufficientStock {
        sku_id: SkuId,
        requested: u32,
        available: u32,
    },

    #[error(
        "Capacity exceeded for SKU {sku_id}: adding {requested} to available {available} exceeds total {total}"
    )]
    CapacityExceeded {
        sku_id: SkuId,
        requested: u32,
        available: u32,
        total: u32,
    },
}

impl StockRuleViolation {
    /// The SKU the violation refers to.
    pub fn sku_id(&self) -> SkuId {
        match self {
            StockRuleViolation::InsufficientStock { sku_id, .. }
            | StockRuleViolation::CapacityExceeded { sku_id, .. } => *sku_id,
        }
    }

    /// How many units the request is off by.
    pub fn shortfall(&self) -> u64 {
        match self {
            StockRuleViolation::InsufficientStock {
                requested,
                available,
                ..
            } => u64::from(*requested).saturating_sub(u64::from(*available)),
            StockRuleViolation::CapacityExceeded {
                requested,
                available,
                total,
                ..
            } => (u64::from(*available) + u64::from(*requested)).saturating_sub(u64::from(*total)),
        }
    }
}

impl InventoryChangeType {
    /// Every change type, in declaration order.
    pub const ALL: [InventoryChangeType; 4] = [
        InventoryChangeType::Inbound,
        InventoryChangeType::Outbound,
        InventoryChangeType::Reserve,
        InventoryChangeType::Release,
    ];

    /// Returns the stored name of the change type.
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryChangeType::Inbound => "INBOUND",
            InventoryChangeType::Outbound => "OUTBOUND",
            InventoryChangeType::Reserve => "RESERVE",
            InventoryChangeType::Release => "RELEASE",
        }
    }

    /// Returns the change that undoes this one when applied with the same quantity.
    pub fn inverse(&self) -> Self {
        match self {
            InventoryChangeType::Inbound => InventoryChangeType::Outbound,
            InventoryChangeType::Outbound => InventoryChangeType::Inbound,
            InventoryChangeType::Reserve => InventoryChangeType::Release,
            InventoryChangeType::Release => InventoryChangeType::Reserve,
        }
    }

    /// Computes the levels after applying `quantity` units of this change.
    ///
    /// Pure: the input is never modified, so a caller racing other writers
    /// can discard the result and recompute it from a fresher read.
    pub fn apply(
        &self,
        sku_id: SkuId,
        levels: StockLevels,
        quantity: u32,
    ) -> Result<StockLevels, StockRuleViolation> {
        let StockLevels { total, available } = levels;
        let insufficient = || StockRuleViolation::InsufficientStock {
            sku_id,
            requested: quantity,
            available,
        };
        let over_capacity = || StockRuleViolation::CapacityExceeded {
            sku_id,
            requested: quantity,
            available,
            total,
        };

        match self {
            InventoryChangeType::Inbound => {
                let total = total.checked_add(quantity).ok_or_else(over_capacity)?;
                let available = available.checked_add(quantity).ok_or_else(over_capacity)?;
                Ok(StockLevels { total, available })
            }
            InventoryChangeType::Outbound => {
                // Reserved units cannot be shipped out from under their order.
                if available < quantity {
                    return Err(insufficient());
                }
                Ok(StockLevels {
                    total: total - quantity,
                    available: available - quantity,
                })
            }
            InventoryChangeType::Reserve => {
                if available < quantity {
                    return Err(insufficient());
                }
                Ok(StockLevels {
                    total,
                    available: available - quantity,
                })
            }
            InventoryChangeType::Release => match available.checked_add(quantity) {
                Some(released) if released <= total => Ok(StockLevels {
                    total,
                    available: released,
                }),
                _ => Err(over_capacity()),
            },
        }
    }
}

impl std::fmt::Display for InventoryChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InventoryChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InventoryChangeType::ALL
            .into_iter()
            .find(|change| change.as_str() == s)
            .ok_or_else(|| format!("unknown inventory change type '{s}'"))
    }
}

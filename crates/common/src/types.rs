use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for reference ids derived from another reference id.
const COMPENSATION_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93b7_4d25_8e0a_51c3_d7f2_9b64);

/// Identifier of a single purchasable or rentable variant (one SKU).
///
/// Wraps a UUID so SKU ids cannot be mixed up with reference ids
/// or other UUID-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkuId(Uuid);

impl SkuId {
    /// Creates a new random SKU ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a SKU ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SkuId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SkuId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SkuId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<SkuId> for Uuid {
    fn from(id: SkuId) -> Self {
        id.0
    }
}

/// Correlation key grouping every stock mutation of one business operation,
/// typically one order-creation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(Uuid);

impl ReferenceId {
    /// Creates a new random reference ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a reference ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// The reference under which changes that undo this operation are recorded.
    ///
    /// Always the same for a given reference and never equal to it.
    pub fn compensation(&self) -> Self {
        Self(Uuid::new_v5(&COMPENSATION_NAMESPACE, self.0.as_bytes()))
    }
}

impl Default for ReferenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ReferenceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

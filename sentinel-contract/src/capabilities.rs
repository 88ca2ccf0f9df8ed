// sentinel-contract/src/capabilities.rs
// ============================================================================
// Module: Sentinel Storage Capabilities
// Description: The capability probe a backend reports at construction time
// (§9 "Polymorphism over backends").
// Purpose: Let the embedding store and retention purger pick a strategy
// (native ANN vs in-memory fallback; partition drop vs row-delete loop)
// without downcasting or matching on a backend enum.
// Dependencies: none
// ============================================================================

/// Capabilities a storage backend reports at construction time.
///
/// Every backend is append-only and maintains projections (§4.2: "The
/// polymorphism is over the capability set {appendOnly, projections,
/// retention}"); `vector_search` and `partition_maintenance` are the two
/// capabilities that actually vary between the embedded and partitioned
/// variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageCapabilities {
    /// True when the backend has a native vector column with an ANN index
    /// (§4.4 "Native" strategy); false selects the in-memory fallback.
    pub vector_search: bool,
    /// True when the backend can drop whole partitions during retention
    /// (§4.9); false falls back to a batched row-delete loop.
    pub partition_maintenance: bool,
}

impl StorageCapabilities {
    /// Capabilities reported by the embedded (single-process) backend.
    #[must_use]
    pub const fn embedded() -> Self {
        Self { vector_search: false, partition_maintenance: false }
    }

    /// Capabilities reported by the partitioned (multi-tenant) backend.
    #[must_use]
    pub const fn partitioned(vector_search: bool) -> Self {
        Self { vector_search, partition_maintenance: true }
    }
}

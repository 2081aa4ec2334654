// # Zone Store Trait
//
// Defines the interface for reading and writing zone contents.
//
// ## Purpose
//
// The zone store is where the "current state" side of a sync comes from and
// where computed deltas are persisted. File layout, line format, serial
// numbers and commit atomicity all belong to the store, never to the core.
//
// ## Implementations
//
// - BIND-style zone files: `zonesync-store-zonefile` crate
// - In-memory: `zonesync_core::store::MemoryZoneStore`

use async_trait::async_trait;

use crate::config::ZoneConfig;
use crate::diff::ZoneDelta;
use crate::zone::Zone;

/// Result of applying a delta to a zone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Records written
    pub added: usize,
    /// Records actually removed
    pub removed: usize,
    /// Serial after the write, if the store keeps one
    pub serial: Option<u32>,
}

/// Trait for zone store implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
/// The engine calls a store at most once per zone per run, never
/// concurrently for the same zone.
///
/// # Responsibilities
///
/// - ✅ Load the records the store manages for a zone
/// - ✅ Apply additions and removals, bump serials, persist atomically
/// - ❌ Decide what changes (owned by `diff`)
/// - ❌ Decide whether removals are allowed (owned by `SyncEngine`)
#[async_trait]
pub trait ZoneStore: Send + Sync {
    /// Load a zone's current managed records
    ///
    /// A zone that does not exist yet loads as empty.
    ///
    /// # Returns
    ///
    /// - `Ok(Zone)`: The zone, with TTLs already resolved
    /// - `Err(Error)`: Storage error
    async fn load(&self, zone: &ZoneConfig) -> Result<Zone, crate::Error>;

    /// Apply a delta and persist the result
    ///
    /// Every record in `changes.add_records` is written and every record in
    /// `changes.remove_records` is removed once. The caller has already
    /// stripped removals that must not be applied.
    ///
    /// # Returns
    ///
    /// - `Ok(ApplyOutcome)`: What was written
    /// - `Err(Error)`: Storage error; nothing is guaranteed to be written
    async fn apply(&self, zone: &ZoneConfig, changes: &ZoneDelta)
    -> Result<ApplyOutcome, crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing zone stores from configuration
pub trait ZoneStoreFactory: Send + Sync {
    /// Create a ZoneStore serving zones of this factory's type
    fn create(&self, config: &ZoneConfig) -> Result<Box<dyn ZoneStore>, crate::Error>;
}

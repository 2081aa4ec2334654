// # Memory Zone Store
//
// In-memory implementation of ZoneStore.
//
// ## Purpose
//
// Holds zone contents in a HashMap, with a serial counter per zone that is
// bumped on every apply. Nothing survives a restart.
//
// ## When to Use
//
// - Testing environments
// - Embedding zonesync where another component owns persistence
// - Inspecting what a sync would produce

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::Error;
use crate::config::ZoneConfig;
use crate::diff::ZoneDelta;
use crate::traits::zone_store::{ApplyOutcome, ZoneStore, ZoneStoreFactory};
use crate::zone::Zone;

#[derive(Debug, Clone)]
struct StoredZone {
    zone: Zone,
    serial: u32,
}

/// In-memory zone store implementation
///
/// Clones share the same underlying map, so a test can keep a handle while
/// the engine owns another.
///
/// # Example
///
/// ```rust,no_run
/// use zonesync_core::config::ZoneConfig;
/// use zonesync_core::store::MemoryZoneStore;
/// use zonesync_core::traits::ZoneStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryZoneStore::new();
///     let zone = store.load(&ZoneConfig::new("example.com", 300)).await?;
///     assert!(zone.is_empty());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryZoneStore {
    inner: Arc<RwLock<HashMap<String, StoredZone>>>,
}

impl MemoryZoneStore {
    /// Create a new empty memory zone store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a zone's contents without touching its serial
    pub async fn seed(&self, zone: Zone) {
        let mut guard = self.inner.write().await;
        let serial = guard.get(&zone.name).map_or(0, |stored| stored.serial);
        guard.insert(zone.name.clone(), StoredZone { zone, serial });
    }

    /// Current contents of a zone, if it has ever been written
    pub async fn snapshot(&self, zone_name: &str) -> Option<Zone> {
        let guard = self.inner.read().await;
        guard.get(&canonical(zone_name)).map(|stored| stored.zone.clone())
    }

    /// Current serial of a zone (0 if never written)
    pub async fn serial(&self, zone_name: &str) -> u32 {
        let guard = self.inner.read().await;
        guard.get(&canonical(zone_name)).map_or(0, |stored| stored.serial)
    }

    /// Number of zones held
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

fn canonical(name: &str) -> String {
    crate::name::canonical_name(name)
}

#[async_trait]
impl ZoneStore for MemoryZoneStore {
    async fn load(&self, config: &ZoneConfig) -> Result<Zone, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(&config.canonical_name())
            .map(|stored| stored.zone.clone())
            .unwrap_or_else(|| Zone::from_config(config)))
    }

    async fn apply(&self, config: &ZoneConfig, changes: &ZoneDelta) -> Result<ApplyOutcome, Error> {
        let mut guard = self.inner.write().await;
        let stored = guard
            .entry(config.canonical_name())
            .or_insert_with(|| StoredZone {
                zone: Zone::from_config(config),
                serial: 0,
            });

        let mut outcome = ApplyOutcome::default();
        for record in changes.additions() {
            stored.zone.add_record(record.clone());
            outcome.added += 1;
        }
        for record in changes.removals() {
            if stored.zone.remove_record(record) {
                outcome.removed += 1;
            } else {
                debug!("Record to remove not present: {}", record);
            }
        }

        stored.serial = stored.serial.wrapping_add(1);
        outcome.serial = Some(stored.serial);
        Ok(outcome)
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory handing out clones of one shared memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryZoneStoreFactory {
    store: MemoryZoneStore,
}

impl MemoryZoneStoreFactory {
    /// Create a factory whose stores share `store`
    pub fn new(store: MemoryZoneStore) -> Self {
        Self { store }
    }
}

impl ZoneStoreFactory for MemoryZoneStoreFactory {
    fn create(&self, _config: &ZoneConfig) -> Result<Box<dyn ZoneStore>, Error> {
        Ok(Box::new(self.store.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compare_zones;
    use crate::record::{Record, RecordType};

    fn config() -> ZoneConfig {
        ZoneConfig::new("example.com", 300).with_zone_type("memory")
    }

    #[tokio::test]
    async fn test_memory_store_load_missing_is_empty() {
        let store = MemoryZoneStore::new();
        let zone = store.load(&config()).await.unwrap();
        assert_eq!(zone.name, "example.com.");
        assert!(zone.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store_apply_round() {
        let store = MemoryZoneStore::new();
        let current = store.load(&config()).await.unwrap();

        let mut desired = Zone::from_config(&config());
        desired.add_record(Record::new("a.example.com", RecordType::A, vec!["192.0.2.1".into()]));
        let delta = compare_zones(&current, &desired);

        let outcome = store.apply(&config(), &delta).await.unwrap();
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.serial, Some(1));

        let reloaded = store.load(&config()).await.unwrap();
        assert_eq!(reloaded, desired);
        assert!(compare_zones(&reloaded, &desired).is_empty());
        assert_eq!(store.serial("example.com").await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_removal() {
        let store = MemoryZoneStore::new();
        let mut seeded = Zone::from_config(&config());
        seeded.add_record(Record::new("old.example.com", RecordType::A, vec!["192.0.2.9".into()]));
        store.seed(seeded.clone()).await;

        let delta = compare_zones(&seeded, &Zone::from_config(&config()));
        let outcome = store.apply(&config(), &delta).await.unwrap();
        assert_eq!(outcome.removed, 1);
        assert!(store.snapshot("example.com.").await.unwrap().is_empty());
    }
}

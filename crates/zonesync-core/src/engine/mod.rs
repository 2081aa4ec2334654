//! Sync engine
//!
//! The SyncEngine runs one reconciliation pass end to end:
//! - Fetching address inventory via IpamSource
//! - Building the desired zone contents with the Reconciler
//! - Loading current zone contents via ZoneStore
//! - Diffing and applying per-zone deltas
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐                 ┌──────────────┐
//! │ IpamSource  │── addresses ───▶│  Reconciler  │── desired ZoneSet ──┐
//! └─────────────┘                 └──────────────┘                     │
//!                                                                      ▼
//! ┌─────────────┐                                              ┌──────────────┐
//! │  ZoneStore  │────────────── current ZoneSet ──────────────▶│    diff      │
//! │  (load)     │                                              └──────────────┘
//! └─────────────┘                                                      │
//!        ▲                                                     per-zone delta
//!        │                                                             │
//!        └──────────────────── apply (per zone) ◀──────────────────────┘
//! ```
//!
//! ## Failure Isolation
//!
//! 1. Configuration errors fail `SyncEngine::new` before any I/O
//! 2. A fetch failure aborts the run (there is nothing to reconcile)
//! 3. Per-address failures are counted in the `ReconcileReport`
//! 4. A load or apply failure marks only that zone as failed

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::config::{SyncConfig, ZoneConfig};
use crate::diff::{self, ZoneChange, ZoneDelta};
use crate::error::{Error, Result};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::registry::PluginRegistry;
use crate::traits::{ApplyOutcome, IpamSource, ZoneStore};
use crate::zone::ZoneSet;

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Run started
    Started {
        zones: usize,
    },

    /// Address inventory fetched
    AddressesFetched {
        count: usize,
    },

    /// Zone already matches the desired state
    ZoneUnchanged {
        zone: String,
    },

    /// Delta written to the zone store
    ZoneApplied {
        zone: String,
        added: usize,
        removed: usize,
        serial: Option<u32>,
    },

    /// Delta computed but not written (dry run)
    ZonePlanned {
        zone: String,
        added: usize,
        removed: usize,
    },

    /// Stale records kept because the zone does not delete entries
    RemovalsSuppressed {
        zone: String,
        count: usize,
    },

    /// Loading or writing the zone failed
    ZoneFailed {
        zone: String,
        error: String,
    },

    /// Run finished
    Finished {
        zones_failed: usize,
    },
}

/// What happened to one zone during a run
#[derive(Debug)]
pub enum ZoneStatus {
    /// Nothing to write
    Unchanged,
    /// Delta written
    Applied(ApplyOutcome),
    /// Delta computed, writing skipped
    DryRun,
    /// Load or apply failed
    Failed(Error),
}

/// Per-zone result of a run
#[derive(Debug)]
pub struct ZoneOutcome {
    /// Zone name
    pub zone: String,
    /// Zone-level change between current and desired state
    pub change: ZoneChange,
    /// Records the delta adds
    pub to_add: usize,
    /// Records the delta removes (before `delete_entries` is honoured)
    pub to_remove: usize,
    /// Removals reported but not applied
    pub removals_suppressed: usize,
    /// Final status
    pub status: ZoneStatus,
}

impl ZoneOutcome {
    /// Whether this zone failed
    pub fn is_failed(&self) -> bool {
        matches!(self.status, ZoneStatus::Failed(_))
    }
}

/// Summary of one run
#[derive(Debug)]
pub struct SyncReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Entries returned by the IPAM source
    pub addresses_fetched: usize,
    /// Reconciliation counts and failure samples
    pub reconcile: ReconcileReport,
    /// One outcome per configured zone, ordered by zone name
    pub zones: Vec<ZoneOutcome>,
}

impl SyncReport {
    /// Whether any zone failed to load or apply
    pub fn has_failures(&self) -> bool {
        self.zones.iter().any(ZoneOutcome::is_failed)
    }

    /// Zones that failed
    pub fn failed_zones(&self) -> impl Iterator<Item = &ZoneOutcome> {
        self.zones.iter().filter(|z| z.is_failed())
    }

    /// Outcome for one zone
    pub fn zone(&self, name: &str) -> Option<&ZoneOutcome> {
        let wanted = crate::name::canonical_name(name);
        self.zones.iter().find(|z| z.zone == wanted)
    }
}

/// Core sync engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`] or [`SyncEngine::from_registry()`]
/// 2. Call [`SyncEngine::run_once()`] for a single pass, or
///    [`SyncEngine::run_periodic()`] to repeat until shutdown
///
/// ## Threading
///
/// A run is sequential: zones are loaded and written one after another and
/// the desired `ZoneSet` is owned by the run that builds it.
pub struct SyncEngine {
    /// Source of address inventory
    ipam: Box<dyn IpamSource>,

    /// Zone store per canonical zone name
    stores: HashMap<String, Arc<dyn ZoneStore>>,

    /// Validated configuration
    config: SyncConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,

    /// Set once the receiver is found dropped
    events_closed: AtomicBool,
}

impl SyncEngine {
    /// Create an engine that uses one store for every zone
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        ipam: Box<dyn IpamSource>,
        store: Box<dyn ZoneStore>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let store: Arc<dyn ZoneStore> = Arc::from(store);
        let stores = config
            .zones
            .iter()
            .map(|zone| (zone.canonical_name(), Arc::clone(&store)))
            .collect();

        Ok(Self::assemble(ipam, stores, config))
    }

    /// Create an engine with one store per zone type
    ///
    /// Every configured `zone_type` must have an entry in `stores`.
    pub fn with_stores(
        ipam: Box<dyn IpamSource>,
        stores: HashMap<String, Box<dyn ZoneStore>>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let by_type: HashMap<String, Arc<dyn ZoneStore>> = stores
            .into_iter()
            .map(|(zone_type, store)| (zone_type, Arc::from(store)))
            .collect();

        let mut per_zone = HashMap::new();
        for zone in &config.zones {
            let store = by_type.get(&zone.zone_type).ok_or_else(|| {
                Error::config(format!(
                    "No store for zone type {:?} (zone {})",
                    zone.zone_type, zone.name
                ))
            })?;
            per_zone.insert(zone.canonical_name(), Arc::clone(store));
        }

        Ok(Self::assemble(ipam, per_zone, config))
    }

    /// Create an engine whose source and stores come from a registry
    pub fn from_registry(
        registry: &PluginRegistry,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let ipam = registry.create_ipam_source(&config.ipam)?;

        // One store instance per zone type, shared by every zone of that type
        let mut by_type: HashMap<&str, Arc<dyn ZoneStore>> = HashMap::new();
        let mut stores = HashMap::new();
        for zone in &config.zones {
            let store = match by_type.get(zone.zone_type.as_str()) {
                Some(store) => Arc::clone(store),
                None => {
                    let store: Arc<dyn ZoneStore> = Arc::from(registry.create_zone_store(zone)?);
                    by_type.insert(&zone.zone_type, Arc::clone(&store));
                    store
                }
            };
            stores.insert(zone.canonical_name(), store);
        }

        Ok(Self::assemble(ipam, stores, config))
    }

    fn assemble(
        ipam: Box<dyn IpamSource>,
        stores: HashMap<String, Arc<dyn ZoneStore>>,
        config: SyncConfig,
    ) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);
        let engine = Self {
            ipam,
            stores,
            config,
            event_tx: tx,
            events_closed: AtomicBool::new(false),
        };
        (engine, rx)
    }

    /// The engine's configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(SyncReport)`: The run completed; individual zones may have failed
    /// - `Err(Error)`: The address inventory could not be fetched
    pub async fn run_once(&self) -> Result<SyncReport> {
        let started_at = Utc::now();
        self.emit_event(SyncEvent::Started {
            zones: self.config.zones.len(),
        });

        let addresses = self.ipam.fetch_addresses().await.map_err(|e| {
            error!("Unable to fetch addresses from {}: {}", self.ipam.source_name(), e);
            e
        })?;
        info!(
            "Found {} addresses for {} zones",
            addresses.len(),
            self.config.zones.len()
        );
        self.emit_event(SyncEvent::AddressesFetched {
            count: addresses.len(),
        });

        let mut desired = ZoneSet::from_configs(&self.config.zones);
        let reconcile = Reconciler::new(&mut desired)
            .with_sample_size(self.config.engine.failure_sample_size)
            .add_addresses(&addresses);
        info!(
            "Reconciled {} records ({} failures)",
            reconcile.records_added(),
            reconcile.failure_count
        );

        let (current, mut load_failures) = self.load_current().await;

        let mut zones = Vec::with_capacity(self.config.zones.len());
        for delta in diff::compare(&current, &desired) {
            let outcome = match load_failures.remove(&delta.zone) {
                Some(error) => ZoneOutcome {
                    zone: delta.zone.clone(),
                    change: delta.change,
                    to_add: 0,
                    to_remove: 0,
                    removals_suppressed: 0,
                    status: ZoneStatus::Failed(error),
                },
                None => self.sync_zone(delta).await,
            };
            zones.push(outcome);
        }

        let report = SyncReport {
            started_at,
            finished_at: Utc::now(),
            addresses_fetched: addresses.len(),
            reconcile,
            zones,
        };

        let zones_failed = report.failed_zones().count();
        if zones_failed > 0 {
            warn!("Sync finished with {} failed zone(s)", zones_failed);
        } else {
            info!("Sync finished");
        }
        self.emit_event(SyncEvent::Finished { zones_failed });

        Ok(report)
    }

    /// Load every configured zone; failures are returned per zone
    async fn load_current(&self) -> (ZoneSet, HashMap<String, Error>) {
        let mut current = ZoneSet::new();
        let mut failures = HashMap::new();

        for config in &self.config.zones {
            let name = config.canonical_name();
            let result = match self.stores.get(&name) {
                Some(store) => store.load(config).await,
                None => Err(Error::zone_storage(&name, "no store configured")),
            };

            match result {
                Ok(mut zone) => {
                    debug!("Loaded zone {} ({} records)", name, zone.record_count());
                    zone.name = name;
                    current.add_zone(zone);
                }
                Err(e) => {
                    error!("Failed to load zone {}: {}", name, e);
                    self.emit_event(SyncEvent::ZoneFailed {
                        zone: name.clone(),
                        error: e.to_string(),
                    });
                    failures.insert(name, e);
                }
            }
        }

        (current, failures)
    }

    /// Apply one zone's delta, honouring `delete_entries` and dry-run
    async fn sync_zone(&self, delta: ZoneDelta) -> ZoneOutcome {
        let mut outcome = ZoneOutcome {
            zone: delta.zone.clone(),
            change: delta.change,
            to_add: delta.added_count(),
            to_remove: delta.removed_count(),
            removals_suppressed: 0,
            status: ZoneStatus::Unchanged,
        };

        let Some(config) = self.zone_config(&delta.zone) else {
            // Zones only in the current snapshot are never configured
            // because the current snapshot is loaded from the config.
            outcome.status = ZoneStatus::Failed(Error::zone_storage(&delta.zone, "zone not configured"));
            return outcome;
        };

        if delta.is_empty() {
            debug!("Zone {} unchanged", delta.zone);
            self.emit_event(SyncEvent::ZoneUnchanged { zone: delta.zone });
            return outcome;
        }

        let changes = if config.delete_entries {
            delta
        } else {
            if outcome.to_remove > 0 {
                info!(
                    "Zone {}: keeping {} stale record(s), delete_entries is off",
                    delta.zone, outcome.to_remove
                );
                for record in delta.removals() {
                    debug!("Stale: {}", record);
                }
                outcome.removals_suppressed = outcome.to_remove;
                self.emit_event(SyncEvent::RemovalsSuppressed {
                    zone: delta.zone.clone(),
                    count: outcome.to_remove,
                });
            }
            delta.without_removals()
        };

        if changes.is_empty() {
            self.emit_event(SyncEvent::ZoneUnchanged {
                zone: changes.zone,
            });
            return outcome;
        }

        let added = changes.added_count();
        let removed = changes.removed_count();

        if self.config.engine.dry_run {
            info!("[dry-run] Zone {}: {} to add, {} to remove", changes.zone, added, removed);
            for record in changes.additions() {
                info!("[dry-run] + {}", record);
            }
            for record in changes.removals() {
                info!("[dry-run] - {}", record);
            }
            self.emit_event(SyncEvent::ZonePlanned {
                zone: changes.zone.clone(),
                added,
                removed,
            });
            outcome.status = ZoneStatus::DryRun;
            return outcome;
        }

        let result = match self.stores.get(&changes.zone) {
            Some(store) => store.apply(config, &changes).await,
            None => Err(Error::zone_storage(&changes.zone, "no store configured")),
        };

        match result {
            Ok(applied) => {
                info!(
                    "Zone {}: added {}, removed {} (serial {:?})",
                    changes.zone, applied.added, applied.removed, applied.serial
                );
                self.emit_event(SyncEvent::ZoneApplied {
                    zone: changes.zone.clone(),
                    added: applied.added,
                    removed: applied.removed,
                    serial: applied.serial,
                });
                outcome.status = ZoneStatus::Applied(applied);
            }
            Err(e) => {
                error!("Failed to write zone {}: {}", changes.zone, e);
                self.emit_event(SyncEvent::ZoneFailed {
                    zone: changes.zone.clone(),
                    error: e.to_string(),
                });
                outcome.status = ZoneStatus::Failed(e);
            }
        }

        outcome
    }

    fn zone_config(&self, name: &str) -> Option<&ZoneConfig> {
        self.config.zone(name)
    }

    /// Run a pass every `period` until shutdown
    ///
    /// Failed runs are logged and retried on the next tick. Without a
    /// shutdown receiver the loop stops on Ctrl-C.
    pub async fn run_periodic(
        &self,
        period: Duration,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!("Sync run failed: {}", e);
                        // Continue running despite errors
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Emit an engine event
    fn emit_event(&self, event: SyncEvent) {
        // Full channel: drop the event rather than block the run
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {
                if !self.events_closed.swap(true, Ordering::Relaxed) {
                    debug!("Event receiver dropped; engine events are no longer delivered");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_event_clone_eq() {
        let event = SyncEvent::ZoneApplied {
            zone: "example.com.".to_string(),
            added: 2,
            removed: 0,
            serial: Some(2026101601),
        };

        let _ = event.clone();
        assert_eq!(event.clone(), event);
    }

    fn engine_with_capacity(capacity: usize) -> (SyncEngine, mpsc::Receiver<SyncEvent>) {
        let mut config = SyncConfig::new(
            crate::config::IpamConfig::Static { addresses: vec![] },
            vec![ZoneConfig::new("example.com", 300).with_zone_type("memory")],
        );
        config.engine.event_channel_capacity = capacity;
        SyncEngine::new(
            Box::new(crate::source::StaticIpamSource::new(vec![])),
            Box::new(crate::store::MemoryZoneStore::new()),
            config,
        )
        .unwrap()
    }

    #[test]
    fn test_full_channel_is_not_closed() {
        let (engine, mut events) = engine_with_capacity(1);
        engine.emit_event(SyncEvent::Started { zones: 1 });
        engine.emit_event(SyncEvent::Finished { zones_failed: 0 });

        assert!(!engine.events_closed.load(Ordering::Relaxed));
        assert_eq!(events.try_recv().unwrap(), SyncEvent::Started { zones: 1 });
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_noted_once() {
        let (engine, events) = engine_with_capacity(4);
        drop(events);

        engine.emit_event(SyncEvent::Started { zones: 1 });
        assert!(engine.events_closed.load(Ordering::Relaxed));

        // Runs keep working without anyone listening
        let report = engine.run_once().await.unwrap();
        assert!(!report.has_failures());
        assert!(engine.events_closed.load(Ordering::Relaxed));
    }
}

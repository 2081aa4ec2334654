//! Test doubles and common utilities for contract tests
//!
//! These doubles count calls and capture what the engine hands them so the
//! tests can assert on behaviour without a real IPAM or zone file.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use zonesync_core::config::{IpamConfig, SyncConfig, ZoneConfig};
use zonesync_core::diff::ZoneDelta;
use zonesync_core::error::{Error, Result};
use zonesync_core::store::MemoryZoneStore;
use zonesync_core::traits::{ApplyOutcome, IpamAddress, IpamSource, ZoneStore};
use zonesync_core::zone::Zone;

/// Active, named address entry
pub fn active(address: &str, dns_name: &str) -> IpamAddress {
    IpamAddress::new(address, dns_name, "active")
}

/// Zone configuration backed by the memory store
pub fn memory_zone(name: &str, ttl: u32) -> ZoneConfig {
    ZoneConfig::new(name, ttl).with_zone_type("memory")
}

/// Config with a static source and the given zones
pub fn static_config(addresses: Vec<IpamAddress>, zones: Vec<ZoneConfig>) -> SyncConfig {
    SyncConfig::new(IpamConfig::Static { addresses }, zones)
}

/// IPAM source that counts fetches and can be told to fail
pub struct CountingIpamSource {
    addresses: Vec<IpamAddress>,
    fail: bool,
    fetch_count: Arc<AtomicUsize>,
}

impl CountingIpamSource {
    pub fn new(addresses: Vec<IpamAddress>) -> Self {
        Self {
            addresses,
            fail: false,
            fetch_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn fetch_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fetch_count)
    }
}

#[async_trait]
impl IpamSource for CountingIpamSource {
    async fn fetch_addresses(&self) -> Result<Vec<IpamAddress>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::ipam("inventory unavailable"));
        }
        Ok(self.addresses.clone())
    }

    fn source_name(&self) -> &'static str {
        "counting"
    }
}

/// Zone store wrapping a `MemoryZoneStore` that records every delta it
/// receives and can fail loads or applies for one named zone.
#[derive(Clone, Default)]
pub struct RecordingZoneStore {
    inner: MemoryZoneStore,
    applied: Arc<Mutex<Vec<ZoneDelta>>>,
    fail_load: Option<String>,
    fail_apply: Option<String>,
}

impl RecordingZoneStore {
    pub fn new(inner: MemoryZoneStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Fail `load` for the named zone
    pub fn failing_load(mut self, zone: &str) -> Self {
        self.fail_load = Some(zone.to_string());
        self
    }

    /// Fail `apply` for the named zone
    pub fn failing_apply(mut self, zone: &str) -> Self {
        self.fail_apply = Some(zone.to_string());
        self
    }

    /// Deltas passed to `apply`, in call order
    pub fn applied(&self) -> Vec<ZoneDelta> {
        self.applied.lock().unwrap().clone()
    }

    /// Seed the underlying memory store
    pub async fn seed(&self, zone: Zone) {
        self.inner.seed(zone).await;
    }

    /// Contents of one zone in the underlying memory store
    pub async fn snapshot(&self, zone: &str) -> Option<Zone> {
        self.inner.snapshot(zone).await
    }
}

#[async_trait]
impl ZoneStore for RecordingZoneStore {
    async fn load(&self, zone: &ZoneConfig) -> Result<Zone> {
        if self.fail_load.as_deref() == Some(zone.canonical_name().as_str()) {
            return Err(Error::zone_storage(zone.canonical_name(), "load refused"));
        }
        self.inner.load(zone).await
    }

    async fn apply(&self, zone: &ZoneConfig, changes: &ZoneDelta) -> Result<ApplyOutcome> {
        if self.fail_apply.as_deref() == Some(zone.canonical_name().as_str()) {
            return Err(Error::zone_storage(zone.canonical_name(), "write refused"));
        }
        self.applied.lock().unwrap().push(changes.clone());
        self.inner.apply(zone, changes).await
    }

    fn store_name(&self) -> &'static str {
        "recording"
    }
}

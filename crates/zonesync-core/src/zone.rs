//! Zones and the zone set
//!
//! A [`Zone`] holds records keyed by owner name. A [`ZoneSet`] is the
//! collection of all known zones and routes each inbound record to the most
//! specific zone containing it (longest-suffix match).
//!
//! ## Ordering Index
//!
//! `ZoneSet` keeps a derived list of zone names sorted longest first. The
//! list is rebuilt inside [`ZoneSet::add_zone`], the only method that changes
//! the zone map, so it can never be observed out of sync with the map.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::config::ZoneConfig;
use crate::error::{Error, Result};
use crate::name::{canonical_name, fqdn, is_in_zone};
use crate::record::{Record, resolve_ttl};

/// A single DNS zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Dot-terminated, lower-case apex name
    pub name: String,
    /// Storage locator (a filename for zone files); opaque to the core
    pub locator: Option<String>,
    /// Default TTL for records inserted with an inherited TTL
    pub ttl: u32,
    /// Records keyed by owner name
    records: BTreeMap<String, Vec<Record>>,
}

impl Zone {
    /// Create an empty zone
    pub fn new(name: &str, ttl: u32) -> Self {
        Self {
            name: canonical_name(name),
            locator: None,
            ttl,
            records: BTreeMap::new(),
        }
    }

    /// Create an empty zone from its configuration
    pub fn from_config(config: &ZoneConfig) -> Self {
        let mut zone = Self::new(&config.name, config.ttl);
        zone.locator = config.filename.clone();
        zone
    }

    /// Set the storage locator
    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    /// Add a record to this zone.
    ///
    /// An inherited TTL is resolved to the zone default. This does not check
    /// that the record belongs in this zone; [`ZoneSet::add_record`] does.
    pub fn add_record(&mut self, mut record: Record) {
        record.ttl = resolve_ttl(record.ttl, self.ttl);
        self.records
            .entry(record.name.clone())
            .or_default()
            .push(record);
    }

    /// Remove the first record equal to `record`.
    ///
    /// Returns `false` if no such record exists.
    pub fn remove_record(&mut self, record: &Record) -> bool {
        let Some(records) = self.records.get_mut(&record.name) else {
            return false;
        };
        let Some(pos) = records.iter().position(|r| r == record) else {
            return false;
        };
        records.remove(pos);
        if records.is_empty() {
            self.records.remove(&record.name);
        }
        true
    }

    /// Records keyed by owner name
    pub fn records(&self) -> &BTreeMap<String, Vec<Record>> {
        &self.records
    }

    /// Records for one owner name (empty if none)
    pub fn records_for(&self, name: &str) -> &[Record] {
        self.records.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over every record in owner-name order
    pub fn iter_records(&self) -> impl Iterator<Item = &Record> {
        self.records.values().flatten()
    }

    /// Total number of records
    pub fn record_count(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    /// Whether the zone holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The set of all known zones
#[derive(Debug, Clone, Default)]
pub struct ZoneSet {
    zones: HashMap<String, Zone>,
    /// Zone names, longest first
    by_length: Vec<String>,
}

impl ZoneSet {
    /// Create an empty zone set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zone set with one empty zone per configuration entry
    pub fn from_configs(configs: &[ZoneConfig]) -> Self {
        let mut set = Self::new();
        for config in configs {
            set.new_zone(config);
        }
        set
    }

    /// Create an empty zone from its configuration and add it
    pub fn new_zone(&mut self, config: &ZoneConfig) {
        self.add_zone(Zone::from_config(config));
    }

    /// Add a zone, replacing any zone with the same name.
    ///
    /// Returns the replaced zone, if any.
    pub fn add_zone(&mut self, zone: Zone) -> Option<Zone> {
        let previous = self.zones.insert(zone.name.clone(), zone);
        self.rebuild_order();
        previous
    }

    fn rebuild_order(&mut self) {
        let mut names: Vec<String> = self.zones.keys().cloned().collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        self.by_length = names;
        debug_assert_eq!(self.by_length.len(), self.zones.len());
    }

    /// Look up a zone by name (trailing dot and case are ignored)
    pub fn zone(&self, name: &str) -> Option<&Zone> {
        self.zones.get(&canonical_name(name))
    }

    /// Iterate over zones, longest name first
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.by_length.iter().filter_map(|name| self.zones.get(name))
    }

    /// Zone names, longest first
    pub fn zone_names(&self) -> &[String] {
        &self.by_length
    }

    /// Number of zones
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Whether the set has no zones
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Find the most specific zone containing `name`
    pub fn find_zone(&self, name: &str) -> Option<&Zone> {
        let name = fqdn(name);
        self.by_length
            .iter()
            .find(|zone| is_in_zone(&name, zone))
            .and_then(|zone| self.zones.get(zone))
    }

    /// Add a record to the most specific zone containing its owner name.
    ///
    /// Returns the name of the zone the record landed in. Fails with
    /// [`Error::NoMatchingZone`] and leaves every zone untouched when no
    /// zone contains the name.
    pub fn add_record(&mut self, record: Record) -> Result<String> {
        let zone_name = self
            .by_length
            .iter()
            .find(|zone| is_in_zone(&record.name, zone))
            .cloned()
            .ok_or_else(|| Error::no_matching_zone(&record.name, self.by_length.clone()))?;

        let zone = self
            .zones
            .get_mut(&zone_name)
            .ok_or_else(|| Error::Other(format!("zone index out of sync for {zone_name}")))?;

        debug!(record = %record, zone = %zone_name, "Adding record");
        zone.add_record(record);
        Ok(zone_name)
    }
}

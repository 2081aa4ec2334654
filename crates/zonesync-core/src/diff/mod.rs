//! Zone snapshot comparison
//!
//! [`compare`] takes two [`ZoneSet`] snapshots (`older` = current state,
//! `newer` = desired state) and produces one [`ZoneDelta`] per zone in either
//! snapshot. There is no "modify" kind: a changed record shows up as one
//! removal plus one addition.
//!
//! Records are compared with structural equality over every field, rdata
//! order included. Two records holding the same values in a different order
//! are different records.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::record::Record;
use crate::zone::{Zone, ZoneSet};

/// How a zone relates across the two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneChange {
    /// Present only in the newer snapshot
    Added,
    /// Present only in the older snapshot
    Removed,
    /// Present in both
    Existing,
}

/// Records to add and remove for one zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneDelta {
    /// Zone name
    pub zone: String,
    /// Zone-level change
    pub change: ZoneChange,
    /// Records to add, keyed by owner name
    pub add_records: BTreeMap<String, Vec<Record>>,
    /// Records to remove, keyed by owner name
    pub remove_records: BTreeMap<String, Vec<Record>>,
}

impl ZoneDelta {
    /// An empty delta
    pub fn new(zone: impl Into<String>, change: ZoneChange) -> Self {
        Self {
            zone: zone.into(),
            change,
            add_records: BTreeMap::new(),
            remove_records: BTreeMap::new(),
        }
    }

    /// No additions and no removals
    pub fn is_empty(&self) -> bool {
        self.add_records.is_empty() && self.remove_records.is_empty()
    }

    /// Number of records to add
    pub fn added_count(&self) -> usize {
        self.add_records.values().map(Vec::len).sum()
    }

    /// Number of records to remove
    pub fn removed_count(&self) -> usize {
        self.remove_records.values().map(Vec::len).sum()
    }

    /// Iterate over records to add
    pub fn additions(&self) -> impl Iterator<Item = &Record> {
        self.add_records.values().flatten()
    }

    /// Iterate over records to remove
    pub fn removals(&self) -> impl Iterator<Item = &Record> {
        self.remove_records.values().flatten()
    }

    /// Copy of this delta with removals dropped
    pub fn without_removals(&self) -> Self {
        Self {
            zone: self.zone.clone(),
            change: self.change,
            add_records: self.add_records.clone(),
            remove_records: BTreeMap::new(),
        }
    }

    fn push_added(&mut self, name: &str, records: Vec<Record>) {
        if !records.is_empty() {
            self.add_records.entry(name.to_string()).or_default().extend(records);
        }
    }

    fn push_removed(&mut self, name: &str, records: Vec<Record>) {
        if !records.is_empty() {
            self.remove_records.entry(name.to_string()).or_default().extend(records);
        }
    }
}

/// Result of comparing two record sequences for one owner name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordChanges {
    /// Records only in the newer sequence
    pub added: Vec<Record>,
    /// Records only in the older sequence
    pub removed: Vec<Record>,
}

/// Multiset difference of two record sequences.
///
/// Each older record consumes at most one equal, not yet consumed, newer
/// record. Unconsumed older records are removals and unconsumed newer
/// records are additions, both in their original order. Quadratic, which is
/// fine for the handful of records an owner name carries.
pub fn diff_records(older: &[Record], newer: &[Record]) -> RecordChanges {
    let mut consumed = vec![false; newer.len()];
    let mut removed = Vec::new();

    for old in older {
        match (0..newer.len()).find(|&i| !consumed[i] && newer[i] == *old) {
            Some(i) => consumed[i] = true,
            None => removed.push(old.clone()),
        }
    }

    let added = newer
        .iter()
        .zip(&consumed)
        .filter(|(_, used)| !**used)
        .map(|(record, _)| record.clone())
        .collect();

    RecordChanges { added, removed }
}

/// Compare two snapshots of the same zone
pub fn compare_zones(older: &Zone, newer: &Zone) -> ZoneDelta {
    let mut delta = ZoneDelta::new(&newer.name, ZoneChange::Existing);

    let names: BTreeSet<&String> = older.records().keys().chain(newer.records().keys()).collect();
    for name in names {
        let changes = diff_records(older.records_for(name), newer.records_for(name));
        delta.push_added(name, changes.added);
        delta.push_removed(name, changes.removed);
    }

    debug!(
        "Zone {}: {} to add, {} to remove",
        delta.zone,
        delta.added_count(),
        delta.removed_count()
    );
    delta
}

/// Compare two zone-set snapshots.
///
/// Returns one delta per zone in the union of both sets, ordered by zone
/// name. A zone only in `newer` is [`ZoneChange::Added`] with all of its
/// records as additions; a zone only in `older` is [`ZoneChange::Removed`]
/// with all of its records as removals.
pub fn compare(older: &ZoneSet, newer: &ZoneSet) -> Vec<ZoneDelta> {
    let names: BTreeSet<&String> = older.zone_names().iter().chain(newer.zone_names()).collect();

    names
        .into_iter()
        .map(|name| match (older.zone(name), newer.zone(name)) {
            (Some(old), Some(new)) => compare_zones(old, new),
            (None, Some(new)) => {
                info!("New zone {} ({} records)", name, new.record_count());
                let mut delta = ZoneDelta::new(name.as_str(), ZoneChange::Added);
                for (owner, records) in new.records() {
                    delta.push_added(owner, records.clone());
                }
                delta
            }
            (Some(old), None) => {
                info!("Zone {} no longer present ({} records)", name, old.record_count());
                let mut delta = ZoneDelta::new(name.as_str(), ZoneChange::Removed);
                for (owner, records) in old.records() {
                    delta.push_removed(owner, records.clone());
                }
                delta
            }
            (None, None) => ZoneDelta::new(name.as_str(), ZoneChange::Existing),
        })
        .collect()
}

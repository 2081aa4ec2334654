//! Contract Test: Snapshot Comparison
//!
//! Constraints verified:
//! - Comparing a snapshot with itself yields only empty deltas
//! - Swapping the arguments swaps additions and removals
//! - Every zone in either snapshot gets a delta
//!
//! If this test fails, the differ has stopped being a pure multiset
//! difference over structurally equal records.

use std::collections::BTreeMap;

use zonesync_core::diff::{ZoneChange, ZoneDelta, compare};
use zonesync_core::record::{Record, RecordType};
use zonesync_core::zone::{Zone, ZoneSet};

fn record(name: &str, record_type: RecordType, rdata: &str) -> Record {
    Record::new(name, record_type, vec![rdata.to_string()])
}

fn first_snapshot() -> ZoneSet {
    let mut set = ZoneSet::new();
    set.add_zone(Zone::new("example.com.", 300));
    set.add_zone(Zone::new("2.0.192.in-addr.arpa.", 300));
    set.add_zone(Zone::new("retired.test.", 300));

    set.add_record(record("a.example.com.", RecordType::A, "192.0.2.1")).unwrap();
    set.add_record(record("b.example.com.", RecordType::A, "192.0.2.2")).unwrap();
    set.add_record(record("b.example.com.", RecordType::A, "192.0.2.2")).unwrap();
    set.add_record(record("1.2.0.192.in-addr.arpa.", RecordType::Ptr, "a.example.com.")).unwrap();
    set.add_record(record("h.retired.test.", RecordType::A, "192.0.2.50")).unwrap();
    set
}

fn second_snapshot() -> ZoneSet {
    let mut set = ZoneSet::new();
    set.add_zone(Zone::new("example.com.", 300));
    set.add_zone(Zone::new("2.0.192.in-addr.arpa.", 300));
    set.add_zone(Zone::new("fresh.test.", 300));

    set.add_record(record("a.example.com.", RecordType::A, "192.0.2.1").with_ttl(60)).unwrap();
    set.add_record(record("b.example.com.", RecordType::A, "192.0.2.2")).unwrap();
    set.add_record(record("c.example.com.", RecordType::Aaaa, "2001:db8::c")).unwrap();
    set.add_record(record("1.2.0.192.in-addr.arpa.", RecordType::Ptr, "a.example.com.")).unwrap();
    set.add_record(record("h.fresh.test.", RecordType::A, "192.0.2.60")).unwrap();
    set
}

fn by_zone(deltas: Vec<ZoneDelta>) -> BTreeMap<String, ZoneDelta> {
    deltas.into_iter().map(|d| (d.zone.clone(), d)).collect()
}

fn sorted(records: impl Iterator<Item = Record>) -> Vec<String> {
    let mut out: Vec<String> = records.map(|r| r.to_string()).collect();
    out.sort();
    out
}

#[test]
fn comparing_a_snapshot_with_itself_is_empty() {
    for snapshot in [first_snapshot(), second_snapshot(), ZoneSet::new()] {
        let deltas = compare(&snapshot, &snapshot);
        assert_eq!(deltas.len(), snapshot.len());
        for delta in deltas {
            assert!(delta.add_records.is_empty(), "{} has additions", delta.zone);
            assert!(delta.remove_records.is_empty(), "{} has removals", delta.zone);
            assert_eq!(delta.change, ZoneChange::Existing);
        }
    }
}

#[test]
fn swapping_arguments_swaps_additions_and_removals() {
    let (s1, s2) = (first_snapshot(), second_snapshot());
    let forward = by_zone(compare(&s1, &s2));
    let backward = by_zone(compare(&s2, &s1));

    assert_eq!(
        forward.keys().collect::<Vec<_>>(),
        backward.keys().collect::<Vec<_>>()
    );

    for (zone, there) in &forward {
        let back = &backward[zone];
        assert_eq!(
            sorted(there.additions().cloned()),
            sorted(back.removals().cloned()),
            "additions of {zone}"
        );
        assert_eq!(
            sorted(there.removals().cloned()),
            sorted(back.additions().cloned()),
            "removals of {zone}"
        );
    }
}

#[test]
fn every_zone_in_either_snapshot_is_reported() {
    let deltas = by_zone(compare(&first_snapshot(), &second_snapshot()));

    assert_eq!(deltas.len(), 4);
    assert_eq!(deltas["fresh.test."].change, ZoneChange::Added);
    assert_eq!(deltas["fresh.test."].added_count(), 1);
    assert_eq!(deltas["retired.test."].change, ZoneChange::Removed);
    assert_eq!(deltas["retired.test."].removed_count(), 1);
    assert!(deltas["2.0.192.in-addr.arpa."].is_empty());

    // TTL change on a, one of two duplicate b records dropped, c added
    let example = &deltas["example.com."];
    assert_eq!(example.added_count(), 2);
    assert_eq!(example.removed_count(), 2);
    assert_eq!(example.remove_records["b.example.com."].len(), 1);
}

#[test]
fn owner_name_case_does_not_count_as_a_change() {
    let mut hand_written = ZoneSet::new();
    hand_written.add_zone(Zone::new("Example.COM.", 300));
    hand_written.add_zone(Zone::new("2.0.192.in-addr.arpa.", 300));
    hand_written.add_record(record("HOST.Example.com.", RecordType::A, "192.0.2.1")).unwrap();
    hand_written.add_record(record("1.2.0.192.IN-ADDR.ARPA.", RecordType::Ptr, "host.example.com.")).unwrap();

    let mut synthesized = ZoneSet::new();
    synthesized.add_zone(Zone::new("example.com.", 300));
    synthesized.add_zone(Zone::new("2.0.192.in-addr.arpa.", 300));
    synthesized.add_record(record("host.example.com", RecordType::A, "192.0.2.1")).unwrap();
    synthesized.add_record(record("1.2.0.192.in-addr.arpa", RecordType::Ptr, "host.example.com.")).unwrap();

    let deltas = compare(&hand_written, &synthesized);
    assert_eq!(deltas.len(), 2);
    assert!(deltas.iter().all(ZoneDelta::is_empty), "{deltas:?}");
}

//! Address-to-record reconciliation
//!
//! The [`Reconciler`] turns IPAM address entries into forward (A/AAAA) and
//! reverse (PTR) records and files them into a [`ZoneSet`].
//!
//! ## Partial Failure
//!
//! A malformed address or a name outside every configured zone is recorded
//! in the [`ReconcileReport`] and processing moves on to the next entry. One
//! bad entry never blocks the rest of the inventory.

use std::fmt::Write as _;
use std::net::IpAddr;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::name::canonical_name;
use crate::record::{Record, RecordType};
use crate::traits::IpamAddress;
use crate::zone::ZoneSet;

/// Default number of failures kept as samples
pub const DEFAULT_FAILURE_SAMPLES: usize = 10;

/// Reverse-lookup name for an address.
///
/// IPv4 maps into `in-addr.arpa.` with octets reversed. IPv6 maps into
/// `ip6.arpa.` with one label per nibble, last byte first and low nibble
/// before high nibble, in lower-case hex.
pub fn reverse_name(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => {
            let [o0, o1, o2, o3] = v4.octets();
            format!("{o3}.{o2}.{o1}.{o0}.in-addr.arpa.")
        }
        IpAddr::V6(v6) => {
            let mut name = String::with_capacity(72);
            for byte in v6.octets().iter().rev() {
                let _ = write!(name, "{:x}.{:x}.", byte & 0x0f, byte >> 4);
            }
            name.push_str("ip6.arpa.");
            name
        }
    }
}

/// Forward record for `dns_name` pointing at `ip`
pub fn forward_record(ip: IpAddr, dns_name: &str) -> Record {
    let record_type = match ip {
        IpAddr::V4(_) => RecordType::A,
        IpAddr::V6(_) => RecordType::Aaaa,
    };
    Record::new(dns_name, record_type, vec![ip.to_string()])
}

/// PTR record mapping `ip` back to `dns_name`
pub fn reverse_record(ip: IpAddr, dns_name: &str) -> Record {
    Record::new(&reverse_name(ip), RecordType::Ptr, vec![canonical_name(dns_name)])
}

/// Build the forward/reverse pair for one entry.
///
/// Returns `Ok(None)` for entries that produce no DNS data (empty name or a
/// status other than `"active"`), and [`Error::MalformedAddress`] when the
/// address cannot be parsed.
pub fn synthesize(entry: &IpamAddress) -> Result<Option<(Record, Record)>> {
    let dns_name = entry.dns_name.trim();
    if dns_name.is_empty() || !entry.is_active() {
        return Ok(None);
    }
    let ip = entry.ip()?;
    Ok(Some((forward_record(ip, dns_name), reverse_record(ip, dns_name))))
}

/// Which step of an entry failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The address did not parse
    Address,
    /// The A/AAAA record had no zone
    Forward,
    /// The PTR record had no zone
    Reverse,
}

/// A single reconciliation failure
#[derive(Debug)]
pub struct ReconcileFailure {
    /// Address literal from the source
    pub address: String,
    /// DNS name from the source
    pub dns_name: String,
    /// Where it failed
    pub stage: FailureStage,
    /// Why it failed
    pub error: Error,
}

/// Summary of one reconciliation pass
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Entries examined
    pub addresses_seen: usize,
    /// Entries skipped for having no DNS name
    pub skipped_unnamed: usize,
    /// Entries skipped for a status other than `"active"`
    pub skipped_inactive: usize,
    /// Forward records placed in a zone
    pub forward_added: usize,
    /// Reverse records placed in a zone
    pub reverse_added: usize,
    /// Total failures, including those not sampled
    pub failure_count: usize,
    /// The first failures, up to the configured sample size
    pub failures: Vec<ReconcileFailure>,
}

impl ReconcileReport {
    /// Whether every eligible entry was placed without error
    pub fn is_clean(&self) -> bool {
        self.failure_count == 0
    }

    /// Total records placed in zones
    pub fn records_added(&self) -> usize {
        self.forward_added + self.reverse_added
    }
}

/// Feeds IPAM entries into a [`ZoneSet`]
pub struct Reconciler<'a> {
    zones: &'a mut ZoneSet,
    sample_size: usize,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler over a zone set
    pub fn new(zones: &'a mut ZoneSet) -> Self {
        Self {
            zones,
            sample_size: DEFAULT_FAILURE_SAMPLES,
        }
    }

    /// Keep at most `sample_size` failures in reports
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Reconcile every entry, continuing past failures
    pub fn add_addresses(&mut self, entries: &[IpamAddress]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for entry in entries {
            self.add_address(entry, &mut report);
        }

        if !report.is_clean() {
            warn!(
                "Reconciled {} addresses with {} failure(s)",
                report.addresses_seen, report.failure_count
            );
        }
        report
    }

    /// Reconcile one entry into the zone set, recording the outcome in `report`
    pub fn add_address(&mut self, entry: &IpamAddress, report: &mut ReconcileReport) {
        report.addresses_seen += 1;

        if entry.dns_name.trim().is_empty() {
            debug!("Skipping {}: no DNS name", entry.address);
            report.skipped_unnamed += 1;
            return;
        }
        if !entry.is_active() {
            debug!("Skipping {} ({}): status {:?}", entry.address, entry.dns_name, entry.status);
            report.skipped_inactive += 1;
            return;
        }

        let (forward, reverse) = match synthesize(entry) {
            Ok(Some(pair)) => pair,
            Ok(None) => return,
            Err(e) => {
                warn!("Unable to parse address {:?}: {}", entry.address, e);
                self.record_failure(report, entry, FailureStage::Address, e);
                return;
            }
        };

        match self.zones.add_record(forward) {
            Ok(_) => report.forward_added += 1,
            Err(e) => {
                warn!("Unable to add forward record: {}", e);
                self.record_failure(report, entry, FailureStage::Forward, e);
            }
        }

        match self.zones.add_record(reverse) {
            Ok(_) => report.reverse_added += 1,
            Err(e) => {
                warn!("Unable to add reverse record: {}", e);
                self.record_failure(report, entry, FailureStage::Reverse, e);
            }
        }
    }

    fn record_failure(
        &self,
        report: &mut ReconcileReport,
        entry: &IpamAddress,
        stage: FailureStage,
        error: Error,
    ) {
        report.failure_count += 1;
        if report.failures.len() < self.sample_size {
            report.failures.push(ReconcileFailure {
                address: entry.address.clone(),
                dns_name: entry.dns_name.clone(),
                stage,
                error,
            });
        }
    }
}

//! DNS resource records
//!
//! A [`Record`] is plain data: owner name, type, TTL and an ordered list of
//! rdata strings. Equality is structural over every field, which is what the
//! differ uses to decide whether two records are "the same".

use std::fmt;
use std::str::FromStr;

use crate::name::canonical_name;

/// TTL value meaning "inherit the zone's default TTL".
///
/// Only meaningful before a record is inserted into a zone; see [`resolve_ttl`].
pub const INHERIT_TTL: u32 = 0;

/// Resolve a record TTL against a zone default.
///
/// This is the only place that interprets [`INHERIT_TTL`].
pub fn resolve_ttl(record_ttl: u32, zone_default: u32) -> u32 {
    if record_ttl == INHERIT_TTL {
        zone_default
    } else {
        record_ttl
    }
}

/// DNS record type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordType {
    /// IPv4 address
    A,
    /// IPv6 address
    Aaaa,
    /// Reverse pointer
    Ptr,
    /// Start of authority
    Soa,
    /// Any other type, upper-cased mnemonic
    Other(String),
}

impl RecordType {
    /// Mnemonic as written in zone files
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Ptr => "PTR",
            RecordType::Soa => "SOA",
            RecordType::Other(name) => name,
        }
    }

    /// Types the reconciler synthesizes
    pub fn is_address_or_pointer(&self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa | RecordType::Ptr)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Ok(match upper.as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            "PTR" => RecordType::Ptr,
            "SOA" => RecordType::Soa,
            _ => RecordType::Other(upper),
        })
    }
}

/// A single DNS resource record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    /// Fully-qualified, dot-terminated owner name
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// TTL in seconds; [`INHERIT_TTL`] until placed in a zone
    pub ttl: u32,
    /// Ordered rdata values
    pub rdata: Vec<String>,
}

impl Record {
    /// Create a record that inherits its zone's TTL.
    ///
    /// The owner name is canonicalized to dot-terminated, lower-case form.
    pub fn new(name: &str, record_type: RecordType, rdata: Vec<String>) -> Self {
        Self {
            name: canonical_name(name),
            record_type,
            ttl: INHERIT_TTL,
            rdata,
        }
    }

    /// Set an explicit TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} [{}]", self.name, self.ttl, self.record_type, self.rdata.join(", "))
    }
}

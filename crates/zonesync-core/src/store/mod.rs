// # Zone Store Implementations
//
// This module provides the in-memory implementation of the ZoneStore trait.
// File-backed storage lives in the `zonesync-store-zonefile` crate.

pub mod memory;

pub use memory::{MemoryZoneStore, MemoryZoneStoreFactory};

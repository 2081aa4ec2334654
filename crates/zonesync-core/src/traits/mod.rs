//! Core traits for zonesync
//!
//! This module defines the abstract interfaces that collaborators must follow.
//!
//! - [`IpamSource`]: Fetch address inventory
//! - [`ZoneStore`]: Load and persist zone contents

pub mod ipam_source;
pub mod zone_store;

pub use ipam_source::{ACTIVE_STATUS, IpamAddress, IpamSource, IpamSourceFactory};
pub use zone_store::{ApplyOutcome, ZoneStore, ZoneStoreFactory};

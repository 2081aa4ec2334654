//! Plugin-based backend registry
//!
//! The registry allows IPAM sources and zone stores to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains on the
//! configured type names.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zonesync_core::registry::PluginRegistry;
//!
//! let registry = PluginRegistry::new();
//! zonesync_core::registry::register_builtin(&registry);
//! zonesync_store_zonefile::register(&registry);
//!
//! let store = registry.create_zone_store(&zone_config)?;
//! ```
//!
//! ## Registration
//!
//! Backend crates expose a `register()` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &PluginRegistry) {
//!     registry.register_zone_store("zonefile", Box::new(ZoneFileStoreFactory));
//! }
//! ```

use crate::config::{IpamConfig, ZoneConfig};
use crate::error::{Error, Result};
use crate::source::StaticIpamSourceFactory;
use crate::store::MemoryZoneStoreFactory;
use crate::traits::{IpamSource, IpamSourceFactory, ZoneStore, ZoneStoreFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry mapping type names to backend factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct PluginRegistry {
    /// Registered IPAM source factories
    ipam_sources: RwLock<HashMap<String, Box<dyn IpamSourceFactory>>>,

    /// Registered zone store factories
    zone_stores: RwLock<HashMap<String, Box<dyn ZoneStoreFactory>>>,
}

impl PluginRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an IPAM source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name as used in `ipam.type` (e.g., "netbox")
    /// - `factory`: Factory object for creating source instances
    pub fn register_ipam_source(&self, name: impl Into<String>, factory: Box<dyn IpamSourceFactory>) {
        let mut sources = self
            .ipam_sources
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        sources.insert(name.into(), factory);
    }

    /// Register a zone store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name as used in `zones[].zone_type` (e.g., "zonefile")
    /// - `factory`: Factory object for creating store instances
    pub fn register_zone_store(&self, name: impl Into<String>, factory: Box<dyn ZoneStoreFactory>) {
        let mut stores = self
            .zone_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), factory);
    }

    /// Create an IPAM source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn IpamSource>)`: Created source instance
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_ipam_source(&self, config: &IpamConfig) -> Result<Box<dyn IpamSource>> {
        let source_type = config.type_name();
        let sources = self
            .ipam_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown IPAM source type: {}", source_type)))?;

        factory.create(config)
    }

    /// Create a zone store for a zone's configured type
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ZoneStore>)`: Created store instance
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_zone_store(&self, config: &ZoneConfig) -> Result<Box<dyn ZoneStore>> {
        let stores = self
            .zone_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = stores.get(&config.zone_type).ok_or_else(|| {
            Error::config(format!(
                "Unknown zone type {:?} for zone {}",
                config.zone_type, config.name
            ))
        })?;

        factory.create(config)
    }

    /// List all registered IPAM source types
    pub fn list_ipam_sources(&self) -> Vec<String> {
        let sources = self
            .ipam_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        sources.keys().cloned().collect()
    }

    /// List all registered zone store types
    pub fn list_zone_stores(&self) -> Vec<String> {
        let stores = self
            .zone_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// Check if an IPAM source type is registered
    pub fn has_ipam_source(&self, name: &str) -> bool {
        let sources = self
            .ipam_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }

    /// Check if a zone store type is registered
    pub fn has_zone_store(&self, name: &str) -> bool {
        let stores = self
            .zone_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}

/// Register the backends that ship with the core: the `static` IPAM source
/// and the `memory` zone store.
pub fn register_builtin(registry: &PluginRegistry) {
    registry.register_ipam_source("static", Box::new(StaticIpamSourceFactory));
    registry.register_zone_store("memory", Box::new(MemoryZoneStoreFactory::default()));
}

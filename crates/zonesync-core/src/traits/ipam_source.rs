// # IPAM Source Trait
//
// Defines the interface for fetching address inventory from an IPAM system.
//
// ## Implementations
//
// - NetBox: `zonesync-ipam-netbox` crate
// - Static list: `zonesync_core::source::StaticIpamSource`
//
// ## Usage
//
// ```rust,ignore
// use zonesync_core::IpamSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpamSource implementation */;
//
//     for entry in source.fetch_addresses().await? {
//         println!("{} -> {}", entry.address, entry.dns_name);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// The only status value that produces DNS records
pub const ACTIVE_STATUS: &str = "active";

/// One address entry as reported by the IPAM source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpamAddress {
    /// Address literal, optionally with a prefix length (`192.0.2.1/24`)
    pub address: String,
    /// Host name without trailing dot; empty if unset
    #[serde(default)]
    pub dns_name: String,
    /// Opaque status string
    #[serde(default)]
    pub status: String,
}

impl IpamAddress {
    /// Create an address entry
    pub fn new(
        address: impl Into<String>,
        dns_name: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            dns_name: dns_name.into(),
            status: status.into(),
        }
    }

    /// Parse the address, ignoring any prefix length
    pub fn ip(&self) -> Result<IpAddr, crate::Error> {
        let literal = self.address.trim();
        let host = literal.split_once('/').map_or(literal, |(host, _)| host);
        host.parse::<IpAddr>()
            .map_err(|e| crate::Error::malformed_address(&self.address, e.to_string()))
    }

    /// Whether the status is exactly `"active"`
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_STATUS
    }
}

/// Trait for IPAM source implementations
///
/// A source produces a finite snapshot of address entries. Filtering by
/// status and DNS name is the reconciler's job, not the source's.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// - ✅ Network I/O against the IPAM system, pagination, authentication
/// - ❌ Building DNS records (owned by `Reconciler`)
/// - ❌ Retrying or scheduling (owned by the caller of `SyncEngine`)
#[async_trait]
pub trait IpamSource: Send + Sync {
    /// Fetch every address entry
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<IpamAddress>)`: The complete snapshot
    /// - `Err(Error)`: If the snapshot could not be fetched
    async fn fetch_addresses(&self) -> Result<Vec<IpamAddress>, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing IPAM sources from configuration
pub trait IpamSourceFactory: Send + Sync {
    /// Create an IpamSource instance from configuration
    fn create(
        &self,
        config: &crate::config::IpamConfig,
    ) -> Result<Box<dyn IpamSource>, crate::Error>;
}

// # IPAM Source Implementations
//
// Built-in sources that need no network access. The NetBox source lives in
// the `zonesync-ipam-netbox` crate.

use async_trait::async_trait;

use crate::config::IpamConfig;
use crate::traits::{IpamAddress, IpamSource, IpamSourceFactory};
use crate::{Error, Result};

/// IPAM source returning a fixed address list
#[derive(Debug, Clone, Default)]
pub struct StaticIpamSource {
    addresses: Vec<IpamAddress>,
}

impl StaticIpamSource {
    /// Create a source that always returns `addresses`
    pub fn new(addresses: Vec<IpamAddress>) -> Self {
        Self { addresses }
    }
}

#[async_trait]
impl IpamSource for StaticIpamSource {
    async fn fetch_addresses(&self) -> Result<Vec<IpamAddress>> {
        Ok(self.addresses.clone())
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// Factory for creating static IPAM sources
pub struct StaticIpamSourceFactory;

impl IpamSourceFactory for StaticIpamSourceFactory {
    fn create(&self, config: &IpamConfig) -> Result<Box<dyn IpamSource>> {
        match config {
            IpamConfig::Static { addresses } => {
                Ok(Box::new(StaticIpamSource::new(addresses.clone())))
            }
            _ => Err(Error::config("Invalid config for static IPAM source")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_returns_addresses() {
        let entries = vec![IpamAddress::new("192.0.2.1/24", "a.example.com", "active")];
        let source = StaticIpamSourceFactory
            .create(&IpamConfig::Static {
                addresses: entries.clone(),
            })
            .unwrap();

        assert_eq!(source.fetch_addresses().await.unwrap(), entries);
        assert_eq!(source.source_name(), "static");
    }

    #[test]
    fn test_factory_rejects_other_config() {
        let config = IpamConfig::Custom {
            factory: "x".to_string(),
            config: serde_json::json!({}),
        };
        assert!(StaticIpamSourceFactory.create(&config).is_err());
    }
}

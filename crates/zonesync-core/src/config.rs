//! Configuration types for zonesync
//!
//! This module defines all configuration structures used throughout the crate,
//! plus loading from JSON or YAML files.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::name::canonical_name;
use crate::traits::IpamAddress;

/// Config file extensions searched by [`find_config`], in order
pub const CONFIG_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Main zonesync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// IPAM source configuration
    pub ipam: IpamConfig,

    /// DNS zones to manage
    pub zones: Vec<ZoneConfig>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Create a configuration with the given source and zones
    pub fn new(ipam: IpamConfig, zones: Vec<ZoneConfig>) -> Self {
        Self {
            ipam,
            zones,
            engine: EngineConfig::default(),
        }
    }

    /// Load a configuration file, choosing the parser by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&content, format).map_err(|e| match e {
            crate::Error::Config(message) => {
                crate::Error::config(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    /// Parse configuration text in the given format
    ///
    /// Syntax and schema errors are [`crate::Error::Config`].
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, crate::Error> {
        match format {
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| crate::Error::config(format!("Invalid JSON configuration: {}", e))),
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| crate::Error::config(format!("Invalid YAML configuration: {}", e))),
        }
    }

    /// Validate the configuration
    ///
    /// Runs before any network or disk I/O; every failure is fatal.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zones.is_empty() {
            return Err(crate::Error::config("No zones configured"));
        }

        let mut seen = HashSet::new();
        for zone in &self.zones {
            zone.validate()?;
            if !seen.insert(zone.canonical_name()) {
                return Err(crate::Error::config(format!(
                    "Duplicate zone name: {}",
                    zone.canonical_name()
                )));
            }
        }

        self.ipam.validate()?;
        self.engine.validate()?;

        Ok(())
    }

    /// Look up a zone's configuration by name (trailing dot and case are ignored)
    pub fn zone(&self, name: &str) -> Option<&ZoneConfig> {
        let wanted = canonical_name(name);
        self.zones.iter().find(|z| z.canonical_name() == wanted)
    }
}

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, crate::Error> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(ConfigFormat::Json),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            _ => Err(crate::Error::config(format!(
                "Unsupported config file extension: {}",
                path.display()
            ))),
        }
    }
}

/// Find `<dir>/<name>.<ext>`, trying each dir and then each extension in order
pub fn find_config(
    name: &str,
    dirs: &[PathBuf],
    extensions: &[&str],
) -> Result<PathBuf, crate::Error> {
    for dir in dirs {
        for ext in extensions {
            let candidate = dir.join(format!("{name}.{ext}"));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    Err(crate::Error::config(format!(
        "No config file named {} with extension {:?} found in {:?}",
        name, extensions, dirs
    )))
}

/// Default config search path: `.`, `$HOME/.config/zonesync`, `/etc/zonesync`
pub fn default_config_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(".")];
    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(PathBuf::from(home).join(".config").join("zonesync"));
    }
    dirs.push(PathBuf::from("/etc/zonesync"));
    dirs
}

/// IPAM source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpamConfig {
    /// NetBox server
    Netbox(NetboxConfig),

    /// Fixed address list (tests and demos)
    Static {
        /// Addresses to return
        #[serde(default)]
        addresses: Vec<IpamAddress>,
    },

    /// Custom IPAM source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl IpamConfig {
    /// Validate the IPAM configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            IpamConfig::Netbox(netbox) => netbox.validate(),
            IpamConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom IPAM factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom IPAM config cannot be null"));
                }
                Ok(())
            }
            IpamConfig::Static { .. } => Ok(()),
        }
    }

    /// Get the IPAM source type name
    pub fn type_name(&self) -> &str {
        match self {
            IpamConfig::Netbox(_) => "netbox",
            IpamConfig::Static { .. } => "static",
            IpamConfig::Custom { factory, .. } => factory,
        }
    }
}

/// NetBox connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct NetboxConfig {
    /// Host name or base URL; `https://` is assumed when no scheme is given
    pub host: String,

    /// API token
    pub token: String,

    /// Addresses carrying this tag are not fetched
    #[serde(default = "default_exclude_tag")]
    pub exclude_tag: Option<String>,

    /// Results requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl NetboxConfig {
    /// Create settings with default tag filter and page size
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            exclude_tag: default_exclude_tag(),
            page_size: default_page_size(),
        }
    }

    /// Validate the NetBox settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host.trim().is_empty() {
            return Err(crate::Error::config("NetBox host cannot be empty"));
        }
        if self.token.is_empty() {
            return Err(crate::Error::config("NetBox token cannot be empty"));
        }
        if self.page_size == 0 {
            return Err(crate::Error::config("NetBox page size must be > 0"));
        }
        Ok(())
    }
}

// The token must never reach logs
impl fmt::Debug for NetboxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetboxConfig")
            .field("host", &self.host)
            .field("token", &"<REDACTED>")
            .field("exclude_tag", &self.exclude_tag)
            .field("page_size", &self.page_size)
            .finish()
    }
}

fn default_exclude_tag() -> Option<String> {
    Some("zonesync_exclude".to_string())
}

fn default_page_size() -> u32 {
    1000
}

/// Per-zone configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone apex; trailing dot optional
    pub name: String,

    /// Zone store type (e.g. "zonefile", "memory")
    #[serde(default = "default_zone_type")]
    pub zone_type: String,

    /// Storage locator for file-backed stores
    #[serde(default)]
    pub filename: Option<String>,

    /// Default TTL for records in this zone
    pub ttl: u32,

    /// Whether stale records are removed or only reported
    #[serde(default)]
    pub delete_entries: bool,

    /// SOA to create when the zone has none yet
    #[serde(default)]
    pub soa: Option<SoaConfig>,
}

impl ZoneConfig {
    /// Create a zone configuration with the default store type
    pub fn new(name: impl Into<String>, ttl: u32) -> Self {
        Self {
            name: name.into(),
            zone_type: default_zone_type(),
            filename: None,
            ttl,
            delete_entries: false,
            soa: None,
        }
    }

    /// Set the store type
    pub fn with_zone_type(mut self, zone_type: impl Into<String>) -> Self {
        self.zone_type = zone_type.into();
        self
    }

    /// Set the storage filename
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Enable or disable removal of stale records
    pub fn with_delete_entries(mut self, delete_entries: bool) -> Self {
        self.delete_entries = delete_entries;
        self
    }

    /// Set the SOA used for new zone files
    pub fn with_soa(mut self, soa: SoaConfig) -> Self {
        self.soa = Some(soa);
        self
    }

    /// Dot-terminated, lower-case zone name
    pub fn canonical_name(&self) -> String {
        canonical_name(&self.name)
    }

    /// Validate this zone's settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.trim().is_empty() || self.name.trim() == "." {
            return Err(crate::Error::config("Zone name cannot be empty"));
        }
        if self.ttl == 0 {
            return Err(crate::Error::config(format!(
                "Zone {} must have a TTL > 0",
                self.name
            )));
        }
        if self.zone_type.is_empty() {
            return Err(crate::Error::config(format!(
                "Zone {} has an empty zone_type",
                self.name
            )));
        }
        if self.zone_type == "zonefile" && self.filename.as_deref().is_none_or(str::is_empty) {
            return Err(crate::Error::config(format!(
                "Zone {} uses zonefile storage but has no filename",
                self.name
            )));
        }
        Ok(())
    }
}

fn default_zone_type() -> String {
    "zonefile".to_string()
}

/// SOA fields for newly created zones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoaConfig {
    /// Primary name server
    pub mname: String,
    /// Responsible mailbox, in domain-name form
    pub rname: String,
    /// Refresh interval (seconds)
    #[serde(default = "default_refresh")]
    pub refresh: u32,
    /// Retry interval (seconds)
    #[serde(default = "default_retry")]
    pub retry: u32,
    /// Expire limit (seconds)
    #[serde(default = "default_expire")]
    pub expire: u32,
    /// Negative-caching TTL (seconds)
    #[serde(default = "default_minimum")]
    pub minimum: u32,
}

impl SoaConfig {
    /// Create SOA settings with default timers
    pub fn new(mname: impl Into<String>, rname: impl Into<String>) -> Self {
        Self {
            mname: mname.into(),
            rname: rname.into(),
            refresh: default_refresh(),
            retry: default_retry(),
            expire: default_expire(),
            minimum: default_minimum(),
        }
    }
}

fn default_refresh() -> u32 {
    3600
}

fn default_retry() -> u32 {
    900
}

fn default_expire() -> u32 {
    604_800
}

fn default_minimum() -> u32 {
    300
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Compute and report deltas without writing anything
    #[serde(default)]
    pub dry_run: bool,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Number of reconcile failures kept as samples in the report
    #[serde(default = "default_failure_sample_size")]
    pub failure_sample_size: usize,
}

impl EngineConfig {
    /// Validate the engine settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            event_channel_capacity: default_event_channel_capacity(),
            failure_sample_size: default_failure_sample_size(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_failure_sample_size() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const YAML: &str = r#"
ipam:
  type: netbox
  host: netbox.example.com
  token: changeme
zones:
  - name: example.com
    filename: example.com.zone
    ttl: 300
    delete_entries: true
  - name: 0.0.0.0.ip6.arpa
    filename: reverse-v6-0000.zone
    ttl: 300
    delete_entries: true
  - name: 2.0.192.in-addr.arpa.
    zone_type: memory
    ttl: 600
  - name: sub.example.com
    filename: sub.zone
    ttl: 60
    soa:
      mname: ns1.example.com.
      rname: hostmaster.example.com.
engine:
  dry_run: true
"#;

    fn yaml_config() -> SyncConfig {
        SyncConfig::parse(YAML, ConfigFormat::Yaml).unwrap()
    }

    #[test]
    fn test_parse_yaml() {
        let config = yaml_config();
        config.validate().unwrap();

        match &config.ipam {
            IpamConfig::Netbox(netbox) => {
                assert_eq!(netbox.host, "netbox.example.com");
                assert_eq!(netbox.token, "changeme");
                assert_eq!(netbox.exclude_tag.as_deref(), Some("zonesync_exclude"));
                assert_eq!(netbox.page_size, 1000);
            }
            other => panic!("unexpected ipam config: {other:?}"),
        }
        assert_eq!(config.zones.len(), 4);
        assert!(config.engine.dry_run);

        let zone = config.zone("0.0.0.0.ip6.arpa.").unwrap();
        assert_eq!(zone.zone_type, "zonefile");
        assert_eq!(zone.filename.as_deref(), Some("reverse-v6-0000.zone"));
        assert_eq!(zone.ttl, 300);
        assert!(zone.delete_entries);

        let memory = config.zone("2.0.192.in-addr.arpa").unwrap();
        assert!(!memory.delete_entries);

        let sub = config.zone("sub.example.com").unwrap();
        assert_eq!(sub.soa.as_ref().map(|s| s.refresh), Some(3600));
    }

    #[test]
    fn test_parse_json_matches_yaml() {
        let json = serde_json::to_string(&yaml_config()).unwrap();
        let config = SyncConfig::parse(&json, ConfigFormat::Json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.zones.len(), 4);
        assert_eq!(config.ipam.type_name(), "netbox");
    }

    #[test]
    fn test_duplicate_zone_names_rejected() {
        let mut config = yaml_config();
        config
            .zones
            .push(ZoneConfig::new("Example.COM.", 300).with_filename("dup.zone"));

        let err = config.validate().unwrap_err();
        assert!(matches!(err, crate::Error::Config(ref msg) if msg.contains("Duplicate")));
    }

    #[test]
    fn test_invalid_zones_rejected() {
        let ipam = IpamConfig::Static { addresses: vec![] };

        assert!(SyncConfig::new(ipam.clone(), vec![]).validate().is_err());
        assert!(
            SyncConfig::new(ipam.clone(), vec![ZoneConfig::new("example.com", 0).with_zone_type("memory")])
                .validate()
                .is_err()
        );
        assert!(
            SyncConfig::new(ipam.clone(), vec![ZoneConfig::new("example.com", 300)])
                .validate()
                .is_err(),
            "zonefile zones need a filename"
        );
        assert!(
            SyncConfig::new(ipam, vec![ZoneConfig::new("", 300).with_zone_type("memory")])
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_netbox_validation() {
        let zones = vec![ZoneConfig::new("example.com", 300).with_zone_type("memory")];
        let config = SyncConfig::new(IpamConfig::Netbox(NetboxConfig::new("netbox", "")), zones);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_redacted_in_debug() {
        let netbox = NetboxConfig::new("netbox.example.com", "secret_token_12345");
        let debug_str = format!("{:?}", IpamConfig::Netbox(netbox));
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[test]
    fn test_find_config_search_order() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        std::fs::write(first.path().join("conf.yaml"), "").unwrap();
        std::fs::write(second.path().join("conf.json"), "").unwrap();
        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];

        assert_eq!(
            find_config("conf", &dirs, CONFIG_EXTENSIONS).unwrap(),
            first.path().join("conf.yaml")
        );
        assert_eq!(
            find_config("conf", &dirs, &["json"]).unwrap(),
            second.path().join("conf.json")
        );
        assert_eq!(
            find_config("conf", &dirs, &["json", "yaml"]).unwrap(),
            first.path().join("conf.yaml"),
            "directories are searched before extensions"
        );
        assert!(find_config("conf", &dirs, &["toml"]).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zonesync.yml");
        std::fs::write(&path, YAML).unwrap();
        let config = SyncConfig::from_file(&path).unwrap();
        assert_eq!(config.zones.len(), 4);

        let bad = dir.path().join("zonesync.ini");
        std::fs::write(&bad, YAML).unwrap();
        assert!(matches!(
            SyncConfig::from_file(&bad),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempdir().unwrap();

        let yaml = dir.path().join("zonesync.yaml");
        std::fs::write(&yaml, "zones: [unterminated").unwrap();
        let err = SyncConfig::from_file(&yaml).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
        assert!(err.is_fatal_for_run());
        assert!(err.to_string().contains("zonesync.yaml"));

        let json = dir.path().join("zonesync.json");
        std::fs::write(&json, "{\"zones\": 3}").unwrap();
        let err = SyncConfig::from_file(&json).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
        assert!(err.to_string().contains("zonesync.json"));
    }
}

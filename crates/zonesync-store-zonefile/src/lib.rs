// # Zone File Store
//
// ZoneStore backed by BIND-style zone files.
//
// ## Purpose
//
// Loads the A, AAAA and PTR records of a zone from its file and writes
// deltas back, keeping everything else in the file (SOA, NS, MX, ...) intact.
//
// ## Write Safety
//
// - Atomic writes: new contents go to `<file>.tmp`, then are renamed over
//   the original
// - Backup: the previous file is copied to `<file>.backup` before the rename
// - Serial: the SOA serial is bumped on every write (`YYYYMMDDnn`)
//
// ## Usage
//
// ```rust,ignore
// let registry = PluginRegistry::new();
// zonesync_store_zonefile::register(&registry);
// ```

pub mod serial;
pub mod zonefile;

use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use zonesync_core::config::ZoneConfig;
use zonesync_core::diff::ZoneDelta;
use zonesync_core::registry::PluginRegistry;
use zonesync_core::traits::{ApplyOutcome, ZoneStore, ZoneStoreFactory};
use zonesync_core::zone::Zone;
use zonesync_core::{Error, Result};

pub use serial::next_serial;
pub use zonefile::{ParseError, Soa, ZoneFile};

/// Zone store type name used in configuration
pub const ZONE_TYPE: &str = "zonefile";

/// Zone file store
///
/// One instance serves every `zonefile` zone; each call resolves the file
/// from the zone's `filename`. Relative filenames are resolved against the
/// base directory when one is set, else the working directory.
#[derive(Debug, Default)]
pub struct ZoneFileStore {
    base_dir: Option<PathBuf>,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl ZoneFileStore {
    /// Create a store resolving filenames against the working directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative filenames against `dir`
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of a zone's file
    pub fn path_for(&self, zone: &ZoneConfig) -> Result<PathBuf> {
        let filename = zone
            .filename
            .as_deref()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| Error::config(format!("Zone {} has no filename", zone.name)))?;

        let path = Path::new(filename);
        Ok(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        })
    }

    /// Read and parse a zone's file; a missing file is an empty zone file
    pub async fn read_zone_file(&self, zone: &ZoneConfig) -> Result<ZoneFile> {
        let path = self.path_for(zone)?;
        let name = zone.canonical_name();

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Zone file {} does not exist yet", path.display());
                return Ok(ZoneFile::new(&name, zone.ttl));
            }
            Err(e) => {
                return Err(Error::zone_storage(
                    &name,
                    format!("Failed to read {}: {}", path.display(), e),
                ));
            }
        };

        ZoneFile::parse(&content, &name, zone.ttl)
            .map_err(|e| Error::zone_storage(&name, format!("{}: {}", path.display(), e)))
    }

    /// Write a zone file atomically
    async fn write_zone_file(&self, path: &Path, zone: &str, content: &str) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::zone_storage(
                    zone,
                    format!("Failed to create directory {}: {}", parent.display(), e),
                )
            })?;
        }

        // Write to temporary file first
        let temp_path = sibling(path, "tmp");
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::zone_storage(
                    zone,
                    format!("Failed to create temp file {}: {}", temp_path.display(), e),
                )
            })?;

            file.write_all(content.as_bytes()).await.map_err(|e| {
                Error::zone_storage(
                    zone,
                    format!("Failed to write to temp file {}: {}", temp_path.display(), e),
                )
            })?;

            file.sync_all().await.map_err(|e| {
                Error::zone_storage(
                    zone,
                    format!("Failed to flush temp file {}: {}", temp_path.display(), e),
                )
            })?;
        }

        // Create backup of current file (if it exists)
        if fs::try_exists(path).await.unwrap_or(false) {
            let backup_path = sibling(path, "backup");
            if let Err(e) = fs::copy(path, &backup_path).await {
                warn!("Failed to create backup {}: {}", backup_path.display(), e);
            }
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, path).await.map_err(|e| {
            Error::zone_storage(
                zone,
                format!(
                    "Failed to rename {} to {}: {}",
                    temp_path.display(),
                    path.display(),
                    e
                ),
            )
        })?;

        debug!("Zone file written: {}", path.display());
        Ok(())
    }
}

/// `<path>.<suffix>`, keeping the full original file name
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[async_trait]
impl ZoneStore for ZoneFileStore {
    async fn load(&self, zone: &ZoneConfig) -> Result<Zone> {
        let file = self.read_zone_file(zone).await?;
        let mut loaded = file.to_zone(&zone.name, zone.ttl);
        loaded.locator = zone.filename.clone();
        Ok(loaded)
    }

    async fn apply(&self, zone: &ZoneConfig, changes: &ZoneDelta) -> Result<ApplyOutcome> {
        let _guard = self.write_lock.lock().await;

        let name = zone.canonical_name();
        let path = self.path_for(zone)?;
        let mut file = self.read_zone_file(zone).await?;

        let (added, removed) = file.apply(changes);

        let today = Utc::now().date_naive();
        if let Some(soa) = file.soa.as_mut() {
            soa.serial = next_serial(soa.serial, today);
        } else if let Some(config) = &zone.soa {
            info!("Creating SOA for zone {}", name);
            file.soa = Some(Soa::from_config(config, zone.ttl, next_serial(0, today)));
        } else {
            warn!("Zone {} has no SOA and none is configured; writing without one", name);
        }

        self.write_zone_file(&path, &name, &file.render()).await?;

        let serial = file.soa.as_ref().map(|soa| soa.serial);
        info!(
            "Zone file {} updated: +{} -{} (serial {:?})",
            path.display(),
            added,
            removed,
            serial
        );

        Ok(ApplyOutcome {
            added,
            removed,
            serial,
        })
    }

    fn store_name(&self) -> &'static str {
        ZONE_TYPE
    }
}

/// Factory for creating zone file stores
#[derive(Debug, Default, Clone)]
pub struct ZoneFileStoreFactory {
    base_dir: Option<PathBuf>,
}

impl ZoneFileStoreFactory {
    /// Factory whose stores resolve relative filenames against `dir`
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }
}

impl ZoneStoreFactory for ZoneFileStoreFactory {
    fn create(&self, config: &ZoneConfig) -> Result<Box<dyn ZoneStore>> {
        if config.zone_type != ZONE_TYPE {
            return Err(Error::config(format!(
                "Invalid zone type {:?} for zone file store",
                config.zone_type
            )));
        }
        Ok(Box::new(match &self.base_dir {
            Some(dir) => ZoneFileStore::with_base_dir(dir),
            None => ZoneFileStore::new(),
        }))
    }
}

/// Register the zone file store with the registry
pub fn register(registry: &PluginRegistry) {
    registry.register_zone_store(ZONE_TYPE, Box::new(ZoneFileStoreFactory::default()));
}

// # zonesyncd - Zone Sync Daemon
//
// Thin integration layer: everything that decides what DNS data should
// exist lives in zonesync-core.
//
// The daemon is responsible for:
// 1. Reading settings from environment variables
// 2. Loading and validating the config file
// 3. Registering IPAM sources and zone stores
// 4. Running the sync engine once, or on an interval until shutdown
//
// ## Configuration
//
// - `ZONESYNC_CONFIG`: Config file path. Without it, `zonesync.{yaml,yml,json}`
//   is searched in `.`, `$HOME/.config/zonesync` and `/etc/zonesync`
// - `ZONESYNC_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `ZONESYNC_DRY_RUN`: `true`/`1` computes deltas without writing
// - `ZONESYNC_IPAM_TOKEN`: Overrides the NetBox token from the config file
// - `ZONESYNC_INTERVAL_SECS`: Repeat every N seconds (10..=86400) until
//   SIGINT/SIGTERM; unset means a single run
//
// ## Example
//
// ```bash
// export ZONESYNC_CONFIG=/etc/zonesync/zonesync.yaml
// export ZONESYNC_IPAM_TOKEN=your_token
// zonesyncd
// ```

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use zonesync_core::config::{
    CONFIG_EXTENSIONS, IpamConfig, SyncConfig, default_config_dirs, find_config,
};
use zonesync_core::engine::{SyncEngine, SyncReport, ZoneStatus};
use zonesync_core::registry::{PluginRegistry, register_builtin};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Config file base name searched when `ZONESYNC_CONFIG` is unset
const CONFIG_NAME: &str = "zonesync";

/// Accepted range for `ZONESYNC_INTERVAL_SECS`
const INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 10..=86_400;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean run or clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error, or a zone failed to sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncExitCode {
    /// Clean run (normal exit)
    Clean = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error or failed zone
    RuntimeError = 2,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon settings from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
struct DaemonConfig {
    config_path: Option<PathBuf>,
    log_level: String,
    dry_run: Option<bool>,
    ipam_token: Option<String>,
    interval_secs: Option<u64>,
}

impl DaemonConfig {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let interval_secs = match lookup("ZONESYNC_INTERVAL_SECS") {
            Some(value) => Some(
                value
                    .trim()
                    .parse()
                    .with_context(|| format!("ZONESYNC_INTERVAL_SECS is not a number: {:?}", value))?,
            ),
            None => None,
        };

        let dry_run = match lookup("ZONESYNC_DRY_RUN") {
            Some(value) => Some(parse_bool(&value).with_context(|| {
                format!("ZONESYNC_DRY_RUN must be true/false/1/0. Got: {:?}", value)
            })?),
            None => None,
        };

        Ok(Self {
            config_path: lookup("ZONESYNC_CONFIG").filter(|p| !p.is_empty()).map(PathBuf::from),
            log_level: lookup("ZONESYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            dry_run,
            ipam_token: lookup("ZONESYNC_IPAM_TOKEN").filter(|t| !t.is_empty()),
            interval_secs,
        })
    }

    /// Validate the settings
    fn validate(&self) -> Result<()> {
        if let Some(interval) = self.interval_secs
            && !INTERVAL_RANGE.contains(&interval)
        {
            anyhow::bail!(
                "ZONESYNC_INTERVAL_SECS must be between {} and {} seconds. Got: {}",
                INTERVAL_RANGE.start(),
                INTERVAL_RANGE.end(),
                interval
            );
        }

        self.level()?;
        Ok(())
    }

    fn level(&self) -> Result<Level> {
        Ok(match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => anyhow::bail!(
                "ZONESYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        })
    }

    /// Locate, load and validate the sync configuration
    fn load_sync_config(&self) -> Result<SyncConfig> {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => find_config(CONFIG_NAME, &default_config_dirs(), CONFIG_EXTENSIONS)?,
        };
        info!("Loading configuration from {}", path.display());

        let mut config = SyncConfig::from_file(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Environment settings win over the config file
    fn apply_overrides(&self, config: &mut SyncConfig) {
        if let Some(dry_run) = self.dry_run {
            config.engine.dry_run = dry_run;
        }
        if let Some(token) = &self.ipam_token {
            match &mut config.ipam {
                IpamConfig::Netbox(netbox) => netbox.token = token.clone(),
                other => warn!(
                    "ZONESYNC_IPAM_TOKEN ignored for IPAM source type {}",
                    other.type_name()
                ),
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" | "" => Some(false),
        _ => None,
    }
}

fn main() -> ExitCode {
    // Load settings from environment
    let daemon = match DaemonConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = daemon.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return SyncExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = daemon.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncExitCode::ConfigError.into();
    }

    info!("Starting zonesyncd");

    let config = match daemon.load_sync_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return SyncExitCode::ConfigError.into();
        }
    };
    info!(
        "Configuration loaded: {} zone(s), IPAM source {}",
        config.zones.len(),
        config.ipam.type_name()
    );
    if config.engine.dry_run {
        warn!("Running in DRY-RUN mode - no zone will be written");
    }

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(daemon.interval_secs, config)).into()
}

/// Build the registry with every backend compiled in
fn build_registry() -> PluginRegistry {
    let registry = PluginRegistry::new();
    register_builtin(&registry);

    #[cfg(feature = "zonefile")]
    {
        debug!("Registering zone file store");
        zonesync_store_zonefile::register(&registry);
    }

    #[cfg(feature = "netbox")]
    {
        debug!("Registering NetBox IPAM source");
        zonesync_ipam_netbox::register(&registry);
    }

    registry
}

/// Run the daemon
async fn run_daemon(interval_secs: Option<u64>, config: SyncConfig) -> SyncExitCode {
    let registry = build_registry();
    let (engine, mut events) = match SyncEngine::from_registry(&registry, config) {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to set up sync engine: {}", e);
            return SyncExitCode::ConfigError;
        }
    };

    // Drain engine events
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    let Some(interval_secs) = interval_secs else {
        return match engine.run_once().await {
            Ok(report) => {
                log_report(&report);
                if report.has_failures() {
                    SyncExitCode::RuntimeError
                } else {
                    SyncExitCode::Clean
                }
            }
            Err(e) => {
                error!("Sync failed: {}", e);
                SyncExitCode::RuntimeError
            }
        };
    };

    info!("Syncing every {} seconds", interval_secs);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown handler error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    match engine
        .run_periodic(Duration::from_secs(interval_secs), Some(shutdown_rx))
        .await
    {
        Ok(()) => {
            info!("Shutting down zonesyncd");
            SyncExitCode::Clean
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            SyncExitCode::RuntimeError
        }
    }
}

/// Log the outcome of a single run
fn log_report(report: &SyncReport) {
    let elapsed = report.finished_at - report.started_at;
    info!(
        "Run finished in {} ms: {} address(es), {} record(s) placed, {} failure(s)",
        elapsed.num_milliseconds(),
        report.addresses_fetched,
        report.reconcile.records_added(),
        report.reconcile.failure_count
    );

    for failure in &report.reconcile.failures {
        warn!(
            "  {} ({}): {:?} failed: {}",
            failure.address, failure.dns_name, failure.stage, failure.error
        );
    }
    let unsampled = report
        .reconcile
        .failure_count
        .saturating_sub(report.reconcile.failures.len());
    if unsampled > 0 {
        warn!("  ... and {} more", unsampled);
    }

    for zone in &report.zones {
        match &zone.status {
            ZoneStatus::Unchanged => info!("  {}: unchanged", zone.zone),
            ZoneStatus::Applied(outcome) => info!(
                "  {}: +{} -{} (serial {:?})",
                zone.zone, outcome.added, outcome.removed, outcome.serial
            ),
            ZoneStatus::DryRun => info!(
                "  {}: would add {}, remove {}",
                zone.zone, zone.to_add, zone.to_remove
            ),
            ZoneStatus::Failed(e) => error!("  {}: FAILED: {}", zone.zone, e),
        }
        if zone.removals_suppressed > 0 {
            info!(
                "  {}: {} stale record(s) kept (delete_entries is off)",
                zone.zone, zone.removals_suppressed
            );
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use zonesync_core::config::{NetboxConfig, ZoneConfig};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let daemon = DaemonConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(daemon.log_level, "info");
        assert_eq!(daemon.interval_secs, None);
        assert_eq!(daemon.dry_run, None);
        assert!(daemon.validate().is_ok());
    }

    #[test]
    fn test_interval_range() {
        let ok = DaemonConfig::from_lookup(lookup(&[("ZONESYNC_INTERVAL_SECS", "300")])).unwrap();
        assert!(ok.validate().is_ok());

        let short = DaemonConfig::from_lookup(lookup(&[("ZONESYNC_INTERVAL_SECS", "5")])).unwrap();
        assert!(short.validate().is_err());

        assert!(DaemonConfig::from_lookup(lookup(&[("ZONESYNC_INTERVAL_SECS", "soon")])).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let daemon = DaemonConfig::from_lookup(lookup(&[("ZONESYNC_LOG_LEVEL", "loud")])).unwrap();
        assert!(daemon.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let daemon = DaemonConfig::from_lookup(lookup(&[
            ("ZONESYNC_DRY_RUN", "1"),
            ("ZONESYNC_IPAM_TOKEN", "from-env"),
        ]))
        .unwrap();

        let mut config = SyncConfig::new(
            IpamConfig::Netbox(NetboxConfig::new("netbox.example.com", "from-file")),
            vec![ZoneConfig::new("example.com", 300).with_filename("example.com.zone")],
        );
        daemon.apply_overrides(&mut config);

        assert!(config.engine.dry_run);
        match &config.ipam {
            IpamConfig::Netbox(netbox) => assert_eq!(netbox.token, "from-env"),
            other => panic!("unexpected ipam config: {:?}", other),
        }
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_registry_has_compiled_backends() {
        let registry = build_registry();
        assert!(registry.has_ipam_source("static"));
        assert!(registry.has_zone_store("memory"));
        #[cfg(feature = "zonefile")]
        assert!(registry.has_zone_store("zonefile"));
        #[cfg(feature = "netbox")]
        assert!(registry.has_ipam_source("netbox"));
    }
}

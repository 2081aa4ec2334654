//! Minimal embedding example for zonesync-core
//!
//! This example demonstrates using zonesync-core as a library in a custom application.
//! The application supplies its own IPAM source and keeps a handle on the zone store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use zonesync_core::config::{EngineConfig, IpamConfig, ZoneConfig};
use zonesync_core::engine::ZoneStatus;
use zonesync_core::traits::{IpamAddress, IpamSource};
use zonesync_core::{MemoryZoneStore, Result, SyncConfig, SyncEngine};

/// Custom IPAM source backed by an application-owned inventory
struct EmbeddedInventory {
    hosts: Vec<(&'static str, &'static str)>,
    fetch_calls: Arc<AtomicUsize>,
}

impl EmbeddedInventory {
    fn new(hosts: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            hosts,
            fetch_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl IpamSource for EmbeddedInventory {
    async fn fetch_addresses(&self) -> Result<Vec<IpamAddress>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .hosts
            .iter()
            .map(|(address, name)| IpamAddress::new(*address, *name, "active"))
            .collect())
    }

    fn source_name(&self) -> &'static str {
        "embedded"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    println!("=== Embedded zonesync-core Example ===\n");

    let inventory = EmbeddedInventory::new(vec![
        ("192.0.2.10/24", "www.example.com"),
        ("192.0.2.11/24", "mail.example.com"),
        ("2001:db8::10/64", "www.example.com"),
        // No zone for this name, so it shows up as a reconcile failure
        ("198.51.100.7/24", "host.example.net"),
    ]);
    let fetch_calls = Arc::clone(&inventory.fetch_calls);

    // Keep a handle so zone contents can be inspected afterwards
    let store = MemoryZoneStore::new();

    let mut config = SyncConfig::new(
        IpamConfig::Static {
            addresses: Vec::new(),
        },
        vec![
            ZoneConfig::new("example.com", 300).with_zone_type("memory"),
            ZoneConfig::new("2.0.192.in-addr.arpa", 300).with_zone_type("memory"),
            ZoneConfig::new("8.b.d.0.1.0.0.2.ip6.arpa", 300).with_zone_type("memory"),
        ],
    );
    config.engine = EngineConfig {
        event_channel_capacity: 100, // Small buffer for example
        ..EngineConfig::default()
    };

    println!("1. Creating engine...");
    let (engine, mut event_rx) =
        SyncEngine::new(Box::new(inventory), Box::new(store.clone()), config)?;

    let event_listener = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!("[Event] {:?}", event);
        }
    });

    println!("2. First run...");
    let report = engine.run_once().await?;
    for zone in &report.zones {
        println!("   {} -> {:?}", zone.zone, zone.status);
    }
    println!(
        "   {} reconcile failure(s), {} record(s) placed",
        report.reconcile.failure_count,
        report.reconcile.records_added()
    );

    println!("\n3. Second run (nothing changed upstream)...");
    let report = engine.run_once().await?;
    let unchanged = report
        .zones
        .iter()
        .filter(|zone| matches!(zone.status, ZoneStatus::Unchanged))
        .count();
    println!("   {} of {} zone(s) unchanged", unchanged, report.zones.len());

    println!("\n4. Zone contents:");
    for name in ["example.com", "2.0.192.in-addr.arpa"] {
        if let Some(zone) = store.snapshot(name).await {
            for record in zone.iter_records() {
                println!("   {}", record);
            }
        }
        println!("   serial {}", store.serial(name).await);
    }

    drop(engine);
    let _ = tokio::time::timeout(std::time::Duration::from_millis(100), event_listener).await;

    println!("\n=== Embedding Successful ===");
    println!("IPAM fetched {} time(s)", fetch_calls.load(Ordering::SeqCst));

    Ok(())
}

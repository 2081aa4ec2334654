// # zonesync-core
//
// Core library for keeping DNS zones in step with an IPAM inventory.
//
// ## Architecture Overview
//
// - **IpamSource**: Trait for fetching address inventory
// - **ZoneStore**: Trait for loading and writing zone contents
// - **ZoneSet**: All known zones, with longest-suffix record routing
// - **Reconciler**: Turns addresses into forward and reverse records
// - **diff**: Computes per-zone add/remove deltas between two snapshots
// - **SyncEngine**: Orchestrates fetch → reconcile → load → diff → apply
// - **PluginRegistry**: Maps configured type names to backend factories
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from backends
// 2. **Plugin-Based**: Sources and stores are registered by type name
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Partial Failure**: One bad address or zone never blocks the rest

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod name;
pub mod reconcile;
pub mod record;
pub mod registry;
pub mod source;
pub mod store;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use config::{IpamConfig, SyncConfig, ZoneConfig};
pub use diff::{ZoneChange, ZoneDelta, compare, compare_zones};
pub use engine::{SyncEngine, SyncEvent, SyncReport, ZoneOutcome, ZoneStatus};
pub use error::{Error, Result};
pub use reconcile::{ReconcileReport, Reconciler, reverse_name};
pub use record::{Record, RecordType};
pub use registry::{PluginRegistry, register_builtin};
pub use source::StaticIpamSource;
pub use store::MemoryZoneStore;
pub use traits::{IpamAddress, IpamSource, ZoneStore};
pub use zone::{Zone, ZoneSet};

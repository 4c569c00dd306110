//! Strata - Simulation Core
//!
//! A deterministic, fixed-timestep simulation of a chunked, multi-floor
//! world. Uses `bevy_ecs` as the component store.
//!
//! Each tick drains queued commands, rebuilds observer-driven chunk
//! activation, steps gameplay systems and publishes a double-buffered
//! snapshot for interpolated rendering. Everything lives in an explicit
//! [`SimWorld`] context.

pub mod activation;
pub mod api;
pub mod commands;
pub mod components;
pub mod config;
pub mod entities;
pub mod error;
pub mod events;
pub mod hashing;
pub mod observer;
pub mod profiler;
pub mod snapshot;
pub mod systems;
pub mod time;
pub mod world;

pub use activation::rebuild_activation;
pub use api::{FloorStats, SimStats, SimWorld, TickSignal};
pub use commands::{state_keys, tags, Command, CommandQueue, RawCommand};
pub use components::*;
pub use config::SimConfig;
pub use entities::{Prototype, PrototypeId};
pub use error::{CommandError, ConfigError};
pub use hashing::hash_name;
pub use observer::{ObserverDesc, ObserverId};
pub use snapshot::{Snapshot, SnapshotRecord, SNAPSHOT_STRIDE};
pub use systems::portal::{CellRef, PortalDesc, PortalId, PortalRequest};
pub use time::{FixedStepClock, StepReport};
pub use world::{Floor, FloorTable};

//! Public API for the simulation.
//!
//! [`SimWorld`] is a self-contained simulation context: it owns the ECS
//! world, the command queue, the fixed-step clock and the snapshot double
//! buffer. Independent `SimWorld`s never share state.
//!
//! ## Tick pipeline
//!
//! Every fixed tick runs, in order:
//!
//! 1. drain the command queue, then snap followed observers
//! 2. rebuild hot/warm chunk activation
//! 3. gameplay systems (extraction, portals, transit relocation)
//! 4. capture a snapshot and rotate it into the double buffer
//! 5. clear this tick's events
//!
//! A move command is therefore visible in the same tick's snapshot.

use crate::activation::activation_system;
use crate::commands::{Command, CommandQueue, RawCommand};
use crate::components::Transform;
use crate::config::{clamp_tick_hz, SimConfig};
use crate::entities::{self, EntityIndex, Prototype, PrototypeCatalog, PrototypeId};
use crate::events::SimEvents;
use crate::observer::{Observer, ObserverDesc, ObserverId, ObserverRegistry};
use crate::profiler::{Profiler, PHASE_ACTIVATION, PHASE_COMMANDS, PHASE_SNAPSHOT, PHASE_SYSTEMS};
use crate::snapshot::{capture, Snapshot, SnapshotPublisher};
use crate::systems::*;
use crate::time::{FixedStepClock, SimTime};
use crate::world::{Floor, FloorTable};
use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use serde::Serialize;
use std::sync::Arc;

/// Emitted once after every host frame (or debug step) that ran at least one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickSignal {
    /// Tick counter after the last tick ran.
    pub tick: u32,
    /// Ticks run during this call.
    pub ticks_run: u32,
    pub alpha: f32,
}

type TickListener = Box<dyn FnMut(&TickSignal) + Send>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorStats {
    pub z: i32,
    pub chunks_w: i32,
    pub chunks_h: i32,
    pub hot: usize,
    pub warm: usize,
}

/// Counters exposed on the debug surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimStats {
    pub tick: u32,
    pub entities: usize,
    pub floors: usize,
    pub observers: usize,
    pub pending_commands: usize,
    pub portals: usize,
    pub pending_transits: usize,
    pub transits_total: u64,
    /// Sorted by Z.
    pub floor_stats: Vec<FloorStats>,
}

/// Everything a tick touches. Kept apart from the clock so the clock can
/// drive it.
struct TickPipeline {
    world: World,
    activation: Schedule,
    systems: Schedule,
    queue: CommandQueue,
    publisher: SnapshotPublisher,
    profiler: Option<Profiler>,
}

impl TickPipeline {
    fn run_tick(&mut self) {
        self.world.resource_mut::<SimTime>().advance();
        let tick = self.world.resource::<SimTime>().tick;

        let Self {
            world,
            activation,
            systems,
            queue,
            publisher,
            profiler,
        } = self;

        timed(profiler, PHASE_COMMANDS, || {
            queue.process(tick, world);
        });
        timed(profiler, PHASE_ACTIVATION, || activation.run(world));
        timed(profiler, PHASE_SYSTEMS, || systems.run(world));
        timed(profiler, PHASE_SNAPSHOT, || {
            let tile_world_size = world.resource::<SimConfig>().tile_world_size;
            publisher.rotate(capture(world, tick, tile_world_size));
        });
        world.resource_mut::<SimEvents>().clear();

        if let Some(p) = profiler {
            p.tick();
        }
    }
}

fn timed<R>(profiler: &mut Option<Profiler>, phase: &'static str, f: impl FnOnce() -> R) -> R {
    match profiler {
        Some(p) => p.time_section(phase, f),
        None => f(),
    }
}

/// The simulation context.
pub struct SimWorld {
    pipeline: TickPipeline,
    clock: FixedStepClock,
    paused: bool,
    last_alpha: f32,
    listener: Option<TickListener>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    /// Create a new simulation with default configuration.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create a simulation with custom configuration. Invalid values are clamped.
    pub fn with_config(config: SimConfig) -> Self {
        let config = config.sanitized();
        let clock = FixedStepClock::from_config(&config);
        let paused = config.start_paused;

        let mut world = World::new();
        world.insert_resource(SimTime::new(clock.fixed_dt()));
        world.insert_resource(FloorTable::new());
        world.insert_resource(ObserverRegistry::new());
        world.insert_resource(EntityIndex::default());
        world.insert_resource(PrototypeCatalog::default());
        world.insert_resource(PortalNetwork::default());
        world.insert_resource(SimEvents::default());
        world.insert_resource(config);

        // Ticks never run systems in parallel.
        let mut activation = Schedule::default();
        activation.set_executor_kind(ExecutorKind::SingleThreaded);
        activation.add_systems(activation_system);

        let mut systems = Schedule::default();
        systems.set_executor_kind(ExecutorKind::SingleThreaded);
        systems.add_systems((extraction_system, portal_system, transit_apply_system).chain());

        tracing::info!(hz = 1.0 / clock.fixed_dt(), paused, "simulation created");

        Self {
            pipeline: TickPipeline {
                world,
                activation,
                systems,
                queue: CommandQueue::new(),
                publisher: SnapshotPublisher::new(),
                profiler: None,
            },
            clock,
            paused,
            last_alpha: 0.0,
            listener: None,
        }
    }

    fn world(&self) -> &World {
        &self.pipeline.world
    }

    fn world_mut(&mut self) -> &mut World {
        &mut self.pipeline.world
    }

    /// The active (sanitized) configuration.
    pub fn config(&self) -> &SimConfig {
        self.world().resource::<SimConfig>()
    }

    // ------------------------------------------------------------------
    // Floors and observers
    // ------------------------------------------------------------------

    /// Spawn a floor. Idempotent; returns the floor id (its Z).
    pub fn spawn_floor(&mut self, z: i32, chunks_w: i32, chunks_h: i32, tile_w: i32, tile_h: i32) -> i32 {
        self.world_mut()
            .resource_mut::<FloorTable>()
            .spawn(z, chunks_w, chunks_h, tile_w, tile_h)
    }

    /// Get the floor at `z`, if it exists.
    pub fn floor(&self, z: i32) -> Option<&Floor> {
        self.world().resource::<FloorTable>().get(z)
    }

    /// Register an observer. Its radii are in tiles.
    pub fn register_observer(&mut self, desc: ObserverDesc) -> ObserverId {
        let id = self.world_mut().resource_mut::<ObserverRegistry>().register(desc);
        tracing::debug!(id, z = desc.z, tile_x = desc.tile_x, tile_y = desc.tile_y, "observer registered");
        id
    }

    /// Move an observer. Unknown ids are ignored.
    pub fn move_observer(&mut self, id: ObserverId, z: i32, tile_x: i32, tile_y: i32) -> bool {
        self.world_mut()
            .resource_mut::<ObserverRegistry>()
            .move_to(id, z, tile_x, tile_y)
    }

    /// Get a copy of an observer's current state.
    pub fn observer(&self, id: ObserverId) -> Option<Observer> {
        self.world().resource::<ObserverRegistry>().get(id).copied()
    }

    // ------------------------------------------------------------------
    // Prototypes and entities
    // ------------------------------------------------------------------

    /// Register (or replace) a prototype and return its id.
    pub fn register_prototype(&mut self, prototype: Prototype) -> PrototypeId {
        self.world_mut().resource_mut::<PrototypeCatalog>().register(prototype)
    }

    /// Spawn an entity immediately, outside the command queue.
    pub fn spawn_entity(&mut self, prototype: PrototypeId, x: f32, y: f32, z: i32) -> Option<u32> {
        entities::spawn_from_prototype(self.world_mut(), prototype, x, y, z)
    }

    /// Get an entity's transform, if it has one.
    pub fn entity_transform(&self, id: u32) -> Option<Transform> {
        let entity = entities::lookup(self.world(), id)?;
        self.world().get::<Transform>(entity).copied()
    }

    /// Read any component of an entity.
    pub fn entity_component<T: Component>(&self, id: u32) -> Option<&T> {
        let entity = entities::lookup(self.world(), id)?;
        self.world().get::<T>(entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.world().resource::<EntityIndex>().len()
    }

    /// Ids of entities in chunk `(cx, cy)` on floor `z`, ascending.
    pub fn entities_in_chunk(&mut self, z: i32, cx: i32, cy: i32) -> Vec<u32> {
        entities::entities_in_chunk(self.world_mut(), z, cx, cy)
    }

    /// Ids of entities on floor `z` within `radius` grid units of `(x, y)`.
    pub fn entities_in_radius(&mut self, z: i32, x: f32, y: f32, radius: f32) -> Vec<u32> {
        entities::entities_in_radius(self.world_mut(), z, x, y, radius)
    }

    /// Ids of entities standing on a tile of floor `z`.
    pub fn entities_at_tile(&mut self, z: i32, tile_x: i32, tile_y: i32) -> Vec<u32> {
        entities::entities_at_tile(self.world_mut(), z, tile_x, tile_y)
    }

    /// Ids of every positioned entity on floor `z`.
    pub fn entities_on_floor(&mut self, z: i32) -> Vec<u32> {
        entities::entities_on_floor(self.world_mut(), z)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Queue a command for the start of the next tick.
    pub fn enqueue(&mut self, command: Command) {
        self.pipeline.queue.enqueue(command);
    }

    /// Queue a raw command record. It is decoded when the queue drains.
    pub fn enqueue_raw(&mut self, raw: RawCommand) {
        self.pipeline.queue.enqueue_raw(raw);
    }

    /// Commands waiting for the next tick.
    pub fn pending_commands(&self) -> usize {
        self.pipeline.queue.len()
    }

    /// Bind an observer to follow an entity from the next tick on.
    pub fn follow(&mut self, observer: ObserverId, entity: u32) {
        self.pipeline.queue.follow(observer, entity);
    }

    // ------------------------------------------------------------------
    // Timing
    // ------------------------------------------------------------------

    /// Feed one host frame. Runs zero or more fixed ticks and returns the
    /// interpolation alpha in `[0, 1)`. Does nothing while paused.
    pub fn advance(&mut self, frame_dt: f32) -> f32 {
        if self.paused {
            return self.last_alpha;
        }
        let pipeline = &mut self.pipeline;
        let report = self.clock.advance(frame_dt as f64, || pipeline.run_tick());
        self.last_alpha = report.alpha;
        if report.ticks > 0 {
            self.notify(report.ticks);
        }
        report.alpha
    }

    /// Run `n` ticks synchronously. Only effective while paused.
    pub fn step_ticks(&mut self, n: u32) -> u32 {
        if !self.paused {
            tracing::debug!(n, "step_ticks ignored while running");
            return 0;
        }
        for _ in 0..n {
            self.pipeline.run_tick();
        }
        if n > 0 {
            self.notify(n);
        }
        n
    }

    /// Change the tick rate. `hz` is clamped to `[1, 480]`.
    pub fn set_tick_rate(&mut self, hz: f32) {
        let hz = clamp_tick_hz(hz as f64);
        self.clock.set_tick_hz(hz);
        let fixed_dt = self.clock.fixed_dt();
        let world = self.world_mut();
        world.resource_mut::<SimTime>().fixed_dt = fixed_dt;
        world.resource_mut::<SimConfig>().tick_hz = hz;
        tracing::info!(hz, "tick rate changed");
    }

    /// Suspend or resume auto-advance.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            tracing::info!(paused, "pause toggled");
        }
        self.paused = paused;
    }

    /// Whether auto-advance is suspended.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Ticks completed so far.
    pub fn current_tick(&self) -> u32 {
        self.world().resource::<SimTime>().tick
    }

    /// Seconds per tick.
    pub fn fixed_dt(&self) -> f32 {
        self.clock.fixed_dt() as f32
    }

    /// Interpolation alpha returned by the last `advance`.
    pub fn last_alpha(&self) -> f32 {
        self.last_alpha
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Get the snapshot published by the most recent tick.
    pub fn snapshot_current(&self) -> Option<Arc<Snapshot>> {
        self.pipeline.publisher.current()
    }

    /// Get the snapshot published one tick earlier.
    pub fn snapshot_previous(&self) -> Option<Arc<Snapshot>> {
        self.pipeline.publisher.previous()
    }

    /// Rows in the current snapshot; 0 when there is none.
    pub fn snapshot_row_count(&self) -> usize {
        self.pipeline.publisher.current().map_or(0, |s| s.len())
    }

    /// Current snapshot as JSON, `null` when there is none.
    pub fn snapshot_json(&self) -> String {
        match self.snapshot_current() {
            Some(snapshot) => snapshot.to_json().unwrap_or_else(|_| "null".to_string()),
            None => "null".to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Tick signal
    // ------------------------------------------------------------------

    /// Install a callback run once per `advance`/`step_ticks` call that ran ticks.
    pub fn set_tick_listener<F>(&mut self, listener: F)
    where
        F: FnMut(&TickSignal) + Send + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    /// Remove the tick callback.
    pub fn clear_tick_listener(&mut self) {
        self.listener = None;
    }

    fn notify(&mut self, ticks_run: u32) {
        let signal = TickSignal {
            tick: self.current_tick(),
            ticks_run,
            alpha: self.last_alpha,
        };
        if let Some(listener) = self.listener.as_mut() {
            listener(&signal);
        }
    }

    // ------------------------------------------------------------------
    // Portals
    // ------------------------------------------------------------------

    /// Register a one-way portal between two cells.
    pub fn add_portal(&mut self, desc: PortalDesc) -> PortalId {
        self.world_mut().resource_mut::<PortalNetwork>().add(desc)
    }

    /// Queue a transit; it is resolved during the next tick.
    pub fn request_transit(&mut self, request: PortalRequest) {
        self.world_mut().resource_mut::<PortalNetwork>().request(request);
    }

    // ------------------------------------------------------------------
    // Debug surface
    // ------------------------------------------------------------------

    /// Collect debug counters.
    pub fn stats(&self) -> SimStats {
        let world = self.world();
        let floors = world.resource::<FloorTable>();
        let portals = world.resource::<PortalNetwork>();

        let mut floor_stats: Vec<FloorStats> = floors
            .iter()
            .map(|f| FloorStats {
                z: f.z,
                chunks_w: f.chunks_w,
                chunks_h: f.chunks_h,
                hot: f.hot_chunks().len(),
                warm: f.warm_chunks().len(),
            })
            .collect();
        floor_stats.sort_by_key(|f| f.z);

        SimStats {
            tick: self.current_tick(),
            entities: self.entity_count(),
            floors: floors.len(),
            observers: world.resource::<ObserverRegistry>().len(),
            pending_commands: self.pending_commands(),
            portals: portals.len(),
            pending_transits: portals.pending(),
            transits_total: portals.transits_total(),
            floor_stats,
        }
    }

    /// Debug counters as JSON.
    pub fn stats_json(&self) -> String {
        serde_json::to_string(&self.stats()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Turn per-phase tick timing on or off. Disabling drops collected data.
    pub fn enable_profiling(&mut self, enabled: bool) {
        match (enabled, self.pipeline.profiler.is_some()) {
            (true, false) => self.pipeline.profiler = Some(Profiler::new()),
            (false, true) => self.pipeline.profiler = None,
            _ => {}
        }
    }

    /// Get the profiler while profiling is enabled.
    pub fn profiler(&self) -> Option<&Profiler> {
        self.pipeline.profiler.as_ref()
    }

    /// Return to an empty world. Prototypes, configuration and the tick
    /// listener are kept.
    pub fn reset(&mut self) {
        let fixed_dt = self.clock.fixed_dt();
        let pipeline = &mut self.pipeline;
        pipeline.queue.clear();
        pipeline.publisher.clear();
        if let Some(p) = pipeline.profiler.as_mut() {
            p.reset();
        }

        let world = &mut pipeline.world;
        world.clear_entities();
        *world.resource_mut::<EntityIndex>() = EntityIndex::default();
        world.resource_mut::<FloorTable>().clear();
        world.resource_mut::<ObserverRegistry>().clear();
        world.resource_mut::<PortalNetwork>().clear();
        world.resource_mut::<SimEvents>().clear();
        *world.resource_mut::<SimTime>() = SimTime::new(fixed_dt);

        self.clock.reset();
        self.last_alpha = 0.0;
        tracing::info!("simulation reset");
    }
}

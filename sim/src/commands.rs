//! Command queue: ordered world mutations applied at the start of a tick.
//!
//! Hosts either enqueue typed [`Command`]s or raw [`RawCommand`] records
//! (the fixed C layout used across language boundaries). Raw records are
//! decoded when drained, so a bad tag is reported at its own FIFO position
//! and never stops the rest of the queue.
//!
//! After the queue is empty, every follow binding snaps its observer to the
//! followed entity's transform, so cameras see same-tick results.

use crate::components::{AnimState, Facing, Inventory, ItemType, Transform};
use crate::entities::{self, lookup, PrototypeId};
use crate::error::CommandError;
use crate::hashing::hash_name;
use crate::observer::{ObserverDesc, ObserverId, ObserverRegistry};
use crate::systems::inventory::{add_to_slot, remove_from_slot, slot_item};
use crate::world::{FloorTable, DEFAULT_CHUNK_TILES};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Wire tags of [`RawCommand`].
pub mod tags {
    pub const MOVE: u32 = 0;
    pub const SPAWN: u32 = 1;
    pub const DESTROY: u32 = 2;
    pub const SET_POSITION: u32 = 3;
    pub const SET_FLOOR: u32 = 4;
    pub const ADD_ITEM: u32 = 5;
    pub const REMOVE_ITEM: u32 = 6;
    pub const SET_OBSERVER_POSITION: u32 = 7;
    pub const SET_STATE_FLAG: u32 = 8;
    pub const SPAWN_FLOOR: u32 = 9;
    pub const FOLLOW_ENTITY: u32 = 10;
}

/// Hashed keys and values accepted by [`Command::SetStateFlag`].
pub mod state_keys {
    use super::hash_name;

    pub const MOVING: u64 = hash_name("moving");
    pub const FACING: u64 = hash_name("facing");
    pub const TRUE: u64 = hash_name("true");
    pub const FALSE: u64 = hash_name("false");
    pub const EAST: u64 = hash_name("east");
    pub const WEST: u64 = hash_name("west");
    pub const NORTH: u64 = hash_name("north");
    pub const SOUTH: u64 = hash_name("south");
}

/// Fixed-layout command record.
///
/// | tag | id | a | b | x | y | z |
/// |-----|----|---|---|---|---|---|
/// | MOVE | entity | | | dx | dy | |
/// | SPAWN | | prototype | | x | y | floor |
/// | DESTROY | entity | | | | | |
/// | SET_POSITION | entity | | | x | y | |
/// | SET_FLOOR | entity | | | | | floor |
/// | ADD_ITEM | entity | slot | item code | quantity | | |
/// | REMOVE_ITEM | entity | slot | | quantity | | |
/// | SET_OBSERVER_POSITION | observer (0 = default) | | | tile x | tile y | floor |
/// | SET_STATE_FLAG | entity | key hash | value hash | | | |
/// | SPAWN_FLOOR | | chunks wide | chunks high | | | floor |
/// | FOLLOW_ENTITY | entity | observer (0 = default) | | | | |
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCommand {
    pub tag: u32,
    pub id: u32,
    pub a: u64,
    pub b: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A typed world mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Move { entity: u32, dx: f32, dy: f32 },
    Spawn { prototype: PrototypeId, x: f32, y: f32, z: i32 },
    Destroy { entity: u32 },
    SetPosition { entity: u32, x: f32, y: f32 },
    SetFloor { entity: u32, z: i32 },
    AddItem { entity: u32, slot: usize, item: ItemType, amount: u32 },
    /// Remove from whatever item the slot holds.
    RemoveItem { entity: u32, slot: usize, amount: u32 },
    /// Observer 0 addresses the default observer, created on demand.
    SetObserverPosition { observer: ObserverId, z: i32, tile_x: i32, tile_y: i32 },
    SetStateFlag { entity: u32, key: u64, value: u64 },
    SpawnFloor { z: i32, chunks_w: i32, chunks_h: i32 },
    /// Observer 0 addresses the default observer, created on demand.
    FollowEntity { observer: ObserverId, entity: u32 },
}

impl TryFrom<RawCommand> for Command {
    type Error = CommandError;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        let id = raw.id;
        Ok(match raw.tag {
            tags::MOVE => Command::Move {
                entity: id,
                dx: raw.x,
                dy: raw.y,
            },
            tags::SPAWN => Command::Spawn {
                prototype: raw.a,
                x: raw.x,
                y: raw.y,
                z: raw.z as i32,
            },
            tags::DESTROY => Command::Destroy { entity: id },
            tags::SET_POSITION => Command::SetPosition {
                entity: id,
                x: raw.x,
                y: raw.y,
            },
            tags::SET_FLOOR => Command::SetFloor {
                entity: id,
                z: raw.z as i32,
            },
            tags::ADD_ITEM => Command::AddItem {
                entity: id,
                slot: raw.a as usize,
                item: ItemType::from_code(raw.b).ok_or(CommandError::UnknownItem(raw.b))?,
                amount: raw.x as u32,
            },
            tags::REMOVE_ITEM => Command::RemoveItem {
                entity: id,
                slot: raw.a as usize,
                amount: raw.x as u32,
            },
            tags::SET_OBSERVER_POSITION => Command::SetObserverPosition {
                observer: id,
                z: raw.z as i32,
                tile_x: raw.x as i32,
                tile_y: raw.y as i32,
            },
            tags::SET_STATE_FLAG => Command::SetStateFlag {
                entity: id,
                key: raw.a,
                value: raw.b,
            },
            tags::SPAWN_FLOOR => Command::SpawnFloor {
                z: raw.z as i32,
                chunks_w: i32::try_from(raw.a).unwrap_or(i32::MAX),
                chunks_h: i32::try_from(raw.b).unwrap_or(i32::MAX),
            },
            tags::FOLLOW_ENTITY => Command::FollowEntity {
                observer: raw.a as ObserverId,
                entity: id,
            },
            tag => return Err(CommandError::UnknownTag(tag)),
        })
    }
}

#[derive(Debug, Clone)]
enum Pending {
    Typed(Command),
    Raw(RawCommand),
}

/// FIFO of pending mutations plus the observer follow bindings.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<Pending>,
    /// observer id -> followed entity id
    follow: BTreeMap<ObserverId, u32>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, command: Command) {
        self.pending.push_back(Pending::Typed(command));
    }

    pub fn enqueue_raw(&mut self, raw: RawCommand) {
        self.pending.push_back(Pending::Raw(raw));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Bind `observer` to follow `entity`, replacing any previous binding.
    pub fn follow(&mut self, observer: ObserverId, entity: u32) {
        self.follow.insert(observer, entity);
    }

    pub fn following(&self, observer: ObserverId) -> Option<u32> {
        self.follow.get(&observer).copied()
    }

    /// Drop every pending command and every follow binding.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.follow.clear();
    }

    /// Drain the queue in FIFO order, then sync followed observers.
    ///
    /// Returns the number of commands applied; undecodable records are
    /// logged and skipped.
    pub fn process(&mut self, tick: u32, world: &mut World) -> usize {
        let mut applied = 0;
        while let Some(next) = self.pending.pop_front() {
            let command = match next {
                Pending::Typed(command) => command,
                Pending::Raw(raw) => match Command::try_from(raw) {
                    Ok(command) => command,
                    Err(err) => {
                        tracing::warn!(tick, tag = raw.tag, id = raw.id, %err, "command skipped");
                        continue;
                    }
                },
            };
            self.apply(world, &command);
            applied += 1;
        }
        self.sync_followers(world);
        applied
    }

    fn apply(&mut self, world: &mut World, command: &Command) {
        let done = match *command {
            Command::Move { entity, dx, dy } => entities::move_entity(world, entity, dx, dy),
            Command::Spawn { prototype, x, y, z } => {
                entities::spawn_from_prototype(world, prototype, x, y, z).is_some()
            }
            Command::Destroy { entity } => entities::destroy_entity(world, entity),
            Command::SetPosition { entity, x, y } => entities::set_entity_position(world, entity, x, y),
            Command::SetFloor { entity, z } => entities::set_entity_floor(world, entity, z),
            Command::AddItem {
                entity,
                slot,
                item,
                amount,
            } => with_inventory(world, entity, |inv| add_to_slot(inv, slot, item, amount)),
            Command::RemoveItem { entity, slot, amount } => with_inventory(world, entity, |inv| {
                slot_item(inv, slot).is_some_and(|item| remove_from_slot(inv, slot, item, amount))
            }),
            Command::SetObserverPosition {
                observer,
                z,
                tile_x,
                tile_y,
            } => set_observer_position(world, observer, z, tile_x, tile_y),
            Command::SetStateFlag { entity, key, value } => set_state_flag(world, entity, key, value),
            Command::SpawnFloor { z, chunks_w, chunks_h } => {
                world.resource_mut::<FloorTable>().spawn(
                    z,
                    chunks_w,
                    chunks_h,
                    DEFAULT_CHUNK_TILES,
                    DEFAULT_CHUNK_TILES,
                );
                true
            }
            Command::FollowEntity { observer, entity } => {
                let observer = resolve_follow_observer(world, observer, entity);
                self.follow(observer, entity);
                true
            }
        };
        if !done {
            tracing::trace!(?command, "command had no effect");
        }
    }

    fn sync_followers(&self, world: &mut World) {
        for (&observer, &entity_id) in &self.follow {
            let Some(entity) = lookup(world, entity_id) else {
                continue;
            };
            let Some(t) = world.get::<Transform>(entity).copied() else {
                continue;
            };
            let (tile_x, tile_y) = t.tile();
            world
                .resource_mut::<ObserverRegistry>()
                .move_to(observer, t.floor_z, tile_x, tile_y);
        }
    }
}

fn with_inventory(world: &mut World, id: u32, f: impl FnOnce(&mut Inventory) -> bool) -> bool {
    let Some(entity) = lookup(world, id) else {
        return false;
    };
    match world.get_mut::<Inventory>(entity) {
        Some(mut inventory) => f(&mut inventory),
        None => false,
    }
}

fn set_observer_position(world: &mut World, observer: ObserverId, z: i32, tile_x: i32, tile_y: i32) -> bool {
    let mut observers = world.resource_mut::<ObserverRegistry>();
    if observer != 0 {
        return observers.move_to(observer, z, tile_x, tile_y);
    }
    match observers.first().map(|o| o.id) {
        Some(first) => observers.move_to(first, z, tile_x, tile_y),
        None => {
            let id = observers.register(ObserverDesc::at(z, tile_x, tile_y));
            tracing::debug!(id, z, tile_x, tile_y, "default observer created");
            true
        }
    }
}

/// Map observer 0 to the default observer, creating it over the entity if none exist.
fn resolve_follow_observer(world: &mut World, observer: ObserverId, entity: u32) -> ObserverId {
    if observer != 0 {
        return observer;
    }
    if let Some(first) = world.resource::<ObserverRegistry>().first() {
        return first.id;
    }
    let (z, tile_x, tile_y) = lookup(world, entity)
        .and_then(|e| world.get::<Transform>(e))
        .map(|t| {
            let (tx, ty) = t.tile();
            (t.floor_z, tx, ty)
        })
        .unwrap_or((0, 0, 0));
    let id = world
        .resource_mut::<ObserverRegistry>()
        .register(ObserverDesc::at(z, tile_x, tile_y));
    tracing::debug!(id, entity, "default observer created to follow entity");
    id
}

enum FlagChange {
    Moving(bool),
    Facing(Option<Facing>),
}

fn decode_flag(key: u64, value: u64) -> Option<FlagChange> {
    match key {
        state_keys::MOVING => match value {
            state_keys::TRUE => Some(FlagChange::Moving(true)),
            state_keys::FALSE => Some(FlagChange::Moving(false)),
            _ => None,
        },
        state_keys::FACING => Some(FlagChange::Facing(match value {
            state_keys::EAST => Some(Facing::East),
            state_keys::WEST => Some(Facing::West),
            state_keys::NORTH => Some(Facing::North),
            state_keys::SOUTH => Some(Facing::South),
            _ => None,
        })),
        _ => None,
    }
}

/// Set a named state flag. Entities without [`AnimState`] get one first.
fn set_state_flag(world: &mut World, id: u32, key: u64, value: u64) -> bool {
    let Some(entity) = lookup(world, id) else {
        return false;
    };
    let mut e = world.entity_mut(entity);
    if !e.contains::<AnimState>() {
        e.insert(AnimState::default());
    }
    let Some(change) = decode_flag(key, value) else {
        tracing::debug!(id, key, value, "unrecognised state flag");
        return false;
    };
    let Some(mut anim) = e.get_mut::<AnimState>() else {
        return false;
    };
    let facing = match change {
        FlagChange::Moving(moving) => {
            anim.set_moving(moving);
            None
        }
        FlagChange::Facing(facing) => {
            anim.set_facing(facing);
            facing
        }
    };
    if let Some(f) = facing {
        if let Some(mut t) = e.get_mut::<Transform>() {
            t.facing = f.angle();
        }
    }
    true
}

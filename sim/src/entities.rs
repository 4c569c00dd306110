//! Entity lifecycle and transform mutations on top of the ECS world.
//!
//! Simulation ids are dense and 1-based; [`EntityIndex`] maps them to ECS
//! entities in O(1). Every mutation is a no-op returning `false`/`None` when
//! its target is missing.

use crate::components::*;
use crate::hashing::hash_name;
use crate::world::{floor_allows_chunk, FloorTable, DEFAULT_CHUNK_TILES};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prototype id: FNV-1a 64 hash of the prototype name.
pub type PrototypeId = u64;

/// Maps simulation ids to ECS entities.
#[derive(Resource, Debug)]
pub struct EntityIndex {
    by_id: HashMap<u32, Entity>,
    next_id: u32,
}

impl Default for EntityIndex {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            next_id: 1,
        }
    }
}

impl EntityIndex {
    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn get(&self, id: u32) -> Option<Entity> {
        self.by_id.get(&id).copied()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Template an entity is cloned from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prototype {
    pub name: String,
    /// Whether spawned entities get a [`Transform`].
    pub transform: bool,
    pub anim_flags: Option<u32>,
    pub inventory: Vec<InventorySlot>,
    pub production: Option<Production>,
}

impl Prototype {
    /// A positioned prototype with no other components.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: true,
            anim_flags: None,
            inventory: Vec::new(),
            production: None,
        }
    }

    pub fn without_transform(mut self) -> Self {
        self.transform = false;
        self
    }

    pub fn with_anim_flags(mut self, flags: u32) -> Self {
        self.anim_flags = Some(flags);
        self
    }

    pub fn with_inventory(mut self, slots: Vec<InventorySlot>) -> Self {
        self.inventory = slots;
        self
    }

    pub fn with_production(mut self, production: Production) -> Self {
        self.production = Some(production);
        self
    }

    pub fn id(&self) -> PrototypeId {
        hash_name(&self.name)
    }
}

/// Registered prototypes keyed by id.
#[derive(Resource, Debug, Default)]
pub struct PrototypeCatalog {
    by_id: HashMap<PrototypeId, Prototype>,
}

impl PrototypeCatalog {
    /// Register (or replace) a prototype and return its id.
    pub fn register(&mut self, prototype: Prototype) -> PrototypeId {
        let id = prototype.id();
        tracing::debug!(name = %prototype.name, id, "prototype registered");
        self.by_id.insert(id, prototype);
        id
    }

    pub fn get(&self, id: PrototypeId) -> Option<&Prototype> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Look up the ECS entity behind a simulation id.
pub fn lookup(world: &World, id: u32) -> Option<Entity> {
    world.resource::<EntityIndex>().get(id)
}

fn chunk_of(floors: &FloorTable, z: i32, grid_x: f32, grid_y: f32) -> (i32, i32) {
    match floors.get(z) {
        Some(floor) => floor.grid_to_chunk(grid_x, grid_y),
        None => (
            (grid_x / DEFAULT_CHUNK_TILES as f32).floor() as i32,
            (grid_y / DEFAULT_CHUNK_TILES as f32).floor() as i32,
        ),
    }
}

/// Build a transform with chunk coordinates resolved against the floor table.
pub fn placed_transform(floors: &FloorTable, grid_x: f32, grid_y: f32, floor_z: i32) -> Transform {
    let (chunk_x, chunk_y) = chunk_of(floors, floor_z, grid_x, grid_y);
    Transform {
        grid_x,
        grid_y,
        floor_z,
        chunk_x,
        chunk_y,
        facing: 0.0,
    }
}

/// Spawn a bare entity, optionally positioned. Returns its simulation id.
pub fn spawn_entity(world: &mut World, transform: Option<Transform>) -> u32 {
    let id = world.resource_mut::<EntityIndex>().allocate();
    let mut e = world.spawn(EntityId(id));
    if let Some(t) = transform {
        e.insert(t);
    }
    let entity = e.id();
    world.resource_mut::<EntityIndex>().by_id.insert(id, entity);
    id
}

/// Clone a registered prototype at a grid position on floor `z`.
///
/// The floor is created on demand for positioned prototypes.
pub fn spawn_from_prototype(
    world: &mut World,
    prototype: PrototypeId,
    grid_x: f32,
    grid_y: f32,
    z: i32,
) -> Option<u32> {
    let Some(proto) = world.resource::<PrototypeCatalog>().get(prototype).cloned() else {
        tracing::warn!(prototype, "spawn skipped: unknown prototype");
        return None;
    };

    let transform = if proto.transform {
        let mut floors = world.resource_mut::<FloorTable>();
        floors.ensure(z);
        Some(placed_transform(&floors, grid_x, grid_y, z))
    } else {
        None
    };

    let id = spawn_entity(world, transform);
    let entity = lookup(world, id)?;
    let mut e = world.entity_mut(entity);
    e.insert(DisplayName(proto.name.clone()));
    if let Some(flags) = proto.anim_flags {
        e.insert(AnimState { flags });
    }
    if !proto.inventory.is_empty() {
        e.insert(Inventory {
            slots: proto.inventory.clone(),
        });
    }
    if let Some(production) = proto.production {
        e.insert(production);
    }
    tracing::debug!(id, name = %proto.name, grid_x, grid_y, z, "entity spawned");
    Some(id)
}

/// Despawn an entity and all of its components.
pub fn destroy_entity(world: &mut World, id: u32) -> bool {
    let Some(entity) = world.resource_mut::<EntityIndex>().by_id.remove(&id) else {
        return false;
    };
    world.despawn(entity)
}

/// Translate an entity by a grid delta.
///
/// Moves that would leave the chunk envelope of the entity's floor are
/// blocked.
pub fn move_entity(world: &mut World, id: u32, dx: f32, dy: f32) -> bool {
    let Some(entity) = lookup(world, id) else {
        return false;
    };
    let Some(current) = world.get::<Transform>(entity).copied() else {
        return false;
    };
    let nx = current.grid_x + dx;
    let ny = current.grid_y + dy;
    let (cx, cy) = chunk_of(world.resource::<FloorTable>(), current.floor_z, nx, ny);
    if !floor_allows_chunk(current.floor_z, cx, cy) {
        tracing::debug!(id, z = current.floor_z, cx, cy, "move blocked by floor limits");
        return false;
    }
    let Some(mut t) = world.get_mut::<Transform>(entity) else {
        return false;
    };
    t.grid_x = nx;
    t.grid_y = ny;
    t.chunk_x = cx;
    t.chunk_y = cy;
    true
}

/// Place an entity at an absolute grid position on its current floor.
pub fn set_entity_position(world: &mut World, id: u32, grid_x: f32, grid_y: f32) -> bool {
    let Some(entity) = lookup(world, id) else {
        return false;
    };
    let Some(z) = world.get::<Transform>(entity).map(|t| t.floor_z) else {
        return false;
    };
    let (cx, cy) = chunk_of(world.resource::<FloorTable>(), z, grid_x, grid_y);
    let Some(mut t) = world.get_mut::<Transform>(entity) else {
        return false;
    };
    t.grid_x = grid_x;
    t.grid_y = grid_y;
    t.chunk_x = cx;
    t.chunk_y = cy;
    true
}

/// Move an entity to floor `z`, creating the floor if it does not exist.
pub fn set_entity_floor(world: &mut World, id: u32, z: i32) -> bool {
    let Some(entity) = lookup(world, id) else {
        return false;
    };
    let Some(current) = world.get::<Transform>(entity).copied() else {
        return false;
    };
    let (cx, cy) = {
        let mut floors = world.resource_mut::<FloorTable>();
        if !floors.contains(z) {
            floors.ensure(z);
            tracing::debug!(id, z, "floor auto-created for entity");
        }
        chunk_of(&floors, z, current.grid_x, current.grid_y)
    };
    let Some(mut t) = world.get_mut::<Transform>(entity) else {
        return false;
    };
    t.floor_z = z;
    t.chunk_x = cx;
    t.chunk_y = cy;
    true
}

// ============================================================================
// Spatial queries
// ============================================================================

/// Ids of positioned entities whose transform satisfies `filter`, ascending.
pub fn entities_where(world: &mut World, filter: impl Fn(&Transform) -> bool) -> Vec<u32> {
    let mut query = world.query::<(&EntityId, &Transform)>();
    let mut ids: Vec<u32> = query
        .iter(world)
        .filter(|(_, t)| filter(t))
        .map(|(id, _)| id.0)
        .collect();
    ids.sort_unstable();
    ids
}

/// Entities on floor `z` whose transform lies in chunk `(cx, cy)`.
pub fn entities_in_chunk(world: &mut World, z: i32, cx: i32, cy: i32) -> Vec<u32> {
    entities_where(world, |t| t.floor_z == z && t.chunk_x == cx && t.chunk_y == cy)
}

/// Entities on floor `z` within `radius` grid units of `(x, y)`, edge inclusive.
pub fn entities_in_radius(world: &mut World, z: i32, x: f32, y: f32, radius: f32) -> Vec<u32> {
    let r2 = radius * radius;
    entities_where(world, |t| {
        let (dx, dy) = (t.grid_x - x, t.grid_y - y);
        t.floor_z == z && radius >= 0.0 && dx * dx + dy * dy <= r2
    })
}

/// Entities on floor `z` standing on tile `(tile_x, tile_y)`.
pub fn entities_at_tile(world: &mut World, z: i32, tile_x: i32, tile_y: i32) -> Vec<u32> {
    entities_where(world, |t| t.floor_z == z && t.tile() == (tile_x, tile_y))
}

pub fn entities_on_floor(world: &mut World, z: i32) -> Vec<u32> {
    entities_where(world, |t| t.floor_z == z)
}

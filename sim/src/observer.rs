//! Observers: points of interest that drive chunk activation.
//!
//! ## Radius units
//!
//! Observer radii are always expressed in **tiles**. The activation pass
//! converts them per floor into chunk radii with a ceiling division by the
//! floor's chunk tile dimensions, so a 40-tile radius on a floor with 32-tile
//! chunks covers `ceil(40 / 32) = 2` chunks in each direction. Chunk-unit
//! radii are not accepted anywhere.

use crate::world::Floor;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Stable, dense, 1-based observer id.
pub type ObserverId = u32;

/// Hot radius (tiles) given to an observer created implicitly by a command.
pub const DEFAULT_HOT_RADIUS_TILES: i32 = 32;
/// Warm radius (tiles) given to an observer created implicitly by a command.
pub const DEFAULT_WARM_RADIUS_TILES: i32 = 64;
/// Upper bound on the Z layers a single observer activates on each side.
pub const MAX_Z_LAYERS: i32 = 16;

/// Registration parameters for an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverDesc {
    pub z: i32,
    pub tile_x: i32,
    pub tile_y: i32,
    /// Hot radius in tiles.
    pub hot_radius: i32,
    /// Warm radius in tiles.
    pub warm_radius: i32,
    /// Hot Z layers; negative falls back to the simulation default.
    pub hot_z_layers: i32,
    /// Warm Z layers; negative falls back to the simulation default.
    pub warm_z_layers: i32,
}

impl ObserverDesc {
    /// Observer at a tile with the implicit default radii and layer counts.
    pub fn at(z: i32, tile_x: i32, tile_y: i32) -> Self {
        Self {
            z,
            tile_x,
            tile_y,
            hot_radius: DEFAULT_HOT_RADIUS_TILES,
            warm_radius: DEFAULT_WARM_RADIUS_TILES,
            hot_z_layers: 0,
            warm_z_layers: 1,
        }
    }
}

/// A registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observer {
    pub id: ObserverId,
    pub z: i32,
    pub tile_x: i32,
    pub tile_y: i32,
    pub hot_radius: i32,
    pub warm_radius: i32,
    pub hot_z_layers: i32,
    pub warm_z_layers: i32,
}

/// Per-axis chunk radii derived from an observer's tile radii on one floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkRadii {
    pub hot_x: i32,
    pub hot_y: i32,
    pub warm_x: i32,
    pub warm_y: i32,
}

/// `ceil(tiles / per_chunk)` for non-negative tile counts.
#[inline]
pub fn tiles_to_chunks(tiles: i32, per_chunk: i32) -> i32 {
    if tiles <= 0 {
        return 0;
    }
    let per_chunk = per_chunk.max(1);
    tiles / per_chunk + i32::from(tiles % per_chunk != 0)
}

impl Observer {
    /// Chunk radii on `floor`, each capped at `max_chunk_radius`.
    ///
    /// The warm radius never falls below the hot radius.
    pub fn chunk_radii(&self, floor: &Floor, max_chunk_radius: i32) -> ChunkRadii {
        let cap = |r: i32| r.min(max_chunk_radius);
        let hot_x = cap(tiles_to_chunks(self.hot_radius, floor.tile_w));
        let hot_y = cap(tiles_to_chunks(self.hot_radius, floor.tile_h));
        let warm_x = cap(tiles_to_chunks(self.warm_radius, floor.tile_w)).max(hot_x);
        let warm_y = cap(tiles_to_chunks(self.warm_radius, floor.tile_h)).max(hot_y);
        ChunkRadii {
            hot_x,
            hot_y,
            warm_x,
            warm_y,
        }
    }

    /// Hot Z layers, capped at [`MAX_Z_LAYERS`].
    pub fn hot_layers(&self, default: i32) -> i32 {
        resolve_layers(self.hot_z_layers, default)
    }

    /// Warm Z layers, capped at [`MAX_Z_LAYERS`].
    pub fn warm_layers(&self, default: i32) -> i32 {
        resolve_layers(self.warm_z_layers, default)
    }
}

fn resolve_layers(own: i32, default: i32) -> i32 {
    let layers = if own >= 0 { own } else { default };
    layers.clamp(0, MAX_Z_LAYERS)
}

/// Every observer of one simulation. Ids index the backing vector directly.
#[derive(Resource, Debug, Default)]
pub struct ObserverRegistry {
    observers: Vec<Observer>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, desc: ObserverDesc) -> ObserverId {
        let id = self.observers.len() as ObserverId + 1;
        self.observers.push(Observer {
            id,
            z: desc.z,
            tile_x: desc.tile_x,
            tile_y: desc.tile_y,
            hot_radius: desc.hot_radius,
            warm_radius: desc.warm_radius,
            hot_z_layers: desc.hot_z_layers,
            warm_z_layers: desc.warm_z_layers,
        });
        id
    }

    /// Move an observer in place. Unknown ids are ignored (returns false).
    pub fn move_to(&mut self, id: ObserverId, z: i32, tile_x: i32, tile_y: i32) -> bool {
        match self.get_mut(id) {
            Some(o) => {
                o.z = z;
                o.tile_x = tile_x;
                o.tile_y = tile_y;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ObserverId) -> Option<&Observer> {
        let slot = (id as usize).checked_sub(1)?;
        self.observers.get(slot)
    }

    pub fn get_mut(&mut self, id: ObserverId) -> Option<&mut Observer> {
        let slot = (id as usize).checked_sub(1)?;
        self.observers.get_mut(slot)
    }

    /// The first registered observer, used when a command names observer 0.
    pub fn first(&self) -> Option<&Observer> {
        self.observers.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observer> {
        self.observers.iter()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_dense_and_one_based() {
        let mut reg = ObserverRegistry::new();
        assert_eq!(reg.register(ObserverDesc::at(0, 0, 0)), 1);
        assert_eq!(reg.register(ObserverDesc::at(0, 5, 5)), 2);
        assert_eq!(reg.get(2).unwrap().tile_x, 5);
        assert!(reg.get(0).is_none());
        assert!(reg.get(3).is_none());
    }

    #[test]
    fn test_move_unknown_is_noop() {
        let mut reg = ObserverRegistry::new();
        reg.register(ObserverDesc::at(0, 0, 0));
        assert!(!reg.move_to(7, 1, 1, 1));
        assert!(reg.move_to(1, 2, 10, 11));
        let o = reg.get(1).unwrap();
        assert_eq!((o.z, o.tile_x, o.tile_y), (2, 10, 11));
    }

    #[test]
    fn test_tile_radius_ceiling_division() {
        assert_eq!(tiles_to_chunks(40, 32), 2);
        assert_eq!(tiles_to_chunks(32, 32), 1);
        assert_eq!(tiles_to_chunks(1, 32), 1);
        assert_eq!(tiles_to_chunks(0, 32), 0);
        assert_eq!(tiles_to_chunks(-4, 32), 0);
        assert_eq!(tiles_to_chunks(i32::MAX, 1), i32::MAX);
        assert_eq!(tiles_to_chunks(i32::MAX, 2), i32::MAX / 2 + 1);
    }

    #[test]
    fn test_chunk_radii_per_axis_and_capped() {
        let floor = Floor::new(0, 16, 16, 32, 16);
        let mut reg = ObserverRegistry::new();
        let id = reg.register(ObserverDesc {
            hot_radius: 40,
            warm_radius: 400,
            ..ObserverDesc::at(0, 0, 0)
        });
        let radii = reg.get(id).unwrap().chunk_radii(&floor, 8);
        assert_eq!(radii.hot_x, 2);
        assert_eq!(radii.hot_y, 3);
        assert_eq!(radii.warm_x, 8);
        assert_eq!(radii.warm_y, 8);
    }

    #[test]
    fn test_layer_fallback() {
        let o = Observer {
            id: 1,
            z: 0,
            tile_x: 0,
            tile_y: 0,
            hot_radius: 0,
            warm_radius: 0,
            hot_z_layers: -1,
            warm_z_layers: 3,
        };
        assert_eq!(o.hot_layers(2), 2);
        assert_eq!(o.warm_layers(1), 3);
    }

    #[test]
    fn test_layer_counts_are_capped() {
        let o = Observer {
            id: 1,
            z: 0,
            tile_x: 0,
            tile_y: 0,
            hot_radius: 0,
            warm_radius: 0,
            hot_z_layers: i32::MAX,
            warm_z_layers: -1,
        };
        assert_eq!(o.hot_layers(0), MAX_Z_LAYERS);
        assert_eq!(o.warm_layers(i32::MAX), MAX_Z_LAYERS);
        assert_eq!(o.warm_layers(i32::MIN), 0);
    }
}

//! Spatial model: Z-indexed floors, each owning a fixed grid of chunks.
//!
//! Floors are created explicitly (`spawn`) or on first use by a
//! floor-dependent mutation (`ensure`), and are never removed while the
//! simulation runs. Chunks are pre-allocated when the floor is created;
//! coordinates outside that grid can never be activated.

use bevy_ecs::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Packed `(cx, cy)` chunk coordinate.
pub type ChunkKey = i64;

/// Tiles per chunk side used for auto-created floors.
pub const DEFAULT_CHUNK_TILES: i32 = 32;
/// Largest chunk grid side a floor accepts. Keeps every coordinate inside
/// the packed key range and bounds pre-allocation.
pub const MAX_FLOOR_CHUNKS: i32 = 1024;
/// Largest tile count per chunk side.
pub const MAX_CHUNK_TILES: i32 = 4096;

/// Pack a chunk coordinate into a single key.
///
/// Both halves are truncated to 16 bits, so the grid is limited to
/// `i16` coordinates.
#[inline]
pub fn pack_chunk_key(cx: i32, cy: i32) -> ChunkKey {
    (((cx as u16) as i64) << 32) | ((cy as u16) as i64)
}

/// Inverse of [`pack_chunk_key`].
#[inline]
pub fn unpack_chunk_key(key: ChunkKey) -> (i32, i32) {
    let cx = ((key >> 32) as u16) as i16;
    let cy = (key as u16) as i16;
    (cx as i32, cy as i32)
}

/// Chunk grid size given to a floor created implicitly at `z`.
///
/// Tower floors (above ground) are small; ground and underground floors
/// get a larger grid.
pub fn default_floor_chunks(z: i32) -> (i32, i32) {
    if z > 0 {
        (2, 2)
    } else {
        (4, 4)
    }
}

/// Whether a chunk may exist at `(cx, cy)` on floor `z`.
///
/// Tower floors are capped to a 2x2 envelope regardless of their grid size.
pub fn floor_allows_chunk(z: i32, cx: i32, cy: i32) -> bool {
    if z > 0 {
        (0..=1).contains(&cx) && (0..=1).contains(&cy)
    } else {
        true
    }
}

/// A fixed-size rectangular region of tiles within a floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub tiles_w: i32,
    pub tiles_h: i32,
    /// Set once any observer activation pass touches this chunk.
    pub loaded: bool,
}

/// A horizontal slice of the world at a given Z level.
#[derive(Debug, Clone)]
pub struct Floor {
    pub z: i32,
    pub chunks_w: i32,
    pub chunks_h: i32,
    /// Tiles per chunk along x.
    pub tile_w: i32,
    /// Tiles per chunk along y.
    pub tile_h: i32,
    chunks: BTreeMap<ChunkKey, Chunk>,
    hot_chunks: BTreeSet<ChunkKey>,
    warm_chunks: BTreeSet<ChunkKey>,
}

impl Floor {
    /// Create a floor and pre-allocate every chunk its policy admits.
    ///
    /// Grid sides are clamped to `1..=MAX_FLOOR_CHUNKS` and chunk sides to
    /// `1..=MAX_CHUNK_TILES`.
    pub fn new(z: i32, chunks_w: i32, chunks_h: i32, tile_w: i32, tile_h: i32) -> Self {
        let chunks_w = chunks_w.clamp(1, MAX_FLOOR_CHUNKS);
        let chunks_h = chunks_h.clamp(1, MAX_FLOOR_CHUNKS);
        let tile_w = tile_w.clamp(1, MAX_CHUNK_TILES);
        let tile_h = tile_h.clamp(1, MAX_CHUNK_TILES);

        let mut chunks = BTreeMap::new();
        for cy in 0..chunks_h {
            for cx in 0..chunks_w {
                if floor_allows_chunk(z, cx, cy) {
                    chunks.insert(
                        pack_chunk_key(cx, cy),
                        Chunk {
                            tiles_w: tile_w,
                            tiles_h: tile_h,
                            loaded: false,
                        },
                    );
                }
            }
        }

        Self {
            z,
            chunks_w,
            chunks_h,
            tile_w,
            tile_h,
            chunks,
            hot_chunks: BTreeSet::new(),
            warm_chunks: BTreeSet::new(),
        }
    }

    /// Chunk containing the given tile (floor division).
    #[inline]
    pub fn tile_to_chunk(&self, tile_x: i32, tile_y: i32) -> (i32, i32) {
        (tile_x.div_euclid(self.tile_w), tile_y.div_euclid(self.tile_h))
    }

    /// Chunk containing a fractional grid position.
    #[inline]
    pub fn grid_to_chunk(&self, grid_x: f32, grid_y: f32) -> (i32, i32) {
        (
            (grid_x / self.tile_w as f32).floor() as i32,
            (grid_y / self.tile_h as f32).floor() as i32,
        )
    }

    /// Whether a chunk exists in the pre-allocated grid.
    #[inline]
    pub fn has_chunk(&self, cx: i32, cy: i32) -> bool {
        cx >= 0
            && cy >= 0
            && cx < self.chunks_w
            && cy < self.chunks_h
            && self.chunks.contains_key(&pack_chunk_key(cx, cy))
    }

    pub fn chunk(&self, cx: i32, cy: i32) -> Option<&Chunk> {
        if !self.has_chunk(cx, cy) {
            return None;
        }
        self.chunks.get(&pack_chunk_key(cx, cy))
    }

    /// Number of pre-allocated chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn hot_chunks(&self) -> &BTreeSet<ChunkKey> {
        &self.hot_chunks
    }

    pub fn warm_chunks(&self) -> &BTreeSet<ChunkKey> {
        &self.warm_chunks
    }

    pub fn is_hot(&self, cx: i32, cy: i32) -> bool {
        self.hot_chunks.contains(&pack_chunk_key(cx, cy))
    }

    pub fn is_warm(&self, cx: i32, cy: i32) -> bool {
        self.warm_chunks.contains(&pack_chunk_key(cx, cy))
    }

    /// Drop all activation state (loaded flags persist).
    pub fn clear_activation(&mut self) {
        self.hot_chunks.clear();
        self.warm_chunks.clear();
    }

    /// Mark a chunk hot. Hot takes precedence: the chunk leaves the warm set.
    ///
    /// Returns false if the chunk is outside the pre-allocated grid.
    pub fn mark_hot(&mut self, cx: i32, cy: i32) -> bool {
        let Some(key) = self.touch(cx, cy) else {
            return false;
        };
        self.warm_chunks.remove(&key);
        self.hot_chunks.insert(key);
        true
    }

    /// Mark a chunk warm unless it is already hot.
    ///
    /// Returns false if the chunk is outside the pre-allocated grid.
    pub fn mark_warm(&mut self, cx: i32, cy: i32) -> bool {
        let Some(key) = self.touch(cx, cy) else {
            return false;
        };
        if !self.hot_chunks.contains(&key) {
            self.warm_chunks.insert(key);
        }
        true
    }

    fn touch(&mut self, cx: i32, cy: i32) -> Option<ChunkKey> {
        if cx < 0 || cy < 0 || cx >= self.chunks_w || cy >= self.chunks_h {
            return None;
        }
        let key = pack_chunk_key(cx, cy);
        let chunk = self.chunks.get_mut(&key)?;
        chunk.loaded = true;
        Some(key)
    }
}

/// All floors of one simulation, indexed by Z.
#[derive(Resource, Debug, Default)]
pub struct FloorTable {
    floors: Vec<Floor>,
    slot_by_z: HashMap<i32, usize>,
}

impl FloorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a floor at `z`. Idempotent: an existing floor is left untouched.
    ///
    /// Returns the floor id, which is its Z level.
    pub fn spawn(&mut self, z: i32, chunks_w: i32, chunks_h: i32, tile_w: i32, tile_h: i32) -> i32 {
        if self.slot_by_z.contains_key(&z) {
            return z;
        }
        let floor = Floor::new(z, chunks_w, chunks_h, tile_w, tile_h);
        tracing::debug!(
            z,
            chunks_w = floor.chunks_w,
            chunks_h = floor.chunks_h,
            tile_w = floor.tile_w,
            tile_h = floor.tile_h,
            "floor spawned"
        );
        self.slot_by_z.insert(z, self.floors.len());
        self.floors.push(floor);
        z
    }

    /// Get the floor at `z`, creating it with the default sizing policy if absent.
    pub fn ensure(&mut self, z: i32) -> &mut Floor {
        if !self.slot_by_z.contains_key(&z) {
            let (cw, ch) = default_floor_chunks(z);
            self.spawn(z, cw, ch, DEFAULT_CHUNK_TILES, DEFAULT_CHUNK_TILES);
        }
        let slot = self.slot_by_z[&z];
        &mut self.floors[slot]
    }

    pub fn get(&self, z: i32) -> Option<&Floor> {
        self.slot_by_z.get(&z).map(|&slot| &self.floors[slot])
    }

    pub fn get_mut(&mut self, z: i32) -> Option<&mut Floor> {
        self.slot_by_z.get(&z).map(|&slot| &mut self.floors[slot])
    }

    pub fn contains(&self, z: i32) -> bool {
        self.slot_by_z.contains_key(&z)
    }

    /// Floors in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Floor> {
        self.floors.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Floor> {
        self.floors.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.floors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.floors.is_empty()
    }

    pub fn clear(&mut self) {
        self.floors.clear();
        self.slot_by_z.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_key_packing() {
        for &(cx, cy) in &[(0, 0), (3, 7), (-1, 5), (1000, -1000), (-32768, 32767)] {
            assert_eq!(unpack_chunk_key(pack_chunk_key(cx, cy)), (cx, cy));
        }
        assert_ne!(pack_chunk_key(1, 0), pack_chunk_key(0, 1));
    }

    #[test]
    fn test_spawn_preallocates_grid() {
        let floor = Floor::new(0, 3, 2, 32, 32);
        assert_eq!(floor.chunk_count(), 6);
        assert!(floor.has_chunk(2, 1));
        assert!(!floor.has_chunk(3, 0));
        assert!(!floor.has_chunk(-1, 0));
    }

    #[test]
    fn test_tower_floor_envelope() {
        let floor = Floor::new(2, 4, 4, 32, 32);
        assert_eq!(floor.chunk_count(), 4);
        assert!(floor.has_chunk(1, 1));
        assert!(!floor.has_chunk(2, 0));
    }

    #[test]
    fn test_spawn_is_idempotent() {
        let mut table = FloorTable::new();
        assert_eq!(table.spawn(0, 4, 4, 32, 32), 0);
        assert_eq!(table.spawn(0, 8, 8, 16, 16), 0);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0).unwrap().chunks_w, 4);
    }

    #[test]
    fn test_ensure_uses_policy() {
        let mut table = FloorTable::new();
        assert_eq!(table.ensure(3).chunks_w, 2);
        assert_eq!(table.ensure(-2).chunks_w, 4);
        assert_eq!(table.ensure(-2).tile_w, DEFAULT_CHUNK_TILES);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_hot_wins_over_warm() {
        let mut floor = Floor::new(0, 4, 4, 32, 32);
        assert!(floor.mark_warm(1, 1));
        assert!(floor.mark_hot(1, 1));
        assert!(floor.mark_warm(1, 1));
        assert!(floor.is_hot(1, 1));
        assert!(!floor.is_warm(1, 1));
        assert!(floor.chunk(1, 1).unwrap().loaded);
    }

    #[test]
    fn test_out_of_grid_marks_are_ignored() {
        let mut floor = Floor::new(0, 2, 2, 32, 32);
        assert!(!floor.mark_hot(5, 5));
        assert!(!floor.mark_warm(-1, 0));
        assert!(floor.hot_chunks().is_empty());
        assert!(floor.warm_chunks().is_empty());
        assert_eq!(floor.chunk_count(), 4);
    }

    #[test]
    fn test_oversized_grid_is_clamped() {
        let mut floor = Floor::new(0, 65_537, 1, 1, i32::MAX);
        assert_eq!(floor.chunks_w, MAX_FLOOR_CHUNKS);
        assert_eq!(floor.chunk_count(), MAX_FLOOR_CHUNKS as usize);
        assert_eq!(floor.tile_h, MAX_CHUNK_TILES);

        // Column 65536 would alias (0, 0) in the packed key.
        assert!(!floor.mark_hot(65_536, 0));
        assert!(!floor.is_hot(0, 0));
        assert!(floor.hot_chunks().is_empty());
    }

    #[test]
    fn test_tile_to_chunk_floors_negative() {
        let floor = Floor::new(0, 4, 4, 32, 32);
        assert_eq!(floor.tile_to_chunk(40, 31), (1, 0));
        assert_eq!(floor.tile_to_chunk(-1, 0), (-1, 0));
        assert_eq!(floor.grid_to_chunk(64.5, -0.5), (2, -1));
    }
}

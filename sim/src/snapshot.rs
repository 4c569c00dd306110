//! Renderable entity state captured at the end of every tick.
//!
//! # Record layout
//!
//! One [`SnapshotRecord`] per live entity, ordered by entity id. The flat
//! `f32` encoding used across FFI boundaries is:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ HEADER (2 elements)                                      │
//! │   [0] tick         (u32 as f32)                          │
//! │   [1] record_count (as f32)                              │
//! ├──────────────────────────────────────────────────────────┤
//! │ For each record i (offset = 2 + i * SNAPSHOT_STRIDE):    │
//! │   [+0] id     - entity id (u32 as f32)                   │
//! │   [+1] x      - world x (grid x * tile size)             │
//! │   [+2] y      - world y (grid y * tile size)             │
//! │   [+3] z      - floor index                              │
//! │   [+4] vx     - velocity x (always 0)                    │
//! │   [+5] vy     - velocity y (always 0)                    │
//! │   [+6] angle  - facing, radians                          │
//! │   [+7] flags  - anim flag bits (u32 as f32)              │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Entities without a transform or animation state contribute zeros for
//! those fields.
//!
//! # Ownership
//!
//! Published snapshots are immutable and shared through `Arc`. Rotating
//! the publisher only drops its own handle, so a consumer still holding the
//! displaced snapshot keeps it alive.

use crate::components::{AnimState, EntityId, Transform};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of f32 values per record in the flat buffer.
pub const SNAPSHOT_STRIDE: usize = 8;
/// Number of f32 values in the flat buffer header.
pub const SNAPSHOT_HEADER: usize = 2;

pub const FIELD_ID: usize = 0;
pub const FIELD_X: usize = 1;
pub const FIELD_Y: usize = 2;
pub const FIELD_Z: usize = 3;
pub const FIELD_VX: usize = 4;
pub const FIELD_VY: usize = 5;
pub const FIELD_ANGLE: usize = 6;
pub const FIELD_FLAGS: usize = 7;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub angle: f32,
    pub flags: u32,
}

/// Immutable capture of every live entity at the end of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u32,
    pub records: Vec<SnapshotRecord>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&SnapshotRecord> {
        self.records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|i| &self.records[i])
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Encode as a flat `f32` buffer (see module docs for the layout).
    pub fn to_flat_buffer(&self) -> Vec<f32> {
        let mut buffer = Vec::with_capacity(flat_buffer_size(self.records.len()));
        buffer.push(self.tick as f32);
        buffer.push(self.records.len() as f32);
        for r in &self.records {
            buffer.extend_from_slice(&[
                r.id as f32,
                r.x,
                r.y,
                r.z,
                r.vx,
                r.vy,
                r.angle,
                r.flags as f32,
            ]);
        }
        debug_assert_eq!(buffer.len(), flat_buffer_size(self.records.len()));
        buffer
    }
}

#[inline]
pub const fn flat_buffer_size(records: usize) -> usize {
    SNAPSHOT_HEADER + records * SNAPSHOT_STRIDE
}

#[inline]
pub const fn record_offset(index: usize) -> usize {
    SNAPSHOT_HEADER + index * SNAPSHOT_STRIDE
}

/// Capture every live entity.
///
/// Returns `None` when there are no entities, or when the record buffer
/// cannot be allocated.
pub fn capture(world: &mut World, tick: u32, tile_world_size: f32) -> Option<Snapshot> {
    let mut query = world.query::<(&EntityId, Option<&Transform>, Option<&AnimState>)>();
    let count = query.iter(world).count();
    if count == 0 {
        return None;
    }

    let mut records = Vec::new();
    if let Err(err) = records.try_reserve_exact(count) {
        tracing::warn!(tick, count, %err, "snapshot allocation failed");
        return None;
    }
    for (id, transform, anim) in query.iter(world) {
        let mut record = SnapshotRecord {
            id: id.0,
            ..Default::default()
        };
        if let Some(t) = transform {
            record.x = t.grid_x * tile_world_size;
            record.y = t.grid_y * tile_world_size;
            record.z = t.floor_z as f32;
            record.angle = t.facing;
        }
        if let Some(a) = anim {
            record.flags = a.flags;
        }
        records.push(record);
    }
    records.sort_unstable_by_key(|r| r.id);
    Some(Snapshot { tick, records })
}

/// Double buffer of the two most recent snapshots.
#[derive(Debug, Default)]
pub struct SnapshotPublisher {
    current: Option<Arc<Snapshot>>,
    previous: Option<Arc<Snapshot>>,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `current` to `previous` and publish `next` as `current`.
    pub fn rotate(&mut self, next: Option<Snapshot>) {
        self.previous = self.current.take();
        self.current = next.map(Arc::new);
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.clone()
    }

    pub fn previous(&self) -> Option<Arc<Snapshot>> {
        self.previous.clone()
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.previous = None;
    }
}

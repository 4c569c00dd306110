//! Point-to-point transit links between cells, possibly on different floors.
//!
//! Hosts queue [`PortalRequest`]s; each tick `portal_system` matches every
//! pending request against the portals leaving its cell and raises a
//! [`PortalTransit`] for the first ready one. Requests with no ready portal
//! are dropped. `transit_apply_system` then relocates the entities in the
//! same tick.

use crate::components::Transform;
use crate::entities::EntityIndex;
use crate::events::{PortalTransit, SimEvents};
use crate::time::SimTime;
use crate::world::FloorTable;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

pub type PortalId = u32;

/// A single tile addressed by floor, chunk and tile offset within the chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub z: i16,
    pub cx: i16,
    pub cy: i16,
    pub tx: i16,
    pub ty: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalDesc {
    pub from: CellRef,
    pub to: CellRef,
    /// Minimum simulated time between two transits.
    pub cooldown_ms: u32,
    /// Transits allowed per tick; 0 means unlimited.
    pub capacity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalRequest {
    pub entity: u32,
    pub at: CellRef,
}

#[derive(Debug, Clone)]
struct PortalState {
    desc: PortalDesc,
    next_ready_ms: u64,
    inflight: u32,
}

impl PortalState {
    fn ready(&self, now_ms: u64) -> bool {
        if now_ms < self.next_ready_ms {
            return false;
        }
        self.desc.capacity == 0 || self.inflight < self.desc.capacity
    }
}

#[derive(Resource, Debug, Default)]
pub struct PortalNetwork {
    portals: Vec<PortalState>,
    from_index: HashMap<CellRef, Vec<PortalId>>,
    requests: VecDeque<PortalRequest>,
    transits_total: u64,
}

impl PortalNetwork {
    pub fn add(&mut self, desc: PortalDesc) -> PortalId {
        let id = self.portals.len() as PortalId;
        self.portals.push(PortalState {
            desc,
            next_ready_ms: 0,
            inflight: 0,
        });
        self.from_index.entry(desc.from).or_default().push(id);
        id
    }

    pub fn request(&mut self, request: PortalRequest) {
        self.requests.push_back(request);
    }

    pub fn len(&self) -> usize {
        self.portals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portals.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.requests.len()
    }

    pub fn transits_total(&self) -> u64 {
        self.transits_total
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Resolve every pending request at `now_ms`, pushing transits into `events`.
    pub fn step(&mut self, now_ms: u64, events: &mut SimEvents) {
        for _ in 0..self.requests.len() {
            let Some(request) = self.requests.pop_front() else {
                break;
            };
            let Some(candidates) = self.from_index.get(&request.at) else {
                continue;
            };
            for &pid in candidates {
                let portal = &mut self.portals[pid as usize];
                if !portal.ready(now_ms) {
                    continue;
                }
                events.portal_transits.push(PortalTransit {
                    entity: request.entity,
                    to: portal.desc.to,
                });
                if portal.desc.cooldown_ms > 0 {
                    portal.next_ready_ms = now_ms.saturating_add(u64::from(portal.desc.cooldown_ms));
                }
                if portal.desc.capacity > 0 {
                    portal.inflight += 1;
                }
                self.transits_total += 1;
                break;
            }
        }
        // Transits complete within the tick.
        for portal in &mut self.portals {
            portal.inflight = 0;
        }
    }
}

pub fn portal_system(
    mut network: ResMut<PortalNetwork>,
    time: Res<SimTime>,
    mut events: ResMut<SimEvents>,
) {
    network.step(time.elapsed_ms(), &mut events);
}

/// Relocate entities named by this tick's transit events.
pub fn transit_apply_system(
    events: Res<SimEvents>,
    index: Res<EntityIndex>,
    mut floors: ResMut<FloorTable>,
    mut query: Query<&mut Transform>,
) {
    for transit in &events.portal_transits {
        let Some(entity) = index.get(transit.entity) else {
            continue;
        };
        let Ok(mut t) = query.get_mut(entity) else {
            continue;
        };
        let to = transit.to;
        let floor = floors.ensure(to.z as i32);
        let tile_x = to.cx as i32 * floor.tile_w + to.tx as i32;
        let tile_y = to.cy as i32 * floor.tile_h + to.ty as i32;
        t.floor_z = to.z as i32;
        t.grid_x = tile_x as f32;
        t.grid_y = tile_y as f32;
        t.chunk_x = to.cx as i32;
        t.chunk_y = to.cy as i32;
        tracing::debug!(entity = transit.entity, z = t.floor_z, tile_x, tile_y, "portal transit");
    }
}

//! Observer-driven chunk activation.
//!
//! Every tick the hot/warm chunk sets of every floor are rebuilt from
//! scratch as the union over all observers. The rebuild depends only on the
//! observer list and the floor table, so running it twice without a state
//! change yields identical sets.
//!
//! Hot always wins: a chunk marked hot by any observer is never also
//! recorded as warm, whichever observer reaches it first.
//!
//! Work per observer is bounded by the floor grid and the capped layer
//! counts, whatever coordinates the observer carries.

use crate::config::SimConfig;
use crate::observer::{ChunkRadii, ObserverRegistry};
use crate::world::{Floor, FloorTable};
use bevy_ecs::prelude::*;
use std::ops::RangeInclusive;

/// Rebuild hot/warm chunk sets on every floor.
///
/// `hot_z_default` / `warm_z_default` apply to observers whose own layer
/// counts are negative. Observers standing on a missing floor activate
/// nothing.
pub fn rebuild_activation(
    floors: &mut FloorTable,
    observers: &ObserverRegistry,
    hot_z_default: i32,
    warm_z_default: i32,
    max_chunk_radius: i32,
) {
    for floor in floors.iter_mut() {
        floor.clear_activation();
    }

    for observer in observers.iter() {
        let Some(base) = floors.get(observer.z) else {
            continue;
        };
        let radii = observer.chunk_radii(base, max_chunk_radius);
        let (ocx, ocy) = base.tile_to_chunk(observer.tile_x, observer.tile_y);
        let hot_z = observer.hot_layers(hot_z_default);
        let warm_z = observer.warm_layers(warm_z_default);

        for dz in -hot_z..=hot_z {
            let Some(z) = observer.z.checked_add(dz) else {
                continue;
            };
            if let Some(floor) = floors.get_mut(z) {
                mark_tiered(floor, ocx, ocy, radii);
            }
        }
        for dz in -warm_z..=warm_z {
            if dz.abs() <= hot_z {
                continue;
            }
            let Some(z) = observer.z.checked_add(dz) else {
                continue;
            };
            if let Some(floor) = floors.get_mut(z) {
                mark_warm_only(floor, ocx, ocy, radii.warm_x, radii.warm_y);
            }
        }
    }
}

/// Grid cells within `radius` of `center`, clipped to `0..len`.
fn grid_span(center: i32, radius: i32, len: i32) -> RangeInclusive<i32> {
    let lo = (i64::from(center) - i64::from(radius)).max(0);
    let hi = (i64::from(center) + i64::from(radius)).min(i64::from(len) - 1);
    if lo > hi {
        return 1..=0;
    }
    // Both ends lie in 0..len here.
    (lo as i32)..=(hi as i32)
}

fn within(c: i32, center: i32, radius: i32) -> bool {
    (i64::from(c) - i64::from(center)).abs() <= i64::from(radius)
}

fn mark_tiered(floor: &mut Floor, ocx: i32, ocy: i32, radii: ChunkRadii) {
    for cy in grid_span(ocy, radii.warm_y, floor.chunks_h) {
        for cx in grid_span(ocx, radii.warm_x, floor.chunks_w) {
            if within(cx, ocx, radii.hot_x) && within(cy, ocy, radii.hot_y) {
                floor.mark_hot(cx, cy);
            } else {
                floor.mark_warm(cx, cy);
            }
        }
    }
}

fn mark_warm_only(floor: &mut Floor, ocx: i32, ocy: i32, rx: i32, ry: i32) {
    for cy in grid_span(ocy, ry, floor.chunks_h) {
        for cx in grid_span(ocx, rx, floor.chunks_w) {
            floor.mark_warm(cx, cy);
        }
    }
}

/// System wrapper running the rebuild with the configured defaults.
pub fn activation_system(
    mut floors: ResMut<FloorTable>,
    observers: Res<ObserverRegistry>,
    config: Res<SimConfig>,
) {
    rebuild_activation(
        &mut floors,
        &observers,
        config.hot_z_layers,
        config.warm_z_layers,
        config.max_chunk_radius,
    );
}

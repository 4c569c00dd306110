//! Edge-triggered events raised during a tick.
//!
//! Events live for exactly one tick: systems later in the same tick consume
//! them, and the scheduler clears the buffer after the snapshot is captured.

use crate::systems::portal::CellRef;
use bevy_ecs::prelude::*;

/// An entity passed through a portal and must be relocated to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortalTransit {
    pub entity: u32,
    pub to: CellRef,
}

#[derive(Resource, Debug, Default)]
pub struct SimEvents {
    pub portal_transits: Vec<PortalTransit>,
}

impl SimEvents {
    pub fn clear(&mut self) {
        self.portal_transits.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.portal_transits.is_empty()
    }
}

//! ECS components for the simulation.
//!
//! Components are pure data containers attached to entities. The
//! `bevy_ecs::World` acts as the dense component store; the simulation
//! layers id-based lookup on top of it (see [`crate::entities`]).

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Stable simulation id of a live entity (dense, 1-based, never reused).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Human readable name, cloned from the entity's prototype.
#[derive(Component, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayName(pub String);

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// Grid position of an entity on a floor.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub grid_x: f32,
    pub grid_y: f32,
    pub floor_z: i32,
    /// Chunk containing `(grid_x, grid_y)`, kept in sync by every mutation.
    pub chunk_x: i32,
    pub chunk_y: i32,
    /// Facing angle in radians, counter-clockwise from east.
    pub facing: f32,
}

impl Transform {
    pub fn new(grid_x: f32, grid_y: f32, floor_z: i32) -> Self {
        Self {
            grid_x,
            grid_y,
            floor_z,
            ..Default::default()
        }
    }

    /// Integer tile under the entity.
    pub fn tile(&self) -> (i32, i32) {
        (self.grid_x.floor() as i32, self.grid_y.floor() as i32)
    }
}

// ============================================================================
// ANIMATION STATE
// ============================================================================

pub mod anim_flags {
    pub const MOVING: u32 = 0x01;
    pub const FACING_EAST: u32 = 0x02;
    pub const FACING_WEST: u32 = 0x04;
    pub const FACING_NORTH: u32 = 0x08;
    pub const FACING_SOUTH: u32 = 0x10;
    pub const FACING_MASK: u32 = FACING_EAST | FACING_WEST | FACING_NORTH | FACING_SOUTH;
}

/// Compass direction an entity faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facing {
    East,
    West,
    North,
    South,
}

impl Facing {
    pub fn flag(self) -> u32 {
        match self {
            Facing::East => anim_flags::FACING_EAST,
            Facing::West => anim_flags::FACING_WEST,
            Facing::North => anim_flags::FACING_NORTH,
            Facing::South => anim_flags::FACING_SOUTH,
        }
    }

    pub fn angle(self) -> f32 {
        use std::f32::consts::{FRAC_PI_2, PI};
        match self {
            Facing::East => 0.0,
            Facing::North => FRAC_PI_2,
            Facing::West => PI,
            Facing::South => -FRAC_PI_2,
        }
    }
}

/// Bit set of renderable state flags (see [`anim_flags`]).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimState {
    pub flags: u32,
}

impl AnimState {
    pub fn set_moving(&mut self, moving: bool) {
        if moving {
            self.flags |= anim_flags::MOVING;
        } else {
            self.flags &= !anim_flags::MOVING;
        }
    }

    pub fn is_moving(&self) -> bool {
        self.flags & anim_flags::MOVING != 0
    }

    /// Replace the facing bits; `None` clears them.
    pub fn set_facing(&mut self, facing: Option<Facing>) {
        self.flags &= !anim_flags::FACING_MASK;
        if let Some(f) = facing {
            self.flags |= f.flag();
        }
    }
}

// ============================================================================
// ITEMS & INVENTORY
// ============================================================================

/// Item kinds. Wire codes start at 1; 0 means "no item".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Stone,
    Iron,
    Wood,
    Herbs,
    Mushrooms,
    Crystal,
    CutStone,
}

impl ItemType {
    pub fn from_code(code: u64) -> Option<Self> {
        Some(match code {
            1 => ItemType::Stone,
            2 => ItemType::Iron,
            3 => ItemType::Wood,
            4 => ItemType::Herbs,
            5 => ItemType::Mushrooms,
            6 => ItemType::Crystal,
            7 => ItemType::CutStone,
            _ => return None,
        })
    }

    pub fn code(self) -> u64 {
        match self {
            ItemType::Stone => 1,
            ItemType::Iron => 2,
            ItemType::Wood => 3,
            ItemType::Herbs => 4,
            ItemType::Mushrooms => 5,
            ItemType::Crystal => 6,
            ItemType::CutStone => 7,
        }
    }

    pub fn max_stack(self) -> u32 {
        match self {
            ItemType::Stone => 64,
            ItemType::Iron => 32,
            ItemType::Wood => 50,
            ItemType::Herbs => 20,
            ItemType::Mushrooms => 10,
            ItemType::Crystal => 1,
            ItemType::CutStone => 16,
        }
    }
}

/// One inventory slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySlot {
    pub item: Option<ItemType>,
    pub quantity: u32,
    /// Empty whitelist admits every item.
    pub whitelist: Vec<ItemType>,
    pub is_output: bool,
}

impl InventorySlot {
    pub fn input() -> Self {
        Self::default()
    }

    pub fn output() -> Self {
        Self {
            is_output: true,
            ..Default::default()
        }
    }

    pub fn admits(&self, item: ItemType) -> bool {
        self.whitelist.is_empty() || self.whitelist.contains(&item)
    }
}

/// Slotted item storage.
#[derive(Component, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub slots: Vec<InventorySlot>,
}

/// Periodically produces one unit of an item into an output slot.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    pub target: ItemType,
    /// Ticks between produced units (minimum 1).
    pub interval_ticks: u32,
    /// Ticks accumulated toward the next unit.
    pub timer: u32,
}

impl Production {
    pub fn new(target: ItemType, interval_ticks: u32) -> Self {
        Self {
            target,
            interval_ticks: interval_ticks.max(1),
            timer: 0,
        }
    }
}

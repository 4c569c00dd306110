//! Resource extraction.

use crate::components::{Inventory, Production};
use crate::systems::inventory::{add_to_slot, can_add_to_slot, output_slots};
use bevy_ecs::prelude::*;

/// Every `interval_ticks` ticks, push one unit of the target item into the
/// first output slot that accepts it. If every output is full the unit is
/// dropped.
pub fn extraction_system(mut query: Query<(&mut Production, &mut Inventory)>) {
    for (mut production, mut inventory) in query.iter_mut() {
        production.timer += 1;
        if production.timer < production.interval_ticks {
            continue;
        }
        production.timer = 0;

        let target = production.target;
        let slot = output_slots(&inventory).find(|&s| can_add_to_slot(&inventory, s, target, 1));
        if let Some(slot) = slot {
            add_to_slot(&mut inventory, slot, target, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{InventorySlot, ItemType};
    use crate::systems::inventory::slot_quantity;

    fn run(world: &mut World, ticks: u32) {
        let mut schedule = Schedule::default();
        schedule.add_systems(extraction_system);
        for _ in 0..ticks {
            schedule.run(world);
        }
    }

    #[test]
    fn test_produces_on_interval() {
        let mut world = World::new();
        let e = world
            .spawn((
                Production::new(ItemType::Iron, 3),
                Inventory {
                    slots: vec![InventorySlot::input(), InventorySlot::output()],
                },
            ))
            .id();

        run(&mut world, 7);
        let inv = world.get::<Inventory>(e).unwrap();
        assert_eq!(slot_quantity(inv, 0), 0);
        assert_eq!(slot_quantity(inv, 1), 2);
    }

    #[test]
    fn test_full_output_spills_to_next_slot() {
        let mut world = World::new();
        let e = world
            .spawn((
                Production::new(ItemType::Crystal, 1),
                Inventory {
                    slots: vec![InventorySlot::output(), InventorySlot::output()],
                },
            ))
            .id();

        run(&mut world, 3);
        let inv = world.get::<Inventory>(e).unwrap();
        assert_eq!(slot_quantity(inv, 0), 1);
        assert_eq!(slot_quantity(inv, 1), 1);
    }
}

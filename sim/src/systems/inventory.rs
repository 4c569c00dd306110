//! Slot-level inventory operations.
//!
//! Pure data-driven: inventories have no per-tick update of their own.

use crate::components::{Inventory, ItemType};

/// Whether `amount` of `item` fits into `slot`.
pub fn can_add_to_slot(inventory: &Inventory, slot: usize, item: ItemType, amount: u32) -> bool {
    let Some(s) = inventory.slots.get(slot) else {
        return false;
    };
    if !s.admits(item) {
        return false;
    }
    if s.item.is_some_and(|held| held != item) {
        return false;
    }
    s.quantity.saturating_add(amount) <= item.max_stack()
}

/// Add items to a slot. Returns false (and changes nothing) if they do not fit.
pub fn add_to_slot(inventory: &mut Inventory, slot: usize, item: ItemType, amount: u32) -> bool {
    if !can_add_to_slot(inventory, slot, item, amount) {
        return false;
    }
    let s = &mut inventory.slots[slot];
    s.item = Some(item);
    s.quantity += amount;
    true
}

/// Remove items from a slot holding `item`. Emptying a slot clears its item.
pub fn remove_from_slot(inventory: &mut Inventory, slot: usize, item: ItemType, amount: u32) -> bool {
    let Some(s) = inventory.slots.get_mut(slot) else {
        return false;
    };
    if s.item != Some(item) || s.quantity < amount {
        return false;
    }
    s.quantity -= amount;
    if s.quantity == 0 {
        s.item = None;
    }
    true
}

pub fn slot_item(inventory: &Inventory, slot: usize) -> Option<ItemType> {
    inventory.slots.get(slot).and_then(|s| s.item)
}

pub fn slot_quantity(inventory: &Inventory, slot: usize) -> u32 {
    inventory.slots.get(slot).map_or(0, |s| s.quantity)
}

/// Indices of output slots, in slot order.
pub fn output_slots(inventory: &Inventory) -> impl Iterator<Item = usize> + '_ {
    inventory
        .slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_output)
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::InventorySlot;

    fn inventory() -> Inventory {
        Inventory {
            slots: vec![
                InventorySlot::input(),
                InventorySlot {
                    whitelist: vec![ItemType::Wood],
                    ..InventorySlot::input()
                },
                InventorySlot::output(),
            ],
        }
    }

    #[test]
    fn test_add_and_stack() {
        let mut inv = inventory();
        assert!(add_to_slot(&mut inv, 0, ItemType::Stone, 10));
        assert!(add_to_slot(&mut inv, 0, ItemType::Stone, 54));
        assert_eq!(slot_quantity(&inv, 0), 64);
        assert!(!add_to_slot(&mut inv, 0, ItemType::Stone, 1));
        assert!(!add_to_slot(&mut inv, 0, ItemType::Iron, 1));
    }

    #[test]
    fn test_whitelist_and_bounds() {
        let mut inv = inventory();
        assert!(!add_to_slot(&mut inv, 1, ItemType::Stone, 1));
        assert!(add_to_slot(&mut inv, 1, ItemType::Wood, 1));
        assert!(!add_to_slot(&mut inv, 9, ItemType::Wood, 1));
    }

    #[test]
    fn test_remove_clears_empty_slot() {
        let mut inv = inventory();
        add_to_slot(&mut inv, 2, ItemType::Herbs, 5);
        assert!(!remove_from_slot(&mut inv, 2, ItemType::Herbs, 6));
        assert!(!remove_from_slot(&mut inv, 2, ItemType::Wood, 1));
        assert!(remove_from_slot(&mut inv, 2, ItemType::Herbs, 5));
        assert_eq!(slot_item(&inv, 2), None);
        assert_eq!(slot_quantity(&inv, 2), 0);
    }

    #[test]
    fn test_output_slots() {
        let inv = inventory();
        assert_eq!(output_slots(&inv).collect::<Vec<_>>(), vec![2]);
    }
}

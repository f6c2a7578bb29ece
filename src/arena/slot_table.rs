// Slot table - the arena behind the object database
//
// A Vec of slots addressed by the low bits of an ObjectId. Each slot carries
// the validator that was current when it was last handed out; an id is live
// only while the validator it carries matches the slot's.
//
// FREE LIST:
// Slot indices are not recycled through a separate stack. Instead the
// `next_free` field of the rows at positions [count..len) holds the indices
// of the free slots: allocation reads `slots[count].next_free`, release writes
// the freed index into `slots[count - 1].next_free` after decrementing count.
// Growing the table initializes every new row with `next_free = own index`.
//
// VALIDATORS:
// A single counter shared by every slot is advanced on each allocation and
// wraps inside VALIDATOR_MASK, skipping zero. Zero marks a free slot, so no
// id (whose validator is never zero) can match a free row.

use crate::error::SlotError;
use crate::id::{MAX_SLOTS, ObjectId, VALIDATOR_MASK};

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    validator: u64,
    next_free: u32,
    ref_counted: bool,
}

impl<T> Slot<T> {
    fn vacant(index: u32) -> Self {
        Self {
            value: None,
            validator: 0,
            next_free: index,
            ref_counted: false,
        }
    }
}

/// Generational table of values addressed by [`ObjectId`].
#[derive(Debug)]
pub struct SlotTable<T> {
    slots: Vec<Slot<T>>,
    count: u32,
    max_slots: u32,
    validator_counter: u64,
}

impl<T> SlotTable<T> {
    /// An empty table that may grow up to [`MAX_SLOTS`] rows.
    pub const fn new() -> Self {
        Self::with_max_slots(MAX_SLOTS)
    }

    /// An empty table with a lower slot ceiling.
    pub const fn with_max_slots(max_slots: u32) -> Self {
        Self {
            slots: Vec::new(),
            count: 0,
            max_slots,
            validator_counter: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Whether the table holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of allocated rows, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Store `value` in a free slot and return the id naming it.
    pub fn insert(&mut self, value: T, ref_counted: bool) -> Result<ObjectId, SlotError> {
        if self.count as usize == self.slots.len() {
            self.grow()?;
        }

        let index = self.slots[self.count as usize].next_free;
        let slot = &mut self.slots[index as usize];
        if slot.value.is_some() {
            return Err(SlotError::Corrupted { slot: index });
        }

        self.validator_counter = (self.validator_counter + 1) & VALIDATOR_MASK;
        if self.validator_counter == 0 {
            cov_mark::hit!(validator_counter_wrapped);
            self.validator_counter = 1;
        }

        slot.value = Some(value);
        slot.ref_counted = ref_counted;
        slot.validator = self.validator_counter;
        self.count += 1;

        Ok(ObjectId::pack(index, self.validator_counter, ref_counted))
    }

    fn grow(&mut self) -> Result<(), SlotError> {
        let current = self.slots.len() as u32;
        if current >= self.max_slots {
            return Err(SlotError::CapacityExhausted {
                max: self.max_slots,
            });
        }
        cov_mark::hit!(slot_table_grows);

        let new_len = if current == 0 { 1 } else { current.saturating_mul(2) }.min(self.max_slots);
        self.slots.reserve_exact((new_len - current) as usize);
        self.slots.extend((current..new_len).map(Slot::vacant));
        Ok(())
    }

    /// Release the slot named by `id` and return its value.
    ///
    /// Fails without touching the table when `id` is stale or was never
    /// issued by this table.
    pub fn remove(&mut self, id: ObjectId) -> Result<T, SlotError> {
        let index = self.live_index(id).ok_or(SlotError::Stale { id })?;

        self.count -= 1;
        self.slots[self.count as usize].next_free = index;

        let slot = &mut self.slots[index as usize];
        slot.validator = 0;
        slot.ref_counted = false;
        slot.value.take().ok_or(SlotError::Corrupted { slot: index })
    }

    /// Borrow the value named by `id`, or `None` when the id is stale.
    pub fn get(&self, id: ObjectId) -> Option<&T> {
        let index = self.live_index(id)?;
        self.slots[index as usize].value.as_ref()
    }

    /// Whether `id` currently names a live entry.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.live_index(id).is_some()
    }

    fn live_index(&self, id: ObjectId) -> Option<u32> {
        let index = id.slot();
        let validator = id.validator();
        if validator == 0 {
            return None;
        }
        let slot = self.slots.get(index as usize)?;
        (slot.validator == validator).then_some(index)
    }

    /// Iterate over every live entry together with its id.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            Some((
                ObjectId::pack(index as u32, slot.validator, slot.ref_counted),
                value,
            ))
        })
    }

    #[cfg(test)]
    pub(crate) fn set_validator_counter(&mut self, value: u64) {
        self.validator_counter = value & VALIDATOR_MASK;
    }
}

impl<T> Default for SlotTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn capacity_doubles_as_entries_are_added() {
        cov_mark::check!(slot_table_grows);
        let mut table = SlotTable::new();

        let mut capacities = Vec::new();
        for value in 0..5 {
            table.insert(value, false).unwrap();
            capacities.push(table.capacity());
        }

        assert_eq!(capacities, vec![1, 2, 4, 4, 8]);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn ceiling_is_reported_not_exceeded() {
        let mut table = SlotTable::with_max_slots(3);
        for value in 0..3 {
            table.insert(value, false).unwrap();
        }

        assert_eq!(table.capacity(), 3);
        assert_eq!(
            table.insert(99, false),
            Err(SlotError::CapacityExhausted { max: 3 })
        );
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn freed_slot_is_reused_with_new_validator() {
        let mut table = SlotTable::new();
        let first = table.insert("a", false).unwrap();
        table.remove(first).unwrap();

        let second = table.insert("b", false).unwrap();

        assert_eq!(first.slot(), second.slot());
        assert_ne!(first.validator(), second.validator());
        assert_eq!(table.get(first), None);
        assert_eq!(table.get(second), Some(&"b"));
    }

    #[test]
    fn free_list_hands_back_released_slots_first() {
        let mut table = SlotTable::new();
        let ids: Vec<_> = (0..4).map(|v| table.insert(v, false).unwrap()).collect();

        table.remove(ids[1]).unwrap();
        table.remove(ids[3]).unwrap();

        let a = table.insert(10, false).unwrap();
        let b = table.insert(11, false).unwrap();
        let reused: HashSet<_> = [a.slot(), b.slot()].into_iter().collect();

        assert_eq!(reused, HashSet::from([ids[1].slot(), ids[3].slot()]));
        assert_eq!(table.capacity(), 4);
    }

    #[test]
    fn double_remove_is_rejected() {
        let mut table = SlotTable::new();
        let id = table.insert(1, false).unwrap();

        assert_eq!(table.remove(id), Ok(1));
        assert_eq!(table.remove(id), Err(SlotError::Stale { id }));
        assert!(table.is_empty());
    }

    #[test]
    fn unknown_ids_resolve_to_none() {
        let mut table = SlotTable::new();
        table.insert(1, false).unwrap();

        assert_eq!(table.get(ObjectId::NULL), None);
        assert_eq!(table.get(ObjectId::from_u64(u64::MAX)), None);
        assert_eq!(table.get(ObjectId::pack(0, 12345, false)), None);
    }

    #[test]
    fn validator_counter_skips_zero_on_wrap() {
        cov_mark::check!(validator_counter_wrapped);
        let mut table = SlotTable::new();
        table.set_validator_counter(VALIDATOR_MASK);

        let id = table.insert((), false).unwrap();

        assert_eq!(id.validator(), 1);
        assert!(table.contains(id));
    }

    #[test]
    fn reference_bit_is_carried_by_ids() {
        let mut table = SlotTable::new();
        let plain = table.insert(1, false).unwrap();
        let counted = table.insert(2, true).unwrap();

        assert!(!plain.is_ref_counted());
        assert!(counted.is_ref_counted());

        let listed: Vec<_> = table.iter().map(|(id, _)| id).collect();
        assert_eq!(listed, vec![plain, counted]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert,
        Remove(usize),
    }

    fn ops() -> impl Strategy<Value = Vec<Op>> {
        prop::collection::vec(
            prop_oneof![Just(Op::Insert), (0usize..64).prop_map(Op::Remove)],
            1..200,
        )
    }

    proptest! {
        #[test]
        fn released_ids_never_resolve(ops in ops()) {
            let mut table = SlotTable::new();
            let mut live: Vec<(ObjectId, u32)> = Vec::new();
            let mut dead: Vec<ObjectId> = Vec::new();
            let mut next = 0u32;

            for op in ops {
                match op {
                    Op::Insert => {
                        let id = table.insert(next, false).unwrap();
                        live.push((id, next));
                        next += 1;
                    }
                    Op::Remove(pick) if !live.is_empty() => {
                        let (id, value) = live.swap_remove(pick % live.len());
                        prop_assert_eq!(table.remove(id), Ok(value));
                        dead.push(id);
                    }
                    Op::Remove(_) => {}
                }

                for id in &dead {
                    prop_assert!(table.get(*id).is_none());
                }
                for (id, value) in &live {
                    prop_assert_eq!(table.get(*id), Some(value));
                }
                prop_assert_eq!(table.len(), live.len());
            }
        }

        #[test]
        fn reused_slots_never_alias(ops in ops()) {
            let mut table = SlotTable::new();
            let mut live: Vec<ObjectId> = Vec::new();
            let mut issued: HashSet<u64> = HashSet::new();

            for op in ops {
                match op {
                    Op::Insert => {
                        let id = table.insert((), false).unwrap();
                        prop_assert!(issued.insert(id.to_u64()));
                        live.push(id);
                    }
                    Op::Remove(pick) if !live.is_empty() => {
                        let id = live.swap_remove(pick % live.len());
                        table.remove(id).unwrap();
                    }
                    Op::Remove(_) => {}
                }
            }
        }
    }
}

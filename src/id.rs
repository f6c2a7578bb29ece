//! Bit layout of [`ObjectId`].
//!
//! An id packs three fields into 64 bits:
//!
//! ```text
//!  63   62 ............................ 24  23 ............. 0
//! [ref] [            validator           ] [     slot      ]
//! ```
//!
//! The slot index addresses a row of the global object table, the validator
//! is the generation stamped into that row when the id was issued, and the
//! top bit records whether the object belongs to the reference-counted
//! category.

use std::fmt;

/// Width of the slot index field.
pub const SLOT_BITS: u32 = 24;

/// Width of the validator (generation) field.
///
/// Slot and validator bits add up to 63, the last bit is the
/// reference-counted flag.
pub const VALIDATOR_BITS: u32 = 39;

/// Mask for the slot index once shifted down.
pub const SLOT_MASK: u64 = (1 << SLOT_BITS) - 1;

/// Mask for the validator once shifted down.
pub const VALIDATOR_MASK: u64 = (1 << VALIDATOR_BITS) - 1;

/// Bit marking ids of reference-counted objects.
pub const REF_COUNTED_BIT: u64 = 1 << (SLOT_BITS + VALIDATOR_BITS);

/// Hard ceiling on the number of slots the table may ever hold.
pub const MAX_SLOTS: u32 = 1 << SLOT_BITS;

/// Opaque, copyable identifier of a registered object.
///
/// Holding an `ObjectId` never keeps the object alive and is always safe:
/// once the object is gone the id simply stops resolving, even after its
/// slot has been reused by another object.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId(u64);

impl ObjectId {
    /// The id that never names an object.
    pub const NULL: ObjectId = ObjectId(0);

    pub(crate) fn pack(slot: u32, validator: u64, ref_counted: bool) -> Self {
        debug_assert!(u64::from(slot) <= SLOT_MASK);
        debug_assert!(validator != 0 && validator <= VALIDATOR_MASK);
        let mut raw = (validator << SLOT_BITS) | u64::from(slot);
        if ref_counted {
            raw |= REF_COUNTED_BIT;
        }
        ObjectId(raw)
    }

    /// Rebuild an id from its serialized form.
    pub const fn from_u64(raw: u64) -> Self {
        ObjectId(raw)
    }

    /// Serialized form of the id.
    pub const fn to_u64(self) -> u64 {
        self.0
    }

    /// Index of the table row this id points at.
    pub fn slot(self) -> u32 {
        (self.0 & SLOT_MASK) as u32
    }

    /// Generation stamped into the slot when this id was issued.
    pub fn validator(self) -> u64 {
        (self.0 >> SLOT_BITS) & VALIDATOR_MASK
    }

    /// Whether the object belongs to the reference-counted category.
    pub fn is_ref_counted(self) -> bool {
        self.0 & REF_COUNTED_BIT != 0
    }

    /// Whether this is [`ObjectId::NULL`].
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Whether this id could name an object (it may still be stale).
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl From<ObjectId> for u64 {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl From<u64> for ObjectId {
    fn from(raw: u64) -> Self {
        ObjectId(raw)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("ObjectId(null)");
        }
        write!(
            f,
            "ObjectId({}: slot {} gen {}{})",
            self.0,
            self.slot(),
            self.validator(),
            if self.is_ref_counted() { " rc" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_round_trip_through_packing() {
        let id = ObjectId::pack(0x00AB_CDEF, VALIDATOR_MASK, true);

        assert_eq!(id.slot(), 0x00AB_CDEF);
        assert_eq!(id.validator(), VALIDATOR_MASK);
        assert!(id.is_ref_counted());
        assert_eq!(ObjectId::from_u64(id.to_u64()), id);
    }

    #[test]
    fn layout_uses_all_64_bits() {
        assert_eq!(SLOT_BITS + VALIDATOR_BITS + 1, 64);
        assert_eq!(REF_COUNTED_BIT, 1 << 63);
    }

    #[test]
    fn null_id() {
        assert!(ObjectId::NULL.is_null());
        assert_eq!(ObjectId::default(), ObjectId::NULL);
        assert_eq!(ObjectId::NULL.validator(), 0);
    }
}

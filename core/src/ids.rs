//! Generational identifiers shared by every slot-mapped container.
//!
//! A [`SlotId`] packs three fields into a single `u64`:
//!
//! | bits    | field     |
//! |---------|-----------|
//! | 63      | free flag |
//! | 31..=62 | version   |
//! | 0..=30  | slot index|
//!
//! The raw value `0` is reserved as the null identifier. Containers start
//! every slot at version 1 so a live identifier is never null.

use serde::{Deserialize, Serialize};

const INDEX_BITS: u32 = 31;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;
const VERSION_MASK: u64 = 0xffff_ffff;
const FREE_FLAG: u64 = 1 << 63;

/// Largest slot index representable by a [`SlotId`].
pub const MAX_SLOT_INDEX: u32 = (1 << INDEX_BITS) - 1;

/// Opaque 64-bit generational identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(u64);

impl SlotId {
    /// Reserved identifier that never refers to a stored value.
    pub const NULL: Self = Self(0);

    /// Packs a version and slot index into an identifier with the free flag cleared.
    ///
    /// Indices wider than 31 bits are truncated; callers guard against that with
    /// [`MAX_SLOT_INDEX`].
    #[must_use]
    pub const fn new(version: u32, index: u32) -> Self {
        Self(((version as u64) << INDEX_BITS) | (index as u64 & INDEX_MASK))
    }

    /// Reinterprets a raw persisted value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value, preserving the free/version/index layout.
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Slot index addressed by the identifier.
    #[must_use]
    pub const fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    /// Version counter captured when the identifier was issued.
    #[must_use]
    pub const fn version(self) -> u32 {
        ((self.0 >> INDEX_BITS) & VERSION_MASK) as u32
    }

    /// Reports whether the free flag is set.
    #[must_use]
    pub const fn is_free(self) -> bool {
        self.0 & FREE_FLAG != 0
    }

    /// Reports whether this is the reserved null identifier.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns a copy with the free flag set or cleared.
    #[must_use]
    pub const fn with_free_flag(self, free: bool) -> Self {
        if free {
            Self(self.0 | FREE_FLAG)
        } else {
            Self(self.0 & !FREE_FLAG)
        }
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::NULL
    }
}

macro_rules! slot_id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(SlotId);

        impl $name {
            /// Wraps a raw slot identifier.
            #[must_use]
            pub const fn from_slot(slot: SlotId) -> Self {
                Self(slot)
            }

            /// Underlying slot identifier.
            #[must_use]
            pub const fn slot(self) -> SlotId {
                self.0
            }
        }

        impl From<SlotId> for $name {
            fn from(slot: SlotId) -> Self {
                Self(slot)
            }
        }

        impl From<$name> for SlotId {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

slot_id_type!(
    /// Identifier of a city.
    CityId
);
slot_id_type!(
    /// Identifier of a city block.
    BlockId
);
slot_id_type!(
    /// Identifier of a building.
    BuildingId
);
slot_id_type!(
    /// Identifier of an area, unique within its owning building.
    AreaId
);
slot_id_type!(
    /// Identifier of a door object.
    DoorId
);
slot_id_type!(
    /// Identifier of a generated roof.
    RoofId
);

/// Globally unique reference to an area: the owning building plus the area slot.
///
/// Tiles store these as value-type owner records instead of pointers into the
/// building hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AreaKey {
    /// Building that owns the area.
    pub building: BuildingId,
    /// Area slot inside the building.
    pub area: AreaId,
}

impl AreaKey {
    /// Creates a new area key.
    #[must_use]
    pub const fn new(building: BuildingId, area: AreaId) -> Self {
        Self { building, area }
    }
}

/// Identifier of an expansion template declared in the settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(u32);

impl TemplateId {
    /// Creates a new template identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_id_packs_version_and_index() {
        let id = SlotId::new(7, 12);
        assert_eq!(id.version(), 7);
        assert_eq!(id.index(), 12);
        assert!(!id.is_free());
        assert!(!id.is_null());
        assert_eq!(id.to_raw(), (7 << 31) | 12);
    }

    #[test]
    fn free_flag_occupies_the_top_bit() {
        let id = SlotId::new(u32::MAX, MAX_SLOT_INDEX).with_free_flag(true);
        assert!(id.is_free());
        assert_eq!(id.version(), u32::MAX);
        assert_eq!(id.index(), MAX_SLOT_INDEX);
        assert_eq!(id.to_raw() >> 63, 1);
        assert!(!id.with_free_flag(false).is_free());
    }

    #[test]
    fn first_version_of_slot_zero_is_not_null() {
        assert!(SlotId::NULL.is_null());
        assert!(!SlotId::new(1, 0).is_null());
    }

    #[test]
    fn typed_ids_round_trip_through_bincode() {
        let building = BuildingId::from_slot(SlotId::new(3, 9));
        let bytes = bincode::serialize(&building).expect("serialize");
        assert_eq!(bytes.len(), 8, "typed ids persist as their raw u64");
        let restored: BuildingId = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, building);
    }
}

//! Generational arena handing out stable, validity-checked identifiers.
//!
//! Values live packed in a dense vector while a sparse table maps every slot
//! index to its dense position. Each slot remembers the identifier it last
//! issued; destroying a value bumps the slot's version so previously issued
//! identifiers are detected as stale instead of aliasing the next occupant.

use std::marker::PhantomData;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use township_core::{SlotId, MAX_SLOT_INDEX};

const FORMAT_VERSION: u32 = 1;
const DEFAULT_CAPACITY: usize = 16;
const SLOT_LIMIT: usize = MAX_SLOT_INDEX as usize + 1;

/// Failures reported by [`SlotMap`] operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SlotMapError {
    /// The identifier's version no longer matches its slot, or it was never issued.
    #[error("identifier {0:?} has expired")]
    ExpiredId(SlotId),
    /// No slot is free and the map may not grow any further.
    #[error("slot map is full at {capacity} slots")]
    CapacityExhausted {
        /// Capacity reached when the allocation failed.
        capacity: usize,
    },
}

/// Generational arena keyed by a typed identifier.
#[derive(Clone, Debug)]
pub struct SlotMap<K, V> {
    ids: Vec<SlotId>,
    dense_index: Vec<u32>,
    owners: Vec<u32>,
    values: Vec<V>,
    free: Vec<u32>,
    capacity: usize,
    resizable: bool,
    key: PhantomData<fn() -> K>,
}

impl<K, V> SlotMap<K, V>
where
    K: Copy + From<SlotId> + Into<SlotId>,
{
    /// Creates an empty resizable map.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, true)
    }

    /// Creates an empty map holding up to `capacity` values before it has to grow.
    #[must_use]
    pub fn with_capacity(capacity: usize, resizable: bool) -> Self {
        let capacity = capacity.min(SLOT_LIMIT);
        Self {
            ids: Vec::with_capacity(capacity),
            dense_index: Vec::with_capacity(capacity),
            owners: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            free: Vec::new(),
            capacity,
            resizable,
            key: PhantomData,
        }
    }

    /// Stores a value, reusing the most recently freed slot when one exists.
    pub fn create(&mut self, value: V) -> Result<K, SlotMapError> {
        let dense = u32::try_from(self.values.len()).map_err(|_| self.exhausted())?;
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.ids.len() >= self.capacity {
                    self.grow()?;
                }
                let index = u32::try_from(self.ids.len()).map_err(|_| self.exhausted())?;
                self.ids.push(SlotId::new(1, index).with_free_flag(true));
                self.dense_index.push(0);
                index
            }
        };

        let slot = index as usize;
        let id = self.ids[slot].with_free_flag(false);
        self.ids[slot] = id;
        self.dense_index[slot] = dense;
        self.owners.push(index);
        self.values.push(value);
        Ok(K::from(id))
    }

    /// Returns the value stored under `id`, failing when the identifier expired.
    pub fn get(&self, id: K) -> Result<&V, SlotMapError> {
        let slot = id.into();
        self.dense_of(slot)
            .map(|dense| &self.values[dense])
            .ok_or(SlotMapError::ExpiredId(slot))
    }

    /// Mutable counterpart of [`SlotMap::get`].
    pub fn get_mut(&mut self, id: K) -> Result<&mut V, SlotMapError> {
        let slot = id.into();
        match self.dense_of(slot) {
            Some(dense) => Ok(&mut self.values[dense]),
            None => Err(SlotMapError::ExpiredId(slot)),
        }
    }

    /// Speculative lookup that reports stale identifiers as absent.
    #[must_use]
    pub fn weak_get(&self, id: K) -> Option<&V> {
        self.dense_of(id.into()).map(|dense| &self.values[dense])
    }

    /// Mutable counterpart of [`SlotMap::weak_get`].
    pub fn weak_get_mut(&mut self, id: K) -> Option<&mut V> {
        self.dense_of(id.into()).map(|dense| &mut self.values[dense])
    }

    /// Reports whether `id` refers to a live value.
    #[must_use]
    pub fn contains(&self, id: K) -> bool {
        self.dense_of(id.into()).is_some()
    }

    /// Removes the value stored under `id`, returning `None` for stale identifiers.
    pub fn destroy(&mut self, id: K) -> Option<V> {
        let slot_id = id.into();
        let dense = self.dense_of(slot_id)?;
        let slot = slot_id.index() as usize;

        let value = self.values.swap_remove(dense);
        let _ = self.owners.swap_remove(dense);
        if let Some(&moved) = self.owners.get(dense) {
            self.dense_index[moved as usize] = dense as u32;
        }

        match slot_id.version().checked_add(1) {
            Some(version) => {
                self.ids[slot] = SlotId::new(version, slot_id.index()).with_free_flag(true);
                self.free.push(slot_id.index());
            }
            None => {
                log::warn!("retiring slot {slot} after exhausting its versions");
                self.ids[slot] = slot_id.with_free_flag(true);
            }
        }
        Some(value)
    }

    /// Live entries in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> + '_ {
        let ids = &self.ids;
        self.owners
            .iter()
            .zip(self.values.iter())
            .map(move |(slot, value)| (K::from(ids[*slot as usize]), value))
    }

    /// Mutable iteration over live entries in storage order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> + '_ {
        let ids = &self.ids;
        self.owners
            .iter()
            .zip(self.values.iter_mut())
            .map(move |(slot, value)| (K::from(ids[*slot as usize]), value))
    }

    /// Identifiers of the live entries in storage order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.owners
            .iter()
            .map(move |slot| K::from(self.ids[*slot as usize]))
    }

    /// Live values in storage order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.values.iter()
    }

    /// Number of live values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Reports whether the map holds no live value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of slots available before the map has to grow.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reports whether the map doubles its capacity when full.
    #[must_use]
    pub fn is_resizable(&self) -> bool {
        self.resizable
    }

    fn dense_of(&self, id: SlotId) -> Option<usize> {
        if id.is_null() || id.is_free() {
            return None;
        }
        let slot = usize::try_from(id.index()).ok()?;
        if *self.ids.get(slot)? != id {
            return None;
        }
        usize::try_from(*self.dense_index.get(slot)?).ok()
    }

    fn grow(&mut self) -> Result<(), SlotMapError> {
        if !self.resizable || self.capacity >= SLOT_LIMIT {
            return Err(self.exhausted());
        }
        self.capacity = self.capacity.saturating_mul(2).clamp(1, SLOT_LIMIT);
        Ok(())
    }

    fn exhausted(&self) -> SlotMapError {
        SlotMapError::CapacityExhausted {
            capacity: self.capacity,
        }
    }

    fn from_repr(repr: SlotMapRepr<V>) -> Result<Self, &'static str> {
        if repr.version != FORMAT_VERSION {
            return Err("unsupported slot map format version");
        }
        let capacity = usize::try_from(repr.capacity).map_err(|_| "capacity out of range")?;
        if capacity > SLOT_LIMIT || repr.ids.len() > capacity {
            return Err("slot count exceeds capacity");
        }
        if repr.owners.len() != repr.values.len() {
            return Err("owner table does not match the stored values");
        }

        let mut dense_index = vec![0u32; repr.ids.len()];
        let mut live = vec![false; repr.ids.len()];
        for (dense, owner) in repr.owners.iter().enumerate() {
            let slot = *owner as usize;
            let id = repr.ids.get(slot).ok_or("owner refers to a missing slot")?;
            if id.is_free() || id.index() != *owner || live[slot] {
                return Err("owner refers to a vacant or duplicated slot");
            }
            live[slot] = true;
            dense_index[slot] = dense as u32;
        }
        for free in &repr.free {
            let slot = *free as usize;
            let id = repr.ids.get(slot).ok_or("free list refers to a missing slot")?;
            if !id.is_free() || live[slot] {
                return Err("free list refers to a live slot");
            }
        }

        Ok(Self {
            ids: repr.ids,
            dense_index,
            owners: repr.owners,
            values: repr.values,
            free: repr.free,
            capacity,
            resizable: repr.resizable,
            key: PhantomData,
        })
    }
}

impl<K, V> Default for SlotMap<K, V>
where
    K: Copy + From<SlotId> + Into<SlotId>,
{
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct SlotMapRef<'a, V> {
    version: u32,
    resizable: bool,
    capacity: u64,
    ids: &'a [SlotId],
    owners: &'a [u32],
    values: &'a [V],
    free: &'a [u32],
}

#[derive(Deserialize)]
struct SlotMapRepr<V> {
    version: u32,
    resizable: bool,
    capacity: u64,
    ids: Vec<SlotId>,
    owners: Vec<u32>,
    values: Vec<V>,
    free: Vec<u32>,
}

impl<K, V> Serialize for SlotMap<K, V>
where
    V: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        SlotMapRef {
            version: FORMAT_VERSION,
            resizable: self.resizable,
            capacity: self.capacity as u64,
            ids: &self.ids,
            owners: &self.owners,
            values: &self.values,
            free: &self.free,
        }
        .serialize(serializer)
    }
}

impl<'de, K, V> Deserialize<'de> for SlotMap<K, V>
where
    K: Copy + From<SlotId> + Into<SlotId>,
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = SlotMapRepr::<V>::deserialize(deserializer)?;
        Self::from_repr(repr).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use township_core::BuildingId;

    use super::*;

    #[test]
    fn destroyed_ids_expire_and_slots_are_reused_with_newer_versions() {
        let mut map: SlotMap<BuildingId, &str> = SlotMap::new();
        let first = map.create("barn").expect("create");
        assert_eq!(map.get(first), Ok(&"barn"));

        assert_eq!(map.destroy(first), Some("barn"));
        assert_eq!(
            map.get(first),
            Err(SlotMapError::ExpiredId(first.slot())),
            "stale ids must fail"
        );
        assert!(map.weak_get(first).is_none());
        assert_eq!(map.destroy(first), None, "double destroy is a no-op");

        let second = map.create("cowshed").expect("create");
        assert_eq!(second.slot().index(), first.slot().index());
        assert!(second.slot().version() > first.slot().version());
        assert!(map.weak_get(first).is_none());
        assert_eq!(map.weak_get(second), Some(&"cowshed"));
    }

    #[test]
    fn null_id_never_resolves() {
        let mut map: SlotMap<BuildingId, u32> = SlotMap::new();
        let _ = map.create(7).expect("create");
        assert!(map.weak_get(BuildingId::from_slot(SlotId::NULL)).is_none());
    }

    #[test]
    fn fixed_capacity_map_reports_exhaustion() {
        let mut map: SlotMap<BuildingId, u8> = SlotMap::with_capacity(2, false);
        let _ = map.create(1).expect("first");
        let second = map.create(2).expect("second");
        assert_eq!(
            map.create(3),
            Err(SlotMapError::CapacityExhausted { capacity: 2 })
        );
        let _ = map.destroy(second);
        assert!(map.create(3).is_ok(), "freed slots are reusable");
    }

    #[test]
    fn resizable_map_doubles_capacity() {
        let mut map: SlotMap<BuildingId, u8> = SlotMap::with_capacity(2, true);
        for value in 0..5 {
            let _ = map.create(value).expect("create");
        }
        assert_eq!(map.capacity(), 8);
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn random_churn_matches_a_shadow_map() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x51_07_3a);
        let mut map: SlotMap<BuildingId, u64> = SlotMap::with_capacity(4, true);
        let mut shadow: HashMap<BuildingId, u64> = HashMap::new();
        let mut retired: Vec<BuildingId> = Vec::new();

        for step in 0..2_000u64 {
            if shadow.is_empty() || rng.gen_bool(0.6) {
                let id = map.create(step).expect("create");
                assert!(shadow.insert(id, step).is_none(), "ids are never reissued");
            } else {
                let keys: Vec<BuildingId> = shadow.keys().copied().collect();
                let victim = keys[rng.gen_range(0..keys.len())];
                assert_eq!(map.destroy(victim), shadow.remove(&victim));
                retired.push(victim);
            }
        }

        assert_eq!(map.len(), shadow.len());
        for (id, value) in &shadow {
            assert_eq!(map.get(*id), Ok(value));
        }
        for id in &retired {
            assert!(map.weak_get(*id).is_none(), "retired ids stay expired");
        }
        let mut iterated: Vec<(BuildingId, u64)> =
            map.iter().map(|(id, value)| (id, *value)).collect();
        iterated.sort();
        let mut expected: Vec<(BuildingId, u64)> = shadow.into_iter().collect();
        expected.sort();
        assert_eq!(iterated, expected);
    }

    #[test]
    fn bincode_round_trip_preserves_ids_and_free_slots() {
        let mut map: SlotMap<BuildingId, String> = SlotMap::new();
        let kept = map.create("farmhouse".to_owned()).expect("create");
        let dropped = map.create("field".to_owned()).expect("create");
        let _ = map.destroy(dropped);

        let bytes = bincode::serialize(&map).expect("serialize");
        let mut restored: SlotMap<BuildingId, String> =
            bincode::deserialize(&bytes).expect("deserialize");

        assert_eq!(restored.get(kept).map(String::as_str), Ok("farmhouse"));
        assert!(restored.weak_get(dropped).is_none());
        let reused = restored.create("barn".to_owned()).expect("create");
        assert_eq!(reused.slot().index(), dropped.slot().index());
        assert!(reused.slot().version() > dropped.slot().version());
    }
}

//! Cities, blocks, buildings and the areas they are made of.

use serde::{Deserialize, Serialize};
use township_core::{AreaId, AreaType, BlockId, BuildingId, CityId, RoofId, TemplateId, TilePos, Volume};

use crate::{slot_map::SlotMap, WorldError};

/// Minimum number of tiles two footprints must share to count as neighbors.
pub const MIN_SHARED_RUN: i32 = 3;

/// Rectangular functional room or plot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    area_type: AreaType,
    volume: Volume,
}

impl Area {
    /// Creates a new area description.
    #[must_use]
    pub const fn new(area_type: AreaType, volume: Volume) -> Self {
        Self { area_type, volume }
    }

    /// Functional type of the area.
    #[must_use]
    pub const fn area_type(&self) -> AreaType {
        self.area_type
    }

    /// Volume covered by the area, border included.
    #[must_use]
    pub const fn volume(&self) -> Volume {
        self.volume
    }
}

/// Connected collection of areas grown from one expansion template.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Building {
    template: TemplateId,
    city: CityId,
    block: BlockId,
    areas: SlotMap<AreaId, Area>,
    external_doors: Vec<TilePos>,
    blind_doors: Vec<TilePos>,
    roof: Option<RoofId>,
}

impl Building {
    pub(crate) fn new(template: TemplateId, city: CityId, block: BlockId) -> Self {
        Self {
            template,
            city,
            block,
            areas: SlotMap::new(),
            external_doors: Vec::new(),
            blind_doors: Vec::new(),
            roof: None,
        }
    }

    /// Template driving the building's growth.
    #[must_use]
    pub const fn template(&self) -> TemplateId {
        self.template
    }

    /// City owning the building.
    #[must_use]
    pub const fn city(&self) -> CityId {
        self.city
    }

    /// Block owning the building.
    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.block
    }

    /// Areas of the building.
    #[must_use]
    pub fn areas(&self) -> &SlotMap<AreaId, Area> {
        &self.areas
    }

    /// Doors opening from the building onto the open map.
    #[must_use]
    pub fn external_doors(&self) -> &[TilePos] {
        &self.external_doors
    }

    /// External-looking doors that only open onto an enclosed courtyard.
    #[must_use]
    pub fn blind_doors(&self) -> &[TilePos] {
        &self.blind_doors
    }

    /// Roof currently covering the building.
    #[must_use]
    pub const fn roof(&self) -> Option<RoofId> {
        self.roof
    }

    /// Reports whether any area of the building carries a roof.
    #[must_use]
    pub fn has_roofed_area(&self) -> bool {
        self.areas.values().any(|area| area.area_type.is_roofed())
    }

    /// Total surface of the building's areas.
    #[must_use]
    pub fn surface(&self) -> i64 {
        self.areas.values().map(|area| area.volume.surface()).sum()
    }

    pub(crate) fn add_area(&mut self, area: Area) -> Result<AreaId, WorldError> {
        if area.volume.dims.x < 0 || area.volume.dims.y < 0 {
            return Err(WorldError::InvalidVolume(area.volume));
        }
        if self
            .areas
            .values()
            .any(|existing| existing.volume.inner_intersects(&area.volume))
        {
            return Err(WorldError::OverlappingArea(area.volume));
        }
        Ok(self.areas.create(area)?)
    }

    pub(crate) fn remove_area(&mut self, id: AreaId) -> Option<Area> {
        self.areas.destroy(id)
    }

    pub(crate) fn set_doors(&mut self, external: Vec<TilePos>, blind: Vec<TilePos>) {
        self.external_doors = external;
        self.blind_doors = blind;
    }

    pub(crate) fn set_roof(&mut self, roof: Option<RoofId>) {
        self.roof = roof;
    }
}

/// Capacity-bounded cluster of buildings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CityBlock {
    city: CityId,
    buildings: Vec<BuildingId>,
    surface: i64,
    weighted_x2: i64,
    weighted_y2: i64,
}

impl CityBlock {
    pub(crate) fn new(city: CityId) -> Self {
        Self {
            city,
            buildings: Vec::new(),
            surface: 0,
            weighted_x2: 0,
            weighted_y2: 0,
        }
    }

    /// City owning the block.
    #[must_use]
    pub const fn city(&self) -> CityId {
        self.city
    }

    /// Buildings inside the block.
    #[must_use]
    pub fn buildings(&self) -> &[BuildingId] {
        &self.buildings
    }

    /// Surface covered by the block's areas.
    #[must_use]
    pub const fn surface(&self) -> i64 {
        self.surface
    }

    /// Surface-weighted centroid of the block's areas.
    #[must_use]
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.surface <= 0 {
            return None;
        }
        let divisor = 2.0 * self.surface as f64;
        Some((
            self.weighted_x2 as f64 / divisor,
            self.weighted_y2 as f64 / divisor,
        ))
    }

    pub(crate) fn add_building(&mut self, building: BuildingId) {
        self.buildings.push(building);
    }

    pub(crate) fn remove_building(&mut self, building: BuildingId) {
        self.buildings.retain(|candidate| *candidate != building);
    }

    pub(crate) fn add_volume(&mut self, volume: &Volume) {
        let (x2, y2) = doubled_center(volume);
        let surface = volume.surface();
        self.surface += surface;
        self.weighted_x2 += x2 * surface;
        self.weighted_y2 += y2 * surface;
    }

    pub(crate) fn remove_volume(&mut self, volume: &Volume) {
        let (x2, y2) = doubled_center(volume);
        let surface = volume.surface();
        self.surface -= surface;
        self.weighted_x2 -= x2 * surface;
        self.weighted_y2 -= y2 * surface;
    }
}

/// Cluster of blocks.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct City {
    blocks: Vec<BlockId>,
}

impl City {
    /// Blocks inside the city.
    #[must_use]
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// Average of the centroids of the city's non-empty blocks.
    #[must_use]
    pub fn centroid(&self, blocks: &SlotMap<BlockId, CityBlock>) -> Option<(f64, f64)> {
        let centroids: Vec<(f64, f64)> = self
            .blocks
            .iter()
            .filter_map(|id| blocks.weak_get(*id))
            .filter_map(CityBlock::centroid)
            .collect();
        if centroids.is_empty() {
            return None;
        }
        let count = centroids.len() as f64;
        let (sum_x, sum_y) = centroids
            .iter()
            .fold((0.0, 0.0), |(x, y), (cx, cy)| (x + cx, y + cy));
        Some((sum_x / count, sum_y / count))
    }

    pub(crate) fn add_block(&mut self, block: BlockId) {
        self.blocks.push(block);
    }

    pub(crate) fn remove_block(&mut self, block: BlockId) {
        self.blocks.retain(|candidate| *candidate != block);
    }
}

fn doubled_center(volume: &Volume) -> (i64, i64) {
    (
        2 * i64::from(volume.origin.x) + i64::from(volume.dims.x),
        2 * i64::from(volume.origin.y) + i64::from(volume.dims.y),
    )
}

/// Reports whether two footprints are neighbors in an area-adjacency graph.
#[must_use]
pub fn are_neighbors(first: &Volume, second: &Volume) -> bool {
    first.shared_run_tiles(second) >= MIN_SHARED_RUN
}

/// Indices of the volumes reachable from `start` through shared border runs.
///
/// Uses an explicit stack so pathological shapes cannot exhaust the call stack.
#[must_use]
pub fn explore_neighbors(volumes: &[Volume], start: usize) -> Vec<usize> {
    let mut visited = vec![false; volumes.len()];
    let mut stack = Vec::new();
    if start < volumes.len() {
        visited[start] = true;
        stack.push(start);
    }
    while let Some(current) = stack.pop() {
        for (index, candidate) in volumes.iter().enumerate() {
            if !visited[index] && are_neighbors(&volumes[current], candidate) {
                visited[index] = true;
                stack.push(index);
            }
        }
    }
    visited
        .iter()
        .enumerate()
        .filter_map(|(index, seen)| seen.then_some(index))
        .collect()
}

/// Reports whether every volume is reachable from every other one.
#[must_use]
pub fn is_connected(volumes: &[Volume]) -> bool {
    volumes.len() <= 1 || explore_neighbors(volumes, 0).len() == volumes.len()
}

#[cfg(test)]
mod tests {
    use township_core::{Dims, TilePos};

    use super::*;

    fn volume(x: i32, y: i32, lx: i32, ly: i32) -> Volume {
        Volume::new(TilePos::new(x, y, 0), Dims::new(lx, ly))
    }

    #[test]
    fn block_centroid_is_weighted_by_surface() {
        let mut block = CityBlock::new(CityId::from_slot(township_core::SlotId::new(1, 0)));
        assert!(block.centroid().is_none());
        block.add_volume(&volume(0, 0, 10, 10));
        block.add_volume(&volume(10, 0, 10, 10));
        assert_eq!(block.centroid(), Some((10.0, 5.0)));

        block.remove_volume(&volume(10, 0, 10, 10));
        assert_eq!(block.centroid(), Some((5.0, 5.0)));
        assert_eq!(block.surface(), 100);
    }

    #[test]
    fn buildings_refuse_overlapping_areas() {
        let mut building = Building::new(
            TemplateId::new(0),
            CityId::from_slot(township_core::SlotId::new(1, 0)),
            BlockId::from_slot(township_core::SlotId::new(1, 0)),
        );
        let _ = building
            .add_area(Area::new(AreaType::Field, volume(0, 0, 10, 10)))
            .expect("first area");
        let _ = building
            .add_area(Area::new(AreaType::Field, volume(10, 0, 10, 10)))
            .expect("sharing a border is fine");
        assert!(matches!(
            building.add_area(Area::new(AreaType::Barn, volume(5, 5, 6, 4))),
            Err(WorldError::OverlappingArea(_))
        ));
    }

    #[test]
    fn exploration_follows_runs_of_three_tiles() {
        let volumes = [
            volume(0, 0, 10, 10),
            volume(10, 0, 10, 10),
            volume(20, 8, 5, 5),
            volume(40, 40, 4, 4),
        ];
        let reachable = explore_neighbors(&volumes, 0);
        assert_eq!(reachable, vec![0, 1, 2]);
        assert_eq!(explore_neighbors(&volumes, 0), reachable, "exploration is idempotent");
        assert!(!is_connected(&volumes));
        assert!(is_connected(&volumes[..3]));
    }

    #[test]
    fn corner_contact_is_not_adjacency() {
        let first = volume(0, 0, 4, 4);
        let touching_corner = volume(4, 4, 4, 4);
        let short_run = volume(4, 3, 4, 4);
        assert!(!are_neighbors(&first, &touching_corner));
        assert!(!are_neighbors(&first, &short_run), "two shared tiles are not enough");
        assert!(are_neighbors(&first, &volume(4, 2, 4, 4)));
    }
}

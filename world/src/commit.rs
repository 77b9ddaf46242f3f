use std::collections::BTreeSet;

use log::debug;
use township_core::{
    AreaKey, AreaType, BlockId, BuildingId, CityId, Dims, Event, PlacementTarget,
    RemovalRejection, TemplateId, TilePos, Volume,
};

use crate::{
    hierarchy::{self, Area, Building, City, CityBlock},
    placement::{self, PlacementVerdict},
    World, WorldError,
};

impl World {
    /// Validates and, when buildable, commits a single area.
    pub(crate) fn place_area(
        &mut self,
        target: PlacementTarget,
        area_type: AreaType,
        volume: Volume,
        replaceable: &[AreaKey],
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        if volume.dims.x < 0 || volume.dims.y < 0 {
            return Err(WorldError::InvalidVolume(volume));
        }
        let replaceable: BTreeSet<AreaKey> = replaceable.iter().copied().collect();
        let verdict = placement::is_area_buildable(self, target, &volume, &replaceable)?;
        if let Some(reason) = verdict.rejection {
            out_events.push(Event::PlacementRejected { volume, reason });
            return Ok(());
        }
        let _ = self.commit_area(target, area_type, volume, &verdict, out_events)?;
        Ok(())
    }

    /// Writes a validated area into the hierarchy and the grid.
    ///
    /// Missing containers are created first, replaced areas are unbuilt, then
    /// the new area is painted and every door and roof touching the changed
    /// region is brought up to date.
    pub(crate) fn commit_area(
        &mut self,
        target: PlacementTarget,
        area_type: AreaType,
        volume: Volume,
        verdict: &PlacementVerdict,
        out_events: &mut Vec<Event>,
    ) -> Result<AreaKey, WorldError> {
        let building = self.resolve_building(target, out_events)?;

        let mut changed = vec![volume];
        for key in &verdict.replaced {
            if let Some(freed) = self.unbuild_area(*key, out_events)? {
                changed.push(freed);
            }
        }

        let record = self.buildings.get_mut(building)?;
        let block = record.block();
        let area = AreaKey::new(building, record.add_area(Area::new(area_type, volume))?);
        if let Some(inner) = volume.inner() {
            for position in inner.tiles() {
                self.grid.paint_inner(position, area)?;
            }
        }
        for position in volume.ring() {
            self.grid.paint_border(position, area)?;
        }
        self.blocks.get_mut(block)?.add_volume(&volume);
        self.expansions.forget_unexpandable();
        out_events.push(Event::AreaBuilt {
            area,
            area_type,
            volume,
        });
        out_events.push(Event::RegionChanged { region: volume });
        self.record_highlight(0, volume);

        self.refresh_region(&changed, &[building], out_events)?;
        self.invalidate_roof(building, out_events)?;

        if !self.building_connected(building) {
            return Err(WorldError::Disconnected(building));
        }
        debug!(
            "committed {area_type:?} at {:?} for {building:?}, replacing {} areas",
            volume.origin,
            verdict.replaced.len()
        );
        Ok(area)
    }

    /// Removes one area unless that would split its building.
    ///
    /// Removing the last area of a building removes the building, and emptied
    /// blocks and cities go with it.
    pub(crate) fn remove_area(
        &mut self,
        area: AreaKey,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        let Some(record) = self.buildings.weak_get(area.building) else {
            out_events.push(Event::AreaRemovalRejected {
                area,
                reason: RemovalRejection::UnknownArea,
            });
            return Ok(());
        };
        if record.areas().weak_get(area.area).is_none() {
            out_events.push(Event::AreaRemovalRejected {
                area,
                reason: RemovalRejection::UnknownArea,
            });
            return Ok(());
        }
        let remaining: Vec<Volume> = record
            .areas()
            .iter()
            .filter(|(id, _)| *id != area.area)
            .map(|(_, kept)| kept.volume())
            .collect();
        if !hierarchy::is_connected(&remaining) {
            out_events.push(Event::AreaRemovalRejected {
                area,
                reason: RemovalRejection::Disconnected,
            });
            return Ok(());
        }

        let Some(volume) = self.unbuild_area(area, out_events)? else {
            return Ok(());
        };
        self.refresh_region(&[volume], &[area.building], out_events)?;
        if remaining.is_empty() {
            self.remove_empty_containers(area.building, out_events)
        } else {
            self.invalidate_roof(area.building, out_events)
        }
    }

    /// Removes every area of a building, then the building itself.
    pub(crate) fn remove_building(
        &mut self,
        building: BuildingId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        let Some(record) = self.buildings.weak_get(building) else {
            debug!("ignoring removal of stale building {building:?}");
            return Ok(());
        };
        let keys: Vec<AreaKey> = record
            .areas()
            .keys()
            .map(|area| AreaKey::new(building, area))
            .collect();
        let mut changed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(volume) = self.unbuild_area(key, out_events)? {
                changed.push(volume);
            }
        }
        self.refresh_region(&changed, &[], out_events)?;
        self.remove_empty_containers(building, out_events)
    }

    fn resolve_building(
        &mut self,
        target: PlacementTarget,
        out_events: &mut Vec<Event>,
    ) -> Result<BuildingId, WorldError> {
        match target {
            PlacementTarget::ExistingBuilding(building) => {
                let _ = self.buildings.get(building)?;
                Ok(building)
            }
            PlacementTarget::NewBuilding { block, template } => {
                let city = self.blocks.get(block)?.city();
                self.found_building_record(template, city, block, out_events)
            }
            PlacementTarget::NewBlock { city, template } => {
                let _ = self.cities.get(city)?;
                let block = self.blocks.create(CityBlock::new(city))?;
                self.cities.get_mut(city)?.add_block(block);
                out_events.push(Event::BlockFounded { block, city });
                self.found_building_record(template, city, block, out_events)
            }
            PlacementTarget::NewCity { template } => {
                let city = self.cities.create(City::default())?;
                out_events.push(Event::CityFounded { city });
                let block = self.blocks.create(CityBlock::new(city))?;
                self.cities.get_mut(city)?.add_block(block);
                out_events.push(Event::BlockFounded { block, city });
                self.found_building_record(template, city, block, out_events)
            }
        }
    }

    fn found_building_record(
        &mut self,
        template: TemplateId,
        city: CityId,
        block: BlockId,
        out_events: &mut Vec<Event>,
    ) -> Result<BuildingId, WorldError> {
        let building = self.buildings.create(Building::new(template, city, block))?;
        self.blocks.get_mut(block)?.add_building(building);
        out_events.push(Event::BuildingFounded {
            building,
            block,
            template,
        });
        Ok(building)
    }

    /// Clears an area from the hierarchy and the grid without touching its containers.
    fn unbuild_area(
        &mut self,
        area: AreaKey,
        out_events: &mut Vec<Event>,
    ) -> Result<Option<Volume>, WorldError> {
        let Some(record) = self.buildings.weak_get_mut(area.building) else {
            return Ok(None);
        };
        let Some(removed) = record.remove_area(area.area) else {
            return Ok(None);
        };
        let block = record.block();
        let volume = removed.volume();
        for position in volume.tiles() {
            self.grid.release(position, area)?;
        }
        if let Some(block) = self.blocks.weak_get_mut(block) {
            block.remove_volume(&volume);
        }
        self.expansions.forget_unexpandable();
        out_events.push(Event::AreaRemoved { area, volume });
        out_events.push(Event::RegionChanged { region: volume });
        Ok(Some(volume))
    }

    /// Destroys the building if it has no areas left, then its block and city when emptied.
    fn remove_empty_containers(
        &mut self,
        building: BuildingId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        let Some(record) = self.buildings.weak_get(building) else {
            return Ok(());
        };
        if !record.areas().is_empty() {
            return Ok(());
        }
        self.destroy_roof(building, out_events)?;
        let Some(record) = self.buildings.destroy(building) else {
            return Ok(());
        };
        out_events.push(Event::BuildingRemoved { building });

        let block = record.block();
        let Some(block_record) = self.blocks.weak_get_mut(block) else {
            return Ok(());
        };
        block_record.remove_building(building);
        if !block_record.buildings().is_empty() {
            return Ok(());
        }
        let city = block_record.city();
        let _ = self.blocks.destroy(block);
        out_events.push(Event::BlockRemoved { block });

        let Some(city_record) = self.cities.weak_get_mut(city) else {
            return Ok(());
        };
        city_record.remove_block(block);
        if city_record.blocks().is_empty() {
            let _ = self.cities.destroy(city);
            out_events.push(Event::CityRemoved { city });
        }
        Ok(())
    }

    /// Reconciles doors around the changed volumes and refreshes door lists.
    fn refresh_region(
        &mut self,
        changed: &[Volume],
        buildings: &[BuildingId],
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        let Some(region) = bounding(changed).map(|volume| volume.expanded(1)) else {
            return Ok(());
        };
        self.reconcile_doors(&region, out_events)?;

        let mut areas: BTreeSet<AreaKey> = BTreeSet::new();
        let mut affected: BTreeSet<BuildingId> = buildings
            .iter()
            .copied()
            .filter(|building| self.buildings.contains(*building))
            .collect();
        for (id, record) in self.buildings.iter() {
            for (area, kept) in record.areas().iter() {
                if kept.volume().intersects(&region) {
                    let _ = areas.insert(AreaKey::new(id, area));
                    let _ = affected.insert(id);
                }
            }
        }

        let courtyard = self.courtyard_tiles(&affected)?;
        for area in &areas {
            self.ensure_doors(*area, &courtyard, out_events)?;
        }
        for building in &affected {
            self.refresh_building_doors(*building, &courtyard);
        }
        Ok(())
    }

    /// Edge tiles of the enclosed courtyards around the given buildings.
    fn courtyard_tiles(
        &self,
        buildings: &BTreeSet<BuildingId>,
    ) -> Result<BTreeSet<TilePos>, WorldError> {
        let ignored = BTreeSet::new();
        let candidates: Vec<TilePos> = buildings
            .iter()
            .flat_map(|building| self.building_ring_tiles(*building, &ignored))
            .collect();
        let outlines = self.trace_outlines(candidates, None, &ignored)?;
        Ok(outlines
            .iter()
            .filter(|outline| outline.is_internal())
            .flat_map(|outline| outline.tiles().iter().copied())
            .collect())
    }

    fn building_connected(&self, building: BuildingId) -> bool {
        self.buildings.weak_get(building).map_or(false, |record| {
            hierarchy::is_connected(&placement::area_volumes(record.areas().values()))
        })
    }
}

/// Smallest volume containing every given volume.
fn bounding(volumes: &[Volume]) -> Option<Volume> {
    let first = volumes.first()?;
    let (mut min_x, mut min_y) = (first.min_x(), first.min_y());
    let (mut max_x, mut max_y) = (first.max_x(), first.max_y());
    for volume in &volumes[1..] {
        min_x = min_x.min(volume.min_x());
        min_y = min_y.min(volume.min_y());
        max_x = max_x.max(volume.max_x());
        max_y = max_y.max(volume.max_y());
    }
    Some(Volume::new(
        TilePos::new(min_x, min_y, first.z()),
        Dims::new(max_x - min_x, max_y - min_y),
    ))
}

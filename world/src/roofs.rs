//! Generated roofs attached to buildings.

use log::debug;
use serde::{Deserialize, Serialize};
use township_core::{BuildingId, Event, RoofPolygon, TilePos};

use crate::{World, WorldError};

/// Roof installed over a building.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roof {
    building: BuildingId,
    tiles: Vec<TilePos>,
    polygons: Vec<RoofPolygon>,
}

impl Roof {
    /// Building the roof covers.
    #[must_use]
    pub const fn building(&self) -> BuildingId {
        self.building
    }

    /// Tiles stamped with the roof.
    #[must_use]
    pub fn tiles(&self) -> &[TilePos] {
        &self.tiles
    }

    /// Planar faces of the roof.
    #[must_use]
    pub fn polygons(&self) -> &[RoofPolygon] {
        &self.polygons
    }
}

impl World {
    /// Replaces the building's roof with freshly generated geometry.
    pub(crate) fn install_roof(
        &mut self,
        building: BuildingId,
        tiles: Vec<TilePos>,
        polygons: Vec<RoofPolygon>,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        if !self.buildings.contains(building) {
            debug!("dropping roof generated for removed building {building:?}");
            return Ok(());
        }
        self.destroy_roof(building, out_events)?;
        let tiles: Vec<TilePos> = tiles
            .into_iter()
            .filter(|tile| self.grid.contains(*tile))
            .collect();
        if tiles.is_empty() {
            return Ok(());
        }
        let roof = self.roofs.create(Roof {
            building,
            tiles,
            polygons,
        })?;
        let stamped = self.roofs.get(roof)?.tiles.clone();
        for tile in stamped {
            self.grid.set_roof(tile, Some(roof))?;
        }
        self.buildings.get_mut(building)?.set_roof(Some(roof));
        out_events.push(Event::RoofAdded { roof, building });
        Ok(())
    }

    /// Removes the building's roof and clears its stamps from the grid.
    pub(crate) fn destroy_roof(
        &mut self,
        building: BuildingId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        let Some(record) = self.buildings.weak_get_mut(building) else {
            return Ok(());
        };
        let Some(id) = record.roof() else {
            return Ok(());
        };
        record.set_roof(None);
        if let Some(roof) = self.roofs.destroy(id) {
            for tile in roof.tiles {
                if self.grid.get(tile).and_then(crate::tiles::Tile::roof) == Some(id) {
                    self.grid.set_roof(tile, None)?;
                }
            }
            out_events.push(Event::RoofRemoved { roof: id, building });
        }
        Ok(())
    }

    /// Drops a stale roof and asks for a new one when the building still needs it.
    pub(crate) fn invalidate_roof(
        &mut self,
        building: BuildingId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        if !self.settings.roofs.enabled {
            return Ok(());
        }
        self.destroy_roof(building, out_events)?;
        if self
            .buildings
            .weak_get(building)
            .map_or(false, crate::hierarchy::Building::has_roofed_area)
        {
            out_events.push(Event::RoofInvalidated { building });
        }
        Ok(())
    }
}

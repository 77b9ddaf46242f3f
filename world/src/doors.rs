//! Door slots along area borders and the door objects placed in them.
//!
//! A ring tile can host a door when it is not a corner, at most two areas
//! share it, and the tiles on either side of it along the wall are walls too.
//! The two tiles across the wall decide what the door connects.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use township_core::{
    AreaKey, BuildingId, Direction, DoorId, DoorKind, DoorOrientation, Event, TilePos, Volume,
};

use crate::{hierarchy::Area, tiles::TileDoor, World, WorldError};

/// Door object stored in the world's door slot map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Door {
    position: TilePos,
    side: Direction,
    kind: DoorKind,
    area: AreaKey,
}

impl Door {
    /// Tile hosting the door.
    #[must_use]
    pub const fn position(&self) -> TilePos {
        self.position
    }

    /// Side of the owning area's ring the door is set in.
    #[must_use]
    pub const fn side(&self) -> Direction {
        self.side
    }

    /// Spaces the door connects.
    #[must_use]
    pub const fn kind(&self) -> DoorKind {
        self.kind
    }

    /// Area the door was cut for.
    #[must_use]
    pub const fn area(&self) -> AreaKey {
        self.area
    }

    /// Wall orientation of the door.
    #[must_use]
    pub const fn orientation(&self) -> DoorOrientation {
        DoorOrientation::for_side(self.side)
    }

    /// Tile the door opens onto, away from its owning area.
    #[must_use]
    pub const fn outside(&self) -> TilePos {
        self.position.neighbor(self.side)
    }
}

/// Contiguous door-eligible tiles of one area side sharing a classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct DoorRun {
    kind: DoorKind,
    side: Direction,
    tiles: Vec<TilePos>,
}

impl World {
    /// Classifies a ring tile of `area` by the tiles across the wall.
    pub(crate) fn classify_door_slot(
        &self,
        area: AreaKey,
        volume: &Volume,
        position: TilePos,
    ) -> (DoorKind, Option<AreaKey>) {
        let Some(side) = volume.side_of(position) else {
            return (DoorKind::None, None);
        };
        let Some(tile) = self.grid.get(position) else {
            return (DoorKind::None, None);
        };
        if !tile.is_border() || tile.owner_count() > 2 || !tile.is_owned_by(area) {
            return (DoorKind::None, None);
        }
        let walls = [side.left(), side.right()]
            .iter()
            .all(|along| self.grid.get(position.neighbor(*along)).map_or(false, |t| t.is_border()));
        if !walls {
            return (DoorKind::None, None);
        }
        let inside = self.grid.get(position.neighbor(side.opposite()));
        if !inside.map_or(false, |t| t.is_inner() && t.is_owned_by(area)) {
            return (DoorKind::None, None);
        }
        match self.grid.get(position.neighbor(side)) {
            None => (DoorKind::None, None),
            Some(outside) if !outside.is_built() => (DoorKind::External, None),
            Some(outside) if outside.is_inner() => match outside.owners().next() {
                Some(owner) if owner.building == area.building => (DoorKind::Internal, Some(owner)),
                Some(owner) => (DoorKind::BuildingsLinker, Some(owner)),
                None => (DoorKind::None, None),
            },
            Some(_) => (DoorKind::None, None),
        }
    }

    /// Splits the area's ring sides into runs of equally classified tiles.
    pub(crate) fn door_runs(&self, area: AreaKey, volume: &Volume) -> Vec<DoorRun> {
        let mut runs = Vec::new();
        for side in Direction::ALL {
            let tiles: Vec<TilePos> = volume.side_tiles(side).collect();
            let inner = tiles.len().saturating_sub(1);
            let mut current: Option<(DoorKind, Option<AreaKey>, Vec<TilePos>)> = None;
            for position in tiles.iter().take(inner).skip(1).copied() {
                let (kind, neighbor) = self.classify_door_slot(area, volume, position);
                let extends = matches!(
                    &current,
                    Some((run_kind, run_neighbor, _)) if *run_kind == kind && *run_neighbor == neighbor
                );
                if extends {
                    if let Some((_, _, run_tiles)) = current.as_mut() {
                        run_tiles.push(position);
                    }
                    continue;
                }
                if let Some((kind, _, tiles)) = current.take() {
                    runs.push(DoorRun { kind, side, tiles });
                }
                current = Some((kind, neighbor, vec![position]));
            }
            if let Some((kind, _, tiles)) = current {
                runs.push(DoorRun { kind, side, tiles });
            }
        }
        runs.retain(|run| run.kind != DoorKind::None);
        runs
    }

    /// Creates the missing doors of an area.
    ///
    /// Every internal run receives one door; the area receives one external
    /// door on its longest external run unless it already has one that does
    /// not open onto a courtyard. Buildings-linker runs stay closed.
    pub(crate) fn ensure_doors(
        &mut self,
        area: AreaKey,
        courtyard: &BTreeSet<TilePos>,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        let Some(volume) = self.area_volume(area) else {
            return Ok(());
        };
        let runs = self.door_runs(area, &volume);

        for run in runs.iter().filter(|run| run.kind == DoorKind::Internal) {
            if run.tiles.iter().any(|tile| self.door_at(*tile).is_some()) {
                continue;
            }
            if let Some(position) = middle(&run.tiles) {
                self.create_door(area, position, run.side, DoorKind::Internal, out_events)?;
            }
        }

        let has_external = runs
            .iter()
            .filter(|run| run.kind == DoorKind::External)
            .flat_map(|run| run.tiles.iter())
            .any(|tile| self.door_at(*tile).is_some() && !courtyard.contains(tile));
        if has_external {
            return Ok(());
        }

        let mut best: Option<(Direction, Vec<TilePos>)> = None;
        for run in runs.iter().filter(|run| run.kind == DoorKind::External) {
            let open: Vec<TilePos> = run
                .tiles
                .iter()
                .copied()
                .filter(|tile| !courtyard.contains(tile))
                .collect();
            if open.len() > best.as_ref().map_or(0, |(_, tiles)| tiles.len()) {
                best = Some((run.side, open));
            }
        }
        if let Some((side, tiles)) = best {
            if let Some(position) = middle(&tiles) {
                if self.door_at(position).is_none() {
                    self.create_door(area, position, side, DoorKind::External, out_events)?;
                }
            }
        }
        Ok(())
    }

    /// Reclassifies every door inside `region`, destroying the ones that lost their slot.
    pub(crate) fn reconcile_doors(
        &mut self,
        region: &Volume,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        let affected: Vec<(DoorId, Door)> = self
            .doors
            .iter()
            .filter(|(_, door)| region.contains(door.position))
            .map(|(id, door)| (id, *door))
            .collect();
        for (id, door) in affected {
            let kind = match self.area_volume(door.area) {
                Some(volume) => self.classify_door_slot(door.area, &volume, door.position).0,
                None => DoorKind::None,
            };
            match kind {
                DoorKind::None | DoorKind::BuildingsLinker => {
                    self.destroy_door(id, out_events)?;
                }
                kind if kind != door.kind => {
                    if let Some(record) = self.doors.weak_get_mut(id) {
                        record.kind = kind;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Rebuilds the external and blind door lists of a building.
    pub(crate) fn refresh_building_doors(
        &mut self,
        building: BuildingId,
        courtyard: &BTreeSet<TilePos>,
    ) {
        let mut external = Vec::new();
        let mut blind = Vec::new();
        for (_, door) in self.doors.iter() {
            if door.area.building != building || door.kind != DoorKind::External {
                continue;
            }
            if courtyard.contains(&door.position) {
                blind.push(door.position);
            } else {
                external.push(door.position);
            }
        }
        external.sort_unstable();
        blind.sort_unstable();
        if let Some(record) = self.buildings.weak_get_mut(building) {
            record.set_doors(external, blind);
        }
    }

    pub(crate) fn destroy_door(
        &mut self,
        id: DoorId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        if let Some(door) = self.doors.destroy(id) {
            self.grid.set_door(door.position, None)?;
            out_events.push(Event::DoorRemoved {
                door: id,
                position: door.position,
            });
        }
        Ok(())
    }

    pub(crate) fn set_door_open(
        &mut self,
        id: DoorId,
        open: bool,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        let Some(door) = self.doors.weak_get(id).copied() else {
            log::debug!("ignoring toggle of stale door {id:?}");
            return Ok(());
        };
        let Some(mut state) = self.door_at(door.position) else {
            return Ok(());
        };
        if state.open == open {
            return Ok(());
        }
        state.open = open;
        self.grid.set_door(door.position, Some(state))?;
        out_events.push(Event::DoorToggled { door: id, open });
        Ok(())
    }

    pub(crate) fn area_volume(&self, area: AreaKey) -> Option<Volume> {
        self.buildings
            .weak_get(area.building)
            .and_then(|building| building.areas().weak_get(area.area))
            .map(Area::volume)
    }

    fn door_at(&self, position: TilePos) -> Option<TileDoor> {
        self.grid.get(position).and_then(crate::tiles::Tile::door)
    }

    fn create_door(
        &mut self,
        area: AreaKey,
        position: TilePos,
        side: Direction,
        kind: DoorKind,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        let door = Door {
            position,
            side,
            kind,
            area,
        };
        let id = self.doors.create(door)?;
        let orientation = door.orientation();
        self.grid.set_door(
            position,
            Some(TileDoor {
                id,
                open: false,
                orientation,
            }),
        )?;
        out_events.push(Event::DoorCreated {
            door: id,
            position,
            orientation,
            kind,
        });
        Ok(())
    }
}

fn middle(tiles: &[TilePos]) -> Option<TilePos> {
    tiles.get(tiles.len() / 2).copied()
}

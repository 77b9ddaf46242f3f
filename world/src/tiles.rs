//! Dense three-dimensional tile storage.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use township_core::{AreaKey, DoorId, DoorOrientation, GridSize, RoofId, TilePos};

/// Maximum number of areas that may share one border tile.
pub const MAX_BORDER_OWNERS: usize = 4;

/// Failures raised while painting areas into the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TileError {
    /// The position lies outside the grid.
    #[error("tile {0:?} lies outside the grid")]
    OutOfBounds(TilePos),
    /// The border tile already hosts the maximum number of owners.
    #[error("border tile {0:?} is full")]
    OwnersFull(TilePos),
    /// The tile is already claimed in a way that excludes the new owner.
    #[error("tile {0:?} is already claimed")]
    Claimed(TilePos),
}

/// Classification of a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileClass {
    /// Unbuilt tile at or above ground level.
    Sky,
    /// Unbuilt tile below ground level.
    Underground,
    /// Tile strictly inside one area.
    Inner,
    /// Tile on the border ring of one or more areas.
    Border,
}

/// Door state mirrored on the tile hosting it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileDoor {
    /// Door object.
    pub id: DoorId,
    /// Whether the door currently lets mobiles through.
    pub open: bool,
    /// Orientation of the wall the door is set in.
    pub orientation: DoorOrientation,
}

/// Mutable state of one grid cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    class: TileClass,
    owners: [Option<AreaKey>; MAX_BORDER_OWNERS],
    door: Option<TileDoor>,
    roof: Option<RoofId>,
    occupants: u16,
}

impl Tile {
    fn unbuilt(class: TileClass) -> Self {
        Self {
            class,
            owners: [None; MAX_BORDER_OWNERS],
            door: None,
            roof: None,
            occupants: 0,
        }
    }

    /// Classification of the tile.
    #[must_use]
    pub const fn class(&self) -> TileClass {
        self.class
    }

    /// Reports whether any area claims the tile.
    #[must_use]
    pub const fn is_built(&self) -> bool {
        matches!(self.class, TileClass::Inner | TileClass::Border)
    }

    /// Reports whether the tile lies on a border ring.
    #[must_use]
    pub const fn is_border(&self) -> bool {
        matches!(self.class, TileClass::Border)
    }

    /// Reports whether the tile lies strictly inside an area.
    #[must_use]
    pub const fn is_inner(&self) -> bool {
        matches!(self.class, TileClass::Inner)
    }

    /// Areas claiming the tile.
    pub fn owners(&self) -> impl Iterator<Item = AreaKey> + '_ {
        self.owners.iter().flatten().copied()
    }

    /// Number of areas claiming the tile.
    #[must_use]
    pub fn owner_count(&self) -> usize {
        self.owners.iter().flatten().count()
    }

    /// Reports whether the border tile cannot accept another owner.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.owner_count() >= MAX_BORDER_OWNERS
    }

    /// Reports whether `area` claims the tile.
    #[must_use]
    pub fn is_owned_by(&self, area: AreaKey) -> bool {
        self.owners().any(|owner| owner == area)
    }

    /// Door hosted by the tile.
    #[must_use]
    pub const fn door(&self) -> Option<TileDoor> {
        self.door
    }

    /// Roof stamped over the tile.
    #[must_use]
    pub const fn roof(&self) -> Option<RoofId> {
        self.roof
    }

    /// Mobiles currently standing on the tile.
    #[must_use]
    pub const fn occupants(&self) -> u16 {
        self.occupants
    }

    /// Reports whether a mobile may step onto the tile.
    ///
    /// Border tiles are walls except where an open door pierces them.
    #[must_use]
    pub fn is_passable(&self) -> bool {
        match self.class {
            TileClass::Border => self.door.map_or(false, |door| door.open),
            TileClass::Underground => false,
            TileClass::Sky | TileClass::Inner => true,
        }
    }

    /// Reports whether the tile is passable and unoccupied.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.is_passable() && self.occupants == 0
    }
}

/// Dense grid of tiles addressed by [`TilePos`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TileGrid {
    size: GridSize,
    ground_level: i32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Creates an unbuilt grid; levels below `ground_level` are underground.
    #[must_use]
    pub fn new(size: GridSize, ground_level: i32) -> Self {
        let per_level = u64::from(size.width) * u64::from(size.height);
        let capacity = usize::try_from(per_level * u64::from(size.depth)).unwrap_or(0);
        let per_level = usize::try_from(per_level).unwrap_or(0);
        let tiles = (0..capacity)
            .map(|index| {
                let level = if per_level == 0 {
                    0
                } else {
                    i32::try_from(index / per_level).unwrap_or(i32::MAX)
                };
                Tile::unbuilt(Self::unbuilt_class(level, ground_level))
            })
            .collect();
        Self {
            size,
            ground_level,
            tiles,
        }
    }

    /// Dimensions of the grid.
    #[must_use]
    pub const fn size(&self) -> GridSize {
        self.size
    }

    /// Reports whether the position lies inside the grid.
    #[must_use]
    pub fn contains(&self, position: TilePos) -> bool {
        self.size.contains(position)
    }

    /// Tile at `position`, `None` outside the grid.
    #[must_use]
    pub fn get(&self, position: TilePos) -> Option<&Tile> {
        self.index(position).and_then(|index| self.tiles.get(index))
    }

    /// Reports whether the tile at `position` is claimed by any area.
    #[must_use]
    pub fn is_built(&self, position: TilePos) -> bool {
        self.get(position).map_or(false, Tile::is_built)
    }

    pub(crate) fn paint_inner(&mut self, position: TilePos, area: AreaKey) -> Result<(), TileError> {
        let tile = self.tile_mut(position)?;
        if tile.is_built() {
            return Err(TileError::Claimed(position));
        }
        tile.class = TileClass::Inner;
        tile.owners = [Some(area), None, None, None];
        Ok(())
    }

    pub(crate) fn paint_border(&mut self, position: TilePos, area: AreaKey) -> Result<(), TileError> {
        let tile = self.tile_mut(position)?;
        match tile.class {
            TileClass::Inner => return Err(TileError::Claimed(position)),
            TileClass::Border if tile.is_owned_by(area) => return Ok(()),
            _ => {}
        }
        let slot = tile
            .owners
            .iter_mut()
            .find(|owner| owner.is_none())
            .ok_or(TileError::OwnersFull(position))?;
        *slot = Some(area);
        tile.class = TileClass::Border;
        Ok(())
    }

    /// Drops `area` from the tile's owners, resetting the tile once nobody claims it.
    pub(crate) fn release(&mut self, position: TilePos, area: AreaKey) -> Result<(), TileError> {
        let ground_level = self.ground_level;
        let tile = self.tile_mut(position)?;
        for owner in tile.owners.iter_mut() {
            if *owner == Some(area) {
                *owner = None;
            }
        }
        if tile.owner_count() == 0 {
            tile.class = Self::unbuilt_class(position.z, ground_level);
        } else {
            tile.owners.sort_by_key(Option::is_none);
        }
        Ok(())
    }

    pub(crate) fn set_door(&mut self, position: TilePos, door: Option<TileDoor>) -> Result<(), TileError> {
        self.tile_mut(position)?.door = door;
        Ok(())
    }

    pub(crate) fn set_roof(&mut self, position: TilePos, roof: Option<RoofId>) -> Result<(), TileError> {
        self.tile_mut(position)?.roof = roof;
        Ok(())
    }

    pub(crate) fn enter(&mut self, position: TilePos) -> Result<(), TileError> {
        let tile = self.tile_mut(position)?;
        tile.occupants = tile.occupants.saturating_add(1);
        Ok(())
    }

    pub(crate) fn leave(&mut self, position: TilePos) -> Result<(), TileError> {
        let tile = self.tile_mut(position)?;
        tile.occupants = tile.occupants.saturating_sub(1);
        Ok(())
    }

    fn tile_mut(&mut self, position: TilePos) -> Result<&mut Tile, TileError> {
        self.index(position)
            .and_then(|index| self.tiles.get_mut(index))
            .ok_or(TileError::OutOfBounds(position))
    }

    fn index(&self, position: TilePos) -> Option<usize> {
        if !self.size.contains(position) {
            return None;
        }
        let x = usize::try_from(position.x).ok()?;
        let y = usize::try_from(position.y).ok()?;
        let z = usize::try_from(position.z).ok()?;
        let width = usize::try_from(self.size.width).ok()?;
        let height = usize::try_from(self.size.height).ok()?;
        Some((z * height + y) * width + x)
    }

    fn unbuilt_class(level: i32, ground_level: i32) -> TileClass {
        if level < ground_level {
            TileClass::Underground
        } else {
            TileClass::Sky
        }
    }
}

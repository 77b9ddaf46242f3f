#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Township simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters and systems submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! for systems and renderers to react to deterministically.

pub mod geometry;
pub mod ids;
pub mod roof;
pub mod settings;

use serde::{Deserialize, Serialize};

pub use geometry::{Dims, Direction, GridSize, TilePos, Volume};
pub use ids::{
    AreaId, AreaKey, BlockId, BuildingId, CityId, DoorId, RoofId, SlotId, TemplateId,
    MAX_SLOT_INDEX,
};
pub use roof::{Inclination, RoofPolygon, RoofVertex};
pub use settings::{AreaTemplate, AreaType, ExpansionTemplate, RoofSettings, SimulationSettings};

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation by one tick and drains queued expansion requests.
    Tick,
    /// Queues a building-growth request for the building manager.
    QueueExpansion {
        /// Request to enqueue.
        request: ExpansionRequest,
    },
    /// Places a specific area after re-validating it.
    PlaceArea {
        /// Building, block or city the area is added to.
        target: PlacementTarget,
        /// Type of the new area.
        area_type: AreaType,
        /// Volume of the new area.
        volume: Volume,
        /// Areas the new one may replace.
        replaceable: Vec<AreaKey>,
    },
    /// Unbuilds one area.
    RemoveArea {
        /// Area to remove.
        area: AreaKey,
    },
    /// Unbuilds a whole building.
    RemoveBuilding {
        /// Building to remove.
        building: BuildingId,
    },
    /// Installs a freshly generated roof on a building.
    InstallRoof {
        /// Building the roof covers.
        building: BuildingId,
        /// Tiles covered by the roof.
        tiles: Vec<TilePos>,
        /// Roof facets.
        polygons: Vec<RoofPolygon>,
    },
    /// Opens or closes a door.
    SetDoorOpen {
        /// Door to toggle.
        door: DoorId,
        /// Desired state.
        open: bool,
    },
    /// Records a mobile entering a tile.
    EnterTile {
        /// Tile entered.
        position: TilePos,
    },
    /// Records a mobile leaving a tile.
    LeaveTile {
        /// Tile left.
        position: TilePos,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Index of the tick that just started.
        tick: u64,
    },
    /// A new city was founded.
    CityFounded {
        /// Identifier of the city.
        city: CityId,
    },
    /// A new block was started inside a city.
    BlockFounded {
        /// Identifier of the block.
        block: BlockId,
        /// City owning the block.
        city: CityId,
    },
    /// A new building was started inside a block.
    BuildingFounded {
        /// Identifier of the building.
        building: BuildingId,
        /// Block owning the building.
        block: BlockId,
        /// Template driving the building's growth.
        template: TemplateId,
    },
    /// An area was committed to the tile grid.
    AreaBuilt {
        /// Identifier of the area.
        area: AreaKey,
        /// Type of the area.
        area_type: AreaType,
        /// Volume painted into the grid.
        volume: Volume,
    },
    /// An area was unbuilt.
    AreaRemoved {
        /// Identifier of the removed area.
        area: AreaKey,
        /// Volume cleared from the grid.
        volume: Volume,
    },
    /// A building lost its last area and was removed.
    BuildingRemoved {
        /// Identifier of the building.
        building: BuildingId,
    },
    /// A block lost its last building and was removed.
    BlockRemoved {
        /// Identifier of the block.
        block: BlockId,
    },
    /// A city lost its last block and was removed.
    CityRemoved {
        /// Identifier of the city.
        city: CityId,
    },
    /// Tiles inside the region changed; renderers rebuild the matching chunks.
    RegionChanged {
        /// Changed region.
        region: Volume,
    },
    /// A door object was created.
    DoorCreated {
        /// Identifier of the door.
        door: DoorId,
        /// Tile hosting the door.
        position: TilePos,
        /// Wall orientation of the door.
        orientation: DoorOrientation,
        /// Spaces the door connects.
        kind: DoorKind,
    },
    /// A door object was destroyed.
    DoorRemoved {
        /// Identifier of the door.
        door: DoorId,
        /// Tile that hosted the door.
        position: TilePos,
    },
    /// A door was opened or closed.
    DoorToggled {
        /// Identifier of the door.
        door: DoorId,
        /// New state.
        open: bool,
    },
    /// A building's roof no longer matches its footprint and must be regenerated.
    RoofInvalidated {
        /// Building needing a new roof.
        building: BuildingId,
    },
    /// A roof was installed.
    RoofAdded {
        /// Identifier of the roof.
        roof: RoofId,
        /// Building covered by the roof.
        building: BuildingId,
    },
    /// A roof was destroyed.
    RoofRemoved {
        /// Identifier of the roof.
        roof: RoofId,
        /// Building that was covered.
        building: BuildingId,
    },
    /// A direct placement request was rejected.
    PlacementRejected {
        /// Volume that was requested.
        volume: Volume,
        /// Reason of the rejection.
        reason: PlacementRejection,
    },
    /// An area removal request was rejected.
    AreaRemovalRejected {
        /// Area that was targeted.
        area: AreaKey,
        /// Reason of the rejection.
        reason: RemovalRejection,
    },
    /// An expansion request committed a new area.
    ExpansionCommitted {
        /// Request that was served.
        request: ExpansionRequest,
        /// Area that was created.
        area: AreaKey,
    },
    /// An expansion request found no buildable position.
    ExpansionUnavailable {
        /// Request that could not be served.
        request: ExpansionRequest,
    },
}

/// Building-growth request handled by the building manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExpansionRequest {
    /// Starts a new building from a template, near a position when provided.
    FoundBuilding {
        /// Template of the new building.
        template: TemplateId,
        /// Preferred location.
        near: Option<TilePos>,
    },
    /// Adds one area to an existing building.
    ExpandBuilding {
        /// Building to grow.
        building: BuildingId,
    },
}

/// Container a placed area is added to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementTarget {
    /// Grows an existing building.
    ExistingBuilding(BuildingId),
    /// Starts a new building inside an existing block.
    NewBuilding {
        /// Block hosting the building.
        block: BlockId,
        /// Template of the new building.
        template: TemplateId,
    },
    /// Starts a new block inside an existing city.
    NewBlock {
        /// City hosting the block.
        city: CityId,
        /// Template of the new building.
        template: TemplateId,
    },
    /// Starts a new city.
    NewCity {
        /// Template of the new building.
        template: TemplateId,
    },
}

/// Reasons the placement validator refuses a position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementRejection {
    /// Either extent is below the minimum viable area.
    TooSmall,
    /// The area plus its road margin leaves the grid.
    OutsideGrid,
    /// A tile inside the border is owned by an area that may not be replaced.
    Obstructed,
    /// A border tile cannot be shared with the new area.
    BorderConflict,
    /// The road margin touches another block.
    RoadMargin,
    /// A building's area graph would be split.
    Disconnected,
    /// A building would lose its last external door.
    DoorsOccluded,
    /// The target block has no surface left.
    BlockFull,
    /// The target container or template does not exist.
    UnknownTarget,
}

/// Reasons an area removal is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalRejection {
    /// The area does not exist.
    UnknownArea,
    /// The surviving areas would be disconnected.
    Disconnected,
}

/// Classification of the spaces a door slot connects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoorKind {
    /// Two areas of the same building.
    Internal,
    /// An area and the open map.
    External,
    /// Areas of two different buildings.
    BuildingsLinker,
    /// Not a door slot.
    None,
}

/// Orientation of the wall hosting a door.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoorOrientation {
    /// Wall runs north-south; the door is crossed east-west.
    Vertical,
    /// Wall runs east-west; the door is crossed north-south.
    Horizontal,
}

impl DoorOrientation {
    /// Orientation of a door set into the ring side facing `side`.
    #[must_use]
    pub const fn for_side(side: Direction) -> Self {
        if side.is_horizontal() {
            Self::Vertical
        } else {
            Self::Horizontal
        }
    }

    /// Directions a mobile crosses the door in.
    #[must_use]
    pub const fn crossing(self) -> (Direction, Direction) {
        match self {
            Self::Vertical => (Direction::West, Direction::East),
            Self::Horizontal => (Direction::North, Direction::South),
        }
    }

    /// Reports whether the door sits in a north-south wall.
    #[must_use]
    pub const fn is_vertical(self) -> bool {
        matches!(self, Self::Vertical)
    }
}

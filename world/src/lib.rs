#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the Township simulation core.
//!
//! The world owns the tile grid and every slot-mapped container (cities,
//! blocks, buildings, doors, roofs). Adapters and systems mutate it exclusively
//! through [`apply`], and observe it through the free functions in [`query`].

mod commit;
pub mod doors;
mod expansion;
pub mod hierarchy;
pub mod outline;
pub mod placement;
#[cfg(feature = "replay")]
pub mod replay;
pub mod roofs;
pub mod slot_map;
pub mod tiles;

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use township_core::{
    AreaKey, BlockId, BuildingId, CityId, Command, DoorId, DoorKind, Event, RoofId,
    SimulationSettings, TilePos, Volume,
};

use crate::{
    doors::Door,
    expansion::ExpansionQueue,
    hierarchy::{Building, City, CityBlock},
    outline::{BlockOutline, OutlineError},
    roofs::Roof,
    slot_map::{SlotMap, SlotMapError},
    tiles::{TileError, TileGrid},
};

/// Structural failures that abort the command being applied.
///
/// Expected negative outcomes such as an unbuildable position are reported as
/// events instead.
#[derive(Debug, Error)]
pub enum WorldError {
    /// A slot-mapped container rejected an operation.
    #[error(transparent)]
    SlotMap(#[from] SlotMapError),
    /// The tile grid rejected a paint operation.
    #[error(transparent)]
    Tile(#[from] TileError),
    /// Outline tracing met an inconsistent boundary.
    #[error(transparent)]
    Outline(#[from] OutlineError),
    /// A volume with negative extents was supplied.
    #[error("volume {0:?} has negative extents")]
    InvalidVolume(Volume),
    /// An area would overlap the inner volume of a sibling area.
    #[error("area {0:?} overlaps an existing area")]
    OverlappingArea(Volume),
    /// A committed mutation left a building's area graph split in pieces.
    #[error("building {0:?} is no longer connected")]
    Disconnected(BuildingId),
}

/// Represents the authoritative Township world state.
#[derive(Debug)]
pub struct World {
    settings: SimulationSettings,
    grid: TileGrid,
    cities: SlotMap<CityId, City>,
    blocks: SlotMap<BlockId, CityBlock>,
    buildings: SlotMap<BuildingId, Building>,
    doors: SlotMap<DoorId, Door>,
    roofs: SlotMap<RoofId, Roof>,
    expansions: ExpansionQueue,
    rng: ChaCha8Rng,
    tick_index: u64,
    #[cfg(feature = "replay")]
    replay: replay::ReplayLog,
}

impl World {
    /// Creates an empty world configured by `settings`.
    #[must_use]
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            grid: TileGrid::new(settings.grid, settings.ground_level),
            cities: SlotMap::new(),
            blocks: SlotMap::new(),
            buildings: SlotMap::new(),
            doors: SlotMap::new(),
            roofs: SlotMap::new(),
            expansions: ExpansionQueue::default(),
            rng: ChaCha8Rng::seed_from_u64(settings.seed),
            tick_index: 0,
            #[cfg(feature = "replay")]
            replay: replay::ReplayLog::default(),
            settings,
        }
    }

    /// Upper bound on the steps of a single outline walk.
    fn outline_step_limit(&self) -> usize {
        let size = self.grid.size();
        let tiles = u64::from(size.width) * u64::from(size.height) * u64::from(size.depth);
        usize::try_from(tiles.saturating_mul(4).saturating_add(16)).unwrap_or(usize::MAX)
    }

    /// Reports whether a tile counts as built once `ignored` areas are gone and
    /// `hypothetical` is in place.
    fn is_occupied(
        &self,
        position: TilePos,
        hypothetical: Option<&Volume>,
        ignored: &BTreeSet<AreaKey>,
    ) -> bool {
        hypothetical.map_or(false, |volume| volume.contains(position))
            || self.grid.get(position).map_or(false, |tile| {
                tile.owners().any(|owner| !ignored.contains(&owner))
            })
    }

    fn has_external_door(&self, position: TilePos) -> bool {
        self.grid
            .get(position)
            .and_then(tiles::Tile::door)
            .and_then(|door| self.doors.weak_get(door.id))
            .map_or(false, |door| door.kind() == DoorKind::External)
    }

    /// Traces the outlines passing along `candidates` in a hypothetical state.
    pub(crate) fn trace_outlines<I>(
        &self,
        candidates: I,
        hypothetical: Option<&Volume>,
        ignored: &BTreeSet<AreaKey>,
    ) -> Result<Vec<BlockOutline>, OutlineError>
    where
        I: IntoIterator<Item = TilePos>,
    {
        outline::compute_outlines(
            candidates,
            |tile| self.is_occupied(tile, hypothetical, ignored),
            |tile| self.has_external_door(tile),
            self.outline_step_limit(),
        )
    }

    /// Ring tiles of every area of `building`, skipping `ignored` areas.
    pub(crate) fn building_ring_tiles(
        &self,
        building: BuildingId,
        ignored: &BTreeSet<AreaKey>,
    ) -> Vec<TilePos> {
        self.buildings
            .weak_get(building)
            .map(|record| {
                record
                    .areas()
                    .iter()
                    .filter(|(area, _)| !ignored.contains(&AreaKey::new(building, *area)))
                    .flat_map(|(_, area)| area.volume().ring())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[cfg(feature = "replay")]
    fn record_step(&mut self, depth: u8, label: impl FnOnce() -> String) {
        self.replay.step(depth, label);
    }

    #[cfg(not(feature = "replay"))]
    fn record_step(&mut self, _depth: u8, _label: impl FnOnce() -> String) {}

    #[cfg(feature = "replay")]
    fn record_highlight(&mut self, depth: u8, region: Volume) {
        self.replay.highlight(depth, region);
    }

    #[cfg(not(feature = "replay"))]
    fn record_highlight(&mut self, _depth: u8, _region: Volume) {}

    /// Limits replay recording to steps at or above `depth`.
    #[cfg(feature = "replay")]
    pub fn set_replay_depth(&mut self, depth: u8) {
        self.replay.set_max_depth(depth);
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(SimulationSettings::default())
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Rejected requests are reported through `out_events`; an `Err` signals a
/// structural invariant violation and leaves the current mutation aborted.
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), WorldError> {
    match command {
        Command::Tick => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced {
                tick: world.tick_index,
            });
            world.drain_expansions(out_events)
        }
        Command::QueueExpansion { request } => {
            world.expansions.push(request);
            Ok(())
        }
        Command::PlaceArea {
            target,
            area_type,
            volume,
            replaceable,
        } => world.place_area(target, area_type, volume, &replaceable, out_events),
        Command::RemoveArea { area } => world.remove_area(area, out_events),
        Command::RemoveBuilding { building } => world.remove_building(building, out_events),
        Command::InstallRoof {
            building,
            tiles,
            polygons,
        } => world.install_roof(building, tiles, polygons, out_events),
        Command::SetDoorOpen { door, open } => world.set_door_open(door, open, out_events),
        Command::EnterTile { position } => Ok(world.grid.enter(position)?),
        Command::LeaveTile { position } => Ok(world.grid.leave(position)?),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::collections::BTreeSet;

    use township_core::{
        AreaKey, AreaType, BlockId, BuildingId, CityId, DoorId, PlacementTarget, RoofId,
        SimulationSettings, TilePos, Volume,
    };

    use super::{World, WorldError};
    use crate::{
        doors::Door,
        hierarchy::{self, Area, Building, City, CityBlock},
        outline::{BlockOutline, OutlineError},
        placement::{self, PlacementVerdict},
        roofs::Roof,
        tiles::{Tile, TileGrid},
    };

    /// Configuration the world was created with.
    #[must_use]
    pub fn settings(world: &World) -> &SimulationSettings {
        &world.settings
    }

    /// Number of ticks applied so far.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Provides read-only access to the tile grid.
    #[must_use]
    pub fn tile_grid(world: &World) -> &TileGrid {
        &world.grid
    }

    /// Tile at `position`, `None` outside the grid.
    #[must_use]
    pub fn tile(world: &World, position: TilePos) -> Option<&Tile> {
        world.grid.get(position)
    }

    /// Reports whether a mobile may step onto `position`.
    #[must_use]
    pub fn is_passable(world: &World, position: TilePos) -> bool {
        world.grid.get(position).map_or(false, Tile::is_passable)
    }

    /// Reports whether `position` is passable and unoccupied.
    #[must_use]
    pub fn is_free(world: &World, position: TilePos) -> bool {
        world.grid.get(position).map_or(false, Tile::is_free)
    }

    /// Live cities.
    pub fn cities(world: &World) -> impl Iterator<Item = (CityId, &City)> + '_ {
        world.cities.iter()
    }

    /// City lookup that reports stale identifiers as absent.
    #[must_use]
    pub fn city(world: &World, city: CityId) -> Option<&City> {
        world.cities.weak_get(city)
    }

    /// Average of the city's block centroids.
    #[must_use]
    pub fn city_centroid(world: &World, city: CityId) -> Option<(f64, f64)> {
        world
            .cities
            .weak_get(city)
            .and_then(|record| record.centroid(&world.blocks))
    }

    /// Live blocks.
    pub fn blocks(world: &World) -> impl Iterator<Item = (BlockId, &CityBlock)> + '_ {
        world.blocks.iter()
    }

    /// Block lookup that reports stale identifiers as absent.
    #[must_use]
    pub fn block(world: &World, block: BlockId) -> Option<&CityBlock> {
        world.blocks.weak_get(block)
    }

    /// Live buildings.
    pub fn buildings(world: &World) -> impl Iterator<Item = (BuildingId, &Building)> + '_ {
        world.buildings.iter()
    }

    /// Building lookup that reports stale identifiers as absent.
    #[must_use]
    pub fn building(world: &World, building: BuildingId) -> Option<&Building> {
        world.buildings.weak_get(building)
    }

    /// Area lookup that reports stale identifiers as absent.
    #[must_use]
    pub fn area(world: &World, area: AreaKey) -> Option<&Area> {
        world
            .buildings
            .weak_get(area.building)
            .and_then(|building| building.areas().weak_get(area.area))
    }

    /// Reports whether the building's area-adjacency graph is connected.
    #[must_use]
    pub fn is_building_connected(world: &World, building: BuildingId) -> bool {
        world.buildings.weak_get(building).map_or(false, |record| {
            let volumes: Vec<Volume> = record.areas().values().map(Area::volume).collect();
            hierarchy::is_connected(&volumes)
        })
    }

    /// Live doors.
    pub fn doors(world: &World) -> impl Iterator<Item = (DoorId, &Door)> + '_ {
        world.doors.iter()
    }

    /// Door lookup that reports stale identifiers as absent.
    #[must_use]
    pub fn door(world: &World, door: DoorId) -> Option<&Door> {
        world.doors.weak_get(door)
    }

    /// Roof currently covering `building`.
    #[must_use]
    pub fn roof(world: &World, building: BuildingId) -> Option<(RoofId, &Roof)> {
        let id = world.buildings.weak_get(building)?.roof()?;
        world.roofs.weak_get(id).map(|roof| (id, roof))
    }

    /// Live roofs.
    pub fn roofs(world: &World) -> impl Iterator<Item = (RoofId, &Roof)> + '_ {
        world.roofs.iter()
    }

    /// Tiles that the building's roof should cover, sorted and deduplicated.
    #[must_use]
    pub fn roofable_tiles(world: &World, building: BuildingId) -> Vec<TilePos> {
        let Some(record) = world.buildings.weak_get(building) else {
            return Vec::new();
        };
        let tiles: BTreeSet<TilePos> = record
            .areas()
            .values()
            .filter(|area| area.area_type().is_roofed())
            .flat_map(|area| area.volume().tiles())
            .collect();
        tiles.into_iter().collect()
    }

    /// Types of the areas of a building, in storage order.
    #[must_use]
    pub fn area_types(world: &World, building: BuildingId) -> Vec<AreaType> {
        world
            .buildings
            .weak_get(building)
            .map(|record| record.areas().values().map(Area::area_type).collect())
            .unwrap_or_default()
    }

    /// Runs the placement validator without mutating the world.
    pub fn validate_placement(
        world: &World,
        target: PlacementTarget,
        volume: Volume,
        replaceable: &BTreeSet<AreaKey>,
    ) -> Result<PlacementVerdict, WorldError> {
        placement::is_area_buildable(world, target, &volume, replaceable)
    }

    /// Traces the outlines running along the building's areas.
    pub fn building_outlines(
        world: &World,
        building: BuildingId,
    ) -> Result<Vec<BlockOutline>, OutlineError> {
        let ignored = BTreeSet::new();
        let candidates = world.building_ring_tiles(building, &ignored);
        world.trace_outlines(candidates, None, &ignored)
    }

    /// Number of expansion requests waiting for a tick.
    #[must_use]
    pub fn pending_expansions(world: &World) -> usize {
        world.expansions.len()
    }

    /// Reports whether the building is cached as unable to grow.
    #[must_use]
    pub fn is_unexpandable(world: &World, building: BuildingId) -> bool {
        world.expansions.is_unexpandable(building)
    }

    /// Observation events recorded so far.
    #[cfg(feature = "replay")]
    #[must_use]
    pub fn replay_events(world: &World) -> &[crate::replay::ReplayEvent] {
        world.replay.events()
    }
}

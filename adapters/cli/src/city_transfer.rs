//! Single-line city layout snapshots.

use std::collections::BTreeSet;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use township_core::{
    AreaType, BlockId, BuildingId, CityId, Command, Event, PlacementTarget, TemplateId, Volume,
};
use township_world::{apply, query, World, WorldError};

const SNAPSHOT_DOMAIN: &str = "township";
const SNAPSHOT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded snapshot payload.
pub(crate) const SNAPSHOT_HEADER: &str = "township:v1";
/// Delimiter used to separate the prefix, grid dimensions and payload.
const FIELD_DELIMITER: char = ':';

/// Every building's areas, grouped by city and block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CitySnapshot {
    /// Tile columns of the grid the layout was captured on.
    pub(crate) width: u32,
    /// Tile rows of the grid the layout was captured on.
    pub(crate) height: u32,
    /// Captured cities.
    pub(crate) cities: Vec<CityLayout>,
}

/// Blocks of one city.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CityLayout {
    pub(crate) blocks: Vec<BlockLayout>,
}

/// Buildings of one block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct BlockLayout {
    pub(crate) buildings: Vec<BuildingLayout>,
}

/// Areas of one building.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct BuildingLayout {
    pub(crate) template: TemplateId,
    pub(crate) areas: Vec<AreaLayout>,
}

/// One placed area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AreaLayout {
    pub(crate) area_type: AreaType,
    pub(crate) volume: Volume,
}

#[derive(Serialize, Deserialize)]
struct SerializableSnapshot {
    cities: Vec<CityLayout>,
}

/// Outcome of rebuilding a snapshot into a world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RestoreSummary {
    pub(crate) placed: usize,
    pub(crate) skipped: usize,
}

/// Errors that can occur while encoding or decoding snapshots.
#[derive(Debug, Error)]
pub(crate) enum CityTransferError {
    #[error("snapshot payload was empty")]
    EmptyPayload,
    #[error("snapshot is missing the {0}")]
    MissingField(&'static str),
    #[error("snapshot prefix '{0}' is not supported")]
    InvalidPrefix(String),
    #[error("snapshot version '{0}' is not supported")]
    UnsupportedVersion(String),
    #[error("could not parse grid dimensions '{0}'")]
    InvalidDimensions(String),
    #[error("could not decode snapshot payload: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    #[error("could not (de)serialize snapshot payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

impl CitySnapshot {
    /// Captures every city of `world`.
    pub(crate) fn capture(world: &World) -> Self {
        let size = query::tile_grid(world).size();
        let cities = query::cities(world)
            .map(|(_, city)| CityLayout {
                blocks: city
                    .blocks()
                    .iter()
                    .filter_map(|block| query::block(world, *block))
                    .map(|block| BlockLayout {
                        buildings: block
                            .buildings()
                            .iter()
                            .filter_map(|building| query::building(world, *building))
                            .map(|building| BuildingLayout {
                                template: building.template(),
                                areas: building
                                    .areas()
                                    .values()
                                    .map(|area| AreaLayout {
                                        area_type: area.area_type(),
                                        volume: area.volume(),
                                    })
                                    .collect(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            width: size.width,
            height: size.height,
            cities,
        }
    }

    /// Total number of areas in the snapshot.
    #[cfg(test)]
    pub(crate) fn area_count(&self) -> usize {
        self.cities
            .iter()
            .flat_map(|city| &city.blocks)
            .flat_map(|block| &block.buildings)
            .map(|building| building.areas.len())
            .sum()
    }

    /// Encodes the snapshot into a single-line string.
    pub(crate) fn encode(&self) -> Result<String, CityTransferError> {
        let payload = SerializableSnapshot {
            cities: self.cities.clone(),
        };
        let json = serde_json::to_vec(&payload)?;
        let encoded = STANDARD_NO_PAD.encode(json);
        Ok(format!(
            "{SNAPSHOT_HEADER}:{}x{}:{encoded}",
            self.width, self.height
        ))
    }

    /// Decodes a snapshot from its string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, CityTransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CityTransferError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let mut next = |field| parts.next().ok_or(CityTransferError::MissingField(field));
        let domain = next("prefix")?;
        let version = next("version")?;
        let dimensions = next("grid dimensions")?;
        let payload = next("payload")?;

        if domain != SNAPSHOT_DOMAIN {
            return Err(CityTransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != SNAPSHOT_VERSION {
            return Err(CityTransferError::UnsupportedVersion(version.to_owned()));
        }

        let (width, height) = parse_dimensions(dimensions)?;
        let bytes = STANDARD_NO_PAD.decode(payload.as_bytes())?;
        let decoded: SerializableSnapshot = serde_json::from_slice(&bytes)?;

        Ok(Self {
            width,
            height,
            cities: decoded.cities,
        })
    }

    /// Replays the layout into `world`, area by area.
    ///
    /// Areas that no longer validate are skipped; an area whose neighbors have
    /// not been rebuilt yet is retried once they are.
    pub(crate) fn restore(&self, world: &mut World) -> Result<RestoreSummary, WorldError> {
        let mut summary = RestoreSummary::default();
        for city in &self.cities {
            let mut ids = Founded::default();
            for block in &city.blocks {
                ids.block = None;
                for building in &block.buildings {
                    ids.building = None;
                    let mut remaining: Vec<AreaLayout> = building.areas.clone();
                    loop {
                        let before = remaining.len();
                        let mut left = Vec::new();
                        for area in remaining {
                            if !ids.place(world, building.template, area)? {
                                left.push(area);
                            }
                        }
                        remaining = left;
                        if remaining.is_empty() || remaining.len() == before {
                            break;
                        }
                    }
                    summary.placed += building.areas.len() - remaining.len();
                    summary.skipped += remaining.len();
                }
            }
        }
        Ok(summary)
    }
}

/// Containers created so far while restoring one city.
#[derive(Default)]
struct Founded {
    city: Option<CityId>,
    block: Option<BlockId>,
    building: Option<BuildingId>,
}

impl Founded {
    fn target(&self, template: TemplateId) -> PlacementTarget {
        match (self.building, self.block, self.city) {
            (Some(building), _, _) => PlacementTarget::ExistingBuilding(building),
            (None, Some(block), _) => PlacementTarget::NewBuilding { block, template },
            (None, None, Some(city)) => PlacementTarget::NewBlock { city, template },
            (None, None, None) => PlacementTarget::NewCity { template },
        }
    }

    fn place(
        &mut self,
        world: &mut World,
        template: TemplateId,
        area: AreaLayout,
    ) -> Result<bool, WorldError> {
        let target = self.target(template);
        let verdict = query::validate_placement(world, target, area.volume, &BTreeSet::new())?;
        if !verdict.buildable {
            return Ok(false);
        }
        let mut events = Vec::new();
        apply(
            world,
            Command::PlaceArea {
                target,
                area_type: area.area_type,
                volume: area.volume,
                replaceable: Vec::new(),
            },
            &mut events,
        )?;
        for event in &events {
            match event {
                Event::CityFounded { city } => self.city = Some(*city),
                Event::BlockFounded { block, .. } => self.block = Some(*block),
                Event::BuildingFounded { building, .. } => self.building = Some(*building),
                _ => {}
            }
        }
        Ok(events
            .iter()
            .any(|event| matches!(event, Event::AreaBuilt { .. })))
    }
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), CityTransferError> {
    let invalid = || CityTransferError::InvalidDimensions(dimensions.to_owned());
    let (width, height) = dimensions.split_once(['x', 'X']).ok_or_else(invalid)?;
    let width = width.trim().parse::<u32>().map_err(|_| invalid())?;
    let height = height.trim().parse::<u32>().map_err(|_| invalid())?;

    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use township_core::{Command, ExpansionRequest, SimulationSettings, TemplateId};

    use super::*;

    fn grown_world() -> World {
        let mut world = World::new(SimulationSettings::default());
        let mut events = Vec::new();
        for round in 0..12u32 {
            let request = if round % 4 == 0 {
                ExpansionRequest::FoundBuilding {
                    template: TemplateId::new(round / 4 % 2),
                    near: None,
                }
            } else {
                let Some((building, _)) = query::buildings(&world).last() else {
                    continue;
                };
                ExpansionRequest::ExpandBuilding { building }
            };
            apply(&mut world, Command::QueueExpansion { request }, &mut events)
                .expect("queueing");
            apply(&mut world, Command::Tick, &mut events).expect("tick");
        }
        world
    }

    #[test]
    fn captured_layouts_survive_transfer() {
        let world = grown_world();
        let snapshot = CitySnapshot::capture(&world);
        assert!(snapshot.area_count() > 1);

        let encoded = snapshot.encode().expect("snapshot encodes");
        assert!(encoded.starts_with(&format!("{SNAPSHOT_HEADER}:128x128:")));
        let decoded = CitySnapshot::decode(&encoded).expect("snapshot decodes");
        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn restored_worlds_hold_the_same_areas() {
        let snapshot = CitySnapshot::capture(&grown_world());
        let mut world = World::new(SimulationSettings::default());
        let summary = snapshot.restore(&mut world).expect("restore");
        assert_eq!(summary.placed + summary.skipped, snapshot.area_count());
        assert!(summary.placed > 0);

        let restored = CitySnapshot::capture(&world);
        assert_eq!(restored.area_count(), summary.placed);
        assert_eq!(restored.cities.len(), snapshot.cities.len());
    }

    #[test]
    fn malformed_snapshots_are_rejected() {
        assert!(matches!(
            CitySnapshot::decode("  "),
            Err(CityTransferError::EmptyPayload)
        ));
        assert!(matches!(
            CitySnapshot::decode("maze:v1:4x4:e30"),
            Err(CityTransferError::InvalidPrefix(_))
        ));
        assert!(matches!(
            CitySnapshot::decode("township:v2:4x4:e30"),
            Err(CityTransferError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            CitySnapshot::decode("township:v1:0x4:e30"),
            Err(CityTransferError::InvalidDimensions(_))
        ));
        assert!(matches!(
            CitySnapshot::decode("township:v1:4x4"),
            Err(CityTransferError::MissingField("payload"))
        ));
        assert!(matches!(
            CitySnapshot::decode("township:v1:4x4:!!"),
            Err(CityTransferError::InvalidEncoding(_))
        ));
    }
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that derives hip roofs for buildings whose footprint changed.
//!
//! Roofs are regenerated from scratch: the roofable tiles are raised into a
//! flat half-tile matrix, every straight stretch of the perimeter is projected
//! inward one height step at a time, and the resulting inclination planes are
//! traced into facets.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use thiserror::Error;
use township_core::{BuildingId, Command, Event, RoofPolygon, RoofSettings, TilePos};

mod extract;
mod matrix;
mod render;

pub use render::{render_vertices, RenderVertex};

use matrix::RoofMatrix;

/// Failures raised while deriving a roof.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RoofError {
    /// The footprint held no tiles.
    #[error("roof footprint is empty")]
    EmptyFootprint,
    /// The footprint spans more microtiles than can be addressed.
    #[error("roof footprint is too large")]
    FootprintTooLarge,
    /// A boundary microtile matched none of the known neighborhoods.
    #[error("unexpected roof topology at ({x}, {y}), missing neighbors {missing:#010b}")]
    UnexpectedTopology {
        /// Column in half tiles.
        x: i32,
        /// Row in half tiles.
        y: i32,
        /// Clockwise mask of non-roofable neighbors, north first.
        missing: u8,
    },
}

/// Options of the roofing system.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoofingConfig {
    /// Extends roofs by one more half tile past the walls.
    pub eaves: bool,
    /// Horizontal shear handed to renderers, in tiles per tile of height.
    pub shear: f32,
}

impl Default for RoofingConfig {
    fn default() -> Self {
        Self::from(&RoofSettings::default())
    }
}

impl From<&RoofSettings> for RoofingConfig {
    fn from(settings: &RoofSettings) -> Self {
        Self {
            eaves: settings.eaves,
            shear: settings.shear,
        }
    }
}

/// Reacts to `RoofInvalidated` events with freshly derived roofs.
#[derive(Debug, Default)]
pub struct Roofing {
    config: RoofingConfig,
}

impl Roofing {
    /// Creates a roofing system with the provided configuration.
    #[must_use]
    pub fn new(config: RoofingConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> RoofingConfig {
        self.config
    }

    /// Emits one `InstallRoof` per invalidated building.
    ///
    /// `roofable_tiles` supplies the current footprint of a building. Buildings
    /// without roofable tiles are skipped.
    pub fn handle<F>(
        &mut self,
        events: &[Event],
        mut roofable_tiles: F,
        out: &mut Vec<Command>,
    ) -> Result<(), RoofError>
    where
        F: FnMut(BuildingId) -> Vec<TilePos>,
    {
        let invalidated: BTreeSet<BuildingId> = events
            .iter()
            .filter_map(|event| match event {
                Event::RoofInvalidated { building } => Some(*building),
                _ => None,
            })
            .collect();

        for building in invalidated {
            let tiles = roofable_tiles(building);
            if tiles.is_empty() {
                continue;
            }
            let polygons = generate(&tiles, self.config.eaves)?;
            debug!(
                "derived {} roof facets over {} tiles for {building:?}",
                polygons.len(),
                tiles.len()
            );
            out.push(Command::InstallRoof {
                building,
                tiles,
                polygons,
            });
        }
        Ok(())
    }
}

/// Derives the facets covering `tiles`, level by level.
pub fn generate(tiles: &[TilePos], eaves: bool) -> Result<Vec<RoofPolygon>, RoofError> {
    let mut levels: BTreeMap<i32, Vec<TilePos>> = BTreeMap::new();
    for tile in tiles {
        levels.entry(tile.z).or_default().push(*tile);
    }

    let mut polygons = Vec::new();
    for (level, footprint) in levels {
        let mut matrix = RoofMatrix::fill(&footprint, eaves)?;
        matrix.classify()?;
        let borders = matrix.borders()?;
        matrix.project(&borders);
        matrix.prune_inclinations();
        polygons.extend(extract::polygons(&matrix, level));
    }
    Ok(polygons)
}

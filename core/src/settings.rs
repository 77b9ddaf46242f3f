//! Explicit simulation configuration threaded into the world at construction.

use serde::{Deserialize, Serialize};

use crate::{Dims, GridSize, TemplateId};

/// Functional type of an area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AreaType {
    /// Open cultivated plot.
    Field,
    /// Fenced grazing plot.
    Pasture,
    /// Shelter for cattle.
    Cowshed,
    /// Storage barn.
    Barn,
    /// Main farm dwelling.
    Farmhouse,
    /// Town dwelling.
    Dwelling,
    /// Craft workshop.
    Workshop,
}

impl AreaType {
    /// Reports whether areas of this type carry a roof.
    #[must_use]
    pub const fn is_roofed(self) -> bool {
        !matches!(self, Self::Field | Self::Pasture)
    }
}

/// One kind of area a template may add to a building.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaTemplate {
    /// Type of the area that gets created.
    pub area_type: AreaType,
    /// Candidate extents, tried in shuffled order together with their rotations.
    pub dims: Vec<Dims>,
    /// Area types of the same building this area may replace.
    #[serde(default)]
    pub replaces: Vec<AreaType>,
}

/// Growth policy shared by every building created from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionTemplate {
    /// Identifier referenced by buildings and requests.
    pub id: TemplateId,
    /// Human readable name.
    pub name: String,
    /// Area kinds; the first one seeds a brand-new building.
    pub areas: Vec<AreaTemplate>,
}

/// Roof generation options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoofSettings {
    /// Regenerates roofs whenever a building footprint changes.
    pub enabled: bool,
    /// Extends the roof by a second ring of half tiles beyond the walls.
    pub eaves: bool,
    /// Horizontal shear applied per unit of roof height in renderer space.
    pub shear: f32,
}

impl Default for RoofSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            eaves: false,
            shear: 0.25,
        }
    }
}

/// Configuration object for the whole simulation core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Size of the tile grid.
    pub grid: GridSize,
    /// Levels below this one are underground.
    pub ground_level: i32,
    /// Unbuilt margin kept between blocks.
    pub road_width: i32,
    /// Surface a block may hold before a new block has to be started.
    pub max_block_surface: i64,
    /// Expansion requests drained per tick.
    pub expansions_per_tick: usize,
    /// Seed of the shared tie-breaking generator.
    pub seed: u64,
    /// Roof generation options.
    pub roofs: RoofSettings,
    /// Expansion templates available to buildings.
    pub templates: Vec<ExpansionTemplate>,
}

impl SimulationSettings {
    /// Looks up a template by identifier.
    #[must_use]
    pub fn template(&self, id: TemplateId) -> Option<&ExpansionTemplate> {
        self.templates.iter().find(|template| template.id == id)
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            grid: GridSize::new(128, 128, 1),
            ground_level: 0,
            road_width: 2,
            max_block_surface: 1_600,
            expansions_per_tick: 4,
            seed: 0x5eed_0f_c17e,
            roofs: RoofSettings::default(),
            templates: default_templates(),
        }
    }
}

/// Farmstead and hamlet templates used when no configuration is supplied.
#[must_use]
pub fn default_templates() -> Vec<ExpansionTemplate> {
    vec![
        ExpansionTemplate {
            id: TemplateId::new(0),
            name: "farmstead".to_owned(),
            areas: vec![
                AreaTemplate {
                    area_type: AreaType::Farmhouse,
                    dims: vec![Dims::new(6, 6), Dims::new(7, 5)],
                    replaces: vec![AreaType::Field],
                },
                AreaTemplate {
                    area_type: AreaType::Field,
                    dims: vec![Dims::new(10, 10), Dims::new(10, 8)],
                    replaces: Vec::new(),
                },
                AreaTemplate {
                    area_type: AreaType::Cowshed,
                    dims: vec![Dims::new(8, 5)],
                    replaces: vec![AreaType::Field],
                },
                AreaTemplate {
                    area_type: AreaType::Barn,
                    dims: vec![Dims::new(6, 4)],
                    replaces: Vec::new(),
                },
            ],
        },
        ExpansionTemplate {
            id: TemplateId::new(1),
            name: "hamlet".to_owned(),
            areas: vec![
                AreaTemplate {
                    area_type: AreaType::Dwelling,
                    dims: vec![Dims::new(5, 5), Dims::new(6, 4)],
                    replaces: Vec::new(),
                },
                AreaTemplate {
                    area_type: AreaType::Workshop,
                    dims: vec![Dims::new(4, 4)],
                    replaces: Vec::new(),
                },
                AreaTemplate {
                    area_type: AreaType::Pasture,
                    dims: vec![Dims::new(8, 6)],
                    replaces: Vec::new(),
                },
            ],
        },
    ]
}

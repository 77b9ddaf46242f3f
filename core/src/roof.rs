//! Roof facet data exchanged between the roofing system, the world and renderers.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::Direction;

/// Cardinal direction toward which a roof facet rises.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Inclination {
    /// Rises toward the north.
    North,
    /// Rises toward the east.
    East,
    /// Rises toward the south.
    South,
    /// Rises toward the west.
    West,
}

impl Inclination {
    /// All inclinations in clockwise order.
    pub const ALL: [Inclination; 4] = [
        Inclination::North,
        Inclination::East,
        Inclination::South,
        Inclination::West,
    ];

    /// Bit used by inclination flag sets.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::North => 0b0001,
            Self::East => 0b0010,
            Self::South => 0b0100,
            Self::West => 0b1000,
        }
    }

    /// Planar direction of the rise.
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::North => Direction::North,
            Self::East => Direction::East,
            Self::South => Direction::South,
            Self::West => Direction::West,
        }
    }

    /// Inclination rising toward `direction`.
    #[must_use]
    pub const fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::North => Self::North,
            Direction::East => Self::East,
            Direction::South => Self::South,
            Direction::West => Self::West,
        }
    }
}

/// Roof polygon vertex in half-tile units.
///
/// `x` and `y` are planar coordinates where two units span one tile and tile
/// `(tx, ty)` is centered on `(2 * tx, 2 * ty)`; `height` rises by one unit per
/// half tile walked inward from the eaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoofVertex {
    /// Planar column in half tiles.
    pub x: i32,
    /// Planar row in half tiles.
    pub y: i32,
    /// Height above the eaves in half tiles.
    pub height: i32,
}

impl RoofVertex {
    /// Creates a new vertex.
    #[must_use]
    pub const fn new(x: i32, y: i32, height: i32) -> Self {
        Self { x, y, height }
    }
}

/// Planar roof facet.
///
/// Equality and hashing ignore vertex order so the same facet reached from two
/// seeds collapses into one polygon.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoofPolygon {
    /// Tile level the roof sits on.
    pub level: i32,
    /// Direction the facet rises toward.
    pub inclination: Inclination,
    /// Closed vertex loop.
    pub vertices: Vec<RoofVertex>,
}

impl RoofPolygon {
    /// Vertices sorted into a canonical order.
    #[must_use]
    pub fn canonical_vertices(&self) -> Vec<RoofVertex> {
        let mut sorted = self.vertices.clone();
        sorted.sort_unstable();
        sorted
    }

    /// Highest vertex height of the facet.
    #[must_use]
    pub fn peak_height(&self) -> i32 {
        self.vertices
            .iter()
            .map(|vertex| vertex.height)
            .max()
            .unwrap_or(0)
    }
}

impl PartialEq for RoofPolygon {
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level
            && self.inclination == other.inclination
            && self.canonical_vertices() == other.canonical_vertices()
    }
}

impl Eq for RoofPolygon {}

impl Hash for RoofPolygon {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.level.hash(state);
        self.inclination.hash(state);
        self.canonical_vertices().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn polygon_equality_ignores_vertex_order() {
        let first = RoofPolygon {
            level: 0,
            inclination: Inclination::North,
            vertices: vec![
                RoofVertex::new(0, 4, 0),
                RoofVertex::new(4, 4, 0),
                RoofVertex::new(2, 2, 2),
            ],
        };
        let mut second = first.clone();
        second.vertices.rotate_left(1);

        assert_eq!(first, second);
        let mut unique = HashSet::new();
        assert!(unique.insert(first));
        assert!(!unique.insert(second));
    }

    #[test]
    fn inclination_bits_are_distinct() {
        let combined = Inclination::ALL
            .iter()
            .fold(0u8, |bits, inclination| bits | inclination.bit());
        assert_eq!(combined, 0b1111);
        for inclination in Inclination::ALL {
            assert_eq!(
                Inclination::from_direction(inclination.direction()),
                inclination
            );
        }
    }
}

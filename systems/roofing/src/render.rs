//! Translation of roof facets into renderer space.

use glam::{Vec2, Vec3};
use township_core::{Inclination, RoofPolygon};

/// Half tiles per tile in roof vertex coordinates.
const HALF_TILES: f32 = 2.0;

/// Vertex of a facet ready for upload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderVertex {
    /// Position in tiles relative to the facet's minimum corner; `z` is the height.
    pub position: Vec3,
    /// Texture coordinate in tiles, oriented so the slope always runs along `v`.
    pub uv: Vec2,
}

/// Lays out `polygon` in renderer space.
///
/// Planar positions are shifted by `shear` tiles per tile of height so higher
/// vertices lean away from the viewer.
#[must_use]
pub fn render_vertices(polygon: &RoofPolygon, shear: f32) -> Vec<RenderVertex> {
    let (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) = (
        polygon.vertices.iter().map(|vertex| vertex.x).min(),
        polygon.vertices.iter().map(|vertex| vertex.y).min(),
        polygon.vertices.iter().map(|vertex| vertex.x).max(),
        polygon.vertices.iter().map(|vertex| vertex.y).max(),
    ) else {
        return Vec::new();
    };
    let span = Vec2::new(
        (max_x - min_x) as f32 / HALF_TILES,
        (max_y - min_y) as f32 / HALF_TILES,
    );

    polygon
        .vertices
        .iter()
        .map(|vertex| {
            let x = (vertex.x - min_x) as f32 / HALF_TILES;
            let y = (vertex.y - min_y) as f32 / HALF_TILES;
            let height = vertex.height as f32 / HALF_TILES;
            let uv = match polygon.inclination {
                Inclination::South => Vec2::new(x, y),
                Inclination::North => Vec2::new(x, span.y - y),
                Inclination::East => Vec2::new(y, x),
                Inclination::West => Vec2::new(y, span.x - x),
            };
            RenderVertex {
                position: Vec3::new(x + shear * height, y, height),
                uv,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use township_core::RoofVertex;

    use super::*;

    fn facet(inclination: Inclination) -> RoofPolygon {
        RoofPolygon {
            level: 0,
            inclination,
            vertices: vec![
                RoofVertex::new(10, 20, 0),
                RoofVertex::new(14, 20, 0),
                RoofVertex::new(12, 22, 2),
            ],
        }
    }

    #[test]
    fn positions_are_relative_to_the_minimum_corner() {
        let vertices = render_vertices(&facet(Inclination::South), 0.0);
        let positions: Vec<Vec3> = vertices.iter().map(|vertex| vertex.position).collect();
        assert_eq!(
            positions,
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 1.0)
            ]
        );
        assert_eq!(vertices[2].uv, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn shear_leans_with_height() {
        let vertices = render_vertices(&facet(Inclination::South), 0.5);
        assert_eq!(vertices[0].position.x, 0.0);
        assert_eq!(vertices[2].position.x, 1.5);
    }

    #[test]
    fn texture_axes_follow_the_inclination() {
        let north = render_vertices(&facet(Inclination::North), 0.0);
        assert_eq!(north[0].uv, Vec2::new(0.0, 1.0));
        let east = render_vertices(&facet(Inclination::East), 0.0);
        assert_eq!(east[1].uv, Vec2::new(0.0, 2.0));
        let west = render_vertices(&facet(Inclination::West), 0.0);
        assert_eq!(west[1].uv, Vec2::new(0.0, 0.0));
    }

    #[test]
    fn empty_facets_render_nothing() {
        let mut empty = facet(Inclination::South);
        empty.vertices.clear();
        assert!(render_vertices(&empty, 0.25).is_empty());
    }
}

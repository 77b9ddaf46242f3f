//! Turns a projected matrix into planar facets.

use std::collections::{BTreeSet, HashSet};

use township_core::{Inclination, RoofPolygon, RoofVertex};

use crate::matrix::{RoofMatrix, NEIGHBORS};

type Cell = (i32, i32);

/// Collects one polygon per connected inclination plane touching the eaves.
pub(crate) fn polygons(matrix: &RoofMatrix, level: i32) -> Vec<RoofPolygon> {
    let mut found = HashSet::new();
    for inclination in Inclination::ALL {
        let mut visited = BTreeSet::new();
        for seed in seeds(matrix, inclination) {
            if visited.contains(&seed) {
                continue;
            }
            let plane = plane(matrix, seed, inclination);
            let Some(start) = plane.iter().min_by_key(|(x, y)| (*y, *x)).copied() else {
                continue;
            };
            let corners = trace(&plane, start);
            visited.extend(plane);
            if corners.len() < 3 {
                continue;
            }
            let vertices = corners
                .into_iter()
                .map(|(x, y)| {
                    let height = matrix.cell(x, y).map_or(0, |cell| cell.height);
                    let (gx, gy) = matrix.global(x, y);
                    RoofVertex::new(gx, gy, height)
                })
                .collect();
            let _ = found.insert(RoofPolygon {
                level,
                inclination,
                vertices,
            });
        }
    }
    let mut polygons: Vec<RoofPolygon> = found.into_iter().collect();
    polygons.sort_by_cached_key(|polygon| (polygon.inclination, polygon.canonical_vertices()));
    polygons
}

/// Eave corners carrying `inclination`, in row-major order.
fn seeds(matrix: &RoofMatrix, inclination: Inclination) -> Vec<Cell> {
    let mut seeds = Vec::new();
    for y in 0..matrix.height() {
        for x in 0..matrix.width() {
            let Some(cell) = matrix.cell(x, y) else {
                continue;
            };
            if cell.roofable && cell.height == 0 && cell.shape.is_vertex() && cell.has(inclination) {
                seeds.push((x, y));
            }
        }
    }
    seeds
}

/// Eight-connected cells sharing `inclination` with `seed`.
fn plane(matrix: &RoofMatrix, seed: Cell, inclination: Inclination) -> BTreeSet<Cell> {
    let mut plane = BTreeSet::new();
    let mut stack = vec![seed];
    while let Some((x, y)) = stack.pop() {
        let carries = matrix
            .cell(x, y)
            .map_or(false, |cell| cell.roofable && cell.has(inclination));
        if !carries || !plane.insert((x, y)) {
            continue;
        }
        stack.extend(NEIGHBORS.iter().map(|(dx, dy)| (x + dx, y + dy)));
    }
    plane
}

/// Walks the outer boundary of `plane` clockwise and keeps the cells where
/// the walk turns.
fn trace(plane: &BTreeSet<Cell>, start: Cell) -> Vec<Cell> {
    let limit = plane.len() * NEIGHBORS.len() + NEIGHBORS.len();
    let mut path = vec![start];
    let mut current = start;
    // West of the top-left cell is never part of the plane.
    let mut backtrack = 6;
    let mut first_step = None;

    for _ in 0..limit {
        let Some(direction) = (1..=NEIGHBORS.len())
            .map(|turn| (backtrack + turn) % NEIGHBORS.len())
            .find(|direction| plane.contains(&step(current, *direction)))
        else {
            break;
        };
        if current == start {
            match first_step {
                Some(first) if first == direction => break,
                None => first_step = Some(direction),
                Some(_) => {}
            }
        }
        current = step(current, direction);
        backtrack = if direction % 2 == 0 {
            (direction + 6) % NEIGHBORS.len()
        } else {
            (direction + 5) % NEIGHBORS.len()
        };
        path.push(current);
    }

    corners(&path)
}

fn step((x, y): Cell, direction: usize) -> Cell {
    let (dx, dy) = NEIGHBORS[direction];
    (x + dx, y + dy)
}

/// Cells of a closed walk at which the heading changes.
fn corners(path: &[Cell]) -> Vec<Cell> {
    // The walk ends back on its first cell.
    let walk = match path.split_last() {
        Some((last, rest)) if rest.first() == Some(last) => rest,
        _ => path,
    };
    if walk.len() < 3 {
        return Vec::new();
    }
    let heading = |from: Cell, to: Cell| (to.0 - from.0, to.1 - from.1);
    let mut corners = Vec::new();
    for (index, cell) in walk.iter().enumerate() {
        let previous = walk[(index + walk.len() - 1) % walk.len()];
        let next = walk[(index + 1) % walk.len()];
        if heading(previous, *cell) != heading(*cell, next) && !corners.contains(cell) {
            corners.push(*cell);
        }
    }
    corners
}

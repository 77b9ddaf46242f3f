//! Half-tile height matrix the roof geometry is carved from.
//!
//! Tile `(tx, ty)` is centered on microtile `(2 * tx, 2 * ty)`. Filling a tile
//! marks the 3x3 block around its center (5x5 with eaves) as roofable, so the
//! roofable region is always an orthogonal polygon whose boundary cells can be
//! classified from their eight neighbors alone.

use township_core::{Direction, Inclination, TilePos};

use crate::RoofError;

/// Neighbor offsets in clockwise order starting from north.
pub(crate) const NEIGHBORS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Local shape of a roofable microtile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Shape {
    Interior,
    Side,
    ConvexCorner,
    ConcaveCorner,
    Junction,
}

impl Shape {
    pub(crate) const fn is_vertex(self) -> bool {
        matches!(
            self,
            Self::ConvexCorner | Self::ConcaveCorner | Self::Junction
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Microtile {
    pub(crate) roofable: bool,
    pub(crate) height: i32,
    pub(crate) inclinations: u8,
    pub(crate) shape: Shape,
}

impl Microtile {
    const EMPTY: Self = Self {
        roofable: false,
        height: 0,
        inclinations: 0,
        shape: Shape::Interior,
    };

    pub(crate) const fn has(&self, inclination: Inclination) -> bool {
        self.inclinations & inclination.bit() != 0
    }
}

/// Straight run of boundary microtiles between two vertices, projected inward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Border {
    start: (i32, i32),
    end: (i32, i32),
    start_versor: (i32, i32),
    end_versor: (i32, i32),
    heading: (i32, i32),
    inclination: Inclination,
}

/// Dense matrix of microtiles covering one roof level.
#[derive(Clone, Debug)]
pub(crate) struct RoofMatrix {
    origin: (i32, i32),
    width: i32,
    height: i32,
    ceiling: i32,
    cells: Vec<Microtile>,
}

impl RoofMatrix {
    /// Raises a flat tent over `tiles`, all of which share one level.
    pub(crate) fn fill(tiles: &[TilePos], eaves: bool) -> Result<Self, RoofError> {
        let margin = if eaves { 2 } else { 1 };
        let (Some(min_x), Some(max_x), Some(min_y), Some(max_y)) = (
            tiles.iter().map(|tile| tile.x).min(),
            tiles.iter().map(|tile| tile.x).max(),
            tiles.iter().map(|tile| tile.y).min(),
            tiles.iter().map(|tile| tile.y).max(),
        ) else {
            return Err(RoofError::EmptyFootprint);
        };
        let span = |low: i32, high: i32| {
            high.checked_sub(low)
                .and_then(|tiles| tiles.checked_mul(2))
                .and_then(|half| half.checked_add(2 * margin + 3))
                .ok_or(RoofError::FootprintTooLarge)
        };
        let width = span(min_x, max_x)?;
        let height = span(min_y, max_y)?;
        let count = usize::try_from(i64::from(width) * i64::from(height))
            .map_err(|_| RoofError::FootprintTooLarge)?;
        let ceiling = width.max(height);

        let mut matrix = Self {
            origin: (2 * min_x - margin - 1, 2 * min_y - margin - 1),
            width,
            height,
            ceiling,
            cells: vec![Microtile::EMPTY; count],
        };
        for tile in tiles {
            let (cx, cy) = matrix.local(2 * tile.x, 2 * tile.y);
            for dy in -margin..=margin {
                for dx in -margin..=margin {
                    if let Some(cell) = matrix.cell_mut(cx + dx, cy + dy) {
                        cell.roofable = true;
                        cell.height = ceiling;
                    }
                }
            }
        }
        Ok(matrix)
    }

    pub(crate) const fn width(&self) -> i32 {
        self.width
    }

    pub(crate) const fn height(&self) -> i32 {
        self.height
    }

    pub(crate) const fn local(&self, x: i32, y: i32) -> (i32, i32) {
        (x - self.origin.0, y - self.origin.1)
    }

    /// Half-tile coordinates of a local cell.
    pub(crate) const fn global(&self, x: i32, y: i32) -> (i32, i32) {
        (x + self.origin.0, y + self.origin.1)
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        usize::try_from(y * self.width + x).ok()
    }

    pub(crate) fn cell(&self, x: i32, y: i32) -> Option<&Microtile> {
        self.index(x, y).and_then(|index| self.cells.get(index))
    }

    fn cell_mut(&mut self, x: i32, y: i32) -> Option<&mut Microtile> {
        self.index(x, y).and_then(move |index| self.cells.get_mut(index))
    }

    pub(crate) fn is_roofable(&self, x: i32, y: i32) -> bool {
        self.cell(x, y).map_or(false, |cell| cell.roofable)
    }

    /// Bitmask of the neighbors that are not roofable, bit `i` for `NEIGHBORS[i]`.
    fn missing_mask(&self, x: i32, y: i32) -> u8 {
        NEIGHBORS
            .iter()
            .enumerate()
            .filter(|(_, (dx, dy))| !self.is_roofable(x + dx, y + dy))
            .fold(0, |mask, (bit, _)| mask | 1 << bit)
    }

    /// Classifies every roofable microtile by its neighborhood.
    pub(crate) fn classify(&mut self) -> Result<(), RoofError> {
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.is_roofable(x, y) {
                    continue;
                }
                let missing = self.missing_mask(x, y);
                let shape = shape_of(missing).ok_or_else(|| {
                    let (gx, gy) = self.global(x, y);
                    RoofError::UnexpectedTopology {
                        x: gx,
                        y: gy,
                        missing,
                    }
                })?;
                if let Some(cell) = self.cell_mut(x, y) {
                    cell.shape = shape;
                }
            }
        }
        Ok(())
    }

    fn on_side(&self, x: i32, y: i32, side: Direction) -> bool {
        let (dx, dy) = side.offset();
        self.is_roofable(x, y) && !self.is_roofable(x + dx, y + dy)
    }

    fn shape(&self, x: i32, y: i32) -> Option<Shape> {
        self.cell(x, y).filter(|cell| cell.roofable).map(|cell| cell.shape)
    }

    /// Splits the perimeter into borders running between consecutive vertices.
    pub(crate) fn borders(&self) -> Result<Vec<Border>, RoofError> {
        let mut borders = Vec::new();
        for side in Direction::ALL {
            let heading = side.right().offset();
            let (nx, ny) = side.opposite().offset();
            let inclination = Inclination::from_direction(side.opposite());
            for y in 0..self.height {
                for x in 0..self.width {
                    let first = self.on_side(x, y, side)
                        && !self.on_side(x - heading.0, y - heading.1, side);
                    if !first {
                        continue;
                    }
                    let mut last = (x, y);
                    while self.on_side(last.0 + heading.0, last.1 + heading.1, side) {
                        last = (last.0 + heading.0, last.1 + heading.1);
                    }
                    let before = (x - heading.0, y - heading.1);
                    let after = (last.0 + heading.0, last.1 + heading.1);
                    let (start, start_convex) = self.endpoint((x, y), before)?;
                    let (end, end_convex) = self.endpoint(last, after)?;
                    let along = |convex: bool, sign: i32| {
                        let sign = if convex { sign } else { -sign };
                        (nx + sign * heading.0, ny + sign * heading.1)
                    };
                    borders.push(Border {
                        start,
                        end,
                        start_versor: along(start_convex, 1),
                        end_versor: along(end_convex, -1),
                        heading,
                        inclination,
                    });
                }
            }
        }
        Ok(borders)
    }

    /// Resolves a run end: the run cell itself when it turns convexly, or the
    /// concave vertex right past it.
    fn endpoint(&self, cell: (i32, i32), past: (i32, i32)) -> Result<((i32, i32), bool), RoofError> {
        if self.shape(cell.0, cell.1) == Some(Shape::ConvexCorner) {
            return Ok((cell, true));
        }
        match self.shape(past.0, past.1) {
            Some(Shape::ConcaveCorner | Shape::Junction) => Ok((past, false)),
            _ => {
                let (x, y) = self.global(cell.0, cell.1);
                Err(RoofError::UnexpectedTopology {
                    x,
                    y,
                    missing: self.missing_mask(cell.0, cell.1),
                })
            }
        }
    }

    /// Lowers the cell to `height`, or adds `inclination` when it already sits there.
    pub(crate) fn update(&mut self, x: i32, y: i32, height: i32, inclination: Inclination) {
        let Some(cell) = self.cell_mut(x, y) else {
            return;
        };
        if !cell.roofable {
            return;
        }
        if height < cell.height {
            cell.height = height;
            cell.inclinations = inclination.bit();
        } else if height == cell.height {
            cell.inclinations |= inclination.bit();
        }
    }

    /// Projects every border diagonally inward, one height step at a time.
    pub(crate) fn project(&mut self, borders: &[Border]) {
        let limit = self.ceiling / 2 + 1;
        for border in borders {
            for step in 0..=limit {
                let from = (
                    border.start.0 + border.start_versor.0 * step,
                    border.start.1 + border.start_versor.1 * step,
                );
                let to = (
                    border.end.0 + border.end_versor.0 * step,
                    border.end.1 + border.end_versor.1 * step,
                );
                let length = (to.0 - from.0) * border.heading.0 + (to.1 - from.1) * border.heading.1;
                if length < 0 {
                    break;
                }
                for offset in 0..=length {
                    self.update(
                        from.0 + border.heading.0 * offset,
                        from.1 + border.heading.1 * offset,
                        step,
                        border.inclination,
                    );
                }
            }
        }
    }

    /// Drops stray inclinations that no two consecutive neighbors share.
    pub(crate) fn prune_inclinations(&mut self) {
        let mut pruned = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let Some(cell) = self.cell(x, y) else {
                    continue;
                };
                if !cell.roofable || cell.inclinations.count_ones() < 2 {
                    continue;
                }
                let kept = Inclination::ALL
                    .iter()
                    .filter(|inclination| cell.has(**inclination))
                    .filter(|inclination| self.supported(x, y, **inclination))
                    .fold(0u8, |mask, inclination| mask | inclination.bit());
                if kept != 0 && kept != cell.inclinations {
                    pruned.push((x, y, kept));
                }
            }
        }
        for (x, y, kept) in pruned {
            if let Some(cell) = self.cell_mut(x, y) {
                cell.inclinations = kept;
            }
        }
    }

    fn supported(&self, x: i32, y: i32, inclination: Inclination) -> bool {
        let shares = |index: usize| {
            let (dx, dy) = NEIGHBORS[index % NEIGHBORS.len()];
            self.cell(x + dx, y + dy)
                .map_or(false, |cell| cell.roofable && cell.has(inclination))
        };
        (0..NEIGHBORS.len()).any(|index| shares(index) && shares(index + 1))
    }
}

/// Matches a missing-neighbor mask against the known boundary patterns.
fn shape_of(missing: u8) -> Option<Shape> {
    const ORTHOGONAL: u8 = 0b0101_0101;
    let orthogonal = missing & ORTHOGONAL;
    let diagonal = missing & !ORTHOGONAL;
    match orthogonal.count_ones() {
        0 => match diagonal {
            0 => Some(Shape::Interior),
            0b0000_0010 | 0b0000_1000 | 0b0010_0000 | 0b1000_0000 => Some(Shape::ConcaveCorner),
            0b0010_0010 | 0b1000_1000 => Some(Shape::Junction),
            _ => None,
        },
        1 => Some(Shape::Side),
        2 => match orthogonal {
            0b0000_0101 | 0b0001_0100 | 0b0101_0000 | 0b0100_0001 => Some(Shape::ConvexCorner),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn tile(x: i32, y: i32) -> TilePos {
        TilePos::new(x, y, 0)
    }

    fn square(side: i32) -> Vec<TilePos> {
        (0..side)
            .flat_map(|y| (0..side).map(move |x| tile(x, y)))
            .collect()
    }

    fn carve(tiles: &[TilePos], eaves: bool) -> RoofMatrix {
        let mut matrix = RoofMatrix::fill(tiles, eaves).expect("fill");
        matrix.classify().expect("classify");
        let borders = matrix.borders().expect("borders");
        matrix.project(&borders);
        matrix
    }

    /// Chebyshev distance to the nearest non-roofable microtile, minus one.
    fn expected_height(matrix: &RoofMatrix, x: i32, y: i32) -> i32 {
        let mut best = i32::MAX;
        for oy in 0..matrix.height() {
            for ox in 0..matrix.width() {
                if !matrix.is_roofable(ox, oy) {
                    best = best.min((ox - x).abs().max((oy - y).abs()));
                }
            }
        }
        best - 1
    }

    #[test]
    fn masks_map_onto_the_closed_pattern_set() {
        assert_eq!(shape_of(0), Some(Shape::Interior));
        assert_eq!(shape_of(0b0000_0001), Some(Shape::Side), "one-cell notch");
        assert_eq!(shape_of(0b1000_0011), Some(Shape::Side));
        assert_eq!(shape_of(0b1100_0001 | 0b0000_0011), Some(Shape::ConvexCorner));
        assert_eq!(shape_of(0b0000_1000), Some(Shape::ConcaveCorner));
        assert_eq!(shape_of(0b1000_1000), Some(Shape::Junction));
        assert_eq!(shape_of(0b0001_0001), None, "opposite sides form a sliver");
        assert_eq!(shape_of(0b0000_1010), None);
    }

    #[test]
    fn corner_microtiles_of_a_tile_are_convex() {
        let mut matrix = RoofMatrix::fill(&[tile(3, 3)], false).expect("fill");
        matrix.classify().expect("classify");
        let (x, y) = matrix.local(5, 5);
        assert_eq!(matrix.shape(x, y), Some(Shape::ConvexCorner));
        let (x, y) = matrix.local(6, 5);
        assert_eq!(matrix.shape(x, y), Some(Shape::Side));
        let (x, y) = matrix.local(6, 6);
        assert_eq!(matrix.shape(x, y), Some(Shape::Interior));
    }

    #[test]
    fn diagonal_neighbors_meet_at_a_junction() {
        let mut matrix = RoofMatrix::fill(&[tile(0, 0), tile(1, -1)], false).expect("fill");
        matrix.classify().expect("classify");
        let (x, y) = matrix.local(1, -1);
        assert_eq!(matrix.shape(x, y), Some(Shape::Junction));
        assert!(matrix.borders().is_ok());
    }

    #[test]
    fn updates_never_raise_a_cell() {
        let mut matrix = RoofMatrix::fill(&square(4), false).expect("fill");
        let mut rng = ChaCha8Rng::seed_from_u64(0x500f);
        let (x, y) = matrix.local(3, 3);
        let mut previous = matrix.cell(x, y).map(|cell| cell.height).expect("cell");
        for _ in 0..256 {
            let height = rng.gen_range(0..12);
            let inclination = Inclination::ALL[rng.gen_range(0..4)];
            let before = *matrix.cell(x, y).expect("cell");
            matrix.update(x, y, height, inclination);
            let after = *matrix.cell(x, y).expect("cell");
            assert!(after.height <= previous);
            if height == before.height {
                assert_eq!(after.inclinations, before.inclinations | inclination.bit());
            }
            if height < before.height {
                assert_eq!(after.inclinations, inclination.bit());
            }
            previous = after.height;
        }
    }

    #[test]
    fn projected_heights_follow_the_distance_to_the_eaves() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
        for round in 0..24 {
            let tiles: Vec<TilePos> = (0..6)
                .flat_map(|y| (0..6).map(move |x| tile(x, y)))
                .filter(|_| rng.gen_bool(0.6))
                .collect();
            if tiles.is_empty() {
                continue;
            }
            let matrix = carve(&tiles, round % 2 == 1);
            for y in 0..matrix.height() {
                for x in 0..matrix.width() {
                    let Some(cell) = matrix.cell(x, y).filter(|cell| cell.roofable) else {
                        continue;
                    };
                    assert_eq!(cell.height, expected_height(&matrix, x, y), "cell {x},{y}");
                    assert_ne!(cell.inclinations, 0, "cell {x},{y} has a slope");
                }
            }
        }
    }
}

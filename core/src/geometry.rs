//! Integer tile geometry: positions, directions and rectangular volumes.

use serde::{Deserialize, Serialize};

/// Cardinal directions on the tile plane. Rows grow toward the south.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Toward decreasing `y`.
    North,
    /// Toward increasing `x`.
    East,
    /// Toward increasing `y`.
    South,
    /// Toward decreasing `x`.
    West,
}

impl Direction {
    /// All directions in clockwise order starting from north.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit offset `(dx, dy)` of the direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    /// Direction after a quarter turn counter-clockwise.
    #[must_use]
    pub const fn left(self) -> Self {
        match self {
            Self::North => Self::West,
            Self::East => Self::North,
            Self::South => Self::East,
            Self::West => Self::South,
        }
    }

    /// Direction after a quarter turn clockwise.
    #[must_use]
    pub const fn right(self) -> Self {
        match self {
            Self::North => Self::East,
            Self::East => Self::South,
            Self::South => Self::West,
            Self::West => Self::North,
        }
    }

    /// Opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    /// Reports whether the direction runs along the `x` axis.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Self::East | Self::West)
    }

    /// Direction of a unit step between two orthogonally adjacent coordinates.
    #[must_use]
    pub fn between(from: TilePos, to: TilePos) -> Option<Self> {
        match (to.x - from.x, to.y - from.y) {
            (0, -1) => Some(Self::North),
            (1, 0) => Some(Self::East),
            (0, 1) => Some(Self::South),
            (-1, 0) => Some(Self::West),
            _ => None,
        }
    }
}

/// Integer tile coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Level.
    pub z: i32,
}

impl TilePos {
    /// Creates a new tile position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Position `distance` tiles away in `direction` on the same level.
    #[must_use]
    pub const fn step(self, direction: Direction, distance: i32) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx * distance, self.y + dy * distance, self.z)
    }

    /// Orthogonal neighbor in `direction`.
    #[must_use]
    pub const fn neighbor(self, direction: Direction) -> Self {
        self.step(direction, 1)
    }

    /// Position shifted by a planar offset.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z)
    }

    /// Planar Manhattan distance.
    #[must_use]
    pub fn manhattan_distance(self, other: TilePos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// Planar extent of an area: distance between its opposite border lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dims {
    /// Extent along `x`.
    pub x: i32,
    /// Extent along `y`.
    pub y: i32,
}

impl Dims {
    /// Creates a new extent.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Extent with the axes swapped.
    #[must_use]
    pub const fn rotated(self) -> Self {
        Self::new(self.y, self.x)
    }
}

/// Size of the tile grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Number of levels.
    pub depth: u32,
}

impl GridSize {
    /// Creates a new grid size.
    #[must_use]
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Reports whether the position lies inside the grid.
    #[must_use]
    pub fn contains(&self, position: TilePos) -> bool {
        position.x >= 0
            && position.y >= 0
            && position.z >= 0
            && (position.x as u32) < self.width
            && (position.y as u32) < self.height
            && (position.z as u32) < self.depth
    }
}

/// One-tile-high rectangular volume with inclusive bounds.
///
/// A volume at `origin` with extent `(lx, ly)` covers columns
/// `origin.x ..= origin.x + lx` and rows `origin.y ..= origin.y + ly`. Its
/// outermost ring is the border; everything strictly inside is the inner volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Volume {
    /// Minimum corner.
    pub origin: TilePos,
    /// Planar extent.
    pub dims: Dims,
}

impl Volume {
    /// Creates a new volume.
    #[must_use]
    pub const fn new(origin: TilePos, dims: Dims) -> Self {
        Self { origin, dims }
    }

    /// Smallest column covered.
    #[must_use]
    pub const fn min_x(&self) -> i32 {
        self.origin.x
    }

    /// Largest column covered.
    #[must_use]
    pub const fn max_x(&self) -> i32 {
        self.origin.x + self.dims.x
    }

    /// Smallest row covered.
    #[must_use]
    pub const fn min_y(&self) -> i32 {
        self.origin.y
    }

    /// Largest row covered.
    #[must_use]
    pub const fn max_y(&self) -> i32 {
        self.origin.y + self.dims.y
    }

    /// Level of the volume.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.origin.z
    }

    /// Reports whether the position lies inside the volume, border included.
    #[must_use]
    pub const fn contains(&self, position: TilePos) -> bool {
        position.z == self.origin.z
            && position.x >= self.min_x()
            && position.x <= self.max_x()
            && position.y >= self.min_y()
            && position.y <= self.max_y()
    }

    /// Reports whether the position lies on the border ring.
    #[must_use]
    pub const fn on_ring(&self, position: TilePos) -> bool {
        self.contains(position)
            && (position.x == self.min_x()
                || position.x == self.max_x()
                || position.y == self.min_y()
                || position.y == self.max_y())
    }

    /// Reports whether the position is one of the four ring corners.
    #[must_use]
    pub const fn is_corner(&self, position: TilePos) -> bool {
        self.contains(position)
            && (position.x == self.min_x() || position.x == self.max_x())
            && (position.y == self.min_y() || position.y == self.max_y())
    }

    /// Ring side the position lies on, `None` for corners and off-ring tiles.
    #[must_use]
    pub fn side_of(&self, position: TilePos) -> Option<Direction> {
        if !self.on_ring(position) || self.is_corner(position) {
            return None;
        }
        if position.y == self.min_y() {
            Some(Direction::North)
        } else if position.x == self.max_x() {
            Some(Direction::East)
        } else if position.y == self.max_y() {
            Some(Direction::South)
        } else {
            Some(Direction::West)
        }
    }

    /// Volume shrunk by one tile on every planar side.
    #[must_use]
    pub const fn inner(&self) -> Option<Volume> {
        if self.dims.x < 2 || self.dims.y < 2 {
            return None;
        }
        Some(Volume::new(
            self.origin.offset(1, 1),
            Dims::new(self.dims.x - 2, self.dims.y - 2),
        ))
    }

    /// Volume grown by `margin` tiles on every planar side.
    #[must_use]
    pub const fn expanded(&self, margin: i32) -> Volume {
        Volume::new(
            self.origin.offset(-margin, -margin),
            Dims::new(self.dims.x + 2 * margin, self.dims.y + 2 * margin),
        )
    }

    /// Like [`Volume::expanded`], but `None` when any bound of the grown volume
    /// leaves the `i32` range.
    #[must_use]
    pub fn checked_expanded(&self, margin: i32) -> Option<Volume> {
        let min_x = self.origin.x.checked_sub(margin)?;
        let min_y = self.origin.y.checked_sub(margin)?;
        let grow = margin.checked_mul(2)?;
        let dims = Dims::new(self.dims.x.checked_add(grow)?, self.dims.y.checked_add(grow)?);
        let _ = min_x.checked_add(dims.x)?;
        let _ = min_y.checked_add(dims.y)?;
        Some(Volume::new(TilePos::new(min_x, min_y, self.origin.z), dims))
    }

    /// Reports whether two volumes share at least one tile.
    #[must_use]
    pub const fn intersects(&self, other: &Volume) -> bool {
        self.origin.z == other.origin.z
            && self.min_x() <= other.max_x()
            && other.min_x() <= self.max_x()
            && self.min_y() <= other.max_y()
            && other.min_y() <= self.max_y()
    }

    /// Reports whether the inner volumes of both volumes overlap.
    #[must_use]
    pub fn inner_intersects(&self, other: &Volume) -> bool {
        match (self.inner(), other.inner()) {
            (Some(a), Some(b)) => a.intersects(&b),
            _ => false,
        }
    }

    /// Straight run of tiles shared by both footprints, as `(start, direction, length)`.
    ///
    /// Two volumes share a run when they overlap on a single line; `length` is the
    /// distance between the run's end tiles.
    #[must_use]
    pub fn shared_run(&self, other: &Volume) -> Option<(TilePos, Direction, i32)> {
        if !self.intersects(other) {
            return None;
        }
        let x0 = self.min_x().max(other.min_x());
        let x1 = self.max_x().min(other.max_x());
        let y0 = self.min_y().max(other.min_y());
        let y1 = self.max_y().min(other.max_y());
        let start = TilePos::new(x0, y0, self.origin.z);
        if x0 == x1 && y1 > y0 {
            Some((start, Direction::South, y1 - y0))
        } else if y0 == y1 && x1 > x0 {
            Some((start, Direction::East, x1 - x0))
        } else {
            None
        }
    }

    /// Number of tiles along the run shared with `other`, zero when none.
    #[must_use]
    pub fn shared_run_tiles(&self, other: &Volume) -> i32 {
        self.shared_run(other)
            .map_or(0, |(_, _, length)| length + 1)
    }

    /// Surface used for block capacity accounting.
    #[must_use]
    pub const fn surface(&self) -> i64 {
        self.dims.x as i64 * self.dims.y as i64
    }

    /// Planar center in tile units.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            f64::from(self.origin.x) + f64::from(self.dims.x) / 2.0,
            f64::from(self.origin.y) + f64::from(self.dims.y) / 2.0,
        )
    }

    /// Corners in clockwise order starting at the minimum corner.
    #[must_use]
    pub const fn corners(&self) -> [TilePos; 4] {
        let z = self.origin.z;
        [
            TilePos::new(self.min_x(), self.min_y(), z),
            TilePos::new(self.max_x(), self.min_y(), z),
            TilePos::new(self.max_x(), self.max_y(), z),
            TilePos::new(self.min_x(), self.max_y(), z),
        ]
    }

    /// Every tile of the volume in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = TilePos> {
        let volume = *self;
        (volume.min_y()..=volume.max_y()).flat_map(move |y| {
            (volume.min_x()..=volume.max_x()).map(move |x| TilePos::new(x, y, volume.z()))
        })
    }

    /// Border ring tiles, each visited once, clockwise from the minimum corner.
    pub fn ring(&self) -> impl Iterator<Item = TilePos> {
        let volume = *self;
        Direction::ALL
            .into_iter()
            .flat_map(move |side| volume.side_tiles(side).skip(1))
    }

    /// Tiles of one ring side ordered clockwise, both corners included.
    pub fn side_tiles(&self, side: Direction) -> impl Iterator<Item = TilePos> {
        let [north_west, north_east, south_east, south_west] = self.corners();
        let (start, direction, length) = match side {
            Direction::North => (north_west, Direction::East, self.dims.x),
            Direction::East => (north_east, Direction::South, self.dims.y),
            Direction::South => (south_east, Direction::West, self.dims.x),
            Direction::West => (south_west, Direction::North, self.dims.y),
        };
        (0..=length.max(0)).map(move |step| start.step(direction, step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_at(x: i32, y: i32) -> Volume {
        Volume::new(TilePos::new(x, y, 0), Dims::new(10, 10))
    }

    #[test]
    fn ring_visits_each_border_tile_once() {
        let volume = field_at(30, 30);
        let ring: Vec<TilePos> = volume.ring().collect();
        assert_eq!(ring.len(), 40);
        let mut unique = ring.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ring.len());
        assert!(ring.iter().all(|tile| volume.on_ring(*tile)));
    }

    #[test]
    fn checked_expansion_refuses_overflowing_bounds() {
        assert_eq!(field_at(30, 30).checked_expanded(2), Some(field_at(30, 30).expanded(2)));
        let huge = Volume::new(TilePos::new(10, 10, 0), Dims::new(i32::MAX - 5, 5));
        assert_eq!(huge.checked_expanded(0), None);
        assert_eq!(field_at(i32::MIN, 0).checked_expanded(1), None);
    }

    #[test]
    fn inner_volume_is_shrunk_by_one() {
        let inner = field_at(30, 30).inner().expect("inner volume");
        assert_eq!(inner.min_x(), 31);
        assert_eq!(inner.max_x(), 39);
        assert_eq!(inner.min_y(), 31);
        assert_eq!(inner.max_y(), 39);
    }

    #[test]
    fn adjacent_fields_share_a_run_of_ten() {
        let west = field_at(30, 30);
        let east = field_at(40, 30);
        let (start, direction, length) = west.shared_run(&east).expect("shared run");
        assert_eq!(start, TilePos::new(40, 30, 0));
        assert_eq!(direction, Direction::South);
        assert_eq!(length, 10);
        assert!(!west.inner_intersects(&east));
    }

    #[test]
    fn overlapping_volumes_do_not_form_a_run() {
        let a = field_at(30, 30);
        let b = field_at(35, 35);
        assert!(a.shared_run(&b).is_none());
        assert!(a.inner_intersects(&b));
    }

    #[test]
    fn side_of_ignores_corners() {
        let volume = field_at(0, 0);
        assert_eq!(volume.side_of(TilePos::new(0, 0, 0)), None);
        assert_eq!(volume.side_of(TilePos::new(5, 0, 0)), Some(Direction::North));
        assert_eq!(volume.side_of(TilePos::new(10, 4, 0)), Some(Direction::East));
        assert_eq!(volume.side_of(TilePos::new(3, 10, 0)), Some(Direction::South));
        assert_eq!(volume.side_of(TilePos::new(0, 7, 0)), Some(Direction::West));
        assert_eq!(volume.side_of(TilePos::new(5, 5, 0)), None);
    }

    #[test]
    fn turning_left_then_right_restores_direction() {
        for direction in Direction::ALL {
            assert_eq!(direction.left().right(), direction);
            assert_eq!(direction.opposite().opposite(), direction);
        }
    }
}

//! Boundary tracing between built and unbuilt tiles.
//!
//! The tracer walks edges of the built region keeping the unbuilt side on its
//! left. Each step looks at the tile ahead and the tile diagonally ahead on the
//! free side: an occupied diagonal folds the boundary toward the free side
//! (concave corner), an occupied tile ahead continues straight, and anything
//! else turns around the current tile (convex corner). Built tiles are treated
//! as 8-connected, unbuilt tiles as 4-connected, so every walk closes.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use township_core::{Direction, TilePos};

/// Difference between convex and concave corner counts of any closed outline.
pub const CORNER_BALANCE: u32 = 4;

/// Invariant violations detected while tracing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum OutlineError {
    /// The corner counts of a closed walk do not differ by four.
    #[error("outline starting at {start:?} has {convex} convex and {concave} concave corners")]
    AngleMismatch {
        /// Tile the walk started from.
        start: TilePos,
        /// Convex corners counted.
        convex: u32,
        /// Concave corners counted.
        concave: u32,
    },
    /// The walk did not return to its start within the step limit.
    #[error("outline starting at {start:?} did not close")]
    Unterminated {
        /// Tile the walk started from.
        start: TilePos,
    },
}

/// Straight run of outline tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutlineSegment {
    /// First tile of the run.
    pub start: TilePos,
    /// Direction the run extends toward.
    pub direction: Direction,
    /// Number of steps between the first and last tile.
    pub length: i32,
}

impl OutlineSegment {
    /// Last tile of the run.
    #[must_use]
    pub const fn end(&self) -> TilePos {
        self.start.step(self.direction, self.length)
    }
}

/// Closed boundary between built and unbuilt tiles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockOutline {
    segments: Vec<OutlineSegment>,
    convex: u32,
    concave: u32,
    doors: Vec<TilePos>,
    tiles: BTreeSet<TilePos>,
}

impl BlockOutline {
    /// Straight runs in walking order.
    #[must_use]
    pub fn segments(&self) -> &[OutlineSegment] {
        &self.segments
    }

    /// Number of corners bulging toward the unbuilt side.
    #[must_use]
    pub const fn convex_count(&self) -> u32 {
        self.convex
    }

    /// Number of corners folding toward the built side.
    #[must_use]
    pub const fn concave_count(&self) -> u32 {
        self.concave
    }

    /// Door tiles lying on the outline.
    #[must_use]
    pub fn doors(&self) -> &[TilePos] {
        &self.doors
    }

    /// Built tiles with an edge on the outline.
    #[must_use]
    pub fn tiles(&self) -> &BTreeSet<TilePos> {
        &self.tiles
    }

    /// Reports whether the outline encloses an unbuilt courtyard.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        self.concave > self.convex
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Edge {
    position: TilePos,
    side: Direction,
}

enum Turn {
    Concave,
    Straight,
    Convex,
}

impl Edge {
    const fn heading(self) -> Direction {
        self.side.right()
    }

    fn lookahead<O>(self, occupied: &O) -> Turn
    where
        O: Fn(TilePos) -> bool,
    {
        let front = self.position.neighbor(self.heading());
        if occupied(front.neighbor(self.side)) {
            Turn::Concave
        } else if occupied(front) {
            Turn::Straight
        } else {
            Turn::Convex
        }
    }
}

/// Traces every outline passing along the candidate tiles.
///
/// `occupied` decides which tiles count as built; `has_door` reports door tiles
/// to collect. A walk starts from each boundary edge of a candidate tile that no
/// earlier walk consumed, so every outline is reported once. `step_limit`
/// bounds a single walk.
pub fn compute_outlines<I, O, D>(
    candidates: I,
    occupied: O,
    has_door: D,
    step_limit: usize,
) -> Result<Vec<BlockOutline>, OutlineError>
where
    I: IntoIterator<Item = TilePos>,
    O: Fn(TilePos) -> bool,
    D: Fn(TilePos) -> bool,
{
    let mut visited: HashSet<Edge> = HashSet::new();
    let mut outlines = Vec::new();
    for position in candidates {
        if !occupied(position) {
            continue;
        }
        for side in Direction::ALL {
            let edge = Edge { position, side };
            if occupied(position.neighbor(side)) || visited.contains(&edge) {
                continue;
            }
            outlines.push(trace(edge, &occupied, &has_door, step_limit, &mut visited)?);
        }
    }
    Ok(outlines)
}

fn trace<O, D>(
    start: Edge,
    occupied: &O,
    has_door: &D,
    step_limit: usize,
    visited: &mut HashSet<Edge>,
) -> Result<BlockOutline, OutlineError>
where
    O: Fn(TilePos) -> bool,
    D: Fn(TilePos) -> bool,
{
    let mut segments = Vec::new();
    let mut tiles = BTreeSet::new();
    let mut doors = BTreeSet::new();
    let mut convex = 0u32;
    let mut concave = 0u32;
    let mut current = OutlineSegment {
        start: start.position,
        direction: start.heading(),
        length: 0,
    };
    let mut edge = start;
    let mut steps = 0usize;

    loop {
        let _ = visited.insert(edge);
        let _ = tiles.insert(edge.position);
        if has_door(edge.position) {
            let _ = doors.insert(edge.position);
        }

        let heading = edge.heading();
        let front = edge.position.neighbor(heading);
        match edge.lookahead(occupied) {
            Turn::Concave => {
                concave += 1;
                current.length += 1;
                segments.push(current);
                current = OutlineSegment {
                    start: front,
                    direction: edge.side,
                    length: 1,
                };
                edge = Edge {
                    position: front.neighbor(edge.side),
                    side: heading.opposite(),
                };
            }
            Turn::Straight => {
                current.length += 1;
                edge.position = front;
            }
            Turn::Convex => {
                convex += 1;
                segments.push(current);
                current = OutlineSegment {
                    start: edge.position,
                    direction: heading.right(),
                    length: 0,
                };
                edge.side = heading;
            }
        }

        if edge == start {
            break;
        }
        steps += 1;
        if steps > step_limit {
            return Err(OutlineError::Unterminated {
                start: start.position,
            });
        }
    }
    segments.push(current);

    if convex.abs_diff(concave) != CORNER_BALANCE {
        return Err(OutlineError::AngleMismatch {
            start: start.position,
            convex,
            concave,
        });
    }

    Ok(BlockOutline {
        segments: merge_segments(segments),
        convex,
        concave,
        doors: doors.into_iter().collect(),
        tiles,
    })
}

fn merge_segments(segments: Vec<OutlineSegment>) -> Vec<OutlineSegment> {
    let mut merged: Vec<OutlineSegment> = segments
        .into_iter()
        .filter(|segment| segment.length > 0)
        .collect();
    if merged.len() > 1 {
        let first = merged[0];
        let last = merged[merged.len() - 1];
        if last.direction == first.direction && last.end() == first.start {
            merged[0] = OutlineSegment {
                start: last.start,
                direction: first.direction,
                length: last.length + first.length,
            };
            let _ = merged.pop();
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use township_core::{Dims, Volume};

    use super::*;

    fn volume(x: i32, y: i32, lx: i32, ly: i32) -> Volume {
        Volume::new(TilePos::new(x, y, 0), Dims::new(lx, ly))
    }

    fn ring_tiles(volumes: &[Volume]) -> Vec<TilePos> {
        volumes.iter().flat_map(Volume::ring).collect()
    }

    #[test]
    fn two_adjacent_fields_form_one_rectangle() {
        let volumes = [volume(30, 30, 10, 10), volume(40, 30, 10, 10)];
        let outlines = compute_outlines(
            ring_tiles(&volumes),
            |tile| volumes.iter().any(|volume| volume.contains(tile)),
            |_| false,
            10_000,
        )
        .expect("outlines");

        assert_eq!(outlines.len(), 1, "both fields share one boundary");
        let outline = &outlines[0];
        assert!(!outline.is_internal());
        assert_eq!(outline.convex_count(), 4);
        assert_eq!(outline.concave_count(), 0);
        let mut lengths: Vec<i32> = outline.segments().iter().map(|s| s.length).collect();
        lengths.sort_unstable();
        assert_eq!(lengths, vec![10, 10, 20, 20]);
    }

    #[test]
    fn enclosed_courtyard_produces_an_internal_outline() {
        let frame = [
            volume(0, 0, 20, 5),
            volume(0, 15, 20, 5),
            volume(0, 5, 5, 10),
            volume(15, 5, 5, 10),
        ];
        let door = TilePos::new(10, 5, 0);
        let outlines = compute_outlines(
            ring_tiles(&frame),
            |tile| frame.iter().any(|volume| volume.contains(tile)),
            |tile| tile == door,
            10_000,
        )
        .expect("outlines");

        assert_eq!(outlines.len(), 2);
        let internal: Vec<&BlockOutline> = outlines.iter().filter(|o| o.is_internal()).collect();
        assert_eq!(internal.len(), 1);
        assert_eq!(internal[0].concave_count(), 4);
        assert_eq!(internal[0].convex_count(), 0);
        assert_eq!(internal[0].doors(), &[door]);
        assert!(internal[0].tiles().contains(&TilePos::new(5, 10, 0)));
    }

    #[test]
    fn l_shape_has_one_concave_corner() {
        let shape = [volume(0, 0, 10, 4), volume(0, 4, 4, 6)];
        let outlines = compute_outlines(
            ring_tiles(&shape),
            |tile| shape.iter().any(|volume| volume.contains(tile)),
            |_| false,
            10_000,
        )
        .expect("outlines");
        assert_eq!(outlines.len(), 1);
        assert_eq!(outlines[0].convex_count(), 5);
        assert_eq!(outlines[0].concave_count(), 1);
        assert_eq!(outlines[0].segments().len(), 6);
    }

    #[test]
    fn random_patterns_keep_the_corner_balance() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x07_1e);
        for _ in 0..64 {
            let width = 12;
            let height = 12;
            let mut built = BTreeSet::new();
            for y in 0..height {
                for x in 0..width {
                    if rng.gen_bool(0.45) {
                        let _ = built.insert(TilePos::new(x, y, 0));
                    }
                }
            }
            let candidates: Vec<TilePos> = built.iter().copied().collect();
            let outlines = compute_outlines(
                candidates,
                |tile| built.contains(&tile),
                |_| false,
                10_000,
            )
            .expect("random patterns always close");

            for outline in &outlines {
                assert_eq!(
                    outline.convex_count().abs_diff(outline.concave_count()),
                    CORNER_BALANCE
                );
            }
            let covered: BTreeSet<TilePos> = outlines
                .iter()
                .flat_map(|outline| outline.tiles().iter().copied())
                .collect();
            for tile in &built {
                let exposed = Direction::ALL
                    .iter()
                    .any(|side| !built.contains(&tile.neighbor(*side)));
                if exposed {
                    assert!(covered.contains(tile), "every exposed tile lies on an outline");
                }
            }
        }
    }

    #[test]
    fn step_limit_reports_unterminated_walks() {
        let field = volume(0, 0, 10, 10);
        let result = compute_outlines(
            field.ring(),
            |tile| field.contains(tile),
            |_| false,
            5,
        );
        assert!(matches!(result, Err(OutlineError::Unterminated { .. })));
    }
}

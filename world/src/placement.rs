//! Decides whether a rectangular area can be committed at a position.
//!
//! The checks run in a fixed order and stop at the first failure: minimum
//! extent, grid bounds including the road margin, the inner tiles, the border
//! ring, the road margin rings, the owning building's connectivity and finally
//! external-door safety for every building that would lose a door.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use township_core::{
    AreaKey, BlockId, BuildingId, Dims, DoorKind, PlacementRejection, PlacementTarget, TilePos,
    Volume,
};

use crate::{
    hierarchy::{self, Area, MIN_SHARED_RUN},
    World, WorldError,
};

/// Smallest extent an area may have along either axis.
pub const MIN_AREA_EXTENT: i32 = 3;

/// Outcome of a placement check.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlacementVerdict {
    /// Whether the area may be committed.
    pub buildable: bool,
    /// First failed check when the area is not buildable.
    pub rejection: Option<PlacementRejection>,
    /// Areas the new one would replace.
    pub replaced: BTreeSet<AreaKey>,
    /// External doors that would stop opening onto the open map.
    pub removed_doors: Vec<TilePos>,
    /// Border tiles the new area would share with areas that stay.
    pub shared_border: u32,
}

impl PlacementVerdict {
    fn rejected(reason: PlacementRejection) -> Self {
        log::trace!("placement rejected: {reason:?}");
        Self {
            buildable: false,
            rejection: Some(reason),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Scope {
    building: Option<BuildingId>,
    block: Option<BlockId>,
}

fn resolve_target(world: &World, target: PlacementTarget) -> Option<Scope> {
    match target {
        PlacementTarget::ExistingBuilding(building) => {
            let record = world.buildings.weak_get(building)?;
            Some(Scope {
                building: Some(building),
                block: Some(record.block()),
            })
        }
        PlacementTarget::NewBuilding { block, template } => {
            let _ = world.blocks.weak_get(block)?;
            let _ = world.settings.template(template)?;
            Some(Scope {
                building: None,
                block: Some(block),
            })
        }
        PlacementTarget::NewBlock { city, template } => {
            let _ = world.cities.weak_get(city)?;
            let _ = world.settings.template(template)?;
            Some(Scope {
                building: None,
                block: None,
            })
        }
        PlacementTarget::NewCity { template } => {
            let _ = world.settings.template(template)?;
            Some(Scope {
                building: None,
                block: None,
            })
        }
    }
}

/// Runs every placement check for `volume` on behalf of `target`.
///
/// Only areas of the target building are ever replaced, whatever
/// `replaceable` contains. Expected refusals come back as a verdict; an `Err`
/// reports an inconsistent boundary met while tracing outlines.
pub fn is_area_buildable(
    world: &World,
    target: PlacementTarget,
    volume: &Volume,
    replaceable: &BTreeSet<AreaKey>,
) -> Result<PlacementVerdict, WorldError> {
    let Some(scope) = resolve_target(world, target) else {
        return Ok(PlacementVerdict::rejected(PlacementRejection::UnknownTarget));
    };
    let replaceable: BTreeSet<AreaKey> = replaceable
        .iter()
        .copied()
        .filter(|key| Some(key.building) == scope.building)
        .collect();

    if volume.dims.x < MIN_AREA_EXTENT || volume.dims.y < MIN_AREA_EXTENT {
        return Ok(PlacementVerdict::rejected(PlacementRejection::TooSmall));
    }

    let road_width = world.settings.road_width.max(0);
    let Some(margin) = volume.checked_expanded(road_width) else {
        return Ok(PlacementVerdict::rejected(PlacementRejection::OutsideGrid));
    };
    if !margin.corners().iter().all(|corner| world.grid.contains(*corner)) {
        return Ok(PlacementVerdict::rejected(PlacementRejection::OutsideGrid));
    }

    let mut replaced = BTreeSet::new();
    if let Some(inner) = volume.inner() {
        for position in inner.tiles() {
            let Some(tile) = world.grid.get(position) else {
                return Ok(PlacementVerdict::rejected(PlacementRejection::OutsideGrid));
            };
            if !tile.is_built() {
                continue;
            }
            if !tile.owners().all(|owner| replaceable.contains(&owner)) {
                return Ok(PlacementVerdict::rejected(PlacementRejection::Obstructed));
            }
            replaced.extend(tile.owners());
        }
    }

    for position in volume.ring() {
        let Some(tile) = world.grid.get(position) else {
            return Ok(PlacementVerdict::rejected(PlacementRejection::OutsideGrid));
        };
        if !tile.is_built() {
            continue;
        }
        if tile.is_inner() {
            if !tile.owners().all(|owner| replaceable.contains(&owner)) {
                return Ok(PlacementVerdict::rejected(
                    PlacementRejection::BorderConflict,
                ));
            }
            replaced.extend(tile.owners());
        } else if tile.is_full() {
            let freed: Vec<AreaKey> = tile
                .owners()
                .filter(|owner| replaceable.contains(owner))
                .collect();
            if freed.is_empty() {
                return Ok(PlacementVerdict::rejected(
                    PlacementRejection::BorderConflict,
                ));
            }
            replaced.extend(freed);
        }
    }

    for distance in 1..=road_width {
        for position in volume.expanded(distance).ring() {
            let Some(tile) = world.grid.get(position) else {
                continue;
            };
            let same_block = tile
                .owners()
                .filter(|owner| !replaced.contains(owner))
                .all(|owner| {
                    scope.block.is_some()
                        && world
                            .buildings
                            .weak_get(owner.building)
                            .map(|building| building.block())
                            == scope.block
                });
            if !same_block {
                return Ok(PlacementVerdict::rejected(PlacementRejection::RoadMargin));
            }
        }
    }

    let mut building_emptied = false;
    if let Some((id, record)) = scope
        .building
        .and_then(|id| world.buildings.weak_get(id).map(|record| (id, record)))
    {
        let mut volumes: Vec<Volume> = record
            .areas()
            .iter()
            .filter(|(area, _)| !replaced.contains(&AreaKey::new(id, *area)))
            .map(|(_, area)| area.volume())
            .collect();
        building_emptied = volumes.is_empty();
        volumes.push(*volume);
        if !hierarchy::is_connected(&volumes) {
            return Ok(PlacementVerdict::rejected(PlacementRejection::Disconnected));
        }
    }

    let mut candidates: Vec<TilePos> = volume.ring().collect();
    if let Some(building) = scope.building {
        candidates.extend(world.building_ring_tiles(building, &replaced));
    }
    let outlines = world.trace_outlines(candidates, Some(volume), &replaced)?;
    let mut occluded = BTreeSet::new();
    let mut courtyard = BTreeSet::new();
    for outline in outlines.iter().filter(|outline| outline.is_internal()) {
        occluded.extend(outline.doors().iter().copied());
        courtyard.extend(outline.tiles().iter().copied());
    }

    let mut removed_doors = Vec::new();
    let mut losses: BTreeMap<BuildingId, usize> = BTreeMap::new();
    for (_, door) in world.doors.iter() {
        if door.kind() != DoorKind::External {
            continue;
        }
        let counted = world
            .buildings
            .weak_get(door.area().building)
            .map_or(false, |building| {
                building.external_doors().contains(&door.position())
            });
        if !counted {
            continue;
        }
        let lost = replaced.contains(&door.area())
            || volume.contains(door.position())
            || volume.contains(door.outside())
            || occluded.contains(&door.position());
        if lost {
            removed_doors.push(door.position());
            *losses.entry(door.area().building).or_default() += 1;
        }
    }

    let gains_door = volume.ring().any(|position| {
        let Some(side) = volume.side_of(position) else {
            return false;
        };
        let outside = position.neighbor(side);
        let keeps = world.grid.get(position).map_or(0, |tile| {
            tile.owners().filter(|owner| !replaced.contains(owner)).count()
        });
        world.grid.contains(outside)
            && keeps <= 1
            && !world.is_occupied(outside, Some(volume), &replaced)
            && !courtyard.contains(&position)
    });

    for (building, lost) in &losses {
        let Some(record) = world.buildings.weak_get(*building) else {
            continue;
        };
        let is_target = scope.building == Some(*building);
        if is_target && building_emptied {
            continue;
        }
        let remaining = record.external_doors().len().saturating_sub(*lost);
        let gained = usize::from(is_target && gains_door);
        if remaining + gained == 0 {
            log::trace!("placement rejected: {building:?} would lose its last external door");
            return Ok(PlacementVerdict {
                buildable: false,
                rejection: Some(PlacementRejection::DoorsOccluded),
                replaced,
                removed_doors,
                shared_border: 0,
            });
        }
    }

    let shared_border = volume
        .ring()
        .filter(|position| {
            world.grid.get(*position).map_or(false, |tile| {
                tile.is_border() && tile.owners().any(|owner| !replaced.contains(&owner))
            })
        })
        .count();

    Ok(PlacementVerdict {
        buildable: true,
        rejection: None,
        replaced,
        removed_doors,
        shared_border: u32::try_from(shared_border).unwrap_or(u32::MAX),
    })
}

/// Candidate volumes of extent `dims` hugging the outside of each base volume.
///
/// With `gap == 0` candidates share a border line with the base over at least
/// three tiles. A positive gap leaves `gap - 1` free tiles between the two
/// border lines and accepts any alignment along the side.
#[must_use]
pub fn positions_around(bases: &[Volume], dims: Dims, gap: i32) -> BTreeSet<Volume> {
    let overlap = if gap == 0 { MIN_SHARED_RUN - 1 } else { 0 };
    let mut positions = BTreeSet::new();
    for base in bases {
        let z = base.z();
        for y in (base.min_y() - dims.y + overlap)..=(base.max_y() - overlap) {
            let _ = positions.insert(at(base.max_x() + gap, y, z, dims));
            let _ = positions.insert(at(base.min_x() - gap - dims.x, y, z, dims));
        }
        for x in (base.min_x() - dims.x + overlap)..=(base.max_x() - overlap) {
            let _ = positions.insert(at(x, base.max_y() + gap, z, dims));
            let _ = positions.insert(at(x, base.min_y() - gap - dims.y, z, dims));
        }
    }
    positions
}

/// Candidate volumes of extent `dims` aligned with the inside of each area's border.
#[must_use]
pub fn positions_inside(areas: &[Volume], dims: Dims) -> BTreeSet<Volume> {
    let mut positions = BTreeSet::new();
    for area in areas {
        let z = area.z();
        for y in area.min_y()..=(area.max_y() - dims.y) {
            let _ = positions.insert(at(area.min_x(), y, z, dims));
            let _ = positions.insert(at(area.max_x() - dims.x, y, z, dims));
        }
        for x in area.min_x()..=(area.max_x() - dims.x) {
            let _ = positions.insert(at(x, area.min_y(), z, dims));
            let _ = positions.insert(at(x, area.max_y() - dims.y, z, dims));
        }
    }
    positions
}

fn at(x: i32, y: i32, z: i32, dims: Dims) -> Volume {
    Volume::new(TilePos::new(x, y, z), dims)
}

/// Candidates that pass every check, paired with their verdicts.
pub fn buildable_positions<I>(
    world: &World,
    target: PlacementTarget,
    candidates: I,
    replaceable: &BTreeSet<AreaKey>,
) -> Result<Vec<(Volume, PlacementVerdict)>, WorldError>
where
    I: IntoIterator<Item = Volume>,
{
    let mut buildable = Vec::new();
    for volume in candidates {
        let verdict = is_area_buildable(world, target, &volume, replaceable)?;
        if verdict.buildable {
            buildable.push((volume, verdict));
        }
    }
    Ok(buildable)
}

/// Picks the candidate sharing the most border tiles, breaking ties uniformly at random.
pub fn best_position<R>(
    candidates: Vec<(Volume, PlacementVerdict)>,
    rng: &mut R,
) -> Option<(Volume, PlacementVerdict)>
where
    R: Rng + ?Sized,
{
    let best = candidates
        .iter()
        .map(|(_, verdict)| verdict.shared_border)
        .max()?;
    let mut ties: Vec<(Volume, PlacementVerdict)> = candidates
        .into_iter()
        .filter(|(_, verdict)| verdict.shared_border == best)
        .collect();
    let pick = rng.gen_range(0..ties.len());
    Some(ties.swap_remove(pick))
}

/// Volumes of every area of a building.
pub(crate) fn area_volumes<'a, I>(areas: I) -> Vec<Volume>
where
    I: IntoIterator<Item = &'a Area>,
{
    areas.into_iter().map(Area::volume).collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn field(x: i32, y: i32) -> Volume {
        Volume::new(TilePos::new(x, y, 0), Dims::new(10, 10))
    }

    #[test]
    fn positions_around_share_at_least_three_tiles() {
        let base = field(30, 30);
        let positions = positions_around(&[base], Dims::new(10, 10), 0);
        assert!(positions.contains(&field(40, 30)));
        assert!(positions.contains(&field(20, 30)));
        assert!(positions.contains(&field(30, 40)));
        assert!(positions.contains(&field(30, 20)));
        for candidate in &positions {
            assert!(
                base.shared_run_tiles(candidate) >= MIN_SHARED_RUN,
                "{candidate:?} must share a run with the base"
            );
            assert!(!base.inner_intersects(candidate));
        }
        assert_eq!(positions.len(), 4 * 17, "candidates grow with the perimeter");
    }

    #[test]
    fn positions_with_a_gap_leave_the_road_free() {
        let base = field(30, 30);
        let positions = positions_around(&[base], Dims::new(6, 6), 3);
        for candidate in &positions {
            assert!(!candidate.intersects(&base.expanded(2)));
        }
        assert!(positions.contains(&Volume::new(TilePos::new(43, 30, 0), Dims::new(6, 6))));
    }

    #[test]
    fn positions_inside_stay_within_the_area() {
        let base = field(30, 30);
        let positions = positions_inside(&[base], Dims::new(6, 4));
        assert!(!positions.is_empty());
        for candidate in &positions {
            assert!(candidate.corners().iter().all(|corner| base.contains(*corner)));
        }
    }

    #[test]
    fn best_position_prefers_more_shared_border() {
        let verdict = |shared| PlacementVerdict {
            buildable: true,
            shared_border: shared,
            ..PlacementVerdict::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let candidates = vec![
            (field(0, 0), verdict(3)),
            (field(10, 0), verdict(11)),
            (field(20, 0), verdict(7)),
        ];
        let (volume, _) = best_position(candidates, &mut rng).expect("best");
        assert_eq!(volume, field(10, 0));
        assert!(best_position(Vec::new(), &mut rng).is_none());
    }

    #[test]
    fn best_position_ties_are_broken_deterministically_per_seed() {
        let tied = || {
            (0..6)
                .map(|index| {
                    (
                        field(index * 10, 0),
                        PlacementVerdict {
                            buildable: true,
                            shared_border: 5,
                            ..PlacementVerdict::default()
                        },
                    )
                })
                .collect::<Vec<_>>()
        };
        let pick = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            best_position(tied(), &mut rng).map(|(volume, _)| volume)
        };
        assert_eq!(pick(11), pick(11));
        let distinct: BTreeSet<Volume> = (0..32).filter_map(pick).collect();
        assert!(distinct.len() > 1, "ties must not always resolve the same way");
    }
}

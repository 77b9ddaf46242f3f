use std::collections::BTreeSet;

use township_core::{
    AreaKey, AreaType, BlockId, BuildingId, Command, Dims, DoorKind, Event, PlacementRejection,
    PlacementTarget, SimulationSettings, TemplateId, TilePos, Volume,
};
use township_world::{apply, query, World};

const FARMSTEAD: TemplateId = TemplateId::new(0);
const HAMLET: TemplateId = TemplateId::new(1);

fn volume(x: i32, y: i32, lx: i32, ly: i32) -> Volume {
    Volume::new(TilePos::new(x, y, 0), Dims::new(lx, ly))
}

fn place(world: &mut World, target: PlacementTarget, area_type: AreaType, at: Volume) -> Vec<Event> {
    let mut events = Vec::new();
    apply(
        world,
        Command::PlaceArea {
            target,
            area_type,
            volume: at,
            replaceable: Vec::new(),
        },
        &mut events,
    )
    .expect("placement must not violate invariants");
    events
}

fn founded(events: &[Event]) -> (BuildingId, BlockId) {
    events
        .iter()
        .find_map(|event| match event {
            Event::BuildingFounded {
                building, block, ..
            } => Some((*building, *block)),
            _ => None,
        })
        .expect("a building was founded")
}

fn built_area(events: &[Event]) -> AreaKey {
    events
        .iter()
        .find_map(|event| match event {
            Event::AreaBuilt { area, .. } => Some(*area),
            _ => None,
        })
        .expect("an area was built")
}

#[test]
fn adjacent_fields_share_one_border_line() {
    let mut world = World::new(SimulationSettings::default());
    let first = volume(30, 30, 10, 10);
    let second = volume(40, 30, 10, 10);
    let events = place(
        &mut world,
        PlacementTarget::NewCity {
            template: FARMSTEAD,
        },
        AreaType::Field,
        first,
    );
    let (building, _) = founded(&events);
    let target = PlacementTarget::ExistingBuilding(building);

    let verdict = query::validate_placement(&world, target, second, &BTreeSet::new())
        .expect("validation");
    assert!(verdict.buildable);
    assert_eq!(verdict.shared_border, 11);
    assert!(verdict.replaced.is_empty());
    assert_eq!(first.shared_run_tiles(&second), 11);
    assert_eq!(first.shared_run(&second).map(|(_, _, length)| length), Some(10));

    let _ = place(&mut world, target, AreaType::Field, second);
    assert!(query::is_building_connected(&world, building));
    for y in 30..=40 {
        let tile = query::tile(&world, TilePos::new(40, y, 0)).expect("tile");
        assert!(tile.is_border());
        assert_eq!(tile.owner_count(), 2, "shared line at y = {y}");
    }

    let internal: Vec<TilePos> = query::doors(&world)
        .filter(|(_, door)| door.kind() == DoorKind::Internal)
        .map(|(_, door)| door.position())
        .collect();
    assert_eq!(internal.len(), 1);
    assert_eq!(internal[0].x, 40);
}

#[test]
fn placements_that_occlude_the_last_door_are_rejected() {
    let mut world = World::new(SimulationSettings::default());
    let events = place(
        &mut world,
        PlacementTarget::NewCity { template: HAMLET },
        AreaType::Dwelling,
        volume(30, 30, 6, 6),
    );
    let (dwelling, block) = founded(&events);
    assert_eq!(
        query::building(&world, dwelling).map(|b| b.external_doors().to_vec()),
        Some(vec![TilePos::new(33, 30, 0)])
    );

    let neighbor = PlacementTarget::NewBuilding {
        block,
        template: HAMLET,
    };
    let blocking = volume(30, 24, 6, 6);
    let verdict = query::validate_placement(&world, neighbor, blocking, &BTreeSet::new())
        .expect("validation");
    assert_eq!(verdict.rejection, Some(PlacementRejection::DoorsOccluded));
    assert_eq!(verdict.removed_doors, vec![TilePos::new(33, 30, 0)]);

    let rejected = place(&mut world, neighbor, AreaType::Dwelling, blocking);
    assert_eq!(
        rejected,
        vec![Event::PlacementRejected {
            volume: blocking,
            reason: PlacementRejection::DoorsOccluded
        }]
    );

    let beside = volume(24, 30, 6, 6);
    let verdict = query::validate_placement(&world, neighbor, beside, &BTreeSet::new())
        .expect("validation");
    assert!(verdict.buildable, "the west side leaves the door open: {verdict:?}");
}

#[test]
fn validator_checks_run_in_order() {
    let mut world = World::new(SimulationSettings::default());
    let events = place(
        &mut world,
        PlacementTarget::NewCity {
            template: FARMSTEAD,
        },
        AreaType::Field,
        volume(30, 30, 10, 10),
    );
    let (building, block) = founded(&events);
    let own = PlacementTarget::ExistingBuilding(building);
    let none = BTreeSet::new();
    let reason = |world: &World, target, at| {
        query::validate_placement(world, target, at, &none)
            .expect("validation")
            .rejection
    };

    assert_eq!(
        reason(&world, own, volume(40, 30, 2, 8)),
        Some(PlacementRejection::TooSmall)
    );
    assert_eq!(
        reason(&world, own, volume(0, 0, 6, 6)),
        Some(PlacementRejection::OutsideGrid),
        "the road margin must fit inside the grid"
    );
    assert_eq!(
        reason(&world, own, volume(33, 33, 4, 4)),
        Some(PlacementRejection::Obstructed)
    );
    assert_eq!(
        reason(&world, own, volume(60, 60, 6, 6)),
        Some(PlacementRejection::Disconnected)
    );
    assert_eq!(
        reason(
            &world,
            PlacementTarget::NewBlock {
                city: query::block(&world, block).expect("block").city(),
                template: HAMLET,
            },
            volume(41, 30, 6, 6)
        ),
        Some(PlacementRejection::RoadMargin)
    );
    assert_eq!(
        reason(
            &world,
            PlacementTarget::ExistingBuilding(BuildingId::from_slot(township_core::SlotId::new(9, 9))),
            volume(50, 50, 6, 6)
        ),
        Some(PlacementRejection::UnknownTarget)
    );
}

#[test]
fn oversized_volumes_are_outside_the_grid() {
    let mut world = World::new(SimulationSettings::default());
    let target = PlacementTarget::NewCity { template: HAMLET };
    let none = BTreeSet::new();
    for huge in [
        volume(10, 10, i32::MAX - 5, 5),
        volume(10, 10, 5, i32::MAX),
        volume(i32::MIN, 10, 6, 6),
        volume(i32::MAX - 3, i32::MAX - 3, 3, 3),
    ] {
        let verdict = query::validate_placement(&world, target, huge, &none).expect("validation");
        assert_eq!(verdict.rejection, Some(PlacementRejection::OutsideGrid), "{huge:?}");
        assert_eq!(
            place(&mut world, target, AreaType::Dwelling, huge),
            vec![Event::PlacementRejected {
                volume: huge,
                reason: PlacementRejection::OutsideGrid
            }]
        );
    }
    assert_eq!(query::buildings(&world).count(), 0);
}

#[test]
fn replaceable_areas_are_unbuilt_by_the_commit() {
    let mut world = World::new(SimulationSettings::default());
    let events = place(
        &mut world,
        PlacementTarget::NewCity {
            template: FARMSTEAD,
        },
        AreaType::Field,
        volume(30, 30, 10, 10),
    );
    let (building, _) = founded(&events);
    let field = built_area(&events);
    let _ = place(
        &mut world,
        PlacementTarget::ExistingBuilding(building),
        AreaType::Field,
        volume(40, 30, 10, 10),
    );

    let farmhouse = volume(34, 30, 6, 6);
    let mut events = Vec::new();
    apply(
        &mut world,
        Command::PlaceArea {
            target: PlacementTarget::ExistingBuilding(building),
            area_type: AreaType::Farmhouse,
            volume: farmhouse,
            replaceable: vec![field],
        },
        &mut events,
    )
    .expect("replacement");

    assert!(events.contains(&Event::AreaRemoved {
        area: field,
        volume: volume(30, 30, 10, 10)
    }));
    assert!(query::area(&world, field).is_none());
    assert!(!query::tile_grid(&world).is_built(TilePos::new(38, 38, 0)));
    let types = query::area_types(&world, building);
    assert!(types.contains(&AreaType::Farmhouse));
    assert!(query::is_building_connected(&world, building));
}

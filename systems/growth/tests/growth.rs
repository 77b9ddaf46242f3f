use township_core::{
    BlockId, BuildingId, Command, Event, ExpansionRequest, SimulationSettings, SlotId, TemplateId,
};
use township_system_growth::{Config, Growth};
use township_world::{apply, query, World};

fn building(index: u32) -> BuildingId {
    BuildingId::from_slot(SlotId::new(0, index))
}

fn founded(index: u32) -> Event {
    Event::BuildingFounded {
        building: building(index),
        block: BlockId::from_slot(SlotId::new(0, 0)),
        template: TemplateId::new(0),
    }
}

fn requests(commands: &[Command]) -> Vec<ExpansionRequest> {
    commands
        .iter()
        .map(|command| match command {
            Command::QueueExpansion { request } => *request,
            other => panic!("unexpected command emitted: {other:?}"),
        })
        .collect()
}

#[test]
fn emits_requests_on_the_configured_cadence() {
    let mut growth = Growth::new(Config::new(4, 2, vec![TemplateId::new(1)], 0x1234));
    let mut commands = Vec::new();
    for tick in 1..=8 {
        growth.handle(&[Event::TimeAdvanced { tick }], &mut commands);
    }
    assert_eq!(
        requests(&commands),
        vec![
            ExpansionRequest::FoundBuilding {
                template: TemplateId::new(1),
                near: None
            };
            2
        ],
        "nothing to expand before a building is known"
    );

    let mut commands = Vec::new();
    growth.handle(&[founded(3), Event::TimeAdvanced { tick: 9 }], &mut commands);
    assert_eq!(
        requests(&commands),
        vec![
            ExpansionRequest::FoundBuilding {
                template: TemplateId::new(1),
                near: None
            },
            ExpansionRequest::ExpandBuilding {
                building: building(3)
            },
        ]
    );
}

#[test]
fn removed_buildings_are_forgotten() {
    let mut growth = Growth::new(Config::new(0, 1, Vec::new(), 9));
    let mut commands = Vec::new();
    growth.handle(
        &[
            founded(1),
            founded(2),
            Event::BuildingRemoved {
                building: building(1),
            },
        ],
        &mut commands,
    );
    assert!(commands.is_empty());
    assert_eq!(growth.buildings().len(), 1);

    for tick in 1..=16 {
        growth.handle(&[Event::TimeAdvanced { tick }], &mut commands);
    }
    assert_eq!(commands.len(), 16);
    assert!(requests(&commands).iter().all(|request| *request
        == ExpansionRequest::ExpandBuilding {
            building: building(2)
        }));
}

fn simulate(seed: u64) -> Vec<Event> {
    let mut world = World::new(SimulationSettings::default());
    let mut growth = Growth::new(Config::new(
        5,
        1,
        vec![TemplateId::new(0), TemplateId::new(1)],
        seed,
    ));
    let mut log = Vec::new();
    let mut pending = Vec::new();
    for _ in 0..30 {
        let mut events = Vec::new();
        for command in pending.drain(..) {
            apply(&mut world, command, &mut events).expect("queueing");
        }
        apply(&mut world, Command::Tick, &mut events).expect("tick");
        growth.handle(&events, &mut pending);
        log.extend(events);
    }
    assert_eq!(growth.buildings().len(), query::buildings(&world).count());
    log
}

#[test]
fn drives_a_world_deterministically() {
    let first = simulate(0xfeed);
    let founded = first
        .iter()
        .filter(|event| matches!(event, Event::BuildingFounded { .. }))
        .count();
    assert!(founded >= 2, "only {founded} buildings founded");
    assert!(first
        .iter()
        .any(|event| matches!(event, Event::AreaBuilt { .. })));
    assert_eq!(first, simulate(0xfeed));
}

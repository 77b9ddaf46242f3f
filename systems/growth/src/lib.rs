#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic growth system that keeps the city expanding.

use std::collections::BTreeSet;

use log::trace;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use township_core::{BuildingId, Command, Event, ExpansionRequest, TemplateId};

/// Configuration parameters required to construct the growth system.
#[derive(Clone, Debug)]
pub struct Config {
    found_interval: u64,
    expand_interval: u64,
    templates: Vec<TemplateId>,
    rng_seed: u64,
}

impl Config {
    /// Creates a configuration founding a building every `found_interval`
    /// ticks and growing one every `expand_interval` ticks.
    ///
    /// An interval of zero disables that request kind.
    #[must_use]
    pub fn new(
        found_interval: u64,
        expand_interval: u64,
        templates: Vec<TemplateId>,
        rng_seed: u64,
    ) -> Self {
        Self {
            found_interval,
            expand_interval,
            templates,
            rng_seed,
        }
    }
}

/// Pure system that turns elapsed ticks into expansion requests.
#[derive(Debug)]
pub struct Growth {
    found_interval: u64,
    expand_interval: u64,
    templates: Vec<TemplateId>,
    buildings: BTreeSet<BuildingId>,
    rng: ChaCha8Rng,
}

impl Growth {
    /// Creates a new growth system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            found_interval: config.found_interval,
            expand_interval: config.expand_interval,
            templates: config.templates,
            buildings: BTreeSet::new(),
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Buildings the system currently knows about.
    #[must_use]
    pub fn buildings(&self) -> &BTreeSet<BuildingId> {
        &self.buildings
    }

    /// Consumes world events in order and emits `QueueExpansion` commands.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::BuildingFounded { building, .. } => {
                    let _ = self.buildings.insert(*building);
                }
                Event::BuildingRemoved { building } => {
                    let _ = self.buildings.remove(building);
                }
                Event::TimeAdvanced { tick } => self.advance(*tick, out),
                _ => {}
            }
        }
    }

    fn advance(&mut self, tick: u64, out: &mut Vec<Command>) {
        if is_due(tick, self.found_interval) {
            if let Some(template) = self.pick_template() {
                trace!("tick {tick}: founding a building from {template:?}");
                out.push(Command::QueueExpansion {
                    request: ExpansionRequest::FoundBuilding {
                        template,
                        near: None,
                    },
                });
            }
        }
        if is_due(tick, self.expand_interval) {
            if let Some(building) = self.pick_building() {
                trace!("tick {tick}: expanding {building:?}");
                out.push(Command::QueueExpansion {
                    request: ExpansionRequest::ExpandBuilding { building },
                });
            }
        }
    }

    fn pick_template(&mut self) -> Option<TemplateId> {
        if self.templates.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.templates.len());
        self.templates.get(index).copied()
    }

    fn pick_building(&mut self) -> Option<BuildingId> {
        if self.buildings.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.buildings.len());
        self.buildings.iter().nth(index).copied()
    }
}

/// The first tick is always due.
fn is_due(tick: u64, interval: u64) -> bool {
    interval != 0 && tick.saturating_sub(1) % interval == 0
}

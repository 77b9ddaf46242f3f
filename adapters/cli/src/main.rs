#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that grows a township headlessly.

mod city_transfer;

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use township_core::{Command, Event, SimulationSettings};
use township_system_growth::{Config as GrowthConfig, Growth};
use township_system_roofing::{Roofing, RoofingConfig};
use township_world::{apply, query, World};

use city_transfer::CitySnapshot;

/// Grows a procedural township for a number of ticks and reports the result.
#[derive(Debug, Parser)]
#[command(name = "township", version, about)]
struct Args {
    /// Number of simulation ticks to run.
    #[arg(long, default_value_t = 200)]
    ticks: u64,
    /// Overrides the seed from the configuration file.
    #[arg(long)]
    seed: Option<u64>,
    /// JSON file holding simulation settings; missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ticks between requests to found a new building; zero disables founding.
    #[arg(long, default_value_t = 10)]
    found_every: u64,
    /// Ticks between requests to grow an existing building; zero disables growth.
    #[arg(long, default_value_t = 1)]
    expand_every: u64,
    /// Prints the final layout as a single-line snapshot.
    #[arg(long)]
    export: bool,
    /// Rebuilds a previously exported snapshot before simulating.
    #[arg(long, value_name = "FILE")]
    import: Option<PathBuf>,
}

/// Entry point for the township command-line interface.
fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_ref())?;
    if let Some(seed) = args.seed {
        settings.seed = seed;
    }

    let mut simulation = Simulation::new(settings, args.found_every, args.expand_every);
    if let Some(path) = &args.import {
        let encoded = fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let snapshot = CitySnapshot::decode(&encoded)
            .with_context(|| format!("failed to decode snapshot {}", path.display()))?;
        simulation.restore(&snapshot)?;
    }

    for _ in 0..args.ticks {
        simulation.step()?;
    }

    let world = &simulation.world;
    println!(
        "tick {}: {} cities, {} blocks, {} buildings, {} doors, {} roofs",
        query::tick_index(world),
        query::cities(world).count(),
        query::blocks(world).count(),
        query::buildings(world).count(),
        query::doors(world).count(),
        query::roofs(world).count(),
    );
    println!(
        "{} expansions committed, {} unavailable",
        simulation.committed, simulation.unavailable
    );

    if args.export {
        let encoded = CitySnapshot::capture(world)
            .encode()
            .context("failed to encode the city layout")?;
        println!("{encoded}");
    }
    Ok(())
}

fn load_settings(path: Option<&PathBuf>) -> Result<SimulationSettings> {
    let Some(path) = path else {
        return Ok(SimulationSettings::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse settings {}", path.display()))
}

/// World plus the systems reacting to its events.
struct Simulation {
    world: World,
    growth: Growth,
    roofing: Roofing,
    pending: Vec<Command>,
    committed: usize,
    unavailable: usize,
}

impl Simulation {
    fn new(settings: SimulationSettings, found_every: u64, expand_every: u64) -> Self {
        let templates = settings.templates.iter().map(|template| template.id).collect();
        let growth = Growth::new(GrowthConfig::new(
            found_every,
            expand_every,
            templates,
            settings.seed,
        ));
        let roofing = Roofing::new(RoofingConfig::from(&settings.roofs));
        Self {
            world: World::new(settings),
            growth,
            roofing,
            pending: Vec::new(),
            committed: 0,
            unavailable: 0,
        }
    }

    fn restore(&mut self, snapshot: &CitySnapshot) -> Result<()> {
        let grid = query::tile_grid(&self.world).size();
        if (grid.width, grid.height) != (snapshot.width, snapshot.height) {
            warn!(
                "snapshot was captured on a {}x{} grid, restoring onto {}x{}",
                snapshot.width, snapshot.height, grid.width, grid.height
            );
        }
        let summary = snapshot
            .restore(&mut self.world)
            .context("failed to restore the snapshot")?;
        if summary.skipped > 0 {
            warn!("{} snapshot areas no longer fit and were skipped", summary.skipped);
        }
        info!("restored {} areas", summary.placed);

        // Restored buildings need roofs and must be known to the growth driver.
        let roofs_enabled = query::settings(&self.world).roofs.enabled;
        let mut founded = Vec::new();
        for (building, record) in query::buildings(&self.world) {
            founded.push(Event::BuildingFounded {
                building,
                block: record.block(),
                template: record.template(),
            });
            if roofs_enabled && record.has_roofed_area() {
                founded.push(Event::RoofInvalidated { building });
            }
        }
        self.react(founded)
    }

    /// Applies the queued commands, advances one tick and lets the systems react.
    fn step(&mut self) -> Result<()> {
        let mut events = Vec::new();
        for command in self.pending.drain(..) {
            apply(&mut self.world, command, &mut events).context("failed to apply a command")?;
        }
        apply(&mut self.world, Command::Tick, &mut events).context("failed to advance a tick")?;
        self.react(events)
    }

    fn react(&mut self, mut events: Vec<Event>) -> Result<()> {
        let mut roofs = Vec::new();
        let world = &self.world;
        self.roofing
            .handle(
                &events,
                |building| query::roofable_tiles(world, building),
                &mut roofs,
            )
            .context("failed to derive roofs")?;
        for command in roofs {
            apply(&mut self.world, command, &mut events).context("failed to install a roof")?;
        }

        for event in &events {
            match event {
                Event::ExpansionCommitted { .. } => self.committed += 1,
                Event::ExpansionUnavailable { .. } => self.unavailable += 1,
                _ => {}
            }
        }
        self.growth.handle(&events, &mut self.pending);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulations_grow_roofed_buildings() {
        let mut simulation = Simulation::new(SimulationSettings::default(), 6, 1);
        for _ in 0..40 {
            simulation.step().expect("step");
        }
        let world = &simulation.world;
        assert!(simulation.committed > 0);
        assert!(query::buildings(world).count() >= 1);
        let roofed = query::buildings(world)
            .filter(|(_, record)| record.has_roofed_area())
            .count();
        assert_eq!(query::roofs(world).count(), roofed);
    }

    #[test]
    fn snapshots_restore_into_fresh_simulations() {
        let mut simulation = Simulation::new(SimulationSettings::default(), 5, 1);
        for _ in 0..20 {
            simulation.step().expect("step");
        }
        let snapshot = CitySnapshot::capture(&simulation.world);

        let mut restored = Simulation::new(SimulationSettings::default(), 0, 1);
        restored.restore(&snapshot).expect("restore");
        assert_eq!(
            restored.growth.buildings().len(),
            query::buildings(&restored.world).count()
        );
        restored.step().expect("growth continues after a restore");
    }

    #[test]
    fn partial_settings_files_use_defaults() {
        let settings: SimulationSettings =
            serde_json::from_str(r#"{ "seed": 7, "road_width": 3 }"#).expect("settings");
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.road_width, 3);
        assert_eq!(settings.grid, SimulationSettings::default().grid);
    }
}

use std::collections::{BTreeSet, VecDeque};

use log::{debug, warn};
use rand::seq::SliceRandom;
use township_core::{
    AreaKey, AreaTemplate, BlockId, BuildingId, CityId, Dims, Event, ExpansionRequest,
    PlacementTarget, TemplateId, TilePos, Volume,
};

use crate::{
    hierarchy::Area,
    placement::{self, PlacementVerdict},
    World, WorldError,
};

/// FIFO of growth requests plus the buildings known to have no room left.
#[derive(Debug, Default)]
pub(crate) struct ExpansionQueue {
    pending: VecDeque<ExpansionRequest>,
    unexpandable: BTreeSet<BuildingId>,
}

impl ExpansionQueue {
    pub(crate) fn push(&mut self, request: ExpansionRequest) {
        self.pending.push_back(request);
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_unexpandable(&self, building: BuildingId) -> bool {
        self.unexpandable.contains(&building)
    }

    fn pop(&mut self) -> Option<ExpansionRequest> {
        self.pending.pop_front()
    }

    fn mark_unexpandable(&mut self, building: BuildingId) {
        let _ = self.unexpandable.insert(building);
    }

    /// Space changed somewhere, so cached failures may succeed again.
    pub(crate) fn forget_unexpandable(&mut self) {
        self.unexpandable.clear();
    }
}

impl World {
    /// Serves up to `expansions_per_tick` queued requests in arrival order.
    pub(crate) fn drain_expansions(&mut self, out_events: &mut Vec<Event>) -> Result<(), WorldError> {
        for _ in 0..self.settings.expansions_per_tick {
            let Some(request) = self.expansions.pop() else {
                break;
            };
            self.serve_expansion(request, out_events)?;
        }
        Ok(())
    }

    fn serve_expansion(
        &mut self,
        request: ExpansionRequest,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        self.record_step(0, || format!("serving {request:?}"));
        let committed = match request {
            ExpansionRequest::FoundBuilding { template, near } => {
                self.found_building(template, near, out_events)?
            }
            ExpansionRequest::ExpandBuilding { building } => {
                self.expand_building(building, out_events)?
            }
        };
        match committed {
            Some(area) => out_events.push(Event::ExpansionCommitted { request, area }),
            None => out_events.push(Event::ExpansionUnavailable { request }),
        }
        Ok(())
    }

    /// Starts a new building from the first area kind of `template`.
    ///
    /// Without any city the building founds one around `near`, or the grid
    /// center. Otherwise it joins the blocks of the city closest to the anchor,
    /// nearest block first, and only opens a new block beyond a road when none
    /// of them has room.
    fn found_building(
        &mut self,
        template: TemplateId,
        near: Option<TilePos>,
        out_events: &mut Vec<Event>,
    ) -> Result<Option<AreaKey>, WorldError> {
        let Some(seed) = self
            .settings
            .template(template)
            .and_then(|found| found.areas.first())
            .cloned()
        else {
            warn!("cannot found a building from unknown or empty template {template:?}");
            return Ok(None);
        };
        let dims = self.shuffled_dims(&seed);
        let anchor = near.unwrap_or_else(|| self.grid_center());
        let none = BTreeSet::new();

        let Some(city) = self.nearest_city(anchor) else {
            let target = PlacementTarget::NewCity { template };
            let candidates = dims.iter().map(|dims| {
                Volume::new(anchor.offset(-dims.x / 2, -dims.y / 2), *dims)
            });
            let found = placement::buildable_positions(self, target, candidates, &none)?;
            return self.commit_first(target, &seed, found, out_events);
        };

        for block in self.blocks_by_distance(city) {
            for extent in &dims {
                if !self.block_has_room(block, area_surface(*extent), 0) {
                    continue;
                }
                let bases = self.block_volumes(block);
                let target = PlacementTarget::NewBuilding { block, template };
                let candidates = placement::positions_around(&bases, *extent, 0);
                let found = placement::buildable_positions(self, target, candidates, &none)?;
                if let Some(area) = self.commit_best(target, &seed, found, out_events)? {
                    return Ok(Some(area));
                }
            }
        }

        let gap = self.settings.road_width.max(0) + 1;
        let bases = self.city_volumes(city);
        for extent in &dims {
            let target = PlacementTarget::NewBlock { city, template };
            let candidates = placement::positions_around(&bases, *extent, gap);
            let found = placement::buildable_positions(self, target, candidates, &none)?;
            if let Some(area) = self.commit_best(target, &seed, found, out_events)? {
                return Ok(Some(area));
            }
        }
        Ok(None)
    }

    /// Grows an existing building by one area of its template.
    ///
    /// Area kinds are tried in shuffled order, and the extents of each kind
    /// with their rotations in shuffled order too. The first extent with any
    /// buildable position wins; among its positions the one sharing the most
    /// border is committed.
    fn expand_building(
        &mut self,
        building: BuildingId,
        out_events: &mut Vec<Event>,
    ) -> Result<Option<AreaKey>, WorldError> {
        if self.expansions.is_unexpandable(building) {
            debug!("building {building:?} is cached as unexpandable");
            return Ok(None);
        }
        let Some(record) = self.buildings.weak_get(building) else {
            debug!("ignoring expansion of removed building {building:?}");
            return Ok(None);
        };
        let block = record.block();
        let Some(mut kinds) = self
            .settings
            .template(record.template())
            .map(|template| template.areas.clone())
        else {
            warn!("building {building:?} has no template to grow from");
            return Ok(None);
        };
        kinds.shuffle(&mut self.rng);

        let target = PlacementTarget::ExistingBuilding(building);
        for kind in &kinds {
            let (all, replaceable) = self.building_volumes(building, kind);
            let keys: BTreeSet<AreaKey> = replaceable.iter().map(|(key, _)| *key).collect();
            let inside: Vec<Volume> = replaceable.iter().map(|(_, volume)| *volume).collect();
            for extent in self.shuffled_dims(kind) {
                let mut candidates = placement::positions_around(&all, extent, 0);
                candidates.extend(placement::positions_inside(&inside, extent));
                self.record_step(1, || {
                    format!("{} candidates for {:?} {extent:?}", candidates.len(), kind.area_type)
                });
                let mut found = placement::buildable_positions(self, target, candidates, &keys)?;
                found.retain(|(volume, verdict)| {
                    let freed = self.replaced_surface(verdict);
                    self.block_has_room(block, volume.surface(), freed)
                });
                if let Some(area) = self.commit_best(target, kind, found, out_events)? {
                    return Ok(Some(area));
                }
            }
        }

        self.expansions.mark_unexpandable(building);
        warn!("building {building:?} has no room left to grow");
        Ok(None)
    }

    fn commit_best(
        &mut self,
        target: PlacementTarget,
        kind: &AreaTemplate,
        found: Vec<(Volume, PlacementVerdict)>,
        out_events: &mut Vec<Event>,
    ) -> Result<Option<AreaKey>, WorldError> {
        let Some((volume, verdict)) = placement::best_position(found, &mut self.rng) else {
            return Ok(None);
        };
        self.record_highlight(1, volume);
        self.commit_area(target, kind.area_type, volume, &verdict, out_events)
            .map(Some)
    }

    fn commit_first(
        &mut self,
        target: PlacementTarget,
        kind: &AreaTemplate,
        found: Vec<(Volume, PlacementVerdict)>,
        out_events: &mut Vec<Event>,
    ) -> Result<Option<AreaKey>, WorldError> {
        match found.into_iter().next() {
            Some((volume, verdict)) => self
                .commit_area(target, kind.area_type, volume, &verdict, out_events)
                .map(Some),
            None => Ok(None),
        }
    }

    fn shuffled_dims(&mut self, kind: &AreaTemplate) -> Vec<Dims> {
        let mut dims: Vec<Dims> = Vec::with_capacity(kind.dims.len() * 2);
        for extent in &kind.dims {
            for candidate in [*extent, extent.rotated()] {
                if !dims.contains(&candidate) {
                    dims.push(candidate);
                }
            }
        }
        dims.shuffle(&mut self.rng);
        dims
    }

    fn grid_center(&self) -> TilePos {
        let size = self.grid.size();
        let half = |extent: u32| i32::try_from(extent / 2).unwrap_or(i32::MAX);
        TilePos::new(half(size.width), half(size.height), self.settings.ground_level)
    }

    fn nearest_city(&self, anchor: TilePos) -> Option<CityId> {
        self.cities
            .iter()
            .filter_map(|(id, city)| {
                city.centroid(&self.blocks)
                    .map(|centroid| (distance(centroid, anchor), id))
            })
            .min_by(|left, right| left.0.total_cmp(&right.0).then(left.1.cmp(&right.1)))
            .map(|(_, id)| id)
    }

    fn blocks_by_distance(&self, city: CityId) -> Vec<BlockId> {
        let Some(record) = self.cities.weak_get(city) else {
            return Vec::new();
        };
        let centroid = record.centroid(&self.blocks).unwrap_or_default();
        let mut blocks: Vec<(f64, BlockId)> = record
            .blocks()
            .iter()
            .filter_map(|id| {
                let block = self.blocks.weak_get(*id)?;
                let (x, y) = block.centroid()?;
                Some((((x - centroid.0).powi(2) + (y - centroid.1).powi(2)).sqrt(), *id))
            })
            .collect();
        blocks.sort_by(|left, right| left.0.total_cmp(&right.0).then(left.1.cmp(&right.1)));
        blocks.into_iter().map(|(_, id)| id).collect()
    }

    fn block_has_room(&self, block: BlockId, added: i64, freed: i64) -> bool {
        self.blocks.weak_get(block).map_or(false, |record| {
            record.surface() - freed + added <= self.settings.max_block_surface
        })
    }

    fn replaced_surface(&self, verdict: &PlacementVerdict) -> i64 {
        verdict
            .replaced
            .iter()
            .filter_map(|key| self.area_volume(*key))
            .map(|volume| volume.surface())
            .sum()
    }

    fn block_volumes(&self, block: BlockId) -> Vec<Volume> {
        self.blocks
            .weak_get(block)
            .map(|record| {
                record
                    .buildings()
                    .iter()
                    .filter_map(|id| self.buildings.weak_get(*id))
                    .flat_map(|building| placement::area_volumes(building.areas().values()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn city_volumes(&self, city: CityId) -> Vec<Volume> {
        self.cities
            .weak_get(city)
            .map(|record| {
                record
                    .blocks()
                    .iter()
                    .flat_map(|block| self.block_volumes(*block))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every area volume of the building, and the ones `kind` may replace.
    fn building_volumes(
        &self,
        building: BuildingId,
        kind: &AreaTemplate,
    ) -> (Vec<Volume>, Vec<(AreaKey, Volume)>) {
        let Some(record) = self.buildings.weak_get(building) else {
            return (Vec::new(), Vec::new());
        };
        let all = placement::area_volumes(record.areas().values());
        let replaceable = record
            .areas()
            .iter()
            .filter(|(_, area)| kind.replaces.contains(&area.area_type()))
            .map(|(id, area)| (AreaKey::new(building, id), Area::volume(area)))
            .collect();
        (all, replaceable)
    }
}

fn area_surface(dims: Dims) -> i64 {
    Volume::new(TilePos::new(0, 0, 0), dims).surface()
}

fn distance((x, y): (f64, f64), anchor: TilePos) -> f64 {
    ((x - f64::from(anchor.x)).powi(2) + (y - f64::from(anchor.y)).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use township_core::{SimulationSettings, TemplateId};

    use super::*;
    use crate::{apply, query};

    fn world() -> World {
        World::new(SimulationSettings::default())
    }

    fn tick(world: &mut World) -> Vec<Event> {
        let mut events = Vec::new();
        apply(world, township_core::Command::Tick, &mut events).expect("tick");
        events
    }

    #[test]
    fn queue_serves_requests_in_arrival_order() {
        let mut queue = ExpansionQueue::default();
        let first = ExpansionRequest::FoundBuilding {
            template: TemplateId::new(0),
            near: None,
        };
        let second = ExpansionRequest::FoundBuilding {
            template: TemplateId::new(1),
            near: None,
        };
        queue.push(first);
        queue.push(second);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(first));
        assert_eq!(queue.pop(), Some(second));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn first_building_founds_a_city_at_the_grid_center() {
        let mut world = world();
        world.expansions.push(ExpansionRequest::FoundBuilding {
            template: TemplateId::new(0),
            near: None,
        });
        let events = tick(&mut world);

        assert!(events
            .iter()
            .any(|event| matches!(event, Event::CityFounded { .. })));
        assert!(events
            .iter()
            .any(|event| matches!(event, Event::ExpansionCommitted { .. })));
        assert_eq!(query::cities(&world).count(), 1);
        let (_, building) = query::buildings(&world).next().expect("building");
        let area = building.areas().values().next().expect("area");
        assert!(area.volume().contains(TilePos::new(64, 64, 0)));
    }

    #[test]
    fn unknown_templates_are_unavailable() {
        let mut world = world();
        let request = ExpansionRequest::FoundBuilding {
            template: TemplateId::new(42),
            near: None,
        };
        world.expansions.push(request);
        let events = tick(&mut world);
        assert!(events.contains(&Event::ExpansionUnavailable { request }));
    }

    #[test]
    fn expansions_per_tick_bounds_the_drain() {
        let mut world = World::new(SimulationSettings {
            expansions_per_tick: 1,
            ..SimulationSettings::default()
        });
        for _ in 0..3 {
            world.expansions.push(ExpansionRequest::FoundBuilding {
                template: TemplateId::new(1),
                near: None,
            });
        }
        let _ = tick(&mut world);
        assert_eq!(world.expansions.len(), 2);
    }

    #[test]
    fn unexpandable_buildings_are_cached_until_space_changes() {
        let mut queue = ExpansionQueue::default();
        let building = BuildingId::from_slot(township_core::SlotId::new(1, 0));
        queue.mark_unexpandable(building);
        assert!(queue.is_unexpandable(building));
        queue.forget_unexpandable();
        assert!(!queue.is_unexpandable(building));
    }
}

//! The map: entity storage and the fixed-step simulation tick.
//!
//! One tick runs in this order, with every queued [`EntityEvent`] drained
//! right after the step that raised it:
//!
//! 1. first tick only: ground and detector pass over every entity
//! 2. hero input (walk, grab, start a push or pull)
//! 3. per entity: `update`, then its movement walked pixel by pixel; the
//!    block grabbed by the hero moves right after the hero
//! 4. stream pushes
//! 5. end of a finished push or pull
//! 6. detector sweep over every entity
//! 7. removed entities are erased
//!
//! Each pixel of a walk is checked against the terrain and the other
//! entities of the same layer, then followed by ground re-evaluation, the
//! position-changed notification and the detector checks, in that order.

use qme_core::{Clock, Direction8, Ground, Layer, Point, Timestamp};

use crate::audio::AudioSink;
use crate::config::SimulationConfig;
use crate::entity::{
    test_collision, Block, Destructible, Enemy, EntityContext, EntityEvent, EntityId,
    GrabbedEntity, Hero, HeroInput, HeroState, MapEntity, Stream, Switch, Teletransporter,
};
use crate::ground_grid::{GroundGrid, GroundProvider};
use crate::map_file::{EntityDef, MapFile, SpriteQuery};
use crate::movement::MovementEnv;
use crate::script::ScriptSink;

pub struct Map {
    map_id: String,
    ground: GroundGrid,
    entities: Vec<Box<dyn MapEntity>>,
    next_id: u32,
    hero: Option<EntityId>,
    config: SimulationConfig,
    tick: u64,
    started: bool,
    ground_dirty: bool,
}

impl Map {
    pub fn new(map_id: impl Into<String>, ground: GroundGrid, config: SimulationConfig) -> Self {
        Self {
            map_id: map_id.into(),
            ground,
            entities: Vec::new(),
            next_id: 0,
            hero: None,
            config,
            tick: 0,
            started: false,
            ground_dirty: false,
        }
    }

    /// Builds the map and all its entities. Any rejected entity fails the
    /// whole map.
    pub fn from_file(file: &MapFile, config: SimulationConfig, now: Timestamp) -> Result<Self, String> {
        let mut map = Self::new(
            file.map_id.clone(),
            GroundGrid::from_file(file.ground.clone()),
            config,
        );
        for (index, def) in file.entities.iter().enumerate() {
            let entity = build_entity(def, file, &config, index as u64, now).map_err(|e| {
                format!(
                    "Map '{}': entity #{} ('{}') rejected: {e}",
                    file.map_id,
                    index,
                    def.name().unwrap_or("<unnamed>")
                )
            })?;
            map.add_entity(entity);
        }
        log::info!(
            "Map '{}' loaded with {} entities",
            map.map_id,
            map.entities.len()
        );
        Ok(map)
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn add_entity(&mut self, mut entity: Box<dyn MapEntity>) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        entity.base_mut().set_id(id);
        if entity.as_hero().is_some() {
            if let Some(previous) = self.hero {
                log::warn!("hero {} replaces hero {} on map '{}'", id, previous, self.map_id);
            }
            self.hero = Some(id);
        }
        self.entities.push(entity);
        self.ground_dirty = true;
        id
    }

    pub fn entity(&self, id: EntityId) -> Option<&dyn MapEntity> {
        self.index_of(id)
            .map(|i| &*self.entities[i])
            .filter(|entity| !entity.base().is_removed())
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut (dyn MapEntity + 'static)> {
        let i = self.index_of(id)?;
        let entity = &mut *self.entities[i];
        (!entity.base().is_removed()).then_some(entity)
    }

    pub fn entity_by_name(&self, name: &str) -> Option<&dyn MapEntity> {
        self.entities()
            .find(|entity| entity.base().name() == Some(name))
    }

    pub fn entities(&self) -> impl Iterator<Item = &(dyn MapEntity + 'static)> {
        self.entities
            .iter()
            .map(|entity| &**entity)
            .filter(|entity| !entity.base().is_removed())
    }

    pub fn hero_id(&self) -> Option<EntityId> {
        self.hero
    }

    pub fn hero(&self) -> Option<&Hero> {
        self.hero.and_then(|id| self.entity(id)).and_then(|e| e.as_hero())
    }

    pub fn block(&self, id: EntityId) -> Option<&Block> {
        self.entity(id).and_then(|e| e.as_block())
    }

    pub fn block_mut(&mut self, id: EntityId) -> Option<&mut Block> {
        self.entity_mut(id).and_then(|e| e.as_block_mut())
    }

    pub fn stream(&self, id: EntityId) -> Option<&Stream> {
        self.entity(id).and_then(|e| e.as_stream())
    }

    pub fn ground(&self) -> &GroundGrid {
        &self.ground
    }

    /// Changes one ground cell. Entities standing on it react during the
    /// next tick.
    pub fn set_ground(&mut self, layer: Layer, x: i32, y: i32, ground: Ground) -> Result<(), String> {
        self.ground.set_ground(layer, x, y, ground)?;
        self.ground_dirty = true;
        Ok(())
    }

    /// Puts a block back in its initial state. A hero moving it lets go.
    pub fn reset_block(&mut self, id: EntityId, now: Timestamp) -> bool {
        if let Some(hero) = self.hero_index().and_then(|hi| self.entities[hi].as_hero_mut()) {
            if hero.grabbed().is_some_and(|grabbed| grabbed.id == id) {
                hero.finish_moving_grabbed();
            }
        }
        let Some(block) = self.block_mut(id) else {
            return false;
        };
        block.reset(now);
        log::debug!("block {} reset", id);
        self.ground_dirty = true;
        true
    }

    /// Turns a stream. Entities it carries follow the new direction at once.
    pub fn set_stream_direction(&mut self, id: EntityId, direction: Direction8) -> bool {
        let Some(stream) = self.entity_mut(id).and_then(|e| e.as_stream_mut()) else {
            return false;
        };
        stream.set_direction(direction);
        let push = stream.push();
        for entity in &mut self.entities {
            if let Some(action) = entity.base_mut().stream_action_mut() {
                if action.stream == id {
                    action.push = push;
                }
            }
        }
        true
    }

    pub fn tick(
        &mut self,
        input: HeroInput,
        clock: &dyn Clock,
        audio: &mut dyn AudioSink,
        scripts: &mut dyn ScriptSink,
    ) {
        self.tick += 1;
        let mut ctx = EntityContext::new(clock.now(), self.tick, audio, scripts);

        if !self.started {
            self.started = true;
            self.ground_dirty = false;
            for i in 0..self.entities.len() {
                self.update_ground_below(i, &mut ctx);
                self.check_collision_with_detectors(i, &mut ctx);
                self.process_events(&mut ctx);
            }
        } else if self.ground_dirty {
            self.ground_dirty = false;
            for i in 0..self.entities.len() {
                self.update_ground_below(i, &mut ctx);
                self.process_events(&mut ctx);
            }
        }

        self.apply_hero_input(input, &mut ctx);
        self.process_events(&mut ctx);

        let hero_index = self.hero_index();
        for i in 0..self.entities.len() {
            if self.entities[i].base().is_removed() {
                continue;
            }
            self.entities[i].update(&mut ctx);
            self.process_events(&mut ctx);
            self.step_movement(i, &mut ctx);
            self.process_events(&mut ctx);

            if Some(i) == hero_index {
                let grabbed = self.entities[i].as_hero().and_then(Hero::grabbed);
                if let Some(j) = grabbed.and_then(|g| self.index_of(g.id)) {
                    self.step_movement(j, &mut ctx);
                    self.process_events(&mut ctx);
                }
            }
        }

        self.update_stream_actions(&mut ctx);
        self.process_events(&mut ctx);

        self.finish_grabbed_movement(&mut ctx);
        self.process_events(&mut ctx);

        self.detector_sweep(&mut ctx);
        self.process_events(&mut ctx);

        self.purge_removed();
    }

    fn index_of(&self, id: EntityId) -> Option<usize> {
        self.entities.iter().position(|e| e.base().id() == id)
    }

    fn hero_index(&self) -> Option<usize> {
        self.hero.and_then(|id| self.index_of(id))
    }

    fn live_position(&self, id: EntityId) -> Option<Point> {
        self.index_of(id)
            .map(|i| self.entities[i].base())
            .filter(|base| !base.is_removed())
            .map(|base| base.position())
    }

    fn apply_hero_input(&mut self, input: HeroInput, ctx: &mut EntityContext<'_>) {
        let Some(hi) = self.hero_index() else {
            return;
        };
        let facing_block = self.entities[hi]
            .as_hero()
            .and_then(Hero::facing_entity)
            .filter(|id| self.block(*id).is_some());
        let walking_speed = self.config.walking_speed;
        let push_delay = self.config.push_delay_ms;
        let Some(hero) = self.entities[hi].as_hero_mut() else {
            return;
        };
        hero.set_action_held(input.action);
        let facing = hero.animation_direction();

        match hero.state() {
            HeroState::Falling { .. } | HeroState::Drowning { .. } | HeroState::Burning { .. } => {}
            HeroState::Pushing => {}
            HeroState::Pulling => {
                // Pulling needs the action key held all along.
                if !input.action {
                    if let Some(grabbed) = hero.grabbed() {
                        self.release_grabbed(grabbed.id, false, ctx);
                    }
                }
            }
            HeroState::Grabbing => {
                hero.walk(None, walking_speed);
                let (true, Some(block)) = (input.action, facing_block) else {
                    hero.set_state(HeroState::Free);
                    return;
                };
                match input.direction {
                    Some(d) if d == facing => {
                        self.try_move_grabbed(hi, block, false, ctx);
                    }
                    Some(d) if d == facing.opposite() => {
                        self.try_move_grabbed(hi, block, true, ctx);
                    }
                    _ => {}
                }
            }
            HeroState::Free => {
                if input.action && facing_block.is_some() {
                    hero.walk(None, walking_speed);
                    hero.set_state(HeroState::Grabbing);
                    return;
                }
                let Some(direction) = input.direction.filter(|_| hero.can_move_voluntarily()) else {
                    hero.walk(None, walking_speed);
                    return;
                };
                hero.set_animation_direction(direction);
                hero.walk(Some(direction), walking_speed);
                let pressing = hero
                    .blocked_since()
                    .is_some_and(|since| ctx.now >= since + push_delay);
                if direction == facing && pressing {
                    if let Some(block) = facing_block {
                        self.try_move_grabbed(hi, block, false, ctx);
                    }
                }
            }
        }
    }

    fn try_move_grabbed(
        &mut self,
        hi: usize,
        block_id: EntityId,
        pulling: bool,
        ctx: &mut EntityContext<'_>,
    ) -> bool {
        let Some(bi) = self.index_of(block_id) else {
            return false;
        };
        let speed = self.config.push_speed;
        let distance = self.config.push_distance;
        let (h, b) = pair_mut(&mut self.entities, hi, bi);
        let (Some(hero), Some(block)) = (h.as_hero_mut(), b.as_block_mut()) else {
            return false;
        };

        let previous = hero.state();
        hero.set_state(if pulling {
            HeroState::Pulling
        } else {
            HeroState::Pushing
        });
        if !block.start_movement_by_hero(hero, ctx.now) {
            hero.set_state(previous);
            return false;
        }

        let offset = block.base().position() - hero.base().position();
        let facing = hero.animation_direction();
        let direction = if pulling { facing.opposite() } else { facing };
        hero.start_moving_grabbed(
            GrabbedEntity {
                id: block_id,
                offset,
            },
            direction,
            speed,
            distance,
        );
        block.notify_moving_by(&*hero, ctx);
        true
    }

    /// Ends the hero's push or pull of `block_id`. Does nothing if the hero
    /// no longer holds it, so a second request in the same tick is harmless.
    fn release_grabbed(&mut self, block_id: EntityId, snap: bool, ctx: &mut EntityContext<'_>) {
        let Some(hi) = self.hero_index() else {
            return;
        };
        let Some(grabbed) = self.entities[hi]
            .as_hero()
            .and_then(Hero::grabbed)
            .filter(|g| g.id == block_id)
        else {
            return;
        };

        let mut repositioned = false;
        match self.index_of(block_id) {
            Some(bi) => {
                let (h, b) = pair_mut(&mut self.entities, hi, bi);
                let Some(hero) = h.as_hero_mut() else {
                    return;
                };
                hero.finish_moving_grabbed();
                // The hero may have stepped ahead of a block that got stuck.
                // A falling or sinking hero stays where the hazard caught it.
                if snap && !hero.is_in_hazard() && !b.base().is_removed() {
                    let snapped = b.base().position() - grabbed.offset;
                    if snapped != hero.base().position() {
                        hero.base_mut().set_position(snapped);
                        repositioned = true;
                    }
                }
                if let Some(block) = b.as_block_mut() {
                    block.stop_movement_by_hero(ctx.now);
                    if !block.base().is_removed() {
                        block.notify_moved_by(&*hero, ctx);
                    }
                }
            }
            None => {
                if let Some(hero) = self.entities[hi].as_hero_mut() {
                    hero.finish_moving_grabbed();
                }
            }
        }
        if repositioned {
            self.after_reposition(hi, ctx);
        }
    }

    fn finish_grabbed_movement(&mut self, ctx: &mut EntityContext<'_>) {
        let Some(hero) = self.hero_index().and_then(|hi| self.entities[hi].as_hero()) else {
            return;
        };
        let moving = matches!(hero.state(), HeroState::Pushing | HeroState::Pulling);
        let done = hero
            .base()
            .movement()
            .map_or(true, |movement| movement.is_finished());
        if let (true, true, Some(grabbed)) = (moving, done, hero.grabbed()) {
            self.release_grabbed(grabbed.id, true, ctx);
        }
    }

    fn step_movement(&mut self, i: usize, ctx: &mut EntityContext<'_>) {
        let (target, ignores_obstacles) = {
            let base = self.entities[i].base();
            if base.is_removed() {
                return;
            }
            let Some(movement) = base.movement() else {
                return;
            };
            (movement.target(), movement.ignores_obstacles())
        };
        let env = MovementEnv {
            now: ctx.now,
            target: target.and_then(|id| self.live_position(id)),
        };

        let base = self.entities[i].base_mut();
        let current = base.position();
        let Some(candidate) = base
            .movement_mut()
            .and_then(|movement| movement.next_position(current, &env))
        else {
            return;
        };
        if ignores_obstacles {
            base.set_position(candidate);
            self.after_position_changed(i, ctx);
        } else {
            self.walk_to(i, candidate, ctx);
        }
    }

    /// Walks one pixel at a time, x before y, until `destination` is reached,
    /// an obstacle is hit or the walk is interrupted.
    fn walk_to(&mut self, i: usize, destination: Point, ctx: &mut EntityContext<'_>) {
        loop {
            let delta = destination - self.entities[i].base().position();
            if delta == Point::ZERO {
                return;
            }
            let mut blocked = false;
            for step in [Point::new(delta.x.signum(), 0), Point::new(0, delta.y.signum())] {
                if step == Point::ZERO {
                    continue;
                }
                if !self.try_step(i, step, ctx) {
                    blocked = true;
                }
                let base = self.entities[i].base();
                if base.is_removed() || !base.has_movement() {
                    return;
                }
            }
            if blocked {
                self.entities[i].notify_obstacle_reached(ctx);
                return;
            }
        }
    }

    fn try_step(&mut self, i: usize, step: Point, ctx: &mut EntityContext<'_>) -> bool {
        let candidate = self.entities[i].base().position() + step;
        if self.is_blocked(i, candidate) {
            return false;
        }
        self.entities[i].base_mut().set_position(candidate);
        self.after_position_changed(i, ctx);
        true
    }

    /// Whether entity `i` may not stand at `position`. Entities it already
    /// overlaps never block it, so nothing gets stuck inside another.
    fn is_blocked(&self, i: usize, position: Point) -> bool {
        let entity = &*self.entities[i];
        let base = entity.base();
        let current = base.bounding_box();
        let wanted = base.bounding_box_at(position);
        if self
            .ground
            .is_any_ground_in(wanted, base.layer(), &|g| entity.is_ground_obstacle(g))
        {
            return true;
        }
        self.entities.iter().enumerate().any(|(j, other)| {
            let other_base = other.base();
            j != i
                && !other_base.is_removed()
                && other_base.layer() == base.layer()
                && other_base.bounding_box().overlaps(&wanted)
                && !other_base.bounding_box().overlaps(&current)
                && other.is_obstacle_for(entity)
        })
    }

    fn after_position_changed(&mut self, i: usize, ctx: &mut EntityContext<'_>) {
        self.after_reposition(i, ctx);
        if !self.entities[i].base().is_removed() {
            self.check_collision_with_detectors(i, ctx);
        }
    }

    /// Ground and notification part of a position change. Detectors are
    /// left to the end-of-tick sweep.
    fn after_reposition(&mut self, i: usize, ctx: &mut EntityContext<'_>) {
        self.update_ground_below(i, ctx);
        if !self.entities[i].base().is_removed() {
            self.entities[i].notify_position_changed(ctx);
        }
    }

    fn update_ground_below(&mut self, i: usize, ctx: &mut EntityContext<'_>) {
        let entity = &mut self.entities[i];
        if entity.base().is_removed() || !entity.is_ground_observer() {
            return;
        }
        let ground = self
            .ground
            .ground_at(entity.base().position(), entity.base().layer());
        if entity.base().ground_below() == Some(ground) {
            return;
        }
        log::trace!("{} is now on {}", entity.entity_ref(), ground);
        entity.base_mut().set_ground_below(Some(ground));
        entity.notify_ground_below_changed(ctx);
    }

    fn check_collision_with_detectors(&mut self, i: usize, ctx: &mut EntityContext<'_>) {
        for j in 0..self.entities.len() {
            if j == i {
                continue;
            }
            let modes = self.entities[j].collision_modes();
            for &mode in modes {
                let (detector, entity) = pair_mut(&mut self.entities, j, i);
                if detector.base().is_removed()
                    || entity.base().is_removed()
                    || detector.base().layer() != entity.base().layer()
                {
                    break;
                }
                if test_collision(&**detector, &**entity, mode) {
                    detector.notify_collision(&mut **entity, mode, ctx);
                }
            }
        }
    }

    fn detector_sweep(&mut self, ctx: &mut EntityContext<'_>) {
        if let Some(hero) = self.hero_index().and_then(|hi| self.entities[hi].as_hero_mut()) {
            hero.clear_facing_entity();
        }
        for i in 0..self.entities.len() {
            if !self.entities[i].base().is_removed() {
                self.check_collision_with_detectors(i, ctx);
            }
        }
    }

    fn update_stream_actions(&mut self, ctx: &mut EntityContext<'_>) {
        for i in 0..self.entities.len() {
            let base = self.entities[i].base();
            if base.is_removed() {
                continue;
            }
            let Some(action) = base.stream_action().copied() else {
                continue;
            };
            // The stream may have been turned or slowed since the last refresh.
            let push = self
                .stream(action.stream)
                .map(Stream::push)
                .filter(|_| action.is_active(ctx.tick));
            let Some(push) = push else {
                log::debug!(
                    "{} leaves stream {}",
                    self.entities[i].entity_ref(),
                    action.stream
                );
                self.entities[i].base_mut().set_stream_action(None);
                continue;
            };

            let steps = self.entities[i]
                .base_mut()
                .stream_action_mut()
                .map_or(0, |action| {
                    action.push = push;
                    action.due_steps(ctx.now)
                });
            let offset = push.direction.offset();
            for _ in 0..steps {
                let moved = self.try_step(i, offset, ctx)
                    || (offset.x != 0
                        && offset.y != 0
                        && (self.try_step(i, Point::new(offset.x, 0), ctx)
                            || self.try_step(i, Point::new(0, offset.y), ctx)));
                if !moved || self.entities[i].base().is_removed() {
                    break;
                }
            }
        }
    }

    fn process_events(&mut self, ctx: &mut EntityContext<'_>) {
        loop {
            let events = ctx.take_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.handle_event(event, ctx);
            }
        }
    }

    fn handle_event(&mut self, event: EntityEvent, ctx: &mut EntityContext<'_>) {
        match event {
            EntityEvent::Remove(id) => {
                if let Some(i) = self.index_of(id) {
                    let entity = self.entities[i].entity_ref();
                    log::debug!("{} removed from map '{}'", entity, self.map_id);
                    ctx.scripts.entity_removed(entity);
                }
                self.release_grabbed(id, false, ctx);
            }
            EntityEvent::GrabbedEntityCollision { entity } => {
                self.release_grabbed(entity, true, ctx);
            }
            EntityEvent::Teleport {
                entity,
                destination,
                layer,
            } => {
                if self.hero == Some(entity) {
                    if let Some(grabbed) = self.hero().and_then(Hero::grabbed) {
                        self.release_grabbed(grabbed.id, false, ctx);
                    }
                }
                let Some(i) = self.index_of(entity) else {
                    return;
                };
                let base = self.entities[i].base_mut();
                base.set_layer(layer);
                base.set_position(destination);
                base.set_stream_action(None);
                self.after_reposition(i, ctx);
            }
            EntityEvent::Repositioned(id) => {
                if let Some(i) = self.index_of(id) {
                    self.after_reposition(i, ctx);
                }
            }
        }
    }

    fn purge_removed(&mut self) {
        self.entities.retain(|entity| !entity.base().is_removed());
        if self.hero.is_some() && self.hero_index().is_none() {
            self.hero = None;
        }
    }
}

fn build_entity(
    def: &EntityDef,
    sprites: &dyn SpriteQuery,
    config: &SimulationConfig,
    seed: u64,
    now: Timestamp,
) -> Result<Box<dyn MapEntity>, String> {
    let entity: Box<dyn MapEntity> = match def {
        EntityDef::Hero(c) => Box::new(Hero::new(c, config.hazard_recovery_ms)),
        EntityDef::Block(c) => {
            let sprite_size = c.sprite.as_deref().and_then(|s| sprites.sprite_size(s));
            Box::new(Block::new(c, sprite_size, now)?)
        }
        EntityDef::Stream(c) => Box::new(Stream::new(c)),
        EntityDef::Switch(c) => Box::new(Switch::new(c)),
        EntityDef::Teletransporter(c) => Box::new(Teletransporter::new(c)),
        EntityDef::Enemy(c) => Box::new(Enemy::new(c, seed)?),
        EntityDef::Destructible(c) => Box::new(Destructible::new(c)),
    };
    Ok(entity)
}

/// Two distinct elements of a slice, both mutable.
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

use serde::Deserialize;

use qme_core::{Direction4, Ground, Layer, Point, Timestamp};

use super::{
    default_ground_obstacle, default_obstacle_reached, Block, CollisionMode, Enemy, EntityBase,
    EntityContext, EntityEvent, EntityId, EntityKind, MapEntity, Stream, StreamPush, Switch,
    Teletransporter,
};
use crate::movement::StraightMovement;

const HERO_SIZE: Point = Point::new(16, 16);
const HERO_ORIGIN: Point = Point::new(8, 13);

const FALL_SOUND: &str = "hero_falls";
const SPLASH_SOUND: &str = "splash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeroState {
    Free,
    /// Holding the entity in front without moving it.
    Grabbing,
    Pushing,
    Pulling,
    Falling { since: Timestamp },
    Drowning { since: Timestamp },
    Burning { since: Timestamp },
}

impl HeroState {
    fn hazard_since(self) -> Option<Timestamp> {
        match self {
            Self::Falling { since } | Self::Drowning { since } | Self::Burning { since } => Some(since),
            _ => None,
        }
    }
}

/// The entity the hero holds and where it stands relative to the hero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrabbedEntity {
    pub id: EntityId,
    pub offset: Point,
}

/// Player intent for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct HeroInput {
    #[serde(default)]
    pub direction: Option<Direction4>,
    /// Action key held: grab what is in front.
    #[serde(default)]
    pub action: bool,
}

impl HeroInput {
    pub fn walk(direction: Direction4) -> Self {
        Self {
            direction: Some(direction),
            action: false,
        }
    }
}

fn default_hero_name() -> Option<String> {
    Some("hero".to_string())
}

fn default_direction() -> Direction4 {
    Direction4::Down
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeroConfig {
    #[serde(default = "default_hero_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub layer: Layer,
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_direction")]
    pub direction: Direction4,
}

#[derive(Debug)]
pub struct Hero {
    base: EntityBase,
    facing: Direction4,
    state: HeroState,
    facing_entity: Option<EntityId>,
    grabbed: Option<GrabbedEntity>,
    blocked_since: Option<Timestamp>,
    walk_direction: Option<Direction4>,
    last_solid_ground: Point,
    action_held: bool,
    hazard_recovery_ms: u64,
}

impl Hero {
    pub fn new(config: &HeroConfig, hazard_recovery_ms: u64) -> Self {
        let position = Point::new(config.x, config.y);
        let mut base = EntityBase::new(config.name.clone(), config.layer, position, HERO_SIZE, HERO_ORIGIN);
        base.set_drawn_in_y_order(true);
        Self {
            base,
            facing: config.direction,
            state: HeroState::Free,
            facing_entity: None,
            grabbed: None,
            blocked_since: None,
            walk_direction: None,
            last_solid_ground: position,
            action_held: false,
            hazard_recovery_ms,
        }
    }

    pub fn animation_direction(&self) -> Direction4 {
        self.facing
    }

    pub fn set_animation_direction(&mut self, direction: Direction4) {
        self.facing = direction;
    }

    pub fn state(&self) -> HeroState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: HeroState) {
        if self.state != state {
            log::trace!("hero state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// True while the hero holds something without pushing it, or pulls it.
    pub fn is_grabbing_or_pulling(&self) -> bool {
        matches!(self.state, HeroState::Grabbing | HeroState::Pulling)
    }

    pub fn is_in_hazard(&self) -> bool {
        self.state.hazard_since().is_some()
    }

    /// Entity whose facing detector saw the hero during the last sweep.
    pub fn facing_entity(&self) -> Option<EntityId> {
        self.facing_entity
    }

    pub(crate) fn clear_facing_entity(&mut self) {
        self.facing_entity = None;
    }

    pub fn grabbed(&self) -> Option<GrabbedEntity> {
        self.grabbed
    }

    /// Since when the hero has been walking against an obstacle.
    pub fn blocked_since(&self) -> Option<Timestamp> {
        self.blocked_since
    }

    pub fn last_solid_ground(&self) -> Point {
        self.last_solid_ground
    }

    pub(crate) fn set_action_held(&mut self, held: bool) {
        self.action_held = held;
    }

    pub fn can_move_voluntarily(&self) -> bool {
        self.stream_allows(|push| push.allow_movement)
    }

    pub fn can_attack(&self) -> bool {
        self.stream_allows(|push| push.allow_attack)
    }

    pub fn can_use_item(&self) -> bool {
        self.stream_allows(|push| push.allow_item)
    }

    fn stream_allows(&self, permission: impl Fn(&StreamPush) -> bool) -> bool {
        !self.is_in_hazard()
            && self
                .base
                .stream_action()
                .map_or(true, |action| permission(&action.push))
    }

    /// Keeps walking in `direction`, or stands still with `None`.
    pub(crate) fn walk(&mut self, direction: Option<Direction4>, speed: u32) {
        if self.walk_direction == direction {
            return;
        }
        self.walk_direction = direction;
        self.blocked_since = None;
        match direction {
            Some(direction) => self.base.set_movement(Box::new(
                StraightMovement::towards(direction, speed).keep_trying_on_obstacle(),
            )),
            None => {
                self.base.clear_movement();
            }
        }
    }

    /// Starts moving together with `grabbed` over at most `distance` pixels.
    pub(crate) fn start_moving_grabbed(
        &mut self,
        grabbed: GrabbedEntity,
        direction: Direction4,
        speed: u32,
        distance: u32,
    ) {
        self.grabbed = Some(grabbed);
        self.walk_direction = None;
        self.blocked_since = None;
        self.base.set_movement(Box::new(
            StraightMovement::towards(direction, speed).with_max_distance(distance),
        ));
    }

    /// Lets go of the grabbed entity. The hero keeps holding on while the
    /// action key is down.
    pub(crate) fn finish_moving_grabbed(&mut self) -> Option<GrabbedEntity> {
        let grabbed = self.grabbed.take();
        self.base.clear_movement();
        self.walk_direction = None;
        self.blocked_since = None;
        if !self.is_in_hazard() {
            self.set_state(if self.action_held {
                HeroState::Grabbing
            } else {
                HeroState::Free
            });
        }
        grabbed
    }

    fn enter_hazard(&mut self, state: HeroState, sound: &str, ctx: &mut EntityContext<'_>) {
        ctx.audio.play(sound);
        if let Some(grabbed) = self.grabbed {
            ctx.push_event(EntityEvent::GrabbedEntityCollision { entity: grabbed.id });
        }
        self.base.clear_movement();
        self.base.set_stream_action(None);
        self.walk_direction = None;
        self.set_state(state);
    }
}

impl MapEntity for Hero {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Hero
    }

    fn is_ground_observer(&self) -> bool {
        true
    }

    fn facing_point(&self) -> Option<Point> {
        let bbox = self.base.bounding_box();
        let center = bbox.center();
        Some(match self.facing {
            Direction4::Right => Point::new(bbox.right(), center.y),
            Direction4::Up => Point::new(center.x, bbox.y - 1),
            Direction4::Left => Point::new(bbox.x - 1, center.y),
            Direction4::Down => Point::new(center.x, bbox.bottom()),
        })
    }

    fn as_hero(&self) -> Option<&Hero> {
        Some(self)
    }

    fn as_hero_mut(&mut self) -> Option<&mut Hero> {
        Some(self)
    }

    fn is_obstacle_for(&self, other: &dyn MapEntity) -> bool {
        other.is_hero_obstacle(self)
    }

    /// Blocks decide: a block moving with the hero must not stop the hero.
    fn is_block_obstacle(&self, block: &Block) -> bool {
        block.is_hero_obstacle(self)
    }

    fn is_enemy_obstacle(&self, _enemy: &Enemy) -> bool {
        false
    }

    fn is_teletransporter_obstacle(&self, _teletransporter: &Teletransporter) -> bool {
        false
    }

    fn is_switch_obstacle(&self, switch: &Switch) -> bool {
        !switch.is_walkable()
    }

    fn is_stream_obstacle(&self, _stream: &Stream) -> bool {
        false
    }

    /// The hero may walk into hazards and suffers the consequences.
    fn is_ground_obstacle(&self, ground: Ground) -> bool {
        match ground {
            Ground::Hole | Ground::DeepWater | Ground::Lava | Ground::Prickles | Ground::Ladder => {
                false
            }
            other => default_ground_obstacle(other),
        }
    }

    fn notify_collision_with_block(&mut self, block: &mut Block, _ctx: &mut EntityContext<'_>) {
        self.facing_entity = Some(block.base().id());
    }

    fn notify_collision_with_switch(
        &mut self,
        switch: &mut Switch,
        mode: CollisionMode,
        ctx: &mut EntityContext<'_>,
    ) {
        if mode == CollisionMode::Origin {
            switch.try_activate_by(EntityKind::Hero, ctx);
        }
    }

    fn notify_collision_with_stream(&mut self, stream: &mut Stream, ctx: &mut EntityContext<'_>) {
        if !self.is_in_hazard() {
            stream.activate(self, ctx);
        }
    }

    fn notify_collision_with_teletransporter(
        &mut self,
        teletransporter: &mut Teletransporter,
        ctx: &mut EntityContext<'_>,
    ) {
        if !self.is_in_hazard() {
            teletransporter.transport(&*self, ctx);
        }
    }

    fn notify_position_changed(&mut self, ctx: &mut EntityContext<'_>) {
        self.blocked_since = None;
        if !self.base.ground_below().is_some_and(Ground::is_hazard) {
            self.last_solid_ground = self.base.position();
        }
        self.base.notify_scripts_position_changed(EntityKind::Hero, ctx);
    }

    fn notify_obstacle_reached(&mut self, ctx: &mut EntityContext<'_>) {
        if self.blocked_since.is_none() {
            self.blocked_since = Some(ctx.now);
        }
        if let (HeroState::Pushing | HeroState::Pulling, Some(grabbed)) = (self.state, self.grabbed) {
            ctx.push_event(EntityEvent::GrabbedEntityCollision { entity: grabbed.id });
        }
        default_obstacle_reached(&mut self.base, ctx.now);
    }

    fn notify_ground_below_changed(&mut self, ctx: &mut EntityContext<'_>) {
        if self.is_in_hazard() {
            return;
        }
        let since = ctx.now;
        match self.base.ground_below() {
            Some(Ground::Hole) => self.enter_hazard(HeroState::Falling { since }, FALL_SOUND, ctx),
            Some(Ground::DeepWater) => {
                self.enter_hazard(HeroState::Drowning { since }, SPLASH_SOUND, ctx)
            }
            Some(Ground::Lava) => self.enter_hazard(HeroState::Burning { since }, SPLASH_SOUND, ctx),
            _ => {}
        }
    }

    /// Puts the hero back on solid ground once a hazard has played out.
    fn update(&mut self, ctx: &mut EntityContext<'_>) {
        let Some(since) = self.state.hazard_since() else {
            return;
        };
        if ctx.now < since + self.hazard_recovery_ms {
            return;
        }
        log::info!(
            "hero recovers at ({}, {})",
            self.last_solid_ground.x,
            self.last_solid_ground.y
        );
        self.base.set_position(self.last_solid_ground);
        self.base.set_stream_action(None);
        self.set_state(HeroState::Free);
        ctx.push_event(EntityEvent::Repositioned(self.base.id()));
    }
}
